use anyhow::Context;

/// Settings of the payment processor integration.
///
/// Built once at startup and handed to [`crate::processor::LiqPay`], nothing
/// reads these values from the environment after that.
#[derive(Clone, Default)]
pub struct ProcessorConfig {
    pub private_key: String,
    pub purchase_endpoint: String,
    pub access_key: String,
    pub profile_id: String,
    /// Public base URL of this service, used to build the postback URL sent to the processor
    pub callback_url: Option<String>,
}

impl std::fmt::Debug for ProcessorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorConfig")
            .field("private_key", &"***")
            .field("purchase_endpoint", &self.purchase_endpoint)
            .field("access_key", &self.access_key)
            .field("profile_id", &self.profile_id)
            .field("callback_url", &self.callback_url)
            .finish()
    }
}

impl ProcessorConfig {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).unwrap_or_default();
        let config = Self {
            private_key: var("PROCESSOR_PRIVATE_KEY"),
            purchase_endpoint: var("PROCESSOR_PURCHASE_ENDPOINT"),
            access_key: var("PROCESSOR_ACCESS_KEY"),
            profile_id: var("PROCESSOR_PROFILE_ID"),
            callback_url: std::env::var("CALLBACK_URL").ok(),
        };
        if config.private_key.is_empty() {
            tracing::warn!("PROCESSOR_PRIVATE_KEY is not defined, every postback will be rejected");
        }
        if config.callback_url.is_none() {
            tracing::warn!("CALLBACK_URL is not defined, purchase forms will not carry a postback URL");
        }
        config
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not defined")?;
        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3030);
        Ok(Self { database_url, port })
    }
}
