use crate::{config::ProcessorConfig, db::Db, order::Order};

pub mod api;
/// Processor postback payload and parameter coercion
pub mod callback;
mod error;
/// Outbound purchase form
pub mod form;
/// Card number and secret masking for logs and audit dumps
pub mod mask;
/// Purchase acceptance and recording
mod purchase;
mod signature;

pub use error::ProcessorError;

pub type Result<T> = std::result::Result<T, ProcessorError>;

/// LiqPay integration (Callback API 3.0).
///
/// Postbacks flow through [`LiqPay::process_postpay_callback`]: signature
/// check, parameter coercion, amount check against the stored order and
/// finally recording of the purchase.
#[derive(Debug, Clone)]
pub struct LiqPay {
    config: ProcessorConfig,
}

impl LiqPay {
    pub fn new(config: ProcessorConfig) -> Self {
        Self { config }
    }

    pub fn purchase_endpoint(&self) -> &str {
        &self.config.purchase_endpoint
    }

    pub fn processor_hash(&self, value: &str) -> Result<String> {
        if self.config.private_key.is_empty() {
            return Err(ProcessorError::PrivateKeyAbsent);
        }
        Ok(signature::processor_hash(&self.config.private_key, value))
    }

    /// Authenticates a postback and returns its coerced parameters.
    ///
    /// A cancelled payment does not carry a signed payload, so `status=failure`
    /// is rejected before anything else is looked at.
    pub fn verify_signatures(
        &self,
        payload: &callback::CallbackPayload,
    ) -> Result<callback::ValidatedParams> {
        if payload.status.eq_ignore_ascii_case("failure") {
            return Err(ProcessorError::TransactionFailed);
        }
        if payload.data.is_empty() && payload.signature.is_empty() {
            return Err(ProcessorError::DataMissing("data"));
        }

        let expected = self.processor_hash(&payload.data)?;
        if !signature::signatures_match(&expected, &payload.signature) {
            return Err(ProcessorError::SignatureMismatch);
        }

        let data = callback::decode_data(&payload.data)?;
        tracing::debug!(
            data = %mask::secure_value(&serde_json::Value::Object(data.clone())),
            "Verified processor reply"
        );
        callback::ValidatedParams::from_data(data)
    }

    pub async fn process_postpay_callback(
        &self,
        db: &Db,
        payload: &callback::CallbackPayload,
    ) -> Result<Order> {
        let params = self.verify_signatures(payload)?;
        params.ensure_settled()?;
        let order =
            purchase::payment_accepted(db, params.order_id, params.amount, &params.currency)
                .await?;
        purchase::record_purchase(db, payload, &params, order).await
    }
}
