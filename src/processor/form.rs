use std::collections::BTreeMap;

use base64::{Engine, prelude::BASE64_STANDARD};
use serde::Serialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{
    order::Order,
    processor::{LiqPay, Result},
};

const API_VERSION: u8 = 3;

/// Checkout parameters the payer's browser posts to the processor.
#[derive(Debug, Serialize)]
pub struct PurchaseParams<'a> {
    pub version: u8,
    pub public_key: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub profile_id: &'a str,
    pub action: &'static str,
    /// Total with exactly two decimals
    pub amount: String,
    pub currency: &'a str,
    pub description: String,
    pub order_id: i64,
    pub transaction_uuid: String,
    pub signed_date_time: String,
    pub language: &'static str,
    pub paytypes: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    /// `merchant_defined_data1`, `merchant_defined_data2`, ... for transaction tracking
    #[serde(flatten)]
    pub merchant_defined_data: BTreeMap<String, String>,
}

/// The `data`/`signature` pair submitted to the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedEnvelope {
    pub data: String,
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct PurchaseForm {
    pub payment_url: String,
    pub payment_params: SignedEnvelope,
}

impl LiqPay {
    pub fn purchase_params<'a>(
        &'a self,
        order: &'a Order,
        extra_data: &[String],
    ) -> PurchaseParams<'a> {
        let callback_url = self
            .config
            .callback_url
            .as_ref()
            .map(|url| format!("{}/shoppingcart/postpay_callback", url.trim_end_matches('/')));
        let signed_date_time = OffsetDateTime::now_utc()
            .replace_nanosecond(0)
            .unwrap_or_else(|_| OffsetDateTime::now_utc())
            .format(&Rfc3339)
            .unwrap_or_default();
        let merchant_defined_data = extra_data
            .iter()
            .enumerate()
            .map(|(num, item)| (format!("merchant_defined_data{}", num + 1), item.clone()))
            .collect();

        PurchaseParams {
            version: API_VERSION,
            public_key: &self.config.access_key,
            profile_id: &self.config.profile_id,
            action: "pay",
            amount: format!("{:.2}", order.total_cost),
            currency: &order.currency,
            description: format!("OrderId: {}", order.id),
            order_id: order.id,
            transaction_uuid: uuid::Uuid::new_v4().simple().to_string(),
            signed_date_time,
            language: "en",
            paytypes: "card",
            server_url: callback_url.clone(),
            result_url: callback_url,
            merchant_defined_data,
        }
    }

    /// Encodes `params` as base64 JSON and signs it with the processor hash.
    ///
    /// Postbacks use the same envelope, so a signed envelope passes
    /// [`LiqPay::verify_signatures`] with the same key.
    pub fn sign(&self, params: &impl Serialize) -> Result<SignedEnvelope> {
        let json = serde_json::to_vec(params)?;
        let data = BASE64_STANDARD.encode(json);
        let signature = self.processor_hash(&data)?;
        Ok(SignedEnvelope { data, signature })
    }

    pub fn purchase_form(&self, order: &Order, extra_data: &[String]) -> Result<PurchaseForm> {
        let params = self.purchase_params(order, extra_data);
        Ok(PurchaseForm {
            payment_url: self.purchase_endpoint().to_string(),
            payment_params: self.sign(&params)?,
        })
    }
}
