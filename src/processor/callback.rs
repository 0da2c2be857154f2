use std::{collections::BTreeMap, str::FromStr};

use base64::{Engine, prelude::BASE64_STANDARD};
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use super::{ProcessorError, Result};

/// Form fields of a processor postback.
///
/// `data` is the base64 encoded JSON reply and `signature` authenticates it.
/// Anything else the processor sends is kept in `extra`.
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct CallbackPayload {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub signature: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl CallbackPayload {
    /// Every received form field as sent, with the decoded reply under `decoded`.
    pub fn reply_dump(&self, decoded: &Map<String, Value>) -> String {
        let mut dump: Map<String, Value> = self
            .extra
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect();
        dump.insert("status".into(), Value::String(self.status.clone()));
        dump.insert("data".into(), Value::String(self.data.clone()));
        dump.insert("signature".into(), Value::String(self.signature.clone()));
        dump.insert("decoded".into(), Value::Object(decoded.clone()));
        Value::Object(dump).to_string()
    }
}

/// Processor reply after signature check and type coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedParams {
    pub order_id: i64,
    pub currency: String,
    pub status: String,
    pub amount: Decimal,
    /// The whole decoded reply, source of the optional billing fields
    pub data: Map<String, Value>,
}

impl ValidatedParams {
    pub fn from_data(data: Map<String, Value>) -> Result<Self> {
        let order_id = required(&data, "order_id", as_integer)?;
        let currency = required(&data, "currency", as_text)?;
        let status = required(&data, "status", as_text)?;
        let amount = required(&data, "amount", as_decimal)?;
        Ok(Self {
            order_id,
            currency,
            status,
            amount,
            data,
        })
    }

    /// Only `success` and `sandbox` replies are allowed to purchase an order.
    pub fn ensure_settled(&self) -> Result<()> {
        match self.status.to_ascii_lowercase().as_str() {
            "success" | "sandbox" => Ok(()),
            "failure" | "error" | "reversed" => Err(ProcessorError::TransactionFailed),
            _ => Err(ProcessorError::PaymentPending(self.status.clone())),
        }
    }

    /// Optional text field of the reply, empty when absent.
    pub fn text_or_default(&self, key: &str) -> String {
        self.data.get(key).and_then(as_text).unwrap_or_default()
    }
}

/// Decodes the base64 `data` field into a JSON object.
pub fn decode_data(data: &str) -> Result<Map<String, Value>> {
    let malformed = || ProcessorError::DataMalformed {
        parameter: "data",
        value: truncated(data),
    };
    let bytes = BASE64_STANDARD.decode(data.trim()).map_err(|_| malformed())?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(malformed()),
    }
}

fn truncated(value: &str) -> String {
    const LIMIT: usize = 64;
    match value.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &value[..idx]),
        None => value.to_string(),
    }
}

fn required<T>(
    data: &Map<String, Value>,
    key: &'static str,
    coerce: impl Fn(&Value) -> Option<T>,
) -> Result<T> {
    let value = data.get(key).ok_or(ProcessorError::DataMissing(key))?;
    coerce(value).ok_or_else(|| ProcessorError::DataMalformed {
        parameter: key,
        value: truncated(&value.to_string()),
    })
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test payloads are objects"),
        }
    }

    #[test]
    fn coerce_required_fields() {
        let params = ValidatedParams::from_data(object(json!({
            "order_id": "42",
            "currency": "USD",
            "status": "success",
            "amount": 10.5,
            "req_card_type": "visa",
        })))
        .unwrap();

        assert_eq!(params.order_id, 42);
        assert_eq!(params.currency, "USD");
        assert_eq!(params.status, "success");
        assert_eq!(params.amount, dec!(10.5));
        assert_eq!(params.text_or_default("req_card_type"), "visa");
        assert_eq!(params.text_or_default("req_bill_to_forename"), "");
    }

    #[test]
    fn amount_keeps_decimal_precision() {
        let params = ValidatedParams::from_data(object(json!({
            "order_id": 1,
            "currency": "uah",
            "status": "sandbox",
            "amount": "0.10",
        })))
        .unwrap();
        assert_eq!(params.amount, dec!(0.10));

        let params = ValidatedParams::from_data(object(json!({
            "order_id": 1.9,
            "currency": "uah",
            "status": "sandbox",
            "amount": 0.1,
        })))
        .unwrap();
        assert_eq!(params.order_id, 1);
        assert_eq!(params.amount, dec!(0.1));
    }

    #[test]
    fn every_required_field_is_checked() {
        let full = json!({
            "order_id": 1,
            "currency": "usd",
            "status": "success",
            "amount": "10.00",
        });
        for key in ["order_id", "currency", "status", "amount"] {
            let mut data = object(full.clone());
            data.remove(key);
            let err = ValidatedParams::from_data(data).unwrap_err();
            assert!(
                matches!(err, ProcessorError::DataMissing(missing) if missing == key),
                "missing {key} gave {err:?}"
            );
        }
    }

    #[test]
    fn badly_typed_values() {
        let err = ValidatedParams::from_data(object(json!({
            "order_id": "forty-two",
            "currency": "usd",
            "status": "success",
            "amount": "10.00",
        })))
        .unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::DataMalformed { parameter: "order_id", .. }
        ));

        let err = ValidatedParams::from_data(object(json!({
            "order_id": 1,
            "currency": "usd",
            "status": "success",
            "amount": {"value": 10},
        })))
        .unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::DataMalformed { parameter: "amount", .. }
        ));

        let err = ValidatedParams::from_data(object(json!({
            "order_id": 1,
            "currency": null,
            "status": "success",
            "amount": 1,
        })))
        .unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::DataMalformed { parameter: "currency", .. }
        ));
    }

    #[test]
    fn long_malformed_values_are_truncated() {
        let err = ValidatedParams::from_data(object(json!({
            "order_id": 1,
            "currency": "usd",
            "status": "success",
            "amount": "9".repeat(500) + "x",
        })))
        .unwrap_err();
        match err {
            ProcessorError::DataMalformed {
                parameter: "amount",
                value,
            } => {
                assert!(value.ends_with("..."));
                assert!(value.chars().count() <= 67);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn reply_dump_keeps_every_field_as_sent() {
        let payload = CallbackPayload {
            status: "success".into(),
            data: "eyJvcmRlcl9pZCI6MX0=".into(),
            signature: "sig".into(),
            extra: BTreeMap::from([("liqpay_txn".to_string(), "T-9".to_string())]),
        };
        let decoded = object(json!({"order_id": 1, "req_card_number": "xxxxxxxx1234"}));

        let dump: Value = serde_json::from_str(&payload.reply_dump(&decoded)).unwrap();
        assert_eq!(dump["status"], "success");
        assert_eq!(dump["data"], "eyJvcmRlcl9pZCI6MX0=");
        assert_eq!(dump["signature"], "sig");
        assert_eq!(dump["liqpay_txn"], "T-9");
        assert_eq!(dump["decoded"]["req_card_number"], "xxxxxxxx1234");
        assert_eq!(dump["decoded"]["order_id"], 1);
    }

    #[test]
    fn settled_statuses() {
        let mut params = ValidatedParams::from_data(object(json!({
            "order_id": 1,
            "currency": "usd",
            "status": "SUCCESS",
            "amount": 1,
        })))
        .unwrap();
        assert!(params.ensure_settled().is_ok());

        params.status = "sandbox".into();
        assert!(params.ensure_settled().is_ok());

        params.status = "failure".into();
        assert!(matches!(
            params.ensure_settled(),
            Err(ProcessorError::TransactionFailed)
        ));

        params.status = "wait_secure".into();
        assert!(matches!(
            params.ensure_settled(),
            Err(ProcessorError::PaymentPending(status)) if status == "wait_secure"
        ));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            decode_data("%%%not-base64%%%"),
            Err(ProcessorError::DataMalformed { parameter: "data", .. })
        ));
        // "[1,2]" is valid JSON but not an object
        assert!(matches!(
            decode_data("WzEsMl0="),
            Err(ProcessorError::DataMalformed { parameter: "data", .. })
        ));
        let map = decode_data("eyJvcmRlcl9pZCI6MX0=").unwrap();
        assert_eq!(map.get("order_id"), Some(&json!(1)));
    }

    #[test]
    fn long_values_are_truncated_in_errors() {
        let long = "A".repeat(200);
        let err = decode_data(&long).unwrap_err();
        let ProcessorError::DataMalformed { value, .. } = err else {
            panic!("unexpected error {err:?}");
        };
        assert!(value.len() < 100);
        assert!(value.ends_with("..."));
    }
}
