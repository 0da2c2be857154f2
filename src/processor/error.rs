use axum::{Json, http::StatusCode, response::IntoResponse};
use rust_decimal::Decimal;

use crate::{order::Order, processor::api::PostpayResponse};

#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("the payment was cancelled or declined")]
    TransactionFailed,
    #[error("the payment processor did not return a required parameter: {0}")]
    DataMissing(&'static str),
    #[error("the payment processor returned a badly-typed value {value} for parameter {parameter}")]
    DataMalformed {
        parameter: &'static str,
        value: String,
    },
    #[error("the signature returned by the payment processor does not match the payload")]
    SignatureMismatch,
    #[error("the payment processor accepted an order whose number is not in our system: {0}")]
    OrderNotFound(i64),
    #[error(
        "the amount charged by the processor {charged} {currency} is different than the total cost of the order {} {}",
        .order.total_cost,
        .order.currency
    )]
    AmountMismatch {
        charged: Decimal,
        currency: String,
        order: Box<Order>,
    },
    #[error("the payment is not settled yet, processor status: {0}")]
    PaymentPending(String),
    #[error("processor private key is not configured")]
    PrivateKeyAbsent,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to encode processor payload: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl ProcessorError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::TransactionFailed => StatusCode::PAYMENT_REQUIRED,
            Self::DataMissing(_) | Self::DataMalformed { .. } => StatusCode::BAD_REQUEST,
            Self::SignatureMismatch => StatusCode::UNAUTHORIZED,
            Self::OrderNotFound(_) => StatusCode::NOT_FOUND,
            Self::AmountMismatch { .. } => StatusCode::CONFLICT,
            Self::PaymentPending(_) => StatusCode::ACCEPTED,
            Self::PrivateKeyAbsent | Self::Database(_) | Self::Encoding(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The order the failure relates to, when it got far enough to load one.
    pub fn order(&self) -> Option<&Order> {
        match self {
            Self::AmountMismatch { order, .. } => Some(order.as_ref()),
            _ => None,
        }
    }

    /// Message safe to show to the payer.
    pub fn user_message(&self) -> String {
        match self {
            Self::PrivateKeyAbsent | Self::Database(_) | Self::Encoding(_) => {
                "the payment could not be processed because of an internal error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ProcessorError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Postback processing failed: {self}");
        } else {
            tracing::warn!(%status, "Postback rejected: {self}");
        }
        let body = PostpayResponse::failure(self.order().cloned(), self.user_message());
        (status, Json(body)).into_response()
    }
}
