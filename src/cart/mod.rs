use rust_decimal::Decimal;
use serde::Serialize;

use crate::{order::Order, processor::ProcessorError};

pub mod api;

pub type Result<T> = std::result::Result<T, CartError>;

#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error("order not found")]
    NotFound,
    #[error(transparent)]
    Processor(#[from] ProcessorError),
}

impl From<sqlx::Error> for CartError {
    fn from(value: sqlx::Error) -> Self {
        Self::Processor(value.into())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl axum::response::IntoResponse for CartError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match &self {
            CartError::NotFound => (axum::http::StatusCode::NOT_FOUND, self.to_string()),
            CartError::Processor(e) => {
                let status = e.status_code();
                if status.is_server_error() {
                    tracing::error!("Cart request failed: {e}");
                }
                (status, e.user_message())
            }
        };
        (status, axum::Json(ErrorBody { error })).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct BilledTo {
    pub first_name: String,
    pub last_name: String,
    pub street1: String,
    pub street2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// Receipt of a paid order as rendered to its owner.
#[derive(Debug, Serialize)]
pub struct Receipt {
    #[serde(rename = "orderNum")]
    pub order_num: i64,
    pub currency: String,
    pub status: crate::order::OrderStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub purchase_datetime: Option<time::OffsetDateTime>,
    pub billed_to: BilledTo,
    pub total_cost: Decimal,
}

impl From<Order> for Receipt {
    fn from(order: Order) -> Self {
        let billing = order.billing;
        Self {
            order_num: order.id,
            currency: order.currency,
            status: order.status,
            purchase_datetime: order.purchase_time,
            billed_to: BilledTo {
                first_name: billing.first,
                last_name: billing.last,
                street1: billing.street1,
                street2: billing.street2,
                city: billing.city,
                state: billing.state,
                postal_code: billing.postalcode,
                country: billing.country,
            },
            total_cost: order.total_cost,
        }
    }
}
