use std::{fmt::Display, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Cart,
    Purchased,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Cart => "cart",
            OrderStatus::Purchased => "purchased",
            OrderStatus::Refunded => "refunded",
        }
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownOrderStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownOrderStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cart" => Ok(Self::Cart),
            "purchased" => Ok(Self::Purchased),
            "refunded" => Ok(Self::Refunded),
            other => Err(UnknownOrderStatus(other.to_string())),
        }
    }
}

/// Billing information reported by the processor at purchase time.
///
/// Every field is best-effort: processors omit whatever the payer did not
/// fill in, so missing values are stored as empty strings.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingDetails {
    pub first: String,
    pub last: String,
    pub street1: String,
    pub street2: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postalcode: String,
    /// Trailing digits of the card number, `####` when none were reported
    pub ccnum: String,
    pub cardtype: String,
}

/// A cart that becomes a purchase record once the processor confirms payment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub status: OrderStatus,
    pub currency: String,
    pub total_cost: Decimal,
    pub billing: BillingDetails,
    /// JSON dump of the processor reply that purchased this order
    #[serde(skip_serializing)]
    pub processor_reply_dump: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub purchase_time: Option<OffsetDateTime>,
}

impl Order {
    /// True when the processor charged exactly the stored total in the stored currency.
    ///
    /// Amounts compare by value (`10.0 == 10.00`), currency codes compare
    /// case-insensitively.
    pub fn charge_matches(&self, amount: Decimal, currency: &str) -> bool {
        amount == self.total_cost && currency.eq_ignore_ascii_case(&self.currency)
    }

    /// Receipts are only shown to the owner once the order has been paid for.
    pub fn has_receipt_for(&self, user_id: i64) -> bool {
        self.user_id == user_id
            && matches!(self.status, OrderStatus::Purchased | OrderStatus::Refunded)
    }
}
