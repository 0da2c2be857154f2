use std::path::Path;

use rust_decimal::Decimal;
use sqlx::{Sqlite, migrate::Migrator};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::order::{BillingDetails, Order, OrderStatus};

static MIGRATOR: Migrator = sqlx::migrate!(); // defaults to "./migrations"

#[derive(Debug, Clone)]
pub struct Db(sqlx::Pool<Sqlite>);

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    user_id: i64,
    status: String,
    currency: String,
    total_cost: String,
    bill_to_first: String,
    bill_to_last: String,
    bill_to_street1: String,
    bill_to_street2: String,
    bill_to_city: String,
    bill_to_state: String,
    bill_to_postalcode: String,
    bill_to_country: String,
    bill_to_ccnum: String,
    bill_to_cardtype: String,
    processor_reply_dump: String,
    purchase_time: Option<String>,
}

impl TryFrom<OrderRow> for Order {
    type Error = sqlx::Error;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<OrderStatus>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let total_cost = row
            .total_cost
            .parse::<Decimal>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let purchase_time = row
            .purchase_time
            .as_deref()
            .map(|t| OffsetDateTime::parse(t, &Rfc3339))
            .transpose()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(Order {
            id: row.id,
            user_id: row.user_id,
            status,
            currency: row.currency,
            total_cost,
            billing: BillingDetails {
                first: row.bill_to_first,
                last: row.bill_to_last,
                street1: row.bill_to_street1,
                street2: row.bill_to_street2,
                city: row.bill_to_city,
                state: row.bill_to_state,
                country: row.bill_to_country,
                postalcode: row.bill_to_postalcode,
                ccnum: row.bill_to_ccnum,
                cardtype: row.bill_to_cardtype,
            },
            processor_reply_dump: row.processor_reply_dump,
            purchase_time,
        })
    }
}

impl Db {
    pub async fn connect(database_url: &str) -> sqlx::Result<Self> {
        tracing::debug!(%database_url);
        if let Some(path) = database_url.strip_prefix("sqlite://").map(Path::new) {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::OpenOptions::new()
                .write(true)
                .truncate(false)
                .create(true)
                .open(path)
                .await?;
        }
        let pool = sqlx::Pool::connect(database_url).await?;
        MIGRATOR.run(&pool).await?;
        Ok(Self(pool))
    }

    pub async fn get_order(&self, order_id: i64) -> sqlx::Result<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as("SELECT * FROM shoppingcart_order WHERE id = ?")
            .bind(order_id)
            .fetch_optional(&self.0)
            .await?;
        row.map(Order::try_from).transpose()
    }

    pub async fn latest_purchased_for_user(&self, user_id: i64) -> sqlx::Result<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(
            "SELECT * FROM shoppingcart_order WHERE user_id = ? AND status = 'purchased' ORDER BY id DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.0)
        .await?;
        row.map(Order::try_from).transpose()
    }

    /// Moves a cart to `purchased`, storing billing details and the processor reply.
    ///
    /// Returns `false` when the order is no longer a cart, in which case nothing is written.
    pub async fn mark_purchased(
        &self,
        order_id: i64,
        billing: &BillingDetails,
        processor_reply_dump: &str,
        purchase_time: OffsetDateTime,
    ) -> sqlx::Result<bool> {
        let purchase_time = purchase_time
            .format(&Rfc3339)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let result = sqlx::query(
            "UPDATE shoppingcart_order SET status = 'purchased', \
             bill_to_first = ?, bill_to_last = ?, bill_to_street1 = ?, bill_to_street2 = ?, \
             bill_to_city = ?, bill_to_state = ?, bill_to_postalcode = ?, bill_to_country = ?, \
             bill_to_ccnum = ?, bill_to_cardtype = ?, processor_reply_dump = ?, purchase_time = ? \
             WHERE id = ? AND status = 'cart'",
        )
        .bind(&billing.first)
        .bind(&billing.last)
        .bind(&billing.street1)
        .bind(&billing.street2)
        .bind(&billing.city)
        .bind(&billing.state)
        .bind(&billing.postalcode)
        .bind(&billing.country)
        .bind(&billing.ccnum)
        .bind(&billing.cardtype)
        .bind(processor_reply_dump)
        .bind(purchase_time)
        .bind(order_id)
        .execute(&self.0)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
impl Db {
    /// Single-connection in-memory database with migrations applied.
    pub async fn in_memory() -> sqlx::Result<Self> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<std::time::Duration>)
            .max_lifetime(None::<std::time::Duration>)
            .connect("sqlite::memory:")
            .await?;
        MIGRATOR.run(&pool).await?;
        Ok(Self(pool))
    }

    pub async fn create_cart(
        &self,
        user_id: i64,
        currency: &str,
        total_cost: Decimal,
    ) -> sqlx::Result<Order> {
        let result = sqlx::query(
            "INSERT INTO shoppingcart_order (user_id, status, currency, total_cost) VALUES (?, 'cart', ?, ?)",
        )
        .bind(user_id)
        .bind(currency)
        .bind(total_cost.to_string())
        .execute(&self.0)
        .await?;
        let id = result.last_insert_rowid();
        self.get_order(id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn set_status(&self, order_id: i64, status: OrderStatus) -> sqlx::Result<()> {
        sqlx::query("UPDATE shoppingcart_order SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(order_id)
            .execute(&self.0)
            .await?;
        Ok(())
    }
}
