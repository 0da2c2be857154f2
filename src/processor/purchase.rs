use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::{
    db::Db,
    order::{BillingDetails, Order, OrderStatus},
    processor::{
        ProcessorError, Result,
        callback::{CallbackPayload, ValidatedParams},
    },
};

/// Loads the order and checks the processor charged exactly its total.
pub async fn payment_accepted(
    db: &Db,
    order_id: i64,
    amount: Decimal,
    currency: &str,
) -> Result<Order> {
    let order = db
        .get_order(order_id)
        .await?
        .ok_or(ProcessorError::OrderNotFound(order_id))?;

    if order.charge_matches(amount, currency) {
        Ok(order)
    } else {
        Err(ProcessorError::AmountMismatch {
            charged: amount,
            currency: currency.to_string(),
            order: Box::new(order),
        })
    }
}

/// Everything from the first digit on, e.g. `xxxxxxxx1234` becomes `1234`.
fn card_suffix(card_number: &str) -> String {
    match card_number.find(|c: char| c.is_ascii_digit()) {
        Some(idx) => card_number[idx..].to_string(),
        None => "####".to_string(),
    }
}

fn billing_details(params: &ValidatedParams) -> BillingDetails {
    BillingDetails {
        first: params.text_or_default("req_bill_to_forename"),
        last: params.text_or_default("req_bill_to_surname"),
        street1: params.text_or_default("req_bill_to_address_line1"),
        street2: params.text_or_default("req_bill_to_address_line2"),
        city: params.text_or_default("req_bill_to_address_city"),
        state: params.text_or_default("req_bill_to_address_state"),
        country: params.text_or_default("req_bill_to_address_country"),
        postalcode: params.text_or_default("req_bill_to_address_postal_code"),
        ccnum: card_suffix(&params.text_or_default("req_card_number")),
        cardtype: params.text_or_default("req_card_type"),
    }
}

/// Marks the order purchased and stores billing details plus the processor reply.
///
/// An order that already left the cart state is returned as stored, a
/// repeated postback never overwrites the first one.
pub async fn record_purchase(
    db: &Db,
    payload: &CallbackPayload,
    params: &ValidatedParams,
    order: Order,
) -> Result<Order> {
    let billing = billing_details(params);
    let dump = payload.reply_dump(&params.data);
    let purchase_time = OffsetDateTime::now_utc();

    tracing::info!(order_id = order.id, status = %order.status, "Recording purchase");
    if db
        .mark_purchased(order.id, &billing, &dump, purchase_time)
        .await?
    {
        tracing::info!(order_id = order.id, "Order purchased");
        return Ok(Order {
            status: OrderStatus::Purchased,
            billing,
            processor_reply_dump: dump,
            purchase_time: Some(purchase_time),
            ..order
        });
    }

    tracing::warn!(
        order_id = order.id,
        status = %order.status,
        "Duplicate postback for an order that is no longer a cart, keeping stored purchase"
    );
    Ok(db.get_order(order.id).await?.unwrap_or(order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::{Value, json};

    fn params(order_id: i64, amount: Decimal, currency: &str, extra: Value) -> ValidatedParams {
        let mut data = json!({
            "order_id": order_id,
            "currency": currency,
            "status": "success",
            "amount": amount.to_string(),
        });
        if let (Value::Object(base), Value::Object(extra)) = (&mut data, extra) {
            base.extend(extra);
        }
        let Value::Object(data) = data else {
            unreachable!()
        };
        ValidatedParams::from_data(data).unwrap()
    }

    fn payload(extra: &[(&str, &str)]) -> CallbackPayload {
        CallbackPayload {
            status: "success".into(),
            data: "e30=".into(),
            signature: "sig".into(),
            extra: extra
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn card_suffix_extraction() {
        assert_eq!(card_suffix("xxxxxxxx1234"), "1234");
        assert_eq!(card_suffix("4111"), "4111");
        assert_eq!(card_suffix("xxxx"), "####");
        assert_eq!(card_suffix(""), "####");
    }

    #[tokio::test]
    async fn accepts_matching_amount_any_currency_case() {
        let db = Db::in_memory().await.unwrap();
        let cart = db.create_cart(1, "USD", dec!(10.00)).await.unwrap();

        let order = payment_accepted(&db, cart.id, dec!(10.00), "usd").await.unwrap();
        assert_eq!(order.id, cart.id);
    }

    #[tokio::test]
    async fn rejects_wrong_amount_with_order() {
        let db = Db::in_memory().await.unwrap();
        let cart = db.create_cart(1, "USD", dec!(10.00)).await.unwrap();

        let err = payment_accepted(&db, cart.id, dec!(9.99), "USD")
            .await
            .unwrap_err();
        match err {
            ProcessorError::AmountMismatch { charged, order, .. } => {
                assert_eq!(charged, dec!(9.99));
                assert_eq!(order.id, cart.id);
            }
            other => panic!("unexpected error {other:?}"),
        }

        let err = payment_accepted(&db, cart.id, dec!(10.00), "EUR")
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessorError::AmountMismatch { .. }));
    }

    #[tokio::test]
    async fn unknown_order() {
        let db = Db::in_memory().await.unwrap();
        let err = payment_accepted(&db, 999, dec!(1), "usd").await.unwrap_err();
        assert!(matches!(err, ProcessorError::OrderNotFound(999)));
    }

    #[tokio::test]
    async fn record_purchase_stores_billing_and_dump() {
        let db = Db::in_memory().await.unwrap();
        let cart = db.create_cart(1, "usd", dec!(40)).await.unwrap();
        let params = params(
            cart.id,
            dec!(40),
            "usd",
            json!({
                "req_bill_to_forename": "Ada",
                "req_bill_to_surname": "Lovelace",
                "req_bill_to_address_city": "London",
                "req_card_number": "xxxxxxxx4242",
                "req_card_type": "001",
                "liqpay_order_id": "LP-1",
            }),
        );

        let payload = payload(&[("liqpay_txn", "T-9")]);

        let order = record_purchase(&db, &payload, &params, cart).await.unwrap();
        assert_eq!(order.status, OrderStatus::Purchased);

        let stored = db.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Purchased);
        assert_eq!(stored.billing.first, "Ada");
        assert_eq!(stored.billing.last, "Lovelace");
        assert_eq!(stored.billing.city, "London");
        assert_eq!(stored.billing.street1, "");
        assert_eq!(stored.billing.ccnum, "4242");
        assert_eq!(stored.billing.cardtype, "001");
        assert!(stored.purchase_time.is_some());

        let dump: Value = serde_json::from_str(&stored.processor_reply_dump).unwrap();
        assert_eq!(dump["liqpay_txn"], "T-9");
        assert_eq!(dump["signature"], "sig");
        assert_eq!(dump["data"], "e30=");
        assert_eq!(dump["decoded"], Value::Object(params.data.clone()));
        assert_eq!(dump["decoded"]["req_card_number"], "xxxxxxxx4242");
        assert_eq!(dump["decoded"]["liqpay_order_id"], "LP-1");
    }

    #[tokio::test]
    async fn second_record_keeps_first_purchase() {
        let db = Db::in_memory().await.unwrap();
        let cart = db.create_cart(1, "usd", dec!(5)).await.unwrap();

        let first = params(cart.id, dec!(5), "usd", json!({"req_bill_to_forename": "Ada"}));
        let second = params(cart.id, dec!(5), "usd", json!({"req_bill_to_forename": "Eve"}));

        let payload = payload(&[]);

        let purchased = record_purchase(&db, &payload, &first, cart.clone())
            .await
            .unwrap();
        let again = record_purchase(&db, &payload, &second, cart).await.unwrap();

        assert_eq!(again.status, OrderStatus::Purchased);
        assert_eq!(again.billing.first, "Ada");
        assert_eq!(again.processor_reply_dump, purchased.processor_reply_dump);
    }
}
