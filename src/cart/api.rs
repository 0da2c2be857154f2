use axum::{
    Json,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;

use crate::{
    cart::{CartError, Receipt, Result},
    db::Db,
    order::OrderStatus,
    processor::{LiqPay, form::PurchaseForm},
    state::AppState,
};

#[derive(Debug, Deserialize)]
struct OwnerQuery {
    user_id: i64,
}

#[derive(Debug, Deserialize)]
struct PurchaseFormQuery {
    user_id: i64,
    course_id: Option<String>,
}

#[instrument(skip_all)]
async fn receipt(
    State(db): State<Db>,
    Path(order_id): Path<i64>,
    Query(OwnerQuery { user_id }): Query<OwnerQuery>,
) -> Result<Json<Receipt>> {
    let order = db.get_order(order_id).await?.ok_or(CartError::NotFound)?;
    if !order.has_receipt_for(user_id) {
        tracing::debug!(order_id, user_id, status = %order.status, "Receipt is not available");
        return Err(CartError::NotFound);
    }
    Ok(Json(order.into()))
}

/// Signed parameters the client posts to the processor to pay for a cart.
#[instrument(skip_all)]
async fn purchase_form(
    State(db): State<Db>,
    State(processor): State<LiqPay>,
    Path(order_id): Path<i64>,
    Query(PurchaseFormQuery { user_id, course_id }): Query<PurchaseFormQuery>,
) -> Result<Json<PurchaseForm>> {
    let order = db.get_order(order_id).await?.ok_or(CartError::NotFound)?;
    if order.user_id != user_id || order.status != OrderStatus::Cart {
        return Err(CartError::NotFound);
    }
    let extra_data = match course_id {
        Some(course_id) => vec![course_id, "donation_course".to_string()],
        None => vec![String::new(), "donation_general".to_string()],
    };
    let form = processor.purchase_form(&order, &extra_data)?;
    tracing::info!(order_id, "Issued purchase form");
    Ok(Json(form))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/shoppingcart/receipt/{order_id}", get(receipt))
        .route("/shoppingcart/purchase_form/{order_id}", post(purchase_form))
}
