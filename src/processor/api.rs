use axum::{
    Form, Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    db::Db,
    order::Order,
    processor::{LiqPay, ProcessorError, callback::CallbackPayload, mask},
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct PostpayResponse {
    success: bool,
    order: Option<Order>,
    error: String,
}

impl PostpayResponse {
    pub fn success(order: Order) -> Self {
        Self {
            success: true,
            order: Some(order),
            error: String::new(),
        }
    }

    pub fn failure(order: Option<Order>, error: String) -> Self {
        Self {
            success: false,
            order,
            error,
        }
    }
}

impl IntoResponse for PostpayResponse {
    fn into_response(self) -> Response {
        let status = if self.success {
            StatusCode::OK
        } else {
            StatusCode::NOT_FOUND
        };
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct PollQuery {
    user_id: i64,
}

/// Latest purchase of a user, polled by the browser after the processor redirect.
#[instrument(skip_all)]
async fn poll_handler(
    State(db): State<Db>,
    Query(PollQuery { user_id }): Query<PollQuery>,
) -> Response {
    match db.latest_purchased_for_user(user_id).await {
        Ok(Some(order)) => PostpayResponse::success(order).into_response(),
        Ok(None) => {
            tracing::debug!(user_id, "No purchased order for user");
            PostpayResponse::failure(None, "no purchased order found".to_string()).into_response()
        }
        Err(e) => ProcessorError::from(e).into_response(),
    }
}

#[instrument(skip_all)]
async fn callback_handler(
    State(db): State<Db>,
    State(processor): State<LiqPay>,
    Form(payload): Form<CallbackPayload>,
) -> Result<PostpayResponse, ProcessorError> {
    tracing::trace!(
        data = %mask::secure_serializable(&payload),
        "Received postback from payment processor"
    );
    let order = processor.process_postpay_callback(&db, &payload).await?;
    tracing::info!(order_id = order.id, "Postback accepted");
    Ok(PostpayResponse::success(order))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route(
        "/shoppingcart/postpay_callback",
        get(poll_handler).post(callback_handler),
    )
}
