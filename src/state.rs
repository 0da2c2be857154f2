use crate::{db::Db, processor::LiqPay};

#[derive(Debug, Clone, axum::extract::FromRef)]
pub struct AppState {
    pub db: Db,
    pub processor: LiqPay,
}

impl AppState {
    pub fn new(db: Db, processor: LiqPay) -> Self {
        Self { db, processor }
    }
}
