//! Payment Intent Model

use serde::{Deserialize, Serialize};

/// Gateway order created for a checkout; authorizes exactly one paid order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct PaymentIntentRecord {
    /// Gateway order id (`razorpay_order_id`)
    pub gateway_order_id: String,
    pub user_id: String,
    /// Minor units, as charged by the gateway
    pub amount: i64,
    pub currency: String,
    /// Set once the intent has produced an order
    pub order_id: Option<String>,
    pub created_at: i64,
}

impl PaymentIntentRecord {
    pub fn is_consumed(&self) -> bool {
        self.order_id.is_some()
    }
}
