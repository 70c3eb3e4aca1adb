//! 在线支付 (Razorpay)
//!
//! 1. `create_intent`: 按当前购物车计价，在网关创建远程订单并记录支付意图，返回给前端 checkout
//! 2. `verify_and_place`: 校验网关回传签名与支付意图，通过后以 ONLINE / PAID / PROCESSING 下单
//!
//! 每个支付意图只能产生一个订单；下单时重新计价，金额必须与网关收取的一致。

pub mod razorpay;
pub mod signature;

pub use razorpay::{GatewayError, GatewayOrder, PaymentGateway, RazorpayGateway};
pub use signature::{expected_signature, verify_payment_signature};

use serde::{Deserialize, Serialize};
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{Order, PaymentInfo, PaymentIntentRecord, ShippingAddress};
use shared::order::PriceBreakdown;
use shared::util::{new_id, now_millis};
use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::db::{Storage, payment_failed};
use crate::orders::OrderEngine;
use crate::security_log;

/// Gateway status recorded for a verified payment
pub const CAPTURED: &str = "captured";

/// `POST /api/payment/create-order` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub key_id: String,
    /// Minor units
    pub amount: i64,
    pub currency: String,
    pub gateway_order_id: String,
    pub prices: PriceBreakdown,
}

/// `POST /api/payment/verify`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
    pub shipping_address: Option<ShippingAddress>,
}

fn required(value: Option<String>, field: &str) -> AppResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::required(field))
}

pub struct PaymentService {
    gateway: Arc<dyn PaymentGateway>,
    key_secret: String,
    currency: String,
    orders: Arc<OrderEngine>,
    storage: Arc<dyn Storage>,
}

impl PaymentService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        key_secret: impl Into<String>,
        currency: impl Into<String>,
        orders: Arc<OrderEngine>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            gateway,
            key_secret: key_secret.into(),
            currency: currency.into(),
            orders,
            storage,
        }
    }

    pub async fn create_intent(&self, user: &CurrentUser) -> AppResult<PaymentIntent> {
        let draft = self.orders.quote(&user.id).await?;
        let receipt = new_id();
        let remote = self
            .gateway
            .create_order(draft.prices.total_minor_units(), &self.currency, &receipt)
            .await?;

        self.storage
            .insert_payment_intent(&PaymentIntentRecord {
                gateway_order_id: remote.id.clone(),
                user_id: user.id.clone(),
                amount: remote.amount,
                currency: remote.currency.clone(),
                order_id: None,
                created_at: now_millis(),
            })
            .await?;

        tracing::info!(
            user_id = %user.id,
            gateway_order_id = %remote.id,
            amount = remote.amount,
            "Payment intent created"
        );
        Ok(PaymentIntent {
            key_id: self.gateway.key_id().to_string(),
            amount: remote.amount,
            currency: remote.currency,
            gateway_order_id: remote.id,
            prices: draft.prices,
        })
    }

    pub async fn verify_and_place(
        &self,
        user: &CurrentUser,
        req: VerifyPaymentRequest,
    ) -> AppResult<Order> {
        let gateway_order_id = required(req.razorpay_order_id, "razorpay_order_id")?;
        let payment_id = required(req.razorpay_payment_id, "razorpay_payment_id")?;
        let signature = required(req.razorpay_signature, "razorpay_signature")?;
        let address = req
            .shipping_address
            .ok_or_else(|| AppError::required("shipping_address"))?;

        if let Err(reason) =
            verify_payment_signature(&self.key_secret, &gateway_order_id, &payment_id, &signature)
        {
            security_log!(
                "WARN",
                "payment_signature_invalid",
                user_id = user.id.clone(),
                gateway_order_id = gateway_order_id.clone(),
                reason = reason
            );
            return Err(AppError::with_message(
                ErrorCode::PaymentSignatureInvalid,
                "Invalid payment signature",
            ));
        }

        let intent = self
            .storage
            .get_payment_intent(&gateway_order_id)
            .await?
            .ok_or_else(|| payment_failed("Unknown payment order"))?;
        if intent.user_id != user.id {
            security_log!(
                "WARN",
                "payment_intent_foreign",
                user_id = user.id.clone(),
                gateway_order_id = gateway_order_id.clone(),
                owner = intent.user_id.clone()
            );
            return Err(payment_failed("Payment order belongs to another user"));
        }
        if intent.is_consumed() {
            security_log!(
                "WARN",
                "payment_replayed",
                user_id = user.id.clone(),
                gateway_order_id = gateway_order_id.clone(),
                payment_id = payment_id.clone()
            );
            return Err(payment_failed("Payment has already been used"));
        }

        let payment = PaymentInfo {
            id: payment_id,
            status: CAPTURED.to_string(),
            signature,
            gateway_order_id,
        };
        // 意图的核销在 commit_order 内完成，并发重放只有一个能成功
        self.orders
            .place_paid_order(user, address, payment, intent.amount)
            .await
    }
}
