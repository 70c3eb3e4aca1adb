//! Order Model
//!
//! 订单一旦创建，行项目 (名称 / 图片 / 单价 / 数量) 即冻结，之后商品改价不影响历史订单。

use crate::order::{OrderStatus, PaymentMethod, PaymentStatus, PriceBreakdown};
use serde::{Deserialize, Serialize};

/// Frozen line item snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub image: String,
    /// Unit price at purchase time
    pub price: f64,
    pub quantity: i32,
}

/// 收货地址
///
/// Missing fields deserialize as empty strings and are rejected by validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub pincode: String,
    pub address_line1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
}

impl ShippingAddress {
    /// Required fields that are blank
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("full_name", &self.full_name),
            ("phone", &self.phone),
            ("pincode", &self.pincode),
            ("address_line1", &self.address_line1),
            ("city", &self.city),
            ("state", &self.state),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect()
    }
}

/// Gateway receipt attached to online orders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInfo {
    /// Gateway payment id
    pub id: String,
    pub status: String,
    pub signature: String,
    /// Gateway order the payment settled
    #[serde(default)]
    pub gateway_order_id: String,
}

/// Order entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    /// Customer display name at creation time
    pub customer_name: String,
    /// Notification address at creation time
    pub customer_email: String,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_info: Option<PaymentInfo>,
    pub items_price: f64,
    pub shipping_price: f64,
    pub tax_price: f64,
    pub total_price: f64,
    pub order_status: OrderStatus,
    pub delivered_at: Option<i64>,
    pub cancelled_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    pub fn prices(&self) -> PriceBreakdown {
        PriceBreakdown {
            items_price: self.items_price,
            shipping_price: self.shipping_price,
            tax_price: self.tax_price,
            total_price: self.total_price,
        }
    }

    /// Set the new status and its side effects.
    ///
    /// - `DELIVERED`: stamps `delivered_at`; a COD order becomes `PAID`
    /// - `CANCELLED`: stamps `cancelled_at`; payment status is left as is
    pub fn apply_status(&mut self, next: OrderStatus, now: i64) {
        self.order_status = next;
        self.updated_at = now;
        match next {
            OrderStatus::Delivered => {
                self.delivered_at = Some(now);
                if self.payment_method == PaymentMethod::Cod {
                    self.payment_status = PaymentStatus::Paid;
                }
            }
            OrderStatus::Cancelled => {
                self.cancelled_at = Some(now);
            }
            _ => {}
        }
    }
}

/// `POST /api/orders`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub shipping_address: Option<ShippingAddress>,
    pub payment_method: Option<String>,
}

/// `PUT /api/orders/{id}/status`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOrderStatus {
    pub status: Option<String>,
}

/// `GET /api/orders` (admin)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}
