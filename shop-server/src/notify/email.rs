//! 订单邮件
//!
//! - [`SesMailer`]: AWS SES v2 (生产)
//! - [`LogMailer`]: 只写日志 (开发 / `EMAIL_BACKEND=log`)

use async_trait::async_trait;
use aws_sdk_sesv2::Client as SesClient;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use shared::models::Order;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), BoxError>;
}

pub fn order_placed_email(order: &Order) -> OutgoingEmail {
    OutgoingEmail {
        to: order.customer_email.clone(),
        subject: format!("Order Placed Successfully (#{})", order.id),
        body: format!(
            "Hi {}, your order has been placed successfully. Total: ₹{}.",
            order.customer_name, order.total_price
        ),
    }
}

pub fn status_updated_email(order: &Order) -> OutgoingEmail {
    OutgoingEmail {
        to: order.customer_email.clone(),
        subject: format!("Order Status Updated (#{})", order.id),
        body: format!(
            "Hi {}, your order status is now: {}.",
            order.customer_name, order.order_status
        ),
    }
}

pub struct SesMailer {
    client: SesClient,
    from: String,
}

impl SesMailer {
    pub fn new(client: SesClient, from: impl Into<String>) -> Self {
        Self {
            client,
            from: from.into(),
        }
    }
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), BoxError> {
        let subject = Content::builder().data(&email.subject).build()?;
        let body = Body::builder()
            .text(Content::builder().data(&email.body).build()?)
            .build();
        let message = Message::builder().subject(subject).body(body).build();

        self.client
            .send_email()
            .from_email_address(&self.from)
            .destination(Destination::builder().to_addresses(&email.to).build())
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await?;

        tracing::info!(to = %email.to, subject = %email.subject, "Order email sent");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), BoxError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            body = %email.body,
            "Email (log backend)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{OrderItem, ShippingAddress};
    use shared::order::{OrderStatus, PaymentMethod, PaymentStatus};

    fn order() -> Order {
        Order {
            id: "o-42".into(),
            user_id: "u1".into(),
            customer_name: "Asha".into(),
            customer_email: "asha@example.com".into(),
            items: vec![OrderItem {
                product_id: "p1".into(),
                name: "Mug".into(),
                image: String::new(),
                price: 500.0,
                quantity: 3,
            }],
            shipping_address: ShippingAddress::default(),
            payment_method: PaymentMethod::Cod,
            payment_status: PaymentStatus::Pending,
            payment_info: None,
            items_price: 1500.0,
            shipping_price: 0.0,
            tax_price: 270.0,
            total_price: 1770.0,
            order_status: OrderStatus::Shipped,
            delivered_at: None,
            cancelled_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn placed_email_carries_total() {
        let email = order_placed_email(&order());
        assert_eq!(email.to, "asha@example.com");
        assert_eq!(email.subject, "Order Placed Successfully (#o-42)");
        assert!(email.body.contains("₹1770"));
    }

    #[test]
    fn status_email_carries_status() {
        let email = status_updated_email(&order());
        assert_eq!(email.subject, "Order Status Updated (#o-42)");
        assert!(email.body.ends_with("now: SHIPPED."));
    }

    #[tokio::test]
    async fn log_mailer_never_fails() {
        assert!(LogMailer.send(&order_placed_email(&order())).await.is_ok());
    }
}
