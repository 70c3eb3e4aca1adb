//! 订单通知 outbox
//!
//! 订单事务提交后，业务层只把 [`OrderNotice`] 放进有界 mpsc；
//! [`NotificationWorker`] 在后台 task 中消费，先推送实时事件再发邮件。
//! 任何通知失败只记录 `warn`，不影响已提交的订单。

use crate::notify::email::{order_placed_email, status_updated_email};
use crate::notify::{LiveHub, Mailer, OutgoingEmail};
use shared::message::{OrderEvent, ServerMessage, Topic};
use shared::models::Order;
use shared::order::PaymentStatus;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

pub const OUTBOX_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub enum OrderNotice {
    Placed(Box<Order>),
    StatusUpdated(Box<Order>),
}

/// Producer side, cloned into every service that commits orders
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::Sender<OrderNotice>,
}

impl Outbox {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OrderNotice>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Never blocks; a full or closed outbox drops the notice
    pub fn enqueue(&self, notice: OrderNotice) {
        match self.tx.try_send(notice) {
            Ok(()) => {}
            Err(TrySendError::Full(n)) => {
                tracing::warn!(order_id = %notice_order(&n).id, "Notification outbox full, notice dropped");
            }
            Err(TrySendError::Closed(n)) => {
                tracing::warn!(order_id = %notice_order(&n).id, "Notification worker stopped, notice dropped");
            }
        }
    }
}

fn notice_order(notice: &OrderNotice) -> &Order {
    match notice {
        OrderNotice::Placed(o) | OrderNotice::StatusUpdated(o) => o,
    }
}

fn order_event(order: &Order) -> OrderEvent {
    OrderEvent {
        order_id: order.id.clone(),
        status: order.order_status,
        payment_status: order.payment_status,
        timestamp: order.updated_at,
    }
}

pub struct NotificationWorker {
    rx: mpsc::Receiver<OrderNotice>,
    mailer: Arc<dyn Mailer>,
    hub: LiveHub,
}

impl NotificationWorker {
    pub fn new(rx: mpsc::Receiver<OrderNotice>, mailer: Arc<dyn Mailer>, hub: LiveHub) -> Self {
        Self { rx, mailer, hub }
    }

    /// Drain until every [`Outbox`] handle is dropped
    pub async fn run(mut self) {
        tracing::info!("Notification worker started");
        while let Some(notice) = self.rx.recv().await {
            self.dispatch(notice).await;
        }
        tracing::info!("Notification worker stopped");
    }

    pub async fn dispatch(&self, notice: OrderNotice) {
        match notice {
            OrderNotice::Placed(order) => {
                let event = order_event(&order);
                self.hub.publish(
                    &Topic::User(order.user_id.clone()),
                    ServerMessage::OrderCreated(event.clone()),
                );
                // 在线支付的订单创建即进入 PROCESSING
                if order.payment_status == PaymentStatus::Paid {
                    self.hub.publish(
                        &Topic::Order(order.id.clone()),
                        ServerMessage::OrderStatusUpdated(event),
                    );
                }
                self.send_email(order_placed_email(&order)).await;
            }
            OrderNotice::StatusUpdated(order) => {
                let event = order_event(&order);
                self.hub.publish(
                    &Topic::User(order.user_id.clone()),
                    ServerMessage::OrderStatusUpdated(event.clone()),
                );
                self.hub.publish(
                    &Topic::Order(order.id.clone()),
                    ServerMessage::OrderStatusUpdated(event),
                );
                self.send_email(status_updated_email(&order)).await;
            }
        }
    }

    async fn send_email(&self, email: OutgoingEmail) {
        if email.to.is_empty() {
            tracing::debug!(subject = %email.subject, "No recipient, email skipped");
            return;
        }
        if let Err(e) = self.mailer.send(&email).await {
            tracing::warn!(to = %email.to, subject = %email.subject, error = %e, "Failed to send order email");
        }
    }
}
