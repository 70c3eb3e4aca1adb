//! 实时通知消息类型定义
//!
//! WebSocket 帧均为 JSON，采用 `{ "event": ..., "data": ... }` 结构，
//! 在 shop-server 与前端 (店铺 / 管理后台) 之间共享。
//!
//! 订阅主题:
//! - `user_{user_id}`: 该用户所有订单的创建 / 状态变更
//! - `order_{order_id}`: 单个订单的状态变更

use crate::order::{OrderStatus, PaymentStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Realtime subscription topic
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    User(String),
    Order(String),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::User(id) => write!(f, "user_{id}"),
            Topic::Order(id) => write!(f, "order_{id}"),
        }
    }
}

/// Payload of both order events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub timestamp: i64,
}

/// Client -> server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientCommand {
    JoinUserRoom { user_id: String },
    JoinOrderRoom { order_id: String },
    Ping,
}

/// Server -> client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    OrderCreated(OrderEvent),
    OrderStatusUpdated(OrderEvent),
    /// Subscription acknowledged
    Joined { topic: String },
    Error { code: u16, message: String },
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_names() {
        assert_eq!(Topic::User("u1".into()).to_string(), "user_u1");
        assert_eq!(Topic::Order("o9".into()).to_string(), "order_o9");
    }

    #[test]
    fn test_client_command_wire_format() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"event":"joinOrderRoom","data":{"order_id":"o1"}}"#).unwrap();
        assert_eq!(
            cmd,
            ClientCommand::JoinOrderRoom {
                order_id: "o1".into()
            }
        );

        let cmd: ClientCommand = serde_json::from_str(r#"{"event":"ping"}"#).unwrap();
        assert_eq!(cmd, ClientCommand::Ping);

        assert!(serde_json::from_str::<ClientCommand>(r#"{"event":"leave"}"#).is_err());
    }

    #[test]
    fn test_server_event_wire_format() {
        let msg = ServerMessage::OrderCreated(OrderEvent {
            order_id: "o1".into(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            timestamp: 10,
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["event"], "orderCreated");
        assert_eq!(json["data"]["order_id"], "o1");
        assert_eq!(json["data"]["status"], "PENDING");
    }
}
