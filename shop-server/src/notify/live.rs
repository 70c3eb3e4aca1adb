//! LiveHub — 订单实时分发
//!
//! ```text
//! NotificationWorker
//!       │ publish(topic, ServerMessage)
//!       ▼
//! LiveHub
//!   └── topics: topic → broadcast::Sender<ServerMessage>
//!         │
//!         ▼
//!   WS handler (subscribe → 转发到 socket)
//! ```
//!
//! 投递语义为 at-most-once：无订阅者时丢弃，落后的订阅者会丢失事件。
//! 最后一个 [`LiveSubscription`] 释放时 topic 条目随之删除。

use dashmap::DashMap;
use shared::message::{ServerMessage, Topic};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Broadcast channel 容量 — 足以缓冲连接时突发
const BROADCAST_CAPACITY: usize = 256;

#[derive(Clone, Default)]
pub struct LiveHub {
    /// topic name → sender
    topics: Arc<DashMap<String, broadcast::Sender<ServerMessage>>>,
}

impl LiveHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// 订阅 topic (不存在则创建)
    pub fn subscribe(&self, topic: &Topic) -> LiveSubscription {
        let name = topic.to_string();
        // entry guard 持有期间 subscribe，与 Drop 中的 remove_if 互斥
        let rx = self
            .topics
            .entry(name.clone())
            .or_insert_with(|| broadcast::channel(BROADCAST_CAPACITY).0)
            .subscribe();
        LiveSubscription {
            rx: Some(rx),
            name,
            topics: self.topics.clone(),
        }
    }

    /// 推送到 topic，返回收到消息的订阅者数量
    pub fn publish(&self, topic: &Topic, message: ServerMessage) -> usize {
        let name = topic.to_string();
        let delivered = match self.topics.get(&name) {
            Some(tx) => tx.send(message).unwrap_or(0),
            None => return 0,
        };

        if delivered == 0 {
            // 订阅者全部断开，清理 topic 条目
            self.topics
                .remove_if(&name, |_, tx| tx.receiver_count() == 0);
        }
        tracing::debug!(topic = %name, delivered, "Live event published");
        delivered
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

/// Receiver side of one topic; removes the topic entry when it is the last one
pub struct LiveSubscription {
    rx: Option<broadcast::Receiver<ServerMessage>>,
    name: String,
    topics: Arc<DashMap<String, broadcast::Sender<ServerMessage>>>,
}

impl LiveSubscription {
    pub fn topic(&self) -> &str {
        &self.name
    }

    pub async fn recv(&mut self) -> Result<ServerMessage, broadcast::error::RecvError> {
        match self.rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => Err(broadcast::error::RecvError::Closed),
        }
    }

    pub fn try_recv(&mut self) -> Result<ServerMessage, broadcast::error::TryRecvError> {
        match self.rx.as_mut() {
            Some(rx) => rx.try_recv(),
            None => Err(broadcast::error::TryRecvError::Closed),
        }
    }
}

impl Drop for LiveSubscription {
    fn drop(&mut self) {
        // receiver 先释放，receiver_count 才不包含自己
        drop(self.rx.take());
        self.topics
            .remove_if(&self.name, |_, tx| tx.receiver_count() == 0);
    }
}
