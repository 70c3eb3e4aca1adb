//! 订单引擎与通知 outbox

pub mod engine;
pub mod outbox;

pub use engine::{OrderDraft, OrderEngine};
pub use outbox::{NotificationWorker, OUTBOX_CAPACITY, OrderNotice, Outbox};
