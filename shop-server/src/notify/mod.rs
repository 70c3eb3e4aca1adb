//! 通知扇出: 邮件 + WebSocket 实时推送

pub mod email;
pub mod live;

pub use email::{LogMailer, Mailer, OutgoingEmail, SesMailer};
pub use live::{LiveHub, LiveSubscription};
