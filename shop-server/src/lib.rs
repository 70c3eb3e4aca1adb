//! shop-server — 店铺订单 / 支付服务
//!
//! # 模块结构
//!
//! - [`config`] - 环境变量配置
//! - [`logger`] - tracing 初始化
//! - [`auth`] - JWT 校验与提取器
//! - [`db`] - 存储层 (PostgreSQL / 内存)
//! - [`services`] - 目录、购物车、评论
//! - [`orders`] - 下单引擎、状态机执行、通知 outbox
//! - [`payment`] - Razorpay 网关与签名校验
//! - [`notify`] - 邮件与实时推送
//! - [`api`] - HTTP / WebSocket 路由

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod logger;
pub mod notify;
pub mod orders;
pub mod payment;
pub mod services;
pub mod state;
pub mod validation;

pub use config::Config;
pub use state::AppState;

// Security logging macro - 支持 tracing 格式说明符
#[macro_export]
macro_rules! security_log {
    ($level:expr, $event:expr, $($key:ident = $value:expr),*) => {
        tracing::info!(
            target: "security",
            level = $level,
            event = $event,
            $($key = $value),*
        );
    };
}
