//! 认证模块
//!
//! # 模块结构
//!
//! - [`jwt`]: JWT 校验, Claims, [`CurrentUser`]
//! - [`extractor`]: Axum 提取器 ([`CurrentUser`], [`AdminUser`])

pub mod extractor;
pub mod jwt;

pub use extractor::{AdminUser, authenticate};
pub use jwt::{Claims, CurrentUser, JwtConfig, JwtError, JwtService};
