//! Shared types for the storefront
//!
//! Domain models, the unified error system, order pricing and status rules,
//! realtime message types and list response shapes. No I/O lives here.

pub mod error;
pub mod message;
pub mod models;
pub mod order;
pub mod response;
pub mod util;

// Re-exports
pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
pub use serde::{Deserialize, Serialize};
