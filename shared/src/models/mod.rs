//! Data models
//!
//! Shared between shop-server and the storefront / admin clients (via API).
//! All IDs are opaque strings, all timestamps are UTC milliseconds.

pub mod cart;
pub mod order;
pub mod payment;
pub mod product;
pub mod review;

// Re-exports
pub use cart::*;
pub use order::*;
pub use payment::*;
pub use product::*;
pub use review::*;
