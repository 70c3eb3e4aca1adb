//! Order domain rules shared by the server and its clients
//!
//! - [`pricing`]: items / shipping / tax / total computation
//! - [`status`]: order & payment status enums, transition table

pub mod pricing;
pub mod status;

pub use pricing::{PriceBreakdown, compute_prices};
pub use status::{OrderStatus, PaymentMethod, PaymentStatus, TransitionPolicy};
