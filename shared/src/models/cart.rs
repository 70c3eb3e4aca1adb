//! Cart Model

use super::product::Product;
use serde::{Deserialize, Serialize};

/// One (product, quantity) pair, unique per product within a cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: String,
    /// Always >= 1
    pub quantity: i32,
}

/// Per-user cart (1:1 with the user, created lazily)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub user_id: String,
    pub items: Vec<CartLine>,
    pub updated_at: i64,
}

impl Cart {
    pub fn empty(user_id: impl Into<String>, now: i64) -> Self {
        Self {
            user_id: user_id.into(),
            items: Vec::new(),
            updated_at: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Cart line populated with the live product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemView {
    pub product_id: String,
    pub quantity: i32,
    /// `None` when the product was deleted after it was added
    pub product: Option<Product>,
}

/// Cart as returned to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartView {
    pub user_id: String,
    pub items: Vec<CartItemView>,
    pub updated_at: i64,
}

/// `POST /api/cart`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddCartItem {
    pub product_id: Option<String>,
    /// Missing or < 1 means 1
    pub quantity: Option<i32>,
}

impl AddCartItem {
    pub fn effective_quantity(&self) -> i32 {
        self.quantity.filter(|q| *q >= 1).unwrap_or(1)
    }
}

/// `PUT /api/cart`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCartItem {
    pub product_id: Option<String>,
    pub quantity: Option<i32>,
}
