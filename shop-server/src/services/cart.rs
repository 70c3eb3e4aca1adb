//! 购物车
//!
//! 每个变更都是存储层的单次原子操作；读出时再填充商品详情。

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{AddCartItem, Cart, CartItemView, CartView, UpdateCartItem};
use std::sync::Arc;

use crate::db::Storage;
use crate::validation::{MAX_LINE_QUANTITY, validate_quantity};

fn cart_item_not_found(product_id: &str) -> AppError {
    AppError::new(ErrorCode::CartItemNotFound).with_detail("product_id", product_id)
}

#[derive(Clone)]
pub struct CartService {
    storage: Arc<dyn Storage>,
}

impl CartService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Attach current product data; lines whose product is gone carry `None`
    async fn populate(&self, cart: Cart) -> AppResult<CartView> {
        let mut items = Vec::with_capacity(cart.items.len());
        for line in cart.items {
            let product = self.storage.get_product(&line.product_id).await?;
            items.push(CartItemView {
                product_id: line.product_id,
                quantity: line.quantity,
                product,
            });
        }
        Ok(CartView {
            user_id: cart.user_id,
            items,
            updated_at: cart.updated_at,
        })
    }

    pub async fn view(&self, user_id: &str) -> AppResult<CartView> {
        let cart = self.storage.get_cart(user_id).await?;
        self.populate(cart).await
    }

    pub async fn add(&self, user_id: &str, input: AddCartItem) -> AppResult<CartView> {
        let quantity = input.effective_quantity().min(MAX_LINE_QUANTITY);
        let product_id = input
            .product_id
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| AppError::required("product_id"))?;

        if self.storage.get_product(&product_id).await?.is_none() {
            return Err(AppError::with_message(
                ErrorCode::ProductNotFound,
                format!("Product not found: {product_id}"),
            ));
        }

        let cart = self
            .storage
            .add_cart_item(user_id, &product_id, quantity)
            .await?;
        tracing::debug!(user_id = %user_id, product_id = %product_id, quantity, "Cart item added");
        self.populate(cart).await
    }

    pub async fn update(&self, user_id: &str, input: UpdateCartItem) -> AppResult<CartView> {
        let product_id = input
            .product_id
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| AppError::required("product_id"))?;
        let quantity = input.quantity.ok_or_else(|| AppError::required("quantity"))?;
        validate_quantity(quantity)?;

        let cart = self
            .storage
            .set_cart_item(user_id, &product_id, quantity)
            .await?
            .ok_or_else(|| cart_item_not_found(&product_id))?;
        self.populate(cart).await
    }

    pub async fn remove(&self, user_id: &str, product_id: &str) -> AppResult<CartView> {
        let cart = self
            .storage
            .remove_cart_item(user_id, product_id)
            .await?
            .ok_or_else(|| cart_item_not_found(product_id))?;
        self.populate(cart).await
    }

    pub async fn clear(&self, user_id: &str) -> AppResult<CartView> {
        let cart = self.storage.clear_cart(user_id).await?;
        self.populate(cart).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{CatalogRepository, MemoryStorage};
    use shared::models::{DEFAULT_BRAND, Product};

    fn product(id: &str) -> Product {
        Product {
            id: id.into(),
            name: "Mug".into(),
            description: "d".into(),
            price: 100.0,
            stock: 5,
            category: "c".into(),
            brand: DEFAULT_BRAND.into(),
            images: vec![],
            is_featured: false,
            created_by: None,
            rating: 0.0,
            num_reviews: 0,
            created_at: 0,
            updated_at: 0,
        }
    }

    async fn service() -> CartService {
        let storage = Arc::new(MemoryStorage::new());
        storage.insert_product(&product("p1")).await.unwrap();
        CartService::new(storage)
    }

    #[tokio::test]
    async fn add_defaults_quantity_and_accumulates() {
        let svc = service().await;
        let view = svc
            .add(
                "u1",
                AddCartItem {
                    product_id: Some("p1".into()),
                    quantity: Some(0),
                },
            )
            .await
            .unwrap();
        assert_eq!(view.items[0].quantity, 1);
        assert!(view.items[0].product.is_some());

        let view = svc
            .add(
                "u1",
                AddCartItem {
                    product_id: Some("p1".into()),
                    quantity: Some(2),
                },
            )
            .await
            .unwrap();
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items[0].quantity, 3);
    }

    #[tokio::test]
    async fn add_unknown_product_rejected() {
        let svc = service().await;
        let err = svc
            .add(
                "u1",
                AddCartItem {
                    product_id: Some("ghost".into()),
                    quantity: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ProductNotFound);
        assert!(svc.view("u1").await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn update_requires_line_and_positive_quantity() {
        let svc = service().await;
        let err = svc
            .update(
                "u1",
                UpdateCartItem {
                    product_id: Some("p1".into()),
                    quantity: Some(2),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CartItemNotFound);

        let err = svc
            .update(
                "u1",
                UpdateCartItem {
                    product_id: Some("p1".into()),
                    quantity: Some(0),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CartInvalidQuantity);
    }

    #[tokio::test]
    async fn remove_and_clear() {
        let svc = service().await;
        svc.add(
            "u1",
            AddCartItem {
                product_id: Some("p1".into()),
                quantity: Some(1),
            },
        )
        .await
        .unwrap();

        assert!(svc.remove("u1", "p1").await.unwrap().items.is_empty());
        assert_eq!(
            svc.remove("u1", "p1").await.unwrap_err().code,
            ErrorCode::CartItemNotFound
        );
        assert!(svc.clear("u1").await.unwrap().items.is_empty());
    }
}
