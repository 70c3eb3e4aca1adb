//! In-memory storage (DashMap)
//!
//! 用于开发模式与测试。所有修改商品行 (库存 / 评分 / 管理员编辑) 的操作
//! 都在 `write_lock` 下执行，因此下单的库存检查与扣减不可分割。

use async_trait::async_trait;
use dashmap::DashMap;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{
    Cart, CartLine, Order, PaymentInfo, PaymentIntentRecord, Product, ProductQuery, ProductSort,
    RatingSummary, Review, SortOrder,
};
use shared::order::OrderStatus;
use shared::response::PageWindow;
use shared::util::now_millis;
use std::cmp::Ordering;
use tokio::sync::Mutex;

use super::{CartRepository, CatalogRepository, OrderRepository, ReviewRepository, payment_failed};
use crate::validation::MAX_LINE_QUANTITY;

#[derive(Default)]
pub struct MemoryStorage {
    products: DashMap<String, Product>,
    /// product_id -> reviews
    reviews: DashMap<String, Vec<Review>>,
    /// user_id -> cart
    carts: DashMap<String, Cart>,
    orders: DashMap<String, Order>,
    /// gateway_order_id -> intent
    intents: DashMap<String, PaymentIntentRecord>,
    write_lock: Mutex<()>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn set_rating(&self, product_id: &str, summary: RatingSummary) {
        if let Some(mut product) = self.products.get_mut(product_id) {
            product.rating = summary.rating;
            product.num_reviews = summary.num_reviews;
            product.updated_at = now_millis();
        }
    }

    /// Caller holds `write_lock`
    fn check_payment(&self, order: &Order, info: &PaymentInfo) -> AppResult<()> {
        let intent = self
            .intents
            .get(&info.gateway_order_id)
            .ok_or_else(|| payment_failed("Unknown payment order"))?;
        if intent.user_id != order.user_id {
            return Err(payment_failed("Payment order belongs to another user"));
        }
        let reused = self.orders.iter().any(|o| {
            o.payment_info
                .as_ref()
                .is_some_and(|p| p.id == info.id)
        });
        if intent.is_consumed() || reused {
            return Err(payment_failed("Payment has already been used"));
        }
        Ok(())
    }
}

fn compare_products(a: &Product, b: &Product, sort: ProductSort) -> Ordering {
    let primary = match sort {
        ProductSort::CreatedAt => a.created_at.cmp(&b.created_at),
        ProductSort::Price => a.price.total_cmp(&b.price),
        ProductSort::Rating => a.rating.total_cmp(&b.rating),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

fn page<T>(items: Vec<T>, window: PageWindow) -> Vec<T> {
    items
        .into_iter()
        .skip(window.offset() as usize)
        .take(window.limit as usize)
        .collect()
}

fn newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}

#[async_trait]
impl CatalogRepository for MemoryStorage {
    async fn list_products(
        &self,
        query: &ProductQuery,
        window: PageWindow,
    ) -> AppResult<(Vec<Product>, u64)> {
        let mut matched: Vec<Product> = self
            .products
            .iter()
            .filter(|p| query.matches(p.value()))
            .map(|p| p.value().clone())
            .collect();

        let sort = query.sort_by.unwrap_or_default();
        let order = query.sort_order.unwrap_or_default();
        matched.sort_by(|a, b| {
            let ord = compare_products(a, b, sort);
            match order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        let total = matched.len() as u64;
        Ok((page(matched, window), total))
    }

    async fn get_product(&self, id: &str) -> AppResult<Option<Product>> {
        Ok(self.products.get(id).map(|p| p.value().clone()))
    }

    async fn insert_product(&self, product: &Product) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        if self.products.contains_key(&product.id) {
            return Err(AppError::with_message(
                ErrorCode::AlreadyExists,
                format!("Product {} already exists", product.id),
            ));
        }
        self.products.insert(product.id.clone(), product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> AppResult<bool> {
        let _guard = self.write_lock.lock().await;
        let Some(mut existing) = self.products.get_mut(&product.id) else {
            return Ok(false);
        };
        // rating / num_reviews are derived and never overwritten here
        let (rating, num_reviews) = (existing.rating, existing.num_reviews);
        *existing = product.clone();
        existing.rating = rating;
        existing.num_reviews = num_reviews;
        Ok(true)
    }

    async fn delete_product(&self, id: &str) -> AppResult<bool> {
        let _guard = self.write_lock.lock().await;
        let removed = self.products.remove(id).is_some();
        if removed {
            self.reviews.remove(id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl CartRepository for MemoryStorage {
    async fn get_cart(&self, user_id: &str) -> AppResult<Cart> {
        let cart = self
            .carts
            .entry(user_id.to_string())
            .or_insert_with(|| Cart::empty(user_id, now_millis()));
        Ok(cart.value().clone())
    }

    async fn add_cart_item(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i32,
    ) -> AppResult<Cart> {
        let now = now_millis();
        let mut cart = self
            .carts
            .entry(user_id.to_string())
            .or_insert_with(|| Cart::empty(user_id, now));

        match cart.items.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => {
                line.quantity = line.quantity.saturating_add(quantity).min(MAX_LINE_QUANTITY)
            }
            None => cart.items.push(CartLine {
                product_id: product_id.to_string(),
                quantity: quantity.min(MAX_LINE_QUANTITY),
            }),
        }
        cart.updated_at = now;
        Ok(cart.value().clone())
    }

    async fn set_cart_item(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i32,
    ) -> AppResult<Option<Cart>> {
        let Some(mut cart) = self.carts.get_mut(user_id) else {
            return Ok(None);
        };
        let Some(line) = cart.items.iter_mut().find(|l| l.product_id == product_id) else {
            return Ok(None);
        };
        line.quantity = quantity;
        cart.updated_at = now_millis();
        Ok(Some(cart.value().clone()))
    }

    async fn remove_cart_item(&self, user_id: &str, product_id: &str) -> AppResult<Option<Cart>> {
        let Some(mut cart) = self.carts.get_mut(user_id) else {
            return Ok(None);
        };
        let before = cart.items.len();
        cart.items.retain(|l| l.product_id != product_id);
        if cart.items.len() == before {
            return Ok(None);
        }
        cart.updated_at = now_millis();
        Ok(Some(cart.value().clone()))
    }

    async fn clear_cart(&self, user_id: &str) -> AppResult<Cart> {
        let now = now_millis();
        let mut cart = self
            .carts
            .entry(user_id.to_string())
            .or_insert_with(|| Cart::empty(user_id, now));
        cart.items.clear();
        cart.updated_at = now;
        Ok(cart.value().clone())
    }
}

#[async_trait]
impl OrderRepository for MemoryStorage {
    async fn commit_order(&self, order: &Order) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(info) = &order.payment_info {
            self.check_payment(order, info)?;
        }

        // Check every line before touching anything
        for item in &order.items {
            let product = self.products.get(&item.product_id).ok_or_else(|| {
                AppError::with_message(
                    ErrorCode::ProductNotFound,
                    format!("Product not found: {}", item.product_id),
                )
            })?;
            if product.stock < item.quantity {
                return Err(AppError::with_message(
                    ErrorCode::ProductOutOfStock,
                    format!("Not enough stock for {}", item.name),
                )
                .with_detail("product_id", item.product_id.clone())
                .with_detail("available", product.stock));
            }
        }

        for item in &order.items {
            if let Some(mut product) = self.products.get_mut(&item.product_id) {
                product.stock -= item.quantity;
                product.updated_at = order.created_at;
            }
        }

        self.orders.insert(order.id.clone(), order.clone());

        if let Some(info) = &order.payment_info
            && let Some(mut intent) = self.intents.get_mut(&info.gateway_order_id)
        {
            intent.order_id = Some(order.id.clone());
        }

        // 只扣除已下单的数量，之后加入的行保留
        if let Some(mut cart) = self.carts.get_mut(&order.user_id) {
            for item in &order.items {
                if let Some(line) = cart
                    .items
                    .iter_mut()
                    .find(|l| l.product_id == item.product_id)
                {
                    line.quantity -= item.quantity;
                }
            }
            cart.items.retain(|l| l.quantity > 0);
            cart.updated_at = order.created_at;
        }
        Ok(())
    }

    async fn get_order(&self, id: &str) -> AppResult<Option<Order>> {
        Ok(self.orders.get(id).map(|o| o.value().clone()))
    }

    async fn list_orders_for_user(&self, user_id: &str) -> AppResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .map(|o| o.value().clone())
            .collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn list_orders(&self, window: PageWindow) -> AppResult<(Vec<Order>, u64)> {
        let mut orders: Vec<Order> = self.orders.iter().map(|o| o.value().clone()).collect();
        newest_first(&mut orders);
        let total = orders.len() as u64;
        Ok((page(orders, window), total))
    }

    async fn save_order_status(&self, order: &Order, expected: OrderStatus) -> AppResult<bool> {
        let _guard = self.write_lock.lock().await;
        let Some(mut existing) = self.orders.get_mut(&order.id) else {
            return Ok(false);
        };
        if existing.order_status != expected {
            return Ok(false);
        }
        existing.order_status = order.order_status;
        existing.payment_status = order.payment_status;
        existing.delivered_at = order.delivered_at;
        existing.cancelled_at = order.cancelled_at;
        existing.updated_at = order.updated_at;
        Ok(true)
    }

    async fn insert_payment_intent(&self, intent: &PaymentIntentRecord) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        if self.intents.contains_key(&intent.gateway_order_id) {
            return Err(AppError::with_message(
                ErrorCode::AlreadyExists,
                format!("Payment order {} already exists", intent.gateway_order_id),
            ));
        }
        self.intents
            .insert(intent.gateway_order_id.clone(), intent.clone());
        Ok(())
    }

    async fn get_payment_intent(
        &self,
        gateway_order_id: &str,
    ) -> AppResult<Option<PaymentIntentRecord>> {
        Ok(self.intents.get(gateway_order_id).map(|i| i.value().clone()))
    }
}

#[async_trait]
impl ReviewRepository for MemoryStorage {
    async fn list_reviews(&self, product_id: &str) -> AppResult<Vec<Review>> {
        let mut reviews = self
            .reviews
            .get(product_id)
            .map(|r| r.value().clone())
            .unwrap_or_default();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    async fn upsert_review(&self, review: &Review) -> AppResult<Option<RatingSummary>> {
        let _guard = self.write_lock.lock().await;
        if !self.products.contains_key(&review.product_id) {
            return Ok(None);
        }

        let summary = {
            let mut reviews = self.reviews.entry(review.product_id.clone()).or_default();
            match reviews.iter_mut().find(|r| r.user_id == review.user_id) {
                Some(existing) => {
                    existing.user_name = review.user_name.clone();
                    existing.rating = review.rating;
                    existing.comment = review.comment.clone();
                    existing.updated_at = review.updated_at;
                }
                None => reviews.push(review.clone()),
            }
            RatingSummary::from_reviews(&reviews)
        };

        self.set_rating(&review.product_id, summary);
        Ok(Some(summary))
    }

    async fn delete_review(
        &self,
        product_id: &str,
        review_id: &str,
    ) -> AppResult<Option<RatingSummary>> {
        let _guard = self.write_lock.lock().await;
        if !self.products.contains_key(product_id) {
            return Ok(None);
        }

        let summary = {
            let Some(mut reviews) = self.reviews.get_mut(product_id) else {
                return Ok(None);
            };
            let Some(pos) = reviews.iter().position(|r| r.id == review_id) else {
                return Ok(None);
            };
            reviews.remove(pos);
            RatingSummary::from_reviews(&reviews)
        };

        self.set_rating(product_id, summary);
        Ok(Some(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{OrderItem, ShippingAddress};
    use shared::order::{OrderStatus, PaymentMethod, PaymentStatus};

    fn product(id: &str, price: f64, stock: i32, created_at: i64) -> Product {
        Product {
            id: id.into(),
            name: format!("Product {id}"),
            description: "desc".into(),
            price,
            stock,
            category: "general".into(),
            brand: "Generic".into(),
            images: vec![],
            is_featured: false,
            created_by: None,
            rating: 0.0,
            num_reviews: 0,
            created_at,
            updated_at: created_at,
        }
    }

    fn order(id: &str, user: &str, lines: &[(&str, i32)]) -> Order {
        Order {
            id: id.into(),
            user_id: user.into(),
            customer_name: "Asha".into(),
            customer_email: "asha@example.com".into(),
            items: lines
                .iter()
                .map(|(pid, qty)| OrderItem {
                    product_id: pid.to_string(),
                    name: format!("Product {pid}"),
                    image: String::new(),
                    price: 10.0,
                    quantity: *qty,
                })
                .collect(),
            shipping_address: ShippingAddress::default(),
            payment_method: PaymentMethod::Cod,
            payment_status: PaymentStatus::Pending,
            payment_info: None,
            items_price: 0.0,
            shipping_price: 0.0,
            tax_price: 0.0,
            total_price: 0.0,
            order_status: OrderStatus::Pending,
            delivered_at: None,
            cancelled_at: None,
            created_at: now_millis(),
            updated_at: now_millis(),
        }
    }

    #[tokio::test]
    async fn test_cart_add_accumulates() {
        let store = MemoryStorage::new();
        store.add_cart_item("u1", "p1", 2).await.unwrap();
        let cart = store.add_cart_item("u1", "p1", 3).await.unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 5);
    }

    #[tokio::test]
    async fn test_cart_update_and_remove_missing_line() {
        let store = MemoryStorage::new();
        assert!(store.set_cart_item("u1", "p1", 2).await.unwrap().is_none());
        store.add_cart_item("u1", "p1", 1).await.unwrap();
        assert!(store.remove_cart_item("u1", "p2").await.unwrap().is_none());
        let cart = store.set_cart_item("u1", "p1", 7).await.unwrap().unwrap();
        assert_eq!(cart.items[0].quantity, 7);
    }

    #[tokio::test]
    async fn test_commit_order_is_all_or_nothing() {
        let store = MemoryStorage::new();
        store.insert_product(&product("a", 10.0, 5, 1)).await.unwrap();
        store.insert_product(&product("b", 10.0, 1, 2)).await.unwrap();
        store.add_cart_item("u1", "a", 2).await.unwrap();

        let err = store
            .commit_order(&order("o1", "u1", &[("a", 2), ("b", 2)]))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ProductOutOfStock);

        assert_eq!(store.get_product("a").await.unwrap().unwrap().stock, 5);
        assert!(store.get_order("o1").await.unwrap().is_none());
        assert_eq!(store.get_cart("u1").await.unwrap().items.len(), 1);
    }

    #[tokio::test]
    async fn test_commit_order_decrements_and_clears_cart() {
        let store = MemoryStorage::new();
        store.insert_product(&product("a", 10.0, 5, 1)).await.unwrap();
        store.add_cart_item("u1", "a", 2).await.unwrap();

        store
            .commit_order(&order("o1", "u1", &[("a", 2)]))
            .await
            .unwrap();
        assert_eq!(store.get_product("a").await.unwrap().unwrap().stock, 3);
        assert!(store.get_cart("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_order_keeps_lines_added_after_read() {
        let store = MemoryStorage::new();
        store.insert_product(&product("a", 10.0, 5, 1)).await.unwrap();
        store.insert_product(&product("b", 10.0, 5, 2)).await.unwrap();
        store.add_cart_item("u1", "a", 2).await.unwrap();

        // 下单引擎读到 [a×2] 之后，另一个请求又加了 b 和一个 a
        let seen = store.get_cart("u1").await.unwrap();
        assert_eq!(seen.items.len(), 1);
        store.add_cart_item("u1", "b", 1).await.unwrap();
        store.add_cart_item("u1", "a", 1).await.unwrap();

        store
            .commit_order(&order("o1", "u1", &[("a", 2)]))
            .await
            .unwrap();

        let cart = store.get_cart("u1").await.unwrap();
        let lines: Vec<(&str, i32)> = cart
            .items
            .iter()
            .map(|l| (l.product_id.as_str(), l.quantity))
            .collect();
        assert_eq!(lines, vec![("a", 1), ("b", 1)]);
    }

    #[tokio::test]
    async fn test_add_cart_item_caps_line_quantity() {
        let store = MemoryStorage::new();
        store.add_cart_item("u1", "p1", MAX_LINE_QUANTITY).await.unwrap();
        let cart = store.add_cart_item("u1", "p1", 5).await.unwrap();
        assert_eq!(cart.items[0].quantity, MAX_LINE_QUANTITY);
        let cart = store.add_cart_item("u1", "p1", i32::MAX).await.unwrap();
        assert_eq!(cart.items[0].quantity, MAX_LINE_QUANTITY);
    }

    #[tokio::test]
    async fn test_save_order_status_is_conditional() {
        let store = MemoryStorage::new();
        store.insert_product(&product("a", 10.0, 5, 1)).await.unwrap();
        store
            .commit_order(&order("o1", "u1", &[("a", 1)]))
            .await
            .unwrap();

        // 两个管理员都读到 PENDING
        let mut cancel = store.get_order("o1").await.unwrap().unwrap();
        let mut process = cancel.clone();
        cancel.apply_status(OrderStatus::Cancelled, now_millis());
        process.apply_status(OrderStatus::Processing, now_millis());

        assert!(store
            .save_order_status(&cancel, OrderStatus::Pending)
            .await
            .unwrap());
        assert!(!store
            .save_order_status(&process, OrderStatus::Pending)
            .await
            .unwrap());

        let stored = store.get_order("o1").await.unwrap().unwrap();
        assert_eq!(stored.order_status, OrderStatus::Cancelled);
        assert!(!store
            .save_order_status(&process, OrderStatus::Pending)
            .await
            .unwrap());
        assert!(!store
            .save_order_status(&cancel, OrderStatus::Pending)
            .await
            .unwrap());
    }

    fn intent(id: &str, user: &str) -> PaymentIntentRecord {
        PaymentIntentRecord {
            gateway_order_id: id.into(),
            user_id: user.into(),
            amount: 6000,
            currency: "INR".into(),
            order_id: None,
            created_at: now_millis(),
        }
    }

    fn paid(mut order: Order, gateway_order_id: &str, payment_id: &str) -> Order {
        order.payment_method = PaymentMethod::Online;
        order.payment_status = PaymentStatus::Paid;
        order.payment_info = Some(PaymentInfo {
            id: payment_id.into(),
            status: "captured".into(),
            signature: "sig".into(),
            gateway_order_id: gateway_order_id.into(),
        });
        order
    }

    #[tokio::test]
    async fn test_payment_intent_settles_one_order() {
        let store = MemoryStorage::new();
        store.insert_product(&product("a", 10.0, 10, 1)).await.unwrap();
        store.insert_payment_intent(&intent("g1", "u1")).await.unwrap();
        store.insert_payment_intent(&intent("g2", "u1")).await.unwrap();

        let err = store
            .insert_payment_intent(&intent("g1", "u1"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyExists);

        store
            .commit_order(&paid(order("o1", "u1", &[("a", 1)]), "g1", "pay_1"))
            .await
            .unwrap();
        let consumed = store.get_payment_intent("g1").await.unwrap().unwrap();
        assert_eq!(consumed.order_id.as_deref(), Some("o1"));

        // 同一意图再次使用
        let err = store
            .commit_order(&paid(order("o2", "u1", &[("a", 1)]), "g1", "pay_2"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentFailed);

        // 同一支付 id 挂到另一个意图上
        let err = store
            .commit_order(&paid(order("o3", "u1", &[("a", 1)]), "g2", "pay_1"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentFailed);

        // 别人的意图 / 不存在的意图
        let err = store
            .commit_order(&paid(order("o4", "u2", &[("a", 1)]), "g2", "pay_4"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentFailed);
        let err = store
            .commit_order(&paid(order("o5", "u1", &[("a", 1)]), "nope", "pay_5"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentFailed);

        assert_eq!(store.get_product("a").await.unwrap().unwrap().stock, 9);
        assert!(store.get_order("o2").await.unwrap().is_none());
        assert!(!store.get_payment_intent("g2").await.unwrap().unwrap().is_consumed());
    }

    #[tokio::test]
    async fn test_list_products_sort_and_page() {
        let store = MemoryStorage::new();
        for (i, price) in [30.0, 10.0, 20.0].into_iter().enumerate() {
            store
                .insert_product(&product(&format!("p{i}"), price, 1, i as i64))
                .await
                .unwrap();
        }

        let query = ProductQuery {
            sort_by: Some(ProductSort::Price),
            sort_order: Some(SortOrder::Asc),
            ..Default::default()
        };
        let (items, total) = store
            .list_products(&query, PageWindow { page: 1, limit: 2 })
            .await
            .unwrap();
        assert_eq!(total, 3);
        let prices: Vec<f64> = items.iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![10.0, 20.0]);

        // default: created_at desc
        let (items, _) = store
            .list_products(&ProductQuery::default(), PageWindow { page: 1, limit: 10 })
            .await
            .unwrap();
        assert_eq!(items[0].id, "p2");
    }

    #[tokio::test]
    async fn test_update_product_keeps_derived_rating() {
        let store = MemoryStorage::new();
        let mut p = product("a", 10.0, 5, 1);
        store.insert_product(&p).await.unwrap();
        store.set_rating(
            "a",
            RatingSummary {
                rating: 4.5,
                num_reviews: 2,
            },
        );

        p.price = 12.0;
        p.rating = 0.0;
        assert!(store.update_product(&p).await.unwrap());
        let saved = store.get_product("a").await.unwrap().unwrap();
        assert_eq!(saved.price, 12.0);
        assert_eq!(saved.rating, 4.5);
    }
}
