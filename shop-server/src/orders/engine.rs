//! OrderEngine — 下单、状态流转与订单查询
//!
//! 下单流程 (COD 与在线支付共用)：
//!
//! ```text
//! validate input ─► read cart ─► re-fetch products ─► snapshot lines
//!       ─► compute_prices ─► storage.commit_order (stock / order / cart)
//!       ─► outbox.enqueue(Placed)
//! ```
//!
//! 所有校验都在第一次写之前完成；`commit_order` 失败时不留下任何写入。

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{
    CreateOrderRequest, Order, OrderItem, OrderListQuery, PaymentInfo, ShippingAddress,
};
use shared::order::{
    OrderStatus, PaymentMethod, PaymentStatus, PriceBreakdown, TransitionPolicy, compute_prices,
};
use shared::response::{PageWindow, Paginated};
use shared::util::{new_id, now_millis};
use std::sync::Arc;

use super::outbox::{OrderNotice, Outbox};
use crate::auth::CurrentUser;
use crate::db::{Storage, payment_failed};
use crate::validation::validate_shipping_address;

const DEFAULT_ORDER_PAGE_LIMIT: u32 = 20;

/// Priced snapshot of the caller's cart
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub items: Vec<OrderItem>,
    pub prices: PriceBreakdown,
}

/// Initial state of a new order
struct Placement {
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    payment_info: Option<PaymentInfo>,
    order_status: OrderStatus,
    /// Minor units already charged; must equal the re-priced total
    expected_amount: Option<i64>,
}

pub struct OrderEngine {
    storage: Arc<dyn Storage>,
    outbox: Outbox,
    policy: TransitionPolicy,
}

impl OrderEngine {
    pub fn new(storage: Arc<dyn Storage>, outbox: Outbox, policy: TransitionPolicy) -> Self {
        Self {
            storage,
            outbox,
            policy,
        }
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    /// Re-read the cart and price it against current product data.
    ///
    /// Read-only. Fails with `OrderEmpty`, `ProductNotFound` or
    /// `ProductOutOfStock`.
    pub async fn quote(&self, user_id: &str) -> AppResult<OrderDraft> {
        let cart = self.storage.get_cart(user_id).await?;
        if cart.is_empty() {
            return Err(AppError::new(ErrorCode::OrderEmpty));
        }

        let mut items = Vec::with_capacity(cart.items.len());
        for line in &cart.items {
            let product = self
                .storage
                .get_product(&line.product_id)
                .await?
                .ok_or_else(|| {
                    AppError::with_message(
                        ErrorCode::ProductNotFound,
                        format!("Product not found: {}", line.product_id),
                    )
                })?;

            if product.stock < line.quantity {
                return Err(AppError::with_message(
                    ErrorCode::ProductOutOfStock,
                    format!("Not enough stock for {}", product.name),
                )
                .with_detail("product_id", product.id.clone())
                .with_detail("available", product.stock));
            }

            items.push(OrderItem {
                image: product.primary_image().to_string(),
                product_id: product.id,
                name: product.name,
                price: product.price,
                quantity: line.quantity,
            });
        }

        let prices = compute_prices(items.iter().map(|i| (i.price, i.quantity)));
        Ok(OrderDraft { items, prices })
    }

    /// `POST /api/orders`: order from cart, payment collected later
    pub async fn place_order(
        &self,
        user: &CurrentUser,
        req: CreateOrderRequest,
    ) -> AppResult<Order> {
        let address = validate_shipping_address(req.shipping_address.as_ref())?.clone();
        let method = req
            .payment_method
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| AppError::required("payment_method"))?;
        let payment_method = PaymentMethod::parse(method).ok_or_else(|| {
            AppError::with_message(
                ErrorCode::PaymentInvalidMethod,
                format!("Invalid payment method: {method}"),
            )
        })?;

        self.commit(
            user,
            address,
            Placement {
                payment_method,
                payment_status: PaymentStatus::Pending,
                payment_info: None,
                order_status: OrderStatus::Pending,
                expected_amount: None,
            },
        )
        .await
    }

    /// Order for a payment the gateway already captured.
    ///
    /// `amount` is what the gateway charged (minor units); the cart is
    /// re-priced and must still come to exactly that total.
    pub async fn place_paid_order(
        &self,
        user: &CurrentUser,
        address: ShippingAddress,
        payment: PaymentInfo,
        amount: i64,
    ) -> AppResult<Order> {
        let address = validate_shipping_address(Some(&address))?.clone();
        self.commit(
            user,
            address,
            Placement {
                payment_method: PaymentMethod::Online,
                payment_status: PaymentStatus::Paid,
                payment_info: Some(payment),
                order_status: OrderStatus::Processing,
                expected_amount: Some(amount),
            },
        )
        .await
    }

    async fn commit(
        &self,
        user: &CurrentUser,
        shipping_address: ShippingAddress,
        placement: Placement,
    ) -> AppResult<Order> {
        let draft = self.quote(&user.id).await?;
        if let Some(paid) = placement.expected_amount
            && paid != draft.prices.total_minor_units()
        {
            tracing::warn!(
                user_id = %user.id,
                paid,
                total = draft.prices.total_minor_units(),
                "Cart total changed after payment"
            );
            return Err(
                payment_failed("Payment amount does not match cart total")
                    .with_detail("paid", paid)
                    .with_detail("total", draft.prices.total_minor_units()),
            );
        }
        let now = now_millis();

        let order = Order {
            id: new_id(),
            user_id: user.id.clone(),
            customer_name: user.name.clone(),
            customer_email: user.email.clone(),
            items: draft.items,
            shipping_address,
            payment_method: placement.payment_method,
            payment_status: placement.payment_status,
            payment_info: placement.payment_info,
            items_price: draft.prices.items_price,
            shipping_price: draft.prices.shipping_price,
            tax_price: draft.prices.tax_price,
            total_price: draft.prices.total_price,
            order_status: placement.order_status,
            delivered_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };

        self.storage.commit_order(&order).await?;

        tracing::info!(
            order_id = %order.id,
            user_id = %order.user_id,
            payment_method = %order.payment_method,
            total = order.total_price,
            lines = order.items.len(),
            "Order placed"
        );
        self.outbox
            .enqueue(OrderNotice::Placed(Box::new(order.clone())));
        Ok(order)
    }

    /// Admin status change with its side effects
    pub async fn update_status(&self, order_id: &str, status: Option<String>) -> AppResult<Order> {
        let raw = status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::required("status"))?;
        let next = OrderStatus::parse(raw).ok_or_else(|| {
            AppError::with_message(
                ErrorCode::OrderInvalidStatus,
                format!("Invalid order status: {raw}"),
            )
        })?;

        let mut order = self
            .storage
            .get_order(order_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;

        let previous = order.order_status;
        self.policy.check(previous, next)?;
        order.apply_status(next, now_millis());

        if !self.storage.save_order_status(&order, previous).await? {
            // 读后被其他请求改动或删除
            let code = match self.storage.get_order(order_id).await? {
                Some(_) => ErrorCode::OrderStatusConflict,
                None => ErrorCode::OrderNotFound,
            };
            return Err(AppError::new(code));
        }

        tracing::info!(
            order_id = %order.id,
            from = %previous,
            to = %next,
            payment_status = %order.payment_status,
            "Order status updated"
        );
        self.outbox
            .enqueue(OrderNotice::StatusUpdated(Box::new(order.clone())));
        Ok(order)
    }

    /// Owner or admin
    pub async fn get_order(&self, user: &CurrentUser, order_id: &str) -> AppResult<Order> {
        let order = self
            .storage
            .get_order(order_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;
        if !user.can_access(&order.user_id) {
            return Err(AppError::forbidden("Not allowed to view this order"));
        }
        Ok(order)
    }

    pub async fn my_orders(&self, user: &CurrentUser) -> AppResult<Vec<Order>> {
        self.storage.list_orders_for_user(&user.id).await
    }

    pub async fn all_orders(&self, query: OrderListQuery) -> AppResult<Paginated<Order>> {
        let window = PageWindow::resolve(query.page, query.limit, DEFAULT_ORDER_PAGE_LIMIT);
        let (orders, total) = self.storage.list_orders(window).await?;
        Ok(Paginated::new(orders, total, window.page, window.limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        CartRepository, CatalogRepository, MemoryStorage, OrderRepository, ReviewRepository,
    };
    use shared::models::{
        Cart, DEFAULT_BRAND, PaymentIntentRecord, Product, RatingSummary, Review,
    };
    use tokio::sync::mpsc;

    fn user(id: &str) -> CurrentUser {
        CurrentUser {
            id: id.into(),
            name: "Asha".into(),
            email: "asha@example.com".into(),
            role: "user".into(),
        }
    }

    fn product(id: &str, price: f64, stock: i32) -> Product {
        Product {
            id: id.into(),
            name: format!("Item {id}"),
            description: "d".into(),
            price,
            stock,
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

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Asha Rao".into(),
            phone: "9876543210".into(),
            pincode: "560001".into(),
            address_line1: "12 MG Road".into(),
            address_line2: None,
            city: "Bengaluru".into(),
            state: "KA".into(),
        }
    }

    fn engine(policy: TransitionPolicy) -> (OrderEngine, Arc<MemoryStorage>, mpsc::Receiver<OrderNotice>) {
        let storage = Arc::new(MemoryStorage::new());
        let (outbox, rx) = Outbox::channel(16);
        (OrderEngine::new(storage.clone(), outbox, policy), storage, rx)
    }

    fn request(method: &str) -> CreateOrderRequest {
        CreateOrderRequest {
            shipping_address: Some(address()),
            payment_method: Some(method.into()),
        }
    }

    #[tokio::test]
    async fn quote_prices_current_cart() {
        let (engine, storage, _rx) = engine(TransitionPolicy::Permissive);
        storage.insert_product(&product("p1", 100.0, 5)).await.unwrap();
        storage.add_cart_item("u1", "p1", 2).await.unwrap();

        let draft = engine.quote("u1").await.unwrap();
        assert_eq!(draft.items.len(), 1);
        assert_eq!(draft.prices.items_price, 200.0);
        assert_eq!(draft.prices.shipping_price, 50.0);
        assert_eq!(draft.prices.tax_price, 36.0);
        assert_eq!(draft.prices.total_price, 286.0);
    }

    #[tokio::test]
    async fn missing_payment_method_is_required_field() {
        let (engine, _, _rx) = engine(TransitionPolicy::Permissive);
        let err = engine
            .place_order(
                &user("u1"),
                CreateOrderRequest {
                    shipping_address: Some(address()),
                    payment_method: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::RequiredField);
    }

    #[tokio::test]
    async fn unknown_payment_method_rejected_before_cart_read() {
        let (engine, _, _rx) = engine(TransitionPolicy::Permissive);
        let err = engine.place_order(&user("u1"), request("UPI")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentInvalidMethod);
    }

    #[tokio::test]
    async fn place_order_enqueues_notice() {
        let (engine, storage, mut rx) = engine(TransitionPolicy::Permissive);
        storage.insert_product(&product("p1", 500.0, 5)).await.unwrap();
        storage.add_cart_item("u1", "p1", 3).await.unwrap();

        let order = engine.place_order(&user("u1"), request("COD")).await.unwrap();
        assert_eq!(order.order_status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);

        match rx.try_recv().unwrap() {
            OrderNotice::Placed(o) => assert_eq!(o.id, order.id),
            other => panic!("Expected Placed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn strict_policy_rejects_skipping_states() {
        let (engine, storage, _rx) = engine(TransitionPolicy::Strict);
        storage.insert_product(&product("p1", 10.0, 5)).await.unwrap();
        storage.add_cart_item("u1", "p1", 1).await.unwrap();
        let order = engine.place_order(&user("u1"), request("COD")).await.unwrap();

        let err = engine
            .update_status(&order.id, Some("DELIVERED".into()))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::OrderInvalidTransition);

        let stored = engine.get_order(&user("u1"), &order.id).await.unwrap();
        assert_eq!(stored.order_status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn permissive_policy_allows_any_status() {
        let (engine, storage, _rx) = engine(TransitionPolicy::Permissive);
        storage.insert_product(&product("p1", 10.0, 5)).await.unwrap();
        storage.add_cart_item("u1", "p1", 1).await.unwrap();
        let order = engine.place_order(&user("u1"), request("COD")).await.unwrap();

        let delivered = engine
            .update_status(&order.id, Some("DELIVERED".into()))
            .await
            .unwrap();
        assert_eq!(delivered.payment_status, PaymentStatus::Paid);
        assert!(delivered.delivered_at.is_some());
    }

    #[tokio::test]
    async fn update_status_validation() {
        let (engine, _, _rx) = engine(TransitionPolicy::Permissive);
        let err = engine.update_status("o1", None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RequiredField);

        let err = engine
            .update_status("o1", Some("LOST".into()))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::OrderInvalidStatus);

        let err = engine
            .update_status("o1", Some("SHIPPED".into()))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::OrderNotFound);
    }

    fn payment(gateway_order_id: &str) -> PaymentInfo {
        PaymentInfo {
            id: format!("pay_{gateway_order_id}"),
            status: "captured".into(),
            signature: "sig".into(),
            gateway_order_id: gateway_order_id.into(),
        }
    }

    async fn open_intent(storage: &MemoryStorage, id: &str, user: &str, amount: i64) {
        storage
            .insert_payment_intent(&PaymentIntentRecord {
                gateway_order_id: id.into(),
                user_id: user.into(),
                amount,
                currency: "INR".into(),
                order_id: None,
                created_at: now_millis(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn paid_order_requires_matching_total() {
        let (engine, storage, mut rx) = engine(TransitionPolicy::Permissive);
        storage.insert_product(&product("p1", 100.0, 10)).await.unwrap();
        storage.add_cart_item("u1", "p1", 2).await.unwrap();
        open_intent(&storage, "g1", "u1", 28600).await;

        // 支付后购物车又加了一件
        storage.add_cart_item("u1", "p1", 1).await.unwrap();
        let err = engine
            .place_paid_order(&user("u1"), address(), payment("g1"), 28600)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentFailed);
        assert!(rx.try_recv().is_err());
        assert_eq!(storage.get_product("p1").await.unwrap().unwrap().stock, 10);

        storage.set_cart_item("u1", "p1", 2).await.unwrap();
        let order = engine
            .place_paid_order(&user("u1"), address(), payment("g1"), 28600)
            .await
            .unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.order_status, OrderStatus::Processing);
        assert_eq!(order.total_price, 286.0);
    }

    /// Another admin's status change lands between our read and our write
    struct RacingStorage {
        inner: MemoryStorage,
    }

    #[async_trait::async_trait]
    impl CatalogRepository for RacingStorage {
        async fn list_products(
            &self,
            query: &shared::models::ProductQuery,
            window: PageWindow,
        ) -> AppResult<(Vec<Product>, u64)> {
            self.inner.list_products(query, window).await
        }
        async fn get_product(&self, id: &str) -> AppResult<Option<Product>> {
            self.inner.get_product(id).await
        }
        async fn insert_product(&self, product: &Product) -> AppResult<()> {
            self.inner.insert_product(product).await
        }
        async fn update_product(&self, product: &Product) -> AppResult<bool> {
            self.inner.update_product(product).await
        }
        async fn delete_product(&self, id: &str) -> AppResult<bool> {
            self.inner.delete_product(id).await
        }
    }

    #[async_trait::async_trait]
    impl CartRepository for RacingStorage {
        async fn get_cart(&self, user_id: &str) -> AppResult<Cart> {
            self.inner.get_cart(user_id).await
        }
        async fn add_cart_item(&self, user_id: &str, product_id: &str, quantity: i32) -> AppResult<Cart> {
            self.inner.add_cart_item(user_id, product_id, quantity).await
        }
        async fn set_cart_item(
            &self,
            user_id: &str,
            product_id: &str,
            quantity: i32,
        ) -> AppResult<Option<Cart>> {
            self.inner.set_cart_item(user_id, product_id, quantity).await
        }
        async fn remove_cart_item(&self, user_id: &str, product_id: &str) -> AppResult<Option<Cart>> {
            self.inner.remove_cart_item(user_id, product_id).await
        }
        async fn clear_cart(&self, user_id: &str) -> AppResult<Cart> {
            self.inner.clear_cart(user_id).await
        }
    }

    #[async_trait::async_trait]
    impl OrderRepository for RacingStorage {
        async fn commit_order(&self, order: &Order) -> AppResult<()> {
            self.inner.commit_order(order).await
        }
        async fn get_order(&self, id: &str) -> AppResult<Option<Order>> {
            self.inner.get_order(id).await
        }
        async fn list_orders_for_user(&self, user_id: &str) -> AppResult<Vec<Order>> {
            self.inner.list_orders_for_user(user_id).await
        }
        async fn list_orders(&self, window: PageWindow) -> AppResult<(Vec<Order>, u64)> {
            self.inner.list_orders(window).await
        }
        async fn save_order_status(&self, order: &Order, expected: OrderStatus) -> AppResult<bool> {
            let mut rival = self.inner.get_order(&order.id).await?.unwrap();
            rival.apply_status(OrderStatus::Cancelled, now_millis());
            self.inner.save_order_status(&rival, expected).await?;
            self.inner.save_order_status(order, expected).await
        }
        async fn insert_payment_intent(&self, intent: &PaymentIntentRecord) -> AppResult<()> {
            self.inner.insert_payment_intent(intent).await
        }
        async fn get_payment_intent(&self, id: &str) -> AppResult<Option<PaymentIntentRecord>> {
            self.inner.get_payment_intent(id).await
        }
    }

    #[async_trait::async_trait]
    impl ReviewRepository for RacingStorage {
        async fn list_reviews(&self, product_id: &str) -> AppResult<Vec<Review>> {
            self.inner.list_reviews(product_id).await
        }
        async fn upsert_review(&self, review: &Review) -> AppResult<Option<RatingSummary>> {
            self.inner.upsert_review(review).await
        }
        async fn delete_review(
            &self,
            product_id: &str,
            review_id: &str,
        ) -> AppResult<Option<RatingSummary>> {
            self.inner.delete_review(product_id, review_id).await
        }
    }

    #[tokio::test]
    async fn concurrent_status_change_is_a_conflict() {
        let storage = Arc::new(RacingStorage {
            inner: MemoryStorage::new(),
        });
        let (outbox, mut rx) = Outbox::channel(16);
        let engine = OrderEngine::new(storage.clone(), outbox, TransitionPolicy::Permissive);
        storage.insert_product(&product("p1", 10.0, 5)).await.unwrap();
        storage.add_cart_item("u1", "p1", 1).await.unwrap();
        let placed = engine.place_order(&user("u1"), request("COD")).await.unwrap();
        assert!(matches!(rx.try_recv().unwrap(), OrderNotice::Placed(_)));

        let err = engine
            .update_status(&placed.id, Some("DELIVERED".into()))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::OrderStatusConflict);
        assert!(err.code.is_retryable());

        // 先落地的取消生效，没有发出状态通知
        let stored = storage.get_order(&placed.id).await.unwrap().unwrap();
        assert_eq!(stored.order_status, OrderStatus::Cancelled);
        assert_eq!(stored.payment_status, PaymentStatus::Pending);
        assert!(stored.delivered_at.is_none());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn all_orders_paginates_newest_first() {
        let (engine, storage, _rx) = engine(TransitionPolicy::Permissive);
        storage.insert_product(&product("p1", 10.0, 50)).await.unwrap();
        for _ in 0..3 {
            storage.add_cart_item("u1", "p1", 1).await.unwrap();
            engine.place_order(&user("u1"), request("COD")).await.unwrap();
        }

        let page = engine
            .all_orders(OrderListQuery {
                page: Some(1),
                limit: Some(2),
            })
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.pagination.total, 3);
        assert_eq!(page.pagination.pages, 2);
        assert!(page.items[0].created_at >= page.items[1].created_at);
    }
}
