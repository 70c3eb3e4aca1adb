//! 存储层
//!
//! 业务层只依赖下列 trait，运行时通过 `Arc<dyn Storage>` 注入：
//!
//! | 实现 | 用途 |
//! |------|------|
//! | [`PgStorage`] | 生产 (PostgreSQL, sqlx) |
//! | [`MemoryStorage`] | 开发 (未配置 `DATABASE_URL`) 与测试 |
//!
//! 两种实现都保证：
//! - `commit_order` 是单一工作单元：库存条件扣减 + 写订单 + 扣除已下单的购物车行
//!   (+ 在线支付时核销支付意图)，任一失败全部回滚
//! - `save_order_status` 以读到的旧状态为条件写入
//! - 购物车每次变更都是原子的 (无读-改-写竞态)
//! - 评论增改删与商品评分重算在同一工作单元内完成

pub mod memory;
pub mod postgres;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

use async_trait::async_trait;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{
    Cart, Order, PaymentIntentRecord, Product, ProductQuery, RatingSummary, Review,
};
use shared::order::OrderStatus;
use shared::response::PageWindow;

/// Rejection for a gateway receipt that cannot settle this order
pub(crate) fn payment_failed(message: impl Into<String>) -> AppError {
    AppError::with_message(ErrorCode::PaymentFailed, message)
}

/// 商品目录
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Filtered, sorted page plus the total match count
    async fn list_products(
        &self,
        query: &ProductQuery,
        window: PageWindow,
    ) -> AppResult<(Vec<Product>, u64)>;

    async fn get_product(&self, id: &str) -> AppResult<Option<Product>>;

    async fn insert_product(&self, product: &Product) -> AppResult<()>;

    /// Overwrite the editable fields; `false` if the product does not exist
    async fn update_product(&self, product: &Product) -> AppResult<bool>;

    /// `false` if the product does not exist
    async fn delete_product(&self, id: &str) -> AppResult<bool>;
}

/// 购物车 (每个用户一个，首次访问时创建)
#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn get_cart(&self, user_id: &str) -> AppResult<Cart>;

    /// Add `quantity` to the line, creating it if needed
    async fn add_cart_item(&self, user_id: &str, product_id: &str, quantity: i32)
    -> AppResult<Cart>;

    /// Set the line quantity; `None` if the product is not in the cart
    async fn set_cart_item(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i32,
    ) -> AppResult<Option<Cart>>;

    /// `None` if the product is not in the cart
    async fn remove_cart_item(&self, user_id: &str, product_id: &str) -> AppResult<Option<Cart>>;

    async fn clear_cart(&self, user_id: &str) -> AppResult<Cart>;
}

/// 订单
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Decrement stock for every line, insert `order`, and take the ordered
    /// quantities out of the owner's cart. Lines added after the cart was
    /// read stay in the cart.
    ///
    /// With `payment_info` set, the intent named by its `gateway_order_id` is
    /// consumed in the same unit of work; a missing, foreign or already
    /// consumed intent, or a reused payment id, fails with `PaymentFailed`.
    ///
    /// All or nothing. A line whose product is gone fails with
    /// `ProductNotFound`, one whose stock is short with `ProductOutOfStock`.
    async fn commit_order(&self, order: &Order) -> AppResult<()>;

    async fn get_order(&self, id: &str) -> AppResult<Option<Order>>;

    /// Newest first
    async fn list_orders_for_user(&self, user_id: &str) -> AppResult<Vec<Order>>;

    /// Newest first, paginated
    async fn list_orders(&self, window: PageWindow) -> AppResult<(Vec<Order>, u64)>;

    /// Persist status, payment status and the status timestamps, only if
    /// the stored status is still `expected`. `false` otherwise.
    async fn save_order_status(&self, order: &Order, expected: OrderStatus) -> AppResult<bool>;

    /// Record a gateway order; `AlreadyExists` on a duplicate id
    async fn insert_payment_intent(&self, intent: &PaymentIntentRecord) -> AppResult<()>;

    async fn get_payment_intent(
        &self,
        gateway_order_id: &str,
    ) -> AppResult<Option<PaymentIntentRecord>>;
}

/// 商品评论
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Newest first
    async fn list_reviews(&self, product_id: &str) -> AppResult<Vec<Review>>;

    /// Insert or overwrite the (user, product) review and recompute the
    /// product rating. `None` if the product does not exist.
    async fn upsert_review(&self, review: &Review) -> AppResult<Option<RatingSummary>>;

    /// Remove the review and recompute the product rating.
    /// `None` if the product or the review does not exist.
    async fn delete_review(
        &self,
        product_id: &str,
        review_id: &str,
    ) -> AppResult<Option<RatingSummary>>;
}

/// All repositories behind one object
pub trait Storage: CatalogRepository + CartRepository + OrderRepository + ReviewRepository {}

impl<T> Storage for T where T: CatalogRepository + CartRepository + OrderRepository + ReviewRepository
{}
