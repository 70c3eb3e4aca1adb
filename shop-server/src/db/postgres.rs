//! PostgreSQL storage (sqlx)
//!
//! 库存扣减使用条件更新 `stock >= qty`，与订单写入、支付意图消费、
//! 购物车扣减处于同一事务；行按 product_id 排序后加锁，避免并发下单互相死锁。

use async_trait::async_trait;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{
    Cart, CartLine, Order, OrderItem, PaymentInfo, PaymentIntentRecord, Product, ProductImage,
    ProductQuery, ProductSort, RatingSummary, Review, ShippingAddress, SortOrder,
};
use shared::order::{OrderStatus, PaymentMethod, PaymentStatus};
use shared::response::PageWindow;
use shared::util::now_millis;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use super::{CartRepository, CatalogRepository, OrderRepository, ReviewRepository, payment_failed};
use crate::validation::MAX_LINE_QUANTITY;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const PRODUCT_COLUMNS: &str = "id, name, description, price, stock, category, brand, images, \
     is_featured, created_by, rating, num_reviews, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, user_id, customer_name, customer_email, items, shipping_address, \
     payment_method, payment_status, payment_info, items_price, shipping_price, tax_price, \
     total_price, order_status, delivered_at, cancelled_at, created_at, updated_at";

fn db_err(e: sqlx::Error) -> AppError {
    AppError::database(e.to_string())
}

#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// Connect and run pending migrations
    pub async fn connect(database_url: &str) -> Result<Self, BoxError> {
        let pool = PgPool::connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ── Row types ──────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    description: String,
    price: f64,
    stock: i32,
    category: String,
    brand: String,
    images: Json<Vec<ProductImage>>,
    is_featured: bool,
    created_by: Option<String>,
    rating: f64,
    num_reviews: i32,
    created_at: i64,
    updated_at: i64,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            stock: row.stock,
            category: row.category,
            brand: row.brand,
            images: row.images.0,
            is_featured: row.is_featured,
            created_by: row.created_by,
            rating: row.rating,
            num_reviews: row.num_reviews,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: String,
    user_id: String,
    customer_name: String,
    customer_email: String,
    items: Json<Vec<OrderItem>>,
    shipping_address: Json<ShippingAddress>,
    payment_method: String,
    payment_status: String,
    payment_info: Option<Json<PaymentInfo>>,
    items_price: f64,
    shipping_price: f64,
    tax_price: f64,
    total_price: f64,
    order_status: String,
    delivered_at: Option<i64>,
    cancelled_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<OrderRow> for Order {
    type Error = AppError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let corrupt =
            |field: &str, value: &str| AppError::database(format!("order {}: bad {field} {value:?}", row.id));
        Ok(Self {
            payment_method: PaymentMethod::parse(&row.payment_method)
                .ok_or_else(|| corrupt("payment_method", &row.payment_method))?,
            payment_status: PaymentStatus::parse(&row.payment_status)
                .ok_or_else(|| corrupt("payment_status", &row.payment_status))?,
            order_status: OrderStatus::parse(&row.order_status)
                .ok_or_else(|| corrupt("order_status", &row.order_status))?,
            id: row.id,
            user_id: row.user_id,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            items: row.items.0,
            shipping_address: row.shipping_address.0,
            payment_info: row.payment_info.map(|j| j.0),
            items_price: row.items_price,
            shipping_price: row.shipping_price,
            tax_price: row.tax_price,
            total_price: row.total_price,
            delivered_at: row.delivered_at,
            cancelled_at: row.cancelled_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ── Catalog ────────────────────────────────────────────────────────

/// Escape LIKE wildcards in user input
fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn push_product_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &ProductQuery) {
    qb.push(" WHERE TRUE");
    if let Some(kw) = query.keyword.as_deref().filter(|k| !k.is_empty()) {
        qb.push(" AND name ILIKE ")
            .push_bind(format!("%{}%", escape_like(kw)));
    }
    if let Some(cat) = query.category.as_deref().filter(|c| !c.is_empty()) {
        qb.push(" AND category = ").push_bind(cat.to_string());
    }
    if let Some(min) = query.min_price {
        qb.push(" AND price >= ").push_bind(min);
    }
    if let Some(max) = query.max_price {
        qb.push(" AND price <= ").push_bind(max);
    }
}

#[async_trait]
impl CatalogRepository for PgStorage {
    async fn list_products(
        &self,
        query: &ProductQuery,
        window: PageWindow,
    ) -> AppResult<(Vec<Product>, u64)> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_product_filters(&mut count_qb, query);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        let column = match query.sort_by.unwrap_or_default() {
            ProductSort::CreatedAt => "created_at",
            ProductSort::Price => "price",
            ProductSort::Rating => "rating",
        };
        let direction = match query.sort_order.unwrap_or_default() {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        push_product_filters(&mut qb, query);
        qb.push(format!(" ORDER BY {column} {direction}, id {direction}"))
            .push(" LIMIT ")
            .push_bind(window.limit as i64)
            .push(" OFFSET ")
            .push_bind(window.offset() as i64);

        let rows: Vec<ProductRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        Ok((rows.into_iter().map(Product::from).collect(), total as u64))
    }

    async fn get_product(&self, id: &str) -> AppResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.map(Product::from))
    }

    async fn insert_product(&self, product: &Product) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description, price, stock, category, brand, images,
                is_featured, created_by, rating, num_reviews, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.stock)
        .bind(&product.category)
        .bind(&product.brand)
        .bind(Json(&product.images))
        .bind(product.is_featured)
        .bind(&product.created_by)
        .bind(product.rating)
        .bind(product.num_reviews)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(d) if d.is_unique_violation() => AppError::with_message(
                ErrorCode::AlreadyExists,
                format!("Product {} already exists", product.id),
            ),
            _ => db_err(e),
        })?;
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = $2, description = $3, price = $4, stock = $5, category = $6,
                brand = $7, images = $8, is_featured = $9, updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.stock)
        .bind(&product.category)
        .bind(&product.brand)
        .bind(Json(&product.images))
        .bind(product.is_featured)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_product(&self, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

// ── Cart ───────────────────────────────────────────────────────────

async fn touch_cart(
    tx: &mut Transaction<'_, Postgres>,
    user_id: &str,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO carts (user_id, updated_at) VALUES ($1, $2) \
         ON CONFLICT (user_id) DO UPDATE SET updated_at = EXCLUDED.updated_at",
    )
    .bind(user_id)
    .bind(now)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn load_cart<'e, E>(executor: E, user_id: &str) -> Result<Cart, sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    let rows: Vec<(i64, Option<String>, Option<i32>)> = sqlx::query_as(
        r#"
        SELECT c.updated_at, i.product_id, i.quantity
        FROM carts c
        LEFT JOIN cart_items i ON i.user_id = c.user_id
        WHERE c.user_id = $1
        ORDER BY i.added_at, i.product_id
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await?;

    let updated_at = rows.first().map(|r| r.0).unwrap_or_else(now_millis);
    let items = rows
        .into_iter()
        .filter_map(|(_, product_id, quantity)| {
            Some(CartLine {
                product_id: product_id?,
                quantity: quantity?,
            })
        })
        .collect();

    Ok(Cart {
        user_id: user_id.to_string(),
        items,
        updated_at,
    })
}

#[async_trait]
impl CartRepository for PgStorage {
    async fn get_cart(&self, user_id: &str) -> AppResult<Cart> {
        sqlx::query(
            "INSERT INTO carts (user_id, updated_at) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(now_millis())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        load_cart(&self.pool, user_id).await.map_err(db_err)
    }

    async fn add_cart_item(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i32,
    ) -> AppResult<Cart> {
        let now = now_millis();
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        touch_cart(&mut tx, user_id, now).await.map_err(db_err)?;

        sqlx::query(
            r#"
            INSERT INTO cart_items (user_id, product_id, quantity, added_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = LEAST(cart_items.quantity + EXCLUDED.quantity, $5)
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity.min(MAX_LINE_QUANTITY))
        .bind(now)
        .bind(MAX_LINE_QUANTITY)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let cart = load_cart(&mut *tx, user_id).await.map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(cart)
    }

    async fn set_cart_item(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i32,
    ) -> AppResult<Option<Cart>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let result = sqlx::query(
            "UPDATE cart_items SET quantity = $3 WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        touch_cart(&mut tx, user_id, now_millis()).await.map_err(db_err)?;
        let cart = load_cart(&mut *tx, user_id).await.map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(Some(cart))
    }

    async fn remove_cart_item(&self, user_id: &str, product_id: &str) -> AppResult<Option<Cart>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        touch_cart(&mut tx, user_id, now_millis()).await.map_err(db_err)?;
        let cart = load_cart(&mut *tx, user_id).await.map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(Some(cart))
    }

    async fn clear_cart(&self, user_id: &str) -> AppResult<Cart> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        touch_cart(&mut tx, user_id, now_millis()).await.map_err(db_err)?;
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        let cart = load_cart(&mut *tx, user_id).await.map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(cart)
    }
}

// ── Orders ─────────────────────────────────────────────────────────

#[async_trait]
impl OrderRepository for PgStorage {
    async fn commit_order(&self, order: &Order) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        if let Some(info) = &order.payment_info {
            lock_payment_intent(&mut tx, order, info).await?;
        }

        let mut lines: Vec<&OrderItem> = order.items.iter().collect();
        lines.sort_by(|a, b| a.product_id.cmp(&b.product_id));

        for item in &lines {
            let result = sqlx::query(
                "UPDATE products SET stock = stock - $1, updated_at = $3 \
                 WHERE id = $2 AND stock >= $1",
            )
            .bind(item.quantity)
            .bind(&item.product_id)
            .bind(order.created_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            if result.rows_affected() == 0 {
                // Dropping `tx` rolls back earlier decrements
                let stock: Option<(i32,)> = sqlx::query_as("SELECT stock FROM products WHERE id = $1")
                    .bind(&item.product_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(db_err)?;
                return Err(match stock {
                    None => AppError::with_message(
                        ErrorCode::ProductNotFound,
                        format!("Product not found: {}", item.product_id),
                    ),
                    Some((available,)) => AppError::with_message(
                        ErrorCode::ProductOutOfStock,
                        format!("Not enough stock for {}", item.name),
                    )
                    .with_detail("product_id", item.product_id.clone())
                    .with_detail("available", available),
                });
            }
        }

        sqlx::query(&format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)"
        ))
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(&order.customer_name)
        .bind(&order.customer_email)
        .bind(Json(&order.items))
        .bind(Json(&order.shipping_address))
        .bind(order.payment_method.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.payment_info.as_ref().map(Json))
        .bind(order.items_price)
        .bind(order.shipping_price)
        .bind(order.tax_price)
        .bind(order.total_price)
        .bind(order.order_status.as_str())
        .bind(order.delivered_at)
        .bind(order.cancelled_at)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e.as_database_error() {
            // idx_orders_payment_id
            Some(d) if d.is_unique_violation() => payment_failed("Payment has already been used"),
            _ => db_err(e),
        })?;

        if let Some(info) = &order.payment_info {
            sqlx::query("UPDATE payment_intents SET order_id = $2 WHERE gateway_order_id = $1")
                .bind(&info.gateway_order_id)
                .bind(&order.id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        // 只扣除已下单的数量，之后加入的行保留
        for item in &lines {
            sqlx::query(
                "UPDATE cart_items SET quantity = quantity - $3 \
                 WHERE user_id = $1 AND product_id = $2 AND quantity > $3",
            )
            .bind(&order.user_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
            sqlx::query(
                "DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2 AND quantity <= $3",
            )
            .bind(&order.user_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        sqlx::query("UPDATE carts SET updated_at = $2 WHERE user_id = $1")
            .bind(&order.user_id)
            .bind(order.created_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn get_order(&self, id: &str) -> AppResult<Option<Order>> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(Order::try_from).transpose()
    }

    async fn list_orders_for_user(&self, user_id: &str) -> AppResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(Order::try_from).collect()
    }

    async fn list_orders(&self, window: PageWindow) -> AppResult<(Vec<Order>, u64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(window.limit as i64)
        .bind(window.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let orders = rows
            .into_iter()
            .map(Order::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        Ok((orders, total as u64))
    }

    async fn save_order_status(&self, order: &Order, expected: OrderStatus) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET
                order_status = $2, payment_status = $3,
                delivered_at = $4, cancelled_at = $5, updated_at = $6
            WHERE id = $1 AND order_status = $7
            "#,
        )
        .bind(&order.id)
        .bind(order.order_status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.delivered_at)
        .bind(order.cancelled_at)
        .bind(order.updated_at)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_payment_intent(&self, intent: &PaymentIntentRecord) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO payment_intents (gateway_order_id, user_id, amount, currency, order_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&intent.gateway_order_id)
        .bind(&intent.user_id)
        .bind(intent.amount)
        .bind(&intent.currency)
        .bind(&intent.order_id)
        .bind(intent.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(d) if d.is_unique_violation() => AppError::with_message(
                ErrorCode::AlreadyExists,
                format!("Payment order {} already exists", intent.gateway_order_id),
            ),
            _ => db_err(e),
        })?;
        Ok(())
    }

    async fn get_payment_intent(
        &self,
        gateway_order_id: &str,
    ) -> AppResult<Option<PaymentIntentRecord>> {
        sqlx::query_as(
            "SELECT gateway_order_id, user_id, amount, currency, order_id, created_at \
             FROM payment_intents WHERE gateway_order_id = $1",
        )
        .bind(gateway_order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }
}

/// Lock the intent row; it must belong to the order's user and be unconsumed
async fn lock_payment_intent(
    tx: &mut Transaction<'_, Postgres>,
    order: &Order,
    info: &PaymentInfo,
) -> AppResult<()> {
    let intent: Option<PaymentIntentRecord> = sqlx::query_as(
        "SELECT gateway_order_id, user_id, amount, currency, order_id, created_at \
         FROM payment_intents WHERE gateway_order_id = $1 FOR UPDATE",
    )
    .bind(&info.gateway_order_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(db_err)?;

    let intent = intent.ok_or_else(|| payment_failed("Unknown payment order"))?;
    if intent.user_id != order.user_id {
        return Err(payment_failed("Payment order belongs to another user"));
    }
    if intent.is_consumed() {
        return Err(payment_failed("Payment has already been used"));
    }
    Ok(())
}

// ── Reviews ────────────────────────────────────────────────────────

/// Lock the product row; `false` if it does not exist
async fn lock_product(
    tx: &mut Transaction<'_, Postgres>,
    product_id: &str,
) -> Result<bool, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1 FOR UPDATE")
        .bind(product_id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row.is_some())
}

async fn recompute_rating(
    tx: &mut Transaction<'_, Postgres>,
    product_id: &str,
    now: i64,
) -> Result<RatingSummary, sqlx::Error> {
    let (rating, num_reviews): (f64, i32) = sqlx::query_as(
        r#"
        UPDATE products SET
            rating = COALESCE((SELECT AVG(rating)::float8 FROM reviews WHERE product_id = $1), 0),
            num_reviews = (SELECT COUNT(*)::int4 FROM reviews WHERE product_id = $1),
            updated_at = $2
        WHERE id = $1
        RETURNING rating, num_reviews
        "#,
    )
    .bind(product_id)
    .bind(now)
    .fetch_one(&mut **tx)
    .await?;
    Ok(RatingSummary {
        rating,
        num_reviews,
    })
}

#[async_trait]
impl ReviewRepository for PgStorage {
    async fn list_reviews(&self, product_id: &str) -> AppResult<Vec<Review>> {
        sqlx::query_as::<_, Review>(
            r#"
            SELECT id, product_id, user_id, user_name, rating, comment, created_at, updated_at
            FROM reviews WHERE product_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn upsert_review(&self, review: &Review) -> AppResult<Option<RatingSummary>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        if !lock_product(&mut tx, &review.product_id).await.map_err(db_err)? {
            return Ok(None);
        }

        sqlx::query(
            r#"
            INSERT INTO reviews (id, product_id, user_id, user_name, rating, comment, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (product_id, user_id) DO UPDATE SET
                user_name = EXCLUDED.user_name,
                rating = EXCLUDED.rating,
                comment = EXCLUDED.comment,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&review.id)
        .bind(&review.product_id)
        .bind(&review.user_id)
        .bind(&review.user_name)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.created_at)
        .bind(review.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let summary = recompute_rating(&mut tx, &review.product_id, review.updated_at)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(Some(summary))
    }

    async fn delete_review(
        &self,
        product_id: &str,
        review_id: &str,
    ) -> AppResult<Option<RatingSummary>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        if !lock_product(&mut tx, product_id).await.map_err(db_err)? {
            return Ok(None);
        }

        let result = sqlx::query("DELETE FROM reviews WHERE id = $1 AND product_id = $2")
            .bind(review_id)
            .bind(product_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let summary = recompute_rating(&mut tx, product_id, now_millis())
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(Some(summary))
    }
}
