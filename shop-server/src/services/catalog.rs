//! 商品目录

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{
    DEFAULT_BRAND, Product, ProductCreate, ProductImage, ProductQuery, ProductUpdate,
};
use shared::response::{PageWindow, Paginated};
use shared::util::{new_id, now_millis};
use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::db::Storage;
use crate::validation::{
    MAX_DESCRIPTION_LEN, MAX_NAME_LEN, MAX_URL_LEN, require_text, validate_optional_text,
    validate_price, validate_required_text, validate_stock,
};

const DEFAULT_PRODUCT_PAGE_LIMIT: u32 = 10;

fn product_not_found(id: &str) -> AppError {
    AppError::with_message(ErrorCode::ProductNotFound, format!("Product not found: {id}"))
}

fn validate_images(images: &[ProductImage]) -> AppResult<()> {
    for image in images {
        validate_required_text(&image.url, "images.url", MAX_URL_LEN)?;
    }
    Ok(())
}

#[derive(Clone)]
pub struct CatalogService {
    storage: Arc<dyn Storage>,
}

impl CatalogService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn list(&self, query: ProductQuery) -> AppResult<Paginated<Product>> {
        if let (Some(min), Some(max)) = (query.min_price, query.max_price)
            && min > max
        {
            return Err(AppError::with_message(
                ErrorCode::ValueOutOfRange,
                "min_price must not exceed max_price",
            ));
        }
        let window = PageWindow::resolve(query.page, query.limit, DEFAULT_PRODUCT_PAGE_LIMIT);
        let (items, total) = self.storage.list_products(&query, window).await?;
        Ok(Paginated::new(items, total, window.page, window.limit))
    }

    pub async fn get(&self, id: &str) -> AppResult<Product> {
        self.storage
            .get_product(id)
            .await?
            .ok_or_else(|| product_not_found(id))
    }

    pub async fn create(&self, admin: &CurrentUser, input: ProductCreate) -> AppResult<Product> {
        let name = require_text(input.name, "name", MAX_NAME_LEN)?;
        let description = require_text(input.description, "description", MAX_DESCRIPTION_LEN)?;
        let category = require_text(input.category, "category", MAX_NAME_LEN)?;
        let price = input.price.ok_or_else(|| AppError::required("price"))?;
        validate_price(price)?;
        let stock = input.stock.ok_or_else(|| AppError::required("stock"))?;
        validate_stock(stock)?;
        validate_optional_text(&input.brand, "brand", MAX_NAME_LEN)?;
        let images = input.images.unwrap_or_default();
        validate_images(&images)?;

        let now = now_millis();
        let product = Product {
            id: new_id(),
            name,
            description,
            price,
            stock,
            category,
            brand: input
                .brand
                .filter(|b| !b.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BRAND.to_string()),
            images,
            is_featured: input.is_featured.unwrap_or(false),
            created_by: Some(admin.id.clone()),
            rating: 0.0,
            num_reviews: 0,
            created_at: now,
            updated_at: now,
        };
        self.storage.insert_product(&product).await?;

        tracing::info!(product_id = %product.id, admin_id = %admin.id, "Product created");
        Ok(product)
    }

    /// Partial patch; rating and review count are never touched
    pub async fn update(&self, id: &str, patch: ProductUpdate) -> AppResult<Product> {
        if let Some(name) = &patch.name {
            validate_required_text(name, "name", MAX_NAME_LEN)?;
        }
        if let Some(description) = &patch.description {
            validate_required_text(description, "description", MAX_DESCRIPTION_LEN)?;
        }
        if let Some(category) = &patch.category {
            validate_required_text(category, "category", MAX_NAME_LEN)?;
        }
        validate_optional_text(&patch.brand, "brand", MAX_NAME_LEN)?;
        if let Some(price) = patch.price {
            validate_price(price)?;
        }
        if let Some(stock) = patch.stock {
            validate_stock(stock)?;
        }
        if let Some(images) = &patch.images {
            validate_images(images)?;
        }

        let mut product = self.get(id).await?;
        patch.apply_to(&mut product);
        product.updated_at = now_millis();

        if !self.storage.update_product(&product).await? {
            return Err(product_not_found(id));
        }
        tracing::info!(product_id = %id, "Product updated");
        // 重新读取，拿到存储层保留的评分字段
        self.get(id).await
    }

    pub async fn delete(&self, id: &str) -> AppResult<()> {
        if !self.storage.delete_product(id).await? {
            return Err(product_not_found(id));
        }
        tracing::info!(product_id = %id, "Product deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStorage;

    fn admin() -> CurrentUser {
        CurrentUser {
            id: "admin-1".into(),
            name: "Admin".into(),
            email: "admin@example.com".into(),
            role: "admin".into(),
        }
    }

    fn create_input(name: &str, price: f64) -> ProductCreate {
        ProductCreate {
            name: Some(name.into()),
            description: Some("A thing".into()),
            price: Some(price),
            stock: Some(10),
            category: Some("kitchen".into()),
            ..Default::default()
        }
    }

    fn service() -> CatalogService {
        CatalogService::new(Arc::new(MemoryStorage::new()))
    }

    #[tokio::test]
    async fn create_defaults_brand_and_owner() {
        let svc = service();
        let p = svc.create(&admin(), create_input("Mug", 250.0)).await.unwrap();
        assert_eq!(p.brand, DEFAULT_BRAND);
        assert_eq!(p.created_by.as_deref(), Some("admin-1"));
        assert_eq!(p.num_reviews, 0);
        assert_eq!(svc.get(&p.id).await.unwrap(), p);
    }

    #[tokio::test]
    async fn create_requires_fields() {
        let svc = service();
        let mut input = create_input("Mug", 1.0);
        input.category = None;
        let err = svc.create(&admin(), input).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RequiredField);

        let err = svc
            .create(&admin(), create_input("Mug", -1.0))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ProductInvalidPrice);

        let mut input = create_input("Mug", 1.0);
        input.stock = Some(-3);
        let err = svc.create(&admin(), input).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValueOutOfRange);
    }

    #[tokio::test]
    async fn update_is_partial() {
        let svc = service();
        let p = svc.create(&admin(), create_input("Mug", 250.0)).await.unwrap();
        let updated = svc
            .update(
                &p.id,
                ProductUpdate {
                    stock: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.stock, 3);
        assert_eq!(updated.name, "Mug");
        assert_eq!(updated.price, 250.0);
    }

    #[tokio::test]
    async fn missing_product_is_not_found() {
        let svc = service();
        assert_eq!(
            svc.get("nope").await.unwrap_err().code,
            ErrorCode::ProductNotFound
        );
        assert_eq!(
            svc.delete("nope").await.unwrap_err().code,
            ErrorCode::ProductNotFound
        );
        assert_eq!(
            svc.update("nope", ProductUpdate::default())
                .await
                .unwrap_err()
                .code,
            ErrorCode::ProductNotFound
        );
    }

    #[tokio::test]
    async fn list_filters_and_paginates() {
        let svc = service();
        for (name, price) in [("Blue Mug", 100.0), ("Red Mug", 300.0), ("Plate", 200.0)] {
            svc.create(&admin(), create_input(name, price)).await.unwrap();
        }

        let page = svc
            .list(ProductQuery {
                keyword: Some("mug".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 2);
        assert_eq!(page.pagination.limit, DEFAULT_PRODUCT_PAGE_LIMIT);

        let err = svc
            .list(ProductQuery {
                min_price: Some(5.0),
                max_price: Some(1.0),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValueOutOfRange);
    }
}
