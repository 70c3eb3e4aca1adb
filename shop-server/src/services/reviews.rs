//! 商品评论与评分聚合

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{MAX_RATING, MIN_RATING, Product, ProductReviews, Review, ReviewInput};
use shared::util::{new_id, now_millis};
use std::sync::Arc;

use crate::auth::CurrentUser;
use crate::db::Storage;
use crate::validation::{MAX_COMMENT_LEN, require_text};

fn product_not_found(id: &str) -> AppError {
    AppError::with_message(ErrorCode::ProductNotFound, format!("Product not found: {id}"))
}

#[derive(Clone)]
pub struct ReviewService {
    storage: Arc<dyn Storage>,
}

impl ReviewService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn list(&self, product_id: &str) -> AppResult<ProductReviews> {
        let product = self
            .storage
            .get_product(product_id)
            .await?
            .ok_or_else(|| product_not_found(product_id))?;
        let reviews = self.storage.list_reviews(product_id).await?;
        Ok(ProductReviews {
            reviews,
            rating: product.rating,
            num_reviews: product.num_reviews,
        })
    }

    /// One review per (user, product); a second submission overwrites the first.
    /// Returns the product with its recomputed rating.
    pub async fn upsert(
        &self,
        user: &CurrentUser,
        product_id: &str,
        input: ReviewInput,
    ) -> AppResult<Product> {
        let rating = input.rating.ok_or_else(|| AppError::required("rating"))?;
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(AppError::with_message(
                ErrorCode::ReviewInvalidRating,
                format!("rating must be between {MIN_RATING} and {MAX_RATING}, got {rating}"),
            ));
        }
        let comment = require_text(input.comment, "comment", MAX_COMMENT_LEN)?;

        let now = now_millis();
        let review = Review {
            id: new_id(),
            product_id: product_id.to_string(),
            user_id: user.id.clone(),
            user_name: user.name.clone(),
            rating,
            comment,
            created_at: now,
            updated_at: now,
        };

        let summary = self
            .storage
            .upsert_review(&review)
            .await?
            .ok_or_else(|| product_not_found(product_id))?;
        tracing::info!(
            product_id = %product_id,
            user_id = %user.id,
            rating,
            num_reviews = summary.num_reviews,
            "Review saved"
        );

        self.storage
            .get_product(product_id)
            .await?
            .ok_or_else(|| product_not_found(product_id))
    }

    pub async fn delete(&self, product_id: &str, review_id: &str) -> AppResult<Product> {
        if self.storage.get_product(product_id).await?.is_none() {
            return Err(product_not_found(product_id));
        }
        let summary = self
            .storage
            .delete_review(product_id, review_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::ReviewNotFound))?;
        tracing::info!(
            product_id = %product_id,
            review_id = %review_id,
            num_reviews = summary.num_reviews,
            "Review deleted"
        );

        self.storage
            .get_product(product_id)
            .await?
            .ok_or_else(|| product_not_found(product_id))
    }
}
