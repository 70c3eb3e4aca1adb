//! Review Model

use serde::{Deserialize, Serialize};

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

/// Product review, one per (user, product)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Review {
    pub id: String,
    pub product_id: String,
    pub user_id: String,
    /// Display name captured when the review was written
    pub user_name: String,
    pub rating: i32,
    pub comment: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// `POST /api/reviews/{product_id}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewInput {
    pub rating: Option<i32>,
    pub comment: Option<String>,
}

/// Derived rating fields of a product
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub rating: f64,
    pub num_reviews: i32,
}

impl RatingSummary {
    /// Mean of all ratings; 0 when there are none
    pub fn from_reviews(reviews: &[Review]) -> Self {
        if reviews.is_empty() {
            return Self {
                rating: 0.0,
                num_reviews: 0,
            };
        }
        let sum: i64 = reviews.iter().map(|r| r.rating as i64).sum();
        Self {
            rating: sum as f64 / reviews.len() as f64,
            num_reviews: reviews.len() as i32,
        }
    }
}

/// `GET /api/reviews/{product_id}` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductReviews {
    pub reviews: Vec<Review>,
    pub rating: f64,
    pub num_reviews: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(user: &str, rating: i32) -> Review {
        Review {
            id: format!("r-{user}"),
            product_id: "p1".into(),
            user_id: user.into(),
            user_name: user.into(),
            rating,
            comment: "ok".into(),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_summary_empty() {
        let s = RatingSummary::from_reviews(&[]);
        assert_eq!(s.rating, 0.0);
        assert_eq!(s.num_reviews, 0);
    }

    #[test]
    fn test_summary_mean() {
        let s = RatingSummary::from_reviews(&[review("a", 5), review("b", 4), review("c", 4)]);
        assert_eq!(s.num_reviews, 3);
        assert!((s.rating - 13.0 / 3.0).abs() < 1e-9);
    }
}
