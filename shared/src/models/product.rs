//! Product Model

use serde::{Deserialize, Serialize};

/// Default brand when none is supplied
pub const DEFAULT_BRAND: &str = "Generic";

/// Product image reference (CDN url + provider id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_id: Option<String>,
}

/// Product entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    /// Units on hand, never negative
    pub stock: i32,
    pub category: String,
    pub brand: String,
    pub images: Vec<ProductImage>,
    pub is_featured: bool,
    /// Admin user id
    pub created_by: Option<String>,
    /// Mean review rating (0 when unreviewed)
    pub rating: f64,
    pub num_reviews: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Product {
    /// First image url, or empty
    pub fn primary_image(&self) -> &str {
        self.images.first().map(|i| i.url.as_str()).unwrap_or("")
    }
}

/// Create product payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductCreate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i32>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub images: Option<Vec<ProductImage>>,
    pub is_featured: Option<bool>,
}

/// Update product payload (partial)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i32>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub images: Option<Vec<ProductImage>>,
    pub is_featured: Option<bool>,
}

impl ProductUpdate {
    /// Apply the set fields onto `product`
    pub fn apply_to(self, product: &mut Product) {
        if let Some(v) = self.name {
            product.name = v;
        }
        if let Some(v) = self.description {
            product.description = v;
        }
        if let Some(v) = self.price {
            product.price = v;
        }
        if let Some(v) = self.stock {
            product.stock = v;
        }
        if let Some(v) = self.category {
            product.category = v;
        }
        if let Some(v) = self.brand {
            product.brand = v;
        }
        if let Some(v) = self.images {
            product.images = v;
        }
        if let Some(v) = self.is_featured {
            product.is_featured = v;
        }
    }
}

/// Sort key for catalog listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    #[serde(alias = "createdAt")]
    CreatedAt,
    Price,
    Rating,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Catalog listing query (`GET /api/products`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductQuery {
    /// Case-insensitive substring of the name
    pub keyword: Option<String>,
    /// Exact category
    pub category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub sort_by: Option<ProductSort>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ProductQuery {
    /// Whether `product` passes the keyword / category / price filters
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(kw) = self.keyword.as_deref().filter(|k| !k.is_empty())
            && !product.name.to_lowercase().contains(&kw.to_lowercase())
        {
            return false;
        }
        if let Some(cat) = self.category.as_deref().filter(|c| !c.is_empty())
            && product.category != cat
        {
            return false;
        }
        if let Some(min) = self.min_price
            && product.price < min
        {
            return false;
        }
        if let Some(max) = self.max_price
            && product.price > max
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, category: &str, price: f64) -> Product {
        Product {
            id: "p1".into(),
            name: name.into(),
            description: String::new(),
            price,
            stock: 1,
            category: category.into(),
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

    #[test]
    fn test_primary_image() {
        let mut p = product("Mug", "kitchen", 10.0);
        assert_eq!(p.primary_image(), "");
        p.images.push(ProductImage {
            url: "https://cdn/x.png".into(),
            public_id: None,
        });
        assert_eq!(p.primary_image(), "https://cdn/x.png");
    }

    #[test]
    fn test_query_matches() {
        let p = product("Blue Ceramic Mug", "kitchen", 250.0);

        let q = ProductQuery {
            keyword: Some("ceramic".into()),
            ..Default::default()
        };
        assert!(q.matches(&p));

        let q = ProductQuery {
            category: Some("Kitchen".into()),
            ..Default::default()
        };
        assert!(!q.matches(&p));

        let q = ProductQuery {
            min_price: Some(100.0),
            max_price: Some(250.0),
            ..Default::default()
        };
        assert!(q.matches(&p));

        let q = ProductQuery {
            max_price: Some(249.99),
            ..Default::default()
        };
        assert!(!q.matches(&p));
    }

    #[test]
    fn test_update_apply_is_partial() {
        let mut p = product("Mug", "kitchen", 10.0);
        ProductUpdate {
            price: Some(12.5),
            ..Default::default()
        }
        .apply_to(&mut p);
        assert_eq!(p.price, 12.5);
        assert_eq!(p.name, "Mug");
    }

    #[test]
    fn test_sort_aliases() {
        let s: ProductSort = serde_json::from_str("\"createdAt\"").unwrap();
        assert_eq!(s, ProductSort::CreatedAt);
        let s: ProductSort = serde_json::from_str("\"price\"").unwrap();
        assert_eq!(s, ProductSort::Price);
    }
}
