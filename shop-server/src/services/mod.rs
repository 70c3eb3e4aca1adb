//! 目录 / 购物车 / 评论服务

pub mod cart;
pub mod catalog;
pub mod reviews;

pub use cart::CartService;
pub use catalog::CatalogService;
pub use reviews::ReviewService;
