//! Persistence seam.
//!
//! Handlers talk to a [`Repository`]; production runs on [`PgRepository`], tests and local
//! runs without `DATABASE_URL` use [`MemoryRepository`].

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{
    Delivery, Order, OrderStatus, Payment, Product, ProductCondition, Review, Rider, User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("duplicate {0}")]
    Duplicate(&'static str),
    #[error("{0} not found")]
    Missing(&'static str),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    pub const MAX_PER_PAGE: u32 = 100;

    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(20).clamp(1, Self::MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> u64 { u64::from(self.page - 1) * u64::from(self.per_page) }

    /// Slices an already filtered and ordered list.
    pub fn apply<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(usize::try_from(self.offset()).unwrap_or(usize::MAX))
            .take(self.per_page as usize)
            .cloned()
            .collect()
    }
}

impl Default for Page {
    fn default() -> Self { Self::new(None, None) }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub condition: Option<ProductCondition>,
    pub zone: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub seller_id: Option<Uuid>,
    #[serde(default)]
    pub sort: ProductSort,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if !product.is_purchasable() { return false; }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            if !product.title().to_lowercase().contains(&needle)
                && !product.description().to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if !product.category().eq_ignore_ascii_case(category.trim()) { return false; }
        }
        if let Some(condition) = self.condition {
            if product.condition() != condition { return false; }
        }
        if let Some(zone) = &self.zone {
            if !product.campus_zone().as_str().eq_ignore_ascii_case(zone.trim()) { return false; }
        }
        if let Some(min) = self.min_price {
            if product.price().amount() < min { return false; }
        }
        if let Some(max) = self.max_price {
            if product.price().amount() > max { return false; }
        }
        if let Some(seller) = self.seller_id {
            if product.seller_id() != seller { return false; }
        }
        true
    }
}

#[async_trait]
pub trait Repository: Send + Sync {
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn save_user(&self, user: &User) -> StoreResult<()>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self, page: Page) -> StoreResult<(Vec<User>, u64)>;

    async fn save_product(&self, product: &Product) -> StoreResult<()>;
    async fn find_product(&self, id: Uuid) -> StoreResult<Option<Product>>;
    async fn list_products(&self, filter: &ProductFilter, page: Page) -> StoreResult<(Vec<Product>, u64)>;

    /// Stores a new order with its payment and delivery records in one unit.
    async fn insert_order(&self, order: &Order, payment: &Payment, delivery: &Delivery) -> StoreResult<()>;
    async fn save_order(&self, order: &Order) -> StoreResult<()>;
    async fn find_order(&self, id: Uuid) -> StoreResult<Option<Order>>;
    async fn list_orders(&self, customer_id: Option<Uuid>, status: Option<OrderStatus>, page: Page) -> StoreResult<(Vec<Order>, u64)>;

    async fn save_payment(&self, payment: &Payment) -> StoreResult<()>;
    async fn find_payment(&self, order_id: Uuid) -> StoreResult<Option<Payment>>;
    async fn find_payment_by_reference(&self, reference: &str) -> StoreResult<Option<Payment>>;

    async fn save_delivery(&self, delivery: &Delivery) -> StoreResult<()>;
    /// Writes a delivery step, the order it moved and the rider it credited as one unit.
    async fn save_delivery_progress(&self, delivery: &Delivery, order: &Order, rider: Option<&Rider>) -> StoreResult<()>;
    async fn find_delivery(&self, order_id: Uuid) -> StoreResult<Option<Delivery>>;

    async fn insert_rider(&self, rider: &Rider) -> StoreResult<()>;
    async fn save_rider(&self, rider: &Rider) -> StoreResult<()>;
    async fn find_rider(&self, id: Uuid) -> StoreResult<Option<Rider>>;
    async fn find_rider_by_user(&self, user_id: Uuid) -> StoreResult<Option<Rider>>;
    async fn list_riders(&self, zone: Option<&str>) -> StoreResult<Vec<Rider>>;

    async fn insert_review(&self, review: &Review) -> StoreResult<()>;
    async fn list_reviews(&self, product_id: Uuid) -> StoreResult<Vec<Review>>;

    /// Cart lines as `(product_id, quantity)` in insertion order.
    async fn cart_lines(&self, user_id: Uuid) -> StoreResult<Vec<(Uuid, u32)>>;
    /// Sets a cart line; zero deletes it.
    async fn set_cart_quantity(&self, user_id: Uuid, product_id: Uuid, quantity: u32) -> StoreResult<()>;
    async fn clear_cart(&self, user_id: Uuid) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds() {
        let page = Page::new(Some(0), Some(500));
        assert_eq!(page, Page { page: 1, per_page: 100 });
        assert_eq!(Page::new(Some(3), Some(10)).offset(), 20);
        assert_eq!(Page::new(Some(2), Some(2)).apply(&[1, 2, 3, 4, 5]), vec![3, 4]);
        assert!(Page::new(Some(9), Some(2)).apply(&[1, 2, 3]).is_empty());
    }
}
