//! Product Aggregate
//!
//! A listing posted by a student seller. Deleting a listing only marks it `removed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::UnknownStatus;
use crate::domain::value_objects::{CampusZone, Money};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    pub(crate) id: Uuid,
    pub(crate) seller_id: Uuid,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) price: Money,
    pub(crate) category: String,
    pub(crate) condition: ProductCondition,
    pub(crate) campus_zone: CampusZone,
    pub(crate) images: Vec<String>,
    pub(crate) status: ProductStatus,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCondition { New, LikeNew, #[default] Good, Fair }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus { #[default] Active, Sold, Removed }

impl ProductCondition {
    pub fn as_str(&self) -> &'static str {
        match self { Self::New => "new", Self::LikeNew => "like_new", Self::Good => "good", Self::Fair => "fair" }
    }
}

impl FromStr for ProductCondition {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "like_new" => Ok(Self::LikeNew),
            "good" => Ok(Self::Good),
            "fair" => Ok(Self::Fair),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Active => "active", Self::Sold => "sold", Self::Removed => "removed" }
    }
}

impl FromStr for ProductStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "sold" => Ok(Self::Sold),
            "removed" => Ok(Self::Removed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Fields a seller can set when listing or editing an item.
#[derive(Clone, Debug, Default)]
pub struct ListingDetails {
    pub title: String,
    pub description: String,
    pub price: Money,
    pub category: String,
    pub condition: ProductCondition,
    pub images: Vec<String>,
}

impl Product {
    pub fn list(seller_id: Uuid, details: ListingDetails, campus_zone: CampusZone) -> Result<Self, ProductError> {
        Self::check(&details)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(),
            seller_id,
            title: details.title.trim().to_string(),
            description: details.description,
            price: details.price,
            category: details.category.trim().to_lowercase(),
            condition: details.condition,
            campus_zone,
            images: details.images,
            status: ProductStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn seller_id(&self) -> Uuid { self.seller_id }
    pub fn title(&self) -> &str { &self.title }
    pub fn description(&self) -> &str { &self.description }
    pub fn price(&self) -> &Money { &self.price }
    pub fn category(&self) -> &str { &self.category }
    pub fn condition(&self) -> ProductCondition { self.condition }
    pub fn campus_zone(&self) -> &CampusZone { &self.campus_zone }
    pub fn images(&self) -> &[String] { &self.images }
    pub fn status(&self) -> ProductStatus { self.status }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn is_purchasable(&self) -> bool { self.status == ProductStatus::Active }

    pub fn revise(&mut self, details: ListingDetails) -> Result<(), ProductError> {
        if self.status == ProductStatus::Removed { return Err(ProductError::Removed); }
        Self::check(&details)?;
        self.title = details.title.trim().to_string();
        self.description = details.description;
        self.price = details.price;
        self.category = details.category.trim().to_lowercase();
        self.condition = details.condition;
        self.images = details.images;
        self.touch();
        Ok(())
    }

    pub fn mark_sold(&mut self) { self.status = ProductStatus::Sold; self.touch(); }
    pub fn remove(&mut self) { self.status = ProductStatus::Removed; self.touch(); }

    fn check(details: &ListingDetails) -> Result<(), ProductError> {
        if details.title.trim().is_empty() { return Err(ProductError::MissingTitle); }
        if details.price.is_zero() || details.price.is_negative() { return Err(ProductError::NonPositivePrice); }
        if !details.price.is_minor_unit_exact() { return Err(ProductError::SubMinorPrice); }
        Ok(())
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("listing needs a title")]
    MissingTitle,
    #[error("price must be positive")]
    NonPositivePrice,
    #[error("price cannot go below one pesewa")]
    SubMinorPrice,
    #[error("listing has been removed")]
    Removed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn details(title: &str, price: Decimal) -> ListingDetails {
        ListingDetails { title: title.into(), price: Money::ghs(price), category: " Books ".into(), ..Default::default() }
    }

    #[test]
    fn test_product_list() {
        let p = Product::list(Uuid::new_v4(), details("Calculus, 8th ed.", Decimal::new(8500, 2)), CampusZone::new("main").unwrap()).unwrap();
        assert_eq!(p.title(), "Calculus, 8th ed.");
        assert_eq!(p.category(), "books");
        assert!(p.is_purchasable());
    }

    #[test]
    fn test_rejects_bad_listings() {
        let zone = CampusZone::new("main").unwrap();
        assert_eq!(Product::list(Uuid::new_v4(), details(" ", Decimal::ONE), zone.clone()).unwrap_err(), ProductError::MissingTitle);
        assert_eq!(Product::list(Uuid::new_v4(), details("Kettle", Decimal::ZERO), zone.clone()).unwrap_err(), ProductError::NonPositivePrice);
        assert_eq!(Product::list(Uuid::new_v4(), details("Kettle", Decimal::new(1001, 3)), zone).unwrap_err(), ProductError::SubMinorPrice);
    }

    #[test]
    fn test_removed_listing_is_frozen() {
        let mut p = Product::list(Uuid::new_v4(), details("Fan", Decimal::new(120, 0)), CampusZone::new("main").unwrap()).unwrap();
        p.remove();
        assert!(!p.is_purchasable());
        assert_eq!(p.revise(details("Fan", Decimal::new(100, 0))).unwrap_err(), ProductError::Removed);
    }
}
