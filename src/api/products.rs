use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::api::auth::AuthUser;
use crate::api::envelope::ApiResponse;
use crate::api::error::{AppError, Result, ValidatedJson};
use crate::api::AppState;
use crate::domain::aggregates::{ListingDetails, Product, ProductCondition, ProductStatus, User};
use crate::domain::value_objects::{CampusZone, Money};
use crate::store::{Page, ProductFilter, ProductSort};

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub condition: Option<ProductCondition>,
    pub zone: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub seller_id: Option<Uuid>,
    pub sort: Option<ProductSort>,
}

impl ProductQuery {
    fn split(self) -> (ProductFilter, Page) {
        let filter = ProductFilter {
            search: self.search,
            category: self.category,
            condition: self.condition,
            zone: self.zone,
            min_price: self.min_price,
            max_price: self.max_price,
            seller_id: self.seller_id,
            sort: self.sort.unwrap_or_default(),
        };
        (filter, Page::new(self.page, self.per_page))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 3, max = 120, message = "Title must be between 3 and 120 characters"))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 2000, message = "Description is too long"))]
    pub description: String,
    pub price: Decimal,
    #[validate(length(min = 1, max = 50, message = "Pick a category"))]
    pub category: String,
    #[serde(default)]
    pub condition: ProductCondition,
    pub campus_zone: Option<String>,
    #[serde(default)]
    #[validate(length(max = 8, message = "At most 8 images per listing"))]
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 3, max = 120, message = "Title must be between 3 and 120 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 2000, message = "Description is too long"))]
    pub description: Option<String>,
    pub price: Option<Decimal>,
    #[validate(length(min = 1, max = 50, message = "Pick a category"))]
    pub category: Option<String>,
    pub condition: Option<ProductCondition>,
    #[validate(length(max = 8, message = "At most 8 images per listing"))]
    pub images: Option<Vec<String>>,
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<ApiResponse<Vec<Product>>> {
    let (filter, page) = query.split();
    let (products, total) = state.repo.list_products(&filter, page).await?;
    Ok(ApiResponse::paginated(products, page, total))
}

pub async fn get_product(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<ApiResponse<Product>> {
    let product = state
        .repo
        .find_product(id)
        .await?
        .filter(|p| p.status() != ProductStatus::Removed)
        .ok_or(AppError::NotFound("product"))?;
    Ok(ApiResponse::ok(product))
}

pub async fn create_product(
    State(state): State<AppState>,
    AuthUser(seller): AuthUser,
    ValidatedJson(body): ValidatedJson<CreateProductRequest>,
) -> Result<(StatusCode, ApiResponse<Product>)> {
    let zone = match body.campus_zone {
        Some(zone) => CampusZone::new(zone)?,
        None => seller
            .campus_zone
            .clone()
            .ok_or_else(|| AppError::field("campus_zone", "Choose the campus zone the item is in"))?,
    };
    let details = ListingDetails {
        title: body.title,
        description: body.description,
        price: Money::new(body.price, &state.config.currency),
        category: body.category,
        condition: body.condition,
        images: body.images,
    };
    let product = Product::list(seller.id, details, zone)?;
    state.repo.save_product(&product).await?;
    tracing::info!(product_id = %product.id(), seller_id = %seller.id, "listing created");
    Ok((StatusCode::CREATED, ApiResponse::ok(product).with_message("Listing published")))
}

pub async fn update_product(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<UpdateProductRequest>,
) -> Result<ApiResponse<Product>> {
    let mut product = owned_product(&state, &user, id).await?;
    let details = ListingDetails {
        title: body.title.unwrap_or_else(|| product.title().to_string()),
        description: body.description.unwrap_or_else(|| product.description().to_string()),
        price: body
            .price
            .map(|price| Money::new(price, &state.config.currency))
            .unwrap_or_else(|| product.price().clone()),
        category: body.category.unwrap_or_else(|| product.category().to_string()),
        condition: body.condition.unwrap_or(product.condition()),
        images: body.images.unwrap_or_else(|| product.images().to_vec()),
    };
    product.revise(details)?;
    state.repo.save_product(&product).await?;
    Ok(ApiResponse::ok(product).with_message("Listing updated"))
}

pub async fn delete_product(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<()>> {
    let mut product = owned_product(&state, &user, id).await?;
    product.remove();
    state.repo.save_product(&product).await?;
    tracing::info!(product_id = %id, "listing removed");
    Ok(ApiResponse::message("Listing removed"))
}

/// Loads a listing the user may edit: their own, or any for an admin.
async fn owned_product(state: &AppState, user: &User, id: Uuid) -> Result<Product> {
    let product = state.repo.find_product(id).await?.ok_or(AppError::NotFound("product"))?;
    if product.seller_id() != user.id && !user.is_admin() {
        return Err(AppError::Forbidden("only the seller can change this listing"));
    }
    Ok(product)
}
