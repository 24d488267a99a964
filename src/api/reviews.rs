use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::api::auth::AuthUser;
use crate::api::envelope::ApiResponse;
use crate::api::error::{AppError, Result, ValidatedJson};
use crate::api::AppState;
use crate::domain::aggregates::{Review, ReviewSummary};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: u8,
    #[serde(default)]
    #[validate(length(max = 1000, message = "Keep the review under 1000 characters"))]
    pub comment: String,
}

#[derive(Debug, Serialize)]
pub struct ProductReviews {
    pub summary: ReviewSummary,
    pub reviews: Vec<Review>,
}

pub async fn create_review(
    State(state): State<AppState>,
    AuthUser(author): AuthUser,
    ValidatedJson(body): ValidatedJson<CreateReviewRequest>,
) -> Result<(StatusCode, ApiResponse<Review>)> {
    let product = state.repo.find_product(body.product_id).await?.ok_or(AppError::NotFound("product"))?;
    if product.seller_id() == author.id {
        return Err(AppError::Forbidden("you cannot review your own listing"));
    }
    let review = Review {
        id: Uuid::now_v7(),
        product_id: product.id(),
        author_id: author.id,
        author_name: author.name.clone(),
        rating: body.rating,
        comment: body.comment.trim().to_string(),
        created_at: Utc::now(),
    };
    state.repo.insert_review(&review).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(review).with_message("Thanks for your review")))
}

pub async fn list_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<ApiResponse<ProductReviews>> {
    let reviews = state.repo.list_reviews(product_id).await?;
    Ok(ApiResponse::ok(ProductReviews { summary: ReviewSummary::of(&reviews), reviews }))
}
