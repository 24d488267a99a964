use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::api::auth::AuthUser;
use crate::api::envelope::ApiResponse;
use crate::api::error::{AppError, Result, ValidatedJson};
use crate::api::AppState;
use crate::domain::aggregates::{Cart, CartItem, Product, MAX_LINE_QUANTITY};
use crate::domain::value_objects::Money;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub subtotal: Money,
    pub item_count: u32,
}

impl From<Cart> for CartView {
    fn from(cart: Cart) -> Self {
        Self { item_count: cart.item_count(), subtotal: cart.subtotal().clone(), items: cart.items().to_vec() }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[serde(default = "one")]
    #[validate(range(min = 1, max = 99, message = "Quantity must be between 1 and 99"))]
    pub quantity: u32,
}

fn one() -> u32 { 1 }

#[derive(Debug, Deserialize, Validate)]
pub struct SetQuantityRequest {
    #[validate(range(max = 99, message = "Quantity must be between 0 and 99"))]
    pub quantity: u32,
}

/// Prices every stored line against the live catalog. Lines for listings that were sold or
/// removed are dropped from the view.
pub(crate) async fn load_cart(state: &AppState, user_id: Uuid) -> Result<Cart> {
    let mut items = Vec::new();
    for (product_id, quantity) in state.repo.cart_lines(user_id).await? {
        match state.repo.find_product(product_id).await? {
            Some(product) if product.is_purchasable() => items.push(CartItem {
                product_id,
                title: product.title().to_string(),
                quantity,
                unit_price: product.price().clone(),
            }),
            _ => tracing::debug!(%user_id, %product_id, "skipping unavailable cart line"),
        }
    }
    Ok(Cart::from_items(&state.config.currency, items))
}

async fn purchasable(state: &AppState, product_id: Uuid) -> Result<Product> {
    let product = state.repo.find_product(product_id).await?.ok_or(AppError::NotFound("product"))?;
    if !product.is_purchasable() {
        return Err(AppError::conflict("this item is no longer available"));
    }
    Ok(product)
}

pub async fn get_cart(State(state): State<AppState>, AuthUser(user): AuthUser) -> Result<ApiResponse<CartView>> {
    Ok(ApiResponse::ok(load_cart(&state, user.id).await?.into()))
}

pub async fn add_item(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidatedJson(body): ValidatedJson<AddItemRequest>,
) -> Result<ApiResponse<CartView>> {
    let product = purchasable(&state, body.product_id).await?;
    let mut cart = load_cart(&state, user.id).await?;
    cart.add_item(CartItem {
        product_id: product.id(),
        title: product.title().to_string(),
        quantity: body.quantity,
        unit_price: product.price().clone(),
    });
    state.repo.set_cart_quantity(user.id, product.id(), cart.quantity_of(product.id())).await?;
    Ok(ApiResponse::ok(cart.into()).with_message("Added to cart"))
}

/// Sets a line's quantity, adding the line when it is new. Zero removes it.
pub async fn set_quantity(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(product_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<SetQuantityRequest>,
) -> Result<ApiResponse<CartView>> {
    let mut cart = load_cart(&state, user.id).await?;
    if body.quantity > 0 && cart.quantity_of(product_id) == 0 {
        let product = purchasable(&state, product_id).await?;
        cart.add_item(CartItem {
            product_id,
            title: product.title().to_string(),
            quantity: body.quantity.min(MAX_LINE_QUANTITY),
            unit_price: product.price().clone(),
        });
    } else if cart.quantity_of(product_id) > 0 {
        cart.set_quantity(product_id, body.quantity)?;
    }
    state.repo.set_cart_quantity(user.id, product_id, body.quantity).await?;
    Ok(ApiResponse::ok(cart.into()))
}

pub async fn remove_item(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<ApiResponse<CartView>> {
    let mut cart = load_cart(&state, user.id).await?;
    cart.remove_item(product_id)?;
    state.repo.set_cart_quantity(user.id, product_id, 0).await?;
    Ok(ApiResponse::ok(cart.into()).with_message("Removed from cart"))
}

pub async fn clear_cart(State(state): State<AppState>, AuthUser(user): AuthUser) -> Result<ApiResponse<()>> {
    state.repo.clear_cart(user.id).await?;
    Ok(ApiResponse::message("Cart cleared"))
}
