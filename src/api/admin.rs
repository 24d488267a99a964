//! Back-office operations: order overrides, rider dispatch, and account management.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::api::auth::AdminUser;
use crate::api::deliveries::{tracking_record, TrackingRecord};
use crate::api::envelope::ApiResponse;
use crate::api::error::{AppError, Result, ValidatedJson};
use crate::api::orders::{cancel_with_delivery, OrderQuery};
use crate::api::AppState;
use crate::domain::aggregates::{DeliveryStatus, Order, OrderStatus, Rider, Role, User};
use crate::domain::value_objects::CampusZone;
use crate::store::Page;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct OrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AssignRiderRequest {
    pub rider_id: Uuid,
    #[validate(range(min = 0, max = 720, message = "Arrival estimate must be within 12 hours"))]
    pub eta_minutes: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RiderQuery {
    pub zone: Option<String>,
    pub available: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRiderRequest {
    pub user_id: Uuid,
    pub zone: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct AvailabilityRequest {
    pub is_available: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

pub async fn list_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<OrderQuery>,
) -> Result<ApiResponse<Vec<Order>>> {
    let (status, page) = query.split()?;
    let (orders, total) = state.repo.list_orders(None, status, page).await?;
    Ok(ApiResponse::paginated(orders, page, total))
}

/// Applies one validated transition. Cancelling also fails an unfinished delivery; other
/// overrides leave the delivery alone.
pub async fn update_order_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<OrderStatusRequest>,
) -> Result<ApiResponse<Order>> {
    let mut order = state.repo.find_order(id).await?.ok_or(AppError::NotFound("order"))?;
    let from = order.status();
    if matches!(body.status, OrderStatus::OutForDelivery | OrderStatus::Delivered) {
        let delivery = state.repo.find_delivery(id).await?;
        if delivery.map_or(true, |d| d.status() == DeliveryStatus::Pending) {
            return Err(AppError::conflict(format!("assign a rider before moving the order to {}", body.status)));
        }
    }
    if body.status == OrderStatus::Cancelled {
        cancel_with_delivery(&state, &mut order, "order cancelled by admin").await?;
    } else {
        order.transition_to(body.status)?;
        state.repo.save_order(&order).await?;
        state.events.publish_all(order.take_events()).await;
    }
    tracing::info!(order_id = %id, %from, to = %body.status, admin_id = %admin.id, "order status overridden");
    Ok(ApiResponse::ok(order).with_message(format!("Order moved to {}", body.status)))
}

pub async fn assign_rider(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(order_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<AssignRiderRequest>,
) -> Result<ApiResponse<TrackingRecord>> {
    let order = state.repo.find_order(order_id).await?.ok_or(AppError::NotFound("order"))?;
    if order.status() != OrderStatus::Processing {
        return Err(AppError::conflict(format!("order is {}; only processing orders can be dispatched", order.status())));
    }
    let mut delivery = state.repo.find_delivery(order_id).await?.ok_or(AppError::NotFound("delivery"))?;
    let rider = state.repo.find_rider(body.rider_id).await?.ok_or(AppError::NotFound("rider"))?;
    if !rider.is_available() {
        return Err(AppError::conflict(format!("{} is offline", rider.name())));
    }
    if !rider.can_take(order.campus_zone()) {
        return Err(AppError::conflict(format!("{} covers {}, not {}", rider.name(), rider.zone(), order.campus_zone())));
    }

    let eta = body.eta_minutes.map(|minutes| Utc::now() + Duration::minutes(minutes));
    delivery.assign(rider.id(), eta)?;
    state.repo.save_delivery(&delivery).await?;
    state.events.publish_all(delivery.take_events()).await;
    tracing::info!(%order_id, rider_id = %rider.id(), "rider assigned");
    Ok(ApiResponse::ok(tracking_record(&state, &order, &delivery).await?).with_message("Rider assigned"))
}

pub async fn list_riders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<RiderQuery>,
) -> Result<ApiResponse<Vec<Rider>>> {
    let zone = query.zone.as_deref().map(str::trim).filter(|z| !z.is_empty());
    let mut riders = state.repo.list_riders(zone).await?;
    if let Some(available) = query.available {
        riders.retain(|r| r.is_available() == available);
    }
    Ok(ApiResponse::ok(riders))
}

/// Enlists an existing account as a rider. New riders start offline.
pub async fn create_rider(
    State(state): State<AppState>,
    _admin: AdminUser,
    ValidatedJson(body): ValidatedJson<CreateRiderRequest>,
) -> Result<(StatusCode, ApiResponse<Rider>)> {
    let zone = CampusZone::new(body.zone)?;
    let mut user = state.repo.find_user(body.user_id).await?.ok_or(AppError::NotFound("user"))?;
    let rider = Rider::enlist(user.id, user.name.clone(), zone);
    state.repo.insert_rider(&rider).await?;
    if user.role == Role::Customer {
        user.role = Role::Rider;
        user.touch();
        state.repo.save_user(&user).await?;
    }
    tracing::info!(rider_id = %rider.id(), user_id = %user.id, zone = %rider.zone(), "rider enlisted");
    Ok((StatusCode::CREATED, ApiResponse::ok(rider).with_message("Rider added")))
}

pub async fn set_rider_availability(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<AvailabilityRequest>,
) -> Result<ApiResponse<Rider>> {
    let mut rider = state.repo.find_rider(id).await?.ok_or(AppError::NotFound("rider"))?;
    if rider.set_availability(body.is_available) {
        state.repo.save_rider(&rider).await?;
        state.events.publish_all(rider.take_events()).await;
        tracing::info!(rider_id = %id, is_available = body.is_available, "rider availability changed");
    }
    Ok(ApiResponse::ok(rider))
}

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<UserQuery>,
) -> Result<ApiResponse<Vec<User>>> {
    let page = Page::new(query.page, query.per_page);
    let (users, total) = state.repo.list_users(page).await?;
    Ok(ApiResponse::paginated(users, page, total))
}

pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<UpdateUserRequest>,
) -> Result<ApiResponse<User>> {
    if id == admin.id && (body.role.is_some_and(|r| r != Role::Admin) || body.is_active == Some(false)) {
        return Err(AppError::Forbidden("admins cannot demote or deactivate themselves"));
    }
    let mut user = state.repo.find_user(id).await?.ok_or(AppError::NotFound("user"))?;
    if let Some(role) = body.role {
        user.role = role;
    }
    if let Some(is_active) = body.is_active {
        user.is_active = is_active;
    }
    user.touch();
    state.repo.save_user(&user).await?;
    tracing::info!(user_id = %id, role = %user.role.as_str(), is_active = user.is_active, "account updated");
    Ok(ApiResponse::ok(user))
}
