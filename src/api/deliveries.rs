use axum::extract::{Path, State};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::api::auth::AuthUser;
use crate::api::envelope::ApiResponse;
use crate::api::error::{AppError, Result, ValidatedJson};
use crate::api::AppState;
use crate::domain::aggregates::{Delivery, DeliveryStatus, Order, OrderStatus, Rider, StatusChange, User};
use crate::domain::value_objects::CampusZone;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiderSummary {
    pub id: Uuid,
    pub name: String,
    pub zone: CampusZone,
    pub rating: f64,
    pub total_deliveries: u32,
}

impl From<&Rider> for RiderSummary {
    fn from(rider: &Rider) -> Self {
        Self {
            id: rider.id(),
            name: rider.name().to_string(),
            zone: rider.zone().clone(),
            rating: rider.rating(),
            total_deliveries: rider.total_deliveries(),
        }
    }
}

/// What the tracking page polls for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub order_id: Uuid,
    pub order_number: String,
    pub order_status: OrderStatus,
    pub status: DeliveryStatus,
    pub rider: Option<RiderSummary>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub estimated_arrival: Option<DateTime<Utc>>,
    pub eta_minutes: Option<i64>,
    pub timeline: Vec<StatusChange>,
}

impl TrackingRecord {
    pub fn new(order: &Order, delivery: &Delivery, rider: Option<&Rider>, now: DateTime<Utc>) -> Self {
        Self {
            order_id: order.id(),
            order_number: order.order_number().to_string(),
            order_status: order.status(),
            status: delivery.status(),
            rider: rider.map(RiderSummary::from),
            assigned_at: delivery.assigned_at(),
            delivered_at: delivery.delivered_at(),
            estimated_arrival: delivery.estimated_arrival(),
            eta_minutes: delivery.eta_minutes(now),
            timeline: delivery.history().to_vec(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateDeliveryRequest {
    pub status: DeliveryStatus,
    #[validate(length(max = 280, message = "Keep the note under 280 characters"))]
    pub note: Option<String>,
    /// Minutes from now the rider expects to arrive.
    #[validate(range(min = 0, max = 720, message = "Arrival estimate must be within 12 hours"))]
    pub eta_minutes: Option<i64>,
}

pub(crate) async fn tracking_record(state: &AppState, order: &Order, delivery: &Delivery) -> Result<TrackingRecord> {
    let rider = match delivery.rider_id() {
        Some(id) => state.repo.find_rider(id).await?,
        None => None,
    };
    Ok(TrackingRecord::new(order, delivery, rider.as_ref(), Utc::now()))
}

/// Whether `user` is the rider currently carrying this delivery.
async fn is_assigned_rider(state: &AppState, user: &User, delivery: &Delivery) -> Result<bool> {
    let Some(assigned) = delivery.rider_id() else { return Ok(false) };
    Ok(state.repo.find_rider_by_user(user.id).await?.is_some_and(|rider| rider.id() == assigned))
}

async fn load(state: &AppState, order_id: Uuid) -> Result<(Order, Delivery)> {
    let order = state.repo.find_order(order_id).await?.ok_or(AppError::NotFound("order"))?;
    let delivery = state.repo.find_delivery(order_id).await?.ok_or(AppError::NotFound("delivery"))?;
    Ok((order, delivery))
}

pub async fn track(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<ApiResponse<TrackingRecord>> {
    let (order, delivery) = load(&state, order_id).await?;
    let allowed = order.customer_id() == user.id || user.is_admin() || is_assigned_rider(&state, &user, &delivery).await?;
    if !allowed {
        return Err(AppError::Forbidden("you cannot track this order"));
    }
    Ok(ApiResponse::ok(tracking_record(&state, &order, &delivery).await?))
}

/// Rider (or admin) progress report. The order follows the delivery.
pub async fn update_status(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(order_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<UpdateDeliveryRequest>,
) -> Result<ApiResponse<TrackingRecord>> {
    let (mut order, mut delivery) = load(&state, order_id).await?;
    if !user.is_admin() && !is_assigned_rider(&state, &user, &delivery).await? {
        return Err(AppError::Forbidden("only the assigned rider can update this delivery"));
    }
    let eta = body.eta_minutes.map(|minutes| Utc::now() + Duration::minutes(minutes));
    let note = body.note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    delivery.advance(body.status, note, eta)?;
    order.delivery_progressed(body.status)?;

    let mut credited = None;
    if let (DeliveryStatus::Delivered, Some(rider_id)) = (body.status, delivery.rider_id()) {
        credited = state.repo.find_rider(rider_id).await?;
        if let Some(rider) = credited.as_mut() {
            rider.record_delivery();
        }
    }
    state.repo.save_delivery_progress(&delivery, &order, credited.as_ref()).await?;
    tracing::info!(%order_id, status = %body.status, by = %user.id, "delivery updated");

    let mut events = delivery.take_events();
    events.extend(order.take_events());
    state.events.publish_all(events).await;
    Ok(ApiResponse::ok(tracking_record(&state, &order, &delivery).await?))
}
