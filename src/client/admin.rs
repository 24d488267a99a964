//! Back-office client: order status overrides and the rider board.

use tokio::sync::RwLock;
use uuid::Uuid;

use super::{optimistic, ApiClient, ClientError};
use crate::api::admin::{AvailabilityRequest, OrderStatusRequest};
use crate::domain::aggregates::{Order, OrderStatus, Rider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct BulkFailure {
    pub order_id: Uuid,
    pub error: String,
}

/// Outcome of a bulk status change. Orders that succeeded stay changed when others fail.
#[derive(Debug, Clone)]
pub struct BulkSummary {
    pub status: OrderStatus,
    pub requested: usize,
    pub succeeded: Vec<Uuid>,
    pub failed: Vec<BulkFailure>,
}

impl BulkSummary {
    pub fn severity(&self) -> Severity {
        match (self.succeeded.len(), self.failed.len()) {
            (_, 0) => Severity::Success,
            (0, _) => Severity::Error,
            _ => Severity::Warning,
        }
    }

    pub fn message(&self) -> String {
        if self.requested == 0 {
            return "No orders selected".to_string();
        }
        match self.severity() {
            Severity::Success => format!("Updated {} order(s) to {}", self.succeeded.len(), self.status),
            Severity::Warning => format!(
                "Updated {} of {} orders to {}; {} failed",
                self.succeeded.len(),
                self.requested,
                self.status,
                self.failed.len()
            ),
            Severity::Error => format!("Could not update any of the {} selected orders", self.requested),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdminClient {
    api: ApiClient,
}

impl AdminClient {
    pub fn new(api: ApiClient) -> Self { Self { api } }

    pub async fn update_order_status(&self, order_id: Uuid, status: OrderStatus) -> Result<Order, ClientError> {
        self.api.patch(&format!("/admin/orders/{order_id}/status"), &OrderStatusRequest { status }).await
    }

    /// Applies `status` to each order in turn, one request at a time. Failures are collected
    /// and never undo earlier successes.
    pub async fn bulk_update_order_status(&self, order_ids: &[Uuid], status: OrderStatus) -> BulkSummary {
        let mut summary = BulkSummary { status, requested: order_ids.len(), succeeded: vec![], failed: vec![] };
        for &order_id in order_ids {
            match self.update_order_status(order_id, status).await {
                Ok(_) => summary.succeeded.push(order_id),
                Err(err) => {
                    tracing::warn!(%order_id, %status, error = %err, "bulk status update failed");
                    summary.failed.push(BulkFailure { order_id, error: err.to_string() });
                }
            }
        }
        tracing::info!(
            %status,
            requested = summary.requested,
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            "bulk status update finished"
        );
        summary
    }

    pub async fn list_riders(&self) -> Result<Vec<Rider>, ClientError> { self.api.get("/admin/riders").await }

    pub async fn set_rider_availability(&self, rider_id: Uuid, is_available: bool) -> Result<Rider, ClientError> {
        self.api
            .patch(&format!("/admin/riders/{rider_id}/availability"), &AvailabilityRequest { is_available })
            .await
    }
}

/// Local list of riders with optimistic availability toggles.
pub struct RiderBoard {
    client: AdminClient,
    riders: RwLock<Vec<Rider>>,
}

impl RiderBoard {
    pub fn new(client: AdminClient) -> Self { Self { client, riders: RwLock::new(vec![]) } }

    pub async fn load(&self) -> Result<(), ClientError> {
        let riders = self.client.list_riders().await?;
        *self.riders.write().await = riders;
        Ok(())
    }

    pub async fn snapshot(&self) -> Vec<Rider> { self.riders.read().await.clone() }

    /// Flips the rider's flag on the board right away and sends it. A refused change is
    /// flipped back.
    pub async fn toggle_availability(&self, rider_id: Uuid) -> Result<Rider, ClientError> {
        let current = self
            .riders
            .read()
            .await
            .iter()
            .find(|r| r.id() == rider_id)
            .map(Rider::is_available)
            .ok_or(ClientError::NotFound)?;
        let updated = optimistic::apply(
            &self.riders,
            |riders: &mut Vec<Rider>| riders.iter_mut().find(|r| r.id == rider_id).map(|r| &mut r.is_available),
            !current,
            || self.client.set_rider_availability(rider_id, !current),
        )
        .await?;

        if let Some(slot) = self.riders.write().await.iter_mut().find(|r| r.id == rider_id) {
            *slot = updated.clone();
        }
        Ok(updated)
    }
}
