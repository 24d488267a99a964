//! Delivery Aggregate
//!
//! A delivery moves forward along `pending → assigned → picked_up → in_transit → delivered`.
//! `failed` can be reached from any non-terminal status. `delivered` and `failed` are
//! terminal. Leaving `pending` always goes through [`Delivery::assign`] so a rider is set
//! before any later status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::UnknownStatus;
use crate::domain::events::{DeliveryEvent, DomainEvent};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Assigned,
    PickedUp,
    InTransit,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub const ALL: [DeliveryStatus; 6] = [
        Self::Pending,
        Self::Assigned,
        Self::PickedUp,
        Self::InTransit,
        Self::Delivered,
        Self::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::PickedUp => "picked_up",
            Self::InTransit => "in_transit",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool { matches!(self, Self::Delivered | Self::Failed) }

    /// Position on the happy path; `Failed` sits outside it.
    fn rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Assigned => Some(1),
            Self::PickedUp => Some(2),
            Self::InTransit => Some(3),
            Self::Delivered => Some(4),
            Self::Failed => None,
        }
    }

    pub fn can_transition_to(&self, next: DeliveryStatus) -> bool {
        if self.is_terminal() { return false; }
        if next == Self::Failed { return true; }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }

    /// The one-shot message shown to the customer when tracking observes this status.
    pub fn notification_message(&self) -> &'static str {
        match self {
            Self::Pending => "Your order is waiting for a rider.",
            Self::Assigned => "A rider has been assigned to your order.",
            Self::PickedUp => "Your order has been picked up.",
            Self::InTransit => "Your order is on its way to you.",
            Self::Delivered => "Your order has been delivered. Enjoy!",
            Self::Failed => "Delivery failed. Our team will contact you shortly.",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for DeliveryStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: DeliveryStatus,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Delivery {
    pub(crate) order_id: Uuid,
    pub(crate) status: DeliveryStatus,
    pub(crate) rider_id: Option<Uuid>,
    pub(crate) assigned_at: Option<DateTime<Utc>>,
    pub(crate) delivered_at: Option<DateTime<Utc>>,
    pub(crate) estimated_arrival: Option<DateTime<Utc>>,
    pub(crate) history: Vec<StatusChange>,
    pub(crate) updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

impl Delivery {
    pub fn new(order_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            order_id,
            status: DeliveryStatus::Pending,
            rider_id: None,
            assigned_at: None,
            delivered_at: None,
            estimated_arrival: None,
            history: vec![StatusChange { status: DeliveryStatus::Pending, note: None, at: now }],
            updated_at: now,
            events: vec![],
        }
    }

    pub fn order_id(&self) -> Uuid { self.order_id }
    pub fn status(&self) -> DeliveryStatus { self.status }
    pub fn rider_id(&self) -> Option<Uuid> { self.rider_id }
    pub fn assigned_at(&self) -> Option<DateTime<Utc>> { self.assigned_at }
    pub fn delivered_at(&self) -> Option<DateTime<Utc>> { self.delivered_at }
    pub fn estimated_arrival(&self) -> Option<DateTime<Utc>> { self.estimated_arrival }
    pub fn history(&self) -> &[StatusChange] { &self.history }

    /// Minutes until the estimated arrival, clamped at zero.
    pub fn eta_minutes(&self, now: DateTime<Utc>) -> Option<i64> {
        self.estimated_arrival.map(|eta| (eta - now).num_minutes().max(0))
    }

    /// Assigns (or, while still `assigned`, swaps) the rider.
    pub fn assign(&mut self, rider_id: Uuid, estimated_arrival: Option<DateTime<Utc>>) -> Result<(), DeliveryError> {
        match self.status {
            DeliveryStatus::Pending => {
                self.rider_id = Some(rider_id);
                self.record(DeliveryStatus::Assigned, None);
            }
            DeliveryStatus::Assigned => {
                self.rider_id = Some(rider_id);
                self.touch();
            }
            status if status.is_terminal() => return Err(DeliveryError::Terminal(status)),
            status => return Err(DeliveryError::AlreadyUnderway(status)),
        }
        self.assigned_at = Some(self.updated_at);
        if estimated_arrival.is_some() {
            self.estimated_arrival = estimated_arrival;
        }
        self.raise_event(DomainEvent::Delivery(DeliveryEvent::RiderAssigned { order_id: self.order_id, rider_id }));
        Ok(())
    }

    pub fn advance(
        &mut self,
        next: DeliveryStatus,
        note: Option<String>,
        estimated_arrival: Option<DateTime<Utc>>,
    ) -> Result<(), DeliveryError> {
        if self.status.is_terminal() {
            return Err(DeliveryError::Terminal(self.status));
        }
        if next == DeliveryStatus::Assigned || (self.status == DeliveryStatus::Pending && next != DeliveryStatus::Failed) {
            return Err(DeliveryError::RiderRequired);
        }
        if !self.status.can_transition_to(next) {
            return Err(DeliveryError::InvalidTransition { from: self.status, to: next });
        }
        self.record(next, note);
        if next == DeliveryStatus::Delivered {
            self.delivered_at = Some(self.updated_at);
        }
        if estimated_arrival.is_some() {
            self.estimated_arrival = estimated_arrival;
        }
        Ok(())
    }

    fn record(&mut self, next: DeliveryStatus, note: Option<String>) {
        let from = std::mem::replace(&mut self.status, next);
        self.touch();
        self.history.push(StatusChange { status: next, note, at: self.updated_at });
        self.raise_event(DomainEvent::Delivery(DeliveryEvent::StatusChanged { order_id: self.order_id, from, to: next }));
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("delivery is already {0}")]
    Terminal(DeliveryStatus),
    #[error("delivery is already {0}; the rider can no longer change")]
    AlreadyUnderway(DeliveryStatus),
    #[error("a rider must be assigned first")]
    RiderRequired,
    #[error("cannot move delivery from {from} to {to}")]
    InvalidTransition { from: DeliveryStatus, to: DeliveryStatus },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_happy_path_is_monotonic() {
        let mut d = Delivery::new(Uuid::new_v4());
        let rider = Uuid::new_v4();
        d.assign(rider, None).unwrap();
        d.advance(DeliveryStatus::PickedUp, None, None).unwrap();
        d.advance(DeliveryStatus::InTransit, Some("Leaving the library".into()), None).unwrap();
        assert!(d.advance(DeliveryStatus::PickedUp, None, None).is_err());
        d.advance(DeliveryStatus::Delivered, None, None).unwrap();
        assert!(d.delivered_at().is_some());
        let statuses: Vec<_> = d.history().iter().map(|h| h.status).collect();
        assert_eq!(statuses, DeliveryStatus::ALL[..5].to_vec());
        assert_eq!(d.rider_id(), Some(rider));
    }

    #[test]
    fn test_terminal_statuses_are_final() {
        let mut d = Delivery::new(Uuid::new_v4());
        d.advance(DeliveryStatus::Failed, Some("No rider in zone".into()), None).unwrap();
        assert_eq!(d.advance(DeliveryStatus::Failed, None, None), Err(DeliveryError::Terminal(DeliveryStatus::Failed)));
        assert_eq!(d.assign(Uuid::new_v4(), None), Err(DeliveryError::Terminal(DeliveryStatus::Failed)));
    }

    #[test]
    fn test_rider_required_before_progress() {
        let mut d = Delivery::new(Uuid::new_v4());
        assert_eq!(d.advance(DeliveryStatus::PickedUp, None, None), Err(DeliveryError::RiderRequired));
        assert_eq!(d.advance(DeliveryStatus::Assigned, None, None), Err(DeliveryError::RiderRequired));
    }

    #[test]
    fn test_rider_swap_only_before_pickup() {
        let mut d = Delivery::new(Uuid::new_v4());
        d.assign(Uuid::new_v4(), None).unwrap();
        let second = Uuid::new_v4();
        d.assign(second, None).unwrap();
        assert_eq!(d.rider_id(), Some(second));
        d.advance(DeliveryStatus::PickedUp, None, None).unwrap();
        assert_eq!(d.assign(Uuid::new_v4(), None), Err(DeliveryError::AlreadyUnderway(DeliveryStatus::PickedUp)));
    }

    #[test]
    fn test_transition_table() {
        use DeliveryStatus::*;
        assert!(Pending.can_transition_to(Assigned));
        assert!(Assigned.can_transition_to(InTransit));
        assert!(InTransit.can_transition_to(Failed));
        assert!(!InTransit.can_transition_to(Assigned));
        assert!(!Delivered.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Delivered));
    }

    #[test]
    fn test_eta_never_negative() {
        let mut d = Delivery::new(Uuid::new_v4());
        let now = Utc::now();
        d.assign(Uuid::new_v4(), Some(now + Duration::minutes(25))).unwrap();
        assert_eq!(d.eta_minutes(now), Some(25));
        assert_eq!(d.eta_minutes(now + Duration::hours(1)), Some(0));
    }

    #[test]
    fn test_six_distinct_messages() {
        let messages: std::collections::HashSet<_> = DeliveryStatus::ALL.iter().map(|s| s.notification_message()).collect();
        assert_eq!(messages.len(), 6);
    }
}
