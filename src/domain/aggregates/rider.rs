//! Rider Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::events::{DomainEvent, RiderEvent};
use crate::domain::value_objects::CampusZone;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rider {
    pub(crate) id: Uuid,
    pub(crate) user_id: Uuid,
    pub(crate) name: String,
    pub(crate) zone: CampusZone,
    pub(crate) is_available: bool,
    pub(crate) total_deliveries: u32,
    pub(crate) rating: f64,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

impl Rider {
    /// New riders start offline with no deliveries and a neutral 5.0 rating.
    pub fn enlist(user_id: Uuid, name: impl Into<String>, zone: CampusZone) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id,
            name: name.into(),
            zone,
            is_available: false,
            total_deliveries: 0,
            rating: 5.0,
            created_at: now,
            updated_at: now,
            events: vec![],
        }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn name(&self) -> &str { &self.name }
    pub fn zone(&self) -> &CampusZone { &self.zone }
    pub fn is_available(&self) -> bool { self.is_available }
    pub fn total_deliveries(&self) -> u32 { self.total_deliveries }
    pub fn rating(&self) -> f64 { self.rating }

    pub fn can_take(&self, zone: &CampusZone) -> bool { self.is_available && &self.zone == zone }

    /// Returns whether the flag actually changed.
    pub fn set_availability(&mut self, is_available: bool) -> bool {
        if self.is_available == is_available { return false; }
        self.is_available = is_available;
        self.touch();
        self.events.push(DomainEvent::Rider(RiderEvent::AvailabilityChanged { rider_id: self.id, is_available }));
        true
    }

    pub fn record_delivery(&mut self) {
        self.total_deliveries = self.total_deliveries.saturating_add(1);
        self.touch();
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}
