//! Publishes domain events to NATS when a connection is configured.

use crate::domain::events::DomainEvent;

pub const SUBJECT_PREFIX: &str = "campus_market";

#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    pub fn disabled() -> Self { Self::default() }

    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url else { return Self::disabled() };
        match async_nats::connect(url).await {
            Ok(client) => {
                tracing::info!(%url, "connected to NATS");
                Self::new(Some(client))
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "NATS unavailable, events will only be logged");
                Self::disabled()
            }
        }
    }

    /// Best effort: a failed publish is logged and never fails the request.
    pub async fn publish_all(&self, events: Vec<DomainEvent>) {
        for event in events {
            let subject = format!("{SUBJECT_PREFIX}.{}", event.subject());
            tracing::debug!(%subject, ?event, "domain event");
            let Some(nats) = &self.nats else { continue };
            let payload = match serde_json::to_vec(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::error!(%subject, error = %e, "could not serialise event");
                    continue;
                }
            };
            if let Err(e) = nats.publish(subject.clone(), payload.into()).await {
                tracing::warn!(%subject, error = %e, "failed to publish event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::RiderEvent;
    use uuid::Uuid;

    #[test]
    fn test_event_payload_is_tagged() {
        let event = DomainEvent::Rider(RiderEvent::AvailabilityChanged { rider_id: Uuid::nil(), is_available: true });
        assert_eq!(event.subject(), "rider.availability_changed");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "availability_changed");
        assert_eq!(json["is_available"], true);
    }
}
