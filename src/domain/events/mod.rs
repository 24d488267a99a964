//! Domain events
use crate::domain::aggregates::{DeliveryStatus, OrderStatus, PaymentStatus};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Order(OrderEvent),
    Payment(PaymentEvent),
    Delivery(DeliveryEvent),
    Rider(RiderEvent),
}

impl DomainEvent {
    /// Subject suffix the event is published under.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Order(OrderEvent::Created { .. }) => "order.created",
            Self::Order(OrderEvent::StatusChanged { .. }) => "order.status_changed",
            Self::Payment(_) => "payment.updated",
            Self::Delivery(DeliveryEvent::RiderAssigned { .. }) => "delivery.rider_assigned",
            Self::Delivery(DeliveryEvent::StatusChanged { .. }) => "delivery.status_changed",
            Self::Rider(_) => "rider.availability_changed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { order_id: Uuid, order_number: String, total: Decimal },
    StatusChanged { order_id: Uuid, from: OrderStatus, to: OrderStatus },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PaymentEvent {
    Updated { order_id: Uuid, status: PaymentStatus, amount_paid: Decimal, amount_remaining: Decimal },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeliveryEvent {
    RiderAssigned { order_id: Uuid, rider_id: Uuid },
    StatusChanged { order_id: Uuid, from: DeliveryStatus, to: DeliveryStatus },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RiderEvent {
    AvailabilityChanged { rider_id: Uuid, is_available: bool },
}
