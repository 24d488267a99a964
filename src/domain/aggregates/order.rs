//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::DeliveryStatus;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{CampusZone, Money, MoneyError};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub(crate) id: Uuid,
    pub(crate) order_number: String,
    pub(crate) customer_id: Uuid,
    pub(crate) items: Vec<LineItem>,
    pub(crate) total: Money,
    pub(crate) delivery_address: String,
    pub(crate) campus_zone: CampusZone,
    pub(crate) status: OrderStatus,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: Uuid,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl LineItem {
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        Self::Pending,
        Self::Processing,
        Self::OutForDelivery,
        Self::Delivered,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool { matches!(self, Self::Delivered | Self::Cancelled) }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, OutForDelivery)
                | (Processing, Cancelled)
                | (OutForDelivery, Delivered)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Raised when a stored or submitted status string matches no known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown status `{0}`")]
pub struct UnknownStatus(pub String);

impl Order {
    pub fn place(
        order_number: impl Into<String>,
        customer_id: Uuid,
        items: Vec<LineItem>,
        delivery_address: impl Into<String>,
        campus_zone: CampusZone,
        currency: &str,
    ) -> Result<Self, OrderError> {
        if items.is_empty() { return Err(OrderError::NoItems); }
        if items.iter().any(|i| i.quantity == 0) { return Err(OrderError::ZeroQuantity); }
        let total = items
            .iter()
            .try_fold(Money::zero(currency), |acc, i| acc.add(&i.line_total()))?;
        let now = Utc::now();
        let mut order = Self {
            id: Uuid::now_v7(),
            order_number: order_number.into(),
            customer_id,
            items,
            total,
            delivery_address: delivery_address.into(),
            campus_zone,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Created {
            order_id: order.id,
            order_number: order.order_number.clone(),
            total: order.total.amount(),
        }));
        Ok(order)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_number(&self) -> &str { &self.order_number }
    pub fn customer_id(&self) -> Uuid { self.customer_id }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn total(&self) -> &Money { &self.total }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn delivery_address(&self) -> &str { &self.delivery_address }
    pub fn campus_zone(&self) -> &CampusZone { &self.campus_zone }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition { from: self.status, to: next });
        }
        let from = std::mem::replace(&mut self.status, next);
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, from, to: next }));
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), OrderError> { self.transition_to(OrderStatus::Cancelled) }

    /// A confirmed (full or first-installment) payment starts processing.
    pub fn payment_confirmed(&mut self) -> Result<(), OrderError> {
        match self.status {
            OrderStatus::Pending => self.transition_to(OrderStatus::Processing),
            OrderStatus::Cancelled => Err(OrderError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Follows the delivery lifecycle; failures leave the order for an admin to resolve.
    pub fn delivery_progressed(&mut self, delivery: DeliveryStatus) -> Result<(), OrderError> {
        if self.status == OrderStatus::Cancelled { return Err(OrderError::Cancelled); }
        match delivery {
            DeliveryStatus::PickedUp | DeliveryStatus::InTransit => {
                if self.status == OrderStatus::Processing {
                    self.transition_to(OrderStatus::OutForDelivery)?;
                }
            }
            DeliveryStatus::Delivered => {
                if self.status == OrderStatus::Processing {
                    self.transition_to(OrderStatus::OutForDelivery)?;
                }
                if self.status == OrderStatus::OutForDelivery {
                    self.transition_to(OrderStatus::Delivered)?;
                }
            }
            DeliveryStatus::Pending | DeliveryStatus::Assigned | DeliveryStatus::Failed => {}
        }
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// Random `ORD-` number; uniqueness is enforced by storage.
pub fn generate_order_number() -> String {
    format!("ORD-{:08}", rand::random::<u32>() % 100_000_000)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("order has no items")]
    NoItems,
    #[error("order item quantity must be at least 1")]
    ZeroQuantity,
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("order is cancelled")]
    Cancelled,
    #[error(transparent)]
    Money(#[from] MoneyError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn item(qty: u32, price: i64) -> LineItem {
        LineItem { product_id: Uuid::new_v4(), title: "Desk lamp".into(), quantity: qty, unit_price: Money::ghs(Decimal::new(price, 2)) }
    }

    fn order() -> Order {
        Order::place("ORD-00000001", Uuid::new_v4(), vec![item(2, 1250), item(1, 499)], "Room 12, Volta Hall", CampusZone::new("VOLTA").unwrap(), "GHS").unwrap()
    }

    #[test]
    fn test_order_total_from_items() {
        let mut o = order();
        assert_eq!(o.total().amount(), Decimal::new(2999, 2));
        assert_eq!(o.status(), OrderStatus::Pending);
        assert!(matches!(o.take_events().as_slice(), [DomainEvent::Order(OrderEvent::Created { .. })]));
    }

    #[test]
    fn test_rejects_empty_and_zero_quantity() {
        let zone = CampusZone::new("VOLTA").unwrap();
        assert_eq!(Order::place("ORD-1", Uuid::new_v4(), vec![], "x", zone.clone(), "GHS").unwrap_err(), OrderError::NoItems);
        assert_eq!(Order::place("ORD-1", Uuid::new_v4(), vec![item(0, 100)], "x", zone, "GHS").unwrap_err(), OrderError::ZeroQuantity);
    }

    #[test]
    fn test_order_workflow() {
        let mut o = order();
        o.payment_confirmed().unwrap();
        assert_eq!(o.status(), OrderStatus::Processing);
        o.delivery_progressed(DeliveryStatus::Assigned).unwrap();
        assert_eq!(o.status(), OrderStatus::Processing);
        o.delivery_progressed(DeliveryStatus::PickedUp).unwrap();
        assert_eq!(o.status(), OrderStatus::OutForDelivery);
        o.delivery_progressed(DeliveryStatus::InTransit).unwrap();
        o.delivery_progressed(DeliveryStatus::Delivered).unwrap();
        assert_eq!(o.status(), OrderStatus::Delivered);
        assert!(o.cancel().is_err());
    }

    #[test]
    fn test_invalid_transitions() {
        let mut o = order();
        assert_eq!(
            o.transition_to(OrderStatus::Delivered).unwrap_err(),
            OrderError::InvalidTransition { from: OrderStatus::Pending, to: OrderStatus::Delivered }
        );
        assert!(o.transition_to(OrderStatus::Pending).is_err());
        o.cancel().unwrap();
        assert_eq!(o.payment_confirmed().unwrap_err(), OrderError::Cancelled);
    }

    #[test]
    fn test_status_parse_round_trip() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }
}
