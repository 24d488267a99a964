//! Campus Market
//!
//! Secondhand marketplace for students: listings, carts, orders, mobile-money and Payday Flex
//! payments, and rider deliveries within campus zones.
//!
//! ## Layout
//! - [`domain`]: aggregates with their status lifecycles and events
//! - [`store`]: the [`store::Repository`] seam with Postgres and in-memory backends
//! - [`api`]: the axum router served under `/api/v1`
//! - [`client`]: typed client with delivery tracking, bulk updates and optimistic edits
//! - [`events`]: best-effort NATS publishing of domain events

pub mod api;
pub mod client;
pub mod config;
pub mod domain;
pub mod events;
pub mod store;

pub use api::{router, AppState};
pub use config::AppConfig;
pub use domain::aggregates::{DeliveryStatus, OrderStatus, PaymentStatus};
