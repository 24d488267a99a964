//! Aggregates module
pub mod cart;
pub mod delivery;
pub mod order;
pub mod payment;
pub mod product;
pub mod review;
pub mod rider;
pub mod user;

pub use cart::{Cart, CartError, CartItem, MAX_LINE_QUANTITY};
pub use delivery::{Delivery, DeliveryError, DeliveryStatus, StatusChange};
pub use order::{generate_order_number, LineItem, Order, OrderError, OrderStatus, UnknownStatus};
pub use payment::{
    payday_window, split_in_half, PaydayFlexError, PaydayFlexPlan, Payment, PaymentError, PaymentMethod,
    PaymentStatus, PendingCharge,
};
pub use product::{ListingDetails, Product, ProductCondition, ProductError, ProductStatus};
pub use review::{Review, ReviewSummary};
pub use rider::Rider;
pub use user::{Role, User};
