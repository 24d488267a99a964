use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Page, ProductFilter, ProductSort, Repository, StoreError, StoreResult};
use crate::domain::aggregates::{Delivery, Order, OrderStatus, Payment, Product, Review, Rider, User};

/// In-process repository; each table sits behind its own lock.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    users: RwLock<HashMap<Uuid, User>>,
    products: RwLock<HashMap<Uuid, Product>>,
    orders: RwLock<HashMap<Uuid, Order>>,
    payments: RwLock<HashMap<Uuid, Payment>>,
    deliveries: RwLock<HashMap<Uuid, Delivery>>,
    riders: RwLock<HashMap<Uuid, Rider>>,
    reviews: RwLock<Vec<Review>>,
    carts: RwLock<HashMap<Uuid, Vec<(Uuid, u32)>>>,
}

impl MemoryRepository {
    pub fn new() -> Self { Self::default() }
}

fn paged<T: Clone>(items: Vec<T>, page: Page) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    (page.apply(&items), total)
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("email"));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn save_user(&self, user: &User) -> StoreResult<()> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) { return Err(StoreError::Missing("user")); }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.trim().to_lowercase();
        Ok(self.users.read().await.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self, page: Page) -> StoreResult<(Vec<User>, u64)> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(paged(users, page))
    }

    async fn save_product(&self, product: &Product) -> StoreResult<()> {
        self.products.write().await.insert(product.id, product.clone());
        Ok(())
    }

    async fn find_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn list_products(&self, filter: &ProductFilter, page: Page) -> StoreResult<(Vec<Product>, u64)> {
        let mut products: Vec<Product> = self.products.read().await.values().filter(|p| filter.matches(p)).cloned().collect();
        match filter.sort {
            ProductSort::Newest => products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))),
            ProductSort::PriceAsc => products.sort_by(|a, b| a.price.amount().cmp(&b.price.amount())),
            ProductSort::PriceDesc => products.sort_by(|a, b| b.price.amount().cmp(&a.price.amount())),
        }
        Ok(paged(products, page))
    }

    async fn insert_order(&self, order: &Order, payment: &Payment, delivery: &Delivery) -> StoreResult<()> {
        let mut orders = self.orders.write().await;
        if orders.values().any(|o| o.order_number == order.order_number) {
            return Err(StoreError::Duplicate("order number"));
        }
        let mut payments = self.payments.write().await;
        let mut deliveries = self.deliveries.write().await;
        orders.insert(order.id, without_events_order(order));
        payments.insert(payment.order_id, without_events_payment(payment));
        deliveries.insert(delivery.order_id, without_events_delivery(delivery));
        Ok(())
    }

    async fn save_order(&self, order: &Order) -> StoreResult<()> {
        let mut orders = self.orders.write().await;
        if !orders.contains_key(&order.id) { return Err(StoreError::Missing("order")); }
        orders.insert(order.id, without_events_order(order));
        Ok(())
    }

    async fn find_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn list_orders(&self, customer_id: Option<Uuid>, status: Option<OrderStatus>, page: Page) -> StoreResult<(Vec<Order>, u64)> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .await
            .values()
            .filter(|o| customer_id.map_or(true, |c| o.customer_id == c))
            .filter(|o| status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paged(orders, page))
    }

    async fn save_payment(&self, payment: &Payment) -> StoreResult<()> {
        self.payments.write().await.insert(payment.order_id, without_events_payment(payment));
        Ok(())
    }

    async fn find_payment(&self, order_id: Uuid) -> StoreResult<Option<Payment>> {
        Ok(self.payments.read().await.get(&order_id).cloned())
    }

    async fn find_payment_by_reference(&self, reference: &str) -> StoreResult<Option<Payment>> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .find(|p| p.pending_charge.as_ref().is_some_and(|c| c.reference == reference))
            .cloned())
    }

    async fn save_delivery(&self, delivery: &Delivery) -> StoreResult<()> {
        self.deliveries.write().await.insert(delivery.order_id, without_events_delivery(delivery));
        Ok(())
    }

    async fn save_delivery_progress(&self, delivery: &Delivery, order: &Order, rider: Option<&Rider>) -> StoreResult<()> {
        let mut orders = self.orders.write().await;
        let mut deliveries = self.deliveries.write().await;
        let mut riders = self.riders.write().await;
        if !orders.contains_key(&order.id) { return Err(StoreError::Missing("order")); }
        if rider.is_some_and(|r| !riders.contains_key(&r.id)) { return Err(StoreError::Missing("rider")); }
        orders.insert(order.id, without_events_order(order));
        deliveries.insert(delivery.order_id, without_events_delivery(delivery));
        if let Some(rider) = rider {
            riders.insert(rider.id, without_events_rider(rider));
        }
        Ok(())
    }

    async fn find_delivery(&self, order_id: Uuid) -> StoreResult<Option<Delivery>> {
        Ok(self.deliveries.read().await.get(&order_id).cloned())
    }

    async fn insert_rider(&self, rider: &Rider) -> StoreResult<()> {
        let mut riders = self.riders.write().await;
        if riders.values().any(|r| r.user_id == rider.user_id) {
            return Err(StoreError::Duplicate("rider"));
        }
        riders.insert(rider.id, without_events_rider(rider));
        Ok(())
    }

    async fn save_rider(&self, rider: &Rider) -> StoreResult<()> {
        let mut riders = self.riders.write().await;
        if !riders.contains_key(&rider.id) { return Err(StoreError::Missing("rider")); }
        riders.insert(rider.id, without_events_rider(rider));
        Ok(())
    }

    async fn find_rider(&self, id: Uuid) -> StoreResult<Option<Rider>> {
        Ok(self.riders.read().await.get(&id).cloned())
    }

    async fn find_rider_by_user(&self, user_id: Uuid) -> StoreResult<Option<Rider>> {
        Ok(self.riders.read().await.values().find(|r| r.user_id == user_id).cloned())
    }

    async fn list_riders(&self, zone: Option<&str>) -> StoreResult<Vec<Rider>> {
        let mut riders: Vec<Rider> = self
            .riders
            .read()
            .await
            .values()
            .filter(|r| zone.map_or(true, |z| r.zone.as_str().eq_ignore_ascii_case(z)))
            .cloned()
            .collect();
        riders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(riders)
    }

    async fn insert_review(&self, review: &Review) -> StoreResult<()> {
        let mut reviews = self.reviews.write().await;
        if reviews.iter().any(|r| r.product_id == review.product_id && r.author_id == review.author_id) {
            return Err(StoreError::Duplicate("review"));
        }
        reviews.push(review.clone());
        Ok(())
    }

    async fn list_reviews(&self, product_id: Uuid) -> StoreResult<Vec<Review>> {
        let mut reviews: Vec<Review> = self.reviews.read().await.iter().filter(|r| r.product_id == product_id).cloned().collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    async fn cart_lines(&self, user_id: Uuid) -> StoreResult<Vec<(Uuid, u32)>> {
        Ok(self.carts.read().await.get(&user_id).cloned().unwrap_or_default())
    }

    async fn set_cart_quantity(&self, user_id: Uuid, product_id: Uuid, quantity: u32) -> StoreResult<()> {
        let mut carts = self.carts.write().await;
        let lines = carts.entry(user_id).or_default();
        match lines.iter().position(|(id, _)| *id == product_id) {
            Some(index) if quantity == 0 => { lines.remove(index); }
            Some(index) => lines[index].1 = quantity,
            None if quantity > 0 => lines.push((product_id, quantity)),
            None => {}
        }
        Ok(())
    }

    async fn clear_cart(&self, user_id: Uuid) -> StoreResult<()> {
        self.carts.write().await.remove(&user_id);
        Ok(())
    }
}

fn without_events_order(order: &Order) -> Order {
    let mut copy = order.clone();
    copy.events.clear();
    copy
}

fn without_events_payment(payment: &Payment) -> Payment {
    let mut copy = payment.clone();
    copy.events.clear();
    copy
}

fn without_events_delivery(delivery: &Delivery) -> Delivery {
    let mut copy = delivery.clone();
    copy.events.clear();
    copy
}

fn without_events_rider(rider: &Rider) -> Rider {
    let mut copy = rider.clone();
    copy.events.clear();
    copy
}
