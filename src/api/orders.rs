use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

use crate::api::auth::AuthUser;
use crate::api::envelope::ApiResponse;
use crate::api::error::{AppError, Result, ValidatedJson};
use crate::api::payments::PaymentView;
use crate::api::AppState;
use crate::domain::aggregates::{
    generate_order_number, Delivery, DeliveryStatus, LineItem, Order, OrderStatus, Payment, PaymentMethod, User,
    MAX_LINE_QUANTITY,
};
use crate::domain::value_objects::CampusZone;
use crate::store::{Page, StoreError};

const ORDER_NUMBER_ATTEMPTS: usize = 3;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Add at least one item"))]
    #[validate]
    pub items: Vec<OrderItemRequest>,
    #[validate(length(min = 5, max = 300, message = "Enter a delivery address"))]
    pub delivery_address: String,
    pub campus_zone: String,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 99, message = "Quantity must be between 1 and 99"))]
    pub quantity: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<String>,
}

impl OrderQuery {
    pub(crate) fn split(self) -> Result<(Option<OrderStatus>, Page)> {
        let status = self.status.as_deref().filter(|s| !s.is_empty()).map(str::parse::<OrderStatus>).transpose()?;
        Ok((status, Page::new(self.page, self.per_page)))
    }
}

/// An order together with how it is being paid for and delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order: Order,
    pub payment: Option<PaymentView>,
    pub delivery_status: Option<DeliveryStatus>,
}

pub(crate) async fn order_detail(state: &AppState, order: Order) -> Result<OrderDetail> {
    let today = Utc::now().date_naive();
    let payment = state.repo.find_payment(order.id()).await?.map(|p| PaymentView::new(&p, today));
    let delivery_status = state.repo.find_delivery(order.id()).await?.map(|d| d.status());
    Ok(OrderDetail { order, payment, delivery_status })
}

/// Loads an order the user may see: their own, or any for an admin.
pub(crate) async fn visible_order(state: &AppState, user: &User, id: Uuid) -> Result<Order> {
    let order = state.repo.find_order(id).await?.ok_or(AppError::NotFound("order"))?;
    if order.customer_id() != user.id && !user.is_admin() {
        return Err(AppError::Forbidden("this order belongs to someone else"));
    }
    Ok(order)
}

/// Cancels the order and fails a delivery that has not finished yet.
pub(crate) async fn cancel_with_delivery(state: &AppState, order: &mut Order, note: &str) -> Result<()> {
    order.cancel()?;
    let mut delivery = state.repo.find_delivery(order.id()).await?.filter(|d| !d.status().is_terminal());
    match delivery.as_mut() {
        Some(delivery) => {
            delivery.advance(DeliveryStatus::Failed, Some(note.to_string()), None)?;
            state.repo.save_delivery_progress(delivery, order, None).await?;
        }
        None => state.repo.save_order(order).await?,
    }
    let mut events = order.take_events();
    if let Some(delivery) = delivery.as_mut() {
        events.extend(delivery.take_events());
    }
    state.events.publish_all(events).await;
    Ok(())
}

pub async fn create_order(
    State(state): State<AppState>,
    AuthUser(customer): AuthUser,
    ValidatedJson(body): ValidatedJson<CreateOrderRequest>,
) -> Result<(StatusCode, ApiResponse<OrderDetail>)> {
    let zone = CampusZone::new(body.campus_zone)?;

    let mut quantities: BTreeMap<Uuid, u32> = BTreeMap::new();
    for item in &body.items {
        let merged = quantities.entry(item.product_id).or_default();
        *merged = merged.saturating_add(item.quantity);
    }
    let mut items = Vec::with_capacity(quantities.len());
    for (product_id, quantity) in quantities {
        if quantity > MAX_LINE_QUANTITY {
            return Err(AppError::field("items", format!("At most {MAX_LINE_QUANTITY} of each item")));
        }
        let product = state.repo.find_product(product_id).await?.ok_or(AppError::NotFound("product"))?;
        if !product.is_purchasable() {
            return Err(AppError::conflict(format!("{} is no longer available", product.title())));
        }
        if product.seller_id() == customer.id {
            return Err(AppError::Forbidden("you cannot buy your own listing"));
        }
        items.push(LineItem {
            product_id,
            title: product.title().to_string(),
            quantity,
            unit_price: product.price().clone(),
        });
    }

    let mut attempt = 0;
    let mut order = loop {
        attempt += 1;
        let order = Order::place(
            generate_order_number(),
            customer.id,
            items.clone(),
            body.delivery_address.trim(),
            zone.clone(),
            &state.config.currency,
        )?;
        let payment = Payment::new(order.id(), body.payment_method, order.total().clone());
        let delivery = Delivery::new(order.id());
        match state.repo.insert_order(&order, &payment, &delivery).await {
            Ok(()) => break order,
            Err(StoreError::Duplicate(_)) if attempt < ORDER_NUMBER_ATTEMPTS => {
                tracing::warn!(attempt, "order number collision, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    };

    for item in order.items() {
        state.repo.set_cart_quantity(customer.id, item.product_id, 0).await?;
    }
    tracing::info!(order_id = %order.id(), order_number = %order.order_number(), total = %order.total(), "order placed");
    state.events.publish_all(order.take_events()).await;

    let detail = order_detail(&state, order).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(detail).with_message("Order placed")))
}

pub async fn list_orders(
    State(state): State<AppState>,
    AuthUser(customer): AuthUser,
    Query(query): Query<OrderQuery>,
) -> Result<ApiResponse<Vec<Order>>> {
    let (status, page) = query.split()?;
    let (orders, total) = state.repo.list_orders(Some(customer.id), status, page).await?;
    Ok(ApiResponse::paginated(orders, page, total))
}

pub async fn get_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<OrderDetail>> {
    let order = visible_order(&state, &user, id).await?;
    Ok(ApiResponse::ok(order_detail(&state, order).await?))
}

/// Customers may cancel until the order starts processing.
pub async fn cancel_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<OrderDetail>> {
    let mut order = visible_order(&state, &user, id).await?;
    if order.status() != OrderStatus::Pending {
        return Err(AppError::conflict(format!("order is already {} and can no longer be cancelled", order.status())));
    }
    cancel_with_delivery(&state, &mut order, "order cancelled by customer").await?;
    tracing::info!(order_id = %id, "order cancelled by customer");
    Ok(ApiResponse::ok(order_detail(&state, order).await?).with_message("Order cancelled"))
}

#[cfg(test)]
mod tests {
    use crate::api::testing::TestApp;
    use crate::domain::aggregates::Role;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_order_is_priced_from_the_catalog() {
        let app = TestApp::new();
        let seller = app.user("Esi", Role::Customer).await;
        let buyer = app.user("Kwame", Role::Customer).await;
        let fan = app.product(&seller, "Desk fan", 12000).await;

        let cart_uri = format!("/api/v1/cart/items/{}", fan.id());
        app.call(Method::PATCH, &cart_uri, Some(&buyer.token), Some(json!({"quantity": 1}))).await;

        let body = json!({
            "items": [{"product_id": fan.id(), "quantity": 1}, {"product_id": fan.id(), "quantity": 1}],
            "delivery_address": "Room 4, Akuafo Hall",
            "campus_zone": "north",
            "payment_method": "installment",
        });
        let (status, json) = app.call(Method::POST, "/api/v1/orders", Some(&buyer.token), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        let data = &json["data"];
        assert_eq!(data["order"]["total"]["amount"], "240.00");
        assert_eq!(data["order"]["status"], "pending");
        assert_eq!(data["order"]["campus_zone"], "NORTH");
        assert!(data["order"]["order_number"].as_str().unwrap().starts_with("ORD-"));
        assert_eq!(data["payment"]["method"], "installment");
        assert_eq!(data["delivery_status"], "pending");

        let (_, cart) = app.call(Method::GET, "/api/v1/cart", Some(&buyer.token), None).await;
        assert_eq!(cart["data"]["item_count"], 0);
    }

    #[tokio::test]
    async fn test_orders_are_private_and_cancellable_while_pending() {
        let app = TestApp::new();
        let seller = app.user("Esi", Role::Customer).await;
        let buyer = app.user("Kwame", Role::Customer).await;
        let admin = app.user("Admin", Role::Admin).await;
        let chair = app.product(&seller, "Chair", 5000).await;
        let id = app.order(&buyer, &chair).await;
        let uri = format!("/api/v1/orders/{id}");

        let (status, _) = app.call(Method::GET, &uri, Some(&seller.token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = app.call(Method::GET, &uri, Some(&admin.token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, list) = app.call(Method::GET, "/api/v1/orders?status=pending", Some(&buyer.token), None).await;
        assert_eq!(list["pagination"]["total"], 1);

        let (status, json) = app.call(Method::POST, &format!("{uri}/cancel"), Some(&buyer.token), None).await;
        assert_eq!(status, StatusCode::OK, "{json}");
        assert_eq!(json["data"]["order"]["status"], "cancelled");
        assert_eq!(json["data"]["delivery_status"], "failed");
        let (status, _) = app.call(Method::POST, &format!("{uri}/cancel"), Some(&buyer.token), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_line_quantities_are_bounded() {
        let app = TestApp::new();
        let seller = app.user("Esi", Role::Customer).await;
        let buyer = app.user("Kwame", Role::Customer).await;
        let fan = app.product(&seller, "Desk fan", 12000).await;
        let order = |first: u64, second: u64| {
            json!({
                "items": [{"product_id": fan.id(), "quantity": first}, {"product_id": fan.id(), "quantity": second}],
                "delivery_address": "Room 4, Akuafo Hall",
                "campus_zone": "NORTH",
            })
        };

        let (status, json) = app.call(Method::POST, "/api/v1/orders", Some(&buyer.token), Some(order(u32::MAX as u64, 2))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["errors"]["items[0].quantity"][0], "Quantity must be between 1 and 99");

        let (status, json) = app.call(Method::POST, "/api/v1/orders", Some(&buyer.token), Some(order(60, 60))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json["errors"]["items"].is_array());

        let (status, _) = app.call(Method::POST, "/api/v1/orders", Some(&buyer.token), Some(order(0, 1))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let (_, list) = app.call(Method::GET, "/api/v1/orders", Some(&buyer.token), None).await;
        assert_eq!(list["pagination"]["total"], 0);
    }

    #[tokio::test]
    async fn test_own_listing_and_bad_status_filter() {
        let app = TestApp::new();
        let seller = app.user("Esi", Role::Customer).await;
        let chair = app.product(&seller, "Chair", 5000).await;
        let body = json!({
            "items": [{"product_id": chair.id(), "quantity": 1}],
            "delivery_address": "Room 4, Akuafo Hall",
            "campus_zone": "NORTH",
        });
        let (status, _) = app.call(Method::POST, "/api/v1/orders", Some(&seller.token), Some(body)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = app.call(Method::GET, "/api/v1/orders?status=lost", Some(&seller.token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
