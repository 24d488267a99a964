//! Mobile-money charges and the Payday Flex installment plan.
//!
//! Every charge is started here and settled by the provider through `/payments/callback`.
//! A payment has at most one charge in flight; the callback names it by reference.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::api::auth::AuthUser;
use crate::api::envelope::ApiResponse;
use crate::api::error::{AppError, Result, ValidatedJson};
use crate::api::orders::visible_order;
use crate::api::AppState;
use crate::domain::aggregates::{
    split_in_half, Order, OrderError, OrderStatus, PaydayFlexPlan, Payment, PaymentMethod, PaymentStatus, User,
};
use crate::domain::value_objects::Money;

pub const CALLBACK_SECRET_HEADER: &str = "x-callback-secret";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentSchedule {
    pub first_payment: Money,
    pub second_payment: Money,
    pub due_date: NaiveDate,
}

/// A payment as shown to its customer, with `overdue` resolved for today.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentView {
    pub order_id: Uuid,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount_total: Money,
    pub amount_paid: Money,
    pub amount_remaining: Money,
    pub due_date: Option<NaiveDate>,
    pub pending_reference: Option<String>,
    pub schedule: Option<InstallmentSchedule>,
}

impl PaymentView {
    pub fn new(payment: &Payment, today: NaiveDate) -> Self {
        let schedule = match (payment.method(), payment.due_date()) {
            (PaymentMethod::Installment, Some(due_date)) => split_in_half(payment.amount_total())
                .ok()
                .map(|(first_payment, second_payment)| InstallmentSchedule { first_payment, second_payment, due_date }),
            _ => None,
        };
        Self {
            order_id: payment.order_id(),
            method: payment.method(),
            status: payment.effective_status(today),
            amount_total: payment.amount_total().clone(),
            amount_paid: payment.amount_paid().clone(),
            amount_remaining: payment.amount_remaining(),
            due_date: payment.due_date(),
            pending_reference: payment.pending_charge().map(|c| c.reference.clone()),
            schedule,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeStarted {
    pub reference: String,
    pub amount: Money,
    pub phone_number: String,
    pub payment: PaymentView,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MobileMoneyRequest {
    pub order_id: Uuid,
    #[validate(length(min = 10, max = 15, message = "Enter the mobile money number to charge"))]
    pub phone_number: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PaydayFlexRequest {
    pub order_id: Uuid,
    pub payday_date: Option<NaiveDate>,
    #[validate(length(min = 10, max = 15, message = "Enter the mobile money number to charge"))]
    pub phone_number: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SecondInstallmentRequest {
    #[validate(length(min = 10, max = 15, message = "Enter the mobile money number to charge"))]
    pub phone_number: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackOutcome {
    Success,
    Failed,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ProviderCallback {
    #[validate(length(min = 1, message = "Reference is required"))]
    pub reference: String,
    pub status: CallbackOutcome,
}

fn new_reference() -> String { format!("PAY-{}", Uuid::now_v7().simple()) }

/// Loads the order and its payment for a customer starting a charge.
async fn payable(state: &AppState, user: &User, order_id: Uuid) -> Result<(Order, Payment)> {
    let order = visible_order(state, user, order_id).await?;
    if order.status() == OrderStatus::Cancelled {
        return Err(AppError::Conflict(OrderError::Cancelled.to_string()));
    }
    if order.status() == OrderStatus::Pending {
        if let Some(title) = unavailable_listing(state, &order).await? {
            return Err(AppError::conflict(format!("{title} is no longer available")));
        }
    }
    let payment = state.repo.find_payment(order_id).await?.ok_or(AppError::NotFound("payment"))?;
    Ok((order, payment))
}

/// Title of the first ordered listing that can no longer be bought.
async fn unavailable_listing(state: &AppState, order: &Order) -> Result<Option<String>> {
    for item in order.items() {
        match state.repo.find_product(item.product_id).await? {
            Some(product) if product.is_purchasable() => {}
            Some(product) => return Ok(Some(product.title().to_string())),
            None => return Ok(Some(item.title.clone())),
        }
    }
    Ok(None)
}

async fn charge_started(state: &AppState, mut payment: Payment) -> Result<ChargeStarted> {
    let charge = payment.pending_charge().cloned().ok_or_else(|| AppError::internal("charge was not opened"))?;
    state.repo.save_payment(&payment).await?;
    state.events.publish_all(payment.take_events()).await;
    tracing::info!(order_id = %payment.order_id(), reference = %charge.reference, amount = %charge.amount, "charge started");
    Ok(ChargeStarted {
        reference: charge.reference,
        amount: charge.amount,
        phone_number: charge.phone_number,
        payment: PaymentView::new(&payment, Utc::now().date_naive()),
    })
}

pub async fn initialize_mobile_money(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidatedJson(body): ValidatedJson<MobileMoneyRequest>,
) -> Result<ApiResponse<ChargeStarted>> {
    let (_, mut payment) = payable(&state, &user, body.order_id).await?;
    payment.start_full_charge(new_reference(), body.phone_number)?;
    let started = charge_started(&state, payment).await?;
    Ok(ApiResponse::ok(started).with_message("Approve the payment prompt on your phone"))
}

pub async fn initialize_payday_flex(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidatedJson(body): ValidatedJson<PaydayFlexRequest>,
) -> Result<ApiResponse<ChargeStarted>> {
    let payday = body.payday_date.ok_or_else(|| AppError::field("payday_date", "Choose your payday date"))?;
    let (order, mut payment) = payable(&state, &user, body.order_id).await?;
    let plan = PaydayFlexPlan::new(order.total(), payday, Utc::now().date_naive())?;
    payment.start_payday_flex(&plan, new_reference(), body.phone_number)?;
    let started = charge_started(&state, payment).await?;
    Ok(ApiResponse::ok(started).with_message(format!(
        "Pay {} now and {} on {}",
        plan.first_payment, plan.second_payment, plan.due_date
    )))
}

pub async fn complete_payday_flex(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(order_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<SecondInstallmentRequest>,
) -> Result<ApiResponse<ChargeStarted>> {
    let (_, mut payment) = payable(&state, &user, order_id).await?;
    payment.start_second_installment(new_reference(), body.phone_number)?;
    let started = charge_started(&state, payment).await?;
    Ok(ApiResponse::ok(started).with_message("Approve the second installment on your phone"))
}

/// Settles the in-flight charge named by the provider. The first confirmed charge moves
/// the order into processing and takes its listings off the market.
pub async fn provider_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<ProviderCallback>,
) -> Result<ApiResponse<PaymentView>> {
    if let Some(secret) = &state.config.payment_callback_secret {
        let sent = headers.get(CALLBACK_SECRET_HEADER).and_then(|v| v.to_str().ok());
        if sent != Some(secret.as_str()) {
            tracing::warn!(reference = %body.reference, "payment callback with a bad secret");
            return Err(AppError::Unauthenticated);
        }
    }
    let mut payment = state
        .repo
        .find_payment_by_reference(&body.reference)
        .await?
        .ok_or(AppError::NotFound("payment reference"))?;

    match body.status {
        CallbackOutcome::Failed => {
            payment.fail_charge(&body.reference)?;
            state.repo.save_payment(&payment).await?;
            tracing::info!(order_id = %payment.order_id(), reference = %body.reference, "charge failed");
        }
        CallbackOutcome::Success => {
            payment.confirm_charge(&body.reference)?;
            state.repo.save_payment(&payment).await?;
            tracing::info!(order_id = %payment.order_id(), status = %payment.status(), "charge confirmed");
            settle_order(&state, payment.order_id()).await?;
        }
    }
    state.events.publish_all(payment.take_events()).await;
    Ok(ApiResponse::ok(PaymentView::new(&payment, Utc::now().date_naive())))
}

async fn settle_order(state: &AppState, order_id: Uuid) -> Result<()> {
    let mut order = state.repo.find_order(order_id).await?.ok_or(AppError::NotFound("order"))?;
    let before = order.status();
    if before == OrderStatus::Pending {
        if let Some(title) = unavailable_listing(state, &order).await? {
            tracing::warn!(%order_id, listing = %title, "payment confirmed for a listing sold to another order; refund needed");
            return Ok(());
        }
    }
    match order.payment_confirmed() {
        Ok(()) => {}
        Err(OrderError::Cancelled) => {
            tracing::warn!(%order_id, "payment confirmed for a cancelled order; refund needed");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }
    if before == order.status() {
        return Ok(());
    }
    state.repo.save_order(&order).await?;
    for item in order.items() {
        if let Some(mut product) = state.repo.find_product(item.product_id).await? {
            product.mark_sold();
            state.repo.save_product(&product).await?;
        }
    }
    state.events.publish_all(order.take_events()).await;
    Ok(())
}

pub async fn get_payment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<ApiResponse<PaymentView>> {
    visible_order(&state, &user, order_id).await?;
    let payment = state.repo.find_payment(order_id).await?.ok_or(AppError::NotFound("payment"))?;
    Ok(ApiResponse::ok(PaymentView::new(&payment, Utc::now().date_naive())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::TestApp;
    use crate::domain::aggregates::Role;
    use axum::http::{Method, StatusCode};
    use chrono::Duration;
    use serde_json::{json, Value};

    async fn callback(app: &TestApp, reference: &Value, status: &str) -> (StatusCode, Value) {
        let body = json!({"reference": reference, "status": status});
        app.call(Method::POST, "/api/v1/payments/callback", None, Some(body)).await
    }

    #[tokio::test]
    async fn test_payday_flex_runs_to_paid() {
        let app = TestApp::new();
        let seller = app.user("Esi", Role::Customer).await;
        let buyer = app.user("Kwame", Role::Customer).await;
        let phone = app.product(&seller, "Phone", 9999).await;
        let order_id = app.order(&buyer, &phone).await;
        let payday = Utc::now().date_naive() + Duration::days(14);

        let body = json!({"order_id": order_id, "payday_date": payday, "phone_number": "0241234567"});
        let (status, json) = app.call(Method::POST, "/api/v1/payments/payday-flex/initialize", Some(&buyer.token), Some(body)).await;
        assert_eq!(status, StatusCode::OK, "{json}");
        assert_eq!(json["data"]["amount"]["amount"], "50.00");
        assert_eq!(json["data"]["payment"]["schedule"]["second_payment"]["amount"], "49.99");
        let first = json["data"]["reference"].clone();

        let (status, json) = callback(&app, &first, "success").await;
        assert_eq!(status, StatusCode::OK, "{json}");
        assert_eq!(json["data"]["status"], "partial");
        assert_eq!(json["data"]["amount_remaining"]["amount"], "49.99");

        let order = app.state.repo.find_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.status(), OrderStatus::Processing);
        let listing = app.state.repo.find_product(phone.id()).await.unwrap().unwrap();
        assert!(!listing.is_purchasable());

        let uri = format!("/api/v1/payments/payday-flex/{order_id}/complete");
        let (status, json) = app.call(Method::POST, &uri, Some(&buyer.token), Some(json!({"phone_number": "0241234567"}))).await;
        assert_eq!(status, StatusCode::OK, "{json}");
        let second = json["data"]["reference"].clone();
        let (_, json) = callback(&app, &second, "success").await;
        assert_eq!(json["data"]["status"], "paid");
        assert_eq!(json["data"]["amount_paid"]["amount"], "99.99");

        let (status, _) = callback(&app, &second, "success").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_payday_outside_window_is_rejected() {
        let app = TestApp::new();
        let seller = app.user("Esi", Role::Customer).await;
        let buyer = app.user("Kwame", Role::Customer).await;
        let fridge = app.product(&seller, "Fridge", 40000).await;
        let order_id = app.order(&buyer, &fridge).await;
        let today = Utc::now().date_naive();

        for payday in [today + Duration::days(6), today + Duration::days(31)] {
            let body = json!({"order_id": order_id, "payday_date": payday, "phone_number": "0241234567"});
            let (status, json) = app.call(Method::POST, "/api/v1/payments/payday-flex/initialize", Some(&buyer.token), Some(body)).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
            assert!(json["errors"]["payday_date"].is_array());
        }
        let body = json!({"order_id": order_id, "phone_number": "0241234567"});
        let (status, _) = app.call(Method::POST, "/api/v1/payments/payday-flex/initialize", Some(&buyer.token), Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_failed_mobile_money_charge_can_be_retried() {
        let app = TestApp::new();
        let seller = app.user("Esi", Role::Customer).await;
        let buyer = app.user("Kwame", Role::Customer).await;
        let bike = app.product(&seller, "Bicycle", 35000).await;
        let order_id = app.order(&buyer, &bike).await;
        let body = json!({"order_id": order_id, "phone_number": "0201234567"});

        let (_, json) = app.call(Method::POST, "/api/v1/payments/mobile-money/initialize", Some(&buyer.token), Some(body.clone())).await;
        let (status, _) = app.call(Method::POST, "/api/v1/payments/mobile-money/initialize", Some(&buyer.token), Some(body.clone())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (_, failed) = callback(&app, &json["data"]["reference"], "failed").await;
        assert_eq!(failed["data"]["status"], "failed");

        let (status, json) = app.call(Method::POST, "/api/v1/payments/mobile-money/initialize", Some(&buyer.token), Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        let (_, paid) = callback(&app, &json["data"]["reference"], "success").await;
        assert_eq!(paid["data"]["status"], "paid");

        let (_, view) = app.call(Method::GET, &format!("/api/v1/payments/order/{order_id}"), Some(&buyer.token), None).await;
        assert_eq!(view["data"]["amount_remaining"]["amount"], "0.00");
    }

    #[tokio::test]
    async fn test_listing_is_sold_only_once() {
        let app = TestApp::new();
        let seller = app.user("Esi", Role::Customer).await;
        let ama = app.user("Ama", Role::Customer).await;
        let kofi = app.user("Kofi", Role::Customer).await;
        let yaa = app.user("Yaa", Role::Customer).await;
        let bike = app.product(&seller, "Bicycle", 35000).await;
        let first = app.order(&ama, &bike).await;
        let second = app.order(&kofi, &bike).await;
        let late = app.order(&yaa, &bike).await;

        let mut references = vec![];
        for (buyer, order_id) in [(&ama, first), (&kofi, second)] {
            let body = json!({"order_id": order_id, "phone_number": "0201234567"});
            let (status, json) = app.call(Method::POST, "/api/v1/payments/mobile-money/initialize", Some(&buyer.token), Some(body)).await;
            assert_eq!(status, StatusCode::OK, "{json}");
            references.push(json["data"]["reference"].clone());
        }
        for reference in &references {
            let (status, _) = callback(&app, reference, "success").await;
            assert_eq!(status, StatusCode::OK);
        }

        let winner = app.state.repo.find_order(first).await.unwrap().unwrap();
        assert_eq!(winner.status(), OrderStatus::Processing);
        let refunded = app.state.repo.find_order(second).await.unwrap().unwrap();
        assert_eq!(refunded.status(), OrderStatus::Pending);

        let body = json!({"order_id": late, "phone_number": "0201234567"});
        let (status, json) = app.call(Method::POST, "/api/v1/payments/mobile-money/initialize", Some(&yaa.token), Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["message"], "Bicycle is no longer available");
    }

    #[test]
    fn test_view_derives_overdue() {
        let mut payment = Payment::new(Uuid::new_v4(), PaymentMethod::Installment, Money::ghs(rust_decimal::Decimal::new(10000, 2)));
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let plan = PaydayFlexPlan::new(payment.amount_total(), today + Duration::days(7), today).unwrap();
        payment.start_payday_flex(&plan, "r1", "0241234567").unwrap();
        payment.confirm_charge("r1").unwrap();
        assert_eq!(PaymentView::new(&payment, today).status, PaymentStatus::Partial);
        assert_eq!(PaymentView::new(&payment, today + Duration::days(8)).status, PaymentStatus::Overdue);
    }
}
