//! HTTP surface, mounted under `/api/v1`.

use axum::{
    routing::{get, patch, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::events::EventPublisher;
use crate::store::Repository;

pub mod admin;
pub mod auth;
pub mod cart;
pub mod deliveries;
pub mod envelope;
pub mod error;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reviews;

pub use auth::{AdminUser, AuthKeys, AuthUser};
pub use envelope::{ApiResponse, Pagination};
pub use error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub events: EventPublisher,
    pub auth: Arc<AuthKeys>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repository>, events: EventPublisher, config: AppConfig) -> Self {
        Self { repo, events, auth: Arc::new(AuthKeys::new(&config)), config: Arc::new(config) }
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/profile", get(auth::profile).patch(auth::update_profile))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/products", get(products::list_products).post(products::create_product))
        .route(
            "/products/:id",
            get(products::get_product).patch(products::update_product).delete(products::delete_product),
        )
        .route("/cart", get(cart::get_cart).delete(cart::clear_cart))
        .route("/cart/items", post(cart::add_item))
        .route("/cart/items/:product_id", patch(cart::set_quantity).delete(cart::remove_item))
        .route("/orders", get(orders::list_orders).post(orders::create_order))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/cancel", post(orders::cancel_order))
        .route("/payments/mobile-money/initialize", post(payments::initialize_mobile_money))
        .route("/payments/payday-flex/initialize", post(payments::initialize_payday_flex))
        .route("/payments/payday-flex/:order_id/complete", post(payments::complete_payday_flex))
        .route("/payments/callback", post(payments::provider_callback))
        .route("/payments/order/:order_id", get(payments::get_payment))
        .route("/deliveries/track/:order_id", get(deliveries::track))
        .route("/deliveries/:order_id/status", patch(deliveries::update_status))
        .route("/admin/orders", get(admin::list_orders))
        .route("/admin/orders/:id/status", patch(admin::update_order_status))
        .route("/admin/deliveries/:order_id/assign", patch(admin::assign_rider))
        .route("/admin/riders", get(admin::list_riders).post(admin::create_rider))
        .route("/admin/riders/:id/availability", patch(admin::set_rider_availability))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/:id", patch(admin::update_user))
        .route("/reviews", post(reviews::create_review))
        .route("/reviews/product/:product_id", get(reviews::list_reviews));

    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "campus-market"})) }))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Router harness shared by the handler tests.

    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::domain::aggregates::{ListingDetails, Product, Role, User};
    use crate::domain::value_objects::{CampusZone, Money};
    use crate::store::MemoryRepository;

    pub struct TestApp {
        pub state: AppState,
        pub router: Router,
    }

    pub struct TestUser {
        pub user: User,
        pub token: String,
    }

    impl TestApp {
        pub fn new() -> Self {
            let state = AppState::new(Arc::new(MemoryRepository::new()), EventPublisher::disabled(), AppConfig::for_tests());
            Self { router: router(state.clone()), state }
        }

        /// Serves the router on an ephemeral local port and returns the API base URL.
        pub async fn serve(&self) -> String {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let router = self.router.clone();
            tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
            format!("http://{addr}/api/v1")
        }

        pub async fn user(&self, name: &str, role: Role) -> TestUser {
            let mut user = User::register(name, &format!("{}@uni.edu", name.to_lowercase()), String::new());
            user.role = role;
            user.campus_zone = Some(CampusZone::new("NORTH").unwrap());
            self.state.repo.insert_user(&user).await.unwrap();
            let token = self.state.auth.issue(&user, auth::TokenKind::Access).unwrap();
            TestUser { user, token }
        }

        pub async fn product(&self, seller: &TestUser, title: &str, price: i64) -> Product {
            let details = ListingDetails {
                title: title.into(),
                price: Money::ghs(Decimal::new(price, 2)),
                category: "books".into(),
                ..Default::default()
            };
            let product = Product::list(seller.user.id, details, CampusZone::new("NORTH").unwrap()).unwrap();
            self.state.repo.save_product(&product).await.unwrap();
            product
        }

        pub async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
            let mut request = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let body = match body {
                Some(body) => {
                    request = request.header(header::CONTENT_TYPE, "application/json");
                    Body::from(body.to_string())
                }
                None => Body::empty(),
            };
            let response = self.router.clone().oneshot(request.body(body).unwrap()).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
            (status, json)
        }

        /// Places a one-item order for `buyer` and returns its id.
        pub async fn order(&self, buyer: &TestUser, product: &Product) -> Uuid {
            let body = json!({
                "items": [{"product_id": product.id(), "quantity": 1}],
                "delivery_address": "Room 12, Volta Hall",
                "campus_zone": "NORTH",
            });
            let (status, json) = self.call(Method::POST, "/api/v1/orders", Some(&buyer.token), Some(body)).await;
            assert_eq!(status, StatusCode::CREATED, "{json}");
            json["data"]["order"]["id"].as_str().unwrap().parse().unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::TestApp;
    use axum::http::{Method, StatusCode};

    #[tokio::test]
    async fn test_health_and_unknown_route() {
        let app = TestApp::new();
        let (status, json) = app.call(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        let (status, _) = app.call(Method::GET, "/api/v1/nowhere", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
