// src/api/error.rs
use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use thiserror::Error;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::api::envelope::ApiResponse;
use crate::domain::aggregates::{
    CartError, DeliveryError, OrderError, PaydayFlexError, PaymentError, ProductError, UnknownStatus,
};
use crate::domain::value_objects::ZoneError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("authentication required")]
    Unauthenticated,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("validation failed")]
    Validation(#[from] ValidationErrors),

    #[error("{message}")]
    Field { field: &'static str, message: String },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn field(field: &'static str, message: impl ToString) -> Self {
        AppError::Field { field, message: message.to_string() }
    }

    pub fn conflict(msg: impl ToString) -> Self { AppError::Conflict(msg.to_string()) }

    pub fn internal(msg: impl ToString) -> Self { AppError::Internal(msg.to_string()) }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthenticated | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) | AppError::Field { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Store(StoreError::Duplicate(_)) => StatusCode::CONFLICT,
            AppError::Store(StoreError::Missing(_)) => StatusCode::NOT_FOUND,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Issues keyed by field name, as shown next to form inputs.
    fn field_errors(&self) -> Option<BTreeMap<String, Vec<String>>> {
        match self {
            AppError::Validation(errors) => {
                let mut fields = BTreeMap::new();
                collect_issues("", errors, &mut fields);
                Some(fields)
            }
            AppError::Field { field, message } => Some(BTreeMap::from([(field.to_string(), vec![message.clone()])])),
            _ => None,
        }
    }
}

/// Flattens nested issues into keys like `items[1].quantity`.
fn collect_issues(prefix: &str, errors: &ValidationErrors, out: &mut BTreeMap<String, Vec<String>>) {
    for (field, kind) in errors.errors() {
        let key = if prefix.is_empty() { field.to_string() } else { format!("{prefix}.{field}") };
        match kind {
            ValidationErrorsKind::Field(issues) => {
                let messages = issues.iter().map(|issue| match &issue.message {
                    Some(message) => message.to_string(),
                    None => format!("{field} is invalid ({})", issue.code),
                });
                out.entry(key).or_default().extend(messages);
            }
            ValidationErrorsKind::Struct(inner) => collect_issues(&key, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_issues(&format!("{key}[{index}]"), inner, out);
                }
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Something went wrong, please try again".to_string()
        } else {
            self.to_string()
        };
        (status, ApiResponse::failure(message, self.field_errors())).into_response()
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NoItems | OrderError::ZeroQuantity | OrderError::Money(_) => AppError::BadRequest(err.to_string()),
            OrderError::InvalidTransition { .. } | OrderError::Cancelled => AppError::Conflict(err.to_string()),
        }
    }
}

impl From<DeliveryError> for AppError {
    fn from(err: DeliveryError) -> Self { AppError::Conflict(err.to_string()) }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::UnknownReference(_) => AppError::NotFound("payment reference"),
            _ => AppError::Conflict(err.to_string()),
        }
    }
}

impl From<PaydayFlexError> for AppError {
    fn from(err: PaydayFlexError) -> Self {
        match err {
            PaydayFlexError::DateTooSoon { .. } | PaydayFlexError::DateTooLate { .. } => AppError::field("payday_date", err),
            PaydayFlexError::NonPositiveTotal | PaydayFlexError::Money(_) => AppError::BadRequest(err.to_string()),
        }
    }
}

impl From<ProductError> for AppError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::MissingTitle => AppError::field("title", err),
            ProductError::NonPositivePrice | ProductError::SubMinorPrice => AppError::field("price", err),
            ProductError::Removed => AppError::Conflict(err.to_string()),
        }
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::ItemNotFound => AppError::NotFound("cart item"),
            CartError::QuantityTooLarge(_) => AppError::field("quantity", err),
        }
    }
}

impl From<ZoneError> for AppError {
    fn from(err: ZoneError) -> Self { AppError::field("campus_zone", err) }
}

impl From<UnknownStatus> for AppError {
    fn from(err: UnknownStatus) -> Self { AppError::BadRequest(err.to_string()) }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// JSON body that must also pass its `validator` rules.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Signup {
        #[validate(email(message = "Enter a valid email"))]
        email: String,
        #[validate(length(min = 8))]
        password: String,
    }

    #[test]
    fn test_validation_maps_field_by_field() {
        let err = AppError::from(Signup { email: "nope".into(), password: "short".into() }.validate().unwrap_err());
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let fields = err.field_errors().unwrap();
        assert_eq!(fields["email"], vec!["Enter a valid email".to_string()]);
        assert_eq!(fields["password"], vec!["password is invalid (length)".to_string()]);
    }

    #[test]
    fn test_domain_errors_map_to_statuses() {
        use crate::domain::aggregates::OrderStatus;
        let err = AppError::from(OrderError::InvalidTransition { from: OrderStatus::Delivered, to: OrderStatus::Pending });
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(AppError::from(StoreError::Duplicate("email")).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::from(PaymentError::UnknownReference("x".into())).status(), StatusCode::NOT_FOUND);
    }
}
