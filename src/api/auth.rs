//! Accounts and session tokens.
//!
//! Access and refresh tokens are HS256 JWTs. They travel as httpOnly cookies and are also
//! echoed in the body; a `Bearer` header wins over the cookie when both are present.

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::api::envelope::ApiResponse;
use crate::api::error::{AppError, Result, ValidatedJson};
use crate::api::AppState;
use crate::config::AppConfig;
use crate::domain::aggregates::{Role, User};
use crate::domain::value_objects::CampusZone;
use crate::store::StoreError;

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub kind: TokenKind,
    pub iat: usize,
    pub exp: usize,
}

pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl AuthKeys {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            access_ttl: Duration::minutes(config.access_token_ttl_minutes),
            refresh_ttl: Duration::days(config.refresh_token_ttl_days),
        }
    }

    pub fn issue(&self, user: &User, kind: TokenKind) -> Result<String> {
        let now = Utc::now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: user.id,
            role: user.role,
            kind,
            iat: now.timestamp() as usize,
            exp: (now + ttl).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(AppError::internal)
    }

    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|_| AppError::Unauthenticated)?;
        if data.claims.kind != kind {
            return Err(AppError::Unauthenticated);
        }
        Ok(data.claims)
    }
}

/// The signed-in, active user behind a request.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let bearer = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_owned);
        let token = match bearer {
            Some(token) => token,
            None => CookieJar::from_headers(&parts.headers)
                .get(ACCESS_COOKIE)
                .map(|cookie| cookie.value().to_owned())
                .ok_or(AppError::Unauthenticated)?,
        };
        let claims = state.auth.verify(&token, TokenKind::Access)?;
        let user = state.repo.find_user(claims.sub).await?.ok_or(AppError::Unauthenticated)?;
        if !user.is_active {
            return Err(AppError::Forbidden("account is deactivated"));
        }
        Ok(AuthUser(user))
    }
}

pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::Forbidden("admin access required"));
        }
        Ok(AdminUser(user))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"))]
    pub name: String,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 10, max = 15, message = "Enter a valid phone number"))]
    pub phone: Option<String>,
    pub campus_zone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 10, max = 15, message = "Enter a valid phone number"))]
    pub phone: Option<String>,
    pub campus_zone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Session<U> {
    pub user: U,
    pub access_token: String,
    pub refresh_token: String,
}

async fn hash_password(password: String, cost: u32) -> Result<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::internal)
}

async fn verify_password(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::internal)
}

fn session_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .path("/")
        .build()
}

/// Issues a fresh token pair and stores it in the cookie jar.
fn start_session(state: &AppState, jar: CookieJar, user: User) -> Result<(CookieJar, Session<User>)> {
    let access_token = state.auth.issue(&user, TokenKind::Access)?;
    let refresh_token = state.auth.issue(&user, TokenKind::Refresh)?;
    let secure = state.config.cookie_secure;
    let jar = jar
        .add(session_cookie(ACCESS_COOKIE, access_token.clone(), secure))
        .add(session_cookie(REFRESH_COOKIE, refresh_token.clone(), secure));
    Ok((jar, Session { user, access_token, refresh_token }))
}

fn parse_zone(zone: Option<String>) -> Result<Option<CampusZone>> {
    Ok(zone.filter(|z| !z.trim().is_empty()).map(CampusZone::new).transpose()?)
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(body): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, ApiResponse<Session<User>>)> {
    if state.repo.find_user_by_email(&body.email.trim().to_lowercase()).await?.is_some() {
        return Err(AppError::field("email", "An account with this email already exists"));
    }
    let hash = hash_password(body.password, state.config.bcrypt_cost).await?;
    let mut user = User::register(body.name.trim(), &body.email, hash);
    user.phone = body.phone;
    user.campus_zone = parse_zone(body.campus_zone)?;
    match state.repo.insert_user(&user).await {
        Err(StoreError::Duplicate(_)) => {
            return Err(AppError::field("email", "An account with this email already exists"))
        }
        other => other?,
    }
    tracing::info!(user_id = %user.id, "user registered");

    let (jar, session) = start_session(&state, jar, user)?;
    Ok((StatusCode::CREATED, jar, ApiResponse::ok(session).with_message("Account created")))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> Result<(CookieJar, ApiResponse<Session<User>>)> {
    let user = state
        .repo
        .find_user_by_email(&body.email.trim().to_lowercase())
        .await?
        .ok_or(AppError::InvalidCredentials)?;
    if !verify_password(body.password, user.password_hash.clone()).await? {
        return Err(AppError::InvalidCredentials);
    }
    if !user.is_active {
        return Err(AppError::Forbidden("account is deactivated"));
    }
    tracing::debug!(user_id = %user.id, "login");
    let (jar, session) = start_session(&state, jar, user)?;
    Ok((jar, ApiResponse::ok(session)))
}

pub async fn profile(AuthUser(user): AuthUser) -> ApiResponse<User> { ApiResponse::ok(user) }

pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(mut user): AuthUser,
    ValidatedJson(body): ValidatedJson<UpdateProfileRequest>,
) -> Result<ApiResponse<User>> {
    if let Some(name) = body.name {
        user.name = name.trim().to_string();
    }
    if body.phone.is_some() {
        user.phone = body.phone;
    }
    if body.campus_zone.is_some() {
        user.campus_zone = parse_zone(body.campus_zone)?;
    }
    user.touch();
    state.repo.save_user(&user).await?;
    Ok(ApiResponse::ok(user).with_message("Profile updated"))
}

/// Rotates both tokens. The refresh token comes from the body or, failing that, the cookie.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> Result<(CookieJar, ApiResponse<Session<User>>)> {
    let token = body
        .and_then(|Json(body)| body.refresh_token)
        .or_else(|| jar.get(REFRESH_COOKIE).map(|c| c.value().to_owned()))
        .ok_or(AppError::Unauthenticated)?;
    let claims = state.auth.verify(&token, TokenKind::Refresh)?;
    let user = state.repo.find_user(claims.sub).await?.ok_or(AppError::Unauthenticated)?;
    if !user.is_active {
        return Err(AppError::Forbidden("account is deactivated"));
    }
    let (jar, session) = start_session(&state, jar, user)?;
    Ok((jar, ApiResponse::ok(session)))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, ApiResponse<()>) {
    let jar = jar
        .remove(Cookie::build(ACCESS_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_COOKIE).path("/"));
    (jar, ApiResponse::message("Logged out"))
}
