use crate::errors::AuthError;
use crate::models::auth::{
    AccessTokenResponse, AuthResponse, LoginRequest, RefreshRequest, RegisterRequest,
};
use crate::services::AuthService;
use actix_web::{web, HttpResponse};
use tracing::info;

/// Register a new user
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Username or email already registered"),
        (status = 429, description = "Too many requests")
    ),
    tag = "Authentication"
)]
pub async fn register(
    auth: web::Data<AuthService>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AuthError> {
    info!(username = %payload.username, "Registration attempt");

    let response = auth.register(&payload).await?;
    Ok(HttpResponse::Created().json(response))
}

/// Login an existing user
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Invalid input or incorrect credentials"),
        (status = 429, description = "Too many requests")
    ),
    tag = "Authentication"
)]
pub async fn login(
    auth: web::Data<AuthService>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, AuthError> {
    info!(username = %payload.username, "Login attempt");

    let response = auth.login(&payload).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Exchange a refresh token for a new access token
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token issued", body = AccessTokenResponse),
        (status = 401, description = "Refresh token malformed, expired or mismatched"),
        (status = 404, description = "Token subject no longer exists"),
        (status = 429, description = "Too many requests")
    ),
    tag = "Authentication"
)]
pub async fn refresh(
    auth: web::Data<AuthService>,
    payload: web::Json<RefreshRequest>,
) -> Result<HttpResponse, AuthError> {
    let response = auth.refresh_access_token(&payload).await?;
    Ok(HttpResponse::Ok().json(response))
}
