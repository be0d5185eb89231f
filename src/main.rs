mod config;
mod db;
mod errors;
mod handlers;
mod middleware;
mod models;
mod services;
mod utils;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use config::Config;
use db::{Database, UserRepository};
use dotenv::dotenv;
use middleware::rate_limit::RateLimitMiddleware;
use services::{AuthService, TokenLifetimes};
use std::io;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_actix_web::TracingLogger;
use utils::auth::Argon2PasswordEncoder;
use utils::token::TokenService;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::api::health,
        handlers::api::get_current_user,
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh,
    ),
    components(
        schemas(
            handlers::api::HealthResponse,
            handlers::api::HealthChecks,
            models::auth::RegisterRequest,
            models::auth::LoginRequest,
            models::auth::RefreshRequest,
            models::auth::AuthResponse,
            models::auth::AccessTokenResponse,
            models::auth::UserResponse,
            models::user::Role,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Authentication", description = "Registration, login and token refresh"),
        (name = "Users", description = "Endpoints requiring a bearer access token")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Access token from /api/auth/login"))
                        .build(),
                ),
            );
        }
    }
}

fn startup_error(e: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing subscriber for structured logging
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .json()
        .init();

    let config = Config::from_env().map_err(startup_error)?;
    info!(config = ?config, "Configuration loaded");

    let database = Database::new(&config.db_path).map_err(startup_error)?;
    info!(db_path = %config.db_path, "Database initialized");

    let tokens = Arc::new(TokenService::new(&config.secret_key));
    let auth_service = web::Data::new(AuthService::new(
        Arc::new(UserRepository::new(database.clone())),
        Arc::new(Argon2PasswordEncoder::new()),
        tokens.clone(),
        TokenLifetimes::from(&config),
    ));
    let tokens = web::Data::from(tokens);
    let database = web::Data::new(database);

    let quota = NonZeroU32::new(config.auth_requests_per_minute).unwrap_or(NonZeroU32::MIN);
    let auth_rate_limit = RateLimitMiddleware::per_minute(quota);
    auth_rate_limit.spawn_cleanup(Duration::from_secs(60));

    let bind_address = config.bind_address();

    info!(bind_address = %bind_address, "Starting Sparesti API server");
    info!("Available endpoints:");
    info!("   GET  /api/health          - Health check (public)");
    info!("   POST /api/auth/register   - Register new user (public)");
    info!("   POST /api/auth/login      - Login user (public)");
    info!("   POST /api/auth/refresh    - Refresh access token (public)");
    info!("   GET  /api/users/me        - Current user profile (protected)");
    info!(
        swagger_url = format!("http://{}/swagger-ui/", bind_address),
        "Swagger UI available"
    );

    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::ACCEPT,
                actix_web::http::header::CONTENT_TYPE,
            ])
            .max_age(3600);

        let openapi = ApiDoc::openapi();

        App::new()
            .app_data(auth_service.clone())
            .app_data(tokens.clone())
            .app_data(database.clone())
            .wrap(TracingLogger::default())
            .wrap(cors)
            // Swagger UI
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi))
            // Public routes
            .route("/api/health", web::get().to(handlers::api::health))
            // Auth routes, rate limited per client IP
            .service(
                web::scope("/api/auth")
                    .wrap(auth_rate_limit.clone())
                    .route("/register", web::post().to(handlers::auth::register))
                    .route("/login", web::post().to(handlers::auth::login))
                    .route("/refresh", web::post().to(handlers::auth::refresh)),
            )
            // Protected routes
            .service(
                web::scope("/api/users")
                    .wrap(middleware::auth::AuthMiddleware)
                    .route("/me", web::get().to(handlers::api::get_current_user)),
            )
    })
    .bind(&bind_address)?
    .run()
    .await
}
