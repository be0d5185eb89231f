use crate::db::Database;
use crate::errors::AuthError;
use crate::models::auth::UserResponse;
use crate::models::user::Claims;
use crate::services::AuthService;
use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize, ToSchema)]
pub struct HealthChecks {
    pub database: bool,
}

/// Public health check endpoint with dependency checks
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is degraded", body = HealthResponse)
    ),
    tag = "Health"
)]
pub async fn health(db: web::Data<Database>) -> impl Responder {
    let database = db.is_healthy();
    if !database {
        warn!("Health check: user store unavailable");
    }

    let response = HealthResponse {
        status: if database { "healthy" } else { "degraded" }.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks { database },
    };

    if database {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

/// Profile of the user the access token was issued to
#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "User profile retrieved", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User no longer exists")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Users"
)]
pub async fn get_current_user(
    claims: web::ReqData<Claims>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AuthError> {
    let user = auth.current_user(&claims.sub).await?;

    info!(user_id = %user.id, "Profile retrieved");

    Ok(HttpResponse::Ok().json(UserResponse::from(&user)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};

    #[actix_web::test]
    async fn test_health_reports_database() {
        let db = web::Data::new(Database::in_memory().unwrap());
        let app = test::init_service(
            App::new()
                .app_data(db)
                .route("/api/health", web::get().to(health)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["checks"]["database"], true);
    }
}
