use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;

/// Liveness response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
}

/// Readiness response
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    /// "up", "down" or "not_configured" when running on the in-memory store
    pub database: String,
}

/// GET /health - liveness probe, never touches the rule store
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// GET /ready - readiness probe
pub async fn readiness_check(pool: Option<web::Data<MySqlPool>>) -> impl Responder {
    let Some(pool) = pool else {
        return HttpResponse::Ok().json(ReadinessResponse {
            ready: true,
            database: "not_configured".to_string(),
        });
    };

    match sqlx::query("SELECT 1").fetch_one(pool.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(ReadinessResponse {
            ready: true,
            database: "up".to_string(),
        }),
        Err(e) => {
            tracing::error!(error = %e, "Database readiness check failed");
            HttpResponse::ServiceUnavailable().json(ReadinessResponse {
                ready: false,
                database: "down".to_string(),
            })
        }
    }
}

/// Configure health check routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/ready", web::get().to(readiness_check));
}
