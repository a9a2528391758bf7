use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::db::health_check;
use crate::routes::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub database: &'static str,
    pub environment: String,
    pub version: &'static str,
}

/// Health check endpoint
/// GET /health
pub async fn health_check_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let database_healthy = match health_check(&state.pool).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            false
        }
    };

    let (status_code, status) = if database_healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    let response = HealthResponse {
        status,
        timestamp: chrono::Utc::now(),
        database: status,
        environment: state.config.environment.to_string(),
        version: env!("CARGO_PKG_VERSION"),
    };

    (status_code, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy",
            timestamp: chrono::Utc::now(),
            database: "healthy",
            environment: "test".to_string(),
            version: "0.1.0",
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(json.contains("timestamp"));
        assert!(json.contains("\"environment\":\"test\""));
    }
}
