//! Monitoring API
//!
//! Small operational surface over the session registry: liveness and a
//! snapshot of active calls. The business dashboard lives in a separate
//! service; nothing here mutates call state.

use crate::domain::registry::{SessionRegistry, SessionSnapshot};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

/// Standard response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub count: usize,
    pub sessions: Vec<SessionSnapshot>,
}

async fn health_check(State(registry): State<SessionRegistry>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::success(HealthResponse {
        status: "healthy",
        active_sessions: registry.active_count().await,
    }))
}

async fn list_sessions(
    State(registry): State<SessionRegistry>,
) -> Json<ApiResponse<SessionsResponse>> {
    let sessions = registry.snapshot().await;
    Json(ApiResponse::success(SessionsResponse {
        count: sessions.len(),
        sessions,
    }))
}

/// Build the monitoring router
pub fn build_router(registry: SessionRegistry) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/sessions", get(list_sessions))
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::{CallDirection, CallSession};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt; // for `oneshot`

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let registry = SessionRegistry::new();
        let (status, json) = get_json(build_router(registry), "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["status"], "healthy");
        assert_eq!(json["data"]["active_sessions"], 0);
    }

    #[tokio::test]
    async fn test_list_sessions() {
        let registry = SessionRegistry::new();
        let entry = registry
            .insert(CallSession::new("abc-123".to_string(), CallDirection::Inbound))
            .await
            .unwrap();
        entry.write().await.dialed_number = Some("+15551230001".to_string());

        let (status, json) = get_json(build_router(registry), "/sessions").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["count"], 1);
        assert_eq!(json["data"]["sessions"][0]["id"], "abc-123");
        assert_eq!(json["data"]["sessions"][0]["state"], "connecting");
        assert_eq!(json["data"]["sessions"][0]["dialed_number"], "+15551230001");
    }
}
