//! Liveness endpoint

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::info;

/// Build the liveness router
pub fn router(started_at: Instant) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .with_state(started_at)
}

async fn index() -> &'static str {
    "Bot is running!"
}

async fn health(State(started_at): State<Instant>) -> impl IntoResponse {
    Json(json!({
        "status": "running",
        "uptime_seconds": started_at.elapsed().as_secs(),
    }))
}

/// Serve the liveness endpoint until the process exits
pub async fn serve(addr: SocketAddr, started_at: Instant) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Liveness endpoint listening");
    axum::serve(listener, router(started_at)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_index() {
        let response = router(Instant::now())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Bot is running!");
    }

    #[tokio::test]
    async fn test_health_reports_uptime() {
        let response = router(Instant::now())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "running");
        assert!(json["uptime_seconds"].is_u64());
    }
}
