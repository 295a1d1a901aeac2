// =============================================================================
// HANDLERS MODULE
// =============================================================================
// HTTP request handlers (controller layer), one submodule per route group:
//
// - auth:     register, login, profile, password, email verification
// - products: storefront catalogue, product page, reviews
// - cart:     per-user cart
// - orders:   checkout, order history, payment
// - user:     wishlist and product comparison
// - chat:     support chat (REST + WebSocket)
// - admin:    back-office
//
// Operational endpoints (health, readiness, metrics, fallback) live here.
// Every JSON answer uses the `ApiResponse` envelope.
// =============================================================================

pub mod admin;
pub mod auth;
pub mod cart;
pub mod chat;
pub mod orders;
pub mod products;
pub mod user;

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::cache;
use crate::error::{AppError, AppResult};
use crate::models::{
    ApiResponse, CustomerSummary, HealthResponse, Order, OrderView, ReadinessChecks,
    ReadinessResponse,
};
use crate::AppState;

/// Envelope-wrapped JSON answer
pub type JsonResult<T> = AppResult<Json<ApiResponse<T>>>;

/// Envelope-wrapped JSON answer with an explicit status (201 on create)
pub type CreatedResult<T> = AppResult<(StatusCode, Json<ApiResponse<T>>)>;

// =============================================================================
// HEALTH CHECK ENDPOINTS
// =============================================================================

/// Liveness probe
///
/// GET /api/health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = if state.store.ping().await {
        "connected"
    } else {
        "disconnected"
    };

    Json(HealthResponse {
        success: true,
        message: "Server is running".to_string(),
        timestamp: Utc::now(),
        uptime: state.started_at.elapsed().as_secs_f64(),
        database: database.to_string(),
    })
}

/// Readiness probe: the database must answer, and so must Redis when one is
/// configured.
///
/// GET /ready
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let database = state.store.ping().await;
    let cache = match &state.cache {
        Some(cache) => Some(cache.ping().await),
        None => None,
    };

    let ready = database && cache.unwrap_or(true);
    let response = ReadinessResponse {
        status: if ready { "ready" } else { "not_ready" }.to_string(),
        checks: ReadinessChecks { database, cache },
    };

    if ready {
        (StatusCode::OK, Json(response))
    } else {
        tracing::warn!(database, ?cache, "Readiness check failed");
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

// =============================================================================
// METRICS ENDPOINT
// =============================================================================
/// Prometheus metrics in text exposition format
///
/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}

/// Fallback for every unknown route
pub async fn not_found(OriginalUri(uri): OriginalUri) -> AppError {
    AppError::not_found(format!("Route {} not found", uri.path()))
}

// =============================================================================
// SHARED HELPERS
// =============================================================================

/// Drop the cached product page, if there is a cache
pub(crate) async fn invalidate_product(state: &AppState, id: Uuid) {
    if let Some(cache) = &state.cache {
        cache.delete(&cache::product_key(id)).await;
    }
}

/// Attach the purchaser to each order for admin views
pub(crate) async fn attach_customers(
    state: &AppState,
    orders: Vec<Order>,
) -> AppResult<Vec<OrderView>> {
    let mut ids: Vec<Uuid> = orders.iter().map(|order| order.user_id).collect();
    ids.sort();
    ids.dedup();

    let customers: HashMap<Uuid, CustomerSummary> = state
        .store
        .users_by_ids(&ids)
        .await?
        .iter()
        .map(|user| (user.id, CustomerSummary::from(user)))
        .collect();

    Ok(orders
        .into_iter()
        .map(|order| OrderView {
            customer: customers.get(&order.user_id).cloned(),
            order,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use crate::test_support::TestApp;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health_reports_database() {
        let app = TestApp::new();
        let (status, body) = app.get("/api/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Server is running");
        assert_eq!(body["database"], "connected");
    }

    #[tokio::test]
    async fn test_ready_without_cache() {
        let app = TestApp::new();
        let (status, body) = app.get("/ready", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
        assert_eq!(body["checks"]["database"], true);
        assert!(body["checks"]["cache"].is_null());
    }

    #[tokio::test]
    async fn test_unknown_route_uses_envelope() {
        let app = TestApp::new();
        let (status, body) = app.get("/api/nope", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Route /api/nope not found");
    }
}
