// =============================================================================
// ROUTES
// =============================================================================
// Maps URL paths to handlers and stacks the request-wide layers.
//
// Layer order, outermost first:
//   CORS -> trace -> compression -> body limit -> security headers -> metrics
// The rate limiters sit on the /api nest (general) and /api/auth (strict),
// so /ready and /metrics are never throttled.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{self, admin, auth, cart, chat, orders, products, user};
use crate::middleware::{rate_limit, security_headers, track_http_metrics, RateLimiter};
use crate::AppState;

/// Largest accepted request body
const BODY_LIMIT: usize = 10 * 1024 * 1024;

pub fn build_router(state: Arc<AppState>) -> Router {
    let config = &state.config;
    let general = RateLimiter::general(config.rate_limit_max, config.rate_limit_window);
    let strict = RateLimiter::auth(config.auth_rate_limit_max, config.rate_limit_window);
    let cors = cors_layer(&config.cors_origins);

    let api = Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/auth", auth_routes().layer(from_fn_with_state(strict, rate_limit)))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
        .nest("/user", user_routes())
        .nest("/chat", chat_routes())
        .nest("/admin", admin_routes())
        .layer(from_fn_with_state(general, rate_limit));

    Router::new()
        .nest("/api", api)
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        .fallback(handlers::not_found)
        .layer(from_fn(track_http_metrics))
        .layer(from_fn(security_headers))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/profile", put(auth::update_profile))
        .route("/change-password", put(auth::change_password))
        .route("/verify-email/:token", get(auth::verify_email))
}

fn product_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(products::list_products))
        .route("/featured", get(products::featured_products))
        .route("/search-suggestions", get(products::search_suggestions))
        .route("/:id", get(products::get_product))
        .route("/:id/reviews", post(products::add_review))
}

fn cart_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(cart::get_cart))
        .route("/add", post(cart::add_to_cart))
        .route("/update", put(cart::update_cart_item))
        .route("/remove/:product_id", delete(cart::remove_cart_item))
        .route("/clear", delete(cart::clear_cart))
}

fn order_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(orders::create_order))
        .route("/my-orders", get(orders::my_orders))
        .route("/payment", post(orders::process_payment))
        .route("/clear-history", delete(orders::clear_history))
        .route("/:id", get(orders::get_order))
}

fn user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/wishlist", get(user::get_wishlist))
        .route("/wishlist/add", post(user::add_to_wishlist))
        .route("/wishlist/remove/:product_id", delete(user::remove_from_wishlist))
        .route("/compare", post(user::compare_products))
}

fn chat_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/messages", get(chat::get_messages).post(chat::send_message))
        .route("/ws", get(chat::chat_socket))
}

fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard", get(admin::dashboard))
        // ----- Products -----
        .route(
            "/products",
            get(admin::list_products).post(admin::create_product),
        )
        .route(
            "/products/:id",
            get(admin::get_product)
                .put(admin::update_product)
                .delete(admin::delete_product),
        )
        // ----- Orders -----
        .route("/orders", get(admin::list_orders))
        .route("/orders/:id", get(admin::get_order))
        .route("/orders/:id/status", put(admin::update_order_status))
        .route("/orders/:id/payment", put(admin::update_order_payment))
        // ----- Users -----
        .route("/users", get(admin::list_users))
        .route("/users/:id/role", put(admin::update_user_role))
        // ----- Reference data -----
        .route(
            "/categories",
            get(admin::list_categories).post(admin::create_category),
        )
        .route(
            "/categories/:id",
            put(admin::update_category).delete(admin::delete_category),
        )
        .route(
            "/coupons",
            get(admin::list_coupons).post(admin::create_coupon),
        )
        .route(
            "/coupons/:id",
            put(admin::update_coupon).delete(admin::delete_coupon),
        )
}

/// Credentialed CORS for the configured storefront origins
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
