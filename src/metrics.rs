// =============================================================================
// METRICS MODULE
// =============================================================================
// Prometheus metrics for the storefront.
//
// The recorder is installed once in `main`; until then every macro below is
// a no-op, which is what unit and router tests rely on.
//
// METRIC TYPES USED:
// - Counter: requests, orders, checkout rejections, payments, reviews
// - Gauge: per-SKU stock after checkout
// - Histogram: HTTP, database and cache latency
// =============================================================================

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

// =============================================================================
// METRIC NAMES
// =============================================================================

/// Labels: method, endpoint (matched route), status
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";

/// Labels: method, endpoint
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

pub const ORDERS_CREATED_TOTAL: &str = "storefront_orders_created_total";

/// Labels: reason (insufficient_stock, price_changed, ...)
pub const CHECKOUT_REJECTIONS_TOTAL: &str = "storefront_checkout_rejections_total";

/// Labels: outcome (succeeded, failed, already_paid)
pub const PAYMENTS_TOTAL: &str = "storefront_payments_total";

pub const REVIEWS_ADDED_TOTAL: &str = "storefront_reviews_added_total";

/// Labels: sku
pub const PRODUCT_STOCK_LEVEL: &str = "storefront_product_stock_level";

/// Labels: scope (general, auth)
pub const RATE_LIMITED_TOTAL: &str = "storefront_rate_limited_total";

/// Labels: kind (user, admin)
pub const CHAT_MESSAGES_TOTAL: &str = "storefront_chat_messages_total";

/// Labels: operation
pub const DB_QUERY_DURATION_SECONDS: &str = "db_query_duration_seconds";

/// Labels: operation (get, set, delete)
pub const CACHE_OPERATION_DURATION_SECONDS: &str = "cache_operation_duration_seconds";

/// Labels: result (hit, miss)
pub const CACHE_LOOKUPS_TOTAL: &str = "cache_lookups_total";

// =============================================================================
// SETUP
// =============================================================================
/// Install the global Prometheus recorder and describe every metric.
///
/// The returned handle renders the exposition text for `GET /metrics`.
pub fn setup_metrics() -> Result<PrometheusHandle> {
    // 1ms .. 10s
    let latency_buckets = &[
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(HTTP_REQUEST_DURATION_SECONDS.to_string()),
            latency_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full(DB_QUERY_DURATION_SECONDS.to_string()),
            latency_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full(CACHE_OPERATION_DURATION_SECONDS.to_string()),
            latency_buckets,
        )?
        .install_recorder()?;

    describe_counter!(HTTP_REQUESTS_TOTAL, "Total number of HTTP requests received");
    describe_histogram!(HTTP_REQUEST_DURATION_SECONDS, "HTTP request latency in seconds");
    describe_counter!(ORDERS_CREATED_TOTAL, "Orders placed successfully");
    describe_counter!(CHECKOUT_REJECTIONS_TOTAL, "Checkouts refused, by reason");
    describe_counter!(PAYMENTS_TOTAL, "Payment confirmations, by outcome");
    describe_counter!(REVIEWS_ADDED_TOTAL, "Product reviews stored");
    describe_gauge!(PRODUCT_STOCK_LEVEL, "Stock left per SKU after the last checkout");
    describe_counter!(RATE_LIMITED_TOTAL, "Requests refused by the rate limiter");
    describe_counter!(CHAT_MESSAGES_TOTAL, "Support chat messages published");
    describe_histogram!(DB_QUERY_DURATION_SECONDS, "Database query latency in seconds");
    describe_histogram!(
        CACHE_OPERATION_DURATION_SECONDS,
        "Redis operation latency in seconds"
    );
    describe_counter!(CACHE_LOOKUPS_TOTAL, "Product cache lookups, by result");

    Ok(handle)
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Record one HTTP request and its latency
pub fn record_http_request(method: &str, endpoint: &str, status: u16, duration_secs: f64) {
    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string()
    )
    .record(duration_secs);
}

pub fn record_order_created() {
    counter!(ORDERS_CREATED_TOTAL).increment(1);
}

pub fn record_checkout_rejection(reason: &'static str) {
    counter!(CHECKOUT_REJECTIONS_TOTAL, "reason" => reason).increment(1);
}

pub fn record_payment(outcome: &'static str) {
    counter!(PAYMENTS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_review_added() {
    counter!(REVIEWS_ADDED_TOTAL).increment(1);
}

pub fn set_stock_level(sku: &str, level: i32) {
    gauge!(PRODUCT_STOCK_LEVEL, "sku" => sku.to_string()).set(f64::from(level));
}

pub fn record_rate_limited(scope: &'static str) {
    counter!(RATE_LIMITED_TOTAL, "scope" => scope).increment(1);
}

pub fn record_chat_message(kind: &'static str) {
    counter!(CHAT_MESSAGES_TOTAL, "kind" => kind).increment(1);
}

pub fn record_db_query(operation: &'static str, duration_secs: f64) {
    histogram!(DB_QUERY_DURATION_SECONDS, "operation" => operation).record(duration_secs);
}

pub fn record_cache_operation(operation: &'static str, duration_secs: f64) {
    histogram!(CACHE_OPERATION_DURATION_SECONDS, "operation" => operation).record(duration_secs);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!(CACHE_LOOKUPS_TOTAL, "result" => result).increment(1);
}
