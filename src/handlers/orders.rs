// =============================================================================
// ORDER HANDLERS
// =============================================================================
// Checkout, order history and card payment.
//
// CHECKOUT FLOW:
// 1. Validate the request body (addresses, payment method)
// 2. Hand an `OrderDraft` to the store, which checks every line against
//    locked product rows and writes order, stock and cart in one go
// 3. Record metrics and drop cached product pages
//
// PAYMENT FLOW:
// 1. Owner and not-yet-paid checks
// 2. Charge the total through the `PaymentGateway`
// 3. Settle with a conditional write so a racing confirmation cannot pay
//    the same order twice
// =============================================================================

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::{invalidate_product, CreatedResult, JsonResult};
use crate::auth::AuthUser;
use crate::checkout::{self, OrderDraft};
use crate::error::AppError;
use crate::extract::{AppJson, AppPath, AppQuery, ValidatedJson};
use crate::metrics;
use crate::models::{
    ApiResponse, ClearHistoryResponse, CreateOrderRequest, Order, PageParams,
    Pagination, PaymentRequest, PaymentResult,
};
use crate::payments::{amount_in_cents, ChargeRequest};
use crate::AppState;

const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Serialize)]
pub struct OrderPayload {
    pub order: Order,
}

#[derive(Debug, Serialize)]
pub struct OrderListPayload {
    pub orders: Vec<Order>,
    pub pagination: Pagination,
}

/// POST /api/orders
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidatedJson(body): ValidatedJson<CreateOrderRequest>,
) -> CreatedResult<OrderPayload> {
    let draft = OrderDraft {
        user_id: user.id,
        lines: body.order_items,
        shipping_address: body.shipping_address,
        billing_address: body.billing_address,
        payment_method: body.payment_method,
        coupon_code: body.coupon_code,
        pricing: state.pricing(),
    };

    let order = match state.store.place_order(draft).await? {
        Ok(order) => order,
        Err(rejection) => {
            metrics::record_checkout_rejection(rejection.reason());
            tracing::info!(user_id = %user.id, ?rejection, "Checkout rejected");
            return Err(rejection.into());
        }
    };

    metrics::record_order_created();
    for product_id in checkout::stock_deltas(&order).keys() {
        invalidate_product(&state, *product_id).await;
    }
    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        user_id = %user.id,
        total = %order.total_price,
        "Order created"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Order created successfully",
            OrderPayload { order },
        )),
    ))
}

/// GET /api/orders/my-orders
pub async fn my_orders(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppQuery(params): AppQuery<PageParams>,
) -> JsonResult<OrderListPayload> {
    let (page, limit) = params.resolve(DEFAULT_PAGE_SIZE);
    let (orders, total) = state.store.orders_for_user(user.id, page, limit).await?;

    Ok(Json(ApiResponse::ok(OrderListPayload {
        orders,
        pagination: Pagination::new(page, limit, total),
    })))
}

/// GET /api/orders/:id
///
/// Visible to its owner and to admins.
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> JsonResult<OrderPayload> {
    let order = state
        .store
        .find_order(id)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))?;

    if order.user_id != user.id && !user.is_admin() {
        return Err(AppError::Forbidden("Not authorized".into()));
    }

    Ok(Json(ApiResponse::ok(OrderPayload { order })))
}

/// POST /api/orders/payment
pub async fn process_payment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppJson(body): AppJson<PaymentRequest>,
) -> JsonResult<OrderPayload> {
    let order = state
        .store
        .find_order(body.order_id)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))?;

    if order.user_id != user.id {
        return Err(AppError::Forbidden("Not authorized".into()));
    }
    if order.is_paid {
        return Err(AppError::bad_request("Order already paid"));
    }

    let gateway = state.payments.as_ref().ok_or(AppError::PaymentsDisabled)?;
    let intent = gateway
        .charge(ChargeRequest {
            amount_cents: amount_in_cents(order.total_price),
            idempotency_key: ChargeRequest::idempotency_key_for(order.id, &body.payment_method_id),
            payment_method_id: body.payment_method_id,
            return_url: format!("{}/order/{}", state.config.frontend_url, order.id),
        })
        .await?;

    if !intent.succeeded() {
        metrics::record_payment("failed");
        tracing::info!(order_id = %order.id, status = %intent.status, "Payment not completed");
        return Err(AppError::bad_request("Payment failed"));
    }

    let result = PaymentResult {
        id: intent.id.clone(),
        status: intent.status,
        update_time: Utc::now(),
        email_address: user.email.clone(),
    };

    let Some(order) = state.store.record_payment(order.id, result).await? else {
        // A concurrent confirmation settled the order first. The shared
        // idempotency key means the processor charged only once.
        metrics::record_payment("already_paid");
        tracing::warn!(
            order_id = %order.id,
            intent_id = %intent.id,
            "Payment confirmed for an order that is already paid"
        );
        return Err(AppError::bad_request("Order already paid"));
    };

    metrics::record_payment("succeeded");
    tracing::info!(order_id = %order.id, total = %order.total_price, "Payment recorded");

    Ok(Json(ApiResponse::with_message(
        "Payment successful",
        OrderPayload { order },
    )))
}

/// DELETE /api/orders/clear-history
pub async fn clear_history(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> JsonResult<ClearHistoryResponse> {
    let deleted_count = state.store.clear_order_history(user.id).await?;
    tracing::info!(user_id = %user.id, deleted_count, "Order history cleared");

    Ok(Json(ApiResponse::with_message(
        "Order history cleared successfully",
        ClearHistoryResponse { deleted_count },
    )))
}

#[cfg(test)]
mod tests {
    use crate::db::Store;
    use crate::models::Product;
    use crate::payments::tests::FakeGateway;
    use crate::test_support::TestApp;
    use std::time::Duration;
    use axum::http::StatusCode;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};

    fn order_body(lines: &[(&Product, i32)]) -> Value {
        let items: Vec<Value> = lines
            .iter()
            .map(|(product, quantity)| {
                json!({
                    "product": product.id,
                    "name": product.name,
                    "quantity": quantity,
                    "price": product.price,
                })
            })
            .collect();

        json!({
            "orderItems": items,
            "shippingAddress": {
                "street": "1 Analytical Way",
                "city": "London",
                "zipCode": "N1",
                "country": "UK"
            },
            "paymentMethod": "card",
            "totalPrice": 0.01
        })
    }

    #[tokio::test]
    async fn test_insufficient_stock_persists_nothing() {
        let app = TestApp::new();
        let product = app.product("Mouse", "MS-1", dec!(10.00), 1).await;
        let (user, token) = app.user("shopper@example.com").await;
        app.post(
            "/api/cart/add",
            Some(&token),
            json!({ "productId": product.id, "quantity": 1 }),
        )
        .await;

        let (status, body) = app
            .post("/api/orders", Some(&token), order_body(&[(&product, 2)]))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Insufficient stock for Mouse");

        let stored = app.store.find_product(product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock, 1);
        assert_eq!(stored.sales_count, 0);
        assert_eq!(app.store.orders_for_user(user.id, 1, 10).await.unwrap().1, 0);
        assert_eq!(
            app.store.cart_quantity(user.id, product.id).await.unwrap(),
            Some(1)
        );
    }

    #[tokio::test]
    async fn test_checkout_moves_stock_and_empties_cart() {
        let app = TestApp::new();
        let mouse = app.product("Mouse", "MS-1", dec!(10.00), 5).await;
        let pad = app.product("Mouse Pad", "MP-1", dec!(5.50), 4).await;
        let (user, token) = app.user("shopper@example.com").await;
        app.post(
            "/api/cart/add",
            Some(&token),
            json!({ "productId": mouse.id, "quantity": 2 }),
        )
        .await;

        let (status, body) = app
            .post(
                "/api/orders",
                Some(&token),
                order_body(&[(&mouse, 2), (&pad, 1), (&mouse, 1)]),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let order = &body["data"]["order"];
        assert_eq!(order["status"], "pending");
        assert_eq!(order["isPaid"], false);
        // 35.50 items + 2.84 tax + 10 shipping; the client total is ignored
        assert_eq!(order["totalPrice"], 48.34);

        let mouse_after = app.store.find_product(mouse.id).await.unwrap().unwrap();
        assert_eq!(mouse_after.stock, 2);
        assert_eq!(mouse_after.sales_count, 3);
        let pad_after = app.store.find_product(pad.id).await.unwrap().unwrap();
        assert_eq!(pad_after.stock, 3);
        assert_eq!(pad_after.sales_count, 1);

        assert!(app.store.cart(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_price_change_and_empty_order_are_rejected() {
        let app = TestApp::new();
        let mut mouse = app.product("Mouse", "MS-1", dec!(10.00), 5).await;
        let (_, token) = app.user("shopper@example.com").await;

        let (status, body) = app.post("/api/orders", Some(&token), order_body(&[])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No order items provided");

        mouse.price = dec!(9.00);
        let (status, body) = app
            .post("/api/orders", Some(&token), order_body(&[(&mouse, 1)]))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Price has changed for Mouse");
    }

    #[tokio::test]
    async fn test_order_visibility() {
        let app = TestApp::new();
        let mouse = app.product("Mouse", "MS-1", dec!(10.00), 5).await;
        let (_, owner) = app.user("owner@example.com").await;
        let (_, stranger) = app.user("stranger@example.com").await;
        let (_, admin) = app.admin("admin@example.com").await;

        let (_, body) = app
            .post("/api/orders", Some(&owner), order_body(&[(&mouse, 1)]))
            .await;
        let uri = format!("/api/orders/{}", body["data"]["order"]["id"].as_str().unwrap());

        assert_eq!(app.get(&uri, Some(&owner)).await.0, StatusCode::OK);
        assert_eq!(app.get(&uri, Some(&admin)).await.0, StatusCode::OK);
        let (status, body) = app.get(&uri, Some(&stranger)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Not authorized");
    }

    #[tokio::test]
    async fn test_payment_settles_once() {
        let app = TestApp::new();
        let mouse = app.product("Mouse", "MS-1", dec!(10.00), 5).await;
        let (_, token) = app.user("shopper@example.com").await;
        let (_, body) = app
            .post("/api/orders", Some(&token), order_body(&[(&mouse, 1)]))
            .await;
        let order_id = body["data"]["order"]["id"].clone();
        let payment = json!({ "orderId": order_id, "paymentMethodId": "pm_card_visa" });

        let (status, body) = app
            .post("/api/orders/payment", Some(&token), payment.clone())
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["order"]["isPaid"], true);
        assert_eq!(body["data"]["order"]["status"], "processing");
        assert_eq!(body["data"]["order"]["paymentResult"]["id"], "pi_test_123");

        let charges = app.gateway.charges.lock().await;
        assert_eq!(charges.len(), 1);
        // 10.00 + 0.80 tax + 10.00 shipping
        assert_eq!(charges[0].amount_cents, 2080);
        drop(charges);

        let (status, body) = app.post("/api/orders/payment", Some(&token), payment).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Order already paid");
    }

    #[tokio::test]
    async fn test_concurrent_confirmations_charge_once() {
        let app = TestApp::with_gateway(FakeGateway::slow("succeeded", Duration::from_millis(50)));
        let mouse = app.product("Mouse", "MS-1", dec!(10.00), 5).await;
        let (_, token) = app.user("shopper@example.com").await;
        let (_, body) = app
            .post("/api/orders", Some(&token), order_body(&[(&mouse, 1)]))
            .await;
        let payment = json!({
            "orderId": body["data"]["order"]["id"],
            "paymentMethodId": "pm_card_visa"
        });

        let (first, second) = tokio::join!(
            app.post("/api/orders/payment", Some(&token), payment.clone()),
            app.post("/api/orders/payment", Some(&token), payment.clone()),
        );
        let mut statuses = [first.0, second.0];
        statuses.sort();
        assert_eq!(statuses, [StatusCode::OK, StatusCode::BAD_REQUEST]);

        let charges = app.gateway.charges.lock().await;
        assert_eq!(charges.len(), 1);
    }

    #[tokio::test]
    async fn test_declined_payment_leaves_order_unpaid() {
        let app = TestApp::with_payment_status("requires_payment_method");
        let mouse = app.product("Mouse", "MS-1", dec!(10.00), 5).await;
        let (_, token) = app.user("shopper@example.com").await;
        let (_, body) = app
            .post("/api/orders", Some(&token), order_body(&[(&mouse, 1)]))
            .await;
        let order_id = body["data"]["order"]["id"].clone();

        let (status, body) = app
            .post(
                "/api/orders/payment",
                Some(&token),
                json!({ "orderId": order_id, "paymentMethodId": "pm_card_declined" }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Payment failed");

        let (_, body) = app
            .get(&format!("/api/orders/{}", order_id.as_str().unwrap()), Some(&token))
            .await;
        assert_eq!(body["data"]["order"]["isPaid"], false);
    }

    #[tokio::test]
    async fn test_clear_history_only_touches_requester() {
        let app = TestApp::new();
        let mouse = app.product("Mouse", "MS-1", dec!(10.00), 10).await;
        let (_, alice) = app.user("alice@example.com").await;
        let (bob_user, bob) = app.user("bob@example.com").await;

        app.post("/api/orders", Some(&alice), order_body(&[(&mouse, 1)]))
            .await;
        app.post("/api/orders", Some(&alice), order_body(&[(&mouse, 1)]))
            .await;
        app.post("/api/orders", Some(&bob), order_body(&[(&mouse, 1)]))
            .await;

        let (status, body) = app.delete("/api/orders/clear-history", Some(&alice)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["deletedCount"], 2);

        let (_, body) = app.get("/api/orders/my-orders", Some(&alice)).await;
        assert_eq!(body["data"]["orders"], json!([]));
        assert_eq!(
            app.store.orders_for_user(bob_user.id, 1, 10).await.unwrap().1,
            1
        );
    }
}
