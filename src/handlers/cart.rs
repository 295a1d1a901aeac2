//! `/api/cart`: the caller's cart. Every mutation answers with the full cart.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use uuid::Uuid;

use super::JsonResult;
use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::extract::{AppJson, AppPath};
use crate::models::{ApiResponse, CartAddRequest, CartLine, CartUpdateRequest};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CartPayload {
    pub cart: Vec<CartLine>,
}

async fn cart_payload(state: &AppState, user_id: Uuid) -> AppResult<CartPayload> {
    Ok(CartPayload {
        cart: state.store.cart(user_id).await?,
    })
}

/// GET /api/cart
pub async fn get_cart(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> JsonResult<CartPayload> {
    Ok(Json(ApiResponse::ok(cart_payload(&state, user.id).await?)))
}

/// POST /api/cart/add
///
/// Merges into an existing line; the merged quantity must fit the stock.
pub async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppJson(body): AppJson<CartAddRequest>,
) -> JsonResult<CartPayload> {
    if body.quantity < 1 {
        return Err(AppError::bad_request("Quantity must be at least 1"));
    }

    let product = state
        .store
        .find_product(body.product_id)
        .await?
        .filter(|product| product.is_active)
        .ok_or_else(|| AppError::not_found("Product not found or inactive"))?;

    if body.quantity > product.stock {
        return Err(AppError::bad_request(format!(
            "Only {} items available in stock",
            product.stock
        )));
    }

    let quantity = match state.store.cart_quantity(user.id, product.id).await? {
        Some(existing) => match existing.checked_add(body.quantity) {
            Some(merged) if merged <= product.stock => merged,
            _ => {
                return Err(AppError::bad_request(format!(
                    "Cannot add more items. Only {} available in stock",
                    product.stock
                )));
            }
        },
        None => body.quantity,
    };

    state
        .store
        .set_cart_quantity(user.id, product.id, quantity)
        .await?;
    tracing::debug!(user_id = %user.id, product_id = %product.id, quantity, "Cart line set");

    Ok(Json(ApiResponse::with_message(
        "Item added to cart successfully",
        cart_payload(&state, user.id).await?,
    )))
}

/// PUT /api/cart/update
pub async fn update_cart_item(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppJson(body): AppJson<CartUpdateRequest>,
) -> JsonResult<CartPayload> {
    if body.quantity < 1 {
        return Err(AppError::bad_request(
            "Valid product ID and quantity are required",
        ));
    }

    let product = state
        .store
        .find_product(body.product_id)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;

    if body.quantity > product.stock {
        return Err(AppError::bad_request(format!(
            "Only {} items available in stock",
            product.stock
        )));
    }

    if state
        .store
        .cart_quantity(user.id, product.id)
        .await?
        .is_none()
    {
        return Err(AppError::not_found("Item not found in cart"));
    }

    state
        .store
        .set_cart_quantity(user.id, product.id, body.quantity)
        .await?;

    Ok(Json(ApiResponse::with_message(
        "Cart updated successfully",
        cart_payload(&state, user.id).await?,
    )))
}

/// DELETE /api/cart/remove/:productId
pub async fn remove_cart_item(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppPath(product_id): AppPath<Uuid>,
) -> JsonResult<CartPayload> {
    if !state.store.remove_cart_item(user.id, product_id).await? {
        return Err(AppError::not_found("Item not found in cart"));
    }

    Ok(Json(ApiResponse::with_message(
        "Item removed from cart successfully",
        cart_payload(&state, user.id).await?,
    )))
}

/// DELETE /api/cart/clear
pub async fn clear_cart(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> JsonResult<CartPayload> {
    state.store.clear_cart(user.id).await?;

    Ok(Json(ApiResponse::with_message(
        "Cart cleared successfully",
        CartPayload { cart: Vec::new() },
    )))
}
