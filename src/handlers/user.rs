//! `/api/user`: wishlist and product comparison.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use uuid::Uuid;

use super::JsonResult;
use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::extract::{AppJson, AppPath};
use crate::models::{views, ApiResponse, CompareRequest, ProductView, WishlistRequest};
use crate::AppState;

/// Most products a comparison may hold
const MAX_COMPARE: usize = 4;

#[derive(Debug, Serialize)]
pub struct WishlistPayload {
    pub wishlist: Vec<ProductView>,
}

#[derive(Debug, Serialize)]
pub struct ComparePayload {
    pub products: Vec<ProductView>,
}

async fn wishlist_payload(state: &AppState, user_id: Uuid) -> AppResult<WishlistPayload> {
    Ok(WishlistPayload {
        wishlist: views(state.store.wishlist(user_id).await?),
    })
}

/// GET /api/user/wishlist
pub async fn get_wishlist(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> JsonResult<WishlistPayload> {
    Ok(Json(ApiResponse::ok(wishlist_payload(&state, user.id).await?)))
}

/// POST /api/user/wishlist/add
pub async fn add_to_wishlist(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppJson(body): AppJson<WishlistRequest>,
) -> JsonResult<WishlistPayload> {
    state
        .store
        .find_product(body.product_id)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;

    if !state.store.add_to_wishlist(user.id, body.product_id).await? {
        return Err(AppError::bad_request("Product already in wishlist"));
    }

    Ok(Json(ApiResponse::with_message(
        "Product added to wishlist",
        wishlist_payload(&state, user.id).await?,
    )))
}

/// DELETE /api/user/wishlist/remove/:productId
pub async fn remove_from_wishlist(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppPath(product_id): AppPath<Uuid>,
) -> JsonResult<WishlistPayload> {
    state.store.remove_from_wishlist(user.id, product_id).await?;

    Ok(Json(ApiResponse::with_message(
        "Product removed from wishlist",
        wishlist_payload(&state, user.id).await?,
    )))
}

/// POST /api/user/compare
pub async fn compare_products(
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<CompareRequest>,
) -> JsonResult<ComparePayload> {
    if body.product_ids.is_empty() {
        return Err(AppError::bad_request("Product IDs are required"));
    }
    if body.product_ids.len() > MAX_COMPARE {
        return Err(AppError::bad_request("Cannot compare more than 4 products"));
    }

    let products = state.store.products_by_ids(&body.product_ids).await?;
    Ok(Json(ApiResponse::ok(ComparePayload {
        products: views(products),
    })))
}
