//! `/api/products`: the public catalogue and reviews.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use uuid::Uuid;

use super::{invalidate_product, CreatedResult, JsonResult};
use crate::auth::AuthUser;
use crate::cache::{self, PRODUCT_TTL_SECS};
use crate::error::{AppError, AppResult};
use crate::extract::{AppPath, AppQuery, ValidatedJson};
use crate::metrics;
use crate::models::{
    views, ApiResponse, CatalogFilters, NewReview, PageParams, Pagination, ProductDetail,
    ProductQuery, ProductView, Review, ReviewRejection, ReviewRequest, SearchSuggestion,
    SuggestionParams,
};
use crate::AppState;

const DEFAULT_PAGE_SIZE: u32 = 12;
const FEATURED_LIMIT: i64 = 8;
const SUGGESTION_LIMIT: i64 = 5;
const SUGGESTION_MIN_CHARS: usize = 2;
const RELATED_LIMIT: i64 = 4;

#[derive(Debug, Serialize)]
pub struct ProductListPayload {
    pub products: Vec<ProductView>,
    pub pagination: Pagination,
    pub filters: CatalogFilters,
}

#[derive(Debug, Serialize)]
pub struct ProductsPayload {
    pub products: Vec<ProductView>,
}

#[derive(Debug, Serialize)]
pub struct SuggestionsPayload {
    pub suggestions: Vec<SearchSuggestion>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPagePayload {
    pub product: ProductDetail,
    pub related_products: Vec<ProductView>,
}

#[derive(Debug, Serialize)]
pub struct ReviewPayload {
    pub review: Review,
}

/// GET /api/products
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<ProductQuery>,
) -> JsonResult<ProductListPayload> {
    let (page, limit) = PageParams {
        page: query.page,
        limit: query.limit,
    }
    .resolve(DEFAULT_PAGE_SIZE);

    let (products, total) = state.store.list_products(&query, page, limit).await?;
    let filters = state.store.catalog_filters().await?;

    Ok(Json(ApiResponse::ok(ProductListPayload {
        products: views(products),
        pagination: Pagination::new(page, limit, total),
        filters,
    })))
}

/// GET /api/products/featured
pub async fn featured_products(State(state): State<Arc<AppState>>) -> JsonResult<ProductsPayload> {
    let products = state.store.featured_products(FEATURED_LIMIT).await?;
    Ok(Json(ApiResponse::ok(ProductsPayload {
        products: views(products),
    })))
}

/// GET /api/products/search-suggestions?q=
pub async fn search_suggestions(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<SuggestionParams>,
) -> JsonResult<SuggestionsPayload> {
    let term = params.q.as_deref().map(str::trim).unwrap_or_default();
    let suggestions = if term.chars().count() < SUGGESTION_MIN_CHARS {
        Vec::new()
    } else {
        state.store.search_suggestions(term, SUGGESTION_LIMIT).await?
    };

    Ok(Json(ApiResponse::ok(SuggestionsPayload { suggestions })))
}

/// GET /api/products/:id
///
/// Cache-aside: the whole payload is cached for five minutes.
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<Uuid>,
) -> JsonResult<serde_json::Value> {
    let key = cache::product_key(id);
    if let Some(cache) = &state.cache {
        if let Some(cached) = cache.get_json::<serde_json::Value>(&key).await {
            return Ok(Json(ApiResponse::ok(cached)));
        }
    }

    let payload = product_page(&state, id).await?;
    let payload = serde_json::to_value(payload)
        .map_err(|err| AppError::Internal(format!("product page did not serialize: {err}")))?;

    if let Some(cache) = &state.cache {
        cache.set_json(&key, &payload, PRODUCT_TTL_SECS).await;
    }
    Ok(Json(ApiResponse::ok(payload)))
}

async fn product_page(state: &AppState, id: Uuid) -> AppResult<ProductPagePayload> {
    let product = state
        .store
        .find_product(id)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;

    let reviews = state.store.product_reviews(id).await?;
    let related = state.store.related_products(&product, RELATED_LIMIT).await?;

    Ok(ProductPagePayload {
        product: ProductDetail {
            product: ProductView::from(product),
            reviews,
        },
        related_products: views(related),
    })
}

/// POST /api/products/:id/reviews
pub async fn add_review(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppPath(id): AppPath<Uuid>,
    ValidatedJson(body): ValidatedJson<ReviewRequest>,
) -> CreatedResult<ReviewPayload> {
    let review = NewReview {
        user_id: user.id,
        user_name: user.full_name(),
        rating: body.rating,
        comment: body.comment.trim().to_string(),
    };

    let review = match state.store.add_review(id, review).await? {
        Ok(review) => review,
        Err(ReviewRejection::ProductNotFound) => {
            return Err(AppError::not_found("Product not found"))
        }
        Err(ReviewRejection::AlreadyReviewed) => {
            return Err(AppError::bad_request("You have already reviewed this product"))
        }
    };

    metrics::record_review_added();
    invalidate_product(&state, id).await;
    tracing::info!(product_id = %id, user_id = %user.id, rating = review.rating, "Review added");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Review added successfully",
            ReviewPayload { review },
        )),
    ))
}
