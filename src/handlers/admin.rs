// =============================================================================
// ADMIN HANDLERS
// =============================================================================
// Back-office endpoints under /api/admin. Every handler takes `AdminUser`,
// so a missing token answers 401 and a non-admin token 403.
//
// - dashboard
// - products:   list, create, read, update, delete
// - orders:     list, read, status, payment override
// - users:      list, role change
// - categories: list, create, update, delete
// - coupons:    list, create, update, delete
// =============================================================================

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use uuid::Uuid;

use super::{attach_customers, invalidate_product, CreatedResult, JsonResult};
use crate::auth::AdminUser;
use crate::error::{AppError, AppResult};
use crate::extract::{AppJson, AppPath, AppQuery, ValidatedJson};
use crate::metrics;
use crate::models::{
    views, AdminOrderQuery, AdminProductQuery, ApiResponse, Category, CategoryInput, Coupon,
    CouponInput, CouponView, DashboardStats, Order, OrderView, PageParams, Pagination,
    PaymentOverrideRequest, Product, ProductInput, ProductUpdate, ProductView, RoleUpdateRequest,
    StatusUpdateRequest, User, UserPayload, UserQuery,
};
use crate::AppState;

const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Serialize)]
pub struct ProductPayload {
    pub product: ProductView,
}

#[derive(Debug, Serialize)]
pub struct ProductPagePayload {
    pub products: Vec<ProductView>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct OrderPayload {
    pub order: OrderView,
}

#[derive(Debug, Serialize)]
pub struct OrderPagePayload {
    pub orders: Vec<OrderView>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct UserPagePayload {
    pub users: Vec<User>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct CategoryPayload {
    pub category: Category,
}

#[derive(Debug, Serialize)]
pub struct CategoriesPayload {
    pub categories: Vec<Category>,
}

#[derive(Debug, Serialize)]
pub struct CouponPayload {
    pub coupon: CouponView,
}

#[derive(Debug, Serialize)]
pub struct CouponsPayload {
    pub coupons: Vec<CouponView>,
}

// =============================================================================
// DASHBOARD
// =============================================================================

/// GET /api/admin/dashboard
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> JsonResult<DashboardStats> {
    let data = state.store.dashboard().await?;
    let recent_orders = attach_customers(&state, data.recent_orders).await?;

    for product in &data.low_stock {
        metrics::set_stock_level(&product.sku, product.stock);
    }

    Ok(Json(ApiResponse::ok(DashboardStats {
        stats: data.counts,
        recent_orders,
        low_stock_products: views(data.low_stock),
        top_products: data.top_products,
    })))
}

// =============================================================================
// PRODUCTS
// =============================================================================

/// GET /api/admin/products
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    AppQuery(query): AppQuery<AdminProductQuery>,
) -> JsonResult<ProductPagePayload> {
    let (page, limit) = PageParams {
        page: query.page,
        limit: query.limit,
    }
    .resolve(DEFAULT_PAGE_SIZE);
    let (products, total) = state.store.admin_list_products(&query, page, limit).await?;

    Ok(Json(ApiResponse::ok(ProductPagePayload {
        products: views(products),
        pagination: Pagination::new(page, limit, total),
    })))
}

/// POST /api/admin/products
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ValidatedJson(body): ValidatedJson<ProductInput>,
) -> CreatedResult<ProductPayload> {
    let product = state
        .store
        .create_product(Product::from_input(body, Some(admin.id)))
        .await?;

    metrics::set_stock_level(&product.sku, product.stock);
    tracing::info!(product_id = %product.id, sku = %product.sku, admin_id = %admin.id, "Product created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Product created successfully",
            ProductPayload {
                product: ProductView::from(product),
            },
        )),
    ))
}

/// GET /api/admin/products/:id
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> JsonResult<ProductPayload> {
    let product = state
        .store
        .find_product(id)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;

    Ok(Json(ApiResponse::ok(ProductPayload {
        product: ProductView::from(product),
    })))
}

/// PUT /api/admin/products/:id
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
    ValidatedJson(body): ValidatedJson<ProductUpdate>,
) -> JsonResult<ProductPayload> {
    let mut product = state
        .store
        .find_product(id)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;

    product.apply_update(body);
    let product = state.store.save_product(product).await?;

    invalidate_product(&state, id).await;
    metrics::set_stock_level(&product.sku, product.stock);
    tracing::info!(product_id = %id, admin_id = %admin.id, "Product updated");

    Ok(Json(ApiResponse::with_message(
        "Product updated successfully",
        ProductPayload {
            product: ProductView::from(product),
        },
    )))
}

/// DELETE /api/admin/products/:id
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> JsonResult<()> {
    if !state.store.delete_product(id).await? {
        return Err(AppError::not_found("Product not found"));
    }

    invalidate_product(&state, id).await;
    tracing::info!(product_id = %id, admin_id = %admin.id, "Product deleted");

    Ok(Json(ApiResponse::message("Product deleted successfully")))
}

// =============================================================================
// ORDERS
// =============================================================================

/// GET /api/admin/orders
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    AppQuery(query): AppQuery<AdminOrderQuery>,
) -> JsonResult<OrderPagePayload> {
    let (page, limit) = PageParams {
        page: query.page,
        limit: query.limit,
    }
    .resolve(DEFAULT_PAGE_SIZE);
    let (orders, total) = state.store.admin_list_orders(&query, page, limit).await?;

    Ok(Json(ApiResponse::ok(OrderPagePayload {
        orders: attach_customers(&state, orders).await?,
        pagination: Pagination::new(page, limit, total),
    })))
}

async fn order_view(state: &AppState, order: Order) -> AppResult<OrderView> {
    attach_customers(state, vec![order])
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal("order view went missing".into()))
}

/// GET /api/admin/orders/:id
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> JsonResult<OrderPayload> {
    let order = state
        .store
        .find_order(id)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))?;

    Ok(Json(ApiResponse::ok(OrderPayload {
        order: order_view(&state, order).await?,
    })))
}

/// PUT /api/admin/orders/:id/status
pub async fn update_order_status(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<StatusUpdateRequest>,
) -> JsonResult<OrderPayload> {
    let order = state
        .store
        .set_order_status(id, body.status)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))?;

    tracing::info!(order_id = %id, status = %body.status, admin_id = %admin.id, "Order status updated");

    Ok(Json(ApiResponse::with_message(
        "Order status updated successfully",
        OrderPayload {
            order: order_view(&state, order).await?,
        },
    )))
}

/// PUT /api/admin/orders/:id/payment
///
/// Plain override; no processor is involved.
pub async fn update_order_payment(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<PaymentOverrideRequest>,
) -> JsonResult<OrderPayload> {
    let order = state
        .store
        .set_order_paid(id, body.is_paid)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))?;

    tracing::info!(order_id = %id, is_paid = body.is_paid, admin_id = %admin.id, "Payment status overridden");

    Ok(Json(ApiResponse::with_message(
        "Payment status updated successfully",
        OrderPayload {
            order: order_view(&state, order).await?,
        },
    )))
}

// =============================================================================
// USERS
// =============================================================================

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    AppQuery(query): AppQuery<UserQuery>,
) -> JsonResult<UserPagePayload> {
    let (page, limit) = PageParams {
        page: query.page,
        limit: query.limit,
    }
    .resolve(DEFAULT_PAGE_SIZE);
    let (users, total) = state.store.list_users(&query, page, limit).await?;

    Ok(Json(ApiResponse::ok(UserPagePayload {
        users,
        pagination: Pagination::new(page, limit, total),
    })))
}

/// PUT /api/admin/users/:id/role
pub async fn update_user_role(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<RoleUpdateRequest>,
) -> JsonResult<UserPayload> {
    let user = state
        .store
        .set_user_role(id, body.role)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    tracing::info!(user_id = %id, role = %body.role, admin_id = %admin.id, "User role updated");

    Ok(Json(ApiResponse::with_message(
        "User role updated successfully",
        UserPayload { user },
    )))
}

// =============================================================================
// CATEGORIES
// =============================================================================

/// GET /api/admin/categories
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> JsonResult<CategoriesPayload> {
    let categories = state.store.list_categories().await?;
    Ok(Json(ApiResponse::ok(CategoriesPayload { categories })))
}

/// POST /api/admin/categories
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ValidatedJson(body): ValidatedJson<CategoryInput>,
) -> CreatedResult<CategoryPayload> {
    let category = state
        .store
        .create_category(Category::from_input(body))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Category created successfully",
            CategoryPayload { category },
        )),
    ))
}

/// PUT /api/admin/categories/:id
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
    ValidatedJson(body): ValidatedJson<CategoryInput>,
) -> JsonResult<CategoryPayload> {
    let mut category = state
        .store
        .find_category(id)
        .await?
        .ok_or_else(|| AppError::not_found("Category not found"))?;

    category.apply(body);
    let category = state.store.save_category(category).await?;

    Ok(Json(ApiResponse::with_message(
        "Category updated successfully",
        CategoryPayload { category },
    )))
}

/// DELETE /api/admin/categories/:id
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> JsonResult<()> {
    if !state.store.delete_category(id).await? {
        return Err(AppError::not_found("Category not found"));
    }
    Ok(Json(ApiResponse::message("Category deleted successfully")))
}

// =============================================================================
// COUPONS
// =============================================================================

/// GET /api/admin/coupons
pub async fn list_coupons(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> JsonResult<CouponsPayload> {
    let coupons = state.store.list_coupons().await?;
    Ok(Json(ApiResponse::ok(CouponsPayload {
        coupons: coupons.into_iter().map(CouponView::from).collect(),
    })))
}

/// POST /api/admin/coupons
pub async fn create_coupon(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ValidatedJson(body): ValidatedJson<CouponInput>,
) -> CreatedResult<CouponPayload> {
    let coupon = state
        .store
        .create_coupon(Coupon::from_input(body, Some(admin.id)))
        .await?;
    tracing::info!(coupon_id = %coupon.id, code = %coupon.code, "Coupon created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Coupon created successfully",
            CouponPayload {
                coupon: CouponView::from(coupon),
            },
        )),
    ))
}

/// PUT /api/admin/coupons/:id
pub async fn update_coupon(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
    ValidatedJson(body): ValidatedJson<CouponInput>,
) -> JsonResult<CouponPayload> {
    let mut coupon = state
        .store
        .find_coupon(id)
        .await?
        .ok_or_else(|| AppError::not_found("Coupon not found"))?;

    coupon.apply(body);
    let coupon = state.store.save_coupon(coupon).await?;

    Ok(Json(ApiResponse::with_message(
        "Coupon updated successfully",
        CouponPayload {
            coupon: CouponView::from(coupon),
        },
    )))
}

/// DELETE /api/admin/coupons/:id
pub async fn delete_coupon(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> JsonResult<()> {
    if !state.store.delete_coupon(id).await? {
        return Err(AppError::not_found("Coupon not found"));
    }
    Ok(Json(ApiResponse::message("Coupon deleted successfully")))
}
