// =============================================================================
// DATABASE MODULE
// =============================================================================
// Storage seam for the service.
//
// Handlers talk to `dyn Store`; the production backend is `PgStore`
// (PostgreSQL through sqlx) and tests run against `MemoryStore`. Both
// backends must honour the same contract:
//
// - `place_order` is all-or-nothing: order insert, stock decrement,
//   sales-count increment and cart clear happen together or not at all
// - `add_review` refuses a second review from the same user
// - `record_payment` only succeeds once per order
// - unique-key clashes (email, sku, slug, coupon code, category name) come
//   back as `AppError::BadRequest`
// =============================================================================

pub mod postgres;
pub mod seed;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::checkout::{CheckoutRejection, OrderDraft};
use crate::error::AppResult;
use crate::models::{
    AdminOrderQuery, AdminProductQuery, CartLine, CatalogFilters, Category, Coupon,
    DashboardCounts, NewReview, NewUser, Order, OrderStatus, PaymentResult, Product,
    ProductQuery, Review, ReviewRejection, Role, SearchSuggestion, TopProduct,
    UpdateProfileRequest, User, UserQuery,
};

pub use postgres::PgStore;

/// Raw dashboard data; customers are attached by the handler
#[derive(Debug, Clone, Default)]
pub struct DashboardData {
    pub counts: DashboardCounts,
    pub recent_orders: Vec<Order>,
    pub low_stock: Vec<Product>,
    pub top_products: Vec<TopProduct>,
}

pub const DASHBOARD_RECENT_ORDERS: usize = 5;
pub const DASHBOARD_LOW_STOCK: usize = 10;
pub const DASHBOARD_TOP_PRODUCTS: usize = 5;

#[async_trait]
pub trait Store: Send + Sync {
    // -------------------------------------------------------------------------
    // HEALTH
    // -------------------------------------------------------------------------
    async fn ping(&self) -> bool;

    // -------------------------------------------------------------------------
    // USERS
    // -------------------------------------------------------------------------
    async fn create_user(&self, user: NewUser) -> AppResult<User>;
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn users_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<User>>;
    async fn update_profile(&self, id: Uuid, update: &UpdateProfileRequest)
        -> AppResult<Option<User>>;
    async fn update_password(&self, id: Uuid, password_hash: &str) -> AppResult<()>;
    /// Mark the account holding `token` verified and drop the token
    async fn verify_email(&self, token: &str) -> AppResult<Option<User>>;
    async fn list_users(&self, query: &UserQuery, page: i64, limit: i64)
        -> AppResult<(Vec<User>, i64)>;
    async fn set_user_role(&self, id: Uuid, role: Role) -> AppResult<Option<User>>;

    // -------------------------------------------------------------------------
    // CATALOGUE
    // -------------------------------------------------------------------------
    /// Active products matching the storefront filters, plus the total count
    async fn list_products(&self, query: &ProductQuery, page: i64, limit: i64)
        -> AppResult<(Vec<Product>, i64)>;
    async fn catalog_filters(&self) -> AppResult<CatalogFilters>;
    async fn featured_products(&self, limit: i64) -> AppResult<Vec<Product>>;
    async fn search_suggestions(&self, term: &str, limit: i64)
        -> AppResult<Vec<SearchSuggestion>>;
    /// Any product, active or not
    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>>;
    /// Active products among `ids`
    async fn products_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Product>>;
    async fn related_products(&self, product: &Product, limit: i64) -> AppResult<Vec<Product>>;
    async fn product_reviews(&self, product_id: Uuid) -> AppResult<Vec<Review>>;
    /// Store a review and refresh the product's rating and review count
    async fn add_review(&self, product_id: Uuid, review: NewReview)
        -> AppResult<Result<Review, ReviewRejection>>;
    async fn admin_list_products(&self, query: &AdminProductQuery, page: i64, limit: i64)
        -> AppResult<(Vec<Product>, i64)>;
    async fn create_product(&self, product: Product) -> AppResult<Product>;
    /// Overwrite every editable column of an existing product
    async fn save_product(&self, product: Product) -> AppResult<Product>;
    async fn delete_product(&self, id: Uuid) -> AppResult<bool>;

    // -------------------------------------------------------------------------
    // CART & WISHLIST
    // -------------------------------------------------------------------------
    /// Cart lines; lines pointing at missing or inactive products are purged
    async fn cart(&self, user_id: Uuid) -> AppResult<Vec<CartLine>>;
    async fn cart_quantity(&self, user_id: Uuid, product_id: Uuid) -> AppResult<Option<i32>>;
    /// Insert or overwrite the line for `product_id`
    async fn set_cart_quantity(&self, user_id: Uuid, product_id: Uuid, quantity: i32)
        -> AppResult<()>;
    async fn remove_cart_item(&self, user_id: Uuid, product_id: Uuid) -> AppResult<bool>;
    async fn clear_cart(&self, user_id: Uuid) -> AppResult<()>;

    /// Active wishlisted products, in insertion order
    async fn wishlist(&self, user_id: Uuid) -> AppResult<Vec<Product>>;
    /// `false` when the product was already wishlisted
    async fn add_to_wishlist(&self, user_id: Uuid, product_id: Uuid) -> AppResult<bool>;
    async fn remove_from_wishlist(&self, user_id: Uuid, product_id: Uuid) -> AppResult<()>;

    // -------------------------------------------------------------------------
    // ORDERS
    // -------------------------------------------------------------------------
    async fn place_order(&self, draft: OrderDraft) -> AppResult<Result<Order, CheckoutRejection>>;
    async fn orders_for_user(&self, user_id: Uuid, page: i64, limit: i64)
        -> AppResult<(Vec<Order>, i64)>;
    async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>>;
    /// Settle an unpaid order; `None` when it is missing or already paid
    async fn record_payment(&self, id: Uuid, result: PaymentResult) -> AppResult<Option<Order>>;
    async fn set_order_paid(&self, id: Uuid, is_paid: bool) -> AppResult<Option<Order>>;
    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> AppResult<Option<Order>>;
    /// Delete every order owned by `user_id`, returning how many went
    async fn clear_order_history(&self, user_id: Uuid) -> AppResult<u64>;
    async fn admin_list_orders(&self, query: &AdminOrderQuery, page: i64, limit: i64)
        -> AppResult<(Vec<Order>, i64)>;
    async fn dashboard(&self) -> AppResult<DashboardData>;

    // -------------------------------------------------------------------------
    // REFERENCE DATA
    // -------------------------------------------------------------------------
    async fn list_categories(&self) -> AppResult<Vec<Category>>;
    async fn find_category(&self, id: Uuid) -> AppResult<Option<Category>>;
    async fn create_category(&self, category: Category) -> AppResult<Category>;
    async fn save_category(&self, category: Category) -> AppResult<Category>;
    async fn delete_category(&self, id: Uuid) -> AppResult<bool>;

    async fn list_coupons(&self) -> AppResult<Vec<Coupon>>;
    async fn find_coupon(&self, id: Uuid) -> AppResult<Option<Coupon>>;
    async fn create_coupon(&self, coupon: Coupon) -> AppResult<Coupon>;
    async fn save_coupon(&self, coupon: Coupon) -> AppResult<Coupon>;
    async fn delete_coupon(&self, id: Uuid) -> AppResult<bool>;
}
