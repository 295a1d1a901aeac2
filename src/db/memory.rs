// =============================================================================
// IN-MEMORY STORE
// =============================================================================
// `Store` over plain collections behind one async mutex. Router tests run
// against it; it follows the PostgreSQL contract, including all-or-nothing
// checkout (the lock is held for the whole operation and nothing is written
// until every check has passed).
// =============================================================================

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{DashboardData, Store, DASHBOARD_LOW_STOCK, DASHBOARD_RECENT_ORDERS, DASHBOARD_TOP_PRODUCTS};
use crate::checkout::{self, CheckoutRejection, OrderDraft};
use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::{
    page_offset, rating_summary, AdminOrderQuery, AdminProductQuery, CartLine, CatalogFilters,
    Category, Coupon, DashboardCounts, NewReview, NewUser, Order, OrderStatus, PaymentResult,
    PriceRange, Product, ProductQuery, ProductSort, ProductView, Review, ReviewRejection, Role,
    SearchSuggestion, TopProduct, UpdateProfileRequest, User, UserQuery,
};

#[derive(Debug, Clone)]
struct CartEntry {
    product_id: Uuid,
    quantity: i32,
    added_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    products: Vec<Product>,
    reviews: Vec<Review>,
    carts: HashMap<Uuid, Vec<CartEntry>>,
    wishlists: HashMap<Uuid, Vec<Uuid>>,
    orders: Vec<Order>,
    categories: Vec<Category>,
    coupons: Vec<Coupon>,
}

impl Tables {
    fn product(&self, id: Uuid) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    fn order_mut(&mut self, id: Uuid) -> Option<&mut Order> {
        self.orders.iter_mut().find(|o| o.id == id)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of `totalPrice` over paid orders
    pub async fn paid_revenue(&self) -> Decimal {
        paid_revenue(&self.tables.lock().await.orders)
    }
}

fn paid_revenue(orders: &[Order]) -> Decimal {
    orders
        .iter()
        .filter(|order| order.is_paid)
        .map(|order| order.total_price)
        .sum()
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Every word of `term` appears in the name, brand or description
fn matches_search(product: &Product, term: &str) -> bool {
    let text = format!("{} {} {}", product.name, product.brand, product.description).to_lowercase();
    term.split_whitespace()
        .all(|word| text.contains(&word.to_lowercase()))
}

fn matches_storefront(product: &Product, query: &ProductQuery) -> bool {
    product.is_active
        && query.search_term().map_or(true, |term| matches_search(product, term))
        && query.category_filter().map_or(true, |c| product.category == c)
        && query.subcategory_filter().map_or(true, |s| product.subcategory == s)
        && query.brand_filter().map_or(true, |b| product.brand == b)
        && query.min_price.map_or(true, |min| product.price >= min)
        && query.max_price.map_or(true, |max| product.price <= max)
        && query.rating.map_or(true, |rating| product.rating >= rating)
        && (!query.in_stock_only() || product.stock > 0)
}

fn sort_products(products: &mut [Product], sort: ProductSort) {
    match sort {
        ProductSort::PriceAsc => products.sort_by(|a, b| a.price.cmp(&b.price)),
        ProductSort::PriceDesc => products.sort_by(|a, b| b.price.cmp(&a.price)),
        ProductSort::Rating => products.sort_by(|a, b| b.rating.total_cmp(&a.rating)),
        ProductSort::Newest => products.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        ProductSort::Popular => products.sort_by(|a, b| b.sales_count.cmp(&a.sales_count)),
    }
}

fn paginate<T: Clone>(items: &[T], page: i64, limit: i64) -> Vec<T> {
    let offset = usize::try_from(page_offset(page, limit)).unwrap_or(0);
    let limit = usize::try_from(limit).unwrap_or(0);
    items.iter().skip(offset).take(limit).cloned().collect()
}

fn newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> bool {
        true
    }

    // -------------------------------------------------------------------------
    // USERS
    // -------------------------------------------------------------------------
    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let mut tables = self.tables.lock().await;
        let email = user.email.to_lowercase();
        if tables.users.iter().any(|u| u.email == email) {
            return Err(AppError::bad_request("User already exists with this email"));
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            first_name: user.first_name,
            last_name: user.last_name,
            email,
            password_hash: user.password_hash,
            phone: user.phone,
            role: user.role,
            is_email_verified: false,
            email_verification_token: user.email_verification_token,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(created.clone());
        Ok(created)
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let email = email.trim().to_lowercase();
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn users_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<User>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: &UpdateProfileRequest,
    ) -> AppResult<Option<User>> {
        let mut tables = self.tables.lock().await;
        let Some(user) = tables.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(first_name) = &update.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(last_name) = &update.last_name {
            user.last_name = last_name.clone();
        }
        if let Some(phone) = &update.phone {
            user.phone = Some(phone.clone());
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == id) {
            user.password_hash = password_hash.to_string();
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn verify_email(&self, token: &str) -> AppResult<Option<User>> {
        let mut tables = self.tables.lock().await;
        let Some(user) = tables
            .users
            .iter_mut()
            .find(|u| u.email_verification_token.as_deref() == Some(token))
        else {
            return Ok(None);
        };
        user.is_email_verified = true;
        user.email_verification_token = None;
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn list_users(
        &self,
        query: &UserQuery,
        page: i64,
        limit: i64,
    ) -> AppResult<(Vec<User>, i64)> {
        let tables = self.tables.lock().await;
        let term = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty());
        let role = query.role.as_deref().and_then(|r| r.parse::<Role>().ok());

        let mut users: Vec<User> = tables
            .users
            .iter()
            .filter(|u| {
                term.map_or(true, |t| {
                    contains_ci(&u.first_name, t) || contains_ci(&u.last_name, t) || contains_ci(&u.email, t)
                })
            })
            .filter(|u| role.map_or(true, |r| u.role == r))
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = users.len() as i64;
        Ok((paginate(&users, page, limit), total))
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> AppResult<Option<User>> {
        let mut tables = self.tables.lock().await;
        let Some(user) = tables.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        user.role = role;
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    // -------------------------------------------------------------------------
    // CATALOGUE
    // -------------------------------------------------------------------------
    async fn list_products(
        &self,
        query: &ProductQuery,
        page: i64,
        limit: i64,
    ) -> AppResult<(Vec<Product>, i64)> {
        let tables = self.tables.lock().await;
        let mut products: Vec<Product> = tables
            .products
            .iter()
            .filter(|p| matches_storefront(p, query))
            .cloned()
            .collect();
        sort_products(&mut products, query.sort_order());

        let total = products.len() as i64;
        Ok((paginate(&products, page, limit), total))
    }

    async fn catalog_filters(&self) -> AppResult<CatalogFilters> {
        let tables = self.tables.lock().await;
        let active: Vec<&Product> = tables.products.iter().filter(|p| p.is_active).collect();

        let mut categories: Vec<String> = active.iter().map(|p| p.category.clone()).collect();
        categories.sort();
        categories.dedup();

        let mut brands: Vec<String> = active.iter().map(|p| p.brand.clone()).collect();
        brands.sort();
        brands.dedup();

        let min = active.iter().map(|p| p.price).min();
        let max = active.iter().map(|p| p.price).max();
        let price_range = match (min, max) {
            (Some(min), Some(max)) => PriceRange { min, max },
            _ => PriceRange::default(),
        };

        Ok(CatalogFilters {
            categories,
            brands,
            price_range,
        })
    }

    async fn featured_products(&self, limit: i64) -> AppResult<Vec<Product>> {
        let tables = self.tables.lock().await;
        let mut products: Vec<Product> = tables
            .products
            .iter()
            .filter(|p| p.is_active && p.is_featured)
            .cloned()
            .collect();
        sort_products(&mut products, ProductSort::Newest);
        Ok(paginate(&products, 1, limit))
    }

    async fn search_suggestions(&self, term: &str, limit: i64) -> AppResult<Vec<SearchSuggestion>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .products
            .iter()
            .filter(|p| p.is_active && matches_search(p, term))
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|p| SearchSuggestion {
                id: p.id,
                text: p.name.clone(),
                category: p.category.clone(),
                brand: p.brand.clone(),
            })
            .collect())
    }

    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        Ok(self.tables.lock().await.product(id).cloned())
    }

    async fn products_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Product>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .products
            .iter()
            .filter(|p| p.is_active && ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn related_products(&self, product: &Product, limit: i64) -> AppResult<Vec<Product>> {
        let tables = self.tables.lock().await;
        let mut related: Vec<Product> = tables
            .products
            .iter()
            .filter(|p| p.is_active && p.category == product.category && p.id != product.id)
            .cloned()
            .collect();
        sort_products(&mut related, ProductSort::Rating);
        Ok(paginate(&related, 1, limit))
    }

    async fn product_reviews(&self, product_id: Uuid) -> AppResult<Vec<Review>> {
        let tables = self.tables.lock().await;
        let mut reviews: Vec<Review> = tables
            .reviews
            .iter()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    async fn add_review(
        &self,
        product_id: Uuid,
        review: NewReview,
    ) -> AppResult<Result<Review, ReviewRejection>> {
        let mut tables = self.tables.lock().await;
        if tables.product(product_id).is_none() {
            return Ok(Err(ReviewRejection::ProductNotFound));
        }
        if tables
            .reviews
            .iter()
            .any(|r| r.product_id == product_id && r.user_id == review.user_id)
        {
            return Ok(Err(ReviewRejection::AlreadyReviewed));
        }

        let stored = review.into_review(product_id);
        tables.reviews.push(stored.clone());

        let ratings: Vec<i32> = tables
            .reviews
            .iter()
            .filter(|r| r.product_id == product_id)
            .map(|r| r.rating)
            .collect();
        let (rating, num_reviews) = rating_summary(&ratings);
        if let Some(product) = tables.products.iter_mut().find(|p| p.id == product_id) {
            product.rating = rating;
            product.num_reviews = num_reviews;
            product.updated_at = Utc::now();
        }

        Ok(Ok(stored))
    }

    async fn admin_list_products(
        &self,
        query: &AdminProductQuery,
        page: i64,
        limit: i64,
    ) -> AppResult<(Vec<Product>, i64)> {
        let tables = self.tables.lock().await;
        let mut products: Vec<Product> = tables
            .products
            .iter()
            .filter(|p| {
                query.search_term().map_or(true, |t| {
                    contains_ci(&p.name, t) || contains_ci(&p.brand, t) || contains_ci(&p.sku, t)
                })
            })
            .filter(|p| query.category_filter().map_or(true, |c| p.category == c))
            .filter(|p| query.active_filter().map_or(true, |a| p.is_active == a))
            .cloned()
            .collect();
        sort_products(&mut products, ProductSort::Newest);

        let total = products.len() as i64;
        Ok((paginate(&products, page, limit), total))
    }

    async fn create_product(&self, product: Product) -> AppResult<Product> {
        let mut tables = self.tables.lock().await;
        if tables
            .products
            .iter()
            .any(|p| p.sku == product.sku || p.slug == product.slug)
        {
            return Err(AppError::bad_request("A product with this SKU or slug already exists"));
        }
        tables.products.push(product.clone());
        Ok(product)
    }

    async fn save_product(&self, mut product: Product) -> AppResult<Product> {
        let mut tables = self.tables.lock().await;
        if tables
            .products
            .iter()
            .any(|p| p.id != product.id && (p.sku == product.sku || p.slug == product.slug))
        {
            return Err(AppError::bad_request("A product with this SKU or slug already exists"));
        }
        let slot = tables
            .products
            .iter_mut()
            .find(|p| p.id == product.id)
            .ok_or_else(|| AppError::not_found("Product not found"))?;

        // Counters are owned by checkout and reviews, not by the editor
        product.rating = slot.rating;
        product.num_reviews = slot.num_reviews;
        product.sales_count = slot.sales_count;
        product.view_count = slot.view_count;
        product.updated_at = Utc::now();
        *slot = product.clone();
        Ok(product)
    }

    async fn delete_product(&self, id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.products.len();
        tables.products.retain(|p| p.id != id);
        let removed = tables.products.len() < before;
        if removed {
            tables.reviews.retain(|r| r.product_id != id);
            for entries in tables.carts.values_mut() {
                entries.retain(|e| e.product_id != id);
            }
            for ids in tables.wishlists.values_mut() {
                ids.retain(|p| *p != id);
            }
        }
        Ok(removed)
    }

    // -------------------------------------------------------------------------
    // CART & WISHLIST
    // -------------------------------------------------------------------------
    async fn cart(&self, user_id: Uuid) -> AppResult<Vec<CartLine>> {
        let mut guard = self.tables.lock().await;
        let tables = &mut *guard;
        let entries = tables.carts.entry(user_id).or_default();

        let products = &tables.products;
        entries.retain(|e| {
            products
                .iter()
                .any(|p| p.id == e.product_id && p.is_active)
        });

        let mut lines: Vec<CartLine> = entries
            .iter()
            .filter_map(|e| {
                products.iter().find(|p| p.id == e.product_id).map(|p| CartLine {
                    product: ProductView::from(p.clone()),
                    quantity: e.quantity,
                    added_at: e.added_at,
                })
            })
            .collect();
        lines.sort_by(|a, b| a.added_at.cmp(&b.added_at));
        Ok(lines)
    }

    async fn cart_quantity(&self, user_id: Uuid, product_id: Uuid) -> AppResult<Option<i32>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .carts
            .get(&user_id)
            .and_then(|entries| entries.iter().find(|e| e.product_id == product_id))
            .map(|e| e.quantity))
    }

    async fn set_cart_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        let entries = tables.carts.entry(user_id).or_default();
        match entries.iter_mut().find(|e| e.product_id == product_id) {
            Some(entry) => entry.quantity = quantity,
            None => entries.push(CartEntry {
                product_id,
                quantity,
                added_at: Utc::now(),
            }),
        }
        Ok(())
    }

    async fn remove_cart_item(&self, user_id: Uuid, product_id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        let Some(entries) = tables.carts.get_mut(&user_id) else {
            return Ok(false);
        };
        let before = entries.len();
        entries.retain(|e| e.product_id != product_id);
        Ok(entries.len() < before)
    }

    async fn clear_cart(&self, user_id: Uuid) -> AppResult<()> {
        self.tables.lock().await.carts.remove(&user_id);
        Ok(())
    }

    async fn wishlist(&self, user_id: Uuid) -> AppResult<Vec<Product>> {
        let tables = self.tables.lock().await;
        let ids = tables.wishlists.get(&user_id).cloned().unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| tables.product(*id))
            .filter(|p| p.is_active)
            .cloned()
            .collect())
    }

    async fn add_to_wishlist(&self, user_id: Uuid, product_id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        let ids = tables.wishlists.entry(user_id).or_default();
        if ids.contains(&product_id) {
            return Ok(false);
        }
        ids.push(product_id);
        Ok(true)
    }

    async fn remove_from_wishlist(&self, user_id: Uuid, product_id: Uuid) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        if let Some(ids) = tables.wishlists.get_mut(&user_id) {
            ids.retain(|id| *id != product_id);
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // ORDERS
    // -------------------------------------------------------------------------
    async fn place_order(&self, draft: OrderDraft) -> AppResult<Result<Order, CheckoutRejection>> {
        let mut tables = self.tables.lock().await;

        let ids = draft.product_ids();
        let products: HashMap<Uuid, Product> = tables
            .products
            .iter()
            .filter(|p| ids.contains(&p.id))
            .map(|p| (p.id, p.clone()))
            .collect();

        let order = match checkout::build_order(&draft, &products) {
            Ok(order) => order,
            Err(rejection) => return Ok(Err(rejection)),
        };

        let deltas = checkout::stock_deltas(&order);
        for product in tables.products.iter_mut() {
            if let Some(quantity) = deltas.get(&product.id) {
                product.stock -= quantity;
                product.sales_count += quantity;
                product.updated_at = Utc::now();
                metrics::set_stock_level(&product.sku, product.stock);
            }
        }
        tables.orders.push(order.clone());
        tables.carts.remove(&draft.user_id);

        Ok(Ok(order))
    }

    async fn orders_for_user(
        &self,
        user_id: Uuid,
        page: i64,
        limit: i64,
    ) -> AppResult<(Vec<Order>, i64)> {
        let tables = self.tables.lock().await;
        let mut orders: Vec<Order> = tables
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut orders);

        let total = orders.len() as i64;
        Ok((paginate(&orders, page, limit), total))
    }

    async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        let tables = self.tables.lock().await;
        Ok(tables.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn record_payment(&self, id: Uuid, result: PaymentResult) -> AppResult<Option<Order>> {
        let mut tables = self.tables.lock().await;
        match tables.order_mut(id) {
            Some(order) if !order.is_paid => {
                order.mark_paid(result);
                Ok(Some(order.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn set_order_paid(&self, id: Uuid, is_paid: bool) -> AppResult<Option<Order>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.order_mut(id).map(|order| {
            order.set_paid(is_paid);
            order.clone()
        }))
    }

    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> AppResult<Option<Order>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.order_mut(id).map(|order| {
            order.set_status(status);
            order.clone()
        }))
    }

    async fn clear_order_history(&self, user_id: Uuid) -> AppResult<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.orders.len();
        tables.orders.retain(|o| o.user_id != user_id);
        Ok((before - tables.orders.len()) as u64)
    }

    async fn admin_list_orders(
        &self,
        query: &AdminOrderQuery,
        page: i64,
        limit: i64,
    ) -> AppResult<(Vec<Order>, i64)> {
        let tables = self.tables.lock().await;
        let mut orders: Vec<Order> = tables
            .orders
            .iter()
            .filter(|o| query.status_filter().map_or(true, |s| o.status == s))
            .filter(|o| query.search_term().map_or(true, |t| contains_ci(&o.order_number, t)))
            .cloned()
            .collect();
        newest_first(&mut orders);

        let total = orders.len() as i64;
        Ok((paginate(&orders, page, limit), total))
    }

    async fn dashboard(&self) -> AppResult<DashboardData> {
        let tables = self.tables.lock().await;

        let counts = DashboardCounts {
            total_products: tables.products.iter().filter(|p| p.is_active).count() as i64,
            total_users: tables.users.iter().filter(|u| u.role == Role::User).count() as i64,
            total_orders: tables.orders.len() as i64,
            total_revenue: paid_revenue(&tables.orders),
        };

        let mut recent_orders = tables.orders.clone();
        newest_first(&mut recent_orders);
        recent_orders.truncate(DASHBOARD_RECENT_ORDERS);

        let mut low_stock: Vec<Product> = tables
            .products
            .iter()
            .filter(|p| p.is_active && p.stock <= p.low_stock_threshold)
            .cloned()
            .collect();
        low_stock.sort_by_key(|p| p.stock);
        low_stock.truncate(DASHBOARD_LOW_STOCK);

        let mut sellers: Vec<&Product> = tables.products.iter().filter(|p| p.is_active).collect();
        sellers.sort_by(|a, b| b.sales_count.cmp(&a.sales_count));
        let top_products = sellers
            .into_iter()
            .take(DASHBOARD_TOP_PRODUCTS)
            .map(|p| TopProduct {
                id: p.id,
                name: p.name.clone(),
                price: p.price,
                sales_count: p.sales_count,
            })
            .collect();

        Ok(DashboardData {
            counts,
            recent_orders,
            low_stock,
            top_products,
        })
    }

    // -------------------------------------------------------------------------
    // REFERENCE DATA
    // -------------------------------------------------------------------------
    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let mut categories = self.tables.lock().await.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn find_category(&self, id: Uuid) -> AppResult<Option<Category>> {
        let tables = self.tables.lock().await;
        Ok(tables.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn create_category(&self, category: Category) -> AppResult<Category> {
        let mut tables = self.tables.lock().await;
        if tables
            .categories
            .iter()
            .any(|c| c.name == category.name || c.slug == category.slug)
        {
            return Err(AppError::bad_request("Category already exists"));
        }
        tables.categories.push(category.clone());
        Ok(category)
    }

    async fn save_category(&self, mut category: Category) -> AppResult<Category> {
        let mut tables = self.tables.lock().await;
        if tables
            .categories
            .iter()
            .any(|c| c.id != category.id && (c.name == category.name || c.slug == category.slug))
        {
            return Err(AppError::bad_request("Category already exists"));
        }
        let slot = tables
            .categories
            .iter_mut()
            .find(|c| c.id == category.id)
            .ok_or_else(|| AppError::not_found("Category not found"))?;
        category.updated_at = Utc::now();
        *slot = category.clone();
        Ok(category)
    }

    async fn delete_category(&self, id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.categories.len();
        tables.categories.retain(|c| c.id != id);
        Ok(tables.categories.len() < before)
    }

    async fn list_coupons(&self) -> AppResult<Vec<Coupon>> {
        let mut coupons = self.tables.lock().await.coupons.clone();
        coupons.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(coupons)
    }

    async fn find_coupon(&self, id: Uuid) -> AppResult<Option<Coupon>> {
        let tables = self.tables.lock().await;
        Ok(tables.coupons.iter().find(|c| c.id == id).cloned())
    }

    async fn create_coupon(&self, coupon: Coupon) -> AppResult<Coupon> {
        let mut tables = self.tables.lock().await;
        if tables.coupons.iter().any(|c| c.code == coupon.code) {
            return Err(AppError::bad_request("Coupon code already exists"));
        }
        tables.coupons.push(coupon.clone());
        Ok(coupon)
    }

    async fn save_coupon(&self, mut coupon: Coupon) -> AppResult<Coupon> {
        let mut tables = self.tables.lock().await;
        if tables
            .coupons
            .iter()
            .any(|c| c.id != coupon.id && c.code == coupon.code)
        {
            return Err(AppError::bad_request("Coupon code already exists"));
        }
        let slot = tables
            .coupons
            .iter_mut()
            .find(|c| c.id == coupon.id)
            .ok_or_else(|| AppError::not_found("Coupon not found"))?;
        coupon.used_count = slot.used_count;
        coupon.updated_at = Utc::now();
        *slot = coupon.clone();
        Ok(coupon)
    }

    async fn delete_coupon(&self, id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.coupons.len();
        tables.coupons.retain(|c| c.id != id);
        Ok(tables.coupons.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::tests::address;
    use crate::checkout::Pricing;
    use crate::models::product::tests::sample_input;
    use crate::models::OrderLineRequest;
    use rust_decimal_macros::dec;

    fn draft(user_id: Uuid, product: &Product, quantity: i32) -> OrderDraft {
        OrderDraft {
            user_id,
            lines: vec![OrderLineRequest {
                product: product.id,
                name: Some(product.name.clone()),
                quantity,
                price: product.price,
            }],
            shipping_address: address(),
            billing_address: None,
            payment_method: "card".into(),
            coupon_code: None,
            pricing: Pricing {
                tax_rate: dec!(0.08),
                shipping_flat: dec!(10),
            },
        }
    }

    #[tokio::test]
    async fn test_rejected_checkout_writes_nothing() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let product = store
            .create_product(Product::from_input(sample_input("Mouse", "M-1", dec!(10), 1), None))
            .await
            .unwrap();
        store.set_cart_quantity(user, product.id, 2).await.unwrap();

        let result = store.place_order(draft(user, &product, 2)).await.unwrap();
        assert_eq!(
            result.unwrap_err(),
            CheckoutRejection::InsufficientStock("Mouse".into())
        );

        let after = store.find_product(product.id).await.unwrap().unwrap();
        assert_eq!(after.stock, 1);
        assert_eq!(after.sales_count, 0);
        assert_eq!(store.orders_for_user(user, 1, 10).await.unwrap().1, 0);
        assert_eq!(store.cart_quantity(user, product.id).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_payment_settles_once() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let product = store
            .create_product(Product::from_input(sample_input("Mouse", "M-1", dec!(10), 5), None))
            .await
            .unwrap();
        let order = store
            .place_order(draft(user, &product, 1))
            .await
            .unwrap()
            .unwrap();

        let result = PaymentResult {
            id: "pi_1".into(),
            status: "succeeded".into(),
            update_time: Utc::now(),
            email_address: "a@example.com".into(),
        };
        let paid = store.record_payment(order.id, result.clone()).await.unwrap();
        assert_eq!(paid.map(|o| o.status), Some(OrderStatus::Processing));
        assert!(store.record_payment(order.id, result).await.unwrap().is_none());
        assert_eq!(store.paid_revenue().await, order.total_price);
    }

    #[tokio::test]
    async fn test_unique_keys_are_enforced() {
        let store = MemoryStore::new();
        store
            .create_product(Product::from_input(sample_input("Mouse", "M-1", dec!(10), 5), None))
            .await
            .unwrap();
        let err = store
            .create_product(Product::from_input(sample_input("Other", "M-1", dec!(10), 5), None))
            .await
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
