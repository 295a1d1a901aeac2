// =============================================================================
// POSTGRESQL STORE
// =============================================================================
// `Store` implementation on a SQLx connection pool.
//
// NOTES:
// - Embedded documents (images, specifications, addresses, order lines) are
//   JSONB columns decoded through `#[sqlx(json)]`
// - Money is NUMERIC(12,2) mapped to `rust_decimal::Decimal`
// - Storefront search uses a generated `tsvector` column with a GIN index
// - Checkout and review writes run in a transaction with the product rows
//   locked `FOR UPDATE`
// =============================================================================

use std::collections::HashMap;
use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool, Postgres, QueryBuilder, Row};
use sqlx::types::Json;
use uuid::Uuid;

use super::seed::{sample_categories, sample_products};
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

// -----------------------------------------------------------------------------
// COLUMN LISTS
// -----------------------------------------------------------------------------
macro_rules! user_columns {
    () => {
        "id, first_name, last_name, email, password_hash, phone, role, is_email_verified, \
         email_verification_token, created_at, updated_at"
    };
}

macro_rules! product_columns {
    () => {
        "id, name, description, price, compare_price, category, subcategory, brand, sku, slug, \
         images, specifications, features, stock, low_stock_threshold, weight, dimensions, \
         rating, num_reviews, is_active, is_featured, tags, seo_title, seo_description, \
         view_count, sales_count, created_by, created_at, updated_at"
    };
}

macro_rules! review_columns {
    () => {
        "id, product_id, user_id, user_name, rating, comment, verified, created_at"
    };
}

macro_rules! order_columns {
    () => {
        "id, order_number, user_id, order_items, shipping_address, billing_address, \
         payment_method, items_price, tax_price, shipping_price, total_price, coupon_code, \
         is_paid, paid_at, payment_result, status, is_delivered, delivered_at, created_at, \
         updated_at"
    };
}

macro_rules! category_columns {
    () => {
        "id, name, slug, description, image, is_active, created_at, updated_at"
    };
}

macro_rules! coupon_columns {
    () => {
        "id, code, description, coupon_type, value, minimum_amount, maximum_discount, \
         usage_limit, used_count, user_limit, applicable_categories, applicable_products, \
         exclude_products, is_active, valid_from, valid_until, created_by, created_at, updated_at"
    };
}

// -----------------------------------------------------------------------------
// SCHEMA
// -----------------------------------------------------------------------------
// Applied in order at start-up. Every statement is idempotent.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "users table",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY,
            first_name VARCHAR(50) NOT NULL,
            last_name VARCHAR(50) NOT NULL,
            email VARCHAR(255) UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            phone VARCHAR(50),
            role VARCHAR(10) NOT NULL DEFAULT 'user',
            is_email_verified BOOLEAN NOT NULL DEFAULT FALSE,
            email_verification_token TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT valid_role CHECK (role IN ('user', 'admin'))
        )
        "#,
    ),
    (
        "products table",
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id UUID PRIMARY KEY,
            name VARCHAR(200) NOT NULL,
            description TEXT NOT NULL,
            price NUMERIC(12, 2) NOT NULL,
            compare_price NUMERIC(12, 2),
            category VARCHAR(50) NOT NULL,
            subcategory VARCHAR(100) NOT NULL,
            brand VARCHAR(100) NOT NULL,
            sku VARCHAR(100) UNIQUE NOT NULL,
            slug VARCHAR(320) UNIQUE NOT NULL,
            images JSONB NOT NULL DEFAULT '[]',
            specifications JSONB NOT NULL DEFAULT '{}',
            features TEXT[] NOT NULL DEFAULT '{}',
            stock INTEGER NOT NULL DEFAULT 0,
            low_stock_threshold INTEGER NOT NULL DEFAULT 10,
            weight DOUBLE PRECISION,
            dimensions JSONB NOT NULL DEFAULT 'null',
            rating DOUBLE PRECISION NOT NULL DEFAULT 0,
            num_reviews INTEGER NOT NULL DEFAULT 0,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            is_featured BOOLEAN NOT NULL DEFAULT FALSE,
            tags TEXT[] NOT NULL DEFAULT '{}',
            seo_title TEXT,
            seo_description TEXT,
            view_count INTEGER NOT NULL DEFAULT 0,
            sales_count INTEGER NOT NULL DEFAULT 0,
            created_by UUID REFERENCES users(id) ON DELETE SET NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            search_vector TSVECTOR GENERATED ALWAYS AS (
                setweight(to_tsvector('english', coalesce(name, '')), 'A') ||
                setweight(to_tsvector('english', coalesce(brand, '')), 'B') ||
                setweight(to_tsvector('english', coalesce(description, '')), 'C')
            ) STORED,
            CONSTRAINT non_negative_price CHECK (price >= 0),
            CONSTRAINT non_negative_stock CHECK (stock >= 0)
        )
        "#,
    ),
    (
        "product search index",
        "CREATE INDEX IF NOT EXISTS idx_products_search ON products USING GIN (search_vector)",
    ),
    (
        "product category index",
        "CREATE INDEX IF NOT EXISTS idx_products_category ON products(category, price)",
    ),
    (
        "reviews table",
        r#"
        CREATE TABLE IF NOT EXISTS reviews (
            id UUID PRIMARY KEY,
            product_id UUID NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            user_name VARCHAR(120) NOT NULL,
            rating INTEGER NOT NULL,
            comment VARCHAR(500) NOT NULL,
            verified BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT one_review_per_user UNIQUE (product_id, user_id),
            CONSTRAINT valid_rating CHECK (rating BETWEEN 1 AND 5)
        )
        "#,
    ),
    (
        "cart table",
        r#"
        CREATE TABLE IF NOT EXISTS cart_items (
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            product_id UUID NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            quantity INTEGER NOT NULL,
            added_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (user_id, product_id),
            CONSTRAINT positive_quantity CHECK (quantity >= 1)
        )
        "#,
    ),
    (
        "wishlist table",
        r#"
        CREATE TABLE IF NOT EXISTS wishlist_items (
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            product_id UUID NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            added_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (user_id, product_id)
        )
        "#,
    ),
    (
        "orders table",
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            id UUID PRIMARY KEY,
            order_number VARCHAR(50) UNIQUE NOT NULL,
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            order_items JSONB NOT NULL,
            shipping_address JSONB NOT NULL,
            billing_address JSONB NOT NULL DEFAULT 'null',
            payment_method VARCHAR(50) NOT NULL,
            items_price NUMERIC(12, 2) NOT NULL,
            tax_price NUMERIC(12, 2) NOT NULL,
            shipping_price NUMERIC(12, 2) NOT NULL,
            total_price NUMERIC(12, 2) NOT NULL,
            coupon_code VARCHAR(50),
            is_paid BOOLEAN NOT NULL DEFAULT FALSE,
            paid_at TIMESTAMPTZ,
            payment_result JSONB NOT NULL DEFAULT 'null',
            status VARCHAR(20) NOT NULL DEFAULT 'pending',
            is_delivered BOOLEAN NOT NULL DEFAULT FALSE,
            delivered_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT valid_status CHECK (
                status IN ('pending', 'processing', 'shipped', 'delivered', 'cancelled')
            )
        )
        "#,
    ),
    (
        "orders user index",
        "CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id, created_at DESC)",
    ),
    (
        "orders status index",
        "CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status)",
    ),
    (
        "categories table",
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id UUID PRIMARY KEY,
            name VARCHAR(100) UNIQUE NOT NULL,
            slug VARCHAR(120) UNIQUE NOT NULL,
            description TEXT,
            image TEXT,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "coupons table",
        r#"
        CREATE TABLE IF NOT EXISTS coupons (
            id UUID PRIMARY KEY,
            code VARCHAR(50) UNIQUE NOT NULL,
            description TEXT,
            coupon_type VARCHAR(20) NOT NULL DEFAULT 'percentage',
            value NUMERIC(12, 2) NOT NULL,
            minimum_amount NUMERIC(12, 2) NOT NULL DEFAULT 0,
            maximum_discount NUMERIC(12, 2),
            usage_limit INTEGER,
            used_count INTEGER NOT NULL DEFAULT 0,
            user_limit INTEGER NOT NULL DEFAULT 1,
            applicable_categories TEXT[] NOT NULL DEFAULT '{}',
            applicable_products UUID[] NOT NULL DEFAULT '{}',
            exclude_products UUID[] NOT NULL DEFAULT '{}',
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            valid_from TIMESTAMPTZ NOT NULL,
            valid_until TIMESTAMPTZ NOT NULL,
            created_by UUID REFERENCES users(id) ON DELETE SET NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT valid_coupon_type CHECK (coupon_type IN ('percentage', 'fixed')),
            CONSTRAINT non_negative_value CHECK (value >= 0)
        )
        "#,
    ),
];

/// Map a unique-key clash to a 400 with `message`; anything else stays a
/// database error.
fn unique_violation(err: sqlx::Error, message: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::bad_request(message),
        _ => AppError::Database(err),
    }
}

fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn sort_clause(sort: ProductSort) -> &'static str {
    match sort {
        ProductSort::PriceAsc => " ORDER BY price ASC, id",
        ProductSort::PriceDesc => " ORDER BY price DESC, id",
        ProductSort::Rating => " ORDER BY rating DESC, id",
        ProductSort::Newest => " ORDER BY created_at DESC, id",
        ProductSort::Popular => " ORDER BY sales_count DESC, id",
    }
}

fn push_storefront_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, query: &'a ProductQuery) {
    qb.push(" WHERE is_active = TRUE");
    if let Some(term) = query.search_term() {
        qb.push(" AND search_vector @@ plainto_tsquery('english', ")
            .push_bind(term)
            .push(")");
    }
    if let Some(category) = query.category_filter() {
        qb.push(" AND category = ").push_bind(category);
    }
    if let Some(subcategory) = query.subcategory_filter() {
        qb.push(" AND subcategory = ").push_bind(subcategory);
    }
    if let Some(brand) = query.brand_filter() {
        qb.push(" AND brand = ").push_bind(brand);
    }
    if let Some(min_price) = query.min_price {
        qb.push(" AND price >= ").push_bind(min_price);
    }
    if let Some(max_price) = query.max_price {
        qb.push(" AND price <= ").push_bind(max_price);
    }
    if let Some(rating) = query.rating {
        qb.push(" AND rating >= ").push_bind(rating);
    }
    if query.in_stock_only() {
        qb.push(" AND stock > 0");
    }
}

fn push_admin_product_filters<'a>(
    qb: &mut QueryBuilder<'a, Postgres>,
    query: &'a AdminProductQuery,
) {
    qb.push(" WHERE TRUE");
    if let Some(term) = query.search_term() {
        let pattern = like_pattern(term);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR brand ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR sku ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(category) = query.category_filter() {
        qb.push(" AND category = ").push_bind(category);
    }
    if let Some(active) = query.active_filter() {
        qb.push(" AND is_active = ").push_bind(active);
    }
}

fn push_admin_order_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, query: &'a AdminOrderQuery) {
    qb.push(" WHERE TRUE");
    if let Some(status) = query.status_filter() {
        qb.push(" AND status = ").push_bind(status.to_string());
    }
    if let Some(term) = query.search_term() {
        qb.push(" AND order_number ILIKE ").push_bind(like_pattern(term));
    }
}

fn push_user_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, query: &'a UserQuery) {
    qb.push(" WHERE TRUE");
    if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = like_pattern(term);
        qb.push(" AND (first_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR last_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(role) = query.role.as_deref().and_then(|r| r.parse::<Role>().ok()) {
        qb.push(" AND role = ").push_bind(role.to_string());
    }
}

// -----------------------------------------------------------------------------
// STORE
// -----------------------------------------------------------------------------
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create the connection pool
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(2)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .idle_timeout(std::time::Duration::from_secs(300))
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self { pool })
    }

    /// Create tables and indexes, then seed an empty catalogue when asked to
    pub async fn run_migrations(&self, seed: bool) -> Result<()> {
        for (name, sql) in MIGRATIONS {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to apply migration: {name}"))?;
        }

        if seed {
            self.seed_sample_data().await?;
        }

        Ok(())
    }

    async fn seed_sample_data(&self) -> Result<()> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        if count.0 > 0 {
            return Ok(());
        }

        for product in sample_products() {
            self.insert_product(&product)
                .await
                .with_context(|| format!("Failed to seed product {}", product.sku))?;
        }

        for category in sample_categories() {
            sqlx::query(concat!(
                "INSERT INTO categories (",
                category_columns!(),
                ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8) ON CONFLICT DO NOTHING"
            ))
            .bind(category.id)
            .bind(&category.name)
            .bind(&category.slug)
            .bind(&category.description)
            .bind(&category.image)
            .bind(category.is_active)
            .bind(category.created_at)
            .bind(category.updated_at)
            .execute(&self.pool)
            .await?;
        }

        tracing::info!("Seeded sample catalogue");
        Ok(())
    }

    async fn insert_product(&self, product: &Product) -> Result<Product, sqlx::Error> {
        sqlx::query_as::<_, Product>(concat!(
            "INSERT INTO products (",
            product_columns!(),
            ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, \
             $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29) RETURNING ",
            product_columns!()
        ))
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.compare_price)
        .bind(&product.category)
        .bind(&product.subcategory)
        .bind(&product.brand)
        .bind(&product.sku)
        .bind(&product.slug)
        .bind(Json(&product.images))
        .bind(Json(&product.specifications))
        .bind(&product.features)
        .bind(product.stock)
        .bind(product.low_stock_threshold)
        .bind(product.weight)
        .bind(Json(&product.dimensions))
        .bind(product.rating)
        .bind(product.num_reviews)
        .bind(product.is_active)
        .bind(product.is_featured)
        .bind(&product.tags)
        .bind(&product.seo_title)
        .bind(&product.seo_description)
        .bind(product.view_count)
        .bind(product.sales_count)
        .bind(product.created_by)
        .bind(product.created_at)
        .bind(product.updated_at)
        .fetch_one(&self.pool)
        .await
    }

    async fn fetch_products(&self, sql: &str, ids: &[Uuid]) -> AppResult<Vec<Product>> {
        Ok(sqlx::query_as::<_, Product>(sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    // -------------------------------------------------------------------------
    // USERS
    // -------------------------------------------------------------------------
    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let now = Utc::now();
        sqlx::query_as::<_, User>(concat!(
            "INSERT INTO users (",
            user_columns!(),
            ") VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, $8, $9, $9) RETURNING ",
            user_columns!()
        ))
        .bind(Uuid::new_v4())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.email.to_lowercase())
        .bind(&user.password_hash)
        .bind(&user.phone)
        .bind(user.role.to_string())
        .bind(&user.email_verification_token)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| unique_violation(err, "User already exists with this email"))
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(
            sqlx::query_as::<_, User>(concat!("SELECT ", user_columns!(), " FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE email = $1"
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn users_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<User>> {
        Ok(sqlx::query_as::<_, User>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: &UpdateProfileRequest,
    ) -> AppResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(concat!(
            "UPDATE users SET first_name = COALESCE($2, first_name), \
             last_name = COALESCE($3, last_name), phone = COALESCE($4, phone), \
             updated_at = NOW() WHERE id = $1 RETURNING ",
            user_columns!()
        ))
        .bind(id)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.phone)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> AppResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn verify_email(&self, token: &str) -> AppResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(concat!(
            "UPDATE users SET is_email_verified = TRUE, email_verification_token = NULL, \
             updated_at = NOW() WHERE email_verification_token = $1 RETURNING ",
            user_columns!()
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_users(
        &self,
        query: &UserQuery,
        page: i64,
        limit: i64,
    ) -> AppResult<(Vec<User>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        push_user_filters(&mut count, query);
        let (total,): (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        let mut select =
            QueryBuilder::<Postgres>::new(concat!("SELECT ", user_columns!(), " FROM users"));
        push_user_filters(&mut select, query);
        select
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(page_offset(page, limit));
        let users = select.build_query_as::<User>().fetch_all(&self.pool).await?;

        Ok((users, total))
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> AppResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(concat!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING ",
            user_columns!()
        ))
        .bind(id)
        .bind(role.to_string())
        .fetch_optional(&self.pool)
        .await?)
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
        let start = Instant::now();

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_storefront_filters(&mut count, query);
        let (total,): (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(concat!(
            "SELECT ",
            product_columns!(),
            " FROM products"
        ));
        push_storefront_filters(&mut select, query);
        select
            .push(sort_clause(query.sort_order()))
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(page_offset(page, limit));
        let products = select
            .build_query_as::<Product>()
            .fetch_all(&self.pool)
            .await?;

        metrics::record_db_query("list_products", start.elapsed().as_secs_f64());
        Ok((products, total))
    }

    async fn catalog_filters(&self) -> AppResult<CatalogFilters> {
        let categories: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT category FROM products WHERE is_active = TRUE ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await?;

        let brands: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT brand FROM products WHERE is_active = TRUE ORDER BY brand",
        )
        .fetch_all(&self.pool)
        .await?;

        let (min, max): (Option<Decimal>, Option<Decimal>) =
            sqlx::query_as("SELECT MIN(price), MAX(price) FROM products WHERE is_active = TRUE")
                .fetch_one(&self.pool)
                .await?;

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
        Ok(sqlx::query_as::<_, Product>(concat!(
            "SELECT ",
            product_columns!(),
            " FROM products WHERE is_active = TRUE AND is_featured = TRUE \
             ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn search_suggestions(&self, term: &str, limit: i64) -> AppResult<Vec<SearchSuggestion>> {
        let rows = sqlx::query(
            "SELECT id, name, category, brand FROM products \
             WHERE is_active = TRUE AND search_vector @@ plainto_tsquery('english', $1) \
             ORDER BY ts_rank(search_vector, plainto_tsquery('english', $1)) DESC LIMIT $2",
        )
        .bind(term)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(SearchSuggestion {
                    id: row.try_get("id")?,
                    text: row.try_get("name")?,
                    category: row.try_get("category")?,
                    brand: row.try_get("brand")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(AppError::from)
    }

    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        Ok(sqlx::query_as::<_, Product>(concat!(
            "SELECT ",
            product_columns!(),
            " FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn products_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Product>> {
        self.fetch_products(
            concat!(
                "SELECT ",
                product_columns!(),
                " FROM products WHERE id = ANY($1) AND is_active = TRUE"
            ),
            ids,
        )
        .await
    }

    async fn related_products(&self, product: &Product, limit: i64) -> AppResult<Vec<Product>> {
        Ok(sqlx::query_as::<_, Product>(concat!(
            "SELECT ",
            product_columns!(),
            " FROM products WHERE category = $1 AND id <> $2 AND is_active = TRUE \
             ORDER BY rating DESC, created_at DESC LIMIT $3"
        ))
        .bind(&product.category)
        .bind(product.id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn product_reviews(&self, product_id: Uuid) -> AppResult<Vec<Review>> {
        Ok(sqlx::query_as::<_, Review>(concat!(
            "SELECT ",
            review_columns!(),
            " FROM reviews WHERE product_id = $1 ORDER BY created_at DESC"
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn add_review(
        &self,
        product_id: Uuid,
        review: NewReview,
    ) -> AppResult<Result<Review, ReviewRejection>> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await?;

        let locked: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1 FOR UPDATE")
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Ok(Err(ReviewRejection::ProductNotFound));
        }

        let already: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM reviews WHERE product_id = $1 AND user_id = $2)",
        )
        .bind(product_id)
        .bind(review.user_id)
        .fetch_one(&mut *tx)
        .await?;
        if already {
            return Ok(Err(ReviewRejection::AlreadyReviewed));
        }

        let review = review.into_review(product_id);
        let stored = sqlx::query_as::<_, Review>(concat!(
            "INSERT INTO reviews (",
            review_columns!(),
            ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING ",
            review_columns!()
        ))
        .bind(review.id)
        .bind(review.product_id)
        .bind(review.user_id)
        .bind(&review.user_name)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.verified)
        .bind(review.created_at)
        .fetch_one(&mut *tx)
        .await?;

        let ratings: Vec<i32> = sqlx::query_scalar("SELECT rating FROM reviews WHERE product_id = $1")
            .bind(product_id)
            .fetch_all(&mut *tx)
            .await?;
        let (rating, num_reviews) = rating_summary(&ratings);

        sqlx::query(
            "UPDATE products SET rating = $2, num_reviews = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(product_id)
        .bind(rating)
        .bind(num_reviews)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        metrics::record_db_query("add_review", start.elapsed().as_secs_f64());

        Ok(Ok(stored))
    }

    async fn admin_list_products(
        &self,
        query: &AdminProductQuery,
        page: i64,
        limit: i64,
    ) -> AppResult<(Vec<Product>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_admin_product_filters(&mut count, query);
        let (total,): (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(concat!(
            "SELECT ",
            product_columns!(),
            " FROM products"
        ));
        push_admin_product_filters(&mut select, query);
        select
            .push(" ORDER BY created_at DESC, id LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(page_offset(page, limit));
        let products = select
            .build_query_as::<Product>()
            .fetch_all(&self.pool)
            .await?;

        Ok((products, total))
    }

    async fn create_product(&self, product: Product) -> AppResult<Product> {
        self.insert_product(&product)
            .await
            .map_err(|err| unique_violation(err, "A product with this SKU or slug already exists"))
    }

    async fn save_product(&self, product: Product) -> AppResult<Product> {
        sqlx::query_as::<_, Product>(concat!(
            "UPDATE products SET name = $2, description = $3, price = $4, compare_price = $5, \
             category = $6, subcategory = $7, brand = $8, sku = $9, slug = $10, images = $11, \
             specifications = $12, features = $13, stock = $14, low_stock_threshold = $15, \
             weight = $16, dimensions = $17, is_active = $18, is_featured = $19, tags = $20, \
             seo_title = $21, seo_description = $22, updated_at = NOW() \
             WHERE id = $1 RETURNING ",
            product_columns!()
        ))
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.compare_price)
        .bind(&product.category)
        .bind(&product.subcategory)
        .bind(&product.brand)
        .bind(&product.sku)
        .bind(&product.slug)
        .bind(Json(&product.images))
        .bind(Json(&product.specifications))
        .bind(&product.features)
        .bind(product.stock)
        .bind(product.low_stock_threshold)
        .bind(product.weight)
        .bind(Json(&product.dimensions))
        .bind(product.is_active)
        .bind(product.is_featured)
        .bind(&product.tags)
        .bind(&product.seo_title)
        .bind(&product.seo_description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| unique_violation(err, "A product with this SKU or slug already exists"))?
        .ok_or_else(|| AppError::not_found("Product not found"))
    }

    async fn delete_product(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // CART & WISHLIST
    // -------------------------------------------------------------------------
    async fn cart(&self, user_id: Uuid) -> AppResult<Vec<CartLine>> {
        // Deleted products cascade out of cart_items; inactive ones are
        // dropped here.
        sqlx::query(
            "DELETE FROM cart_items c USING products p \
             WHERE c.user_id = $1 AND c.product_id = p.id AND p.is_active = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        let rows = sqlx::query(concat!(
            "SELECT ",
            product_columns!(),
            ", quantity, added_at FROM cart_items \
             JOIN products ON products.id = cart_items.product_id \
             WHERE cart_items.user_id = $1 ORDER BY added_at"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let product = Product::from_row(row)?;
                let quantity: i32 = row.try_get("quantity")?;
                let added_at: DateTime<Utc> = row.try_get("added_at")?;
                Ok(CartLine {
                    product: ProductView::from(product),
                    quantity,
                    added_at,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(AppError::from)
    }

    async fn cart_quantity(&self, user_id: Uuid, product_id: Uuid) -> AppResult<Option<i32>> {
        Ok(sqlx::query_scalar(
            "SELECT quantity FROM cart_items WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn set_cart_quantity(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO cart_items (user_id, product_id, quantity) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_cart_item(&self, user_id: Uuid, product_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn wishlist(&self, user_id: Uuid) -> AppResult<Vec<Product>> {
        Ok(sqlx::query_as::<_, Product>(concat!(
            "SELECT ",
            product_columns!(),
            " FROM wishlist_items JOIN products ON products.id = wishlist_items.product_id \
             WHERE wishlist_items.user_id = $1 AND products.is_active = TRUE ORDER BY added_at"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn add_to_wishlist(&self, user_id: Uuid, product_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO wishlist_items (user_id, product_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, product_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(product_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn remove_from_wishlist(&self, user_id: Uuid, product_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // ORDERS
    // -------------------------------------------------------------------------
    async fn place_order(&self, draft: OrderDraft) -> AppResult<Result<Order, CheckoutRejection>> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await?;

        // Lock every referenced product row until commit
        let locked = sqlx::query_as::<_, Product>(concat!(
            "SELECT ",
            product_columns!(),
            " FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(draft.product_ids())
        .fetch_all(&mut *tx)
        .await?;
        let products: HashMap<Uuid, Product> = locked.into_iter().map(|p| (p.id, p)).collect();

        let order = match checkout::build_order(&draft, &products) {
            Ok(order) => order,
            // Dropping `tx` rolls back; nothing was written yet anyway
            Err(rejection) => return Ok(Err(rejection)),
        };

        let order = sqlx::query_as::<_, Order>(concat!(
            "INSERT INTO orders (",
            order_columns!(),
            ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, \
             $16, $17, $18, $19, $20) RETURNING ",
            order_columns!()
        ))
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.user_id)
        .bind(Json(&order.order_items))
        .bind(Json(&order.shipping_address))
        .bind(Json(&order.billing_address))
        .bind(&order.payment_method)
        .bind(order.items_price)
        .bind(order.tax_price)
        .bind(order.shipping_price)
        .bind(order.total_price)
        .bind(&order.coupon_code)
        .bind(order.is_paid)
        .bind(order.paid_at)
        .bind(Json(&order.payment_result))
        .bind(order.status.to_string())
        .bind(order.is_delivered)
        .bind(order.delivered_at)
        .bind(order.created_at)
        .bind(order.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        let deltas = checkout::stock_deltas(&order);
        for (product_id, quantity) in &deltas {
            sqlx::query(
                "UPDATE products SET stock = stock - $2, sales_count = sales_count + $2, \
                 updated_at = NOW() WHERE id = $1",
            )
            .bind(product_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(draft.user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        metrics::record_db_query("place_order", start.elapsed().as_secs_f64());

        for (product_id, quantity) in &deltas {
            if let Some(product) = products.get(product_id) {
                metrics::set_stock_level(&product.sku, product.stock - quantity);
            }
        }

        Ok(Ok(order))
    }

    async fn orders_for_user(
        &self,
        user_id: Uuid,
        page: i64,
        limit: i64,
    ) -> AppResult<(Vec<Order>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let orders = sqlx::query_as::<_, Order>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(limit)
        .bind(page_offset(page, limit))
        .fetch_all(&self.pool)
        .await?;

        Ok((orders, total))
    }

    async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        Ok(sqlx::query_as::<_, Order>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn record_payment(&self, id: Uuid, result: PaymentResult) -> AppResult<Option<Order>> {
        // The `is_paid = FALSE` guard makes concurrent confirmations settle once
        Ok(sqlx::query_as::<_, Order>(concat!(
            "UPDATE orders SET is_paid = TRUE, paid_at = NOW(), payment_result = $2, \
             status = 'processing', updated_at = NOW() \
             WHERE id = $1 AND is_paid = FALSE RETURNING ",
            order_columns!()
        ))
        .bind(id)
        .bind(Json(&result))
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn set_order_paid(&self, id: Uuid, is_paid: bool) -> AppResult<Option<Order>> {
        Ok(sqlx::query_as::<_, Order>(concat!(
            "UPDATE orders SET is_paid = $2, \
             paid_at = CASE WHEN $2 THEN NOW() ELSE NULL END, \
             status = CASE WHEN $2 THEN 'processing' ELSE 'pending' END, \
             updated_at = NOW() WHERE id = $1 RETURNING ",
            order_columns!()
        ))
        .bind(id)
        .bind(is_paid)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> AppResult<Option<Order>> {
        Ok(sqlx::query_as::<_, Order>(concat!(
            "UPDATE orders SET status = $2, \
             is_delivered = is_delivered OR $2 = 'delivered', \
             delivered_at = CASE WHEN $2 = 'delivered' THEN NOW() ELSE delivered_at END, \
             updated_at = NOW() WHERE id = $1 RETURNING ",
            order_columns!()
        ))
        .bind(id)
        .bind(status.to_string())
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn clear_order_history(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM orders WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn admin_list_orders(
        &self,
        query: &AdminOrderQuery,
        page: i64,
        limit: i64,
    ) -> AppResult<(Vec<Order>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders");
        push_admin_order_filters(&mut count, query);
        let (total,): (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        let mut select =
            QueryBuilder::<Postgres>::new(concat!("SELECT ", order_columns!(), " FROM orders"));
        push_admin_order_filters(&mut select, query);
        select
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(page_offset(page, limit));
        let orders = select.build_query_as::<Order>().fetch_all(&self.pool).await?;

        Ok((orders, total))
    }

    async fn dashboard(&self) -> AppResult<DashboardData> {
        let (total_products, total_users, total_orders, total_revenue): (i64, i64, i64, Decimal) =
            sqlx::query_as(
                "SELECT \
                 (SELECT COUNT(*) FROM products WHERE is_active = TRUE), \
                 (SELECT COUNT(*) FROM users WHERE role = 'user'), \
                 (SELECT COUNT(*) FROM orders), \
                 (SELECT COALESCE(SUM(total_price), 0) FROM orders WHERE is_paid = TRUE)",
            )
            .fetch_one(&self.pool)
            .await?;

        let recent_orders = sqlx::query_as::<_, Order>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(DASHBOARD_RECENT_ORDERS as i64)
        .fetch_all(&self.pool)
        .await?;

        let low_stock = sqlx::query_as::<_, Product>(concat!(
            "SELECT ",
            product_columns!(),
            " FROM products WHERE is_active = TRUE AND stock <= low_stock_threshold \
             ORDER BY stock ASC, id LIMIT $1"
        ))
        .bind(DASHBOARD_LOW_STOCK as i64)
        .fetch_all(&self.pool)
        .await?;

        let top_products = sqlx::query_as::<_, TopProduct>(
            "SELECT id, name, price, sales_count FROM products WHERE is_active = TRUE \
             ORDER BY sales_count DESC, id LIMIT $1",
        )
        .bind(DASHBOARD_TOP_PRODUCTS as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(DashboardData {
            counts: DashboardCounts {
                total_products,
                total_users,
                total_orders,
                total_revenue,
            },
            recent_orders,
            low_stock,
            top_products,
        })
    }

    // -------------------------------------------------------------------------
    // REFERENCE DATA
    // -------------------------------------------------------------------------
    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        Ok(sqlx::query_as::<_, Category>(concat!(
            "SELECT ",
            category_columns!(),
            " FROM categories ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_category(&self, id: Uuid) -> AppResult<Option<Category>> {
        Ok(sqlx::query_as::<_, Category>(concat!(
            "SELECT ",
            category_columns!(),
            " FROM categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn create_category(&self, category: Category) -> AppResult<Category> {
        sqlx::query_as::<_, Category>(concat!(
            "INSERT INTO categories (",
            category_columns!(),
            ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING ",
            category_columns!()
        ))
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(&category.image)
        .bind(category.is_active)
        .bind(category.created_at)
        .bind(category.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| unique_violation(err, "Category already exists"))
    }

    async fn save_category(&self, category: Category) -> AppResult<Category> {
        sqlx::query_as::<_, Category>(concat!(
            "UPDATE categories SET name = $2, slug = $3, description = $4, image = $5, \
             is_active = $6, updated_at = NOW() WHERE id = $1 RETURNING ",
            category_columns!()
        ))
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(&category.image)
        .bind(category.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| unique_violation(err, "Category already exists"))?
        .ok_or_else(|| AppError::not_found("Category not found"))
    }

    async fn delete_category(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_coupons(&self) -> AppResult<Vec<Coupon>> {
        Ok(sqlx::query_as::<_, Coupon>(concat!(
            "SELECT ",
            coupon_columns!(),
            " FROM coupons ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_coupon(&self, id: Uuid) -> AppResult<Option<Coupon>> {
        Ok(sqlx::query_as::<_, Coupon>(concat!(
            "SELECT ",
            coupon_columns!(),
            " FROM coupons WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn create_coupon(&self, coupon: Coupon) -> AppResult<Coupon> {
        sqlx::query_as::<_, Coupon>(concat!(
            "INSERT INTO coupons (",
            coupon_columns!(),
            ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, \
             $16, $17, $18, $19) RETURNING ",
            coupon_columns!()
        ))
        .bind(coupon.id)
        .bind(&coupon.code)
        .bind(&coupon.description)
        .bind(coupon.coupon_type.to_string())
        .bind(coupon.value)
        .bind(coupon.minimum_amount)
        .bind(coupon.maximum_discount)
        .bind(coupon.usage_limit)
        .bind(coupon.used_count)
        .bind(coupon.user_limit)
        .bind(&coupon.applicable_categories)
        .bind(&coupon.applicable_products)
        .bind(&coupon.exclude_products)
        .bind(coupon.is_active)
        .bind(coupon.valid_from)
        .bind(coupon.valid_until)
        .bind(coupon.created_by)
        .bind(coupon.created_at)
        .bind(coupon.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| unique_violation(err, "Coupon code already exists"))
    }

    async fn save_coupon(&self, coupon: Coupon) -> AppResult<Coupon> {
        sqlx::query_as::<_, Coupon>(concat!(
            "UPDATE coupons SET code = $2, description = $3, coupon_type = $4, value = $5, \
             minimum_amount = $6, maximum_discount = $7, usage_limit = $8, user_limit = $9, \
             applicable_categories = $10, applicable_products = $11, exclude_products = $12, \
             is_active = $13, valid_from = $14, valid_until = $15, updated_at = NOW() \
             WHERE id = $1 RETURNING ",
            coupon_columns!()
        ))
        .bind(coupon.id)
        .bind(&coupon.code)
        .bind(&coupon.description)
        .bind(coupon.coupon_type.to_string())
        .bind(coupon.value)
        .bind(coupon.minimum_amount)
        .bind(coupon.maximum_discount)
        .bind(coupon.usage_limit)
        .bind(coupon.user_limit)
        .bind(&coupon.applicable_categories)
        .bind(&coupon.applicable_products)
        .bind(&coupon.exclude_products)
        .bind(coupon.is_active)
        .bind(coupon.valid_from)
        .bind(coupon.valid_until)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| unique_violation(err, "Coupon code already exists"))?
        .ok_or_else(|| AppError::not_found("Coupon not found"))
    }

    async fn delete_coupon(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM coupons WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
