// =============================================================================
// PRODUCT MODELS
// =============================================================================
// Catalogue entries, their reviews, and the listing/query shapes.
//
// Embedded documents (images, specifications, dimensions) are stored as JSONB
// and decoded with `#[sqlx(json)]`. The derived flags `isLowStock`, `inStock`
// and `discountPercentage` are never stored; `ProductView` computes them when
// a product is serialized.
// =============================================================================

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::RoundingStrategy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::slugify;

/// Categories a product may be filed under
pub const PRODUCT_CATEGORIES: [&str; 6] = [
    "electronics",
    "accessories",
    "clothing",
    "home",
    "sports",
    "books",
];

pub const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 10;

// =============================================================================
// EMBEDDED DOCUMENTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    pub public_id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

// =============================================================================
// PRODUCT
// =============================================================================

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub compare_price: Option<Decimal>,
    pub category: String,
    pub subcategory: String,
    pub brand: String,
    pub sku: String,
    pub slug: String,
    #[sqlx(json)]
    pub images: Vec<ProductImage>,
    #[sqlx(json)]
    pub specifications: BTreeMap<String, String>,
    pub features: Vec<String>,
    pub stock: i32,
    pub low_stock_threshold: i32,
    pub weight: Option<f64>,
    #[sqlx(json)]
    pub dimensions: Option<Dimensions>,
    pub rating: f64,
    pub num_reviews: i32,
    pub is_active: bool,
    pub is_featured: bool,
    pub tags: Vec<String>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub view_count: i32,
    pub sales_count: i32,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Stock is positive but at or under the alert threshold
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.low_stock_threshold && self.stock > 0
    }

    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// Whole-percent saving against `comparePrice`, 0 when there is none
    pub fn discount_percentage(&self) -> i64 {
        match self.compare_price {
            Some(compare) if compare > self.price && compare > Decimal::ZERO => {
                ((compare - self.price) / compare * Decimal::ONE_HUNDRED)
                    .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                    .to_i64()
                    .unwrap_or(0)
            }
            _ => 0,
        }
    }

    /// URL of the first image, used for order snapshots
    pub fn primary_image(&self) -> Option<String> {
        self.images.first().map(|image| image.url.clone())
    }

    /// Build a new product from validated input, deriving the slug.
    pub fn from_input(input: ProductInput, created_by: Option<Uuid>) -> Self {
        let now = Utc::now();
        let slug = input
            .slug
            .clone()
            .filter(|slug| !slug.trim().is_empty())
            .map(|slug| slug.trim().to_lowercase())
            .unwrap_or_else(|| product_slug(&input.name, &input.sku));

        Self {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            description: input.description,
            price: input.price,
            compare_price: input.compare_price,
            category: input.category,
            subcategory: input.subcategory,
            brand: input.brand.trim().to_string(),
            sku: input.sku.trim().to_string(),
            slug,
            images: input.images,
            specifications: input.specifications,
            features: input.features,
            stock: input.stock,
            low_stock_threshold: input.low_stock_threshold,
            weight: input.weight,
            dimensions: input.dimensions,
            rating: 0.0,
            num_reviews: 0,
            is_active: input.is_active,
            is_featured: input.is_featured,
            tags: input.tags,
            seo_title: input.seo_title,
            seo_description: input.seo_description,
            view_count: 0,
            sales_count: 0,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update. The slug is regenerated when the name changes.
    pub fn apply_update(&mut self, update: ProductUpdate) {
        let mut renamed = false;
        if let Some(name) = update.name {
            let name = name.trim().to_string();
            renamed = name != self.name;
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(price) = update.price {
            self.price = price;
        }
        if let Some(compare_price) = update.compare_price {
            self.compare_price = Some(compare_price);
        }
        if let Some(category) = update.category {
            self.category = category;
        }
        if let Some(subcategory) = update.subcategory {
            self.subcategory = subcategory;
        }
        if let Some(brand) = update.brand {
            self.brand = brand.trim().to_string();
        }
        if let Some(sku) = update.sku {
            self.sku = sku.trim().to_string();
        }
        if let Some(images) = update.images {
            self.images = images;
        }
        if let Some(specifications) = update.specifications {
            self.specifications = specifications;
        }
        if let Some(features) = update.features {
            self.features = features;
        }
        if let Some(stock) = update.stock {
            self.stock = stock;
        }
        if let Some(threshold) = update.low_stock_threshold {
            self.low_stock_threshold = threshold;
        }
        if let Some(weight) = update.weight {
            self.weight = Some(weight);
        }
        if let Some(dimensions) = update.dimensions {
            self.dimensions = Some(dimensions);
        }
        if let Some(is_active) = update.is_active {
            self.is_active = is_active;
        }
        if let Some(is_featured) = update.is_featured {
            self.is_featured = is_featured;
        }
        if let Some(tags) = update.tags {
            self.tags = tags;
        }
        if let Some(seo_title) = update.seo_title {
            self.seo_title = Some(seo_title);
        }
        if let Some(seo_description) = update.seo_description {
            self.seo_description = Some(seo_description);
        }

        if renamed || self.slug.is_empty() {
            self.slug = product_slug(&self.name, &self.sku);
        }
        self.updated_at = Utc::now();
    }
}

/// `{name-slug}-{sku}`, with `product` standing in for an unusable name
pub fn product_slug(name: &str, sku: &str) -> String {
    let mut base = slugify(name);
    if base.is_empty() {
        base = "product".to_string();
    }
    format!("{base}-{}", sku.trim().to_lowercase())
}

/// Mean rating rounded to one decimal, plus the review count
pub fn rating_summary(ratings: &[i32]) -> (f64, i32) {
    if ratings.is_empty() {
        return (0.0, 0);
    }
    let total: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    let count = ratings.len() as f64;
    let mean = total as f64 / count;
    ((mean * 10.0).round() / 10.0, ratings.len() as i32)
}

// -----------------------------------------------------------------------------
// SERIALIZED VIEW
// -----------------------------------------------------------------------------

/// A product plus its derived flags, as returned by the API
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub is_low_stock: bool,
    pub in_stock: bool,
    pub discount_percentage: i64,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        Self {
            is_low_stock: product.is_low_stock(),
            in_stock: product.in_stock(),
            discount_percentage: product.discount_percentage(),
            product,
        }
    }
}

pub fn views(products: Vec<Product>) -> Vec<ProductView> {
    products.into_iter().map(ProductView::from).collect()
}

/// Product page payload: the product with its reviews
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: ProductView,
    pub reviews: Vec<Review>,
}

// =============================================================================
// REVIEWS
// =============================================================================

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub product_id: Uuid,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub user_name: String,
    pub rating: i32,
    pub comment: String,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,

    #[validate(length(min = 1, max = 500, message = "Review cannot exceed 500 characters"))]
    pub comment: String,
}

/// A validated review ready to be stored
#[derive(Debug, Clone)]
pub struct NewReview {
    pub user_id: Uuid,
    pub user_name: String,
    pub rating: i32,
    pub comment: String,
}

impl NewReview {
    pub fn into_review(self, product_id: Uuid) -> Review {
        Review {
            id: Uuid::new_v4(),
            product_id,
            user_id: self.user_id,
            user_name: self.user_name,
            rating: self.rating,
            comment: self.comment,
            verified: false,
            created_at: Utc::now(),
        }
    }
}

/// Why a review was not stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewRejection {
    ProductNotFound,
    AlreadyReviewed,
}

// =============================================================================
// WRITE INPUTS
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_low_stock_threshold() -> i32 {
    DEFAULT_LOW_STOCK_THRESHOLD
}

fn validate_category(category: &str) -> Result<(), ValidationError> {
    if PRODUCT_CATEGORIES.contains(&category) {
        Ok(())
    } else {
        let mut error = ValidationError::new("category");
        error.message = Some(format!("`{category}` is not a valid product category").into());
        Err(error)
    }
}

fn validate_money(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        let mut error = ValidationError::new("money");
        error.message = Some("Price cannot be negative".into());
        Err(error)
    } else {
        Ok(())
    }
}

/// `POST /api/admin/products` body
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    #[validate(length(min = 1, max = 200, message = "Product name is required (max 200 characters)"))]
    pub name: String,

    #[validate(length(min = 1, max = 2000, message = "Product description is required (max 2000 characters)"))]
    pub description: String,

    #[validate(custom = "validate_money")]
    pub price: Decimal,

    #[validate(custom = "validate_money")]
    pub compare_price: Option<Decimal>,

    #[validate(custom = "validate_category")]
    pub category: String,

    #[validate(length(min = 1, message = "Subcategory is required"))]
    pub subcategory: String,

    #[validate(length(min = 1, message = "Brand is required"))]
    pub brand: String,

    #[validate(length(min = 1, message = "SKU is required"))]
    pub sku: String,

    #[serde(default)]
    pub images: Vec<ProductImage>,

    #[serde(default)]
    pub specifications: BTreeMap<String, String>,

    #[serde(default)]
    pub features: Vec<String>,

    #[serde(default)]
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,

    #[serde(default = "default_low_stock_threshold")]
    #[validate(range(min = 0))]
    pub low_stock_threshold: i32,

    pub weight: Option<f64>,

    pub dimensions: Option<Dimensions>,

    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(default)]
    pub is_featured: bool,

    #[serde(default)]
    pub tags: Vec<String>,

    pub seo_title: Option<String>,

    pub seo_description: Option<String>,

    pub slug: Option<String>,
}

/// `PUT /api/admin/products/:id` body; only present fields change
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    #[validate(length(min = 1, max = 200, message = "Product name cannot exceed 200 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 2000, message = "Description cannot exceed 2000 characters"))]
    pub description: Option<String>,

    #[validate(custom = "validate_money")]
    pub price: Option<Decimal>,

    #[validate(custom = "validate_money")]
    pub compare_price: Option<Decimal>,

    #[validate(custom = "validate_category")]
    pub category: Option<String>,

    #[validate(length(min = 1))]
    pub subcategory: Option<String>,

    #[validate(length(min = 1))]
    pub brand: Option<String>,

    #[validate(length(min = 1))]
    pub sku: Option<String>,

    pub images: Option<Vec<ProductImage>>,

    pub specifications: Option<BTreeMap<String, String>>,

    pub features: Option<Vec<String>>,

    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: Option<i32>,

    #[validate(range(min = 0))]
    pub low_stock_threshold: Option<i32>,

    pub weight: Option<f64>,

    pub dimensions: Option<Dimensions>,

    pub is_active: Option<bool>,

    pub is_featured: Option<bool>,

    pub tags: Option<Vec<String>>,

    pub seo_title: Option<String>,

    pub seo_description: Option<String>,
}

// =============================================================================
// QUERIES
// =============================================================================

/// Sort orders accepted by `GET /api/products?sort=`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProductSort {
    PriceAsc,
    PriceDesc,
    Rating,
    #[default]
    Newest,
    Popular,
}

impl ProductSort {
    /// Unknown values fall back to newest first
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("price_asc") => Self::PriceAsc,
            Some("price_desc") => Self::PriceDesc,
            Some("rating") => Self::Rating,
            Some("popular") => Self::Popular,
            _ => Self::Newest,
        }
    }
}

/// Storefront listing filters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub brand: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub rating: Option<f64>,
    pub in_stock: Option<String>,
    pub sort: Option<String>,
}

impl ProductQuery {
    pub fn search_term(&self) -> Option<&str> {
        non_empty(self.search.as_deref())
    }

    /// `category=all` means no category filter
    pub fn category_filter(&self) -> Option<&str> {
        non_empty(self.category.as_deref()).filter(|c| *c != "all")
    }

    pub fn subcategory_filter(&self) -> Option<&str> {
        non_empty(self.subcategory.as_deref())
    }

    pub fn brand_filter(&self) -> Option<&str> {
        non_empty(self.brand.as_deref())
    }

    pub fn in_stock_only(&self) -> bool {
        self.in_stock.as_deref() == Some("true")
    }

    pub fn sort_order(&self) -> ProductSort {
        ProductSort::parse(self.sort.as_deref())
    }
}

/// Back-office listing filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminProductQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub category: Option<String>,
    /// `active`, `inactive` or `all`
    pub status: Option<String>,
}

impl AdminProductQuery {
    pub fn search_term(&self) -> Option<&str> {
        non_empty(self.search.as_deref())
    }

    pub fn category_filter(&self) -> Option<&str> {
        non_empty(self.category.as_deref()).filter(|c| *c != "all")
    }

    pub fn active_filter(&self) -> Option<bool> {
        match non_empty(self.status.as_deref()) {
            None | Some("all") => None,
            Some(status) => Some(status == "active"),
        }
    }
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// RESPONSES
// =============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PriceRange {
    pub min: Decimal,
    pub max: Decimal,
}

impl Default for PriceRange {
    fn default() -> Self {
        Self {
            min: Decimal::ZERO,
            max: Decimal::new(1000, 0),
        }
    }
}

/// Facets offered next to the storefront listing
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFilters {
    pub categories: Vec<String>,
    pub brands: Vec<String>,
    pub price_range: PriceRange,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchSuggestion {
    pub id: Uuid,
    pub text: String,
    pub category: String,
    pub brand: String,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionParams {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareRequest {
    #[serde(default)]
    pub product_ids: Vec<Uuid>,
}

// =============================================================================
// CART & WISHLIST
// =============================================================================

/// A cart line with its product attached
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product: ProductView,
    pub quantity: i32,
    pub added_at: DateTime<Utc>,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartAddRequest {
    pub product_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartUpdateRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistRequest {
    pub product_id: Uuid,
}
