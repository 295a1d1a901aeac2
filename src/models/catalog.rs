//! Back-office reference data: categories and coupons.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::slugify;

// =============================================================================
// CATEGORIES
// =============================================================================

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn from_input(input: CategoryInput) -> Self {
        let now = Utc::now();
        let name = input.name.trim().to_string();
        Self {
            id: Uuid::new_v4(),
            slug: slugify(&name),
            name,
            description: input.description,
            image: input.image,
            is_active: input.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the editable fields, keeping identity and creation time
    pub fn apply(&mut self, input: CategoryInput) {
        self.name = input.name.trim().to_string();
        self.slug = slugify(&self.name);
        self.description = input.description;
        self.image = input.image;
        if let Some(is_active) = input.is_active {
            self.is_active = is_active;
        }
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 100, message = "Category name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub is_active: Option<bool>,
}

// =============================================================================
// COUPONS
// =============================================================================

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CouponType {
    #[default]
    Percentage,
    Fixed,
}

impl TryFrom<String> for CouponType {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    #[sqlx(rename = "coupon_type", try_from = "String")]
    pub coupon_type: CouponType,
    pub value: Decimal,
    pub minimum_amount: Decimal,
    pub maximum_discount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub user_limit: i32,
    pub applicable_categories: Vec<String>,
    pub applicable_products: Vec<Uuid>,
    pub exclude_products: Vec<Uuid>,
    pub is_active: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    /// Active, inside its validity window and under its usage limit
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.valid_from <= now
            && self.valid_until >= now
            && self.usage_limit.map_or(true, |limit| self.used_count < limit)
    }

    pub fn from_input(input: CouponInput, created_by: Option<Uuid>) -> Self {
        let now = Utc::now();
        let mut coupon = Self {
            id: Uuid::new_v4(),
            code: String::new(),
            description: None,
            coupon_type: CouponType::default(),
            value: Decimal::ZERO,
            minimum_amount: Decimal::ZERO,
            maximum_discount: None,
            usage_limit: None,
            used_count: 0,
            user_limit: 1,
            applicable_categories: Vec::new(),
            applicable_products: Vec::new(),
            exclude_products: Vec::new(),
            is_active: true,
            valid_from: input.valid_from,
            valid_until: input.valid_until,
            created_by,
            created_at: now,
            updated_at: now,
        };
        coupon.apply(input);
        coupon
    }

    /// Replace the editable fields; usage counters are kept
    pub fn apply(&mut self, input: CouponInput) {
        self.code = normalize_code(&input.code);
        self.description = input.description;
        self.coupon_type = input.coupon_type;
        self.value = input.value;
        self.minimum_amount = input.minimum_amount.unwrap_or(Decimal::ZERO);
        self.maximum_discount = input.maximum_discount;
        self.usage_limit = input.usage_limit;
        self.user_limit = input.user_limit.unwrap_or(1);
        self.applicable_categories = input.applicable_categories;
        self.applicable_products = input.applicable_products;
        self.exclude_products = input.exclude_products;
        self.is_active = input.is_active.unwrap_or(true);
        self.valid_from = input.valid_from;
        self.valid_until = input.valid_until;
        self.updated_at = Utc::now();
    }
}

/// Coupon codes are stored trimmed and upper case
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Coupon with its computed validity flag
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponView {
    #[serde(flatten)]
    pub coupon: Coupon,
    pub is_valid: bool,
}

impl From<Coupon> for CouponView {
    fn from(coupon: Coupon) -> Self {
        Self {
            is_valid: coupon.is_valid_at(Utc::now()),
            coupon,
        }
    }
}

fn validate_window(input: &CouponInput) -> Result<(), ValidationError> {
    if input.valid_until < input.valid_from {
        let mut error = ValidationError::new("valid_until");
        error.message = Some("validUntil must not be before validFrom".into());
        return Err(error);
    }
    Ok(())
}

fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        let mut error = ValidationError::new("value");
        error.message = Some("Coupon value cannot be negative".into());
        return Err(error);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_window", skip_on_field_errors = false))]
pub struct CouponInput {
    #[validate(length(min = 1, max = 50, message = "Coupon code is required"))]
    pub code: String,
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub coupon_type: CouponType,
    #[validate(custom = "validate_non_negative")]
    pub value: Decimal,
    #[validate(custom = "validate_non_negative")]
    pub minimum_amount: Option<Decimal>,
    pub maximum_discount: Option<Decimal>,
    #[validate(range(min = 0))]
    pub usage_limit: Option<i32>,
    #[validate(range(min = 1))]
    pub user_limit: Option<i32>,
    #[serde(default)]
    pub applicable_categories: Vec<String>,
    #[serde(default)]
    pub applicable_products: Vec<Uuid>,
    #[serde(default)]
    pub exclude_products: Vec<Uuid>,
    pub is_active: Option<bool>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}
