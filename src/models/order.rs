// =============================================================================
// ORDER MODELS
// =============================================================================
// An order is an immutable snapshot of what was bought (name, image, price,
// quantity per line) plus shipping, payment and fulfilment state. Line items
// and addresses are stored as JSONB; the money columns are NUMERIC.
// =============================================================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

use super::user::CustomerSummary;

/// Fulfilment status
///
/// pending -> processing -> shipped -> delivered, or cancelled.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl TryFrom<String> for OrderStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub full_name: Option<String>,
    #[validate(length(min = 1, message = "Street is required"))]
    pub street: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    pub state: Option<String>,
    #[validate(length(min = 1, message = "Zip code is required"))]
    pub zip_code: String,
    #[validate(length(min = 1, message = "Country is required"))]
    pub country: String,
    pub phone: Option<String>,
}

/// One purchased line, frozen at checkout time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    pub id: String,
    pub status: String,
    pub update_time: DateTime<Utc>,
    pub email_address: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    #[sqlx(json)]
    pub order_items: Vec<OrderItem>,
    #[sqlx(json)]
    pub shipping_address: Address,
    #[sqlx(json)]
    pub billing_address: Option<Address>,
    pub payment_method: String,
    pub items_price: Decimal,
    pub tax_price: Decimal,
    pub shipping_price: Decimal,
    pub total_price: Decimal,
    pub coupon_code: Option<String>,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    #[sqlx(json)]
    pub payment_result: Option<PaymentResult>,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Move to `status`; delivery also stamps `isDelivered`/`deliveredAt`.
    pub fn set_status(&mut self, status: OrderStatus) {
        self.status = status;
        if status == OrderStatus::Delivered {
            self.is_delivered = true;
            self.delivered_at = Some(Utc::now());
        }
        self.updated_at = Utc::now();
    }

    /// Admin override of the paid flag
    pub fn set_paid(&mut self, is_paid: bool) {
        self.is_paid = is_paid;
        if is_paid {
            self.paid_at = Some(Utc::now());
            self.status = OrderStatus::Processing;
        } else {
            self.paid_at = None;
            self.status = OrderStatus::Pending;
        }
        self.updated_at = Utc::now();
    }

    /// Record a settled charge from the payment processor
    pub fn mark_paid(&mut self, result: PaymentResult) {
        self.is_paid = true;
        self.paid_at = Some(Utc::now());
        self.payment_result = Some(result);
        self.status = OrderStatus::Processing;
        self.updated_at = Utc::now();
    }
}

/// Random hex characters after the timestamp; 40 bits per millisecond
const ORDER_NUMBER_SUFFIX_LEN: usize = 10;

/// `ORD-{base36 millis}-{10 random hex}`, upper case
pub fn generate_order_number() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(ORDER_NUMBER_SUFFIX_LEN)
        .collect();
    format!("ORD-{}-{}", to_base36(millis), suffix).to_uppercase()
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Order as returned to admins, with the purchaser attached
#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerSummary>,
}

// =============================================================================
// REQUEST BODIES
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct OrderLineRequest {
    pub product: Uuid,
    pub name: Option<String>,
    pub quantity: i32,
    pub price: Decimal,
}

/// `POST /api/orders`
///
/// Totals sent by the client are accepted for compatibility and ignored.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub order_items: Vec<OrderLineRequest>,
    #[validate]
    pub shipping_address: Address,
    #[validate]
    pub billing_address: Option<Address>,
    #[validate(length(min = 1, message = "Payment method is required"))]
    pub payment_method: String,
    pub coupon_code: Option<String>,
    pub items_price: Option<Decimal>,
    pub tax_price: Option<Decimal>,
    pub shipping_price: Option<Decimal>,
    pub total_price: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub order_id: Uuid,
    pub payment_method_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOverrideRequest {
    pub is_paid: bool,
}

/// `GET /api/admin/orders` query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminOrderQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
    pub search: Option<String>,
}

impl AdminOrderQuery {
    /// Unknown or `all` statuses mean no filter
    pub fn status_filter(&self) -> Option<OrderStatus> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }

    pub fn search_term(&self) -> Option<&str> {
        super::product::non_empty(self.search.as_deref())
    }
}

// =============================================================================
// RESPONSES
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearHistoryResponse {
    pub deleted_count: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardCounts {
    pub total_products: i64,
    pub total_users: i64,
    pub total_orders: i64,
    pub total_revenue: Decimal,
}

/// Best seller entry on the dashboard
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub sales_count: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub stats: DashboardCounts,
    pub recent_orders: Vec<OrderView>,
    pub low_stock_products: Vec<super::product::ProductView>,
    #[serde(rename = "topSellingProducts")]
    pub top_products: Vec<TopProduct>,
}
