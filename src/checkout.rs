// =============================================================================
// CHECKOUT MODULE
// =============================================================================
// Turns a checkout request into an order snapshot.
//
// Both store backends call `build_order` after loading (and, in PostgreSQL,
// locking) every referenced product, then apply `stock_deltas` in the same
// transaction. Nothing here touches storage.
//
// RULES:
// - every line must reference an existing, active product
// - quantities are >= 1; repeated lines for a product are summed before the
//   stock check
// - the client price must equal the stored price
// - totals are computed here; client-sent totals are never trusted
// =============================================================================

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    generate_order_number, Address, Order, OrderItem, OrderLineRequest, OrderStatus, Product,
};

/// Tax and shipping applied at checkout
#[derive(Debug, Clone, Copy)]
pub struct Pricing {
    pub tax_rate: Decimal,
    pub shipping_flat: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub items_price: Decimal,
    pub tax_price: Decimal,
    pub shipping_price: Decimal,
    pub total_price: Decimal,
}

/// Everything a store needs to place an order
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub user_id: Uuid,
    pub lines: Vec<OrderLineRequest>,
    pub shipping_address: Address,
    pub billing_address: Option<Address>,
    pub payment_method: String,
    pub coupon_code: Option<String>,
    pub pricing: Pricing,
}

impl OrderDraft {
    /// Distinct product ids in ascending order.
    ///
    /// Rows are locked in this order so concurrent checkouts cannot deadlock.
    pub fn product_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.lines.iter().map(|line| line.product).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Why a checkout was refused; nothing is written when one is returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutRejection {
    NoItems,
    InvalidQuantity(String),
    ProductNotFound(String),
    InsufficientStock(String),
    PriceChanged(String),
}

impl CheckoutRejection {
    /// Metric label
    pub fn reason(&self) -> &'static str {
        match self {
            CheckoutRejection::NoItems => "no_items",
            CheckoutRejection::InvalidQuantity(_) => "invalid_quantity",
            CheckoutRejection::ProductNotFound(_) => "product_not_found",
            CheckoutRejection::InsufficientStock(_) => "insufficient_stock",
            CheckoutRejection::PriceChanged(_) => "price_changed",
        }
    }
}

impl From<CheckoutRejection> for AppError {
    fn from(rejection: CheckoutRejection) -> Self {
        match rejection {
            CheckoutRejection::NoItems => AppError::bad_request("No order items provided"),
            CheckoutRejection::InvalidQuantity(name) => {
                AppError::bad_request(format!("Invalid quantity for {name}"))
            }
            CheckoutRejection::ProductNotFound(name) => {
                AppError::not_found(format!("Product {name} not found"))
            }
            CheckoutRejection::InsufficientStock(name) => {
                AppError::bad_request(format!("Insufficient stock for {name}"))
            }
            CheckoutRejection::PriceChanged(name) => {
                AppError::bad_request(format!("Price has changed for {name}"))
            }
        }
    }
}

/// Round to cents, halves away from zero
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn compute_totals(items: &[OrderItem], pricing: Pricing) -> Totals {
    let items_price = round_money(
        items
            .iter()
            .map(|item| item.price * Decimal::from(item.quantity))
            .sum(),
    );
    let tax_price = round_money(items_price * pricing.tax_rate);
    let shipping_price = round_money(pricing.shipping_flat);
    Totals {
        items_price,
        tax_price,
        shipping_price,
        total_price: items_price + tax_price + shipping_price,
    }
}

/// Validate `draft` against the current product rows and build the order.
///
/// `products` holds whatever rows were found for `draft.product_ids()`;
/// missing or inactive ones reject the checkout.
pub fn build_order(
    draft: &OrderDraft,
    products: &HashMap<Uuid, Product>,
) -> Result<Order, CheckoutRejection> {
    if draft.lines.is_empty() {
        return Err(CheckoutRejection::NoItems);
    }

    let mut requested: BTreeMap<Uuid, i32> = BTreeMap::new();
    let mut items = Vec::with_capacity(draft.lines.len());

    for line in &draft.lines {
        let label = line.name.clone().unwrap_or_else(|| line.product.to_string());

        let product = products
            .get(&line.product)
            .filter(|product| product.is_active)
            .ok_or_else(|| CheckoutRejection::ProductNotFound(label.clone()))?;

        if line.quantity < 1 {
            return Err(CheckoutRejection::InvalidQuantity(product.name.clone()));
        }

        let total = requested.entry(product.id).or_insert(0);
        *total = total.saturating_add(line.quantity);
        if *total > product.stock {
            return Err(CheckoutRejection::InsufficientStock(product.name.clone()));
        }

        if line.price != product.price {
            return Err(CheckoutRejection::PriceChanged(product.name.clone()));
        }

        items.push(OrderItem {
            product: product.id,
            name: product.name.clone(),
            image: product.primary_image(),
            price: product.price,
            quantity: line.quantity,
        });
    }

    let totals = compute_totals(&items, draft.pricing);
    let now = Utc::now();

    Ok(Order {
        id: Uuid::new_v4(),
        order_number: generate_order_number(),
        user_id: draft.user_id,
        order_items: items,
        shipping_address: draft.shipping_address.clone(),
        billing_address: draft.billing_address.clone(),
        payment_method: draft.payment_method.clone(),
        items_price: totals.items_price,
        tax_price: totals.tax_price,
        shipping_price: totals.shipping_price,
        total_price: totals.total_price,
        coupon_code: draft
            .coupon_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_uppercase),
        is_paid: false,
        paid_at: None,
        payment_result: None,
        status: OrderStatus::Pending,
        is_delivered: false,
        delivered_at: None,
        created_at: now,
        updated_at: now,
    })
}

/// Quantity to take off each product's stock for a placed order
pub fn stock_deltas(order: &Order) -> BTreeMap<Uuid, i32> {
    let mut deltas = BTreeMap::new();
    for item in &order.order_items {
        *deltas.entry(item.product).or_insert(0) += item.quantity;
    }
    deltas
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::product::tests::sample_input;
    use rust_decimal_macros::dec;

    pub(crate) fn address() -> Address {
        Address {
            full_name: Some("Ada Lovelace".into()),
            street: "1 Analytical Way".into(),
            city: "London".into(),
            state: None,
            zip_code: "N1".into(),
            country: "UK".into(),
            phone: None,
        }
    }

    fn pricing() -> Pricing {
        Pricing {
            tax_rate: dec!(0.08),
            shipping_flat: dec!(10),
        }
    }

    fn draft(lines: Vec<OrderLineRequest>) -> OrderDraft {
        OrderDraft {
            user_id: Uuid::new_v4(),
            lines,
            shipping_address: address(),
            billing_address: None,
            payment_method: "card".into(),
            coupon_code: Some(" save10 ".into()),
            pricing: pricing(),
        }
    }

    fn line(product: &Product, quantity: i32, price: Decimal) -> OrderLineRequest {
        OrderLineRequest {
            product: product.id,
            name: Some(product.name.clone()),
            quantity,
            price,
        }
    }

    fn catalogue(products: &[&Product]) -> HashMap<Uuid, Product> {
        products.iter().map(|p| (p.id, (*p).clone())).collect()
    }

    #[test]
    fn test_totals_are_computed_server_side() {
        let mouse = Product::from_input(sample_input("Mouse", "M-1", dec!(19.99), 10), None);
        let cable = Product::from_input(sample_input("Cable", "C-1", dec!(5.00), 10), None);

        let order = build_order(
            &draft(vec![line(&mouse, 2, dec!(19.99)), line(&cable, 1, dec!(5))]),
            &catalogue(&[&mouse, &cable]),
        )
        .unwrap();

        assert_eq!(order.items_price, dec!(44.98));
        assert_eq!(order.tax_price, dec!(3.60));
        assert_eq!(order.shipping_price, dec!(10.00));
        assert_eq!(order.total_price, dec!(58.58));
        assert_eq!(order.coupon_code.as_deref(), Some("SAVE10"));
        assert_eq!(order.order_items[0].image, mouse.primary_image());
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_rejections() {
        let mouse = Product::from_input(sample_input("Mouse", "M-1", dec!(10), 1), None);
        let products = catalogue(&[&mouse]);

        assert_eq!(
            build_order(&draft(vec![]), &products).unwrap_err(),
            CheckoutRejection::NoItems
        );
        assert_eq!(
            build_order(&draft(vec![line(&mouse, 2, dec!(10))]), &products).unwrap_err(),
            CheckoutRejection::InsufficientStock("Mouse".into())
        );
        assert_eq!(
            build_order(&draft(vec![line(&mouse, 1, dec!(9.5))]), &products).unwrap_err(),
            CheckoutRejection::PriceChanged("Mouse".into())
        );
        assert_eq!(
            build_order(&draft(vec![line(&mouse, 0, dec!(10))]), &products).unwrap_err(),
            CheckoutRejection::InvalidQuantity("Mouse".into())
        );

        let ghost = OrderLineRequest {
            product: Uuid::new_v4(),
            name: Some("Ghost".into()),
            quantity: 1,
            price: dec!(1),
        };
        assert_eq!(
            build_order(&draft(vec![ghost]), &products).unwrap_err(),
            CheckoutRejection::ProductNotFound("Ghost".into())
        );

        let mut hidden = mouse.clone();
        hidden.is_active = false;
        assert!(matches!(
            build_order(&draft(vec![line(&hidden, 1, dec!(10))]), &catalogue(&[&hidden])),
            Err(CheckoutRejection::ProductNotFound(_))
        ));
    }

    #[test]
    fn test_repeated_lines_are_summed_for_stock() {
        let mouse = Product::from_input(sample_input("Mouse", "M-1", dec!(10), 3), None);
        let products = catalogue(&[&mouse]);

        let err = build_order(
            &draft(vec![line(&mouse, 2, dec!(10)), line(&mouse, 2, dec!(10))]),
            &products,
        )
        .unwrap_err();
        assert_eq!(err, CheckoutRejection::InsufficientStock("Mouse".into()));

        let order = build_order(
            &draft(vec![line(&mouse, 2, dec!(10)), line(&mouse, 1, dec!(10))]),
            &products,
        )
        .unwrap();
        assert_eq!(stock_deltas(&order).get(&mouse.id), Some(&3));
    }

    #[test]
    fn test_rejection_messages() {
        let err: AppError = CheckoutRejection::InsufficientStock("Mouse".into()).into();
        assert_eq!(err.client_message(), "Insufficient stock for Mouse");

        let err: AppError = CheckoutRejection::ProductNotFound("Ghost".into()).into();
        assert_eq!(err.status(), axum::http::StatusCode::NOT_FOUND);
        assert_eq!(err.client_message(), "Product Ghost not found");
    }
}
