// =============================================================================
// PAYMENTS MODULE
// =============================================================================
// One synchronous charge against a Stripe-compatible PaymentIntents API.
//
// Handlers only see `dyn PaymentGateway`; `StripeGateway` is the production
// implementation and tests plug in a fake. Without STRIPE_SECRET_KEY the
// service starts with no gateway and payment requests answer 503.
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;

use crate::error::{AppError, AppResult};

pub const CURRENCY: &str = "usd";

/// A confirmed (or refused) charge as reported by the processor
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
}

impl PaymentIntent {
    pub fn succeeded(&self) -> bool {
        self.status == "succeeded"
    }
}

/// What to charge
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub amount_cents: i64,
    pub payment_method_id: String,
    /// Where the processor sends the shopper after an extra auth step
    pub return_url: String,
    /// Repeats with the same key return the first intent instead of
    /// charging again
    pub idempotency_key: String,
}

impl ChargeRequest {
    /// One key per order and card, so a retry with another card is a new
    /// charge while duplicate confirmations collapse into one.
    pub fn idempotency_key_for(order_id: uuid::Uuid, payment_method_id: &str) -> String {
        format!("order-{order_id}-{payment_method_id}")
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create and confirm a payment intent in one call
    async fn charge(&self, request: ChargeRequest) -> AppResult<PaymentIntent>;
}

/// Whole cents, halves away from zero
pub fn amount_in_cents(total: Decimal) -> i64 {
    (total * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

// =============================================================================
// STRIPE
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(api_base: &str, secret_key: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn charge(&self, request: ChargeRequest) -> AppResult<PaymentIntent> {
        let amount = request.amount_cents.to_string();
        let form = [
            ("amount", amount.as_str()),
            ("currency", CURRENCY),
            ("payment_method", request.payment_method_id.as_str()),
            ("confirmation_method", "manual"),
            ("confirm", "true"),
            ("return_url", request.return_url.as_str()),
        ];

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&form)
            .send()
            .await
            .map_err(|err| AppError::PaymentGateway(format!("request failed: {err}")))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<PaymentIntent>()
                .await
                .map_err(|err| AppError::PaymentGateway(format!("unreadable response: {err}")));
        }

        // Card errors come back as 402 with a JSON body; anything else is an
        // outage or a configuration problem.
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<StripeErrorBody>(&body)
            .ok()
            .map(|b| {
                format!(
                    "{} ({})",
                    b.error.message.unwrap_or_default(),
                    b.error.code.unwrap_or_default()
                )
            })
            .unwrap_or(body);

        // Another request with the same key is still in flight
        if status == reqwest::StatusCode::CONFLICT {
            tracing::warn!(idempotency_key = %request.idempotency_key, detail = %detail, "Concurrent charge for the same order");
            return Err(AppError::bad_request("Payment is already being processed"));
        }

        if status == reqwest::StatusCode::PAYMENT_REQUIRED {
            tracing::info!(status = status.as_u16(), detail = %detail, "Charge declined");
            return Ok(PaymentIntent {
                id: String::new(),
                status: "requires_payment_method".to_string(),
            });
        }

        Err(AppError::PaymentGateway(format!("{status}: {detail}")))
    }
}
