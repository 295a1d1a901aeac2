// =============================================================================
// RATE LIMITING
// =============================================================================
// Per-IP request budgets on governor's keyed GCRA limiter.
//
// Two limiters run in the service: a general one over every /api route and
// a stricter one over /api/auth. A budget of N requests per window lets a
// client burst N requests, then refills one slot every window / N.
// Counters are per process.
// =============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::HeaderValue, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    middleware::StateInformationMiddleware,
    state::keyed::DefaultKeyedStateStore,
    Quota,
};

use crate::error::AppError;
use crate::metrics;

type KeyedLimiter = governor::RateLimiter<
    IpAddr,
    DefaultKeyedStateStore<IpAddr>,
    DefaultClock,
    StateInformationMiddleware,
>;

/// Idle client states are swept once every this many checks.
const SWEEP_EVERY: u64 = 1024;

#[derive(Clone)]
pub struct RateLimiter {
    scope: &'static str,
    max_requests: u32,
    message: &'static str,
    limiter: Arc<KeyedLimiter>,
    clock: DefaultClock,
    checks: Arc<AtomicU64>,
}

/// Outcome of counting one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

impl RateLimiter {
    pub fn new(scope: &'static str, max_requests: u32, window: Duration, message: &'static str) -> Self {
        let burst = NonZeroU32::new(max_requests).unwrap_or(NonZeroU32::MIN);
        let limiter = governor::RateLimiter::keyed(quota(burst, window))
            .with_middleware::<StateInformationMiddleware>();

        Self {
            scope,
            max_requests: burst.get(),
            message,
            limiter: Arc::new(limiter),
            clock: DefaultClock::default(),
            checks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Budget shared by every route
    pub fn general(max_requests: u32, window: Duration) -> Self {
        Self::new(
            "general",
            max_requests,
            window,
            "Too many requests from this IP, please try again later.",
        )
    }

    /// Stricter budget for the authentication routes
    pub fn auth(max_requests: u32, window: Duration) -> Self {
        Self::new(
            "auth",
            max_requests,
            window,
            "Too many authentication attempts, please try again later.",
        )
    }

    /// Count one request from `client`
    pub fn hit(&self, client: IpAddr) -> Decision {
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep();
        }

        match self.limiter.check_key(&client) {
            Ok(snapshot) => Decision::Allowed {
                remaining: snapshot.remaining_burst_capacity(),
            },
            Err(not_until) => Decision::Limited {
                retry_after: not_until.wait_time_from(self.clock.now()),
            },
        }
    }

    /// Forget clients whose budget has fully refilled
    pub fn sweep(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of clients currently tracked
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }
}

fn quota(burst: NonZeroU32, window: Duration) -> Quota {
    let period = (window / burst.get()).max(Duration::from_millis(1));
    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}

/// Client address: the first `X-Forwarded-For` hop, then `X-Real-IP`, then
/// the socket peer. Header values that are not IP addresses are ignored.
/// Requests with no usable address share one budget.
pub fn client_ip(request: &Request) -> IpAddr {
    forwarded_ip(request.headers())
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let first_hop = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|hop| hop.trim().parse::<IpAddr>().ok());

    first_hop.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<IpAddr>().ok())
    })
}

/// `axum::middleware::from_fn_with_state` entry point
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_ip(&request);

    match limiter.hit(client) {
        Decision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert("ratelimit-limit", HeaderValue::from(limiter.max_requests));
            headers.insert("ratelimit-remaining", HeaderValue::from(remaining));
            response
        }
        Decision::Limited { retry_after } => {
            metrics::record_rate_limited(limiter.scope);
            tracing::warn!(client = %client, scope = limiter.scope, "Rate limit exceeded");

            let mut response = AppError::TooManyRequests(limiter.message.to_string()).into_response();
            response
                .headers_mut()
                .insert("retry-after", HeaderValue::from(retry_after.as_secs().max(1)));
            response
        }
    }
}
