// =============================================================================
// CACHE MODULE
// =============================================================================
// Redis cache-aside for product detail payloads.
//
// The cache is optional: without REDIS_URL the service runs uncached. Redis
// failures never fail a request; they are logged and treated as a miss.
// =============================================================================

use std::time::Instant;

use redis::aio::ConnectionManager;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::metrics;

/// Product detail entries live for five minutes
pub const PRODUCT_TTL_SECS: u64 = 300;

pub fn product_key(id: Uuid) -> String {
    format!("product:{id}")
}

#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
}

impl Cache {
    /// Connect with a `ConnectionManager`, which reconnects on its own
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    pub async fn ping(&self) -> bool {
        redis::cmd("PING")
            .query_async::<_, String>(&mut self.conn.clone())
            .await
            .is_ok()
    }

    /// Cached value under `key`, or `None` on a miss, a Redis error or an
    /// entry that no longer decodes
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let start = Instant::now();
        let cached = redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut self.conn.clone())
            .await;
        metrics::record_cache_operation("get", start.elapsed().as_secs_f64());

        let raw = match cached {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(key, error = %err, "Cache read failed");
                None
            }
        };

        let value = raw.and_then(|raw| serde_json::from_str(&raw).ok());
        metrics::record_cache_lookup(value.is_some());
        value
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(key, error = %err, "Cache payload did not serialize");
                return;
            }
        };

        let start = Instant::now();
        let result = redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_secs)
            .arg(payload)
            .query_async::<_, ()>(&mut self.conn.clone())
            .await;
        metrics::record_cache_operation("set", start.elapsed().as_secs_f64());

        if let Err(err) = result {
            tracing::warn!(key, error = %err, "Cache write failed");
        }
    }

    pub async fn delete(&self, key: &str) {
        let start = Instant::now();
        let result = redis::cmd("DEL")
            .arg(key)
            .query_async::<_, ()>(&mut self.conn.clone())
            .await;
        metrics::record_cache_operation("delete", start.elapsed().as_secs_f64());

        if let Err(err) = result {
            tracing::warn!(key, error = %err, "Cache invalidation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_key() {
        let id = Uuid::nil();
        assert_eq!(
            product_key(id),
            "product:00000000-0000-0000-0000-000000000000"
        );
    }
}
