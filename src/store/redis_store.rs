//! Redis-backed approval store, shared by every gatekeeper replica.

use super::{decode_record, encode_record, ApprovalStore};
use crate::config::StoreConfig;
use crate::error::StoreError;
use async_trait::async_trait;
use deadpool_redis::{Config as RedisPoolConfig, Pool, PoolConfig, Runtime};
use redis::AsyncCommands;
use std::time::Duration;
use tracing::debug;

/// Approval records stored as `SET <prefix><ip> true|false EX <ttl>`.
pub struct RedisApprovalStore {
    pool: Pool,
    key_prefix: String,
}

impl RedisApprovalStore {
    /// Build a connection pool from the store configuration.
    ///
    /// Connections are opened lazily, so an unreachable server surfaces on
    /// the first lookup rather than here.
    pub fn new(config: &StoreConfig) -> anyhow::Result<Self> {
        let url = config
            .redis_url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("redis_url is required for the redis store"))?;

        let cfg = RedisPoolConfig {
            url: Some(url),
            connection: None,
            pool: Some(PoolConfig::new(config.redis_pool_size)),
        };
        let pool = cfg.create_pool(Some(Runtime::Tokio1))?;

        Ok(Self {
            pool,
            key_prefix: config.key_prefix.clone(),
        })
    }

    fn key(&self, ip: &str) -> String {
        format!("{}{}", self.key_prefix, ip)
    }
}

#[async_trait]
impl ApprovalStore for RedisApprovalStore {
    async fn lookup(&self, ip: &str) -> Result<Option<bool>, StoreError> {
        let mut conn = self.pool.get().await?;
        let raw: Option<String> = conn.get(self.key(ip)).await?;

        match raw {
            Some(raw) => decode_record(&raw),
            None => Ok(None),
        }
    }

    async fn record(&self, ip: &str, approved: bool, ttl: Duration) -> Result<(), StoreError> {
        let key = self.key(ip);
        // Redis rejects EX 0
        let seconds = ttl.as_secs().max(1);

        let mut conn = self.pool.get().await?;
        let _: () = redis::cmd("SET")
            .arg(&key)
            .arg(encode_record(approved))
            .arg("EX")
            .arg(seconds)
            .query_async(&mut conn)
            .await?;

        debug!(key = %key, approved, ttl_seconds = seconds, "Approval record written");
        Ok(())
    }

    fn name(&self) -> &str {
        "redis"
    }
}
