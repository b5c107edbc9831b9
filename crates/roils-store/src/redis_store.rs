//! Redis-backed record store.
//!
//! Each incident is a Redis hash under `event:<id>`; generated fields are
//! hash fields named `<model>:LLM Summary` / `<model>:LLM Evaluation`.
//! Iteration uses `SCAN ... MATCH ... COUNT`, so the key space is never
//! materialized in one reply.

use std::collections::BTreeMap;
use std::time::Instant;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info, instrument, trace};

use roils_core::{Error, RecordStore, Result, ScanPage, StoreConfig};

/// Record store backed by a Redis connection manager.
///
/// The connection manager is cheap to clone; every command runs on a clone,
/// so the store can be shared by reference across stages.
#[derive(Clone)]
pub struct RedisRecordStore {
    connection: ConnectionManager,
    /// Redacted URL for logs.
    label: String,
}

impl RedisRecordStore {
    /// Connect and verify with `PING`.
    ///
    /// Any failure here is a fatal [`Error::Connection`]; the pipeline does
    /// not retry an unreachable store.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let label = config.redacted_url();
        let start = Instant::now();

        let client = redis::Client::open(config.url().as_str())
            .map_err(|e| Error::Connection(format!("Invalid Redis URL {}: {}", label, e)))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| Error::Connection(format!("Failed to connect to {}: {}", label, e)))?;

        let store = Self { connection, label };
        store
            .ping()
            .await
            .map_err(|e| Error::Connection(format!("{} did not answer PING: {}", store.label, e)))?;

        info!(
            subsystem = "store",
            component = "redis",
            url = %store.label,
            duration_ms = start.elapsed().as_millis() as u64,
            "Connected to record store"
        );
        Ok(store)
    }

    /// Redacted connection URL.
    pub fn label(&self) -> &str {
        &self.label
    }

    fn conn(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

#[async_trait]
impl RecordStore for RedisRecordStore {
    async fn get(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.conn();
        Ok(conn.hget(key, field).await?)
    }

    #[instrument(skip(self, value), fields(subsystem = "store", component = "redis", op = "hset", record_key = %key, field = %field, response_len = value.len()))]
    async fn set(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut conn = self.conn();
        conn.hset::<_, _, _, ()>(key, field, value).await?;
        debug!("Field written");
        Ok(())
    }

    async fn exists(&self, key: &str, field: &str) -> Result<bool> {
        let mut conn = self.conn();
        Ok(conn.hexists(key, field).await?)
    }

    async fn delete_field(&self, key: &str, field: &str) -> Result<bool> {
        let mut conn = self.conn();
        let removed: i64 = conn.hdel(key, field).await?;
        Ok(removed > 0)
    }

    async fn fields(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn();
        Ok(conn.hkeys(key).await?)
    }

    async fn get_all(&self, key: &str) -> Result<Vec<(String, String)>> {
        let mut conn = self.conn();
        let all: BTreeMap<String, String> = conn.hgetall(key).await?;
        Ok(all.into_iter().collect())
    }

    async fn scan_page(&self, pattern: &str, cursor: u64, count: usize) -> Result<ScanPage> {
        let mut conn = self.conn();
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count.max(1))
            .query_async(&mut conn)
            .await?;
        trace!(
            subsystem = "store",
            component = "redis",
            cursor,
            next_cursor = next,
            result_count = keys.len(),
            "SCAN page"
        );
        Ok(ScanPage { cursor: next, keys })
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(Error::Store(format!("unexpected PING reply: {}", pong)))
        }
    }
}

/// Integration tests that require a live Redis server.
/// Run with: RUN_EXTERNAL_TESTS=1 cargo test --package roils-store --features integration
#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use super::*;

    fn should_run_external_tests() -> bool {
        std::env::var("RUN_EXTERNAL_TESTS")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false)
    }

    fn test_config() -> StoreConfig {
        StoreConfig {
            host: std::env::var("ROILS_REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            db: 15,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_hash_field_roundtrip_and_scan() {
        if !should_run_external_tests() {
            println!("Skipping - set RUN_EXTERNAL_TESTS=1 to enable Redis tests");
            return;
        }
        let store = RedisRecordStore::connect(&test_config())
            .await
            .expect("redis reachable");

        let key = "event:it-roundtrip";
        store.set(key, "Narrative", "Wrong dose delivered.").await.unwrap();
        store.set(key, "mistral:LLM Summary", "Dose error.").await.unwrap();

        assert!(store.exists(key, "Narrative").await.unwrap());
        assert_eq!(
            store.get(key, "mistral:LLM Summary").await.unwrap().as_deref(),
            Some("Dose error.")
        );
        let keys = store.list_keys("event:it-*", 10).await.unwrap();
        assert!(keys.contains(&key.to_string()));

        assert!(store.delete_field(key, "mistral:LLM Summary").await.unwrap());
        assert!(!store.delete_field(key, "mistral:LLM Summary").await.unwrap());
        store.delete_field(key, "Narrative").await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_unreachable_is_connection_error() {
        if !should_run_external_tests() {
            return;
        }
        let config = StoreConfig {
            port: 1,
            ..test_config()
        };
        match RedisRecordStore::connect(&config).await {
            Err(Error::Connection(_)) => {}
            Err(other) => panic!("expected connection error, got {other}"),
            Ok(_) => panic!("expected connection error"),
        }
    }
}
