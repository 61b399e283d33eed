//! In-process TTL approval store.

use super::ApprovalStore;
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Recorded verdict for one IP.
#[derive(Debug, Clone)]
pub struct ApprovalRecord {
    pub approved: bool,
    /// When this record was written.
    pub recorded_at: Instant,
    pub ttl: Duration,
}

impl ApprovalRecord {
    /// Check if this record has expired.
    pub fn is_expired(&self) -> bool {
        self.recorded_at.elapsed() >= self.ttl
    }
}

/// Thread-safe TTL map of approval records.
///
/// Records are local to the process, so every replica keeps its own view.
pub struct MemoryApprovalStore {
    records: RwLock<HashMap<String, ApprovalRecord>>,
    max_entries: usize,
}

impl MemoryApprovalStore {
    /// Create a new store holding at most `max_entries` records.
    pub fn new(max_entries: usize) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            max_entries,
        }
    }

    /// Remove expired records.
    pub fn cleanup(&self) {
        if let Ok(mut records) = self.records.write() {
            records.retain(|_, r| !r.is_expired());
        }
    }

    /// Number of records held, expired ones included.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut records) = self.records.write() {
            records.clear();
        }
    }
}

#[async_trait]
impl ApprovalStore for MemoryApprovalStore {
    async fn lookup(&self, ip: &str) -> Result<Option<bool>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;

        // Expired records are left for cleanup or eviction to avoid a write lock here
        Ok(records
            .get(ip)
            .filter(|r| !r.is_expired())
            .map(|r| r.approved))
    }

    async fn record(&self, ip: &str, approved: bool, ttl: Duration) -> Result<(), StoreError> {
        let entry = ApprovalRecord {
            approved,
            recorded_at: Instant::now(),
            ttl,
        };

        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;

        if records.len() >= self.max_entries && !records.contains_key(ip) {
            records.retain(|_, r| !r.is_expired());

            // Still full: drop the oldest record
            if records.len() >= self.max_entries {
                if let Some(oldest) = records
                    .iter()
                    .min_by_key(|(_, r)| r.recorded_at)
                    .map(|(k, _)| k.clone())
                {
                    records.remove(&oldest);
                }
            }
        }

        records.insert(ip.to_string(), entry);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const DAY: Duration = Duration::from_secs(86400);

    #[tokio::test]
    async fn test_record_and_lookup() {
        let store = MemoryApprovalStore::new(1000);

        store.record("1.2.3.4", false, DAY).await.unwrap();
        store.record("5.6.7.8", true, DAY).await.unwrap();

        assert_eq!(store.lookup("1.2.3.4").await.unwrap(), Some(false));
        assert_eq!(store.lookup("5.6.7.8").await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn test_lookup_miss() {
        let store = MemoryApprovalStore::new(1000);
        assert_eq!(store.lookup("1.2.3.4").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_record_expires() {
        let store = MemoryApprovalStore::new(1000);

        store
            .record("1.2.3.4", true, Duration::from_millis(1))
            .await
            .unwrap();

        thread::sleep(Duration::from_millis(10));
        assert_eq!(store.lookup("1.2.3.4").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_record_overwrites() {
        let store = MemoryApprovalStore::new(1000);

        store.record("1.2.3.4", true, DAY).await.unwrap();
        store.record("1.2.3.4", false, DAY).await.unwrap();

        assert_eq!(store.lookup("1.2.3.4").await.unwrap(), Some(false));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_max_entries_evicts_oldest() {
        let store = MemoryApprovalStore::new(2);

        store.record("10.0.0.1", true, DAY).await.unwrap();
        thread::sleep(Duration::from_millis(1));
        store.record("10.0.0.2", true, DAY).await.unwrap();
        thread::sleep(Duration::from_millis(1));
        store.record("10.0.0.3", false, DAY).await.unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.lookup("10.0.0.1").await.unwrap(), None);
        assert_eq!(store.lookup("10.0.0.3").await.unwrap(), Some(false));
    }

    #[tokio::test]
    async fn test_max_entries_prefers_expired() {
        let store = MemoryApprovalStore::new(2);

        store.record("10.0.0.1", true, DAY).await.unwrap();
        store
            .record("10.0.0.2", true, Duration::from_millis(1))
            .await
            .unwrap();
        thread::sleep(Duration::from_millis(10));
        store.record("10.0.0.3", true, DAY).await.unwrap();

        assert_eq!(store.lookup("10.0.0.1").await.unwrap(), Some(true));
        assert_eq!(store.lookup("10.0.0.3").await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn test_cleanup_and_clear() {
        let store = MemoryApprovalStore::new(1000);

        store
            .record("10.0.0.1", true, Duration::from_millis(1))
            .await
            .unwrap();
        store.record("10.0.0.2", true, DAY).await.unwrap();

        thread::sleep(Duration::from_millis(10));
        store.cleanup();
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_approval_record_is_expired() {
        let stale = ApprovalRecord {
            approved: true,
            recorded_at: Instant::now() - Duration::from_secs(100),
            ttl: Duration::from_secs(60),
        };
        assert!(stale.is_expired());

        let fresh = ApprovalRecord {
            approved: true,
            recorded_at: Instant::now(),
            ttl: Duration::from_secs(60),
        };
        assert!(!fresh.is_expired());
    }
}
