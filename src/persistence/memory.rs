//! In-process ledger with per-row fine-grained locking.
//!
//! [`MemoryStore`] keeps rows in a `HashMap` where each row sits behind
//! its own [`tokio::sync::Mutex`]. Merges of different keys only share the
//! outer read lock; merges of the same key serialize on the row lock.
//! Inserting a new key takes the outer write lock and re-checks, so two
//! racing first observations still produce a single row.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::{Mutex, RwLock};

use super::ProductStore;
use super::models::{LedgerRow, ProductKey};
use crate::domain::ProductListing;
use crate::error::ShopwatchError;

/// Ledger kept in memory, with the same merge rules as PostgreSQL.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<HashMap<ProductKey, Arc<Mutex<LedgerRow>>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the row for `key`, if any.
    pub async fn get(&self, key: &ProductKey) -> Option<LedgerRow> {
        let map = self.rows.read().await;
        let row = map.get(key)?;
        let row = row.lock().await;
        Some(row.clone())
    }

    /// Returns the number of rows.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Returns `true` if the store holds no rows.
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Applies one listing. Returns `true` if it created the row.
    async fn merge_one(&self, listing: &ProductListing) -> bool {
        let key = ProductKey::from(listing);

        {
            let map = self.rows.read().await;
            if let Some(row) = map.get(&key) {
                row.lock().await.observe(listing);
                return false;
            }
        }

        let mut map = self.rows.write().await;
        match map.get(&key) {
            Some(row) => {
                row.lock().await.observe(listing);
                false
            }
            None => {
                let row = LedgerRow::first_observation(listing);
                map.insert(key, Arc::new(Mutex::new(row)));
                true
            }
        }
    }

    async fn collect_rows(&self, only_unnotified: bool) -> Vec<LedgerRow> {
        let map = self.rows.read().await;
        let mut rows = Vec::with_capacity(map.len());
        for row in map.values() {
            let row = row.lock().await;
            if only_unnotified && row.notified {
                continue;
            }
            rows.push(row.clone());
        }
        rows.sort_by(|a, b| (&a.shop, &a.name, &a.link).cmp(&(&b.shop, &b.name, &b.link)));
        rows
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn ensure_schema(&self) -> Result<(), ShopwatchError> {
        Ok(())
    }

    async fn drop_schema(&self) -> Result<(), ShopwatchError> {
        self.rows.write().await.clear();
        Ok(())
    }

    async fn merge(&self, batch: &[ProductListing]) -> Result<Vec<ProductListing>, ShopwatchError> {
        let mut created = Vec::new();
        for listing in batch {
            if self.merge_one(listing).await {
                created.push(listing.clone());
            }
        }
        Ok(created)
    }

    async fn reap(&self, older_than: Duration) -> Result<u64, ShopwatchError> {
        let cutoff = Utc::now() - older_than;
        let mut map = self.rows.write().await;

        let mut stale = Vec::new();
        for (key, row) in map.iter() {
            if row.lock().await.last_seen < cutoff {
                stale.push(key.clone());
            }
        }
        for key in &stale {
            map.remove(key);
        }

        Ok(stale.len() as u64)
    }

    async fn list_all(&self) -> Result<Vec<LedgerRow>, ShopwatchError> {
        Ok(self.collect_rows(false).await)
    }

    async fn list_unnotified(&self) -> Result<Vec<LedgerRow>, ShopwatchError> {
        Ok(self.collect_rows(true).await)
    }

    async fn mark_notified(&self, keys: &[ProductKey]) -> Result<u64, ShopwatchError> {
        let map = self.rows.read().await;
        let mut updated = 0;
        for key in keys {
            if let Some(row) = map.get(key) {
                row.lock().await.notified = true;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn mark_reported(&self, rows: &[LedgerRow]) -> Result<u64, ShopwatchError> {
        let map = self.rows.read().await;
        let mut updated = 0;
        for reported in rows {
            if let Some(row) = map.get(&reported.key()) {
                let mut row = row.lock().await;
                if row.price == reported.price {
                    row.notified = true;
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn listing(name: &str, shop: &str, price: i64, at: DateTime<Utc>) -> ProductListing {
        ProductListing::new(name, shop, price, format!("https://{shop}.test/{name}"), at)
    }

    async fn merged(store: &MemoryStore, batch: &[ProductListing]) -> Vec<ProductListing> {
        let Ok(created) = store.merge(batch).await else {
            panic!("merge failed");
        };
        created
    }

    async fn row(store: &MemoryStore, l: &ProductListing) -> LedgerRow {
        let Some(row) = store.get(&ProductKey::from(l)).await else {
            panic!("row missing for {}", l.name);
        };
        row
    }

    #[tokio::test]
    async fn new_rows_are_reported() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let batch = vec![
            listing("p1", "s1", 10, now),
            listing("p2", "s2", 19, now),
            listing("p3", "s3", 5, now),
        ];

        let created = merged(&store, &batch).await;
        assert_eq!(created, batch);
        assert_eq!(store.len().await, 3);

        let again = merged(&store, &batch).await;
        assert!(again.is_empty());
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn price_change_then_repeat_then_untouched() {
        let store = MemoryStore::new();
        let t0 = Utc::now() - Duration::minutes(10);
        let mut p1 = listing("p1", "s1", 10, t0);
        p1.notified = true;
        let mut p2 = listing("p2", "s2", 19, t0);
        p2.notified = true;
        merged(&store, &[p1, p2]).await;

        let t1 = t0 + Duration::minutes(5);
        let changed = listing("p1", "s1", 12, t1);
        assert!(merged(&store, std::slice::from_ref(&changed)).await.is_empty());
        let r = row(&store, &changed).await;
        assert_eq!((r.price, r.previous_price, r.notified), (12, Some(10), false));
        assert_eq!((r.first_seen, r.last_seen), (t0, t1));

        let t2 = t1 + Duration::minutes(1);
        let same = listing("p1", "s1", 12, t2);
        merged(&store, std::slice::from_ref(&same)).await;
        let r = row(&store, &same).await;
        assert_eq!((r.price, r.previous_price, r.notified), (12, Some(10), false));
        assert_eq!(r.last_seen, t2);

        let mut untouched = listing("p2", "s2", 19, t2);
        untouched.notified = false;
        merged(&store, std::slice::from_ref(&untouched)).await;
        let r = row(&store, &untouched).await;
        assert!(r.notified);
        assert_eq!(r.previous_price, None);
        assert_eq!(r.last_seen, t2);
    }

    #[tokio::test]
    async fn concurrent_merges_keep_one_row_per_key() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();

        let mut handles = Vec::new();
        for i in 0..32_i64 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let batch = vec![
                    listing("same", "s1", 100 + (i % 2), now),
                    listing(&format!("own{i}"), "s1", i, now),
                ];
                store.merge(&batch).await.map(|c| c.len()).unwrap_or(0)
            }));
        }

        let mut created = 0;
        for handle in handles {
            created += handle.await.unwrap_or(0);
        }

        assert_eq!(store.len().await, 33);
        // one insert for "same" plus one per task-local key
        assert_eq!(created, 33);
    }

    #[tokio::test]
    async fn reap_removes_only_stale_rows() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let stale = listing("old", "s1", 1, now - Duration::days(4));
        let fresh = listing("new", "s1", 1, now - Duration::days(2));
        merged(&store, &[stale.clone(), fresh.clone()]).await;

        let Ok(removed) = store.reap(Duration::days(3)).await else {
            panic!("reap failed");
        };
        assert_eq!(removed, 1);
        assert!(store.get(&ProductKey::from(&stale)).await.is_none());
        assert!(store.get(&ProductKey::from(&fresh)).await.is_some());
    }

    #[tokio::test]
    async fn mark_notified_touches_exactly_given_keys() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let a = listing("a", "s1", 1, now);
        let b = listing("b", "s1", 2, now);
        merged(&store, &[a.clone(), b.clone()]).await;

        let Ok(pending) = store.list_unnotified().await else {
            panic!("list failed");
        };
        assert_eq!(pending.len(), 2);

        let missing = ProductKey::new("ghost", "s1", "https://s1.test/ghost");
        let Ok(updated) = store.mark_notified(&[ProductKey::from(&a), missing]).await else {
            panic!("mark failed");
        };
        assert_eq!(updated, 1);

        let Ok(pending) = store.list_unnotified().await else {
            panic!("list failed");
        };
        assert_eq!(pending.len(), 1);
        assert_eq!(pending.first().map(|r| r.name.as_str()), Some("b"));

        let Ok(all) = store.list_all().await else {
            panic!("list failed");
        };
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn mark_reported_skips_rows_repriced_since_read() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let a = listing("a", "s1", 10, now);
        let b = listing("b", "s1", 20, now);
        merged(&store, &[a, b]).await;

        let Ok(read) = store.list_unnotified().await else {
            panic!("list failed");
        };
        merged(&store, &[listing("a", "s1", 5, now)]).await;

        let Ok(updated) = store.mark_reported(&read).await else {
            panic!("mark failed");
        };
        assert_eq!(updated, 1);

        let Ok(pending) = store.list_unnotified().await else {
            panic!("list failed");
        };
        let summary: Vec<(&str, i64, Option<i64>)> = pending
            .iter()
            .map(|r| (r.name.as_str(), r.price, r.previous_price))
            .collect();
        assert_eq!(summary, [("a", 5, Some(10))]);
    }
}
