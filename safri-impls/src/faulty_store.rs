use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use safri_store::{Changes, RealtimeStore, Result, Snapshot, StoreError, StorePath, Subscription};

/// A store wrapper that fails writes beneath chosen paths.
///
/// Used to exercise how multi-entity transitions behave when one of their
/// writes does not land, without a real backend to misbehave.
pub struct FaultyStore<S> {
    inner: S,
    failing: Mutex<HashSet<String>>,
}

impl<S> FaultyStore<S>
where
    S: RealtimeStore,
{
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing: Default::default(),
        }
    }

    /// Makes every write at or beneath the path fail until healed.
    pub fn fail_writes_at(&self, path: &StorePath) {
        self.failing.lock().insert(path.to_string());
    }

    pub fn heal(&self, path: &StorePath) {
        self.failing.lock().remove(&path.to_string());
    }

    fn check(&self, path: &StorePath) -> Result<()> {
        let failing = self.failing.lock();

        let broken = failing
            .iter()
            .any(|prefix| path.starts_with(&StorePath::parse(prefix)));

        if broken {
            return Err(StoreError::Internal(
                format!("injected write failure at {path}").into(),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl<S> RealtimeStore for FaultyStore<S>
where
    S: RealtimeStore,
{
    async fn get(&self, path: &StorePath) -> Result<Snapshot> {
        self.inner.get(path).await
    }

    async fn set(&self, path: &StorePath, value: Value) -> Result<()> {
        self.check(path)?;
        self.inner.set(path, value).await
    }

    async fn update(&self, path: &StorePath, changes: Changes) -> Result<()> {
        self.check(path)?;
        self.inner.update(path, changes).await
    }

    async fn remove(&self, path: &StorePath) -> Result<()> {
        self.check(path)?;
        self.inner.remove(path).await
    }

    async fn update_if(
        &self,
        path: &StorePath,
        field: &str,
        expected: Value,
        changes: Changes,
    ) -> Result<bool> {
        self.check(path)?;
        self.inner.update_if(path, field, expected, changes).await
    }

    fn subscribe(&self, path: &StorePath) -> Subscription {
        self.inner.subscribe(path)
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use safri_store::{RealtimeStore, StorePath};

    use super::FaultyStore;
    use crate::MemoryStore;

    #[tokio::test]
    async fn writes_fail_beneath_the_marked_path_only() {
        let store = FaultyStore::new(MemoryStore::new());
        let drivers = StorePath::parse("Drivers");

        store.fail_writes_at(&drivers);

        let refused = store
            .set(&drivers.child("4821"), json!({ "status": "online" }))
            .await;
        let allowed = store
            .set(&StorePath::parse("Rides/ride-1"), json!({ "fare": 1 }))
            .await;

        assert!(refused.is_err());
        assert!(allowed.is_ok());

        store.heal(&drivers);

        assert!(store
            .set(&drivers.child("4821"), json!({ "status": "online" }))
            .await
            .is_ok());
    }
}
