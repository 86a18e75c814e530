use std::sync::Arc;

use async_trait::async_trait;
use crossbeam::channel::{unbounded, Sender};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use safri_store::{
    Changes, Id, RealtimeStore, Result, Snapshot, StoreError, StorePath, Subscription,
};

/// An in-process realtime store.
///
/// The whole tree lives behind one write lock, which is what makes
/// `update_if` an atomic step: a conditional transition and its fan-out
/// happen before any competing writer gets in.
pub struct MemoryStore {
    tree: RwLock<Value>,
    watchers: Arc<DashMap<Id<Watcher>, Watcher>>,
}

struct Watcher {
    path: StorePath,
    sender: Sender<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tree: RwLock::new(Value::Object(Map::new())),
            watchers: Default::default(),
        }
    }

    /// Reads the subtree at the path from the given root.
    fn subtree(root: &Value, path: &StorePath) -> Option<Value> {
        let mut current = root;

        for segment in path.segments() {
            current = current.as_object()?.get(segment)?;
        }

        Some(current.clone())
    }

    /// Walks to the object at the path, creating intermediate objects.
    /// Fails if a segment is occupied by a leaf value.
    fn object_at<'a>(
        root: &'a mut Value,
        path: &StorePath,
    ) -> std::result::Result<&'a mut Map<String, Value>, StoreError> {
        let mut current = root;

        for segment in path.segments() {
            let map = current
                .as_object_mut()
                .ok_or_else(|| StoreError::NotACollection { path: path.clone() })?;

            current = map
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
        }

        current
            .as_object_mut()
            .ok_or_else(|| StoreError::NotACollection { path: path.clone() })
    }

    /// Fans the post-write state out to every watcher whose subtree the
    /// write intersects. Runs under the write lock so each subscription
    /// observes writes in the order they landed.
    fn notify(&self, root: &Value, written: &StorePath) {
        for entry in self.watchers.iter() {
            let watcher = entry.value();

            if watcher.path.intersects(written) {
                let snapshot =
                    Snapshot::new(watcher.path.clone(), Self::subtree(root, &watcher.path));

                // A send only fails when the subscription is mid-drop
                let _ = watcher.sender.send(snapshot);
            }
        }
    }

    fn apply_changes(map: &mut Map<String, Value>, changes: Changes) {
        for (key, value) in changes {
            // A null child removes the key, matching the historical
            // partial-update semantics
            if value.is_null() {
                map.remove(&key);
            } else {
                map.insert(key, value);
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RealtimeStore for MemoryStore {
    async fn get(&self, path: &StorePath) -> Result<Snapshot> {
        let tree = self.tree.read();

        Ok(Snapshot::new(path.clone(), Self::subtree(&tree, path)))
    }

    async fn set(&self, path: &StorePath, value: Value) -> Result<()> {
        let mut tree = self.tree.write();

        match path.parent() {
            Some(parent) => {
                let map = Self::object_at(&mut tree, &parent)?;
                let key = path.last().expect("non-root path has a last segment");

                map.insert(key.to_string(), value);
            }
            None => *tree = value,
        }

        self.notify(&tree, path);

        Ok(())
    }

    async fn update(&self, path: &StorePath, changes: Changes) -> Result<()> {
        let mut tree = self.tree.write();

        let map = Self::object_at(&mut tree, path)?;
        Self::apply_changes(map, changes);

        self.notify(&tree, path);

        Ok(())
    }

    async fn remove(&self, path: &StorePath) -> Result<()> {
        let mut tree = self.tree.write();

        if let Some(parent) = path.parent() {
            let map = Self::object_at(&mut tree, &parent)?;
            let key = path.last().expect("non-root path has a last segment");

            map.remove(key);
        } else {
            *tree = Value::Object(Map::new());
        }

        self.notify(&tree, path);

        Ok(())
    }

    async fn update_if(
        &self,
        path: &StorePath,
        field: &str,
        expected: Value,
        changes: Changes,
    ) -> Result<bool> {
        let mut tree = self.tree.write();

        let current = Self::subtree(&tree, path).ok_or_else(|| StoreError::NotFound {
            path: path.clone(),
        })?;

        let matches = current
            .as_object()
            .and_then(|map| map.get(field))
            .map(|value| *value == expected)
            .unwrap_or(false);

        if !matches {
            return Ok(false);
        }

        let map = Self::object_at(&mut tree, path)?;
        Self::apply_changes(map, changes);

        self.notify(&tree, path);

        Ok(true)
    }

    fn subscribe(&self, path: &StorePath) -> Subscription {
        let (sender, receiver) = unbounded();
        let id = Id::new();

        {
            // Snapshot and registration happen under the same lock, so a
            // write cannot slip between the initial value and the fan-out
            let tree = self.tree.read();
            let initial = Snapshot::new(path.clone(), Self::subtree(&tree, path));

            let _ = sender.send(initial);

            self.watchers.insert(
                id,
                Watcher {
                    path: path.clone(),
                    sender,
                },
            );
        }

        let watchers = self.watchers.clone();

        Subscription::new(
            path.clone(),
            receiver,
            Box::new(move || {
                watchers.remove(&id);
            }),
        )
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use safri_store::{changes, RealtimeStore, StorePath};

    use super::MemoryStore;

    #[tokio::test]
    async fn set_and_get() {
        let store = MemoryStore::new();
        let path = StorePath::parse("Rides/ride-1");

        store
            .set(&path, json!({ "status": "requested" }))
            .await
            .unwrap();

        let snapshot = store.get(&path).await.unwrap();

        assert_eq!(snapshot.value(), Some(&json!({ "status": "requested" })));
    }

    #[tokio::test]
    async fn update_merges_and_null_removes() {
        let store = MemoryStore::new();
        let path = StorePath::parse("Rides/ride-1");

        store
            .set(&path, json!({ "status": "requested", "fare": 350 }))
            .await
            .unwrap();

        store
            .update(
                &path,
                changes([("status", json!("cancelled")), ("fare", json!(null))]),
            )
            .await
            .unwrap();

        let snapshot = store.get(&path).await.unwrap();

        assert_eq!(snapshot.value(), Some(&json!({ "status": "cancelled" })));
    }

    #[tokio::test]
    async fn fan_out_reaches_ancestors_and_exact_paths() {
        let store = MemoryStore::new();
        let rides = StorePath::parse("Rides");

        let collection_watcher = store.subscribe(&rides);
        let ride_watcher = store.subscribe(&rides.child("ride-1"));

        // Both receive their initial snapshot right away
        assert!(!collection_watcher.recv().unwrap().exists());
        assert!(!ride_watcher.recv().unwrap().exists());

        store
            .set(&rides.child("ride-1"), json!({ "status": "requested" }))
            .await
            .unwrap();

        let from_collection = collection_watcher.recv().unwrap();
        let from_ride = ride_watcher.recv().unwrap();

        assert_eq!(
            from_collection.value(),
            Some(&json!({ "ride-1": { "status": "requested" } }))
        );
        assert_eq!(from_ride.value(), Some(&json!({ "status": "requested" })));
    }

    #[tokio::test]
    async fn unrelated_writes_do_not_fan_out() {
        let store = MemoryStore::new();

        let watcher = store.subscribe(&StorePath::parse("Users"));
        watcher.recv().unwrap();

        store
            .set(&StorePath::parse("Rides/ride-1"), json!({ "fare": 1 }))
            .await
            .unwrap();

        assert!(watcher.try_recv().is_none());
    }

    #[tokio::test]
    async fn update_if_applies_only_on_match() {
        let store = MemoryStore::new();
        let path = StorePath::parse("Rides/ride-1");

        store
            .set(&path, json!({ "status": "requested" }))
            .await
            .unwrap();

        let won = store
            .update_if(
                &path,
                "status",
                json!("requested"),
                changes([("status", json!("assigned"))]),
            )
            .await
            .unwrap();

        let lost = store
            .update_if(
                &path,
                "status",
                json!("requested"),
                changes([("status", json!("assigned"))]),
            )
            .await
            .unwrap();

        assert!(won);
        assert!(!lost);
    }

    #[tokio::test]
    async fn dropping_a_subscription_stops_delivery() {
        let store = MemoryStore::new();
        let rides = StorePath::parse("Rides");

        let watcher = store.subscribe(&rides);
        watcher.recv().unwrap();
        drop(watcher);

        store
            .set(&rides.child("ride-1"), json!({ "fare": 1 }))
            .await
            .unwrap();

        let remaining = store.subscribe(&rides);

        // Only the fresh subscription is registered at this point
        assert_eq!(store.watchers.len(), 1);
        drop(remaining);
    }
}
