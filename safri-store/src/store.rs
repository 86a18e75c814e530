use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::{Snapshot, StorePath, Subscription};

pub type Result<T> = std::result::Result<T, StoreError>;

/// A partial write: the children to merge into a subtree.
pub type Changes = BTreeMap<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// An unknown or internal error happened with the backing store
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// The path doesn't exist
    #[error("{path} doesn't exist")]
    NotFound { path: StorePath },
    /// The value at the path could not be turned into the requested type
    #[error("value at {path} could not be decoded: {source}")]
    Decode {
        path: StorePath,
        source: serde_json::Error,
    },
    /// A partial write was attempted against a leaf value
    #[error("{path} is not a collection")]
    NotACollection { path: StorePath },
}

/// Represents a hierarchical realtime store: every write fans out to
/// subscribers as a full-subtree snapshot.
///
/// This is the contract the dispatch layer consumes. The store guarantees
/// per-subscription ordering and read-your-own-completed-writes, and
/// nothing across independent paths.
#[async_trait]
pub trait RealtimeStore: Send + Sync + 'static {
    /// Reads the subtree at the path.
    async fn get(&self, path: &StorePath) -> Result<Snapshot>;

    /// Replaces the subtree at the path.
    async fn set(&self, path: &StorePath, value: Value) -> Result<()>;

    /// Merges the given children into the subtree at the path, creating it
    /// if it does not exist. A `null` value removes the child instead.
    async fn update(&self, path: &StorePath, changes: Changes) -> Result<()>;

    /// Deletes the subtree at the path.
    async fn remove(&self, path: &StorePath) -> Result<()>;

    /// Applies `changes` to the subtree only if its `field` child currently
    /// equals `expected`, as a single atomic step. Returns whether the
    /// write was applied.
    ///
    /// This is the conditional update multi-entity transitions are built
    /// on, so two writers cannot both win the same transition.
    async fn update_if(
        &self,
        path: &StorePath,
        field: &str,
        expected: Value,
        changes: Changes,
    ) -> Result<bool>;

    /// Subscribes to the subtree at the path. The current value is
    /// delivered immediately, and every intersecting write afterwards
    /// delivers the full post-write subtree. Dropping the subscription
    /// tears it down.
    fn subscribe(&self, path: &StorePath) -> Subscription;
}

/// Builds a [Changes] map from field/value pairs.
pub fn changes<const N: usize>(pairs: [(&str, Value); N]) -> Changes {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
