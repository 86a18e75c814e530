use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{StoreError, StorePath};

/// The full value of a subtree at the time it was read or fanned out.
///
/// A snapshot with no value means the path does not exist.
#[derive(Debug, Clone)]
pub struct Snapshot {
    path: StorePath,
    value: Option<Value>,
}

impl Snapshot {
    pub fn new(path: StorePath, value: Option<Value>) -> Self {
        Self { path, value }
    }

    pub fn path(&self) -> &StorePath {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<Value> {
        self.value
    }

    /// Decodes the snapshot into a concrete type.
    pub fn decode<T>(&self) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        let value = self.value.clone().ok_or_else(|| StoreError::NotFound {
            path: self.path.clone(),
        })?;

        serde_json::from_value(value).map_err(|source| StoreError::Decode {
            path: self.path.clone(),
            source,
        })
    }

    /// The direct children of the subtree, in key order. Empty when the
    /// value is missing or not a collection.
    pub fn children(&self) -> Vec<(String, Value)> {
        match &self.value {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            _ => vec![],
        }
    }

    /// Decodes every child of the subtree into a concrete type, skipping
    /// children that fail to decode.
    pub fn decode_children<T>(&self) -> Vec<T>
    where
        T: DeserializeOwned,
    {
        self.children()
            .into_iter()
            .filter_map(|(_, value)| serde_json::from_value(value).ok())
            .collect()
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::Snapshot;
    use crate::StorePath;

    #[test]
    fn missing_snapshot() {
        let snapshot = Snapshot::new(StorePath::parse("Rides/nope"), None);

        assert!(!snapshot.exists());
        assert!(snapshot.children().is_empty());
    }

    #[test]
    fn children_of_collection() {
        let snapshot = Snapshot::new(
            StorePath::parse("Rides"),
            Some(json!({ "a": { "fare": 1 }, "b": { "fare": 2 } })),
        );

        let children = snapshot.children();

        assert_eq!(children.len(), 2);
        assert_eq!(children[0].0, "a");
    }
}
