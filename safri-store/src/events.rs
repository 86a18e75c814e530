use serde_json::Value;

/// A typed change to one child of a subscribed collection, derived by
/// comparing consecutive snapshots of the same path.
///
/// Consumers that keep a local index apply these instead of rescanning the
/// whole collection on every fan-out.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildChange {
    /// A child appeared
    Added { key: String, value: Value },
    /// A child's value changed
    Modified { key: String, value: Value },
    /// A child disappeared
    Removed { key: String },
}

impl ChildChange {
    pub fn key(&self) -> &str {
        match self {
            Self::Added { key, .. } => key,
            Self::Modified { key, .. } => key,
            Self::Removed { key } => key,
        }
    }
}

/// Derives the child-level changes between two snapshots of a collection.
///
/// Values that are missing or not collections are treated as empty, so the
/// first snapshot of a subscription diffs cleanly against nothing.
pub fn diff_children(previous: Option<&Value>, next: Option<&Value>) -> Vec<ChildChange> {
    let empty = serde_json::Map::new();

    let previous = match previous {
        Some(Value::Object(map)) => map,
        _ => &empty,
    };

    let next = match next {
        Some(Value::Object(map)) => map,
        _ => &empty,
    };

    let mut result = vec![];

    for (key, value) in next.iter() {
        match previous.get(key) {
            None => result.push(ChildChange::Added {
                key: key.clone(),
                value: value.clone(),
            }),
            Some(old) if old != value => result.push(ChildChange::Modified {
                key: key.clone(),
                value: value.clone(),
            }),
            Some(_) => {}
        }
    }

    for key in previous.keys() {
        if !next.contains_key(key) {
            result.push(ChildChange::Removed { key: key.clone() });
        }
    }

    result
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::{diff_children, ChildChange};

    #[test]
    fn first_snapshot_diffs_against_nothing() {
        let next = json!({ "ride-1": { "status": "requested" } });
        let changes = diff_children(None, Some(&next));

        assert_eq!(
            changes,
            vec![ChildChange::Added {
                key: "ride-1".to_string(),
                value: json!({ "status": "requested" }),
            }]
        );
    }

    #[test]
    fn modification_and_removal() {
        let previous = json!({
            "ride-1": { "status": "requested" },
            "ride-2": { "status": "requested" },
        });
        let next = json!({
            "ride-1": { "status": "assigned" },
        });

        let changes = diff_children(Some(&previous), Some(&next));

        assert!(changes.contains(&ChildChange::Modified {
            key: "ride-1".to_string(),
            value: json!({ "status": "assigned" }),
        }));
        assert!(changes.contains(&ChildChange::Removed {
            key: "ride-2".to_string(),
        }));
    }

    #[test]
    fn unchanged_children_are_silent() {
        let value = json!({ "ride-1": { "status": "requested" } });

        assert!(diff_children(Some(&value), Some(&value)).is_empty());
    }
}
