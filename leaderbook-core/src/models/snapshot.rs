use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::entity::{entity_id, Entity};

/// Locally cached copy of one remote collection.
///
/// Items are keyed by entity id. A `BTreeMap` keeps the serialized form
/// stable, so writing the same items twice produces the same bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    pub collection: String,
    pub items: BTreeMap<String, Entity>,
    pub last_synced_at: DateTime<Utc>,
}

impl CollectionSnapshot {
    pub fn new(collection: impl Into<String>, items: BTreeMap<String, Entity>) -> Self {
        Self {
            collection: collection.into(),
            items,
            last_synced_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Entities in id order.
    pub fn entities(&self) -> Vec<Entity> {
        self.items.values().cloned().collect()
    }
}

/// Keys a list of entities by id. Entities without an id are skipped; on
/// duplicate ids the first occurrence is kept.
pub fn index_by_id(entities: Vec<Entity>) -> BTreeMap<String, Entity> {
    let mut items = BTreeMap::new();
    for entity in entities {
        match entity_id(&entity) {
            Some(id) => {
                items.entry(id).or_insert(entity);
            }
            None => tracing::warn!("Skipping entity without id: {}", entity),
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_index_by_id_skips_entities_without_id() {
        let items = index_by_id(vec![
            json!({"id": "t1", "name": "VIP"}),
            json!({"name": "orphan"}),
        ]);

        assert_eq!(items.len(), 1);
        assert!(items.contains_key("t1"));
    }

    #[test]
    fn test_index_by_id_keeps_first_duplicate() {
        let items = index_by_id(vec![
            json!({"id": "t1", "name": "newest"}),
            json!({"id": "t1", "name": "older"}),
        ]);

        assert_eq!(items.len(), 1);
        assert_eq!(items["t1"]["name"], "newest");
    }

    #[test]
    fn test_snapshot_entities_ordered_by_id() {
        let snapshot = CollectionSnapshot::new(
            "tags",
            index_by_id(vec![json!({"id": "b"}), json!({"id": "a"})]),
        );

        let ids: Vec<_> = snapshot
            .entities()
            .iter()
            .map(|e| e["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot.is_empty());
    }
}
