//! Remote-wins merge of a fetched collection into the local cache.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::models::{index_by_id, Entity};

/// Merges a remote listing with the locally cached items.
///
/// Remote entities are inserted first and win on any id collision. Local
/// entities whose id is absent remotely are kept (typically rows created
/// offline that have not propagated yet). There is no field-level merge:
/// a local edit to an entity that exists remotely is discarded.
pub fn merge_remote_wins(
    remote: Vec<Entity>,
    local: BTreeMap<String, Entity>,
) -> BTreeMap<String, Entity> {
    let mut merged = index_by_id(remote);

    for (id, entity) in local {
        match merged.entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(entity);
            }
            Entry::Occupied(slot) => {
                if *slot.get() != entity {
                    tracing::debug!("Remote copy of '{}' replaces local version", slot.key());
                }
            }
        }
    }

    merged
}
