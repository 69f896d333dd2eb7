mod entity;
mod mutation;
mod mutation_kind;
mod snapshot;
mod status;

pub use entity::{entity_id, Entity};
pub use mutation::{generate_record_id, MutationRecord};
pub use mutation_kind::MutationKind;
pub use snapshot::{index_by_id, CollectionSnapshot};
pub use status::SyncStatus;
