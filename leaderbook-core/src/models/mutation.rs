use chrono::{DateTime, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::entity::entity_id;
use super::mutation_kind::MutationKind;

/// A pending write that the remote store has not confirmed yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub id: String,
    pub kind: MutationKind,
    pub collection: String,
    pub payload: Value,
    pub enqueued_at: DateTime<Utc>,
    pub attempts: u32,
}

impl MutationRecord {
    pub fn new(kind: MutationKind, collection: impl Into<String>, payload: Value) -> Self {
        let enqueued_at = Utc::now();
        Self {
            id: generate_record_id(enqueued_at),
            kind,
            collection: collection.into(),
            payload,
            enqueued_at,
            attempts: 0,
        }
    }

    /// Id of the entity this mutation targets, if the payload carries one.
    pub fn entity_id(&self) -> Option<String> {
        entity_id(&self.payload)
    }
}

impl fmt::Display for MutationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.kind,
            self.collection,
            self.entity_id().as_deref().unwrap_or("(new)")
        )?;
        if self.attempts > 0 {
            write!(f, " [{} failed attempt(s)]", self.attempts)?;
        }
        Ok(())
    }
}

/// `<unix millis>-<9 random lowercase alphanumerics>`
pub fn generate_record_id(at: DateTime<Utc>) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();
    format!("{}-{}", at.timestamp_millis(), suffix)
}
