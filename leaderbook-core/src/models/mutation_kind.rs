use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationKind {
    /// Update and delete target an existing entity and need its id.
    pub fn requires_id(&self) -> bool {
        matches!(self, MutationKind::Update | MutationKind::Delete)
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationKind::Create => write!(f, "CREATE"),
            MutationKind::Update => write!(f, "UPDATE"),
            MutationKind::Delete => write!(f, "DELETE"),
        }
    }
}

impl FromStr for MutationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "create" => Ok(MutationKind::Create),
            "update" => Ok(MutationKind::Update),
            "delete" => Ok(MutationKind::Delete),
            _ => Err(format!(
                "Invalid mutation kind '{}'. Valid options: create, update, delete",
                s
            )),
        }
    }
}
