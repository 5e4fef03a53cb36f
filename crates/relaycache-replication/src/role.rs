use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which side of replication a process plays. Fixed for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Single writer and source of truth; pushes notices, serves pulls.
    #[serde(alias = "server")]
    Authority,
    /// Read-through copy fed by notices and pulls.
    #[serde(alias = "client")]
    Replica,
}

impl Role {
    pub fn is_authority(&self) -> bool {
        matches!(self, Role::Authority)
    }

    pub fn is_replica(&self) -> bool {
        matches!(self, Role::Replica)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Authority => write!(f, "authority"),
            Role::Replica => write!(f, "replica"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "authority" | "server" => Ok(Role::Authority),
            "replica" | "client" => Ok(Role::Replica),
            other => Err(format!("unknown role '{other}', expected authority or replica")),
        }
    }
}
