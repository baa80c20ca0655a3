//! Stages

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two parallel copies of every record.
///
/// Stage is always passed explicitly; there is no ambient "reading stage".
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Mutable working copy.
    Draft,
    /// Published copy, changed only by publishing operations.
    Live,
}

impl Stage {
    pub const ALL: [Stage; 2] = [Stage::Draft, Stage::Live];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Draft => "DRAFT",
            Stage::Live => "LIVE",
        }
    }

    /// The opposite stage.
    pub fn other(&self) -> Stage {
        match self {
            Stage::Draft => Stage::Live,
            Stage::Live => Stage::Draft,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
