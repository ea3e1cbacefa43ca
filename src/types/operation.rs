//! Operation kinds served by the gateway

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::GatewayError;

/// The fixed set of generation operations the gateway fronts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// First pass: title, bullet points, skills and follow-up questions.
    GenerateDraft,
    /// Follow-up questions only.
    GenerateFollowups,
    /// Final bullets and skills after the user answered the follow-ups.
    Finalize,
    /// Rewrite a set of existing bullets.
    Improve,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] = [
        OperationKind::GenerateDraft,
        OperationKind::GenerateFollowups,
        OperationKind::Finalize,
        OperationKind::Improve,
    ];

    /// Stable identifier used in fingerprints, metrics labels and config keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::GenerateDraft => "generate_draft",
            OperationKind::GenerateFollowups => "generate_followups",
            OperationKind::Finalize => "finalize",
            OperationKind::Improve => "improve",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = GatewayError;

    /// Accepts both `generate_draft` and `generate-draft` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        OperationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| GatewayError::InvalidInput(format!("unknown operation kind: {s}")))
    }
}
