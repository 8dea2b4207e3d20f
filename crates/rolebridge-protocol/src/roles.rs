//! The set of roles whose membership Rolebridge owns.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Configured governed role names.
///
/// Role names are compared case-insensitively: `"Patron"` on the remote
/// platform and `"patron"` in config are the same role. The original
/// spelling from config is kept for display and for building the role list
/// sent back to the platform; lookups go through the lower-cased key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct GovernedRoles {
    names: Vec<String>,
    folded: BTreeSet<String>,
}

impl GovernedRoles {
    /// Builds the set from configured names. Blank names are dropped and
    /// case-insensitive duplicates collapse to the first spelling.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out = Self::default();
        for name in names {
            let name: String = name.into();
            let trimmed = name.trim();
            if trimmed.is_empty() {
                continue;
            }
            if out.folded.insert(trimmed.to_lowercase()) {
                out.names.push(trimmed.to_string());
            }
        }
        out
    }

    /// `true` if `role` (any casing) is governed.
    pub fn contains(&self, role: &str) -> bool {
        self.folded.contains(&role.to_lowercase())
    }

    /// Configured names, in config order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Lower-cased names, the form used for permission nodes.
    pub fn folded(&self) -> &BTreeSet<String> {
        &self.folded
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl From<Vec<String>> for GovernedRoles {
    fn from(value: Vec<String>) -> Self {
        Self::new(value)
    }
}

impl From<GovernedRoles> for Vec<String> {
    fn from(value: GovernedRoles) -> Self {
        value.names
    }
}
