//! Scope type: which organizational tree a grant or request refers to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when parsing an unknown scope type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown scope type: {0}")]
pub struct ScopeTypeParseError(pub String);

/// The organizational dimension an access grant applies to.
///
/// `Global` grants span all three trees; the others bind a grant to paths of
/// a single tree. Stored uppercase (`"COMPANY"`, ...) for compatibility with
/// existing grant records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScopeType {
    Company,
    Department,
    Branch,
    Global,
}

impl ScopeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeType::Company => "COMPANY",
            ScopeType::Department => "DEPARTMENT",
            ScopeType::Branch => "BRANCH",
            ScopeType::Global => "GLOBAL",
        }
    }

    /// Whether a grant of this scope type can apply to a request against
    /// `requested`. `Global` applies everywhere; otherwise the trees must
    /// match exactly.
    pub fn applies_to(&self, requested: ScopeType) -> bool {
        matches!(self, ScopeType::Global) || *self == requested
    }
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopeType {
    type Err = ScopeTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COMPANY" => Ok(ScopeType::Company),
            "DEPARTMENT" => Ok(ScopeType::Department),
            "BRANCH" => Ok(ScopeType::Branch),
            "GLOBAL" => Ok(ScopeType::Global),
            other => Err(ScopeTypeParseError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_applies_to_every_tree() {
        for requested in [ScopeType::Company, ScopeType::Department, ScopeType::Branch] {
            assert!(ScopeType::Global.applies_to(requested));
        }
    }

    #[test]
    fn tree_scopes_do_not_cross() {
        assert!(ScopeType::Department.applies_to(ScopeType::Department));
        assert!(!ScopeType::Department.applies_to(ScopeType::Branch));
        assert!(!ScopeType::Company.applies_to(ScopeType::Global));
    }

    #[test]
    fn parses_stored_form() {
        assert_eq!("BRANCH".parse::<ScopeType>().unwrap(), ScopeType::Branch);
        assert!("branch".parse::<ScopeType>().is_err());
    }
}
