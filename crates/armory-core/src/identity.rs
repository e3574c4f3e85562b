//! Identity types for magazines and static definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of a magazine instance
///
/// Stable across the network and across save/restore, so both peers can
/// talk about "the same physical magazine".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MagazineId(pub u64);

impl MagazineId {
    /// Create a new magazine ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MagazineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mag:{}", self.0)
    }
}

/// Identifier for a static definition (magazine kind, ammo type, caliber, weapon)
///
/// Uses a string-based ID so data tables can be authored by hand
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefId(pub String);

impl DefId {
    /// Create a new definition ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DefId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DefId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Index of a quick-access slot on the carrying character
pub type SlotIndex = usize;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magazine_id() {
        let id = MagazineId::new(42);
        assert_eq!(id.raw(), 42);
        assert_eq!(format!("{}", id), "mag:42");
    }

    #[test]
    fn test_def_id() {
        let id = DefId::new("556x45_m855");
        assert_eq!(id.as_str(), "556x45_m855");
        assert_eq!(format!("{}", id), "556x45_m855");
        assert_eq!(DefId::from("stanag_30"), DefId::new(String::from("stanag_30")));
    }
}
