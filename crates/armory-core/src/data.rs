//! Static magazine and weapon data, and the lookup interface the state
//! machine queries for it

use crate::{DefId, Error, MagazineId, MagazineInstance, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

fn default_load_time() -> f32 {
    0.5
}

fn default_unload_time() -> f32 {
    0.3
}

fn default_modifier() -> f32 {
    1.0
}

fn default_durability() -> f32 {
    100.0
}

/// Static definition of a magazine kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagazineData {
    /// Magazine kind identifier
    pub id: DefId,
    /// Caliber this magazine accepts
    pub caliber: DefId,
    /// Maximum rounds
    pub max_capacity: u32,
    /// Seconds to hand-load one round
    #[serde(default = "default_load_time")]
    pub load_time_per_round: f32,
    /// Seconds to unload one round
    #[serde(default = "default_unload_time")]
    pub unload_time_per_round: f32,
    /// Multiplier on the weapon's base reload time
    #[serde(default = "default_modifier")]
    pub reload_time_modifier: f32,
    /// Durability of a fresh magazine
    #[serde(default = "default_durability")]
    pub durability: f32,
}

impl MagazineData {
    /// Create a magazine kind with default timings
    pub fn new(id: impl Into<DefId>, caliber: impl Into<DefId>, max_capacity: u32) -> Self {
        Self {
            id: id.into(),
            caliber: caliber.into(),
            max_capacity,
            load_time_per_round: default_load_time(),
            unload_time_per_round: default_unload_time(),
            reload_time_modifier: default_modifier(),
            durability: default_durability(),
        }
    }

    /// Builder: set the reload time multiplier
    pub fn with_reload_modifier(mut self, modifier: f32) -> Self {
        self.reload_time_modifier = modifier;
        self
    }

    /// Whether this kind feeds the given caliber
    pub fn accepts_caliber(&self, caliber: &DefId) -> bool {
        &self.caliber == caliber
    }

    /// Seconds to hand-load `rounds` into an empty magazine of this kind
    pub fn load_duration(&self, rounds: u32) -> f32 {
        self.load_time_per_round * rounds.min(self.max_capacity) as f32
    }

    /// Seconds to unload `rounds`
    pub fn unload_duration(&self, rounds: u32) -> f32 {
        self.unload_time_per_round * rounds.min(self.max_capacity) as f32
    }

    /// Check the record is usable
    pub fn validate(&self) -> Result<()> {
        if self.max_capacity == 0 {
            return Err(Error::InvalidMagazine(format!("{} has zero capacity", self.id)));
        }
        if self.reload_time_modifier <= 0.0 {
            return Err(Error::InvalidMagazine(format!(
                "{} reload modifier must be positive",
                self.id
            )));
        }
        Ok(())
    }
}

/// Static reload data for one weapon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponData {
    pub id: DefId,
    /// Caliber the weapon fires
    pub caliber: DefId,
    /// Base seconds for a reload with a round chambered
    pub tactical_reload_time: f32,
    /// Base seconds for a reload from empty
    pub full_reload_time: f32,
}

impl WeaponData {
    /// Create a weapon record
    pub fn new(
        id: impl Into<DefId>,
        caliber: impl Into<DefId>,
        tactical_reload_time: f32,
        full_reload_time: f32,
    ) -> Self {
        Self {
            id: id.into(),
            caliber: caliber.into(),
            tactical_reload_time,
            full_reload_time,
        }
    }
}

/// Read-only lookup of magazine definitions
///
/// Implemented by whatever owns the item tables; the core only ever asks
/// for one row at a time.
pub trait MagazineDataSource {
    /// Get the definition of a magazine kind
    fn magazine_data(&self, kind: &DefId) -> Option<&MagazineData>;

    /// Like [`magazine_data`](Self::magazine_data) but absence is an error
    fn require_magazine(&self, kind: &DefId) -> Result<&MagazineData> {
        self.magazine_data(kind)
            .ok_or_else(|| Error::UnknownMagazineType(kind.clone()))
    }
}

impl<T: MagazineDataSource + ?Sized> MagazineDataSource for &T {
    fn magazine_data(&self, kind: &DefId) -> Option<&MagazineData> {
        (**self).magazine_data(kind)
    }
}

impl<T: MagazineDataSource + ?Sized> MagazineDataSource for Arc<T> {
    fn magazine_data(&self, kind: &DefId) -> Option<&MagazineData> {
        (**self).magazine_data(kind)
    }
}

/// Table-backed [`MagazineDataSource`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MagazineCatalog {
    magazines: IndexMap<DefId, MagazineData>,
}

impl MagazineCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a definition, returning the previous one
    pub fn insert(&mut self, data: MagazineData) -> Option<MagazineData> {
        self.magazines.insert(data.id.clone(), data)
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with(mut self, data: MagazineData) -> Self {
        self.insert(data);
        self
    }

    /// Whether a kind is defined
    pub fn contains(&self, kind: &DefId) -> bool {
        self.magazines.contains_key(kind)
    }

    /// Number of kinds
    pub fn len(&self) -> usize {
        self.magazines.len()
    }

    /// Check if no kinds are defined
    pub fn is_empty(&self) -> bool {
        self.magazines.is_empty()
    }

    /// Definitions in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &MagazineData> {
        self.magazines.values()
    }

    /// Mint a magazine instance of a known kind, capacity cached from the table
    pub fn create_magazine(
        &self,
        id: MagazineId,
        kind: &DefId,
        ammo: impl Into<DefId>,
        rounds: u32,
    ) -> Result<MagazineInstance> {
        let data = self.require_magazine(kind)?;
        let mut magazine = MagazineInstance::new(id, kind.clone(), data.max_capacity);
        magazine.durability = data.durability;
        magazine.load_rounds(ammo, rounds);
        Ok(magazine)
    }
}

impl MagazineDataSource for MagazineCatalog {
    fn magazine_data(&self, kind: &DefId) -> Option<&MagazineData> {
        self.magazines.get(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> MagazineCatalog {
        MagazineCatalog::new()
            .with(MagazineData::new("stanag_30", "556x45", 30))
            .with(MagazineData::new("akm_30", "762x39", 30).with_reload_modifier(1.1))
    }

    #[test]
    fn test_lookup() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.magazine_data(&DefId::new("stanag_30")).is_some());
        assert_eq!(
            catalog.require_magazine(&DefId::new("drum_100")),
            Err(Error::UnknownMagazineType(DefId::new("drum_100")))
        );
    }

    #[test]
    fn test_lookup_through_arc() {
        let shared = Arc::new(catalog());
        let data = shared.require_magazine(&DefId::new("akm_30")).unwrap();
        assert_eq!(data.reload_time_modifier, 1.1);
    }

    #[test]
    fn test_create_magazine() {
        let catalog = catalog();
        let mag = catalog
            .create_magazine(MagazineId::new(3), &DefId::new("stanag_30"), "m855", 50)
            .unwrap();
        assert_eq!(mag.max_capacity, 30);
        assert_eq!(mag.current_rounds, 30);
        assert!(mag.validate().is_ok());
    }

    #[test]
    fn test_load_duration() {
        let data = MagazineData::new("stanag_30", "556x45", 30);
        assert!((data.load_duration(10) - 5.0).abs() < 1e-6);
        assert!((data.load_duration(100) - 15.0).abs() < 1e-6);
        assert!((data.unload_duration(10) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_validate() {
        assert!(MagazineData::new("x", "y", 0).validate().is_err());
        assert!(MagazineData::new("x", "y", 10)
            .with_reload_modifier(0.0)
            .validate()
            .is_err());
    }
}
