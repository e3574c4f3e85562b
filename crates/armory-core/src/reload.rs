//! Reload variants, reload-type resolution and reload timing

use crate::{
    AmmoConfig, Error, MagazineData, MagazineId, MagazineInstance, Result, SlotIndex, WeaponAmmoState,
    WeaponData,
};
use serde::{Deserialize, Serialize};

/// The kind of reload a weapon can perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReloadType {
    /// Swap magazines while a round stays chambered
    Tactical,
    /// Insert a magazine into a weapon with an empty chamber, then chamber
    Empty,
    /// Drop the current magazine instead of stowing it, insert, chamber
    Emergency,
    /// Rack a round from the magazine already inserted
    ChamberOnly,
    /// Nothing useful to do
    #[default]
    None,
}

impl ReloadType {
    /// Whether this reload replaces the magazine
    pub fn swaps_magazine(&self) -> bool {
        matches!(
            self,
            ReloadType::Tactical | ReloadType::Empty | ReloadType::Emergency
        )
    }

    /// Whether the outgoing magazine is dropped rather than stowed
    pub fn drops_magazine(&self) -> bool {
        matches!(self, ReloadType::Emergency)
    }

    /// No reload applies
    pub fn is_none(&self) -> bool {
        matches!(self, ReloadType::None)
    }
}

/// Where an incoming magazine is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MagazineSource {
    /// A quick-access slot on the character
    QuickSlot(SlotIndex),
    /// General storage, named by instance
    Inventory(MagazineId),
}

/// A magazine offered for a reload, with where it comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMagazine {
    pub source: MagazineSource,
    pub magazine: MagazineInstance,
}

/// Intent to reload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReloadRequest {
    pub reload_type: ReloadType,
    pub incoming: Option<IncomingMagazine>,
}

impl ReloadRequest {
    /// Rack a round, no magazine involved
    pub fn chamber_only() -> Self {
        Self {
            reload_type: ReloadType::ChamberOnly,
            incoming: None,
        }
    }

    /// Reload with a magazine drawn from a quick slot
    pub fn from_slot(reload_type: ReloadType, slot: SlotIndex, magazine: MagazineInstance) -> Self {
        Self {
            reload_type,
            incoming: Some(IncomingMagazine {
                source: MagazineSource::QuickSlot(slot),
                magazine: magazine.from_slot(slot),
            }),
        }
    }

    /// Reload with a magazine from general storage
    pub fn from_inventory(reload_type: ReloadType, magazine: MagazineInstance) -> Self {
        Self {
            reload_type,
            incoming: Some(IncomingMagazine {
                source: MagazineSource::Inventory(magazine.id),
                magazine,
            }),
        }
    }

    /// The offered magazine, if any
    pub fn magazine(&self) -> Option<&MagazineInstance> {
        self.incoming.as_ref().map(|i| &i.magazine)
    }

    /// The quick slot the magazine comes from, if any
    pub fn quick_slot(&self) -> Option<SlotIndex> {
        match self.incoming.as_ref()?.source {
            MagazineSource::QuickSlot(slot) => Some(slot),
            MagazineSource::Inventory(_) => None,
        }
    }
}

/// Decide which reload applies
///
/// `emergency` is the caller's "drop, don't stow" flag. A candidate with no
/// rounds counts as no candidate at all.
///
/// Priority:
/// 1. no candidate, round chambered: nothing to do
/// 2. candidate + emergency flag: `Emergency`
/// 3. candidate + round chambered: `Tactical`, even when the current
///    magazine is full
/// 4. candidate + empty chamber: `Empty`
/// 5. no candidate, empty chamber, magazine with rounds: `ChamberOnly`
/// 6. anything else: `None`
pub fn resolve_reload_type(
    state: &WeaponAmmoState,
    candidate: Option<&MagazineInstance>,
    emergency: bool,
) -> ReloadType {
    let candidate = candidate.filter(|m| m.has_ammo());
    let chambered = state.chamber.is_chambered();

    match candidate {
        None if chambered => ReloadType::None,
        None if !state.is_magazine_empty() => ReloadType::ChamberOnly,
        None => ReloadType::None,
        Some(_) if emergency => ReloadType::Emergency,
        Some(_) if chambered => ReloadType::Tactical,
        Some(_) => ReloadType::Empty,
    }
}

/// Seconds a reload takes
///
/// `magazine` is the incoming magazine's static data; without it the
/// multiplier is 1. The result is always positive: a weapon with a
/// non-positive base time, or tuning that makes the reload instant, is an
/// error.
pub fn reload_duration(
    reload_type: ReloadType,
    magazine: Option<&MagazineData>,
    weapon: &WeaponData,
    config: &AmmoConfig,
) -> Result<f32> {
    let modifier = match magazine {
        Some(data) if data.reload_time_modifier > 0.0 => data.reload_time_modifier,
        Some(data) => {
            return Err(Error::InvalidWeaponData(format!(
                "magazine {} has reload modifier {}",
                data.id, data.reload_time_modifier
            )))
        }
        None => 1.0,
    };

    let seconds = match reload_type {
        ReloadType::Tactical => base_time(weapon, weapon.tactical_reload_time, "tactical")? * modifier,
        ReloadType::Empty => base_time(weapon, weapon.full_reload_time, "full")? * modifier,
        ReloadType::Emergency => {
            base_time(weapon, weapon.tactical_reload_time, "tactical")?
                * config.emergency_reload_factor
                * modifier
        }
        ReloadType::ChamberOnly => config.chamber_only_duration,
        ReloadType::None => return Err(Error::NoReloadNeeded),
    };

    // Base times are checked above, so a bad result comes from tuning
    if seconds > 0.0 && seconds.is_finite() {
        Ok(seconds)
    } else {
        Err(Error::InvalidConfig(format!(
            "{reload_type:?} reload on {} takes {seconds}s",
            weapon.id
        )))
    }
}

fn base_time(weapon: &WeaponData, seconds: f32, which: &str) -> Result<f32> {
    if seconds > 0.0 && seconds.is_finite() {
        Ok(seconds)
    } else {
        Err(Error::InvalidWeaponData(format!(
            "{} {} reload time is {}",
            weapon.id, which, seconds
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChamberedRound;

    fn mag(id: u64, rounds: u32) -> MagazineInstance {
        MagazineInstance::new(MagazineId::new(id), "stanag_30", 30).with_rounds("m855", rounds)
    }

    fn state(chambered: bool, magazine: Option<u32>) -> WeaponAmmoState {
        let mut state = WeaponAmmoState::new();
        if let Some(rounds) = magazine {
            state.insert_magazine(mag(1, rounds)).unwrap();
        }
        if chambered {
            state.chamber = ChamberedRound::loaded("m855", 1.0);
        }
        state
    }

    fn rifle() -> WeaponData {
        WeaponData::new("m4a1", "556x45", 2.0, 3.0)
    }

    #[test]
    fn test_nothing_to_do_when_loaded() {
        assert_eq!(resolve_reload_type(&state(true, Some(20)), None, false), ReloadType::None);
        assert_eq!(resolve_reload_type(&state(true, Some(0)), None, false), ReloadType::None);
    }

    #[test]
    fn test_full_and_chambered_still_tactical() {
        let offered = mag(2, 30);
        assert_eq!(
            resolve_reload_type(&state(true, Some(30)), Some(&offered), false),
            ReloadType::Tactical
        );
    }

    #[test]
    fn test_empty_reload() {
        let offered = mag(2, 30);
        assert_eq!(resolve_reload_type(&state(false, None), Some(&offered), false), ReloadType::Empty);
        assert_eq!(resolve_reload_type(&state(false, Some(0)), Some(&offered), false), ReloadType::Empty);
        assert_eq!(resolve_reload_type(&state(false, Some(5)), Some(&offered), false), ReloadType::Empty);
    }

    #[test]
    fn test_emergency_overrides() {
        let offered = mag(2, 30);
        assert_eq!(
            resolve_reload_type(&state(true, Some(3)), Some(&offered), true),
            ReloadType::Emergency
        );
        assert_eq!(
            resolve_reload_type(&state(false, None), Some(&offered), true),
            ReloadType::Emergency
        );
        // Emergency needs something to put in
        assert_eq!(resolve_reload_type(&state(false, Some(0)), None, true), ReloadType::None);
    }

    #[test]
    fn test_chamber_only() {
        assert_eq!(resolve_reload_type(&state(false, Some(10)), None, false), ReloadType::ChamberOnly);
        assert_eq!(resolve_reload_type(&state(false, Some(0)), None, false), ReloadType::None);
        assert_eq!(resolve_reload_type(&state(false, None), None, false), ReloadType::None);
    }

    #[test]
    fn test_empty_candidate_is_no_candidate() {
        let dry = mag(2, 0);
        assert_eq!(resolve_reload_type(&state(false, Some(10)), Some(&dry), false), ReloadType::ChamberOnly);
        assert_eq!(resolve_reload_type(&state(true, Some(10)), Some(&dry), false), ReloadType::None);
    }

    #[test]
    fn test_durations() {
        let config = AmmoConfig::default();
        let data = MagazineData::new("stanag_30", "556x45", 30).with_reload_modifier(1.5);

        let tactical = reload_duration(ReloadType::Tactical, Some(&data), &rifle(), &config).unwrap();
        assert!((tactical - 3.0).abs() < 1e-6);

        let empty = reload_duration(ReloadType::Empty, Some(&data), &rifle(), &config).unwrap();
        assert!((empty - 4.5).abs() < 1e-6);

        let emergency = reload_duration(ReloadType::Emergency, None, &rifle(), &config).unwrap();
        assert!((emergency - 1.6).abs() < 1e-6);

        let rack = reload_duration(ReloadType::ChamberOnly, Some(&data), &rifle(), &config).unwrap();
        assert_eq!(rack, config.chamber_only_duration);
    }

    #[test]
    fn test_duration_never_zero() {
        let no_emergency = AmmoConfig::default().with_emergency_factor(0.0);
        assert!(matches!(
            reload_duration(ReloadType::Emergency, None, &rifle(), &no_emergency),
            Err(Error::InvalidConfig(_))
        ));

        let instant_rack = AmmoConfig {
            chamber_only_duration: 0.0,
            ..AmmoConfig::default()
        };
        assert!(matches!(
            reload_duration(ReloadType::ChamberOnly, None, &rifle(), &instant_rack),
            Err(Error::InvalidConfig(_))
        ));
        assert!(reload_duration(ReloadType::Tactical, None, &rifle(), &instant_rack).is_ok());
    }

    #[test]
    fn test_duration_rejects_bad_weapon_data() {
        let config = AmmoConfig::default();
        let broken = WeaponData::new("broken", "556x45", 0.0, 3.0);
        assert!(matches!(
            reload_duration(ReloadType::Tactical, None, &broken, &config),
            Err(Error::InvalidWeaponData(_))
        ));
        assert!(matches!(
            reload_duration(ReloadType::Emergency, None, &broken, &config),
            Err(Error::InvalidWeaponData(_))
        ));
        // Full time is fine, so an empty reload still works
        assert!(reload_duration(ReloadType::Empty, None, &broken, &config).is_ok());
        assert_eq!(
            reload_duration(ReloadType::None, None, &rifle(), &config),
            Err(Error::NoReloadNeeded)
        );
    }
}
