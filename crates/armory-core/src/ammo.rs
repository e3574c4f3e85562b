//! Ammunition state model: magazine instances, the chamber, and the
//! aggregate per-weapon state
//!
//! These types carry no policy. They know their own invariants and offer
//! small mutators; everything that decides *whether* a transition is allowed
//! lives in [`MagazineStateMachine`](crate::MagazineStateMachine).

use crate::{DefId, Error, MagazineId, Result, SlotIndex};
use serde::{Deserialize, Serialize};

/// Highest durability a magazine can have
pub const MAX_DURABILITY: f32 = 100.0;

/// A physical magazine with its own round count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagazineInstance {
    /// Unique instance identifier
    pub id: MagazineId,
    /// Static magazine kind (row in the magazine table)
    pub kind: DefId,
    /// Ammo type of the rounds inside; all rounds share one type
    pub loaded_ammo: Option<DefId>,
    /// Rounds currently held
    pub current_rounds: u32,
    /// Capacity cached from static data
    pub max_capacity: u32,
    /// Durability in `0.0..=100.0`
    pub durability: f32,
    /// Whether this magazine sits in a weapon right now
    pub inserted: bool,
    /// Quick slot this magazine was drawn from, `None` for general storage
    pub origin_slot: Option<SlotIndex>,
}

impl MagazineInstance {
    /// Create an empty, undamaged magazine
    pub fn new(id: MagazineId, kind: impl Into<DefId>, max_capacity: u32) -> Self {
        Self {
            id,
            kind: kind.into(),
            loaded_ammo: None,
            current_rounds: 0,
            max_capacity,
            durability: MAX_DURABILITY,
            inserted: false,
            origin_slot: None,
        }
    }

    /// Builder: fill with rounds of one ammo type (clamped to capacity)
    pub fn with_rounds(mut self, ammo: impl Into<DefId>, count: u32) -> Self {
        self.load_rounds(ammo, count);
        self
    }

    /// Builder: remember the quick slot this magazine came from
    pub fn from_slot(mut self, slot: SlotIndex) -> Self {
        self.origin_slot = Some(slot);
        self
    }

    /// No rounds left
    pub fn is_empty(&self) -> bool {
        self.current_rounds == 0
    }

    /// At capacity
    pub fn is_full(&self) -> bool {
        self.current_rounds >= self.max_capacity
    }

    /// Free space for more rounds
    pub fn available_space(&self) -> u32 {
        self.max_capacity.saturating_sub(self.current_rounds)
    }

    /// Has at least one round of a known type
    pub fn has_ammo(&self) -> bool {
        self.current_rounds > 0 && self.loaded_ammo.is_some()
    }

    /// Fill level in `0.0..=1.0`
    pub fn fill_ratio(&self) -> f32 {
        if self.max_capacity == 0 {
            0.0
        } else {
            self.current_rounds as f32 / self.max_capacity as f32
        }
    }

    /// Load rounds, returning how many actually went in
    ///
    /// A magazine holds a single ammo type, so loading a different type into
    /// a non-empty magazine loads nothing.
    pub fn load_rounds(&mut self, ammo: impl Into<DefId>, count: u32) -> u32 {
        let ammo = ammo.into();
        if self.has_ammo() && self.loaded_ammo.as_ref() != Some(&ammo) {
            return 0;
        }

        let loaded = count.min(self.available_space());
        if loaded > 0 {
            self.loaded_ammo = Some(ammo);
            self.current_rounds += loaded;
        }
        loaded
    }

    /// Unload rounds (`0` means all), returning how many came out
    pub fn unload_rounds(&mut self, count: u32) -> u32 {
        let wanted = if count == 0 { self.current_rounds } else { count };
        let unloaded = wanted.min(self.current_rounds);
        self.current_rounds -= unloaded;
        if self.current_rounds == 0 {
            self.loaded_ammo = None;
        }
        unloaded
    }

    /// Take the top round, returning its ammo type
    pub fn feed_round(&mut self) -> Option<DefId> {
        if self.current_rounds == 0 {
            return None;
        }
        let ammo = self.loaded_ammo.clone()?;
        self.current_rounds -= 1;
        if self.current_rounds == 0 {
            self.loaded_ammo = None;
        }
        Some(ammo)
    }

    /// Check the instance invariants
    pub fn validate(&self) -> Result<()> {
        if self.max_capacity == 0 {
            return Err(Error::InvalidMagazine(format!(
                "{} has zero capacity",
                self.id
            )));
        }
        if self.current_rounds > self.max_capacity {
            return Err(Error::InvalidMagazine(format!(
                "{} holds {} rounds, capacity {}",
                self.id, self.current_rounds, self.max_capacity
            )));
        }
        if self.loaded_ammo.is_some() != (self.current_rounds > 0) {
            return Err(Error::InvalidMagazine(format!(
                "{} ammo type {:?} does not match round count {}",
                self.id, self.loaded_ammo, self.current_rounds
            )));
        }
        if !(0.0..=MAX_DURABILITY).contains(&self.durability) {
            return Err(Error::InvalidMagazine(format!(
                "{} durability {} out of range",
                self.id, self.durability
            )));
        }
        Ok(())
    }
}

/// The single round sitting in the chamber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChamberedRound {
    /// Ammo type, `None` when the chamber is empty
    pub ammo: Option<DefId>,
    /// Condition in `0.0..=1.0`; only meaningful when `ammo` is set
    pub condition: f32,
}

impl ChamberedRound {
    /// A chambered round of the given type
    pub fn loaded(ammo: impl Into<DefId>, condition: f32) -> Self {
        Self {
            ammo: Some(ammo.into()),
            condition: condition.clamp(0.0, 1.0),
        }
    }

    /// Whether a round sits in the chamber
    pub fn is_chambered(&self) -> bool {
        self.ammo.is_some()
    }

    /// Put a round in the chamber
    pub fn chamber(&mut self, ammo: impl Into<DefId>, condition: f32) {
        self.ammo = Some(ammo.into());
        self.condition = condition.clamp(0.0, 1.0);
    }

    /// Empty the chamber
    pub fn clear(&mut self) {
        self.ammo = None;
        self.condition = 1.0;
    }
}

impl Default for ChamberedRound {
    fn default() -> Self {
        Self {
            ammo: None,
            condition: 1.0,
        }
    }
}

/// Complete ammunition state of one weapon
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeaponAmmoState {
    /// Inserted magazine, if any
    pub magazine: Option<MagazineInstance>,
    /// Chamber contents
    pub chamber: ChamberedRound,
}

impl WeaponAmmoState {
    /// An empty weapon: no magazine, nothing chambered
    pub fn new() -> Self {
        Self::default()
    }

    /// Derived from magazine presence, so it can never disagree with it
    pub fn has_magazine(&self) -> bool {
        self.magazine.is_some()
    }

    /// A round is chambered
    pub fn is_ready_to_fire(&self) -> bool {
        self.chamber.is_chambered()
    }

    /// True when there is no magazine or the magazine is empty
    pub fn is_magazine_empty(&self) -> bool {
        self.magazine.as_ref().map_or(true, |m| m.is_empty())
    }

    /// Rounds in the magazine (0 without one)
    pub fn magazine_rounds(&self) -> u32 {
        self.magazine.as_ref().map_or(0, |m| m.current_rounds)
    }

    /// Chamber plus magazine
    pub fn total_rounds(&self) -> u32 {
        u32::from(self.chamber.is_chambered()) + self.magazine_rounds()
    }

    /// Insert a magazine, marking it inserted
    pub fn insert_magazine(&mut self, mut magazine: MagazineInstance) -> Result<()> {
        if self.magazine.is_some() {
            return Err(Error::SlotOccupied);
        }
        magazine.inserted = true;
        self.magazine = Some(magazine);
        Ok(())
    }

    /// Remove the magazine, clearing its inserted flag
    pub fn eject_magazine(&mut self) -> Result<MagazineInstance> {
        let mut magazine = self.magazine.take().ok_or(Error::NoMagazine)?;
        magazine.inserted = false;
        Ok(magazine)
    }

    /// Feed one round from the magazine into the chamber
    pub fn chamber_from_magazine(&mut self) -> Result<DefId> {
        if self.chamber.is_chambered() {
            return Err(Error::AlreadyChambered);
        }
        let ammo = self
            .magazine
            .as_mut()
            .and_then(|m| m.feed_round())
            .ok_or(Error::NoAmmoAvailable)?;
        self.chamber.chamber(ammo.clone(), 1.0);
        Ok(ammo)
    }

    /// Consume the chambered round, optionally cycling the next one in
    ///
    /// Returns the ammo type that was fired. An empty magazine after the shot
    /// is the normal "last round" state, not an error.
    pub fn fire(&mut self, auto_chamber: bool) -> Result<DefId> {
        let fired = self.chamber.ammo.clone().ok_or(Error::ChamberEmpty)?;
        self.chamber.clear();
        if auto_chamber {
            let _ = self.chamber_from_magazine();
        }
        Ok(fired)
    }

    /// Clear the chamber without firing, returning what was in it
    pub fn eject_chambered_round(&mut self) -> ChamberedRound {
        std::mem::take(&mut self.chamber)
    }

    /// Check every invariant of the aggregate state
    pub fn validate(&self) -> Result<()> {
        if let Some(magazine) = &self.magazine {
            magazine
                .validate()
                .map_err(|e| Error::CorruptedState(e.to_string()))?;
            if !magazine.inserted {
                return Err(Error::CorruptedState(format!(
                    "{} is in the weapon but not flagged inserted",
                    magazine.id
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.chamber.condition) {
            return Err(Error::CorruptedState(format!(
                "chamber condition {} out of range",
                self.chamber.condition
            )));
        }
        Ok(())
    }
}

/// Flat save/network record of a [`WeaponAmmoState`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmmoSnapshot {
    pub magazine: Option<MagazineInstance>,
    pub chambered: Option<ChamberedRound>,
    pub has_magazine: bool,
}

impl From<&WeaponAmmoState> for AmmoSnapshot {
    fn from(state: &WeaponAmmoState) -> Self {
        Self {
            magazine: state.magazine.clone(),
            chambered: state
                .chamber
                .is_chambered()
                .then(|| state.chamber.clone()),
            has_magazine: state.has_magazine(),
        }
    }
}

impl WeaponAmmoState {
    /// Flat record of this state
    pub fn snapshot(&self) -> AmmoSnapshot {
        AmmoSnapshot::from(self)
    }

    /// Rebuild a state from a flat record, rejecting inconsistent records
    pub fn from_snapshot(snapshot: AmmoSnapshot) -> Result<Self> {
        if snapshot.has_magazine != snapshot.magazine.is_some() {
            return Err(Error::CorruptedState(format!(
                "has_magazine is {} but magazine is {}",
                snapshot.has_magazine,
                if snapshot.magazine.is_some() { "present" } else { "absent" }
            )));
        }
        let chamber = match snapshot.chambered {
            Some(round) if !round.is_chambered() => {
                return Err(Error::CorruptedState(
                    "chambered record without an ammo type".into(),
                ))
            }
            Some(round) => round,
            None => ChamberedRound::default(),
        };

        let state = Self {
            magazine: snapshot.magazine,
            chamber,
        };
        state.validate()?;
        Ok(state)
    }
}
