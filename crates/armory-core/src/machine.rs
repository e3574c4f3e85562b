//! The magazine state machine
//!
//! All legality checks for weapon ammunition live here. The machine owns one
//! [`WeaponAmmoState`], asks a [`MagazineDataSource`] about magazine kinds and
//! reports every successful transition to a [`NotificationSink`].
//!
//! Reloads are two-phase. [`start_reload`](MagazineStateMachine::start_reload)
//! validates and records the transition, the caller runs a timer, and
//! [`complete_reload`](MagazineStateMachine::complete_reload) applies it.
//! Nothing in between touches the magazine or the chamber.
//!
//! Every mutating transition first checks the whole state. A broken
//! invariant aborts the transition with [`Error::CorruptedState`] and latches
//! [`needs_resync`](MagazineStateMachine::needs_resync) until a snapshot is
//! applied.

use crate::{
    reload_duration, resolve_reload_type, AmmoConfig, AmmoEvent, AmmoSnapshot, ChamberedRound,
    DefId, Error, IncomingMagazine, MagazineDataSource, MagazineInstance, NotificationSink,
    NullSink, ReloadRequest, ReloadType, Result, WeaponAmmoState, WeaponData,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// A reload that has started but not completed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingReload {
    pub reload_type: ReloadType,
    /// Seconds until the reload may complete
    pub duration: f32,
    /// Magazine that goes in on completion
    pub incoming: Option<IncomingMagazine>,
}

/// What a completed reload or swap did
#[derive(Debug, Clone, PartialEq)]
pub struct ReloadOutcome {
    pub reload_type: ReloadType,
    /// Magazine taken out of the weapon
    pub ejected: Option<MagazineInstance>,
    /// The ejected magazine went to the ground instead of back to the owner
    pub dropped: bool,
}

/// Ammunition state machine for one weapon
///
/// Generic over the static-data lookup `D` and the notification sink `S`.
pub struct MagazineStateMachine<D: MagazineDataSource, S: NotificationSink = NullSink> {
    weapon: WeaponData,
    data: D,
    sink: S,
    config: AmmoConfig,
    state: WeaponAmmoState,
    pending: Option<PendingReload>,
    needs_resync: bool,
}

impl<D: MagazineDataSource, S: NotificationSink> MagazineStateMachine<D, S> {
    /// Create a machine for an empty weapon
    ///
    /// Fails when `config` is out of range.
    pub fn new(weapon: WeaponData, data: D, sink: S, config: AmmoConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            weapon,
            data,
            sink,
            config,
            state: WeaponAmmoState::new(),
            pending: None,
            needs_resync: false,
        })
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Current ammunition state
    pub fn state(&self) -> &WeaponAmmoState {
        &self.state
    }

    /// Static record of the weapon
    pub fn weapon(&self) -> &WeaponData {
        &self.weapon
    }

    /// Tuning values in use
    pub fn config(&self) -> &AmmoConfig {
        &self.config
    }

    /// Magazine data lookup
    pub fn data(&self) -> &D {
        &self.data
    }

    /// Get the notification sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Get the notification sink mutably
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// The reload waiting for completion, if any
    pub fn pending_reload(&self) -> Option<&PendingReload> {
        self.pending.as_ref()
    }

    /// Whether a reload has started and not finished
    pub fn is_reloading(&self) -> bool {
        self.pending.is_some()
    }

    /// True after a corrupted state was detected, until a snapshot is applied
    pub fn needs_resync(&self) -> bool {
        self.needs_resync
    }

    /// Ammo type that fires next: the chambered round, else the magazine's
    pub fn loaded_ammo_type(&self) -> Option<&DefId> {
        self.state.chamber.ammo.as_ref().or_else(|| {
            self.state
                .magazine
                .as_ref()
                .and_then(|m| m.loaded_ammo.as_ref())
        })
    }

    /// Which reload the current state allows with `candidate`
    pub fn resolve(&self, candidate: Option<&MagazineInstance>, emergency: bool) -> ReloadType {
        resolve_reload_type(&self.state, candidate, emergency)
    }

    /// Whether a reload with `candidate` could start right now
    pub fn can_reload(&self, candidate: Option<&MagazineInstance>) -> bool {
        !self.needs_resync && self.pending.is_none() && !self.resolve(candidate, false).is_none()
    }

    /// Check a magazine could go into this weapon, without changing anything
    pub fn validate_magazine(&self, magazine: &MagazineInstance) -> Result<()> {
        magazine.validate()?;
        let data = self.data.require_magazine(&magazine.kind)?;
        if !data.accepts_caliber(&self.weapon.caliber) {
            return Err(Error::IncompatibleCaliber {
                magazine: magazine.kind.clone(),
                expected: self.weapon.caliber.clone(),
                found: data.caliber.clone(),
            });
        }
        if magazine.max_capacity != data.max_capacity {
            return Err(Error::InvalidMagazine(format!(
                "{} claims capacity {}, {} holds {}",
                magazine.id, magazine.max_capacity, data.id, data.max_capacity
            )));
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Transitions
    // ---------------------------------------------------------------------

    /// Put a magazine into an empty weapon
    pub fn insert_magazine(&mut self, magazine: MagazineInstance) -> Result<()> {
        self.guard()?;
        self.ensure_idle()?;
        if self.state.has_magazine() {
            return Err(Error::SlotOccupied);
        }
        self.validate_magazine(&magazine)?;

        debug!(magazine = %magazine.id, rounds = magazine.current_rounds, "insert magazine");
        self.state.insert_magazine(magazine)?;
        self.emit_magazine();
        Ok(())
    }

    /// Take the magazine out
    ///
    /// Where it goes is up to the caller; `drop_to_ground` is only recorded.
    pub fn eject_magazine(&mut self, drop_to_ground: bool) -> Result<MagazineInstance> {
        self.guard()?;
        self.ensure_idle()?;
        let magazine = self.state.eject_magazine()?;

        debug!(magazine = %magazine.id, drop_to_ground, "eject magazine");
        self.emit_magazine();
        Ok(magazine)
    }

    /// Feed the top round of the magazine into the chamber
    pub fn chamber_from_magazine(&mut self) -> Result<DefId> {
        self.guard()?;
        let ammo = self.state.chamber_from_magazine()?;

        debug!(ammo = %ammo, left = self.state.magazine_rounds(), "chamber round");
        self.emit_chamber();
        self.emit_magazine();
        Ok(ammo)
    }

    /// Fire the chambered round, returning its ammo type
    pub fn fire(&mut self, auto_chamber: bool) -> Result<DefId> {
        self.guard()?;
        let rounds_before = self.state.magazine_rounds();
        let fired = self.state.fire(auto_chamber)?;

        debug!(ammo = %fired, auto_chamber, "fire");
        self.emit_chamber();
        if self.state.magazine_rounds() != rounds_before {
            self.emit_magazine();
        }
        Ok(fired)
    }

    /// Clear the chamber without firing
    ///
    /// Succeeds on every consistent state, chambered or not.
    pub fn eject_chambered_round(&mut self) -> Result<ChamberedRound> {
        self.guard()?;
        let round = self.state.eject_chambered_round();
        if round.is_chambered() {
            debug!(ammo = ?round.ammo, "eject chambered round");
            self.emit_chamber();
        }
        Ok(round)
    }

    /// Validate and record a reload, returning its duration in seconds
    ///
    /// Does not touch the magazine or the chamber.
    pub fn start_reload(&mut self, request: ReloadRequest) -> Result<f32> {
        self.guard()?;
        self.ensure_idle()?;

        let requested = request.reload_type;
        let resolved = self.resolve(request.magazine(), requested == ReloadType::Emergency);
        if resolved.is_none() {
            return Err(Error::NoReloadNeeded);
        }
        if resolved != requested {
            return Err(Error::ReloadTypeMismatch {
                requested,
                resolved,
            });
        }

        let incoming = if resolved.swaps_magazine() {
            request.incoming
        } else {
            None
        };
        let data = match &incoming {
            Some(incoming) => {
                self.validate_magazine(&incoming.magazine)?;
                Some(self.data.require_magazine(&incoming.magazine.kind)?)
            }
            None => None,
        };
        let duration = reload_duration(resolved, data, &self.weapon, &self.config)?;

        info!(
            weapon = %self.weapon.id,
            reload_type = ?resolved,
            duration,
            "reload started"
        );
        self.pending = Some(PendingReload {
            reload_type: resolved,
            duration,
            incoming,
        });
        self.sink.notify(AmmoEvent::ReloadStateChanged {
            is_reloading: true,
            reload_type: resolved,
            duration,
        });
        Ok(duration)
    }

    /// Apply the pending reload
    ///
    /// The pending reload is consumed whether or not this succeeds, and the
    /// end of the reload is always reported.
    pub fn complete_reload(&mut self) -> Result<ReloadOutcome> {
        self.guard()?;
        let pending = self.pending.take().ok_or(Error::NoPendingReload)?;
        let reload_type = pending.reload_type;
        let result = self.apply_reload(pending);
        self.emit_reload_finished(reload_type);
        result
    }

    fn apply_reload(&mut self, pending: PendingReload) -> Result<ReloadOutcome> {
        let reload_type = pending.reload_type;

        let mut outcome = ReloadOutcome {
            reload_type,
            ejected: None,
            dropped: false,
        };

        if reload_type.swaps_magazine() {
            let incoming = pending.incoming.ok_or_else(|| {
                Error::CorruptedState(format!("{reload_type:?} reload pending without a magazine"))
            })?;
            outcome.ejected = self.swap_in(incoming.magazine);
            outcome.dropped = reload_type.drops_magazine() && outcome.ejected.is_some();
            self.chamber_if_empty();
        } else if !self.state.chamber.is_chambered() {
            // Skipped when a round was chambered by hand meanwhile
            self.state.chamber_from_magazine()?;
            self.emit_chamber();
            self.emit_magazine();
        }

        info!(
            weapon = %self.weapon.id,
            reload_type = ?reload_type,
            ejected = ?outcome.ejected.as_ref().map(|m| m.id),
            dropped = outcome.dropped,
            "reload completed"
        );
        Ok(outcome)
    }

    /// Drop the pending reload, if any
    pub fn cancel_reload(&mut self) -> Option<PendingReload> {
        let pending = self.pending.take()?;
        debug!(reload_type = ?pending.reload_type, "reload cancelled");
        self.emit_reload_finished(pending.reload_type);
        Some(pending)
    }

    /// Swap magazines immediately
    ///
    /// Validates `incoming` before touching anything, ejects the current
    /// magazine, inserts `incoming` and chambers if the chamber is empty.
    pub fn swap_magazine(
        &mut self,
        incoming: MagazineInstance,
        emergency_drop: bool,
    ) -> Result<ReloadOutcome> {
        self.guard()?;
        self.ensure_idle()?;
        self.validate_magazine(&incoming)?;

        let reload_type = if emergency_drop {
            ReloadType::Emergency
        } else if self.state.chamber.is_chambered() {
            ReloadType::Tactical
        } else {
            ReloadType::Empty
        };

        debug!(magazine = %incoming.id, emergency_drop, "swap magazine");
        let ejected = self.swap_in(incoming);
        self.chamber_if_empty();
        Ok(ReloadOutcome {
            reload_type,
            dropped: emergency_drop && ejected.is_some(),
            ejected,
        })
    }

    // ---------------------------------------------------------------------
    // Snapshot / restore
    // ---------------------------------------------------------------------

    /// Flat record of the current state
    pub fn snapshot(&self) -> AmmoSnapshot {
        self.state.snapshot()
    }

    /// Replace the state from a flat record
    ///
    /// Clears any pending reload and the resync flag.
    pub fn apply_snapshot(&mut self, snapshot: AmmoSnapshot) -> Result<()> {
        let state = WeaponAmmoState::from_snapshot(snapshot)?;
        self.restore(state)
    }

    /// Replace the state with an exact copy, after checking it
    pub fn restore(&mut self, state: WeaponAmmoState) -> Result<()> {
        state.validate()?;
        let chamber_changed = state.chamber != self.state.chamber;
        self.state = state;
        self.needs_resync = false;
        if let Some(pending) = self.pending.take() {
            self.emit_reload_finished(pending.reload_type);
        }

        debug!(rounds = self.state.total_rounds(), "state restored");
        self.emit_magazine();
        if chamber_changed {
            self.emit_chamber();
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn guard(&mut self) -> Result<()> {
        if self.needs_resync {
            return Err(Error::CorruptedState("waiting for resync".into()));
        }
        if let Err(err) = self.state.validate() {
            error!(weapon = %self.weapon.id, error = %err, "ammo state corrupted");
            self.needs_resync = true;
            return Err(err);
        }
        Ok(())
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.pending.is_some() {
            return Err(Error::ReloadInProgress);
        }
        Ok(())
    }

    /// Replace the magazine, returning the old one
    fn swap_in(&mut self, mut incoming: MagazineInstance) -> Option<MagazineInstance> {
        let ejected = self.state.magazine.take().map(|mut m| {
            m.inserted = false;
            m
        });
        incoming.inserted = true;
        self.state.magazine = Some(incoming);
        self.emit_magazine();
        ejected
    }

    fn chamber_if_empty(&mut self) {
        if !self.state.chamber.is_chambered() && self.state.chamber_from_magazine().is_ok() {
            self.emit_chamber();
            self.emit_magazine();
        }
    }

    fn emit_magazine(&mut self) {
        let (magazine, rounds) = match &self.state.magazine {
            Some(m) => (Some(m.id), m.current_rounds),
            None => (None, 0),
        };
        self.sink
            .notify(AmmoEvent::MagazineChanged { magazine, rounds });
    }

    fn emit_chamber(&mut self) {
        self.sink.notify(AmmoEvent::ChamberStateChanged {
            has_round: self.state.chamber.is_chambered(),
        });
    }

    fn emit_reload_finished(&mut self, reload_type: ReloadType) {
        self.sink.notify(AmmoEvent::ReloadStateChanged {
            is_reloading: false,
            reload_type,
            duration: 0.0,
        });
    }
}

impl<D, S> std::fmt::Debug for MagazineStateMachine<D, S>
where
    D: MagazineDataSource,
    S: NotificationSink,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MagazineStateMachine")
            .field("weapon", &self.weapon.id)
            .field("state", &self.state)
            .field("pending", &self.pending)
            .field("needs_resync", &self.needs_resync)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventLog, MagazineCatalog, MagazineData, MagazineId};

    fn catalog() -> MagazineCatalog {
        MagazineCatalog::new()
            .with(MagazineData::new("stanag_30", "556x45", 30).with_reload_modifier(1.0))
            .with(MagazineData::new("akm_30", "762x39", 30))
    }

    fn machine() -> MagazineStateMachine<MagazineCatalog, EventLog> {
        machine_with(AmmoConfig::default()).unwrap()
    }

    fn machine_with(config: AmmoConfig) -> Result<MagazineStateMachine<MagazineCatalog, EventLog>> {
        MagazineStateMachine::new(
            WeaponData::new("m4a1", "556x45", 2.0, 3.0),
            catalog(),
            EventLog::new(),
            config,
        )
    }

    fn stanag(id: u64, rounds: u32) -> MagazineInstance {
        MagazineInstance::new(MagazineId::new(id), "stanag_30", 30).with_rounds("m855", rounds)
    }

    fn loaded_machine(rounds: u32) -> MagazineStateMachine<MagazineCatalog, EventLog> {
        let mut m = machine();
        m.insert_magazine(stanag(1, rounds)).unwrap();
        m.chamber_from_magazine().unwrap();
        m.sink_mut().drain();
        m
    }

    fn assert_round_invariants(state: &WeaponAmmoState) {
        if let Some(mag) = &state.magazine {
            assert!(mag.current_rounds <= mag.max_capacity);
        }
        assert_eq!(
            state.total_rounds(),
            u32::from(state.chamber.is_chambered())
                + state.magazine.as_ref().map_or(0, |m| m.current_rounds)
        );
    }

    #[test]
    fn test_insert_eject_roundtrip() {
        let mut m = machine();
        let mag = stanag(1, 17);
        m.insert_magazine(mag.clone()).unwrap();
        assert!(m.state().has_magazine());
        assert_eq!(m.insert_magazine(stanag(2, 30)), Err(Error::SlotOccupied));

        let ejected = m.eject_magazine(false).unwrap();
        assert_eq!(ejected, mag);
        assert_eq!(m.eject_magazine(false), Err(Error::NoMagazine));
    }

    #[test]
    fn test_insert_rejects_wrong_caliber() {
        let mut m = machine();
        let akm = MagazineInstance::new(MagazineId::new(5), "akm_30", 30).with_rounds("m43", 30);
        assert!(matches!(
            m.insert_magazine(akm),
            Err(Error::IncompatibleCaliber { .. })
        ));

        let unknown = MagazineInstance::new(MagazineId::new(6), "drum_100", 100);
        assert_eq!(
            m.insert_magazine(unknown),
            Err(Error::UnknownMagazineType(DefId::new("drum_100")))
        );
        assert!(!m.state().has_magazine());
    }

    #[test]
    fn test_chamber_errors() {
        let mut m = machine();
        assert_eq!(m.chamber_from_magazine(), Err(Error::NoAmmoAvailable));
        m.insert_magazine(stanag(1, 0)).unwrap();
        assert_eq!(m.chamber_from_magazine(), Err(Error::NoAmmoAvailable));

        let mut m = loaded_machine(5);
        assert_eq!(m.chamber_from_magazine(), Err(Error::AlreadyChambered));
        assert_eq!(m.state().magazine_rounds(), 4);
    }

    #[test]
    fn test_fire_auto_chamber_clears_type() {
        let mut m = machine();
        m.insert_magazine(stanag(1, 2)).unwrap();
        m.chamber_from_magazine().unwrap();
        assert_eq!(m.state().magazine_rounds(), 1);

        assert_eq!(m.fire(true).unwrap(), DefId::new("m855"));
        assert!(m.state().chamber.is_chambered());
        assert_eq!(m.state().magazine_rounds(), 0);
        assert!(m.state().magazine.as_ref().unwrap().loaded_ammo.is_none());
        assert_eq!(m.loaded_ammo_type(), Some(&DefId::new("m855")));
    }

    #[test]
    fn test_full_magazine_scenario() {
        let mut m = machine();
        m.insert_magazine(stanag(1, 30)).unwrap();
        assert!(!m.state().chamber.is_chambered());

        m.chamber_from_magazine().unwrap();
        assert_eq!(m.state().magazine_rounds(), 29);

        for _ in 0..29 {
            assert_eq!(m.fire(true).unwrap(), DefId::new("m855"));
            assert_round_invariants(m.state());
        }
        assert!(m.state().chamber.is_chambered());
        let mag = m.state().magazine.as_ref().unwrap();
        assert_eq!(mag.current_rounds, 0);
        assert!(mag.loaded_ammo.is_none());

        assert_eq!(m.fire(true).unwrap(), DefId::new("m855"));
        assert!(!m.state().chamber.is_chambered());
        assert_eq!(m.state().magazine_rounds(), 0);
        assert_eq!(m.fire(true), Err(Error::ChamberEmpty));
        assert_eq!(m.loaded_ammo_type(), None);
    }

    #[test]
    fn test_eject_chambered_round() {
        let mut m = machine();
        assert!(!m.eject_chambered_round().unwrap().is_chambered());

        let mut m = loaded_machine(10);
        let round = m.eject_chambered_round().unwrap();
        assert_eq!(round.ammo, Some(DefId::new("m855")));
        assert!(!m.state().chamber.is_chambered());
        assert_eq!(m.state().magazine_rounds(), 9);
    }

    #[test]
    fn test_tactical_reload_two_phase() {
        let mut m = loaded_machine(10);
        let before = m.state().clone();

        let duration = m
            .start_reload(ReloadRequest::from_inventory(ReloadType::Tactical, stanag(2, 30)))
            .unwrap();
        assert!((duration - 2.0).abs() < 1e-6);
        assert!(m.is_reloading());
        assert_eq!(m.state(), &before);

        let outcome = m.complete_reload().unwrap();
        assert_eq!(outcome.reload_type, ReloadType::Tactical);
        assert!(!outcome.dropped);
        let ejected = outcome.ejected.unwrap();
        assert_eq!(ejected.id, MagazineId::new(1));
        assert!(!ejected.inserted);
        assert_eq!(ejected.current_rounds, 9);

        // Chamber already had a round, so the new magazine stays full
        assert_eq!(m.state().magazine_rounds(), 30);
        assert!(!m.is_reloading());
        assert_eq!(m.complete_reload().unwrap_err(), Error::NoPendingReload);
    }

    #[test]
    fn test_empty_reload_chambers() {
        let mut m = machine();
        m.insert_magazine(stanag(1, 0)).unwrap();

        let duration = m
            .start_reload(ReloadRequest::from_inventory(ReloadType::Empty, stanag(2, 30)))
            .unwrap();
        assert!((duration - 3.0).abs() < 1e-6);

        m.complete_reload().unwrap();
        assert!(m.state().chamber.is_chambered());
        assert_eq!(m.state().magazine_rounds(), 29);
    }

    #[test]
    fn test_emergency_reload_drops() {
        let mut m = loaded_machine(3);
        let duration = m
            .start_reload(ReloadRequest::from_inventory(ReloadType::Emergency, stanag(2, 30)))
            .unwrap();
        assert!((duration - 1.6).abs() < 1e-6);

        let outcome = m.complete_reload().unwrap();
        assert!(outcome.dropped);
        assert_eq!(outcome.ejected.map(|m| m.id), Some(MagazineId::new(1)));
    }

    #[test]
    fn test_chamber_only_reload() {
        let mut m = machine();
        m.insert_magazine(stanag(1, 5)).unwrap();

        let duration = m.start_reload(ReloadRequest::chamber_only()).unwrap();
        assert_eq!(duration, m.config().chamber_only_duration);

        let outcome = m.complete_reload().unwrap();
        assert_eq!(outcome.ejected, None);
        assert!(m.state().chamber.is_chambered());
        assert_eq!(m.state().magazine_rounds(), 4);
    }

    #[test]
    fn test_chamber_only_after_manual_chamber() {
        let mut m = machine();
        m.insert_magazine(stanag(1, 10)).unwrap();
        m.start_reload(ReloadRequest::chamber_only()).unwrap();
        m.chamber_from_magazine().unwrap();
        m.sink_mut().drain();

        let outcome = m.complete_reload().unwrap();
        assert_eq!(outcome.reload_type, ReloadType::ChamberOnly);
        assert!(!m.is_reloading());
        assert_eq!(m.state().magazine_rounds(), 9);
        assert_eq!(
            m.sink().events(),
            &[AmmoEvent::ReloadStateChanged {
                is_reloading: false,
                reload_type: ReloadType::ChamberOnly,
                duration: 0.0,
            }]
        );
    }

    #[test]
    fn test_failed_completion_still_ends_reload() {
        let mut m = machine();
        m.insert_magazine(stanag(1, 1)).unwrap();
        m.start_reload(ReloadRequest::chamber_only()).unwrap();
        // Rounds taken out behind the machine's back
        m.state.magazine.as_mut().unwrap().unload_rounds(0);
        m.sink_mut().drain();

        assert_eq!(m.complete_reload().unwrap_err(), Error::NoAmmoAvailable);
        assert!(!m.is_reloading());
        assert!(m.sink().events().contains(&AmmoEvent::ReloadStateChanged {
            is_reloading: false,
            reload_type: ReloadType::ChamberOnly,
            duration: 0.0,
        }));
    }

    #[test]
    fn test_new_rejects_bad_config() {
        let zero_emergency = AmmoConfig::default().with_emergency_factor(0.0);
        assert!(matches!(machine_with(zero_emergency), Err(Error::InvalidConfig(_))));

        let instant_chamber = AmmoConfig {
            chamber_only_duration: 0.0,
            ..AmmoConfig::default()
        };
        assert!(matches!(machine_with(instant_chamber), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_start_reload_rejections() {
        let mut m = loaded_machine(10);
        assert_eq!(m.start_reload(ReloadRequest::chamber_only()), Err(Error::NoReloadNeeded));
        assert_eq!(
            m.start_reload(ReloadRequest::from_inventory(ReloadType::Empty, stanag(2, 30))),
            Err(Error::ReloadTypeMismatch {
                requested: ReloadType::Empty,
                resolved: ReloadType::Tactical,
            })
        );

        m.start_reload(ReloadRequest::from_inventory(ReloadType::Tactical, stanag(2, 30)))
            .unwrap();
        assert_eq!(
            m.start_reload(ReloadRequest::from_inventory(ReloadType::Tactical, stanag(3, 30))),
            Err(Error::ReloadInProgress)
        );
        assert_eq!(m.eject_magazine(false), Err(Error::ReloadInProgress));
    }

    #[test]
    fn test_start_reload_validates_magazine() {
        let mut m = loaded_machine(10);
        let akm = MagazineInstance::new(MagazineId::new(5), "akm_30", 30).with_rounds("m43", 30);
        assert!(matches!(
            m.start_reload(ReloadRequest::from_inventory(ReloadType::Tactical, akm)),
            Err(Error::IncompatibleCaliber { .. })
        ));
        assert!(!m.is_reloading());
    }

    #[test]
    fn test_cancel_reload() {
        let mut m = machine();
        assert_eq!(m.cancel_reload(), None);

        let mut m = loaded_machine(10);
        let before = m.state().clone();
        m.start_reload(ReloadRequest::from_inventory(ReloadType::Tactical, stanag(2, 30)))
            .unwrap();
        assert!(m.cancel_reload().is_some());
        assert!(!m.is_reloading());
        assert_eq!(m.state(), &before);
    }

    #[test]
    fn test_swap_magazine() {
        let mut m = loaded_machine(10);
        let outcome = m.swap_magazine(stanag(2, 30), false).unwrap();
        assert_eq!(outcome.reload_type, ReloadType::Tactical);
        assert_eq!(outcome.ejected.map(|m| m.id), Some(MagazineId::new(1)));
        assert_eq!(m.state().magazine.as_ref().unwrap().id, MagazineId::new(2));

        let akm = MagazineInstance::new(MagazineId::new(5), "akm_30", 30).with_rounds("m43", 30);
        let before = m.state().clone();
        assert!(m.swap_magazine(akm, false).is_err());
        assert_eq!(m.state(), &before);
    }

    #[test]
    fn test_notifications() {
        let mut m = loaded_machine(10);
        m.fire(true).unwrap();
        let events = m.sink_mut().drain();
        assert!(events.contains(&AmmoEvent::ChamberStateChanged { has_round: true }));
        assert!(events.contains(&AmmoEvent::MagazineChanged {
            magazine: Some(MagazineId::new(1)),
            rounds: 8,
        }));

        // Failed transitions stay silent
        m.insert_magazine(stanag(2, 30)).unwrap_err();
        assert!(m.sink().is_empty());

        m.start_reload(ReloadRequest::from_inventory(ReloadType::Tactical, stanag(2, 30)))
            .unwrap();
        assert_eq!(
            m.sink().events(),
            &[AmmoEvent::ReloadStateChanged {
                is_reloading: true,
                reload_type: ReloadType::Tactical,
                duration: 2.0,
            }]
        );
    }

    #[test]
    fn test_corruption_latches_until_snapshot() {
        let mut m = loaded_machine(10);
        let good = m.snapshot();

        m.state.magazine.as_mut().unwrap().current_rounds = 99;
        assert!(matches!(m.fire(false), Err(Error::CorruptedState(_))));
        assert!(m.needs_resync());
        assert!(!m.can_reload(Some(&stanag(2, 30))));

        // Fixing the field is not enough, only a snapshot clears the flag
        m.state.magazine.as_mut().unwrap().current_rounds = 9;
        assert!(matches!(m.fire(false), Err(Error::CorruptedState(_))));

        m.apply_snapshot(good).unwrap();
        assert!(!m.needs_resync());
        assert!(m.fire(false).is_ok());
    }

    #[test]
    fn test_apply_snapshot_clears_pending() {
        let mut m = loaded_machine(10);
        let snapshot = m.snapshot();
        m.start_reload(ReloadRequest::from_inventory(ReloadType::Tactical, stanag(2, 30)))
            .unwrap();

        m.apply_snapshot(snapshot.clone()).unwrap();
        assert!(!m.is_reloading());
        assert_eq!(m.snapshot(), snapshot);

        let bad = AmmoSnapshot {
            has_magazine: false,
            ..snapshot
        };
        assert!(m.apply_snapshot(bad).is_err());
    }

    #[test]
    fn test_can_reload() {
        let m = loaded_machine(30);
        assert!(m.can_reload(Some(&stanag(2, 30))));
        assert!(!m.can_reload(None));
        assert!(!m.can_reload(Some(&stanag(2, 0))));
    }
}
