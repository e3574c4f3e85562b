//! Authoritative request validation
//!
//! The gateway runs on the peer that owns the truth. It takes client intent
//! (which magazine, which slot, whether to drop) and re-validates it against
//! its own state before applying anything. Client-asserted state is never
//! used: a magazine named by the client is read from the gateway's own quick
//! slot or storage, and one it does not hold is refused.

use crate::stowage::{resolve_inventory, resolve_quick_slot, revert_slots, settle_slots};
use crate::transport::{recv_packet, send_packet, Connection};
use crate::{Error, Packet, Reply, Request, RequestEnvelope, Result};
use armory_core::{
    AmmoSnapshot, MagazineDataSource, MagazineInstance, MagazineSource, MagazineStateMachine,
    MagazineStorage, NotificationSink, QuickSlotBridge, ReloadOutcome, ReloadRequest, SlotIndex,
};
use tracing::{debug, info, warn};

/// Timing of the reload the authority is running
#[derive(Debug, Clone, Copy, PartialEq)]
struct ActiveReload {
    started_at: f64,
    duration: f64,
    /// Where the incoming magazine is drawn from
    source: Option<MagazineSource>,
}

impl ActiveReload {
    fn finishes_at(&self) -> f64 {
        self.started_at + self.duration
    }

    fn quick_slot(&self) -> Option<SlotIndex> {
        match self.source? {
            MagazineSource::QuickSlot(slot) => Some(slot),
            MagazineSource::Inventory(_) => None,
        }
    }
}

/// Authority side of one weapon
///
/// Owns the weapon's state machine, the character's quick slots `Q` and its
/// general magazine storage `I`.
pub struct AuthorityGateway<D, S, Q, I>
where
    D: MagazineDataSource,
    S: NotificationSink,
    Q: QuickSlotBridge,
    I: MagazineStorage,
{
    machine: MagazineStateMachine<D, S>,
    slots: Q,
    storage: I,
    active: Option<ActiveReload>,
    grace: f64,
}

impl<D, S, Q, I> AuthorityGateway<D, S, Q, I>
where
    D: MagazineDataSource,
    S: NotificationSink,
    Q: QuickSlotBridge,
    I: MagazineStorage,
{
    /// Create a gateway; the completion grace comes from the machine's config
    pub fn new(machine: MagazineStateMachine<D, S>, slots: Q, storage: I) -> Self {
        let grace = machine.config().reload_completion_grace;
        Self {
            machine,
            slots,
            storage,
            active: None,
            grace,
        }
    }

    /// The authoritative state machine
    pub fn machine(&self) -> &MagazineStateMachine<D, S> {
        &self.machine
    }

    /// The authoritative quick slots
    pub fn slots(&self) -> &Q {
        &self.slots
    }

    /// The authoritative magazine storage
    pub fn storage(&self) -> &I {
        &self.storage
    }

    /// Authoritative state for a resync packet
    pub fn snapshot(&self) -> AmmoSnapshot {
        self.machine.snapshot()
    }

    /// Validate and apply one request, producing its reply
    ///
    /// A rejected request leaves every piece of state as it was.
    pub fn handle(&mut self, envelope: RequestEnvelope, now: f64) -> Reply {
        let RequestEnvelope { id, request } = envelope;
        let name = request.name();
        match self.apply(request, now) {
            Ok(()) => {
                debug!(id = %id, request = name, "request confirmed");
                Reply::Confirmed(id)
            }
            Err(err) => {
                warn!(id = %id, request = name, error = %err, "request rejected");
                Reply::Rejected(id, err.reason())
            }
        }
    }

    /// Complete a reload whose time is up
    pub fn tick(&mut self, now: f64) -> Result<Option<ReloadOutcome>> {
        match self.active {
            Some(active) if now >= active.finishes_at() => {
                debug!(started_at = active.started_at, now, "reload completed by tick");
                self.finish_reload().map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Serve every request waiting on `conn`, returning how many were handled
    pub fn serve<C: Connection>(&mut self, conn: &C, now: f64) -> Result<usize> {
        let mut handled = 0;
        while let Some(packet) = recv_packet(conn)? {
            match packet {
                Packet::Request(envelope) => {
                    let reply = self.handle(envelope, now);
                    send_packet(conn, &Packet::Reply(reply))?;
                    handled += 1;
                }
                other => warn!(packet = ?other, "authority received a non-request packet"),
            }
        }
        Ok(handled)
    }

    /// Push the authoritative state to the client
    pub fn send_snapshot<C: Connection>(&self, conn: &C) -> Result<()> {
        send_packet(conn, &Packet::Snapshot(self.snapshot()))
    }

    fn apply(&mut self, request: Request, now: f64) -> Result<()> {
        match request {
            Request::InsertMagazine(claimed) => {
                let held = self.storage.require(claimed.id)?.clone();
                self.machine.insert_magazine(held)?;
                self.storage.take(claimed.id)?;
            }
            Request::EjectMagazine { drop_to_ground } => {
                let magazine = self.machine.eject_magazine(drop_to_ground)?;
                if !drop_to_ground {
                    self.stow(magazine);
                }
            }
            Request::Fire { auto_chamber } => {
                self.machine.fire(auto_chamber)?;
            }
            Request::StartReload(request) => self.start_reload(request, now)?,
            Request::CompleteReload => {
                let active = self
                    .active
                    .ok_or(armory_core::Error::NoPendingReload)?;
                let earliest = active.finishes_at() - self.grace;
                if now < earliest {
                    return Err(Error::ReloadNotFinished {
                        remaining: active.finishes_at() - now,
                    });
                }
                self.finish_reload()?;
            }
            Request::CancelReload => {
                self.machine.cancel_reload();
                self.active = None;
            }
            Request::SwapMagazineFromQuickSlot {
                slot,
                emergency_drop,
            } => self.swap_from_slot(slot, emergency_drop)?,
        }
        Ok(())
    }

    fn start_reload(&mut self, mut request: ReloadRequest, now: f64) -> Result<()> {
        resolve_quick_slot(&self.slots, &mut request)?;
        resolve_inventory(&self.storage, &mut request)?;
        let duration = self.machine.start_reload(request)?;
        // Only a reload that swaps keeps its incoming magazine
        let source = self
            .machine
            .pending_reload()
            .and_then(|pending| pending.incoming.as_ref())
            .map(|incoming| incoming.source);
        self.active = Some(ActiveReload {
            started_at: now,
            duration: f64::from(duration),
            source,
        });
        Ok(())
    }

    fn finish_reload(&mut self) -> Result<ReloadOutcome> {
        let active = self.active.take().ok_or(armory_core::Error::NoPendingReload)?;
        let stored = match active.source {
            Some(MagazineSource::Inventory(id)) if self.machine.is_reloading() => {
                match self.storage.take(id) {
                    Ok(magazine) => Some(magazine),
                    Err(err) => {
                        self.machine.cancel_reload();
                        return Err(err.into());
                    }
                }
            }
            _ => None,
        };

        let before = self.machine.state().clone();
        let outcome = match self.machine.complete_reload() {
            Ok(outcome) => outcome,
            Err(err) => {
                if let Some(magazine) = stored {
                    self.storage.put(magazine);
                }
                return Err(err.into());
            }
        };

        let mut journal = Vec::new();
        match settle_slots(
            &mut self.slots,
            active.quick_slot(),
            outcome.ejected.clone(),
            outcome.dropped,
            &mut journal,
        ) {
            Ok(leftover) => {
                self.keep_leftover(leftover, outcome.dropped);
                info!(reload_type = ?outcome.reload_type, "reload applied");
                Ok(outcome)
            }
            Err(err) => {
                revert_slots(&mut self.slots, journal)?;
                self.machine.restore(before)?;
                if let Some(magazine) = stored {
                    self.storage.put(magazine);
                }
                Err(err)
            }
        }
    }

    /// Stow an ejected magazine: first free quick slot, else storage
    fn stow(&mut self, magazine: MagazineInstance) {
        if let Err(magazine) = self.slots.store_ejected(magazine) {
            debug!(magazine = %magazine.id, "no free quick slot, magazine stored");
            self.storage.put(magazine);
        }
    }

    /// A magazine that came out of the weapon and found no quick slot
    fn keep_leftover(&mut self, leftover: Option<MagazineInstance>, dropped: bool) {
        match leftover {
            Some(magazine) if dropped => {
                debug!(magazine = %magazine.id, "ejected magazine dropped");
            }
            Some(magazine) => {
                debug!(magazine = %magazine.id, "ejected magazine stored");
                self.storage.put(magazine);
            }
            None => {}
        }
    }

    /// The quick-slot swap transaction
    ///
    /// Both sides are checked before either changes. If the slot side still
    /// fails after the weapon side was applied, the weapon is restored from
    /// the state taken before the transaction.
    fn swap_from_slot(&mut self, slot: SlotIndex, emergency_drop: bool) -> Result<()> {
        let incoming = self
            .slots
            .magazine_in_slot(slot)?
            .cloned()
            .ok_or(armory_core::Error::SlotEmpty(slot))?;
        self.machine.validate_magazine(&incoming)?;

        let before = self.machine.state().clone();
        let outcome = self.machine.swap_magazine(incoming, emergency_drop)?;

        let mut journal = Vec::new();
        match settle_slots(
            &mut self.slots,
            Some(slot),
            outcome.ejected,
            outcome.dropped,
            &mut journal,
        ) {
            Ok(leftover) => {
                self.keep_leftover(leftover, outcome.dropped);
                info!(slot, emergency_drop, "quick-slot swap applied");
                Ok(())
            }
            Err(err) => {
                revert_slots(&mut self.slots, journal)?;
                self.machine.restore(before)?;
                Err(err)
            }
        }
    }
}
