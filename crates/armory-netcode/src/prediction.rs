//! Client-side prediction of reloads
//!
//! Applies a reload locally before the authority answers so the player sees
//! it immediately. The state before the prediction is kept until the
//! authority confirms, rejects, or stays silent past the timeout; rejection
//! and timeout both restore it exactly.
//!
//! At most one prediction is active per weapon.

use crate::stowage::{resolve_quick_slot, revert_slots, settle_slots, SlotEntry};
use crate::transport::{recv_packet, send_packet, Connection};
use crate::{Error, Packet, PredictionKey, Reply, Request, RequestEnvelope, RequestId, Result};
use armory_core::{
    AmmoSnapshot, MagazineDataSource, MagazineInstance, MagazineSource, MagazineStateMachine,
    NotificationSink, QuickSlotBridge, RejectReason, ReloadRequest, ReloadType, SlotIndex,
    WeaponAmmoState,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// The single in-flight prediction of a weapon
///
/// Inactive when `key` is [`RequestId::NONE`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub key: PredictionKey,
    /// Client time the prediction was made
    pub issued_at: f64,
    /// Weapon state before the prediction
    pub snapshot: WeaponAmmoState,
    /// Quick slots touched by the prediction, with their old contents
    pub slots: Vec<SlotEntry>,
    pub reload_type: ReloadType,
    /// Predicted reload seconds
    pub duration: f32,
    /// Magazine the prediction put into the weapon
    pub incoming: Option<MagazineInstance>,
}

impl PredictionRecord {
    /// Whether the record holds a live prediction
    pub fn is_active(&self) -> bool {
        !self.key.is_none()
    }
}

/// A prediction that has been applied locally
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub key: PredictionKey,
    pub reload_type: ReloadType,
    /// Seconds the reload takes, for animation
    pub duration: f32,
    /// Ejected magazine that was not stowed in a quick slot
    pub ejected: Option<MagazineInstance>,
    /// Request to send to the authority
    pub envelope: RequestEnvelope,
}

/// What a reply did on the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The active prediction was confirmed
    Confirmed(PredictionKey),
    /// The active prediction was rejected and rolled back
    RolledBack(PredictionKey, RejectReason),
    /// A non-predicted request was accepted
    Accepted(RequestId),
    /// A non-predicted request was refused
    Refused(RequestId, RejectReason),
    /// The reply names no request we are waiting on
    Unmatched(RequestId),
}

/// Client-side prediction coordinator
///
/// Owns the client's state machine and quick slots, so every local change to
/// them is visible to rollback.
pub struct PredictionCoordinator<D, S, Q>
where
    D: MagazineDataSource,
    S: NotificationSink,
    Q: QuickSlotBridge,
{
    machine: MagazineStateMachine<D, S>,
    slots: Q,
    record: PredictionRecord,
    last_id: RequestId,
    /// Non-predicted requests waiting for a reply, with their issue time
    outstanding: Vec<(RequestId, f64)>,
    timeout: f64,
}

impl<D, S, Q> PredictionCoordinator<D, S, Q>
where
    D: MagazineDataSource,
    S: NotificationSink,
    Q: QuickSlotBridge,
{
    /// Create a coordinator; the timeout comes from the machine's config
    pub fn new(machine: MagazineStateMachine<D, S>, slots: Q) -> Self {
        let timeout = machine.config().prediction_timeout;
        Self {
            machine,
            slots,
            record: PredictionRecord::default(),
            last_id: RequestId::NONE,
            outstanding: Vec::new(),
            timeout,
        }
    }

    /// The client's state machine
    pub fn machine(&self) -> &MagazineStateMachine<D, S> {
        &self.machine
    }

    /// Direct access for non-predicted local transitions
    pub fn machine_mut(&mut self) -> &mut MagazineStateMachine<D, S> {
        &mut self.machine
    }

    /// The client's quick slots
    pub fn slots(&self) -> &Q {
        &self.slots
    }

    /// Get the quick slots mutably
    pub fn slots_mut(&mut self) -> &mut Q {
        &mut self.slots
    }

    /// The in-flight prediction, if any
    pub fn active_prediction(&self) -> Option<&PredictionRecord> {
        self.record.is_active().then_some(&self.record)
    }

    /// Whether a prediction is waiting for the authority
    pub fn is_busy(&self) -> bool {
        self.record.is_active()
    }

    /// Predict a full reload: start and complete it locally right away
    pub fn predict_start_reload(&mut self, mut request: ReloadRequest, now: f64) -> Result<Prediction> {
        self.ensure_free()?;
        resolve_quick_slot(&self.slots, &mut request)?;

        let snapshot = self.machine.state().clone();
        let duration = self.machine.start_reload(request.clone())?;
        // Only a reload that swaps keeps its incoming magazine
        let pending = self.machine.pending_reload().and_then(|p| p.incoming.clone());
        let source = pending.as_ref().and_then(|incoming| match incoming.source {
            MagazineSource::QuickSlot(slot) => Some(slot),
            MagazineSource::Inventory(_) => None,
        });
        let incoming = pending.map(|incoming| incoming.magazine);
        let outcome = match self.machine.complete_reload() {
            Ok(outcome) => outcome,
            Err(err) => {
                self.machine.restore(snapshot)?;
                return Err(err.into());
            }
        };

        let mut journal = Vec::new();
        let ejected = match settle_slots(
            &mut self.slots,
            source,
            outcome.ejected,
            outcome.dropped,
            &mut journal,
        ) {
            Ok(ejected) => ejected,
            Err(err) => {
                revert_slots(&mut self.slots, journal)?;
                self.machine.restore(snapshot)?;
                return Err(err);
            }
        };

        let key = self.commit(
            snapshot,
            journal,
            (outcome.reload_type, duration, incoming),
            now,
        );
        info!(key = %key, reload_type = ?outcome.reload_type, duration, "reload predicted");
        Ok(Prediction {
            key,
            reload_type: outcome.reload_type,
            duration,
            ejected,
            envelope: RequestEnvelope {
                id: key,
                request: Request::StartReload(request),
            },
        })
    }

    /// Predict an immediate swap with a quick-slot magazine
    pub fn predict_swap(&mut self, slot: SlotIndex, emergency_drop: bool, now: f64) -> Result<Prediction> {
        self.ensure_free()?;
        let incoming = self
            .slots
            .magazine_in_slot(slot)?
            .cloned()
            .ok_or(armory_core::Error::SlotEmpty(slot))?;

        let snapshot = self.machine.state().clone();
        let outcome = self.machine.swap_magazine(incoming.clone(), emergency_drop)?;

        let mut journal = Vec::new();
        let ejected = match settle_slots(
            &mut self.slots,
            Some(slot),
            outcome.ejected,
            outcome.dropped,
            &mut journal,
        ) {
            Ok(ejected) => ejected,
            Err(err) => {
                revert_slots(&mut self.slots, journal)?;
                self.machine.restore(snapshot)?;
                return Err(err);
            }
        };

        let key = self.commit(
            snapshot,
            journal,
            (outcome.reload_type, 0.0, Some(incoming)),
            now,
        );
        info!(key = %key, slot, emergency_drop, "swap predicted");
        Ok(Prediction {
            key,
            reload_type: outcome.reload_type,
            duration: 0.0,
            ejected,
            envelope: RequestEnvelope {
                id: key,
                request: Request::SwapMagazineFromQuickSlot {
                    slot,
                    emergency_drop,
                },
            },
        })
    }

    /// Number of non-predicted requests still waiting for a reply
    pub fn pending_requests(&self) -> usize {
        self.outstanding.len()
    }

    /// Wrap a non-predicted request with a fresh id
    ///
    /// The request is forgotten if no reply comes within the timeout.
    pub fn issue(&mut self, request: Request, now: f64) -> RequestEnvelope {
        let id = self.next_id();
        self.outstanding.push((id, now));
        debug!(id = %id, request = request.name(), "request issued");
        RequestEnvelope { id, request }
    }

    /// Accept the active prediction
    ///
    /// Returns false when `key` is not the active prediction.
    pub fn confirm(&mut self, key: PredictionKey) -> bool {
        if !self.matches(key) {
            return false;
        }
        info!(key = %key, "prediction confirmed");
        self.record = PredictionRecord::default();
        true
    }

    /// Undo the active prediction
    ///
    /// Restores weapon state and quick slots exactly as they were before it.
    /// Returns false when `key` is not the active prediction.
    pub fn rollback(&mut self, key: PredictionKey) -> Result<bool> {
        if !self.matches(key) {
            return Ok(false);
        }
        // The record stays until both restores succeed, so a failed
        // rollback can be retried
        self.machine.restore(self.record.snapshot.clone())?;
        revert_slots(&mut self.slots, self.record.slots.clone())?;
        let record = std::mem::take(&mut self.record);
        warn!(key = %key, reload_type = ?record.reload_type, "prediction rolled back");
        Ok(true)
    }

    /// Route an authority reply
    pub fn handle_reply(&mut self, reply: Reply) -> Result<ReplyOutcome> {
        let id = reply.id();
        if self.matches(id) {
            return match reply {
                Reply::Confirmed(key) => {
                    self.confirm(key);
                    Ok(ReplyOutcome::Confirmed(key))
                }
                Reply::Rejected(key, reason) => {
                    debug!(key = %key, reason = %reason, "prediction rejected");
                    self.rollback(key)?;
                    Ok(ReplyOutcome::RolledBack(key, reason))
                }
            };
        }

        let Some(pos) = self.outstanding.iter().position(|&(r, _)| r == id) else {
            debug!(id = %id, "unmatched reply");
            return Ok(ReplyOutcome::Unmatched(id));
        };
        self.outstanding.remove(pos);
        Ok(match reply {
            Reply::Confirmed(id) => ReplyOutcome::Accepted(id),
            Reply::Rejected(id, reason) => {
                warn!(id = %id, reason = %reason, "request refused");
                ReplyOutcome::Refused(id, reason)
            }
        })
    }

    /// Roll back a prediction that has waited too long
    ///
    /// Non-predicted requests past the same timeout are forgotten; a late
    /// reply to one is unmatched. Returns the key that timed out, if any.
    pub fn tick(&mut self, now: f64) -> Result<Option<PredictionKey>> {
        let timeout = self.timeout;
        let waiting = self.outstanding.len();
        self.outstanding.retain(|&(_, issued_at)| now - issued_at < timeout);
        if self.outstanding.len() < waiting {
            debug!(expired = waiting - self.outstanding.len(), "requests expired");
        }

        if !self.record.is_active() || now - self.record.issued_at < self.timeout {
            return Ok(None);
        }
        let key = self.record.key;
        warn!(key = %key, waited = now - self.record.issued_at, "prediction timed out");
        self.rollback(key)?;
        Ok(Some(key))
    }

    /// Replace local state with the authority's
    ///
    /// Any active prediction is dropped without rollback; quick slots are
    /// left as they are.
    pub fn apply_authority_snapshot(&mut self, snapshot: AmmoSnapshot) -> Result<()> {
        if self.record.is_active() {
            debug!(key = %self.record.key, "prediction superseded by authority snapshot");
            self.record = PredictionRecord::default();
        }
        self.machine.apply_snapshot(snapshot)?;
        Ok(())
    }

    /// Send a prepared prediction or request
    pub fn send<C: Connection>(&self, conn: &C, envelope: &RequestEnvelope) -> Result<()> {
        send_packet(conn, &Packet::Request(envelope.clone()))
    }

    /// Handle everything waiting on `conn`
    pub fn poll<C: Connection>(&mut self, conn: &C) -> Result<Vec<ReplyOutcome>> {
        let mut outcomes = Vec::new();
        while let Some(packet) = recv_packet(conn)? {
            match packet {
                Packet::Reply(reply) => outcomes.push(self.handle_reply(reply)?),
                Packet::Snapshot(snapshot) => self.apply_authority_snapshot(snapshot)?,
                Packet::Request(envelope) => {
                    warn!(id = %envelope.id, "client received a request, ignoring");
                }
            }
        }
        Ok(outcomes)
    }

    fn ensure_free(&self) -> Result<()> {
        if self.record.is_active() {
            warn!(active = %self.record.key, "prediction busy");
            return Err(Error::PredictionBusy);
        }
        Ok(())
    }

    fn matches(&self, key: PredictionKey) -> bool {
        self.record.is_active() && self.record.key == key
    }

    fn commit(
        &mut self,
        snapshot: WeaponAmmoState,
        slots: Vec<SlotEntry>,
        (reload_type, duration, incoming): (ReloadType, f32, Option<MagazineInstance>),
        now: f64,
    ) -> PredictionKey {
        let key = self.next_id();
        self.record = PredictionRecord {
            key,
            issued_at: now,
            snapshot,
            slots,
            reload_type,
            duration,
            incoming,
        };
        key
    }

    fn next_id(&mut self) -> RequestId {
        self.last_id = self.last_id.next();
        self.last_id
    }
}
