//! Wire contract between client and authority
//!
//! Every request carries a [`RequestId`]; the authority answers each one with
//! exactly one [`Reply`] naming the same id. For predicted reloads the id is
//! also the prediction key.

use crate::Result;
use armory_core::{AmmoSnapshot, MagazineInstance, RejectReason, ReloadRequest, SlotIndex};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Request correlation id
///
/// Monotonic per client. Zero is never issued and means "no request".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u32);

/// Key of a client prediction; the id of the request that carries it
pub type PredictionKey = RequestId;

impl RequestId {
    /// The "no request" sentinel
    pub const NONE: RequestId = RequestId(0);

    /// Create a request ID
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u32 {
        self.0
    }

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    /// The id after this one, skipping the sentinel on wrap-around
    pub fn next(self) -> Self {
        match self.0.wrapping_add(1) {
            0 => Self(1),
            n => Self(n),
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req:{}", self.0)
    }
}

/// Client intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    InsertMagazine(MagazineInstance),
    EjectMagazine { drop_to_ground: bool },
    Fire { auto_chamber: bool },
    StartReload(ReloadRequest),
    CompleteReload,
    CancelReload,
    SwapMagazineFromQuickSlot { slot: SlotIndex, emergency_drop: bool },
}

impl Request {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Request::InsertMagazine(_) => "insert_magazine",
            Request::EjectMagazine { .. } => "eject_magazine",
            Request::Fire { .. } => "fire",
            Request::StartReload(_) => "start_reload",
            Request::CompleteReload => "complete_reload",
            Request::CancelReload => "cancel_reload",
            Request::SwapMagazineFromQuickSlot { .. } => "swap_from_quick_slot",
        }
    }
}

/// A request with its correlation id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub id: RequestId,
    pub request: Request,
}

/// Authority answer to one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    Confirmed(RequestId),
    Rejected(RequestId, RejectReason),
}

impl Reply {
    /// ID of the request this answers
    pub fn id(&self) -> RequestId {
        match self {
            Reply::Confirmed(id) | Reply::Rejected(id, _) => *id,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Reply::Confirmed(_))
    }
}

/// Everything that crosses the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    /// Client to authority
    Request(RequestEnvelope),
    /// Authority to client
    Reply(Reply),
    /// Authority to client, full weapon state for resync
    Snapshot(AmmoSnapshot),
}

impl Packet {
    /// Encode with bincode
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode with bincode
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
