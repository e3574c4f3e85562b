//! Error types for armory-netcode

use armory_core::{MagazineId, RejectReason, SlotIndex};
use thiserror::Error;

/// Netcode error type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A state machine transition failed
    #[error(transparent)]
    Core(#[from] armory_core::Error),

    /// A prediction is already waiting for the authority
    #[error("a prediction is already in flight")]
    PredictionBusy,

    /// The named magazine is not the one in the quick slot
    #[error("quick slot {slot} holds {expected}, request named {found}")]
    MagazineMismatch {
        slot: SlotIndex,
        expected: MagazineId,
        found: MagazineId,
    },

    /// Completion requested before the reload could have finished
    #[error("reload still has {remaining:.3}s to go")]
    ReloadNotFinished { remaining: f64 },

    /// Packet could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The connection failed
    #[error("transport error: {0}")]
    Transport(String),
}

impl Error {
    /// Wire reason code for this error
    pub fn reason(&self) -> RejectReason {
        match self {
            Error::Core(err) => err.reason(),
            Error::MagazineMismatch { .. } => RejectReason::MagazineMismatch,
            Error::ReloadNotFinished { .. } => RejectReason::ReloadNotFinished,
            Error::Serialization(_) => RejectReason::Malformed,
            Error::PredictionBusy | Error::Transport(_) => RejectReason::Internal,
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type for netcode operations
pub type Result<T> = std::result::Result<T, Error>;
