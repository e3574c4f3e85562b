//! Error types for armory-core

use crate::{DefId, MagazineId, ReloadType, SlotIndex};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Core error type
///
/// Every variant is recoverable; the caller decides how to surface it.
/// `CorruptedState` is the one condition that also poisons the state machine
/// until a fresh snapshot is applied.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("a magazine is already inserted")]
    SlotOccupied,

    #[error("no magazine inserted")]
    NoMagazine,

    #[error("no ammunition available to chamber")]
    NoAmmoAvailable,

    #[error("chamber is empty")]
    ChamberEmpty,

    #[error("a round is already chambered")]
    AlreadyChambered,

    #[error("no reload pending")]
    NoPendingReload,

    #[error("reload already in progress")]
    ReloadInProgress,

    #[error("nothing to reload")]
    NoReloadNeeded,

    #[error("requested {requested:?} reload but state resolves to {resolved:?}")]
    ReloadTypeMismatch {
        requested: ReloadType,
        resolved: ReloadType,
    },

    #[error("magazine {magazine} takes {found}, weapon needs {expected}")]
    IncompatibleCaliber {
        magazine: DefId,
        expected: DefId,
        found: DefId,
    },

    #[error("unknown magazine type: {0}")]
    UnknownMagazineType(DefId),

    #[error("invalid weapon data: {0}")]
    InvalidWeaponData(String),

    #[error("invalid magazine: {0}")]
    InvalidMagazine(String),

    #[error("corrupted ammo state: {0}")]
    CorruptedState(String),

    #[error("quick slot {0} does not exist")]
    InvalidSlot(SlotIndex),

    #[error("quick slot {0} holds no magazine")]
    SlotEmpty(SlotIndex),

    #[error("{0} is not in storage")]
    MagazineNotStored(MagazineId),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Wire reason code for this error
    pub fn reason(&self) -> RejectReason {
        match self {
            Error::SlotOccupied => RejectReason::SlotOccupied,
            Error::NoMagazine => RejectReason::NoMagazine,
            Error::NoAmmoAvailable => RejectReason::NoAmmoAvailable,
            Error::ChamberEmpty => RejectReason::ChamberEmpty,
            Error::AlreadyChambered => RejectReason::AlreadyChambered,
            Error::NoPendingReload => RejectReason::NoPendingReload,
            Error::ReloadInProgress => RejectReason::ReloadInProgress,
            Error::NoReloadNeeded => RejectReason::NoReloadNeeded,
            Error::ReloadTypeMismatch { .. } => RejectReason::ReloadTypeMismatch,
            Error::IncompatibleCaliber { .. } => RejectReason::IncompatibleCaliber,
            Error::UnknownMagazineType(_) => RejectReason::UnknownMagazineType,
            Error::InvalidWeaponData(_) => RejectReason::InvalidWeaponData,
            Error::InvalidMagazine(_) => RejectReason::InvalidMagazine,
            Error::CorruptedState(_) => RejectReason::CorruptedState,
            Error::InvalidSlot(_) => RejectReason::InvalidSlot,
            Error::SlotEmpty(_) => RejectReason::SlotEmpty,
            Error::MagazineNotStored(_) => RejectReason::MagazineMismatch,
            Error::InvalidConfig(_) => RejectReason::Internal,
        }
    }
}

/// Reason code carried by an authority rejection
///
/// A closed, serializable mirror of the error taxonomy. Detail strings stay
/// on the authority; only the code crosses the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    SlotOccupied,
    NoMagazine,
    NoAmmoAvailable,
    ChamberEmpty,
    AlreadyChambered,
    NoPendingReload,
    ReloadInProgress,
    NoReloadNeeded,
    ReloadTypeMismatch,
    IncompatibleCaliber,
    UnknownMagazineType,
    InvalidWeaponData,
    InvalidMagazine,
    CorruptedState,
    InvalidSlot,
    SlotEmpty,
    /// Client named a magazine the authority does not see at that source
    MagazineMismatch,
    /// Completion requested before the reload duration elapsed
    ReloadNotFinished,
    /// Request could not be decoded or made no sense
    Malformed,
    Internal,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_mapping() {
        assert_eq!(Error::SlotOccupied.reason(), RejectReason::SlotOccupied);
        assert_eq!(
            Error::IncompatibleCaliber {
                magazine: DefId::new("pmag_762"),
                expected: DefId::new("556x45"),
                found: DefId::new("762x39"),
            }
            .reason(),
            RejectReason::IncompatibleCaliber
        );
        assert_eq!(
            Error::MagazineNotStored(MagazineId::new(999)).reason(),
            RejectReason::MagazineMismatch
        );
        assert_eq!(
            Error::InvalidConfig("x".into()).reason(),
            RejectReason::Internal
        );
    }

    #[test]
    fn test_error_messages() {
        let err = Error::UnknownMagazineType(DefId::new("drum_100"));
        assert_eq!(err.to_string(), "unknown magazine type: drum_100");
        assert_eq!(RejectReason::ChamberEmpty.to_string(), "ChamberEmpty");
    }
}
