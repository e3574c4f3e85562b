//! Armory Core - weapon ammunition state machine
//!
//! This crate holds everything about a single weapon's ammunition that both
//! peers agree on:
//! - Magazine instances, the chamber, and the aggregate `WeaponAmmoState`
//! - Static magazine/weapon data and the lookup trait over it
//! - Reload-type resolution and reload timing
//! - `MagazineStateMachine`, the only place transitions are legal or not
//! - Quick slots, general storage and notification sinks as injectable
//!   collaborators
//!
//! Networking (prediction on the client, validation on the authority) lives
//! in `armory-netcode`; loading authored data lives in `armory-script`.
//!
//! ## Example
//!
//! ```
//! use armory_core::{
//!     AmmoConfig, MagazineCatalog, MagazineData, MagazineId, MagazineInstance,
//!     MagazineStateMachine, NullSink, WeaponData,
//! };
//!
//! let catalog = MagazineCatalog::new().with(MagazineData::new("stanag_30", "556x45", 30));
//! let weapon = WeaponData::new("m4a1", "556x45", 2.1, 2.8);
//! let mut machine =
//!     MagazineStateMachine::new(weapon, catalog, NullSink, AmmoConfig::default()).unwrap();
//!
//! let mag = MagazineInstance::new(MagazineId::new(1), "stanag_30", 30).with_rounds("m855", 30);
//! machine.insert_magazine(mag).unwrap();
//! machine.chamber_from_magazine().unwrap();
//! assert_eq!(machine.state().total_rounds(), 30);
//! ```

mod ammo;
mod config;
mod data;
mod error;
mod events;
mod identity;
mod machine;
mod quick_slot;
mod reload;
mod storage;

pub use ammo::{AmmoSnapshot, ChamberedRound, MagazineInstance, WeaponAmmoState, MAX_DURABILITY};
pub use config::{AmmoConfig, DEFAULT_QUICK_SLOT_COUNT};
pub use data::{MagazineCatalog, MagazineData, MagazineDataSource, WeaponData};
pub use error::{Error, RejectReason, Result};
pub use events::{AmmoEvent, EventLog, NotificationSink, NullSink};
pub use identity::{DefId, MagazineId, SlotIndex};
pub use machine::{MagazineStateMachine, PendingReload, ReloadOutcome};
pub use quick_slot::{QuickSlotBridge, QuickSlots};
pub use reload::{
    reload_duration, resolve_reload_type, IncomingMagazine, MagazineSource, ReloadRequest,
    ReloadType,
};
pub use storage::{Inventory, MagazineStorage};
