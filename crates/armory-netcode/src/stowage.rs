//! Moving magazines between the weapon and the quick slots
//!
//! Shared by both peers so a predicted reload leaves the client's slots in
//! the same shape the authority's end up in.

use crate::{Error, Result};
use armory_core::{
    MagazineInstance, MagazineSource, MagazineStorage, QuickSlotBridge, ReloadRequest, SlotIndex,
};
use serde::{Deserialize, Serialize};

/// Content of a quick slot before it was changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotEntry {
    pub slot: SlotIndex,
    pub previous: Option<MagazineInstance>,
}

/// Replace a quick-slot magazine named in `request` with the slot's own copy
///
/// The requester only names the magazine; its contents come from the slot.
pub(crate) fn resolve_quick_slot<Q: QuickSlotBridge>(
    slots: &Q,
    request: &mut ReloadRequest,
) -> Result<()> {
    let Some(incoming) = request.incoming.as_mut() else {
        return Ok(());
    };
    let MagazineSource::QuickSlot(slot) = incoming.source else {
        return Ok(());
    };

    let held = slots
        .magazine_in_slot(slot)?
        .ok_or(armory_core::Error::SlotEmpty(slot))?;
    if held.id != incoming.magazine.id {
        return Err(Error::MagazineMismatch {
            slot,
            expected: held.id,
            found: incoming.magazine.id,
        });
    }
    incoming.magazine = held.clone();
    Ok(())
}

/// Replace a stored magazine named in `request` with the storage's own copy
///
/// A magazine the storage does not hold, or one named under another ID than
/// its source, is refused.
pub(crate) fn resolve_inventory<I: MagazineStorage>(
    storage: &I,
    request: &mut ReloadRequest,
) -> Result<()> {
    let Some(incoming) = request.incoming.as_mut() else {
        return Ok(());
    };
    let MagazineSource::Inventory(id) = incoming.source else {
        return Ok(());
    };
    if incoming.magazine.id != id {
        return Err(armory_core::Error::MagazineNotStored(incoming.magazine.id).into());
    }
    incoming.magazine = storage.require(id)?.clone();
    Ok(())
}

/// Put the slots in their post-reload shape
///
/// Empties `source` (the magazine now sits in the weapon), then stows the
/// ejected magazine: back into `source` when there is one, otherwise into the
/// first free slot. A dropped magazine, or one with nowhere to go, is
/// returned. Every slot touched is recorded in `journal` first.
pub(crate) fn settle_slots<Q: QuickSlotBridge>(
    slots: &mut Q,
    source: Option<SlotIndex>,
    ejected: Option<MagazineInstance>,
    dropped: bool,
    journal: &mut Vec<SlotEntry>,
) -> Result<Option<MagazineInstance>> {
    if let Some(slot) = source {
        let previous = slots.clear_slot(slot)?;
        journal.push(SlotEntry { slot, previous });
    }

    let Some(magazine) = ejected else {
        return Ok(None);
    };
    if dropped {
        return Ok(Some(magazine));
    }

    match source {
        Some(slot) => {
            slots.store_magazine(slot, magazine)?;
            Ok(None)
        }
        None => match slots.store_ejected(magazine) {
            Ok(slot) => {
                journal.push(SlotEntry {
                    slot,
                    previous: None,
                });
                Ok(None)
            }
            Err(magazine) => Ok(Some(magazine)),
        },
    }
}

/// Undo `journal`, newest change first
pub(crate) fn revert_slots<Q: QuickSlotBridge>(slots: &mut Q, journal: Vec<SlotEntry>) -> Result<()> {
    for entry in journal.into_iter().rev() {
        match entry.previous {
            Some(magazine) => {
                slots.store_magazine(entry.slot, magazine)?;
            }
            None => {
                slots.clear_slot(entry.slot)?;
            }
        }
    }
    Ok(())
}
