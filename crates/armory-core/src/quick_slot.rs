//! Quick-access magazine slots on a character

use crate::{AmmoConfig, Error, MagazineInstance, Result, SlotIndex};
use serde::{Deserialize, Serialize};

/// Access to the magazines a character carries for fast reloads
///
/// Each peer has its own implementation; the authority's is the source of
/// truth for which magazine sits where.
pub trait QuickSlotBridge {
    /// Number of slots
    fn slot_count(&self) -> usize;

    /// Magazine in a slot, `None` when the slot is empty
    fn magazine_in_slot(&self, slot: SlotIndex) -> Result<Option<&MagazineInstance>>;

    /// Put a magazine into a slot, returning what was there before
    fn store_magazine(&mut self, slot: SlotIndex, magazine: MagazineInstance)
        -> Result<Option<MagazineInstance>>;

    /// Empty a slot, returning its magazine
    fn clear_slot(&mut self, slot: SlotIndex) -> Result<Option<MagazineInstance>>;

    /// Slot holding the fullest magazine with rounds in it
    ///
    /// Ties go to the lowest index.
    fn first_loaded_slot(&self) -> Option<SlotIndex> {
        let mut best: Option<(SlotIndex, u32)> = None;
        for slot in 0..self.slot_count() {
            if let Ok(Some(mag)) = self.magazine_in_slot(slot) {
                if mag.has_ammo() && best.map_or(true, |(_, rounds)| mag.current_rounds > rounds) {
                    best = Some((slot, mag.current_rounds));
                }
            }
        }
        best.map(|(slot, _)| slot)
    }

    /// Stow a magazine in the first empty slot
    ///
    /// Gives the magazine back when every slot is taken.
    fn store_ejected(
        &mut self,
        magazine: MagazineInstance,
    ) -> std::result::Result<SlotIndex, MagazineInstance> {
        let free = (0..self.slot_count())
            .find(|&slot| matches!(self.magazine_in_slot(slot), Ok(None)));
        match free {
            Some(slot) => match self.store_magazine(slot, magazine.clone()) {
                Ok(_) => Ok(slot),
                Err(_) => Err(magazine),
            },
            None => Err(magazine),
        }
    }
}

/// In-memory quick slots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickSlots {
    slots: Vec<Option<MagazineInstance>>,
}

impl QuickSlots {
    /// `count` empty slots
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![None; count],
        }
    }

    /// As many empty slots as the config asks for
    pub fn from_config(config: &AmmoConfig) -> Self {
        Self::new(config.quick_slot_count)
    }

    /// Builder: put a magazine into a slot, ignoring out-of-range indices
    pub fn with(mut self, slot: SlotIndex, magazine: MagazineInstance) -> Self {
        if let Some(entry) = self.slots.get_mut(slot) {
            *entry = Some(prepare(magazine, slot));
        }
        self
    }

    /// Iterate over `(slot, magazine)` for occupied slots
    pub fn occupied(&self) -> impl Iterator<Item = (SlotIndex, &MagazineInstance)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.as_ref().map(|m| (i, m)))
    }

    fn entry(&mut self, slot: SlotIndex) -> Result<&mut Option<MagazineInstance>> {
        self.slots.get_mut(slot).ok_or(Error::InvalidSlot(slot))
    }
}

fn prepare(mut magazine: MagazineInstance, slot: SlotIndex) -> MagazineInstance {
    magazine.inserted = false;
    magazine.origin_slot = Some(slot);
    magazine
}

impl QuickSlotBridge for QuickSlots {
    fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn magazine_in_slot(&self, slot: SlotIndex) -> Result<Option<&MagazineInstance>> {
        self.slots
            .get(slot)
            .map(Option::as_ref)
            .ok_or(Error::InvalidSlot(slot))
    }

    fn store_magazine(
        &mut self,
        slot: SlotIndex,
        magazine: MagazineInstance,
    ) -> Result<Option<MagazineInstance>> {
        let entry = self.entry(slot)?;
        Ok(entry.replace(prepare(magazine, slot)))
    }

    fn clear_slot(&mut self, slot: SlotIndex) -> Result<Option<MagazineInstance>> {
        Ok(self.entry(slot)?.take())
    }
}
