//! Magazines a character carries outside the quick slots

use crate::{Error, MagazineId, MagazineInstance, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// General magazine storage, addressed by instance
///
/// Like [`QuickSlotBridge`](crate::QuickSlotBridge), each peer has its own;
/// the authority's decides which magazines exist and what they hold.
pub trait MagazineStorage {
    /// Stored magazine with this ID
    fn magazine(&self, id: MagazineId) -> Option<&MagazineInstance>;

    /// Remove a magazine from storage
    fn take(&mut self, id: MagazineId) -> Result<MagazineInstance>;

    /// Put a magazine away, replacing any copy with the same ID
    fn put(&mut self, magazine: MagazineInstance);

    /// Stored copy of a magazine, or an error naming the missing ID
    fn require(&self, id: MagazineId) -> Result<&MagazineInstance> {
        self.magazine(id).ok_or(Error::MagazineNotStored(id))
    }
}

/// In-memory magazine storage, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    magazines: IndexMap<MagazineId, MagazineInstance>,
}

impl Inventory {
    /// Create an empty inventory
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`put`](MagazineStorage::put)
    pub fn with(mut self, magazine: MagazineInstance) -> Self {
        self.put(magazine);
        self
    }

    /// Number of stored magazines
    pub fn len(&self) -> usize {
        self.magazines.len()
    }

    /// Check if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.magazines.is_empty()
    }

    /// Stored magazines in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &MagazineInstance> {
        self.magazines.values()
    }
}

impl MagazineStorage for Inventory {
    fn magazine(&self, id: MagazineId) -> Option<&MagazineInstance> {
        self.magazines.get(&id)
    }

    fn take(&mut self, id: MagazineId) -> Result<MagazineInstance> {
        self.magazines
            .shift_remove(&id)
            .ok_or(Error::MagazineNotStored(id))
    }

    fn put(&mut self, mut magazine: MagazineInstance) {
        magazine.inserted = false;
        magazine.origin_slot = None;
        self.magazines.insert(magazine.id, magazine);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mag(id: u64, rounds: u32) -> MagazineInstance {
        MagazineInstance::new(MagazineId::new(id), "stanag_30", 30).with_rounds("m855", rounds)
    }

    #[test]
    fn test_put_and_take() {
        let mut inventory = Inventory::new().with(mag(1, 30)).with(mag(2, 12));
        assert_eq!(inventory.len(), 2);
        assert_eq!(inventory.require(MagazineId::new(2)).unwrap().current_rounds, 12);

        let taken = inventory.take(MagazineId::new(1)).unwrap();
        assert_eq!(taken.current_rounds, 30);
        assert_eq!(
            inventory.take(MagazineId::new(1)),
            Err(Error::MagazineNotStored(MagazineId::new(1)))
        );
        assert_eq!(inventory.iter().map(|m| m.id).collect::<Vec<_>>(), vec![MagazineId::new(2)]);
    }

    #[test]
    fn test_put_clears_placement() {
        let mut stowed = mag(3, 5).from_slot(2);
        stowed.inserted = true;
        let inventory = Inventory::new().with(stowed);

        let held = inventory.magazine(MagazineId::new(3)).unwrap();
        assert!(!held.inserted);
        assert_eq!(held.origin_slot, None);
    }
}
