//! File layouts for authored definitions

use armory_core::{MagazineData, WeaponData};
use serde::{Deserialize, Serialize};

/// A file of magazine kinds
///
/// ```ron
/// (
///     magazines: [
///         (id: "stanag_30", caliber: "556x45", max_capacity: 30),
///     ],
/// )
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MagazineDefs {
    pub magazines: Vec<MagazineData>,
}

/// A file of weapon reload records
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeaponDefs {
    pub weapons: Vec<WeaponData>,
}
