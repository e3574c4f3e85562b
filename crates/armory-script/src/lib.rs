//! Armory Script - RON loader for armory definitions
//!
//! Loads authored content from RON files:
//! - Magazine kinds (`MagazineDefs`)
//! - Weapon reload records (`WeaponDefs`)
//! - Tuning values (`AmmoConfig`)

mod error;
mod loader;
mod schema;

pub use error::{Error, Result};
pub use loader::{ArmoryDefs, Loader};
pub use schema::{MagazineDefs, WeaponDefs};
