//! RON definition loader

use crate::error::{Error, Result};
use crate::schema::{MagazineDefs, WeaponDefs};
use armory_core::{AmmoConfig, DefId, MagazineCatalog, MagazineData, WeaponData};
use indexmap::IndexMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Loaded armory definitions
#[derive(Debug, Default)]
pub struct ArmoryDefs {
    /// Magazine kinds, usable as a `MagazineDataSource`
    pub magazines: MagazineCatalog,
    /// Weapon reload records by ID, in load order
    pub weapons: IndexMap<DefId, WeaponData>,
    /// Tuning values; defaults unless a config file was loaded
    pub config: AmmoConfig,
}

impl ArmoryDefs {
    /// Create empty definitions with default tuning
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a weapon definition
    pub fn get_weapon(&self, id: &DefId) -> Option<&WeaponData> {
        self.weapons.get(id)
    }
}

/// Loader for RON definition files
pub struct Loader {
    defs: ArmoryDefs,
}

impl Loader {
    /// Create a new loader
    pub fn new() -> Self {
        Self {
            defs: ArmoryDefs::new(),
        }
    }

    /// Load a single RON file
    ///
    /// The kind of file is decided by its name, then by its top-level field.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        debug!(file = %path.display(), "loading definitions");

        if filename.contains("magazine") || content.contains("magazines:") {
            self.load_magazines_str(&content)
        } else if filename.contains("weapon") || content.contains("weapons:") {
            self.load_weapons_str(&content)
        } else if filename.contains("config") {
            self.load_config_str(&content)
        } else {
            Err(Error::InvalidSchema(format!(
                "cannot tell what {} defines",
                path.display()
            )))
        }
    }

    /// Load magazine kinds from a RON string
    pub fn load_magazines_str(&mut self, content: &str) -> Result<()> {
        let file: MagazineDefs = ron::from_str(content)?;
        for magazine in file.magazines {
            self.add_magazine(magazine)?;
        }
        Ok(())
    }

    /// Load weapons from a RON string
    pub fn load_weapons_str(&mut self, content: &str) -> Result<()> {
        let file: WeaponDefs = ron::from_str(content)?;
        for weapon in file.weapons {
            self.add_weapon(weapon)?;
        }
        Ok(())
    }

    /// Load tuning values from a RON string, replacing the current ones
    pub fn load_config_str(&mut self, content: &str) -> Result<()> {
        let config: AmmoConfig = ron::from_str(content)?;
        config.validate()?;
        self.defs.config = config;
        Ok(())
    }

    /// Load all RON files from a directory, recursively
    pub fn load_directory(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Not a directory: {:?}", path),
            )));
        }

        // Sorted so duplicate detection does not depend on directory order
        let mut entries = fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort();

        for file_path in entries {
            if file_path.extension().is_some_and(|e| e == "ron") {
                self.load_file(&file_path)?;
            } else if file_path.is_dir() {
                self.load_directory(&file_path)?;
            }
        }
        Ok(())
    }

    /// Finish loading and return the definitions
    pub fn finish(self) -> ArmoryDefs {
        info!(
            magazines = self.defs.magazines.len(),
            weapons = self.defs.weapons.len(),
            "armory definitions loaded"
        );
        self.defs
    }

    /// The definitions loaded so far
    pub fn defs(&self) -> &ArmoryDefs {
        &self.defs
    }

    fn add_magazine(&mut self, magazine: MagazineData) -> Result<()> {
        if self.defs.magazines.contains(&magazine.id) {
            return Err(Error::DuplicateDefinition(magazine.id.to_string()));
        }
        magazine.validate()?;
        self.defs.magazines.insert(magazine);
        Ok(())
    }

    fn add_weapon(&mut self, weapon: WeaponData) -> Result<()> {
        if self.defs.weapons.contains_key(&weapon.id) {
            return Err(Error::DuplicateDefinition(weapon.id.to_string()));
        }
        for (name, seconds) in [
            ("tactical_reload_time", weapon.tactical_reload_time),
            ("full_reload_time", weapon.full_reload_time),
        ] {
            if seconds <= 0.0 || !seconds.is_finite() {
                return Err(armory_core::Error::InvalidWeaponData(format!(
                    "{} {} is {}",
                    weapon.id, name, seconds
                ))
                .into());
            }
        }
        self.defs.weapons.insert(weapon.id.clone(), weapon);
        Ok(())
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}
