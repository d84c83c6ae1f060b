//! Save/load of the authoritative world.
//!
//! A save is a flat record of the clock, the session registry and every
//! container. It is written with bincode behind a magic-byte header and
//! replaced atomically on disk.

use crate::authority::Authority;
use crate::container::{ContainerRecord, ContainerSimulator};
use crate::session::{PlayerRegistry, SessionRecord, SessionSettings};
use crate::species::SpeciesRegistry;
use crate::time::GameClock;
use hydrogrow_common::{MagicBytes, SchemaVersion, SimError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Garden persistence failures.
#[derive(Debug, Error)]
pub enum SaveError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid magic bytes
    #[error("Not a HydroGrow save file")]
    InvalidFormat,

    /// Version mismatch
    #[error("Incompatible save version: expected {expected}, found {found}")]
    VersionMismatch {
        /// Version this build reads
        expected: SchemaVersion,
        /// Version stamped on the file
        found: SchemaVersion,
    },

    /// Save file not found
    #[error("No save named {0}")]
    NotFound(String),

    /// Save file corrupted
    #[error("Garden save corrupted: {0}")]
    Corrupted(String),
}

impl From<SimError> for SaveError {
    fn from(err: SimError) -> Self {
        Self::Corrupted(err.to_string())
    }
}

/// Result alias for persistence.
pub type SaveResult<T> = Result<T, SaveError>;

/// Complete saved world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveGame {
    /// Save format version
    pub version: SchemaVersion,
    /// Save name
    pub name: String,
    /// Save timestamp (Unix seconds)
    pub timestamp: u64,
    /// Authority tick at save time
    pub tick: u64,
    /// Game clock
    pub clock: GameClock,
    /// Session registry
    pub session: SessionRecord,
    /// All containers
    pub containers: Vec<ContainerRecord>,
}

impl SaveGame {
    /// Captures the current state of an authority.
    #[must_use]
    pub fn capture(name: impl Into<String>, authority: &Authority) -> Self {
        Self {
            version: SchemaVersion::SAVE,
            name: name.into(),
            timestamp: current_timestamp(),
            tick: authority.tick_count(),
            clock: authority.clock().clone(),
            session: authority.registry().to_record(),
            containers: authority.containers().map(ContainerSimulator::to_record).collect(),
        }
    }

    /// Rebuilds an authority from this save.
    ///
    /// Players restored from a save are offline until they rejoin.
    pub fn restore(mut self, species: SpeciesRegistry) -> SaveResult<Authority> {
        for player in &mut self.session.players {
            player.is_online = false;
        }
        let containers = self
            .containers
            .into_iter()
            .map(ContainerSimulator::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        for container in &containers {
            for slot in container.slots() {
                if let Some(plant) = slot.plant() {
                    if species.get(plant.species()).is_none() {
                        warn!(
                            "Save references unknown species '{}' in {}",
                            plant.species(),
                            container.id()
                        );
                    }
                }
            }
        }
        let registry = PlayerRegistry::from_record(self.session);
        info!(
            "Restored save '{}' with {} containers at tick {}",
            self.name,
            containers.len(),
            self.tick
        );
        Ok(Authority::from_parts(
            registry, species, self.clock, containers, self.tick,
        ))
    }

    /// Stamps the save with the current wall-clock time.
    pub fn update_timestamp(&mut self) {
        self.timestamp = current_timestamp();
    }

    /// Number of plants across all containers.
    #[must_use]
    pub fn plant_count(&self) -> usize {
        // Records only list occupied slots.
        self.containers.iter().map(|c| c.slots.len()).sum()
    }

    /// Encodes the save with its magic header.
    pub fn to_bytes(&self) -> SaveResult<Vec<u8>> {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&MagicBytes::SAVE.0);
        let data =
            bincode::serialize(self).map_err(|e| SaveError::Serialization(e.to_string()))?;
        buffer.extend(data);
        Ok(buffer)
    }

    /// Decodes a save, checking the header and version.
    pub fn from_bytes(bytes: &[u8]) -> SaveResult<Self> {
        if !MagicBytes::SAVE.matches(bytes) {
            return Err(SaveError::InvalidFormat);
        }

        let save: SaveGame =
            bincode::deserialize(&bytes[4..]).map_err(|e| SaveError::Corrupted(e.to_string()))?;

        if !SchemaVersion::SAVE.can_read(&save.version) {
            return Err(SaveError::VersionMismatch {
                expected: SchemaVersion::SAVE,
                found: save.version,
            });
        }

        Ok(save)
    }
}

impl Default for SaveGame {
    fn default() -> Self {
        Self {
            version: SchemaVersion::SAVE,
            name: String::new(),
            timestamp: current_timestamp(),
            tick: 0,
            clock: GameClock::new(),
            session: PlayerRegistry::new(SessionSettings::default()).to_record(),
            containers: Vec::new(),
        }
    }
}

/// Save metadata for listing saves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveMetadata {
    /// Save name
    pub name: String,
    /// Save timestamp
    pub timestamp: u64,
    /// Save file size in bytes
    pub file_size: u64,
    /// Game time in seconds
    pub game_seconds: f64,
    /// Number of containers
    pub container_count: usize,
    /// Number of plants
    pub plant_count: usize,
    /// Number of registered players
    pub player_count: usize,
}

impl SaveMetadata {
    /// Summarizes a loaded garden save.
    #[must_use]
    pub fn from_save(save: &SaveGame, file_size: u64) -> Self {
        Self {
            name: save.name.clone(),
            timestamp: save.timestamp,
            file_size,
            game_seconds: save.clock.game_seconds(),
            container_count: save.containers.len(),
            plant_count: save.plant_count(),
            player_count: save.session.players.len(),
        }
    }

    /// In-game time as "Day N, HH:MM".
    #[must_use]
    pub fn formatted_game_time(&self) -> String {
        let total_secs = self.game_seconds as u64;
        let days = total_secs / 86400 + 1;
        let hours = (total_secs % 86400) / 3600;
        let minutes = (total_secs % 3600) / 60;
        format!("Day {days}, {hours:02}:{minutes:02}")
    }
}

/// Storage for saved worlds.
pub trait PersistencePort {
    /// Stores a save under `name`, replacing any previous one.
    fn save(&self, name: &str, data: &SaveGame) -> SaveResult<()>;

    /// Loads the save stored under `name`.
    fn load(&self, name: &str) -> SaveResult<SaveGame>;
}

/// Reads and writes garden saves on disk.
#[derive(Debug)]
pub struct SaveManager {
    save_dir: PathBuf,
}

impl SaveManager {
    /// Save manager rooted at `save_dir`.
    #[must_use]
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
        }
    }

    /// Directory holding the save files.
    #[must_use]
    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Creates the save directory if missing.
    pub fn ensure_dir(&self) -> SaveResult<()> {
        fs::create_dir_all(&self.save_dir)?;
        Ok(())
    }

    fn save_path(&self, name: &str) -> PathBuf {
        self.save_dir.join(format!("{name}.sav"))
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        self.save_dir.join(format!("{name}.sav.tmp"))
    }

    /// Saves a world to disk.
    ///
    /// Writes to a temp file first, then renames over the old save.
    pub fn save(&self, name: &str, data: &SaveGame) -> SaveResult<()> {
        self.ensure_dir()?;

        let bytes = data.to_bytes()?;
        let temp_path = self.temp_path(name);
        let final_path = self.save_path(name);

        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &final_path)?;
        debug!("Wrote save '{name}' ({} bytes)", bytes.len());
        Ok(())
    }

    /// Loads a world from disk.
    pub fn load(&self, name: &str) -> SaveResult<SaveGame> {
        let path = self.save_path(name);

        if !path.exists() {
            return Err(SaveError::NotFound(name.to_string()));
        }

        let mut file = fs::File::open(&path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        SaveGame::from_bytes(&bytes)
    }

    /// Lists all readable saves, newest first.
    pub fn list_saves(&self) -> SaveResult<Vec<SaveMetadata>> {
        self.ensure_dir()?;

        let mut saves = Vec::new();
        for entry in fs::read_dir(&self.save_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "sav") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.load(stem) {
                Ok(save) => {
                    let file_size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                    saves.push(SaveMetadata::from_save(&save, file_size));
                }
                Err(err) => warn!("Skipping unreadable save '{stem}': {err}"),
            }
        }

        saves.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(saves)
    }

    /// Gets metadata for a specific save.
    pub fn get_metadata(&self, name: &str) -> SaveResult<SaveMetadata> {
        let save = self.load(name)?;
        let file_size = fs::metadata(self.save_path(name))
            .map(|m| m.len())
            .unwrap_or(0);
        Ok(SaveMetadata::from_save(&save, file_size))
    }

    /// Deletes a save file.
    pub fn delete(&self, name: &str) -> SaveResult<()> {
        let path = self.save_path(name);
        if !path.exists() {
            return Err(SaveError::NotFound(name.to_string()));
        }
        fs::remove_file(&path)?;
        Ok(())
    }

    /// Checks if a save exists.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.save_path(name).exists()
    }

    /// Copies an existing save to a timestamped backup name.
    pub fn backup(&self, name: &str) -> SaveResult<String> {
        let backup_name = format!("{name}_backup_{}", current_timestamp());
        let data = self.load(name)?;
        self.save(&backup_name, &data)?;
        Ok(backup_name)
    }
}

impl PersistencePort for SaveManager {
    fn save(&self, name: &str, data: &SaveGame) -> SaveResult<()> {
        SaveManager::save(self, name, data)
    }

    fn load(&self, name: &str) -> SaveResult<SaveGame> {
        SaveManager::load(self, name)
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
