//! Server configuration.
//!
//! Loaded from a TOML file; anything missing takes its default value.

use hydrogrow_sim::{ContainerType, SessionSettings, TimeMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "hydrogrow.toml";

/// One container to create in a new garden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Hydroponic system type
    pub container_type: ContainerType,
    /// Number of plant slots
    pub capacity: usize,
    /// Whether other players may work on it
    pub shared: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            container_type: ContainerType::Dwc,
            capacity: 4,
            shared: true,
        }
    }
}

/// Server configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Simulation ticks per real second
    pub tick_rate: u32,
    /// Ticks to run before shutting down
    pub ticks: u64,
    /// Sleep between ticks to run in real time
    pub realtime: bool,
    /// Starting game speed
    pub time_mode: TimeMode,
    /// Seed for container pH drift (None = random)
    pub drift_seed: Option<u64>,
    /// Directory for save files
    pub save_dir: PathBuf,
    /// Save slot name
    pub save_name: String,
    /// RON species catalog (None = built-in species)
    pub species_file: Option<PathBuf>,
    /// Session settings
    pub session: SessionSettings,
    /// Containers created for a new garden
    pub containers: Vec<ContainerConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: 10,
            ticks: 6_000,
            realtime: false,
            time_mode: TimeMode::Accelerated,
            drift_seed: None,
            save_dir: PathBuf::from("saves"),
            save_name: "garden".to_string(),
            species_file: None,
            session: SessionSettings::default(),
            containers: vec![
                ContainerConfig::default(),
                ContainerConfig {
                    container_type: ContainerType::Nft,
                    capacity: 6,
                    shared: true,
                },
            ],
        }
    }
}

impl ServerConfig {
    /// Load configuration from the default file location.
    pub fn load() -> Self {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration from a specific path.
    /// Returns default config if the file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file {} not found, using defaults", path.display());
            return Self::default();
        }

        let mut contents = String::new();
        match fs::File::open(path) {
            Ok(mut file) => {
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read config file: {e}");
                    return Self::default();
                }
            },
            Err(e) => {
                warn!("Failed to open config file: {e}");
                return Self::default();
            },
        }

        match toml::from_str::<Self>(&contents) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config.sanitized()
            },
            Err(e) => {
                warn!("Failed to parse config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Seconds of real time per tick.
    #[must_use]
    pub fn tick_dt(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }

    fn sanitized(mut self) -> Self {
        if self.tick_rate == 0 {
            warn!("tick_rate must be positive, using 10");
            self.tick_rate = 10;
        }
        self.containers.retain(|c| {
            if c.capacity == 0 {
                warn!("Ignoring {} container with no slots", c.container_type.display_name());
            }
            c.capacity > 0
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.tick_rate, 10);
        assert!((config.tick_dt() - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.time_mode, TimeMode::Accelerated);
        assert_eq!(config.containers.len(), 2);
        assert_eq!(config.session.max_players, 4);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ServerConfig::load_from("/nonexistent/hydrogrow.toml");
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"
tick_rate = 0
drift_seed = 42
time_mode = "Fast"

[session]
max_players = 8

[[containers]]
container_type = "Aeroponics"
capacity = 9

[[containers]]
capacity = 0
"#,
        )
        .expect("write config");

        let config = ServerConfig::load_from(&path);
        assert_eq!(config.tick_rate, 10);
        assert_eq!(config.drift_seed, Some(42));
        assert_eq!(config.time_mode, TimeMode::Fast);
        assert_eq!(config.session.max_players, 8);
        assert!(config.session.allow_visitors);
        assert_eq!(config.containers.len(), 1);
        assert_eq!(config.containers[0].container_type, ContainerType::Aeroponics);
        assert!(config.containers[0].shared);
    }

    #[test]
    fn test_invalid_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "tick_rate = \"fast\"").expect("write config");
        assert_eq!(ServerConfig::load_from(&path), ServerConfig::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let mut config = ServerConfig::default();
        config.drift_seed = Some(7);
        config.save_to(&path).expect("save config");
        assert_eq!(ServerConfig::load_from(&path), config);
    }
}
