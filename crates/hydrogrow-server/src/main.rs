//! # HydroGrow Server
//!
//! Headless authoritative host for a HydroGrow garden.
//!
//! Loads configuration, restores the last save (or plants a fresh garden),
//! runs the simulation at a fixed step and writes auto-saves when the
//! session asks for them.
//!
//! Usage: `hydrogrow [config.toml]`, or `hydrogrow --init [path]` to write
//! a default configuration file.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod config;

use anyhow::{Context, Result};
use config::ServerConfig;
use hydrogrow_common::{ContainerId, PlayerId, SpeciesId};
use hydrogrow_sim::{
    Authority, Command, CommandSender, ContainerSimulator, GrowthStage, NutrientSolution,
    PersistencePort, PhDrift, SaveError, SaveManager, SimEvent, SpeciesRegistry,
};
use std::fs;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const HOST: PlayerId = PlayerId::from_raw(1);
const HELPER: PlayerId = PlayerId::from_raw(2);

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("hydrogrow=info".parse()?))
        .init();

    info!("HydroGrow server starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(flag) if flag == "--init" => {
            let path = args.next().unwrap_or_else(|| config::CONFIG_FILE.to_string());
            ServerConfig::default()
                .save_to(&path)
                .with_context(|| format!("writing default config to {path}"))?;
            return Ok(());
        },
        Some(path) => ServerConfig::load_from(path),
        None => ServerConfig::load(),
    };
    let saves = SaveManager::new(&config.save_dir);

    let mut authority = open_garden(&config, &saves)?;
    start_session(&mut authority);
    run(&config, &mut authority, &saves);

    let save = authority.save_game(&config.save_name);
    saves
        .save(&config.save_name, &save)
        .with_context(|| format!("writing final save '{}'", config.save_name))?;
    summarize(&authority);

    info!("HydroGrow server shutdown complete");
    Ok(())
}

fn load_species(config: &ServerConfig) -> SpeciesRegistry {
    let Some(path) = &config.species_file else {
        return SpeciesRegistry::with_defaults();
    };
    let loaded = fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|text| SpeciesRegistry::from_ron(&text).map_err(|e| e.to_string()));
    match loaded {
        Ok(registry) if !registry.is_empty() => {
            info!("Loaded {} species from {}", registry.len(), path.display());
            registry
        },
        Ok(_) => {
            warn!("{} lists no species, using built-in catalog", path.display());
            SpeciesRegistry::with_defaults()
        },
        Err(e) => {
            warn!("Failed to load species from {}: {e}", path.display());
            SpeciesRegistry::with_defaults()
        },
    }
}

/// Restores the configured save, or builds a new garden if there is none.
fn open_garden(config: &ServerConfig, saves: &SaveManager) -> Result<Authority> {
    let species = load_species(config);

    match saves.load(&config.save_name) {
        Ok(save) => {
            let away_hours = now_secs().saturating_sub(save.timestamp) as f32 / 3600.0;
            let mut authority = save
                .restore(species)
                .context("restoring saved garden")?;
            let replayed = authority.catch_up_offline(away_hours);
            info!(
                "Resumed '{}' at {} ({replayed:.1} offline hours replayed)",
                config.save_name,
                authority.clock().formatted()
            );
            Ok(authority)
        },
        Err(SaveError::NotFound(_)) => Ok(new_garden(config, species)),
        Err(e) => Err(e).context("loading saved garden"),
    }
}

fn new_garden(config: &ServerConfig, species: SpeciesRegistry) -> Authority {
    let mut authority = Authority::new(config.session.clone(), species);
    authority.set_time_mode(config.time_mode);

    for (index, entry) in config.containers.iter().enumerate() {
        let id = ContainerId::new(index as u32 + 1);
        let drift = config
            .drift_seed
            .map_or_else(PhDrift::from_entropy, |seed| {
                PhDrift::seeded(seed.wrapping_add(index as u64))
            });
        let container = ContainerSimulator::new(id, entry.container_type, entry.capacity, HOST)
            .with_shared(entry.shared)
            .with_drift(drift);
        authority.insert_container(container);
        info!(
            "Created {} with {} slots",
            entry.container_type.display_name(),
            entry.capacity
        );
    }
    info!("Started new garden '{}'", config.session.session_name);
    authority
}

/// Brings the host and a helper online and queues their first actions.
fn start_session(authority: &mut Authority) {
    authority.player_joined(HOST, "Host");
    authority.player_joined(HELPER, "Helper");

    let containers: Vec<_> = authority.containers().map(ContainerSimulator::id).collect();
    let starters = starter_species(authority);
    if starters.is_empty() {
        warn!("No starter species available, nothing to plant");
        return;
    }

    let sender = authority.sender();
    for (n, container) in containers.iter().enumerate() {
        let player = if n % 2 == 0 { HOST } else { HELPER };
        let free: Vec<_> = authority
            .container(*container)
            .map(|c| {
                c.slots()
                    .iter()
                    .filter(|s| !s.is_occupied())
                    .map(|s| s.index())
                    .collect()
            })
            .unwrap_or_default();
        for (i, slot) in free.into_iter().enumerate() {
            sender.submit(
                player,
                Command::PlantSeed {
                    container: *container,
                    slot,
                    species: starters[i % starters.len()].clone(),
                },
            );
        }
    }

    if let Some(first) = containers.first() {
        // Helpers may not touch pH; this shows up as a rejection.
        sender.submit(
            HELPER,
            Command::SetPh {
                container: *first,
                value: 6.0,
            },
        );
        sender.submit(
            HELPER,
            Command::Chat {
                text: "Planted the starters!".to_string(),
            },
        );
    }
}

fn starter_species(authority: &Authority) -> Vec<SpeciesId> {
    authority
        .species()
        .unlocked_at(1)
        .into_iter()
        .map(|p| p.id.clone())
        .collect()
}

/// Runs the fixed-step loop.
fn run(config: &ServerConfig, authority: &mut Authority, saves: &dyn PersistencePort) {
    let dt = config.tick_dt();
    let step = Duration::from_secs_f32(dt);
    let sender = authority.sender();
    let starters = starter_species(authority);
    let started = Instant::now();

    for _ in 0..config.ticks {
        let frame_start = Instant::now();
        authority.tick(dt);

        for event in authority.drain_events() {
            handle_event(&event, authority, saves, &config.save_name);
        }
        tend_garden(authority, &sender, &starters);

        if config.realtime {
            if let Some(remaining) = step.checked_sub(frame_start.elapsed()) {
                std::thread::sleep(remaining);
            }
        }
    }
    info!(
        "Ran {} ticks in {:.2}s",
        config.ticks,
        started.elapsed().as_secs_f32()
    );
}

fn handle_event(event: &SimEvent, authority: &Authority, saves: &dyn PersistencePort, name: &str) {
    match event {
        SimEvent::AutoSaveDue { tick } => {
            let save = authority.save_game(name);
            match saves.save(name, &save) {
                Ok(()) => info!("Auto-saved '{name}' at tick {tick}"),
                Err(e) => warn!("Auto-save failed: {e}"),
            }
        },
        SimEvent::Harvested { player, outcome, .. } => {
            info!(
                "{player} harvested {} x{}",
                outcome.species, outcome.yield_amount
            );
        },
        SimEvent::Chat(message) => info!("[{}] {}", message.sender_name, message.text),
        SimEvent::CommandRejected { player, reason, .. } => {
            debug!("Command from {player} rejected: {reason}");
        },
        _ => {},
    }
}

/// Queues the host's routine care: harvest ripe plants, clear dead ones,
/// replant and keep the solution topped up.
fn tend_garden(authority: &Authority, sender: &CommandSender, starters: &[SpeciesId]) {
    for container in authority.containers() {
        let id = container.id();
        for slot in container.slots() {
            let Some(plant) = slot.plant() else {
                if !starters.is_empty() {
                    sender.submit(
                        HOST,
                        Command::PlantSeed {
                            container: id,
                            slot: slot.index(),
                            species: starters[slot.index() % starters.len()].clone(),
                        },
                    );
                }
                continue;
            };
            let command = match plant.stage() {
                GrowthStage::Harvest => Command::HarvestPlant {
                    container: id,
                    slot: slot.index(),
                },
                GrowthStage::Dead => Command::RemovePlant {
                    container: id,
                    slot: slot.index(),
                },
                _ => continue,
            };
            sender.submit(HOST, command);
        }
        if container.conditions().ec < 1.0 {
            sender.submit(
                HOST,
                Command::AddNutrients {
                    container: id,
                    levels: NutrientSolution::npk(0.5, 0.5, 0.5),
                },
            );
        }
        if container.conditions().water_level < 0.5 {
            sender.submit(
                HOST,
                Command::SetWaterLevel {
                    container: id,
                    value: 1.0,
                },
            );
        }
    }
}

fn summarize(authority: &Authority) {
    info!("Garden at {}", authority.clock().formatted());
    for container in authority.containers() {
        let c = container.conditions();
        info!(
            "{} ({}): {}/{} planted, pH {:.2}, EC {:.2}, water {:.0}%, O2 {:.2}",
            container.id(),
            container.container_type().display_name(),
            container.plant_count(),
            container.capacity(),
            c.ph,
            c.ec,
            c.water_level * 100.0,
            c.oxygen_level
        );
    }
    for player in authority.registry().players() {
        info!(
            "{} ({}) contribution {}",
            player.name,
            player.role.display_name(),
            player.contribution_score
        );
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
