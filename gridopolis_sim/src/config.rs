// Data-driven city configuration.
//
// All tunables live in `CityConfig`, loaded from JSON (partial files are
// fine; every missing field falls back to `Default`). `validate()` runs
// before any simulation state is built, so a bad file fails up front with a
// `ConfigError` rather than halfway through construction.
//
// Map generator settings are grouped in `MapGenConfig`. Its three "levels"
// share a convention: negative means "pick a magnitude at random", zero
// disables the stage, positive is an explicit magnitude, capped at
// `MAX_MAP_LEVEL`.
//
// See also: `city.rs` which consumes the config, `map_gen.rs` which reads
// `MapGenConfig`, `time.rs` for `Month`.
//
// **Critical constraint: determinism.** Given a config with both seeds set,
// a run is fully reproducible. An absent seed is resolved exactly once, at
// construction, and logged so the run can be replayed.

use crate::error::ConfigError;
use crate::grid::MIN_GRID_SIZE;
use crate::time::{Month, TimeData, WEEKS_PER_MONTH};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest explicit generator level `validate` accepts.
pub const MAX_MAP_LEVEL: i32 = 1000;

/// How the generator decides whether to build an island.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IslandMode {
    Never,
    Always,
    /// One map in ten.
    #[default]
    Seldom,
}

/// Terrain generator settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapGenConfig {
    pub island: IslandMode,
    /// Forest coverage: number of tree splashes and their length.
    pub tree_level: i32,
    /// River curviness; higher wanders more.
    pub curve_level: i32,
    /// Number of lakes (explicit levels are halved).
    pub lake_level: i32,
    /// Generator seed. When absent it is drawn from the city's RNG.
    pub seed: Option<u64>,
}

impl MapGenConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("tree_level", self.tree_level),
            ("curve_level", self.curve_level),
            ("lake_level", self.lake_level),
        ] {
            if value > MAX_MAP_LEVEL {
                return Err(ConfigError::LevelOutOfRange {
                    name,
                    value,
                    max: MAX_MAP_LEVEL,
                });
            }
        }
        Ok(())
    }
}

impl Default for MapGenConfig {
    fn default() -> Self {
        Self {
            island: IslandMode::Seldom,
            tree_level: -1,
            curve_level: -1,
            lake_level: -1,
            seed: None,
        }
    }
}

/// The calendar date at which step 0 falls. `week` is one-based here, as
/// players write it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpochConfig {
    pub year: i64,
    pub month: Month,
    pub week: i64,
}

impl Default for EpochConfig {
    fn default() -> Self {
        Self {
            year: 2000,
            month: Month::Jan,
            week: 1,
        }
    }
}

impl EpochConfig {
    /// The epoch as a zero-based calendar date at step 0.
    pub fn time_data(&self) -> TimeData {
        TimeData::new(self.year, self.month, self.week - 1, 0)
    }
}

/// Everything needed to build a `CityModel`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CityConfig {
    pub grid_width: i32,
    pub grid_height: i32,
    /// Seed for the city RNG (zone population rolls, generator seeding).
    pub seed: Option<u64>,
    pub epoch: EpochConfig,
    pub map: MapGenConfig,
    /// Run the map generator during construction.
    pub generate_map: bool,
}

impl Default for CityConfig {
    fn default() -> Self {
        Self {
            grid_width: 120,
            grid_height: 100,
            seed: None,
            epoch: EpochConfig::default(),
            map: MapGenConfig::default(),
            generate_map: false,
        }
    }
}

impl CityConfig {
    /// Parse a config from a JSON string. Does not validate.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read, parse, and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_width < MIN_GRID_SIZE || self.grid_height < MIN_GRID_SIZE {
            return Err(ConfigError::GridTooSmall {
                width: self.grid_width,
                height: self.grid_height,
                min: MIN_GRID_SIZE,
            });
        }
        if !(1..=WEEKS_PER_MONTH).contains(&self.epoch.week) {
            return Err(ConfigError::InvalidEpochWeek {
                week: self.epoch.week as i32,
                max: WEEKS_PER_MONTH as i32,
            });
        }
        self.map.validate()
    }
}
