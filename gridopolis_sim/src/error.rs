// Error taxonomy for the simulation core.
//
// Four families, each its own enum so callers can match on the one they care
// about:
// - `ConfigError`: bad configuration, raised before any state is built.
// - `GridError`: direct cell access outside the grid.
// - `CommandError`: a player-level request that cannot be honored. No state
//   has been touched when one of these is returned.
// - `ContractViolation`: the orchestration layer broke one of its own rules
//   (scheduling into the past, bulldozing a river). Not a user condition.
//
// `CityError` wraps all four so public `CityModel` operations can return one
// type and use `?` throughout.
//
// See also: `command.rs` which produces most `CommandError`s, `event.rs` and
// `cell.rs` which raise `ContractViolation`s.

use crate::types::{ActionId, CellType, GridRectangle, ZoneId};
use thiserror::Error;

/// Invalid configuration, detected at load or construction time.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("grid must be at least {min}x{min}, got {width}x{height}")]
    GridTooSmall { width: i32, height: i32, min: i32 },

    #[error("epoch week must be in 1..={max}, got {week}")]
    InvalidEpochWeek { week: i32, max: i32 },

    #[error("{name} must be at most {max}, got {value}")]
    LevelOutOfRange {
        name: &'static str,
        value: i32,
        max: i32,
    },

    #[error("unknown month name: {0:?}")]
    UnknownMonth(String),

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config read error: {0}")]
    Io(#[from] std::io::Error),
}

/// Direct cell access outside the grid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("cell ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
}

/// A broken internal invariant. These indicate a bug in the caller, not bad
/// input, and are never swallowed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("action scheduled at step {target}, before the current step {current}")]
    ScheduledInPast { target: i64, current: i64 },

    #[error("{cell_type} at ({x}, {y}) cannot be bulldozed")]
    NotBulldozeable { x: i32, y: i32, cell_type: CellType },

    #[error("no zone with id {0}")]
    UnknownZone(ZoneId),

    #[error("no registered action with id {0}")]
    UnknownAction(ActionId),

    #[error("invalid phase: step {step_number} modulo {modulus}")]
    InvalidPhase { step_number: i64, modulus: i64 },
}

/// A player request that was refused. Carries a message fit for display.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Cannot build at {0}")]
    NotBuildable(GridRectangle),

    #[error("Cannot bulldoze {0}")]
    NotBulldozeable(GridRectangle),

    #[error("Cannot build, invalid rectangle {0}: roads must be 1 cell wide")]
    RoadShape(GridRectangle),

    #[error("Cannot build road over {0}: a road or zone is in the way")]
    RoadObstructed(GridRectangle),

    #[error("{0} is not inside the grid")]
    OutsideGrid(GridRectangle),

    #[error("Cannot create a new map after the simulation has started")]
    MapLocked,

    #[error("Step count must be positive")]
    NoSteps,
}

/// Any failure a `CityModel` operation can report.
#[derive(Error, Debug)]
pub enum CityError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("contract violation: {0}")]
    Contract(#[from] ContractViolation),
}

impl CityError {
    /// True for refusals the player can correct; false for bugs and
    /// configuration failures.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CityError::Command(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_errors_render_player_messages() {
        let rect = GridRectangle::new(4, 5, 3, 3);
        assert_eq!(
            CommandError::NotBuildable(rect).to_string(),
            "Cannot build at 3x3 at (4, 5)"
        );
        assert_eq!(
            CommandError::NotBulldozeable(rect).to_string(),
            "Cannot bulldoze 3x3 at (4, 5)"
        );
    }

    #[test]
    fn only_command_errors_are_recoverable() {
        let cmd: CityError = CommandError::MapLocked.into();
        assert!(cmd.is_recoverable());
        let bug: CityError = ContractViolation::ScheduledInPast {
            target: 1,
            current: 4,
        }
        .into();
        assert!(!bug.is_recoverable());
        assert!(bug.to_string().starts_with("contract violation"));
    }

    #[test]
    fn json_errors_convert_into_config_errors() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        let config: ConfigError = err.into();
        assert!(matches!(config, ConfigError::Json(_)));
    }
}
