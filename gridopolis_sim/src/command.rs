// Commands: the single mutation path for player-level requests.
//
// Every change a player (or a driver acting for one) can make to a city is a
// `CityCommand`, applied through `CityModel::apply`. Each command validates
// before it mutates, so a `CommandError` always means the city is untouched.
// Routing everything through one entry point also serializes mutations: a
// host never has two of them in flight against the same model.
//
// Commands carry no references, only coordinates and kinds, so they can be
// built from parsed text, queued, logged, or replayed.
//
// See also: `city.rs` for `apply` and the operations each variant invokes,
// `error.rs` for the `CommandError` messages.

use crate::map_gen::MapSummary;
use crate::time::TimeInterval;
use crate::types::{GridLocation, GridRectangle, ZoneId, ZoneKind};
use serde::{Deserialize, Serialize};

/// A player-level request against a city.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CityCommand {
    /// Lay down a 3x3 zone centered on `center`.
    Zone { kind: ZoneKind, center: GridLocation },
    /// Pave a straight 1-wide strip.
    Road { rect: GridRectangle },
    /// Clear everything in `rect`. Zones touched anywhere go entirely.
    Bulldoze { rect: GridRectangle },
    /// Repaint the terrain. Only allowed before the first step.
    NewMap { regenerate: bool },
    /// Advance `count` intervals.
    Step { count: u32, interval: TimeInterval },
}

/// What a successfully applied command did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    ZonePlaced(ZoneId),
    RoadBuilt(GridRectangle),
    Bulldozed(GridRectangle),
    MapGenerated(MapSummary),
    Stepped { steps: i64 },
}

impl CityCommand {
    /// Number of steps a `Step` command covers; zero for everything else.
    pub fn steps(&self) -> i64 {
        match *self {
            CityCommand::Step { count, interval } => i64::from(count) * interval.steps(),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_command_counts_steps() {
        let cmd = CityCommand::Step {
            count: 3,
            interval: TimeInterval::Month,
        };
        assert_eq!(cmd.steps(), 96);
        let zone = CityCommand::Zone {
            kind: ZoneKind::Residential,
            center: GridLocation::new(5, 5),
        };
        assert_eq!(zone.steps(), 0);
    }

    #[test]
    fn commands_deserialize_from_json() {
        let cmds: Vec<CityCommand> = serde_json::from_str(
            r#"[
                { "Zone": { "kind": "Industrial", "center": { "x": 4, "y": 6 } } },
                { "Road": { "rect": { "x": 9, "y": 2, "width": 1, "height": -5 } } },
                { "Step": { "count": 2, "interval": "Week" } }
            ]"#,
        )
        .unwrap();
        assert_eq!(
            cmds[1],
            CityCommand::Road {
                rect: GridRectangle::new(9, -2, 1, 5)
            }
        );
        assert_eq!(cmds[2].steps(), 16);
    }
}
