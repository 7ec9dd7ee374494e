// gridopolis_sim: pure Rust city-growth simulation library.
//
// This crate contains the simulation core for Gridopolis: the cell grid, the
// discrete-event scheduler and calendar, procedural terrain, zone population
// growth, and the command interface. It has no UI dependencies and can be
// tested, benchmarked, and run headless (see `main.rs`).
//
// Module overview:
// - `city.rs`:     CityModel - owns all state, step loop, zone/road/bulldoze, new maps.
// - `command.rs`:  CityCommand / CommandOutcome - player-level mutations.
// - `event.rs`:    Scheduler (priority queue of timed actions) + SimAction trait.
// - `time.rs`:     SimTime, TimeData, Month - the step-based calendar.
// - `grid.rs`:     Grid - dense 2D cell storage with bounds-checked access.
// - `cell.rs`:     Cell / Terrain - per-cell content and capability flags.
// - `zone.rs`:     Zone + Census - weekly residential/industrial population rules.
// - `map_gen.rs`:  MapGenerator - islands, rivers, lakes, forests.
// - `notify.rs`:   ModelListener / CellListener registry and delivery.
// - `config.rs`:   CityConfig + MapGenConfig - JSON-loadable tunables.
// - `error.rs`:    ConfigError, GridError, CommandError, ContractViolation, CityError.
// - `prng`:        Re-exported from `gridopolis_prng` - xoshiro256++ PRNG with SplitMix64 seeding.
// - `types.rs`:    GridLocation, GridRectangle, CellType, ZoneKind, ids.
//
// **Critical constraint: determinism.** Given its seeds, a city is a pure
// function of the commands applied to it. All randomness comes from the
// seeded PRNG. No `HashMap` iteration order leaks into behavior, and system
// time is read only to pick a seed when none was configured.

pub mod cell;
pub mod city;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod grid;
pub mod map_gen;
pub mod notify;
pub use gridopolis_prng as prng;
pub mod time;
pub mod types;
pub mod zone;
