// Procedural terrain generation.
//
// Paints a fresh map into an existing `Grid` in five fixed stages:
//
// 1. Base terrain. Plain dirt, or a "naked island": the grid flooded with
//    river, a dirt interior inset by 5 cells, and a ragged coastline made by
//    stamping river masks along all four edges at depths drawn with `erand`
//    (which favors shallow bites). `IslandMode::Seldom` builds an island one
//    map in ten; such a map skips rivers and lakes and goes straight to trees.
// 2. Rivers. From a start point in the middle third of the grid, two big
//    rivers walk off in opposite directions and one small river in a third.
//    Each walk stamps a mask, maybe turns, then moves one cell, until the
//    mask would fall off the grid.
// 3. Lakes. Clusters of 2..=14 jittered mask stamps around random centers,
//    mostly small masks.
// 4. River smoothing. Reserved. Edge-tile selection is not modeled, so this
//    stage draws nothing and changes nothing.
// 5. Trees. Random walks that turn dirt into woods, followed by two passes
//    of a 4-neighbor cellular automaton that prunes ragged forest edges.
//
// The generator owns its RNG, and the walks share cursor state
// (`cursor`, `dir`, `last_dir`) across stages exactly as the algorithm
// dictates: the small river inherits the second big river's heading.
//
// Mask stamps that land off the grid are skipped cell by cell. Nothing here
// can fail.
//
// See also: `grid.rs` for the target, `config.rs` for `MapGenConfig`,
// `city.rs` which decides when to reuse a generator and when to build one.
//
// **Critical constraint: determinism.** The RNG is consumed in exactly the
// stage and sub-step order above. Same (dimensions, config, seed) gives a
// cell-for-cell identical grid. Never reorder, add, or skip a draw.

use crate::cell::Cell;
use crate::config::{IslandMode, MapGenConfig};
use crate::grid::Grid;
use crate::prng::GameRng;
use crate::types::GridLocation;

/// Width of the river border around a naked island.
const ISLAND_BORDER: i32 = 5;
/// Coastline bites reach at most this deep.
const ISLAND_RADIUS: i32 = 18;
/// Percent chance that `IslandMode::Seldom` builds an island.
const SELDOM_ISLAND_PERCENT: i32 = 10;

/// Grid area that supports the nominal amount of lakes and forest.
const AREA_UNIT: i32 = 12_000;

// 8-way compass, clockwise from north. Index with `dir & 7`.
const DIRECTION_DX: [i32; 8] = [0, 1, 1, 1, 0, -1, -1, -1];
const DIRECTION_DY: [i32; 8] = [-1, -1, 0, 1, 1, 1, 0, -1];

/// 9x9 big river stamp. Non-zero entries become river; rows are y.
const BIG_RIVER_MASK: [[u8; 9]; 9] = [
    [0, 0, 0, 3, 3, 3, 0, 0, 0],
    [0, 0, 3, 2, 2, 2, 3, 0, 0],
    [0, 3, 2, 2, 2, 2, 2, 3, 0],
    [3, 2, 2, 2, 2, 2, 2, 2, 3],
    [3, 2, 2, 2, 4, 2, 2, 2, 3],
    [3, 2, 2, 2, 2, 2, 2, 2, 3],
    [0, 3, 2, 2, 2, 2, 2, 3, 0],
    [0, 0, 3, 2, 2, 2, 3, 0, 0],
    [0, 0, 0, 3, 3, 3, 0, 0, 0],
];

/// 6x6 small river stamp.
const SMALL_RIVER_MASK: [[u8; 6]; 6] = [
    [0, 0, 3, 3, 0, 0],
    [0, 3, 2, 2, 3, 0],
    [3, 2, 2, 2, 2, 3],
    [3, 2, 2, 2, 2, 3],
    [0, 3, 2, 2, 3, 0],
    [0, 0, 3, 3, 0, 0],
];

// Tree smoothing looks at the west, south, east, and north neighbors in
// that order; the first is the most significant bit of the table index.
const SMOOTH_DX: [i32; 4] = [-1, 0, 1, 0];
const SMOOTH_DY: [i32; 4] = [0, 1, 0, -1];

/// Whether a woods cell survives smoothing, by neighbor mask.
const KEEP_WOODS: [bool; 16] = [
    false, false, false, true, //
    false, false, true, true, //
    false, true, false, true, //
    true, true, true, true,
];

/// What a generation run produced, for logging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MapSummary {
    pub island: bool,
    pub river_start: Option<GridLocation>,
    pub lakes: i32,
    pub tree_splashes: i32,
}

#[derive(Clone, Debug)]
pub struct MapGenerator {
    config: MapGenConfig,
    rng: GameRng,
    start: GridLocation,
    cursor: GridLocation,
    dir: i32,
    last_dir: i32,
}

impl MapGenerator {
    /// A generator drawing from `rng`. The caller resolves the seed.
    pub fn new(config: MapGenConfig, rng: GameRng) -> Self {
        Self {
            config,
            rng,
            start: GridLocation::new(0, 0),
            cursor: GridLocation::new(0, 0),
            dir: 0,
            last_dir: 0,
        }
    }

    pub fn config(&self) -> &MapGenConfig {
        &self.config
    }

    /// True if `other` would configure an identical generator, so this one
    /// can be reused (continuing its RNG stream).
    pub fn same_config(&self, other: &MapGenConfig) -> bool {
        self.config == *other
    }

    /// Overwrite every cell of `grid` with new terrain.
    pub fn generate(&mut self, grid: &mut Grid) -> MapSummary {
        let mut summary = MapSummary::default();

        let island = self.config.island;
        match island {
            IslandMode::Seldom if self.rng.next_int(100) < SELDOM_ISLAND_PERCENT => {
                self.make_naked_island(grid);
                self.smooth_river(grid);
                if self.config.tree_level != 0 {
                    summary.tree_splashes = self.do_trees(grid);
                }
                summary.island = true;
                tracing::debug!(?summary, "generated island map");
                return summary;
            }
            IslandMode::Seldom | IslandMode::Never => grid.fill(|_| Cell::Dirt),
            IslandMode::Always => {
                self.make_naked_island(grid);
                summary.island = true;
            }
        }

        self.pick_start(grid);
        summary.river_start = Some(self.start);

        if self.config.curve_level != 0 {
            self.do_rivers(grid);
        }
        if self.config.lake_level != 0 {
            summary.lakes = self.make_lakes(grid);
        }
        self.smooth_river(grid);
        if self.config.tree_level != 0 {
            summary.tree_splashes = self.do_trees(grid);
        }

        tracing::debug!(?summary, "generated map");
        summary
    }

    // -- base terrain -----------------------------------------------------

    fn make_naked_island(&mut self, grid: &mut Grid) {
        let width = grid.width();
        let height = grid.height();

        grid.fill(|loc| {
            let inland = loc.x >= ISLAND_BORDER
                && loc.x < width - ISLAND_BORDER
                && loc.y >= ISLAND_BORDER
                && loc.y < height - ISLAND_BORDER;
            if inland { Cell::Dirt } else { Cell::River }
        });

        // North and south coasts.
        for x in (0..width - 5).step_by(2) {
            self.cursor = GridLocation::new(x, self.rng.erand(ISLAND_RADIUS + 1));
            self.stamp(grid, &BIG_RIVER_MASK);
            self.cursor.y = (height - 10) - self.rng.erand(ISLAND_RADIUS + 1);
            self.stamp(grid, &BIG_RIVER_MASK);
            self.cursor.y = 0;
            self.stamp(grid, &SMALL_RIVER_MASK);
            self.cursor.y = height - 6;
            self.stamp(grid, &SMALL_RIVER_MASK);
        }

        // West and east coasts.
        for y in (0..height - 5).step_by(2) {
            self.cursor = GridLocation::new(self.rng.erand(ISLAND_RADIUS + 1), y);
            self.stamp(grid, &BIG_RIVER_MASK);
            self.cursor.x = (width - 10) - self.rng.erand(ISLAND_RADIUS + 1);
            self.stamp(grid, &BIG_RIVER_MASK);
            self.cursor.x = 0;
            self.stamp(grid, &SMALL_RIVER_MASK);
            self.cursor.x = width - 6;
            self.stamp(grid, &SMALL_RIVER_MASK);
        }
    }

    /// Choose the river source somewhere in the middle third on each axis.
    fn pick_start(&mut self, grid: &Grid) {
        let w3 = grid.width() / 3;
        let h3 = grid.height() / 3;
        let x = w3 + self.rng.next_int(grid.width() - 2 * w3);
        let y = h3 + self.rng.next_int(grid.height() - 2 * h3);
        self.start = GridLocation::new(x, y);
        self.cursor = self.start;
    }

    // -- rivers and lakes -------------------------------------------------

    fn do_rivers(&mut self, grid: &mut Grid) {
        self.last_dir = self.rng.next_int(4);
        self.dir = self.last_dir;
        self.walk_river(grid, &BIG_RIVER_MASK);

        self.cursor = self.start;
        self.last_dir ^= 4;
        self.dir = self.last_dir;
        self.walk_river(grid, &BIG_RIVER_MASK);

        // The small river keeps the current heading; only the direction it
        // snaps back to is redrawn.
        self.cursor = self.start;
        self.last_dir = self.rng.next_int(4);
        self.walk_river(grid, &SMALL_RIVER_MASK);
    }

    /// Stamp-turn-move until the mask's far corner leaves the grid.
    fn walk_river<const N: usize>(&mut self, grid: &mut Grid, mask: &[[u8; N]; N]) {
        let (keep_odds, turn_odds) = if self.config.curve_level < 0 {
            (100, 200)
        } else {
            (self.config.curve_level + 10, self.config.curve_level + 100)
        };
        // Far corner of the mask relative to the cursor.
        let reach = N as i32 / 2;

        while grid.valid_coords(self.cursor.x + reach, self.cursor.y + reach) {
            self.stamp(grid, mask);
            if self.rng.next_int(keep_odds + 1) < 10 {
                self.dir = self.last_dir;
            } else {
                if self.rng.next_int(turn_odds + 1) > 90 {
                    self.dir += 1;
                }
                if self.rng.next_int(turn_odds + 1) > 90 {
                    self.dir -= 1;
                }
            }
            self.advance(self.dir);
        }
    }

    fn make_lakes(&mut self, grid: &mut Grid) -> i32 {
        let lakes = if self.config.lake_level < 0 {
            // About 11 on a 120x100 map; a map too small for one gets none.
            let max_lakes = (11 * grid.width() * grid.height()) / AREA_UNIT;
            self.rng.next_int(max_lakes.max(1))
        } else {
            self.config.lake_level / 2
        };

        for _ in 0..lakes {
            let x = self.rng.next_int((grid.width() - 20).max(1)) + 10;
            let y = self.rng.next_int((grid.height() - 19).max(1)) + 10;
            let stamps = self.rng.next_int(13) + 2;

            for _ in 0..stamps {
                self.cursor = GridLocation::new(
                    x - 6 + self.rng.next_int(13),
                    y - 6 + self.rng.next_int(13),
                );
                if self.rng.next_int(5) != 0 {
                    self.stamp(grid, &SMALL_RIVER_MASK);
                } else {
                    self.stamp(grid, &BIG_RIVER_MASK);
                }
            }
        }
        lakes
    }

    /// Reserved for river edge shaping; intentionally does nothing.
    fn smooth_river(&mut self, _grid: &mut Grid) {}

    // -- trees ------------------------------------------------------------

    fn do_trees(&mut self, grid: &mut Grid) -> i32 {
        let area = grid.width() * grid.height();
        let splashes = if self.config.tree_level < 0 {
            ((self.rng.next_int(101) + 50) * area) / AREA_UNIT
        } else {
            self.config.tree_level + 3
        };

        for _ in 0..splashes {
            let x = self.rng.next_int(grid.width());
            let y = self.rng.next_int(grid.height());
            self.tree_splash(grid, GridLocation::new(x, y));
        }

        smooth_trees(grid);
        smooth_trees(grid);
        splashes
    }

    /// Random walk from `origin`, planting woods on dirt, until the walk
    /// runs out or steps off the grid.
    fn tree_splash(&mut self, grid: &mut Grid, origin: GridLocation) {
        let length = if self.config.tree_level < 0 {
            self.rng.next_int(151) + 50
        } else {
            self.rng.next_int(101 + 2 * self.config.tree_level) + 50
        };

        self.cursor = origin;
        for _ in 0..length {
            let dir = self.rng.next_int(8);
            self.advance(dir);
            match grid.get(self.cursor) {
                None => return,
                Some(Cell::Dirt) => {
                    grid.set_if_valid(self.cursor, Cell::Woods);
                }
                Some(_) => {}
            }
        }
    }

    // -- helpers ----------------------------------------------------------

    fn advance(&mut self, dir: i32) {
        let d = (dir & 7) as usize;
        self.cursor = self.cursor.offset(DIRECTION_DX[d], DIRECTION_DY[d]);
    }

    /// Write river wherever `mask` is non-zero, with the mask's upper-left
    /// corner at the cursor. Off-grid cells are skipped.
    fn stamp<const N: usize>(&self, grid: &mut Grid, mask: &[[u8; N]; N]) {
        for (col, dx) in (0..N).zip(0i32..) {
            for (row, dy) in mask.iter().zip(0i32..) {
                if row[col] != 0 {
                    grid.set_if_valid(self.cursor.offset(dx, dy), Cell::River);
                }
            }
        }
    }
}

/// One in-place pass of forest edge smoothing, row by row. A woods cell is
/// kept or reverted to dirt by looking up which of its four neighbors are
/// woods (as of this point in the pass).
pub fn smooth_trees(grid: &mut Grid) {
    for y in 0..grid.height() {
        for x in 0..grid.width() {
            let here = GridLocation::new(x, y);
            if !grid.get(here).is_some_and(|c| c.is_tree()) {
                continue;
            }
            let mut mask = 0usize;
            for (dx, dy) in SMOOTH_DX.iter().zip(SMOOTH_DY.iter()) {
                mask <<= 1;
                if grid.get(here.offset(*dx, *dy)).is_some_and(|c| c.is_tree()) {
                    mask |= 1;
                }
            }
            if !KEEP_WOODS[mask & 15] {
                grid.set_if_valid(here, Cell::Dirt);
            }
        }
    }
}
