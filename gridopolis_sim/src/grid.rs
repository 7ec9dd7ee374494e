// Dense 2D grid of cells: the city's spatial truth.
//
// Stored as a flat `Vec<Cell>` indexed by `x + y * width`, giving O(1)
// read/write access. Unlike region predicates (which answer "no" for
// anything off the map), direct access outside the grid is a caller bug and
// returns `GridError::OutOfBounds`.
//
// Both dimensions are at least `MIN_GRID_SIZE`. The grid is replaced
// wholesale when a new map is requested at a different size.
//
// See also: `map_gen.rs` which paints terrain into the grid, `city.rs`
// which owns it, `cell.rs` for the slot contents.

use crate::cell::Cell;
use crate::error::{ConfigError, GridError};
use crate::types::{GridLocation, GridRectangle};

/// Smallest allowed width or height.
pub const MIN_GRID_SIZE: i32 = 20;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    /// Flat storage: index = x + y * width.
    cells: Vec<Cell>,
    width: i32,
    height: i32,
}

impl Grid {
    /// Create a `width` x `height` grid filled with `Dirt`.
    pub fn new(width: i32, height: i32) -> Result<Self, ConfigError> {
        if width < MIN_GRID_SIZE || height < MIN_GRID_SIZE {
            return Err(ConfigError::GridTooSmall {
                width,
                height,
                min: MIN_GRID_SIZE,
            });
        }
        Ok(Self {
            cells: vec![Cell::Dirt; (width as usize) * (height as usize)],
            width,
            height,
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// The whole grid as a rectangle.
    pub fn bounds(&self) -> GridRectangle {
        GridRectangle::new(0, 0, self.width, self.height)
    }

    pub fn valid_coords(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    /// True iff both corners of `rect` are on the grid. Never fails.
    pub fn valid_region(&self, rect: GridRectangle) -> bool {
        let ul = rect.upper_left();
        let lr = rect.lower_right();
        self.valid_coords(ul.x, ul.y) && self.valid_coords(lr.x, lr.y)
    }

    fn index(&self, x: i32, y: i32) -> Result<usize, GridError> {
        if self.valid_coords(x, y) {
            Ok(x as usize + y as usize * self.width as usize)
        } else {
            Err(GridError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            })
        }
    }

    pub fn cell_at(&self, x: i32, y: i32) -> Result<Cell, GridError> {
        self.index(x, y).map(|i| self.cells[i])
    }

    pub fn set_cell_at(&mut self, x: i32, y: i32, cell: Cell) -> Result<(), GridError> {
        let i = self.index(x, y)?;
        self.cells[i] = cell;
        Ok(())
    }

    /// Read a cell, or `None` off the grid. For algorithms that treat the
    /// edge as "nothing there" rather than as an error.
    pub fn get(&self, loc: GridLocation) -> Option<Cell> {
        self.index(loc.x, loc.y).ok().map(|i| self.cells[i])
    }

    /// Write a cell if `loc` is on the grid; silently skip it otherwise.
    /// Returns whether the write happened.
    pub fn set_if_valid(&mut self, loc: GridLocation, cell: Cell) -> bool {
        match self.index(loc.x, loc.y) {
            Ok(i) => {
                self.cells[i] = cell;
                true
            }
            Err(_) => false,
        }
    }

    /// Overwrite every slot with `factory(location)`, column by column.
    pub fn fill(&mut self, mut factory: impl FnMut(GridLocation) -> Cell) {
        for x in 0..self.width {
            for y in 0..self.height {
                let i = x as usize + y as usize * self.width as usize;
                self.cells[i] = factory(GridLocation::new(x, y));
            }
        }
    }

    /// Iterate over the cells of `rect`, column by column, paired with
    /// their locations. Callers must check `valid_region` first.
    pub fn cells_in(&self, rect: GridRectangle) -> impl Iterator<Item = (GridLocation, Cell)> + '_ {
        rect.locations()
            .filter_map(move |loc| self.get(loc).map(|cell| (loc, cell)))
    }

    /// True iff `rect` is on the grid and every cell in it passes `pred`.
    pub fn region_all(&self, rect: GridRectangle, pred: impl Fn(&Cell) -> bool) -> bool {
        self.valid_region(rect) && self.cells_in(rect).all(|(_, cell)| pred(&cell))
    }
}
