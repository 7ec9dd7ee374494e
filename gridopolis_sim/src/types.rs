// Core types shared across the simulation.
//
// Defines grid coordinates (`GridLocation`), normalized rectangles
// (`GridRectangle`), the closed set of cell kinds (`CellType`, `ZoneKind`),
// and compact counter-based identifiers for zones, external actions, and
// listeners. All types derive `Serialize` and `Deserialize` so configs and
// test fixtures can name them.
//
// **Critical constraint: determinism.** Identifiers are plain counters handed
// out by their owners (`CityModel`, `Notifier`). They never draw from a
// `GameRng`: doing so would shift every later population roll.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A cell position on the grid. X grows east, Y grows south; (0, 0) is the
/// upper-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridLocation {
    pub x: i32,
    pub y: i32,
}

impl GridLocation {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// This location shifted by `(dx, dy)`.
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for GridLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// An axis-aligned rectangle of cells.
///
/// Always normalized: `width` and `height` are non-negative and `(x, y)` is
/// the upper-left cell. A negative size passed to `new` is read as extending
/// left (or up) from the given corner, which stays inside the rectangle:
/// `GridRectangle::new(5, 0, -3, 1)` covers x = 3, 4, 5. A span that would
/// reach past `i32::MIN` is clipped there.
///
/// Fields are private so the normalization cannot be bypassed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawRectangle", into = "RawRectangle")]
pub struct GridRectangle {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

/// Serialized shape of a rectangle; normalized on the way in.
#[derive(Clone, Copy, Serialize, Deserialize)]
struct RawRectangle {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

impl From<RawRectangle> for GridRectangle {
    fn from(raw: RawRectangle) -> Self {
        GridRectangle::new(raw.x, raw.y, raw.width, raw.height)
    }
}

impl From<GridRectangle> for RawRectangle {
    fn from(rect: GridRectangle) -> Self {
        RawRectangle {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        }
    }
}

impl GridRectangle {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        let (x, width) = normalize_span(x, width);
        let (y, height) = normalize_span(y, height);
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The 1x1 rectangle covering a single cell.
    pub const fn cell(loc: GridLocation) -> Self {
        Self::new(loc.x, loc.y, 1, 1)
    }

    /// The 3x3 rectangle centered on `center`: a zone's footprint.
    pub const fn footprint(center: GridLocation) -> Self {
        Self::new(center.x.saturating_sub(1), center.y.saturating_sub(1), 3, 3)
    }

    pub const fn x(&self) -> i32 {
        self.x
    }

    pub const fn y(&self) -> i32 {
        self.y
    }

    pub const fn width(&self) -> i32 {
        self.width
    }

    pub const fn height(&self) -> i32 {
        self.height
    }

    pub const fn upper_left(&self) -> GridLocation {
        GridLocation::new(self.x, self.y)
    }

    /// The last cell of the rectangle. For an empty rectangle this lies
    /// above or left of `upper_left`. Saturates at `i32::MAX`, which no grid
    /// reaches, so an overflowing rectangle is never a valid region.
    pub const fn lower_right(&self) -> GridLocation {
        GridLocation::new(
            self.x.saturating_add(self.width - 1),
            self.y.saturating_add(self.height - 1),
        )
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of cells covered.
    pub const fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    pub const fn contains(&self, loc: GridLocation) -> bool {
        span_contains(self.x, self.width, loc.x) && span_contains(self.y, self.height, loc.y)
    }

    /// Every location in the rectangle, column by column: x outer, y inner.
    /// Bulldozing and region predicates visit cells in this order.
    pub fn locations(&self) -> impl Iterator<Item = GridLocation> + use<> {
        let Self {
            x,
            y,
            width,
            height,
        } = *self;
        span_cells(x, width)
            .flat_map(move |cx| span_cells(y, height).map(move |cy| GridLocation::new(cx, cy)))
    }
}

const fn normalize_span(start: i32, len: i32) -> (i32, i32) {
    if len >= 0 {
        return (start, len);
    }
    let len = -(len as i64);
    let len = if len > i32::MAX as i64 { i32::MAX as i64 } else { len };
    let low = start as i64 - len + 1;
    let low = if low < i32::MIN as i64 { i32::MIN as i64 } else { low };
    (low as i32, (start as i64 - low + 1) as i32)
}

const fn span_contains(start: i32, len: i32, v: i32) -> bool {
    let v = v as i64;
    v >= start as i64 && v < start as i64 + len as i64
}

/// The coordinates of a span that fit in an `i32`.
fn span_cells(start: i32, len: i32) -> std::ops::RangeInclusive<i32> {
    if len == 0 {
        1..=0
    } else {
        start..=start.saturating_add(len - 1)
    }
}

impl fmt::Display for GridRectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} at ({}, {})",
            self.width, self.height, self.x, self.y
        )
    }
}

// ---------------------------------------------------------------------------
// Cell kinds
// ---------------------------------------------------------------------------

/// The kind of a cell, with no per-instance data. This is what rendering
/// and census code switch on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CellType {
    Dirt,
    Woods,
    River,
    Road,
    Residential,
    Industrial,
}

impl CellType {
    /// Road and zone cells block road construction.
    pub const fn is_developed(self) -> bool {
        matches!(
            self,
            CellType::Road | CellType::Residential | CellType::Industrial
        )
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CellType::Dirt => "dirt",
            CellType::Woods => "woods",
            CellType::River => "river",
            CellType::Road => "road",
            CellType::Residential => "residential",
            CellType::Industrial => "industrial",
        };
        f.write_str(name)
    }
}

/// The two zone flavors a player can lay down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ZoneKind {
    Residential,
    Industrial,
}

impl ZoneKind {
    pub const fn cell_type(self) -> CellType {
        match self {
            ZoneKind::Residential => CellType::Residential,
            ZoneKind::Industrial => CellType::Industrial,
        }
    }
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.cell_type().fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: simple counters, handed out in creation order.
// ---------------------------------------------------------------------------

macro_rules! counter_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            /// Return the current id and advance `counter` past it.
            pub fn next(counter: &mut u32) -> Self {
                let id = Self(*counter);
                *counter += 1;
                id
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

counter_id!(/// Stable identity of a zone; the nine footprint slots all hold it.
ZoneId);
counter_id!(/// Handle for an externally supplied scheduled action.
ActionId);
counter_id!(/// Handle returned when a listener is registered.
ListenerId);
