// The closed set of cell variants and their capability contract.
//
// A `Cell` is a small `Copy` value. Zone cells do not own the zone: all nine
// footprint slots hold `Cell::Zone { id, .. }`, and the `Zone` itself (with
// its population) lives in `CityModel`'s zone table. That gives the
// footprint one shared identity without aliasing any mutable state.
//
// `bulldoze` does not mutate anything. It reports what bulldozing *would* do
// as a `BulldozeOutcome`, and `CityModel` applies it to the grid and
// scheduler. Keeping the cell ignorant of the grid breaks the
// model -> grid -> cell -> model cycle.
//
// Roads remember the terrain under them so bulldozing restores it.
//
// See also: `grid.rs` for storage, `city.rs` for applying outcomes,
// `zone.rs` for the zone table entries.

use crate::error::ContractViolation;
use crate::types::{CellType, GridLocation, ZoneId, ZoneKind};
use serde::{Deserialize, Serialize};

/// Natural terrain: what a road can be laid over and restores on removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terrain {
    Dirt,
    Woods,
    River,
}

impl Terrain {
    pub const fn cell(self) -> Cell {
        match self {
            Terrain::Dirt => Cell::Dirt,
            Terrain::Woods => Cell::Woods,
            Terrain::River => Cell::River,
        }
    }
}

/// One grid slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cell {
    Dirt,
    Woods,
    River,
    Road { under: Terrain },
    Zone { id: ZoneId, kind: ZoneKind },
}

/// What bulldozing a cell amounts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BulldozeOutcome {
    /// Nothing to clear.
    Unchanged,
    /// Replace this single slot.
    Replace(Cell),
    /// Tear down the whole zone: unschedule it and clear its footprint.
    DemolishZone(ZoneId),
}

impl Cell {
    pub const fn cell_type(&self) -> CellType {
        match self {
            Cell::Dirt => CellType::Dirt,
            Cell::Woods => CellType::Woods,
            Cell::River => CellType::River,
            Cell::Road { .. } => CellType::Road,
            Cell::Zone { kind, .. } => kind.cell_type(),
        }
    }

    pub const fn is_water(&self) -> bool {
        matches!(self, Cell::River)
    }

    pub const fn is_tree(&self) -> bool {
        matches!(self, Cell::Woods)
    }

    /// Zones may only be placed over buildable cells.
    pub const fn is_buildable(&self) -> bool {
        matches!(self, Cell::Dirt | Cell::Woods)
    }

    pub const fn is_bulldozeable(&self) -> bool {
        !matches!(self, Cell::River)
    }

    /// The zone this slot belongs to, if any.
    pub const fn zone_id(&self) -> Option<ZoneId> {
        match self {
            Cell::Zone { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// The natural terrain of this cell, or `None` for developed cells.
    pub const fn terrain(&self) -> Option<Terrain> {
        match self {
            Cell::Dirt => Some(Terrain::Dirt),
            Cell::Woods => Some(Terrain::Woods),
            Cell::River => Some(Terrain::River),
            Cell::Road { .. } | Cell::Zone { .. } => None,
        }
    }

    /// A road laid over this cell, remembering what it replaced. `None` if
    /// the cell is already developed.
    pub const fn paved(&self) -> Option<Cell> {
        match self.terrain() {
            Some(under) => Some(Cell::Road { under }),
            None => None,
        }
    }

    /// Work out what bulldozing the cell at `at` does. Rivers cannot be
    /// bulldozed; asking is a contract violation.
    pub fn bulldoze(&self, at: GridLocation) -> Result<BulldozeOutcome, ContractViolation> {
        match *self {
            Cell::Dirt => Ok(BulldozeOutcome::Unchanged),
            Cell::Woods => Ok(BulldozeOutcome::Replace(Cell::Dirt)),
            Cell::River => Err(ContractViolation::NotBulldozeable {
                x: at.x,
                y: at.y,
                cell_type: CellType::River,
            }),
            Cell::Road { under } => Ok(BulldozeOutcome::Replace(under.cell())),
            Cell::Zone { id, .. } => Ok(BulldozeOutcome::DemolishZone(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AT: GridLocation = GridLocation::new(3, 4);

    #[test]
    fn capability_flags_per_variant() {
        let zone = Cell::Zone {
            id: ZoneId(0),
            kind: ZoneKind::Residential,
        };
        let road = Cell::Road {
            under: Terrain::River,
        };

        assert!(Cell::Dirt.is_buildable() && Cell::Dirt.is_bulldozeable());
        assert!(Cell::Woods.is_tree() && Cell::Woods.is_buildable());
        assert!(Cell::River.is_water());
        assert!(!Cell::River.is_buildable() && !Cell::River.is_bulldozeable());
        assert!(!road.is_buildable() && road.is_bulldozeable() && !road.is_water());
        assert!(!zone.is_buildable() && zone.is_bulldozeable());
        assert_eq!(zone.cell_type(), CellType::Residential);
    }

    #[test]
    fn woods_bulldozes_to_dirt() {
        assert_eq!(
            Cell::Woods.bulldoze(AT),
            Ok(BulldozeOutcome::Replace(Cell::Dirt))
        );
    }

    #[test]
    fn dirt_bulldoze_is_noop() {
        assert_eq!(Cell::Dirt.bulldoze(AT), Ok(BulldozeOutcome::Unchanged));
    }

    #[test]
    fn river_bulldoze_is_contract_violation() {
        let err = Cell::River.bulldoze(AT).unwrap_err();
        assert_eq!(
            err,
            ContractViolation::NotBulldozeable {
                x: 3,
                y: 4,
                cell_type: CellType::River
            }
        );
    }

    #[test]
    fn road_restores_terrain_it_replaced() {
        for terrain in [Terrain::Dirt, Terrain::Woods, Terrain::River] {
            let road = terrain.cell().paved().unwrap();
            assert_eq!(road.cell_type(), CellType::Road);
            assert_eq!(
                road.bulldoze(AT),
                Ok(BulldozeOutcome::Replace(terrain.cell()))
            );
        }
    }

    #[test]
    fn developed_cells_cannot_be_paved() {
        let zone = Cell::Zone {
            id: ZoneId(7),
            kind: ZoneKind::Industrial,
        };
        assert_eq!(zone.paved(), None);
        assert_eq!(Cell::Road { under: Terrain::Dirt }.paved(), None);
        assert_eq!(zone.bulldoze(AT), Ok(BulldozeOutcome::DemolishZone(ZoneId(7))));
    }
}
