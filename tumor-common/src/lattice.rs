use crate::cell::{Cell, CellState, TransitionProbabilities};
use crate::coords::{Coord2, Coord3, LatticeCoord};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Dense rectangular (2D) or cuboid (3D) grid of cells with fixed extents.
///
/// Cells are stored row-major. Every cell's coordinate matches its slot; this is
/// checked again whenever a lattice is deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LatticeData<C>", bound(deserialize = "C: LatticeCoord"))]
pub struct Lattice<C> {
    dims: C,
    cells: Vec<Cell<C>>,
}

/// Unvalidated wire form of a [`Lattice`].
#[derive(Deserialize)]
struct LatticeData<C> {
    dims: C,
    cells: Vec<Cell<C>>,
}

impl<C: LatticeCoord> TryFrom<LatticeData<C>> for Lattice<C> {
    type Error = anyhow::Error;

    fn try_from(data: LatticeData<C>) -> Result<Self> {
        Lattice::from_cells(data.dims, data.cells)
    }
}

/// Number of cells in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Census {
    pub healthy: usize,
    pub cancerous: usize,
    pub quiescent: usize,
    pub necrotic: usize,
    pub vacated: usize,
}

impl Census {
    pub fn count(&self, state: CellState) -> usize {
        match state {
            CellState::Healthy => self.healthy,
            CellState::Cancerous => self.cancerous,
            CellState::Quiescent => self.quiescent,
            CellState::Necrotic => self.necrotic,
            CellState::VacatedNecrotic => self.vacated,
        }
    }

    /// Cancerous plus quiescent cells.
    pub fn tumor(&self) -> usize {
        self.cancerous + self.quiescent
    }
}

impl<C: LatticeCoord> Lattice<C> {
    /// All-healthy lattice. Fails when any extent is zero.
    pub fn healthy(dims: C) -> Result<Self> {
        if (0..C::AXES).any(|axis| dims.component(axis) == 0) {
            anyhow::bail!("Lattice extents must all be positive, got {:?}.", dims);
        }
        let cells = (0..dims.volume())
            .map(|idx| Cell::healthy(C::from_index(idx, dims)))
            .collect();
        Ok(Lattice { dims, cells })
    }

    /// Builds a lattice from row-major cells, checking size and coordinates.
    pub fn from_cells(dims: C, cells: Vec<Cell<C>>) -> Result<Self> {
        if (0..C::AXES).any(|axis| dims.component(axis) == 0) {
            anyhow::bail!("Lattice extents must all be positive, got {:?}.", dims);
        }
        if cells.len() != dims.volume() {
            anyhow::bail!(
                "Lattice {:?} needs {} cells, got {}.",
                dims,
                dims.volume(),
                cells.len()
            );
        }
        for (idx, cell) in cells.iter().enumerate() {
            let expected = C::from_index(idx, dims);
            if cell.coord() != expected {
                anyhow::bail!(
                    "Cell at slot {} has coordinate {:?}, expected {:?}.",
                    idx,
                    cell.coord(),
                    expected
                );
            }
        }
        Ok(Lattice { dims, cells })
    }

    #[inline(always)]
    pub fn dims(&self) -> C {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Cell<C>] {
        &self.cells
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cell<C>> {
        self.cells.iter()
    }

    #[inline(always)]
    pub fn get(&self, coord: C) -> Option<&Cell<C>> {
        coord.index(self.dims).map(|idx| &self.cells[idx])
    }

    #[inline(always)]
    pub fn get_mut(&mut self, coord: C) -> Option<&mut Cell<C>> {
        coord.index(self.dims).map(move |idx| &mut self.cells[idx])
    }

    /// Range-checked lookup.
    #[inline(always)]
    pub fn cell(&self, coord: C) -> Result<&Cell<C>> {
        self.get(coord)
            .ok_or_else(|| anyhow!("Coordinate {:?} is outside lattice {:?}.", coord, self.dims))
    }

    pub fn cell_mut(&mut self, coord: C) -> Result<&mut Cell<C>> {
        let dims = self.dims;
        self.get_mut(coord)
            .ok_or_else(|| anyhow!("Coordinate {:?} is outside lattice {:?}.", coord, dims))
    }

    pub fn cell_at_index(&self, idx: usize) -> Option<&Cell<C>> {
        self.cells.get(idx)
    }

    pub fn cell_at_index_mut(&mut self, idx: usize) -> Option<&mut Cell<C>> {
        self.cells.get_mut(idx)
    }

    pub fn state(&self, coord: C) -> Result<CellState> {
        self.cell(coord).map(|c| c.state)
    }

    pub fn set_state(&mut self, coord: C, state: CellState) -> Result<()> {
        self.cell_mut(coord)?.state = state;
        Ok(())
    }

    /// Stores diagnostic probabilities by linear index.
    pub fn annotate(&mut self, diagnostics: &[(usize, TransitionProbabilities)]) -> Result<()> {
        for &(idx, probabilities) in diagnostics {
            let len = self.cells.len();
            let cell = self
                .cells
                .get_mut(idx)
                .ok_or_else(|| anyhow!("Diagnostic index {} is outside lattice of {} cells.", idx, len))?;
            cell.probabilities = probabilities;
        }
        Ok(())
    }

    pub fn census(&self) -> Census {
        let mut census = Census::default();
        for cell in &self.cells {
            match cell.state {
                CellState::Healthy => census.healthy += 1,
                CellState::Cancerous => census.cancerous += 1,
                CellState::Quiescent => census.quiescent += 1,
                CellState::Necrotic => census.necrotic += 1,
                CellState::VacatedNecrotic => census.vacated += 1,
            }
        }
        census
    }

    /// Coordinates of every cell not in `state`, row-major.
    pub fn coords_not_in(&self, state: CellState) -> impl Iterator<Item = (C, CellState)> + '_ {
        self.cells
            .iter()
            .filter(move |c| c.state != state)
            .map(|c| (c.coord(), c.state))
    }
}

impl Lattice<Coord2> {
    /// Builds a planar lattice from nested rows of states. Ragged rows are rejected.
    pub fn from_rows(rows: Vec<Vec<CellState>>) -> Result<Self> {
        let num_rows = rows.len();
        if num_rows == 0 {
            anyhow::bail!("Lattice has no rows.");
        }
        let num_cols = rows[0].len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != num_cols) {
            anyhow::bail!(
                "Lattice isn't rectangular: row {} has {} cells, row 0 has {}.",
                i,
                row.len(),
                num_cols
            );
        }
        let dims = Coord2::new(num_rows, num_cols);
        let cells = rows
            .into_iter()
            .enumerate()
            .flat_map(|(x, row)| {
                row.into_iter()
                    .enumerate()
                    .map(move |(y, state)| Cell::new(Coord2::new(x, y), state))
            })
            .collect();
        Lattice::from_cells(dims, cells)
    }
}

impl Lattice<Coord3> {
    /// Builds a volumetric lattice from nested rows/columns of states. Anything
    /// other than a full cuboid is rejected.
    pub fn from_aisles(rows: Vec<Vec<Vec<CellState>>>) -> Result<Self> {
        let num_rows = rows.len();
        if num_rows == 0 {
            anyhow::bail!("Lattice has no rows.");
        }
        let num_cols = rows[0].len();
        let num_aisles = rows[0].first().map(Vec::len).unwrap_or(0);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != num_cols {
                anyhow::bail!("Lattice isn't cuboid: row {} has {} columns, expected {}.", i, row.len(), num_cols);
            }
            if let Some((j, col)) = row.iter().enumerate().find(|(_, c)| c.len() != num_aisles) {
                anyhow::bail!(
                    "Lattice isn't cuboid: ({}, {}) has {} aisles, expected {}.",
                    i,
                    j,
                    col.len(),
                    num_aisles
                );
            }
        }
        let dims = Coord3::new(num_rows, num_cols, num_aisles);
        let cells = rows
            .into_iter()
            .enumerate()
            .flat_map(|(x, row)| {
                row.into_iter().enumerate().flat_map(move |(y, col)| {
                    col.into_iter()
                        .enumerate()
                        .map(move |(z, state)| Cell::new(Coord3::new(x, y, z), state))
                })
            })
            .collect();
        Lattice::from_cells(dims, cells)
    }
}
