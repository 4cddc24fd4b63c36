use anyhow::Result;
use tumor_common::{CellState, Lattice, LatticeCoord};

/// Local densities fed into the energy model. Both include the center cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalCounts {
    /// Cancerous plus quiescent cells (`C`).
    pub cancer: u32,
    /// Necrotic cells (`N`).
    pub necrotic: u32,
}

/// Read-only summary of a center site and its orthogonal neighbors.
///
/// Built from a lattice that is not being written during the pass, and keeps
/// only coordinates and counts, so later writes never show through.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighborhood<C> {
    pub center: C,
    pub center_state: CellState,
    /// Empty when the center is outside the updatable field.
    pub neighbors: Vec<C>,
    counts: LocalCounts,
}

impl<C: LatticeCoord> Neighborhood<C> {
    /// Von Neumann neighborhood of `center`.
    ///
    /// Sites outside the field get an empty neighbor list, which callers treat as
    /// "no updatable neighborhood".
    pub fn of(lattice: &Lattice<C>, center: C) -> Result<Self> {
        let center_state = lattice.state(center)?;
        let neighbors = if center.in_field(lattice.dims()) {
            center.von_neumann(1)
        } else {
            Vec::new()
        };

        let mut counts = LocalCounts::default();
        tally(&mut counts, center_state);
        for &n in &neighbors {
            tally(&mut counts, lattice.state(n)?);
        }

        Ok(Neighborhood { center, center_state, neighbors, counts })
    }

    pub fn counts(&self) -> LocalCounts {
        self.counts
    }

    /// Number of neighbors plus center in {Cancerous, Quiescent}.
    pub fn cancer_count(&self) -> u32 {
        self.counts.cancer
    }

    /// Number of neighbors plus center that are necrotic.
    pub fn necrotic_count(&self) -> u32 {
        self.counts.necrotic
    }

    /// Cancerous or quiescent neighbors, center excluded.
    pub fn tumor_neighbors(&self) -> u32 {
        self.counts.cancer - u32::from(self.center_state.is_tumor())
    }

    pub fn is_updatable(&self) -> bool {
        !self.neighbors.is_empty()
    }
}

#[inline(always)]
fn tally(counts: &mut LocalCounts, state: CellState) {
    if state.is_tumor() {
        counts.cancer += 1;
    } else if state.is_necrotic() {
        counts.necrotic += 1;
    }
}

/// Neighborhoods centered two sites away from `center` along each axis, in the
/// order `+2`, `-2` per axis. Centers that fail the field check are left out.
pub fn second_ring<C: LatticeCoord>(lattice: &Lattice<C>, center: C) -> Result<Vec<Neighborhood<C>>> {
    let dims = lattice.dims();
    let mut out = Vec::with_capacity(2 * C::AXES);
    for axis in 0..C::AXES {
        for delta in [2isize, -2] {
            if let Some(c) = center.offset(axis, delta) {
                if c.in_field(dims) {
                    out.push(Neighborhood::of(lattice, c)?);
                }
            }
        }
    }
    Ok(out)
}
