use crate::neighborhood::{second_ring, Neighborhood};
use anyhow::Result;
use log::trace;
use rand::Rng;
use tumor_common::{CellState, CollisionPolicy, Lattice, LatticeCoord};

/// Picks uniformly among the neighborhoods with the best score, then uniformly
/// among that neighborhood's orthogonal neighbors. `None` when there is nothing
/// to choose from.
fn pick_target<C, R, F, K>(candidates: &[Neighborhood<C>], rng: &mut R, score: F, better: K) -> Option<C>
where
    C: LatticeCoord,
    R: Rng + ?Sized,
    F: Fn(&Neighborhood<C>) -> u32,
    K: Fn(u32, u32) -> bool,
{
    let best = candidates.iter().map(&score).reduce(|a, b| if better(b, a) { b } else { a })?;
    let tied: Vec<&Neighborhood<C>> = candidates.iter().filter(|&n| score(n) == best).collect();
    let chosen = tied[rng.random_range(0..tied.len())];
    if chosen.neighbors.is_empty() {
        return None;
    }
    Some(chosen.neighbors[rng.random_range(0..chosen.neighbors.len())])
}

/// Target site for the cell at `coord`.
///
/// Cancerous cells head for the second-ring neighborhood with the fewest living
/// tumor cells, necrotic cells for the one with the most necrotic cells. Every
/// other state, and any cell without an in-field candidate, stays put.
pub fn velocity_target<C, R>(lattice: &Lattice<C>, coord: C, rng: &mut R) -> Result<C>
where
    C: LatticeCoord,
    R: Rng + ?Sized,
{
    let target = match lattice.state(coord)? {
        CellState::Cancerous => {
            let ring = second_ring(lattice, coord)?;
            pick_target(&ring, rng, |n| n.cancer_count(), |a, b| a < b)
        }
        CellState::Necrotic => {
            let ring = second_ring(lattice, coord)?;
            pick_target(&ring, rng, |n| n.necrotic_count(), |a, b| a > b)
        }
        _ => None,
    };
    Ok(target.unwrap_or(coord))
}

/// Assigns a velocity target to every in-field cell, visiting cells row-major so
/// tie-break draws happen in a fixed order.
pub fn assign_velocities<C, R>(lattice: &Lattice<C>, rng: &mut R) -> Result<Lattice<C>>
where
    C: LatticeCoord,
    R: Rng + ?Sized,
{
    let dims = lattice.dims();
    let mut out = lattice.clone();
    for idx in 0..lattice.len() {
        let coord = C::from_index(idx, dims);
        let target = if coord.in_field(dims) {
            velocity_target(lattice, coord, rng)?
        } else {
            coord
        };
        out.cell_mut(coord)?.velocity = target;
    }
    Ok(out)
}

/// Applies writes to a copy of the grid under a [`CollisionPolicy`].
struct PushWriter<C> {
    grid: Lattice<C>,
    policy: CollisionPolicy,
    claimed: Vec<bool>,
    dropped: usize,
}

impl<C: LatticeCoord> PushWriter<C> {
    fn new(grid: Lattice<C>, policy: CollisionPolicy) -> Self {
        let claimed = vec![false; grid.len()];
        PushWriter { grid, policy, claimed, dropped: 0 }
    }

    fn write(&mut self, coord: C, state: CellState) -> Result<()> {
        let dims = self.grid.dims();
        let idx = coord
            .index(dims)
            .ok_or_else(|| anyhow::anyhow!("Push target {:?} is outside lattice {:?}.", coord, dims))?;
        if self.policy == CollisionPolicy::FirstWriteWins {
            if self.claimed[idx] {
                self.dropped += 1;
                return Ok(());
            }
            self.claimed[idx] = true;
        }
        self.grid.set_state(coord, state)
    }
}

/// Moves tumor material along each cell's velocity.
///
/// Every decision reads `lattice`, never the grid being written. A cancerous
/// cell keeps its site and places a daughter on its target; a necrotic cell
/// leaves a vacated site behind and relocates. Writes overwrite whatever the
/// target held, and when two land on the same site `policy` decides which stays.
pub fn push_cells<C: LatticeCoord>(lattice: &Lattice<C>, policy: CollisionPolicy) -> Result<Lattice<C>> {
    let mut writer = PushWriter::new(lattice.clone(), policy);

    for cell in lattice.iter() {
        let origin = cell.coord();
        let target = cell.velocity;
        match cell.state {
            CellState::Cancerous => {
                writer.write(origin, CellState::Cancerous)?;
                if target != origin {
                    writer.write(target, CellState::Cancerous)?;
                }
            }
            CellState::Necrotic => {
                if target == origin {
                    writer.write(origin, CellState::Necrotic)?;
                } else {
                    writer.write(origin, CellState::VacatedNecrotic)?;
                    writer.write(target, CellState::Necrotic)?;
                }
            }
            _ => {}
        }
    }

    if writer.dropped > 0 {
        trace!("Push step dropped {} colliding writes.", writer.dropped);
    }
    Ok(writer.grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tumor_common::Coord2;

    fn lattice() -> Lattice<Coord2> {
        Lattice::healthy(Coord2::new(31, 31)).unwrap()
    }

    fn manhattan(a: Coord2, b: Coord2) -> usize {
        a.x.abs_diff(b.x) + a.y.abs_diff(b.y)
    }

    #[test]
    fn non_moving_states_target_themselves() {
        let mut grid = lattice();
        let c = Coord2::new(15, 15);
        grid.set_state(c, CellState::Quiescent).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(velocity_target(&grid, c, &mut rng).unwrap(), c);
    }

    #[test]
    fn cancer_heads_for_the_emptiest_ring_neighborhood() {
        let mut grid = lattice();
        let c = Coord2::new(15, 15);
        grid.set_state(c, CellState::Cancerous).unwrap();
        // Crowd every second-ring neighborhood except the one centered at (15, 17).
        for center in [Coord2::new(17, 15), Coord2::new(13, 15), Coord2::new(15, 13)] {
            grid.set_state(center, CellState::Quiescent).unwrap();
        }
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let t = velocity_target(&grid, c, &mut rng).unwrap();
            assert_eq!(manhattan(t, Coord2::new(15, 17)), 1, "target {:?}", t);
        }
    }

    #[test]
    fn necrosis_heads_for_the_densest_necrotic_neighborhood() {
        let mut grid = lattice();
        let c = Coord2::new(15, 15);
        grid.set_state(c, CellState::Necrotic).unwrap();
        grid.set_state(Coord2::new(13, 15), CellState::Necrotic).unwrap();
        grid.set_state(Coord2::new(12, 15), CellState::Necrotic).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let t = velocity_target(&grid, c, &mut rng).unwrap();
            assert_eq!(manhattan(t, Coord2::new(13, 15)), 1, "target {:?}", t);
        }
    }

    #[test]
    fn ties_spread_over_all_directions() {
        let mut grid = lattice();
        let c = Coord2::new(15, 15);
        grid.set_state(c, CellState::Cancerous).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..400 {
            seen.insert(velocity_target(&grid, c, &mut rng).unwrap());
        }
        // Sixteen distinct candidates: four neighbors of each ring center, all at
        // distance 1 or 3 from the cell.
        assert!(seen.len() > 8);
        assert!(seen.iter().all(|&t| matches!(manhattan(t, c), 1 | 3)));
    }

    #[test]
    fn no_in_field_candidate_means_no_movement() {
        let mut grid = Lattice::healthy(Coord2::new(11, 11)).unwrap();
        // Rows and columns 5..=6 are in field on an 11x11 lattice, so no ring center is.
        let c = Coord2::new(5, 5);
        grid.set_state(c, CellState::Cancerous).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(velocity_target(&grid, c, &mut rng).unwrap(), c);
    }

    #[test]
    fn push_duplicates_cancer_and_relocates_necrosis() {
        let mut grid = lattice();
        let cancer = Coord2::new(10, 10);
        let necrotic = Coord2::new(20, 20);
        grid.set_state(cancer, CellState::Cancerous).unwrap();
        grid.set_state(necrotic, CellState::Necrotic).unwrap();
        grid.cell_mut(cancer).unwrap().velocity = Coord2::new(10, 12);
        grid.cell_mut(necrotic).unwrap().velocity = Coord2::new(18, 20);

        let pushed = push_cells(&grid, CollisionPolicy::LastWriteWins).unwrap();
        assert_eq!(pushed.state(cancer).unwrap(), CellState::Cancerous);
        assert_eq!(pushed.state(Coord2::new(10, 12)).unwrap(), CellState::Cancerous);
        assert_eq!(pushed.state(necrotic).unwrap(), CellState::VacatedNecrotic);
        assert_eq!(pushed.state(Coord2::new(18, 20)).unwrap(), CellState::Necrotic);
        assert_eq!(pushed.census().tumor(), 2);
        // Decisions came from the untouched copy.
        assert_eq!(grid.state(Coord2::new(10, 12)).unwrap(), CellState::Healthy);
    }

    #[test]
    fn collision_policy_decides_contested_sites() {
        let mut grid = lattice();
        let contested = Coord2::new(15, 15);
        // Visited first in row-major order: a necrotic cell moving onto the site.
        grid.set_state(Coord2::new(14, 15), CellState::Necrotic).unwrap();
        grid.cell_mut(Coord2::new(14, 15)).unwrap().velocity = contested;
        // Visited later: a cancerous cell dividing onto the same site.
        grid.set_state(Coord2::new(16, 15), CellState::Cancerous).unwrap();
        grid.cell_mut(Coord2::new(16, 15)).unwrap().velocity = contested;

        let last = push_cells(&grid, CollisionPolicy::LastWriteWins).unwrap();
        assert_eq!(last.state(contested).unwrap(), CellState::Cancerous);

        let first = push_cells(&grid, CollisionPolicy::FirstWriteWins).unwrap();
        assert_eq!(first.state(contested).unwrap(), CellState::Necrotic);
    }

    #[test]
    fn stationary_necrotic_cell_is_kept_under_both_policies() {
        let mut grid = lattice();
        let c = Coord2::new(15, 15);
        grid.set_state(c, CellState::Necrotic).unwrap();
        for policy in [CollisionPolicy::LastWriteWins, CollisionPolicy::FirstWriteWins] {
            assert_eq!(push_cells(&grid, policy).unwrap().state(c).unwrap(), CellState::Necrotic);
        }
    }

    #[test]
    fn assign_velocities_leaves_border_cells_alone() {
        let mut grid = lattice();
        let border = Coord2::new(2, 2);
        grid.set_state(border, CellState::Cancerous).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let out = assign_velocities(&grid, &mut rng).unwrap();
        assert_eq!(out.cell(border).unwrap().velocity, border);
    }
}
