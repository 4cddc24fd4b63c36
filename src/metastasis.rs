//! Metastasis through ruptured vessels on a planar lattice.
//!
//! A fixed board marks ruptured vessel sites. Every generation each cancerous
//! cell sitting on one gets a survival draw, and survivors extravasate into
//! bone, lung or liver.

use crate::neighborhood::Neighborhood;
use anyhow::Result;
use log::{debug, info};
use rand::distr::Uniform;
use rand::Rng;
use tumor_common::{CellState, Coord2, Lattice, LatticeCoord, MetastasisCount, SeedMode};

/// Draws are taken from `0..DRAW_RANGE`.
pub const DRAW_RANGE: u32 = 10_000;
/// An isolated cell survives the circulation when the draw is at most this (~0.05%).
pub const SINGLE_SURVIVAL_THRESHOLD: u32 = 5;
/// A cluster survives when the draw is at most this (~2.5%).
pub const CLUSTER_SURVIVAL_THRESHOLD: u32 = 250;
/// Destination bands: bone below 5461, lung strictly between 5461 and 5461+2553,
/// liver strictly between that and 9999. The band edges themselves go nowhere.
pub const BONE_UPPER: u32 = 5461;
pub const LUNG_UPPER: u32 = 5461 + 2553;
pub const LIVER_UPPER: u32 = 9999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Bone,
    Lung,
    Liver,
}

impl Destination {
    /// Maps a destination draw to an organ. `None` for the unassigned band edges.
    pub fn from_draw(draw: u32) -> Option<Self> {
        if draw < BONE_UPPER {
            Some(Destination::Bone)
        } else if draw > BONE_UPPER && draw < LUNG_UPPER {
            Some(Destination::Lung)
        } else if draw > LUNG_UPPER && draw < LIVER_UPPER {
            Some(Destination::Liver)
        } else {
            None
        }
    }

    pub fn record(self, count: &mut MetastasisCount) {
        match self {
            Destination::Bone => count.bone += 1,
            Destination::Lung => count.lung += 1,
            Destination::Liver => count.liver += 1,
        }
    }
}

/// Whether a cell travels alone or with neighboring tumor cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Embolus {
    Single,
    Cluster,
}

impl Embolus {
    pub fn survival_threshold(self) -> u32 {
        match self {
            Embolus::Single => SINGLE_SURVIVAL_THRESHOLD,
            Embolus::Cluster => CLUSTER_SURVIVAL_THRESHOLD,
        }
    }

    /// Classifies by the number of cancerous or quiescent orthogonal neighbors.
    pub fn from_neighbors(tumor_neighbors: u32) -> Self {
        if tumor_neighbors == 0 {
            Embolus::Single
        } else {
            Embolus::Cluster
        }
    }
}

pub fn survives<R: Rng + ?Sized>(embolus: Embolus, rng: &mut R) -> Result<bool> {
    let draw_dist = Uniform::new(0, DRAW_RANGE)?;
    Ok(rng.sample(draw_dist) <= embolus.survival_threshold())
}

pub fn extravasate<R: Rng + ?Sized>(rng: &mut R) -> Result<Option<Destination>> {
    let draw_dist = Uniform::new(0, DRAW_RANGE)?;
    Ok(Destination::from_draw(rng.sample(draw_dist)))
}

/// Ruptured vessel sites; fixed once seeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VesselBoard {
    dims: Coord2,
    ruptured: Vec<bool>,
}

impl VesselBoard {
    pub fn seeded<R: Rng + ?Sized>(dims: Coord2, mode: SeedMode, rng: &mut R) -> Result<Self> {
        if dims.x == 0 || dims.y == 0 {
            anyhow::bail!("Vessel board needs positive extents, got {:?}.", dims);
        }
        let sites = match mode {
            SeedMode::Random => vec![Coord2::new(rng.random_range(0..dims.x), rng.random_range(0..dims.y))],
            SeedMode::Set => {
                let (r, c) = (dims.x, dims.y);
                vec![
                    Coord2::new(r / 4, c / 2),
                    Coord2::new(r / 2, c / 4),
                    Coord2::new(r * 3 / 4, c / 2),
                    Coord2::new(r / 2, c * 3 / 4),
                ]
            }
        };

        let mut ruptured = vec![false; dims.volume()];
        for site in sites {
            let idx = site
                .index(dims)
                .ok_or_else(|| anyhow::anyhow!("Vessel site {:?} is outside board {:?}.", site, dims))?;
            ruptured[idx] = true;
        }
        Ok(VesselBoard { dims, ruptured })
    }

    pub fn dims(&self) -> Coord2 {
        self.dims
    }

    pub fn is_ruptured(&self, coord: Coord2) -> bool {
        coord.index(self.dims).map(|idx| self.ruptured[idx]).unwrap_or(false)
    }

    pub fn ruptured_sites(&self) -> Vec<Coord2> {
        self.ruptured
            .iter()
            .enumerate()
            .filter(|(_, r)| **r)
            .map(|(idx, _)| Coord2::from_index(idx, self.dims))
            .collect()
    }
}

/// Runs the metastasis rule each generation and keeps the cumulative counts.
#[derive(Debug, Clone)]
pub struct MetastasisTracker {
    board: VesselBoard,
    /// One entry per observed generation, starting with generation 0.
    history: Vec<MetastasisCount>,
    survivals: u64,
}

impl MetastasisTracker {
    /// Seeds the board and records an all-zero count for generation 0.
    pub fn new<R: Rng + ?Sized>(dims: Coord2, mode: SeedMode, rng: &mut R) -> Result<Self> {
        let board = VesselBoard::seeded(dims, mode, rng)?;
        info!("Ruptured vessels ({:?} mode) at {:?}", mode, board.ruptured_sites());
        Ok(MetastasisTracker { board, history: vec![MetastasisCount::default()], survivals: 0 })
    }

    pub fn board(&self) -> &VesselBoard {
        &self.board
    }

    pub fn history(&self) -> &[MetastasisCount] {
        &self.history
    }

    pub fn into_history(self) -> Vec<MetastasisCount> {
        self.history
    }

    /// Cells that survived circulation so far. Every extravasation needs one.
    pub fn survivals(&self) -> u64 {
        self.survivals
    }

    pub fn latest(&self) -> MetastasisCount {
        self.history.last().copied().unwrap_or_default()
    }

    /// Applies the rule to a freshly produced generation and appends the new
    /// cumulative count.
    pub fn observe<R: Rng + ?Sized>(&mut self, lattice: &Lattice<Coord2>, rng: &mut R) -> Result<MetastasisCount> {
        if lattice.dims() != self.board.dims() {
            anyhow::bail!(
                "Lattice {:?} does not match vessel board {:?}.",
                lattice.dims(),
                self.board.dims()
            );
        }
        let mut count = self.latest();
        for cell in lattice.iter() {
            if cell.state != CellState::Cancerous || !self.board.is_ruptured(cell.coord()) {
                continue;
            }
            let nhd = Neighborhood::of(lattice, cell.coord())?;
            let embolus = Embolus::from_neighbors(nhd.tumor_neighbors());
            if survives(embolus, rng)? {
                self.survivals += 1;
                debug!("{:?} embolus at {:?} survived, extravasating.", embolus, cell.coord());
                if let Some(dest) = extravasate(rng)? {
                    dest.record(&mut count);
                }
            }
        }
        self.history.push(count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn destination_bands_leave_edges_unassigned() {
        assert_eq!(Destination::from_draw(0), Some(Destination::Bone));
        assert_eq!(Destination::from_draw(5460), Some(Destination::Bone));
        assert_eq!(Destination::from_draw(5461), None);
        assert_eq!(Destination::from_draw(5462), Some(Destination::Lung));
        assert_eq!(Destination::from_draw(8013), Some(Destination::Lung));
        assert_eq!(Destination::from_draw(8014), None);
        assert_eq!(Destination::from_draw(8015), Some(Destination::Liver));
        assert_eq!(Destination::from_draw(9998), Some(Destination::Liver));
        assert_eq!(Destination::from_draw(9999), None);
    }

    #[test]
    fn embolus_classification_excludes_the_cell_itself() {
        assert_eq!(Embolus::from_neighbors(0), Embolus::Single);
        assert_eq!(Embolus::from_neighbors(1), Embolus::Cluster);
        assert!(Embolus::Cluster.survival_threshold() > Embolus::Single.survival_threshold());
    }

    #[test]
    fn set_mode_places_four_fixed_vessels() {
        let mut rng = StdRng::seed_from_u64(0);
        let board = VesselBoard::seeded(Coord2::new(201, 201), SeedMode::Set, &mut rng).unwrap();
        let sites = board.ruptured_sites();
        assert_eq!(sites.len(), 4);
        for s in [Coord2::new(50, 100), Coord2::new(100, 50), Coord2::new(150, 100), Coord2::new(100, 150)] {
            assert!(board.is_ruptured(s), "{:?} missing", s);
        }
    }

    #[test]
    fn random_mode_places_one_vessel_on_the_board() {
        let mut rng = StdRng::seed_from_u64(99);
        let board = VesselBoard::seeded(Coord2::new(40, 60), SeedMode::Random, &mut rng).unwrap();
        let sites = board.ruptured_sites();
        assert_eq!(sites.len(), 1);
        assert!(sites[0].within(Coord2::new(40, 60)));
    }

    #[test]
    fn counts_are_cumulative_and_bounded_by_survivals() {
        let dims = Coord2::new(41, 41);
        let mut rng = StdRng::seed_from_u64(2024);
        let mut tracker = MetastasisTracker::new(dims, SeedMode::Set, &mut rng).unwrap();

        // A cluster sitting on every vessel site.
        let mut lattice = Lattice::healthy(dims).unwrap();
        for site in tracker.board().ruptured_sites() {
            lattice.set_state(site, CellState::Cancerous).unwrap();
            for n in site.von_neumann(1) {
                lattice.set_state(n, CellState::Cancerous).unwrap();
            }
        }

        for _ in 0..2_000 {
            tracker.observe(&lattice, &mut rng).unwrap();
        }

        let history = tracker.history();
        assert_eq!(history.len(), 2_001);
        assert_eq!(history[0], MetastasisCount::default());
        assert!(history.windows(2).all(|w| w[1].dominates(&w[0])));
        let last = tracker.latest();
        assert!(last.total() <= tracker.survivals());
        // 8000 draws at ~2.5% leave essentially no chance of zero survivors.
        assert!(tracker.survivals() > 0);
    }

    #[test]
    fn mismatched_lattice_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut tracker = MetastasisTracker::new(Coord2::new(20, 20), SeedMode::Set, &mut rng).unwrap();
        let lattice = Lattice::healthy(Coord2::new(21, 20)).unwrap();
        assert!(tracker.observe(&lattice, &mut rng).is_err());
    }
}
