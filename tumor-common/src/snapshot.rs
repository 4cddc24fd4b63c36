use crate::lattice::Lattice;
use serde::{Deserialize, Serialize};

/// Cumulative number of extravasated cells per destination organ.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetastasisCount {
    pub bone: u64,
    pub lung: u64,
    pub liver: u64,
}

impl MetastasisCount {
    pub fn total(&self) -> u64 {
        self.bone + self.lung + self.liver
    }

    /// True when no destination decreased relative to `earlier`.
    pub fn dominates(&self, earlier: &MetastasisCount) -> bool {
        self.bone >= earlier.bone && self.lung >= earlier.lung && self.liver >= earlier.liver
    }

    pub fn as_array(&self) -> [u64; 3] {
        [self.bone, self.lung, self.liver]
    }
}

/// Everything a run hands to output collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "C: Serialize",
    deserialize = "C: crate::coords::LatticeCoord"
))]
pub struct SimulationRecord<C> {
    /// PRNG seed the run was started from.
    pub seed: u64,
    /// One lattice per generation, generation 0 first.
    pub snapshots: Vec<Lattice<C>>,
    /// One cumulative count per generation when the metastasis extension ran.
    #[serde(default)]
    pub metastasis: Option<Vec<MetastasisCount>>,
}

impl<C> SimulationRecord<C> {
    pub fn generations(&self) -> usize {
        self.snapshots.len().saturating_sub(1)
    }
}
