//! Boltzmann energy model for the three living-state transitions.
//!
//! Each energy is the local configuration energy the neighborhood would have if
//! the cell moved to that state: one more cancer cell for proliferation, one
//! cancer cell traded for a necrotic one for necrosis, no change for quiescence.

use crate::neighborhood::{LocalCounts, Neighborhood};
use anyhow::Result;
use rayon::prelude::*;
use tumor_common::{CouplingConstants, Lattice, LatticeCoord, ProbabilityScaling, TransitionProbabilities};

/// Candidate configuration energies for one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Energies {
    pub proliferative: f64,
    pub necrotic: f64,
    pub quiescent: f64,
}

impl Energies {
    pub fn compute(k: &CouplingConstants, counts: LocalCounts) -> Self {
        let c = f64::from(counts.cancer);
        let n = f64::from(counts.necrotic);
        Energies {
            proliferative: -(0.5 * ((c + 1.0) * c * k.kcc + n * (n - 1.0) * k.knn) + (c + 1.0) * n * k.knc),
            necrotic: -(0.5 * ((c - 2.0) * (c - 1.0) * k.kcc + n * (n + 1.0) * k.knn) + (c - 1.0) * (n + 1.0) * k.knc),
            quiescent: configuration_energy(k, counts),
        }
    }

    /// Probabilities used to pick the next state.
    ///
    /// All three share the normalizer `Σ exp(-E)`. Necrosis takes `exp(-E_n)` on
    /// top while proliferation and quiescence take `exp(+E)`, then the latter two
    /// are multiplied by `scaling`. The result is not a distribution; it only has
    /// to rank the candidates the way the calibrated model expects.
    pub fn transition_probabilities(&self, scaling: &ProbabilityScaling) -> TransitionProbabilities {
        let bottom = (-self.quiescent).exp() + (-self.proliferative).exp() + (-self.necrotic).exp();
        TransitionProbabilities {
            necrosis: (-self.necrotic).exp() / bottom,
            proliferation: self.proliferative.exp() / bottom * scaling.proliferation,
            quiescence: self.quiescent.exp() / bottom * scaling.quiescence,
        }
    }

    /// Normalized Boltzmann distribution `exp(-E_s) / Σ exp(-E)`. Sums to 1.
    pub fn boltzmann(&self) -> TransitionProbabilities {
        let floor = self.proliferative.min(self.necrotic).min(self.quiescent);
        let wn = (floor - self.necrotic).exp();
        let wp = (floor - self.proliferative).exp();
        let wq = (floor - self.quiescent).exp();
        let z = wn + wp + wq;
        TransitionProbabilities { necrosis: wn / z, proliferation: wp / z, quiescence: wq / z }
    }
}

/// Configuration energy of a neighborhood as it stands.
pub fn configuration_energy(k: &CouplingConstants, counts: LocalCounts) -> f64 {
    let c = f64::from(counts.cancer);
    let n = f64::from(counts.necrotic);
    -(0.5 * (c * (c - 1.0) * k.kcc + n * (n - 1.0) * k.knn) + c * n * k.knc)
}

/// Sum of [`configuration_energy`] over every site's neighborhood.
pub fn lattice_energy<C: LatticeCoord>(lattice: &Lattice<C>, k: &CouplingConstants) -> Result<f64> {
    let dims = lattice.dims();
    let energies: Vec<f64> = (0..lattice.len())
        .into_par_iter()
        .map(|idx| {
            let nhd = Neighborhood::of(lattice, C::from_index(idx, dims))?;
            Ok(configuration_energy(k, nhd.counts()))
        })
        .collect::<Result<_>>()?;
    Ok(energies.iter().sum())
}
