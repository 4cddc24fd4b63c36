use crate::energy::Energies;
use crate::neighborhood::{LocalCounts, Neighborhood};
use anyhow::Result;
use rayon::prelude::*;
use tumor_common::{CellState, CouplingConstants, Lattice, LatticeCoord, ProbabilityScaling, TransitionProbabilities};

/// Proliferation only happens while `C + N` stays below this.
pub const CROWDING_LIMIT: u32 = 5;

/// Output of one state-transition pass.
#[derive(Debug, Clone)]
pub struct StateUpdate<C> {
    pub lattice: Lattice<C>,
    /// Probabilities per linear index for every cell that was evaluated.
    pub diagnostics: Vec<(usize, TransitionProbabilities)>,
}

/// Picks the next state from the transition probabilities.
///
/// Rules are tried in order; ties and failed gates land on quiescence.
pub fn select_next_state(p: &TransitionProbabilities, counts: LocalCounts) -> CellState {
    let max = p.max();
    let c = counts.cancer;
    let n = counts.necrotic;

    if max == p.necrosis && c >= 1 {
        CellState::Necrotic
    } else if max == p.proliferation && c >= 1 && c + n < CROWDING_LIMIT {
        CellState::Cancerous
    } else {
        CellState::Quiescent
    }
}

/// Evaluates one living tumor cell against `lattice`.
pub fn evaluate_cell<C: LatticeCoord>(
    lattice: &Lattice<C>,
    coord: C,
    coupling: &CouplingConstants,
    scaling: &ProbabilityScaling,
) -> Result<(CellState, TransitionProbabilities)> {
    let nhd = Neighborhood::of(lattice, coord)?;
    let counts = nhd.counts();
    let probabilities = Energies::compute(coupling, counts).transition_probabilities(scaling);
    Ok((select_next_state(&probabilities, counts), probabilities))
}

/// Computes the next generation's states from `prev`.
///
/// In-field cancerous and quiescent cells are re-evaluated, other in-field cells
/// carry over, and everything outside the field comes back as healthy background.
/// The pass is deterministic, so cells are evaluated in parallel.
pub fn advance_states<C: LatticeCoord>(
    prev: &Lattice<C>,
    coupling: &CouplingConstants,
    scaling: &ProbabilityScaling,
) -> Result<StateUpdate<C>> {
    let dims = prev.dims();

    let updates: Vec<Option<(usize, CellState, Option<TransitionProbabilities>)>> = prev
        .cells()
        .par_iter()
        .enumerate()
        .map(|(idx, cell)| {
            let coord = cell.coord();
            if !coord.in_field(dims) {
                return Ok(None);
            }
            if cell.state.is_tumor() {
                let (state, probabilities) = evaluate_cell(prev, coord, coupling, scaling)?;
                Ok(Some((idx, state, Some(probabilities))))
            } else {
                Ok(Some((idx, cell.state, None)))
            }
        })
        .collect::<Result<_>>()?;

    let mut lattice = Lattice::healthy(dims)?;
    let mut diagnostics = Vec::new();
    for (idx, state, probabilities) in updates.into_iter().flatten() {
        if let (Some(src), Some(dst)) = (prev.cell_at_index(idx), lattice.cell_at_index_mut(idx)) {
            *dst = *src;
            dst.state = state;
        }
        if let Some(p) = probabilities {
            diagnostics.push((idx, p));
        }
    }

    Ok(StateUpdate { lattice, diagnostics })
}
