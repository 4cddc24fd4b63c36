use serde::{Deserialize, Serialize};
use std::fmt;

/// Biological state of one lattice site.
///
/// Serialized with the short codes used by the CSV exports.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellState {
    /// Normal tissue, also the background outside the updatable field.
    #[default]
    #[serde(rename = "h")]
    Healthy,
    /// Proliferative tumor cell.
    #[serde(rename = "C")]
    Cancerous,
    /// Living tumor cell that is not dividing.
    #[serde(rename = "Q")]
    Quiescent,
    #[serde(rename = "N")]
    Necrotic,
    /// Site a necrotic cell has migrated away from.
    #[serde(rename = "wN")]
    VacatedNecrotic,
}

impl CellState {
    pub const ALL: [CellState; 5] = [
        CellState::Healthy,
        CellState::Cancerous,
        CellState::Quiescent,
        CellState::Necrotic,
        CellState::VacatedNecrotic,
    ];

    /// Living tumor material: counts toward the cancer density `C`.
    #[inline(always)]
    pub fn is_tumor(self) -> bool {
        matches!(self, CellState::Cancerous | CellState::Quiescent)
    }

    #[inline(always)]
    pub fn is_necrotic(self) -> bool {
        self == CellState::Necrotic
    }

    pub fn code(self) -> &'static str {
        match self {
            CellState::Healthy => "h",
            CellState::Cancerous => "C",
            CellState::Quiescent => "Q",
            CellState::Necrotic => "N",
            CellState::VacatedNecrotic => "wN",
        }
    }
}

impl fmt::Display for CellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Transition probabilities computed for a cell during a state update.
/// Kept for inspection only; nothing reads them back into the model.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionProbabilities {
    pub necrosis: f64,
    pub proliferation: f64,
    pub quiescence: f64,
}

impl TransitionProbabilities {
    pub fn sum(&self) -> f64 {
        self.necrosis + self.proliferation + self.quiescence
    }

    /// Largest of the three, folded from 0.0 so that all-zero or NaN inputs
    /// yield 0.0.
    pub fn max(&self) -> f64 {
        [self.necrosis, self.proliferation, self.quiescence]
            .into_iter()
            .fold(0.0, |max, p| if p > max { p } else { max })
    }
}

/// One lattice site.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell<C> {
    pub state: CellState,
    coord: C,
    /// Target site for the transport step. Equal to `coord` when the cell does not move.
    pub velocity: C,
    pub probabilities: TransitionProbabilities,
}

impl<C: Copy> Cell<C> {
    pub fn new(coord: C, state: CellState) -> Self {
        Cell {
            state,
            coord,
            velocity: coord,
            probabilities: TransitionProbabilities::default(),
        }
    }

    pub fn healthy(coord: C) -> Self {
        Self::new(coord, CellState::Healthy)
    }

    /// Position in the owning lattice. Fixed at construction.
    #[inline(always)]
    pub fn coord(&self) -> C {
        self.coord
    }
}
