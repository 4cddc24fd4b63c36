pub mod cell;
pub mod config;
pub mod coords;
pub mod lattice;
pub mod sim_params;
pub mod snapshot;

// Re-export key types for easier use by dependent crates
pub use cell::{Cell, CellState, TransitionProbabilities};
pub use config::{
    CalibrationConfig, CouplingConfig, LatticeConfig, MetastasisConfig, OutputConfig, RngConfig, SimulationConfig,
    TimingConfig, TransportConfig,
};
pub use coords::{Coord2, Coord3, LatticeCoord, FIELD_MARGIN};
pub use lattice::{Census, Lattice};
pub use sim_params::{
    CollisionPolicy, CouplingConstants, Dimensionality, ProbabilityScaling, SeedMode, SeedPattern, SimParams,
};
pub use snapshot::{MetastasisCount, SimulationRecord};
