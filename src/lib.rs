pub mod automaton;
pub mod energy;
pub mod metastasis;
pub mod neighborhood;
pub mod output;
pub mod transition;
pub mod transport;

pub use automaton::{
    planar_dims, resolve_seed, run_simulation, run_simulation_with_metastasis, volumetric_dims, Automaton,
    Automaton2D, Automaton3D, DriverPhase,
};
pub use energy::{configuration_energy, lattice_energy, Energies};
pub use metastasis::{Destination, Embolus, MetastasisTracker, VesselBoard};
pub use neighborhood::{second_ring, LocalCounts, Neighborhood};
pub use transition::{advance_states, select_next_state, StateUpdate};
pub use transport::{assign_velocities, push_cells, velocity_target};

pub use tumor_common;
