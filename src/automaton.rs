use crate::energy::lattice_energy;
use crate::metastasis::MetastasisTracker;
use crate::neighborhood::Neighborhood;
use crate::transition::{advance_states, StateUpdate};
use crate::transport::{assign_velocities, push_cells};
use anyhow::Result;
use log::{debug, log_enabled, warn, Level};
use rand::prelude::*;
use tumor_common::{
    CellState, Coord2, Coord3, Dimensionality, Lattice, LatticeCoord, MetastasisCount, SeedMode, SeedPattern,
    SimParams, SimulationRecord,
};

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverPhase {
    Seeding,
    /// `generation` lattices have been produced after the seed.
    Running { generation: u32 },
    Complete,
}

/// Drives the automaton one generation at a time and keeps every lattice.
pub struct Automaton<C> {
    params: SimParams,
    /// Single random source for every tie-break and draw in the run.
    rng: StdRng,
    seed: u64,
    phase: DriverPhase,
    /// Generation 0 first. Entries are independent copies.
    history: Vec<Lattice<C>>,
}

pub type Automaton2D = Automaton<Coord2>;
pub type Automaton3D = Automaton<Coord3>;

/// Seed from the parameters, or a fresh one when none is configured.
pub fn resolve_seed(params: &SimParams) -> u64 {
    match params.rng_seed {
        Some(seed) => seed,
        None => {
            let seed: u64 = rand::rng().random();
            warn!("No RNG seed configured; using {}. Set rng.seed to replay this run.", seed);
            seed
        }
    }
}

pub fn planar_dims(params: &SimParams) -> Coord2 {
    Coord2::new(params.extents[0], params.extents[1])
}

pub fn volumetric_dims(params: &SimParams) -> Coord3 {
    Coord3::new(params.extents[0], params.extents[1], params.extents[2])
}

/// Marks the initial tumor around the lattice center.
pub fn seed_tumor<C: LatticeCoord>(lattice: &mut Lattice<C>, pattern: SeedPattern) -> Result<()> {
    let center = lattice.dims().center();
    if pattern == SeedPattern::Diamond {
        let first_ring = Neighborhood::of(lattice, center)?.neighbors;
        for n in first_ring {
            lattice.set_state(n, CellState::Cancerous)?;
            for m in Neighborhood::of(lattice, n)?.neighbors {
                lattice.set_state(m, CellState::Cancerous)?;
            }
        }
    }
    lattice.set_state(center, CellState::Cancerous)
}

/// Rejects a lattice whose shape does not match `params`.
fn check_extents<C: LatticeCoord>(params: &SimParams, dims: C) -> Result<()> {
    let axes = match params.dimensionality {
        Dimensionality::Planar => 2,
        Dimensionality::Volumetric => 3,
    };
    if C::AXES != axes || (0..C::AXES).any(|axis| dims.component(axis) != params.extents[axis]) {
        anyhow::bail!(
            "Lattice {:?} does not match the configured {} extents {:?}.",
            dims,
            params.dimensionality,
            &params.extents[..axes]
        );
    }
    Ok(())
}

/// Phase right after generation 0 exists.
fn first_phase(params: &SimParams) -> DriverPhase {
    if params.generations == 0 {
        DriverPhase::Complete
    } else {
        DriverPhase::Running { generation: 0 }
    }
}

impl<C: LatticeCoord> Automaton<C> {
    /// Builds the seeded generation-0 lattice.
    pub fn new(params: SimParams, dims: C, seed: u64) -> Result<Self> {
        let mut sim = Self::unseeded(params, dims, seed)?;
        sim.place_seed()?;
        Ok(sim)
    }

    /// All-healthy lattice waiting in [`DriverPhase::Seeding`].
    pub fn unseeded(params: SimParams, dims: C, seed: u64) -> Result<Self> {
        check_extents(&params, dims)?;
        Ok(Automaton {
            params,
            rng: StdRng::seed_from_u64(seed),
            seed,
            phase: DriverPhase::Seeding,
            history: vec![Lattice::healthy(dims)?],
        })
    }

    /// Marks the initial tumor on generation 0 and starts running.
    pub fn place_seed(&mut self) -> Result<()> {
        if self.phase != DriverPhase::Seeding {
            anyhow::bail!("Automaton is already seeded.");
        }
        let initial = &mut self.history[0];
        seed_tumor(initial, self.params.seed_pattern)?;
        debug!("Seeded {} tumor cells at {:?}.", initial.census().tumor(), initial.dims().center());
        self.phase = first_phase(&self.params);
        Ok(())
    }

    /// Starts from an existing lattice instead of seeding, e.g. a reloaded snapshot.
    pub fn from_lattice(params: SimParams, initial: Lattice<C>, seed: u64) -> Result<Self> {
        check_extents(&params, initial.dims())?;
        Ok(Automaton {
            phase: first_phase(&params),
            params,
            rng: StdRng::seed_from_u64(seed),
            seed,
            history: vec![initial],
        })
    }

    /// Produces the next generation: state update, then velocities, then push.
    pub fn step(&mut self) -> Result<&Lattice<C>> {
        let generation = match self.phase {
            DriverPhase::Running { generation } => generation + 1,
            DriverPhase::Seeding => anyhow::bail!("Automaton has not been seeded."),
            DriverPhase::Complete => anyhow::bail!(
                "All {} generations have already been produced.",
                self.params.generations
            ),
        };

        let prev_idx = self.history.len() - 1;
        let StateUpdate { lattice: states, diagnostics } =
            advance_states(&self.history[prev_idx], &self.params.coupling, &self.params.scaling)?;
        let moving = assign_velocities(&states, &mut self.rng)?;
        let pushed = push_cells(&moving, self.params.collision_policy)?;

        // Probabilities belong to the generation they were computed from.
        self.history[prev_idx].annotate(&diagnostics)?;

        if log_enabled!(Level::Debug) {
            let census = pushed.census();
            debug!(
                "Generation {}: C={} Q={} N={} wN={} | E_lattice={:.1}",
                generation,
                census.cancerous,
                census.quiescent,
                census.necrotic,
                census.vacated,
                lattice_energy(&pushed, &self.params.coupling)?
            );
        }

        self.history.push(pushed);
        self.phase = if generation >= self.params.generations {
            DriverPhase::Complete
        } else {
            DriverPhase::Running { generation }
        };
        Ok(self.latest())
    }

    pub fn phase(&self) -> DriverPhase {
        self.phase
    }

    pub fn is_complete(&self) -> bool {
        self.phase == DriverPhase::Complete
    }

    /// Generations produced after the seed.
    pub fn generation(&self) -> u32 {
        (self.history.len() - 1) as u32
    }

    pub fn latest(&self) -> &Lattice<C> {
        &self.history[self.history.len() - 1]
    }

    pub fn snapshots(&self) -> &[Lattice<C>] {
        &self.history
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The run's random source, for extensions that draw alongside the steps.
    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Latest lattice alongside the random source, for observers that draw per cell.
    pub fn latest_with_rng(&mut self) -> (&Lattice<C>, &mut StdRng) {
        let idx = self.history.len() - 1;
        (&self.history[idx], &mut self.rng)
    }

    /// Steps until every configured generation exists.
    pub fn run_to_completion(&mut self) -> Result<()> {
        while !self.is_complete() {
            self.step()?;
        }
        Ok(())
    }

    pub fn into_record(self, metastasis: Option<Vec<MetastasisCount>>) -> SimulationRecord<C> {
        SimulationRecord { seed: self.seed, snapshots: self.history, metastasis }
    }
}

/// Runs `params.generations` generations and returns every lattice, generation 0 first.
/// `dims` must match `params.extents`.
pub fn run_simulation<C: LatticeCoord>(params: &SimParams, dims: C, seed: u64) -> Result<Vec<Lattice<C>>> {
    let mut sim = Automaton::new(params.clone(), dims, seed)?;
    sim.run_to_completion()?;
    Ok(sim.into_record(None).snapshots)
}

/// Planar run with the metastasis extension observing each new generation.
/// Returns the lattices and one cumulative count per generation.
pub fn run_simulation_with_metastasis(
    params: &SimParams,
    mode: SeedMode,
    seed: u64,
) -> Result<(Vec<Lattice<Coord2>>, Vec<MetastasisCount>)> {
    let dims = planar_dims(params);
    let mut sim = Automaton::new(params.clone(), dims, seed)?;
    let mut tracker = MetastasisTracker::new(dims, mode, sim.rng_mut())?;
    while !sim.is_complete() {
        sim.step()?;
        let (latest, rng) = sim.latest_with_rng();
        tracker.observe(latest, rng)?;
    }
    let counts = tracker.into_history();
    Ok((sim.into_record(None).snapshots, counts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tumor_common::{CollisionPolicy, CouplingConstants, ProbabilityScaling};

    fn literature() -> CouplingConstants {
        CouplingConstants::new(3.0, 3.0, 1.0)
    }

    #[test]
    fn zero_generations_yield_the_seeded_diamond() {
        let params = SimParams::planar(201, 201, 0, literature());
        let snapshots = run_simulation(&params, planar_dims(&params), 1).unwrap();
        assert_eq!(snapshots.len(), 1);

        let seeded = &snapshots[0];
        let center = Coord2::new(100, 100);
        let tumor: Vec<Coord2> = seeded
            .iter()
            .filter(|c| c.state != CellState::Healthy)
            .map(|c| c.coord())
            .collect();
        assert_eq!(tumor.len(), 13);
        for c in &tumor {
            assert_eq!(seeded.state(*c).unwrap(), CellState::Cancerous);
            assert!(c.x.abs_diff(center.x) + c.y.abs_diff(center.y) <= 2);
        }
    }

    #[test]
    fn volumetric_seed_is_a_single_cell() {
        let params = SimParams::volumetric([30, 30, 30], 0, literature());
        let snapshots = run_simulation(&params, volumetric_dims(&params), 1).unwrap();
        assert_eq!(snapshots[0].census().cancerous, 1);
        assert_eq!(snapshots[0].state(Coord3::new(15, 15, 15)).unwrap(), CellState::Cancerous);
    }

    #[test]
    fn history_has_one_lattice_per_generation() {
        let params = SimParams::planar(41, 41, 6, literature());
        let mut sim = Automaton::new(params, Coord2::new(41, 41), 5).unwrap();
        assert_eq!(sim.phase(), DriverPhase::Running { generation: 0 });
        sim.run_to_completion().unwrap();
        assert_eq!(sim.phase(), DriverPhase::Complete);
        assert_eq!(sim.snapshots().len(), 7);
        assert_eq!(sim.generation(), 6);
        assert!(sim.step().is_err());
    }

    #[test]
    fn earlier_generations_are_not_rewritten() {
        let params = SimParams::planar(41, 41, 3, literature());
        let mut sim = Automaton::new(params, Coord2::new(41, 41), 5).unwrap();
        sim.step().unwrap();
        let gen1 = sim.snapshots()[1].clone();
        sim.step().unwrap();
        let after = &sim.snapshots()[1];
        // Only the diagnostics written by the step that read generation 1 changed.
        let states_before: Vec<CellState> = gen1.iter().map(|c| c.state).collect();
        let states_after: Vec<CellState> = after.iter().map(|c| c.state).collect();
        assert_eq!(states_before, states_after);
    }

    #[test]
    fn diagnostics_land_on_the_previous_generation() {
        let params = SimParams::planar(41, 41, 1, literature());
        let mut sim = Automaton::new(params, Coord2::new(41, 41), 5).unwrap();
        sim.step().unwrap();
        let center = sim.snapshots()[0].cell(Coord2::new(20, 20)).unwrap();
        assert!(center.probabilities.sum() > 0.0);
    }

    #[test]
    fn tumor_grows_and_stays_inside_the_lattice() {
        let params = SimParams::planar(61, 61, 8, literature());
        let snapshots = run_simulation(&params, planar_dims(&params), 42).unwrap();
        let first = snapshots[0].census().tumor();
        let last = snapshots.last().unwrap().census();
        assert!(last.tumor() + last.necrotic > first);
        // Nothing but background survives within one site of the border.
        let dims = snapshots.last().unwrap().dims();
        for cell in snapshots.last().unwrap().iter() {
            let c = cell.coord();
            if c.x < 3 || c.y < 3 || c.x + 3 >= dims.x || c.y + 3 >= dims.y {
                assert_eq!(cell.state, CellState::Healthy, "{:?}", c);
            }
        }
    }

    #[test]
    fn same_seed_same_history() {
        let mut params = SimParams::planar(41, 41, 5, literature());
        params.collision_policy = CollisionPolicy::FirstWriteWins;
        let a = run_simulation(&params, Coord2::new(41, 41), 77).unwrap();
        let b = run_simulation(&params, Coord2::new(41, 41), 77).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn reloaded_snapshot_replays_identically() {
        let params = SimParams::planar(41, 41, 4, literature());
        let snapshots = run_simulation(&params, Coord2::new(41, 41), 3).unwrap();
        let last = snapshots.last().unwrap().clone();

        let json = serde_json::to_string(&last).unwrap();
        let from_json: Lattice<Coord2> = serde_json::from_str(&json).unwrap();
        let bytes = bincode::serialize(&last).unwrap();
        let from_bincode: Lattice<Coord2> = bincode::deserialize(&bytes).unwrap();

        let mut one_more = params.clone();
        one_more.generations = 1;
        let replay = |lattice: Lattice<Coord2>| {
            let mut sim = Automaton::from_lattice(one_more.clone(), lattice, 1234).unwrap();
            sim.step().unwrap().clone()
        };
        let expected = replay(last);
        assert_eq!(replay(from_json), expected);
        assert_eq!(replay(from_bincode), expected);
    }

    #[test]
    fn metastasis_counts_track_every_generation() {
        let params = SimParams::planar(101, 101, 12, literature());
        let (snapshots, counts) =
            run_simulation_with_metastasis(&params, SeedMode::Set, 8).unwrap();
        assert_eq!(snapshots.len(), 13);
        assert_eq!(counts.len(), 13);
        assert_eq!(counts[0], MetastasisCount::default());
        assert!(counts.windows(2).all(|w| w[1].dominates(&w[0])));
    }

    #[test]
    fn seeding_is_an_observable_phase() {
        let params = SimParams::planar(41, 41, 2, literature());
        let mut sim = Automaton::unseeded(params, Coord2::new(41, 41), 1).unwrap();
        assert_eq!(sim.phase(), DriverPhase::Seeding);
        assert_eq!(sim.latest().census().tumor(), 0);
        assert!(sim.step().is_err());

        sim.place_seed().unwrap();
        assert_eq!(sim.phase(), DriverPhase::Running { generation: 0 });
        assert_eq!(sim.latest().census().cancerous, 13);
        assert!(sim.place_seed().is_err());
        sim.step().unwrap();
        assert_eq!(sim.phase(), DriverPhase::Running { generation: 1 });
    }

    #[test]
    fn mismatched_extents_are_rejected() {
        let params = SimParams::planar(41, 41, 2, literature());
        assert!(run_simulation(&params, Coord2::new(41, 40), 1).is_err());
        assert!(run_simulation(&params, Coord3::new(41, 41, 1), 1).is_err());
        let lattice = Lattice::healthy(Coord2::new(30, 30)).unwrap();
        assert!(Automaton::from_lattice(params, lattice, 1).is_err());
    }

    #[test]
    fn volumetric_run_grows_with_volumetric_calibration() {
        let extent = 24;
        let params = SimParams::volumetric([extent; 3], 4, literature());
        assert_eq!(params.scaling, ProbabilityScaling::VOLUMETRIC);
        let snapshots = run_simulation(&params, volumetric_dims(&params), 9).unwrap();
        assert_eq!(snapshots.len(), 5);

        // The lone seed sees C = 1, N = 0: Ep = -3, En = Eq = 0.
        let center = snapshots[0].cell(Coord3::new(12, 12, 12)).unwrap();
        let bottom = 2.0 + 3f64.exp();
        let expected = (-3f64).exp() / bottom * 1e10;
        assert!((center.probabilities.proliferation / expected - 1.0).abs() < 1e-9);
        assert!((center.probabilities.quiescence / (1e7 / bottom) - 1.0).abs() < 1e-9);

        let last = snapshots.last().unwrap().census();
        assert!(last.tumor() + last.necrotic > 1);

        for pair in snapshots.windows(2) {
            let before: Vec<Coord3> = pair[0]
                .coords_not_in(CellState::Healthy)
                .map(|(c, _)| c)
                .collect();
            for (c, _) in pair[1].coords_not_in(CellState::Healthy) {
                // Daughters and relocated necrosis land 1 or 3 sites from their origin.
                let nearest = before
                    .iter()
                    .map(|b| b.x.abs_diff(c.x) + b.y.abs_diff(c.y) + b.z.abs_diff(c.z))
                    .min()
                    .unwrap();
                assert!(nearest <= 3, "{:?} is {} sites from the previous tumor", c, nearest);
                // Push targets neighbor an in-field center, so at most one site past the field.
                for v in c.components() {
                    assert!(v >= 4 && v + 4 <= extent, "{:?} outside the field band", c);
                }
            }
        }
    }
}
