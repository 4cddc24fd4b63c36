use anyhow::Result;
use log::{debug, error, info, trace};
use std::time::Instant;

use tumor_engine::metastasis::MetastasisTracker;
use tumor_engine::output::save_outputs;
use tumor_engine::tumor_common::{Dimensionality, LatticeCoord, MetastasisCount, SimulationConfig};
use tumor_engine::{planar_dims, resolve_seed, volumetric_dims, Automaton};

/// Steps `sim` to completion, calling `observer` after every generation.
fn run<C, F>(config: &SimulationConfig, mut sim: Automaton<C>, mut observer: F) -> Result<Automaton<C>>
where
    C: LatticeCoord,
    F: FnMut(&mut Automaton<C>) -> Result<()>,
{
    let total = sim.params().generations;
    let dims = sim.latest().dims();
    let log_interval = config.timing.log_interval_generations.max(1);

    info!("Starting {} generations on a {:?} lattice...", total, dims);
    let start_time = Instant::now();

    while !sim.is_complete() {
        let step_start_time = Instant::now();
        if let Err(e) = sim.step().map(|_| ()) {
            error!("Error during generation {}: {}", sim.generation() + 1, e);
            anyhow::bail!("Simulation step failed.");
        }
        observer(&mut sim)?;
        let step_duration = step_start_time.elapsed();

        let generation = sim.generation();
        if generation % log_interval == 0 || generation == total {
            let census = sim.latest().census();
            info!(
                "Generation [{}/{}] | Tumor: {} | Necrotic: {} | Step Time: {:6.2} ms | Elapsed: {:.2} s",
                generation,
                total,
                census.tumor(),
                census.necrotic,
                step_duration.as_secs_f64() * 1000.0,
                start_time.elapsed().as_secs_f64()
            );
        } else {
            trace!(
                "Generation [{}/{}] completed in {:.2} ms",
                generation,
                total,
                step_duration.as_secs_f64() * 1000.0
            );
        }
    }

    info!("Simulation finished in {:.3} seconds.", start_time.elapsed().as_secs_f64());
    Ok(sim)
}

fn main() -> Result<()> {
    env_logger::init();

    info!("Starting Tumor Growth Automaton...");

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = SimulationConfig::load(&config_path)?;
    let params = config.get_sim_params()?;
    debug!("Simulation Parameters: {:#?}", params);
    info!("Using {} Rayon threads.", rayon::current_num_threads());

    let seed = resolve_seed(&params);
    info!("RNG seed: {}", seed);

    match params.dimensionality {
        Dimensionality::Planar => {
            let dims = planar_dims(&params);
            let mut sim = Automaton::new(params.clone(), dims, seed)?;
            // The vessel board draws from the run's stream ahead of generation 1.
            let mut tracker = match params.metastasis {
                Some(mode) => Some(MetastasisTracker::new(dims, mode, sim.rng_mut())?),
                None => None,
            };
            let sim = run(&config, sim, |sim| {
                if let Some(tracker) = tracker.as_mut() {
                    let (latest, rng) = sim.latest_with_rng();
                    tracker.observe(latest, rng)?;
                }
                Ok(())
            })?;
            let counts: Option<Vec<MetastasisCount>> = tracker.map(MetastasisTracker::into_history);
            if let Some(last) = counts.as_ref().and_then(|c| c.last()) {
                info!(
                    "Metastases after {} generations: bone {} | lung {} | liver {}",
                    sim.generation(),
                    last.bone,
                    last.lung,
                    last.liver
                );
            }
            save_outputs(&config.output, params.dimensionality, &sim.into_record(counts))?;
        }
        Dimensionality::Volumetric => {
            let sim = Automaton::new(params.clone(), volumetric_dims(&params), seed)?;
            let sim = run(&config, sim, |_| Ok(()))?;
            save_outputs(&config.output, params.dimensionality, &sim.into_record(None))?;
        }
    }

    info!("Simulation Complete.");
    Ok(())
}
