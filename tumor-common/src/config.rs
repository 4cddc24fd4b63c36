use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::sim_params::{
    CollisionPolicy, CouplingConstants, Dimensionality, ProbabilityScaling, SeedMode, SeedPattern, SimParams,
};
use std::path::Path;

// Lattice shape
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LatticeConfig {
    pub dimensionality: Dimensionality,
    pub rows: usize,
    pub cols: usize,
    // Only read for 3d runs
    #[serde(default = "default_aisles")]
    pub aisles: usize,
    // Overrides the per-dimensionality seed pattern
    #[serde(default)]
    pub seed_pattern: Option<SeedPattern>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    pub generations: u32,
    // Log progress at least every this many generations
    #[serde(default = "default_log_interval")]
    pub log_interval_generations: u32,
}

// Boltzmann coupling constants. Literature suggests kcc = 3, knn = 3, knc = 1.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CouplingConfig {
    pub kcc: f64,
    pub knn: f64,
    pub knc: f64,
}

// Probability calibration; missing keys fall back to the per-dimensionality defaults
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct CalibrationConfig {
    #[serde(default)]
    pub proliferation_scale: Option<f64>,
    #[serde(default)]
    pub quiescence_scale: Option<f64>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct TransportConfig {
    #[serde(default)]
    pub collision_policy: CollisionPolicy,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct MetastasisConfig {
    pub enabled: bool,
    // "random" or "set"
    #[serde(default = "default_seed_mode")]
    pub seed_mode: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct RngConfig {
    // Omit for a fresh seed each run (the chosen seed is logged)
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    pub save_snapshots: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
    #[serde(default)]
    pub save_csv: bool,
    #[serde(default = "default_csv_dir")]
    pub csv_dir: String,
}

fn default_aisles() -> usize {
    1
}

fn default_log_interval() -> u32 {
    10
}

fn default_seed_mode() -> String {
    "set".to_string()
}

fn default_csv_dir() -> String {
    "outputcsv".to_string()
}

fn default_metastasis() -> MetastasisConfig {
    MetastasisConfig { enabled: false, seed_mode: default_seed_mode() }
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationConfig {
    pub lattice: LatticeConfig,
    pub timing: TimingConfig,
    pub coupling: CouplingConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default = "default_metastasis")]
    pub metastasis: MetastasisConfig,
    #[serde(default)]
    pub rng: RngConfig,
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let lattice = &self.lattice;
        if lattice.rows == 0 || lattice.cols == 0 {
            anyhow::bail!("rows and cols must be greater than 0.");
        }
        if lattice.dimensionality == Dimensionality::Volumetric && lattice.aisles == 0 {
            anyhow::bail!("aisles must be greater than 0 for 3d lattices.");
        }
        for (name, scale) in [
            ("proliferation_scale", self.calibration.proliferation_scale),
            ("quiescence_scale", self.calibration.quiescence_scale),
        ] {
            if let Some(s) = scale {
                if !(s.is_finite() && s > 0.0) {
                    anyhow::bail!("{} must be a positive finite number, got {}.", name, s);
                }
            }
        }
        let k = &self.coupling;
        if ![k.kcc, k.knn, k.knc].iter().all(|v| v.is_finite()) {
            anyhow::bail!("Coupling constants must be finite.");
        }
        if self.metastasis.enabled {
            if lattice.dimensionality != Dimensionality::Planar {
                anyhow::bail!("The metastasis extension only runs on 2d lattices.");
            }
            self.metastasis.seed_mode.parse::<SeedMode>()?;
        }
        if let Some(format) = self.output.format.as_deref() {
            if !matches!(format, "json" | "bincode" | "messagepack") {
                anyhow::bail!("Unknown output format '{}'. Use json, bincode or messagepack.", format);
            }
        }
        Ok(())
    }

    /// Converts the configuration into simulation parameters used at runtime.
    pub fn get_sim_params(&self) -> Result<SimParams> {
        let dimensionality = self.lattice.dimensionality;
        let defaults = ProbabilityScaling::for_dimensionality(dimensionality);
        let scaling = ProbabilityScaling {
            proliferation: self.calibration.proliferation_scale.unwrap_or(defaults.proliferation),
            quiescence: self.calibration.quiescence_scale.unwrap_or(defaults.quiescence),
        };

        let aisles = match dimensionality {
            Dimensionality::Planar => 1,
            Dimensionality::Volumetric => self.lattice.aisles,
        };

        let metastasis = if self.metastasis.enabled {
            Some(self.metastasis.seed_mode.parse::<SeedMode>()?)
        } else {
            None
        };

        Ok(SimParams {
            dimensionality,
            extents: [self.lattice.rows, self.lattice.cols, aisles],
            generations: self.timing.generations,
            coupling: CouplingConstants::new(self.coupling.kcc, self.coupling.knn, self.coupling.knc),
            scaling,
            seed_pattern: self
                .lattice
                .seed_pattern
                .unwrap_or_else(|| SeedPattern::for_dimensionality(dimensionality)),
            collision_policy: self.transport.collision_policy,
            metastasis,
            rng_seed: self.rng.seed,
        })
    }
}
