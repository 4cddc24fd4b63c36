use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Adhesion strengths between tumor cell types.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CouplingConstants {
    /// Cancer-cancer.
    pub kcc: f64,
    /// Necrotic-necrotic.
    pub knn: f64,
    /// Necrotic-cancer.
    pub knc: f64,
}

impl CouplingConstants {
    pub fn new(kcc: f64, knn: f64, knc: f64) -> Self {
        CouplingConstants { kcc, knn, knc }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

/// Multipliers applied to the proliferation and quiescence probabilities before
/// the maximum is taken. Without them both are vanishingly small next to necrosis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityScaling {
    pub proliferation: f64,
    pub quiescence: f64,
}

impl ProbabilityScaling {
    pub const PLANAR: ProbabilityScaling = ProbabilityScaling { proliferation: 1e8, quiescence: 1e5 };
    pub const VOLUMETRIC: ProbabilityScaling = ProbabilityScaling { proliferation: 1e10, quiescence: 1e7 };
    pub const UNIT: ProbabilityScaling = ProbabilityScaling { proliferation: 1.0, quiescence: 1.0 };

    pub fn for_dimensionality(dimensionality: Dimensionality) -> Self {
        match dimensionality {
            Dimensionality::Planar => Self::PLANAR,
            Dimensionality::Volumetric => Self::VOLUMETRIC,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimensionality {
    #[serde(rename = "2d")]
    Planar,
    #[serde(rename = "3d")]
    Volumetric,
}

impl fmt::Display for Dimensionality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimensionality::Planar => f.write_str("2D"),
            Dimensionality::Volumetric => f.write_str("3D"),
        }
    }
}

/// How the push step resolves two writes landing on the same site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// The write from the cell visited last in row-major order stands.
    #[default]
    LastWriteWins,
    /// The first write to a site in a generation claims it; later writes are dropped.
    FirstWriteWins,
}

/// Initial tumor placed at the lattice center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedPattern {
    /// Center plus first- and second-ring Von Neumann neighbors (13 sites).
    Diamond,
    /// Center site only.
    Single,
}

impl SeedPattern {
    pub fn for_dimensionality(dimensionality: Dimensionality) -> Self {
        match dimensionality {
            Dimensionality::Planar => SeedPattern::Diamond,
            Dimensionality::Volumetric => SeedPattern::Single,
        }
    }
}

/// Placement of ruptured vessels on the metastasis board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedMode {
    /// One site chosen uniformly at random.
    Random,
    /// Four fixed sites at quarter/half positions.
    Set,
}

impl FromStr for SeedMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "random" => Ok(SeedMode::Random),
            "set" => Ok(SeedMode::Set),
            other => anyhow::bail!("Seed type has to be either 'random' or 'set', got '{}'.", other),
        }
    }
}

/// Runtime parameters derived from the configuration, read by every generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    pub dimensionality: Dimensionality,
    /// Extents along each axis; the third entry is ignored for planar runs.
    pub extents: [usize; 3],
    pub generations: u32,
    pub coupling: CouplingConstants,
    pub scaling: ProbabilityScaling,
    pub seed_pattern: SeedPattern,
    pub collision_policy: CollisionPolicy,
    /// `Some` when the metastasis extension is enabled.
    pub metastasis: Option<SeedMode>,
    pub rng_seed: Option<u64>,
}

impl SimParams {
    /// Planar parameters with the default calibration and seed pattern.
    pub fn planar(rows: usize, cols: usize, generations: u32, coupling: CouplingConstants) -> Self {
        SimParams {
            dimensionality: Dimensionality::Planar,
            extents: [rows, cols, 1],
            generations,
            coupling,
            scaling: ProbabilityScaling::PLANAR,
            seed_pattern: SeedPattern::Diamond,
            collision_policy: CollisionPolicy::LastWriteWins,
            metastasis: None,
            rng_seed: None,
        }
    }

    pub fn volumetric(extents: [usize; 3], generations: u32, coupling: CouplingConstants) -> Self {
        SimParams {
            dimensionality: Dimensionality::Volumetric,
            extents,
            generations,
            coupling,
            scaling: ProbabilityScaling::VOLUMETRIC,
            seed_pattern: SeedPattern::Single,
            collision_policy: CollisionPolicy::LastWriteWins,
            metastasis: None,
            rng_seed: None,
        }
    }
}
