//! TOML run configuration.
//!
//! Every section and key is optional; a missing key takes its default and command line
//! flags override whatever the file sets.

use std::path::{Path, PathBuf};

use rgecore::algorithm::binning::{Binning, BinningCuts};
use rgecore::algorithm::fusion::{FmtLayers, FusionConfig, QualityCuts};
use rgecore::physics::constants::{Q2_CUT, W2_CUT};
use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RgeConfig {
    #[serde(default)]
    pub ntuples: NtuplesConfig,

    #[serde(default)]
    pub cuts: CutsConfig,

    #[serde(default)]
    pub binning: BinningConfig,
}

impl RgeConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Configuration from `path`, or the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

// =============================================================================
// make-ntuples
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NtuplesConfig {
    /// FMT layers a track must cross: 0, 2 or 3.
    #[serde(default)]
    pub fmt_layers: u8,

    /// Reject particles outside the FMT polar acceptance.
    #[serde(default)]
    pub fmt_cut: bool,

    /// Stop after this many events.
    #[serde(default)]
    pub n_events: Option<usize>,

    /// Directory holding the sampling fraction files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory receiving the ntuples and run summaries.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Beam energy in GeV, overriding the run table.
    #[serde(default)]
    pub beam_energy: Option<f64>,

    /// Apply track quality and vertex cuts before fusion.
    #[serde(default)]
    pub quality_cuts: bool,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("../data")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("../root_io")
}

impl Default for NtuplesConfig {
    fn default() -> Self {
        NtuplesConfig {
            fmt_layers: 0,
            fmt_cut: false,
            n_events: None,
            data_dir: default_data_dir(),
            work_dir: default_work_dir(),
            beam_energy: None,
            quality_cuts: false,
        }
    }
}

impl NtuplesConfig {
    pub fn fusion_config(&self) -> Result<FusionConfig> {
        let fmt_layers = FmtLayers::from_count(self.fmt_layers).ok_or(DataError::InvalidFmtLayers(self.fmt_layers))?;
        Ok(FusionConfig {
            fmt_layers,
            fmt_cut: self.fmt_cut,
            quality: if self.quality_cuts { Some(QualityCuts::default()) } else { None },
            ..FusionConfig::default()
        })
    }
}

// =============================================================================
// DIS cuts
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutsConfig {
    #[serde(default = "default_q2_min")]
    pub q2_min: f64,

    #[serde(default = "default_w2_min")]
    pub w2_min: f64,
}

fn default_q2_min() -> f64 {
    Q2_CUT
}

fn default_w2_min() -> f64 {
    W2_CUT
}

impl Default for CutsConfig {
    fn default() -> Self {
        CutsConfig { q2_min: Q2_CUT, w2_min: W2_CUT }
    }
}

impl CutsConfig {
    pub fn binning_cuts(&self) -> BinningCuts {
        BinningCuts { q2_min: self.q2_min, w2_min: self.w2_min }
    }
}

// =============================================================================
// acc-corr
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BinningConfig {
    #[serde(default)]
    pub q2: Option<Vec<f64>>,
    #[serde(default)]
    pub nu: Option<Vec<f64>>,
    #[serde(default)]
    pub zh: Option<Vec<f64>>,
    #[serde(default)]
    pub pt2: Option<Vec<f64>>,
    #[serde(default)]
    pub phipq: Option<Vec<f64>>,

    /// phi_PQ of the thrown sample is stored in degrees.
    #[serde(default)]
    pub thrown_phipq_in_degrees: bool,

    /// phi_PQ of the simulated sample is stored in degrees.
    #[serde(default)]
    pub simulated_phipq_in_degrees: bool,

    /// Worker threads, all cores when unset.
    #[serde(default)]
    pub threads: Option<usize>,
}

impl BinningConfig {
    /// Validated bin edges; names the first missing or malformed axis.
    pub fn binning(&self) -> Result<Binning> {
        Ok(Binning::new([
            self.q2.clone(),
            self.nu.clone(),
            self.zh.clone(),
            self.pt2.clone(),
            self.phipq.clone(),
        ])?)
    }
}
