//! Classification settings.
//!
//! Every field has a default, so a TOML file only lists what it changes:
//!
//! ```rust
//! use faultclasses::config::{ClassifyConfig, Mode};
//! let config = ClassifyConfig::from_toml_str(r#"
//!     mode = "sequential"
//!     seq_bound = 8
//!
//!     [pregroup]
//!     seed = 42
//! "#).unwrap();
//! assert_eq!(config.mode, Mode::Sequential);
//! assert_eq!(config.pregroup.seed, 42);
//! assert_eq!(config.pregroup.max_group_size, 20);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{FaultError, Result};

/// Which flow classifies the faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Sequential iff the netlist has DFFs.
    #[default]
    Auto,
    Combinational,
    Sequential,
}

/// Random-simulation pregrouping of the sequential flow.
///
/// These are tuning knobs: they change how much work the exact oracle is spared, never
/// which faults end up equivalent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PregroupConfig {
    /// Frames simulated by the first pass over the whole fault set.
    pub initial_frames: usize,
    /// Frames simulated by the first refinement iteration.
    pub frames: usize,
    /// Frames added at every following iteration.
    pub frame_step: usize,
    pub max_iterations: usize,
    /// Groups smaller than this are not split any further.
    pub min_group_size: usize,
    /// Pregrouping stops once every active group is smaller than this.
    pub max_group_size: usize,
    /// A group that did not split this many times in a row is left alone.
    pub stall_threshold: usize,
    pub seed: u64,
    /// 64-bit words of random sequences simulated at once.
    pub sim_words: usize,
}

impl Default for PregroupConfig {
    fn default() -> Self {
        PregroupConfig {
            initial_frames: 50,
            frames: 50,
            frame_step: 10,
            max_iterations: 50,
            min_group_size: 5,
            max_group_size: 20,
            stall_threshold: 3,
            seed: 0,
            sim_words: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifyConfig {
    pub mode: Mode,
    /// SAT conflicts allowed per combinational pair, `None` for no limit.
    pub conflict_limit: Option<u32>,
    /// Frames unrolled by the bounded sequential oracle.
    pub seq_bound: usize,
    /// SAT conflicts allowed per sequential oracle query, `None` for no limit.
    pub seq_conflict_limit: Option<u32>,
    pub pregroup: PregroupConfig,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        ClassifyConfig {
            mode: Mode::Auto,
            conflict_limit: Some(10_000),
            seq_bound: 20,
            seq_conflict_limit: Some(100_000),
            pregroup: PregroupConfig::default(),
        }
    }
}

fn check(ok: bool, what: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(FaultError::InvalidConfig(what.to_string()))
    }
}

impl ClassifyConfig {
    /// Parses and validates a TOML configuration.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: ClassifyConfig =
            toml::from_str(s).map_err(|e| FaultError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        ClassifyConfig::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.pregroup;
        check(self.seq_bound >= 1, "seq_bound must be at least 1")?;
        check(p.initial_frames >= 1, "pregroup.initial_frames must be at least 1")?;
        check(p.frames >= 1, "pregroup.frames must be at least 1")?;
        check(p.min_group_size >= 2, "pregroup.min_group_size must be at least 2")?;
        check(p.max_group_size >= 2, "pregroup.max_group_size must be at least 2")?;
        check(p.stall_threshold >= 1, "pregroup.stall_threshold must be at least 1")?;
        check(p.sim_words >= 1, "pregroup.sim_words must be at least 1")?;
        Ok(())
    }
}
