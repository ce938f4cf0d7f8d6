//! Generator configuration
//!
//! A `GeneratorConfig` is the fully resolved set of knobs for one generation
//! run. It can be loaded from a TOML file and is then overridden field by
//! field from the command line.

use crate::consts::rv32::{
    DEFAULT_BASE_ADDRESS, DEFAULT_INSTRUCTION_COUNT, DEFAULT_MARCH, MAX_OFFSET, MIN_BASE_ADDRESS,
};
use crate::error::{Result, Rv32GenError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

/// Resolved configuration for a single generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Number of counted instructions to emit before the halt line
    pub instruction_count: u32,
    /// Architecture extension letters, e.g. "imc" or "rv32im"
    pub march: String,
    /// Base address used by every load/store construct
    pub base_address: u32,
    /// Random seed; `None` derives one from the current time
    pub seed: Option<u64>,
    pub include_ecall: bool,
    pub include_ebreak: bool,
    /// Debug verbosity; any non-zero value keeps FENCE picks as comments
    pub debug: u32,
    pub quiet: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            instruction_count: DEFAULT_INSTRUCTION_COUNT,
            march: DEFAULT_MARCH.to_string(),
            base_address: DEFAULT_BASE_ADDRESS,
            seed: None,
            include_ecall: false,
            include_ebreak: false,
            debug: 0,
            quiet: false,
        }
    }
}

impl GeneratorConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Rv32GenError::file(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        let config: GeneratorConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn extensions(&self) -> Extensions {
        Extensions::from_march(&self.march)
    }

    /// The seed for this run, deriving one from the clock when none was given.
    pub fn effective_seed(&self) -> u64 {
        self.seed
            .unwrap_or_else(|| Utc::now().timestamp_micros().unsigned_abs())
    }

    /// Fix the seed so that later reads (header, logs, manifest) agree.
    pub fn resolve_seed(&mut self) -> u64 {
        let seed = self.effective_seed();
        self.seed = Some(seed);
        seed
    }

    /// Reject configurations the generator would turn into meaningless
    /// output. The generator never calls this itself.
    pub fn validate(&self) -> Result<()> {
        if self.base_address < MIN_BASE_ADDRESS {
            return Err(Rv32GenError::config(format!(
                "Base address 0x{:x} is below the minimum 0x{:x}",
                self.base_address, MIN_BASE_ADDRESS
            )));
        }
        if i64::from(self.base_address) + i64::from(MAX_OFFSET) > i64::from(i32::MAX) {
            return Err(Rv32GenError::config(format!(
                "Base address 0x{:x} leaves no room for +{} byte offsets",
                self.base_address, MAX_OFFSET
            )));
        }
        let extensions = self.extensions();
        if extensions.is_empty() {
            return Err(Rv32GenError::config("Architecture string is empty"));
        }
        if !extensions.has('i') {
            return Err(Rv32GenError::config(format!(
                "Architecture '{}' does not include the base 'i' extension",
                self.march
            )));
        }
        Ok(())
    }
}

/// Set of single-letter architecture extensions parsed from a march string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extensions {
    letters: BTreeSet<char>,
}

impl Extensions {
    /// Parse "imc", "IMC" or "rv32imc". Multi-letter `_z...` suffixes are
    /// passed through to the assembler and ignored here.
    pub fn from_march(march: &str) -> Self {
        let lower = march.trim().to_lowercase();
        let body = lower.strip_prefix("rv32").unwrap_or(&lower);
        let single = body.split('_').next().unwrap_or("");

        let mut letters = BTreeSet::new();
        for c in single.chars().filter(|c| c.is_ascii_alphabetic()) {
            // g is shorthand for imafd
            if c == 'g' {
                letters.extend(['i', 'm', 'a', 'f', 'd']);
            } else {
                letters.insert(c);
            }
        }
        Self { letters }
    }

    pub fn has(&self, letter: char) -> bool {
        self.letters.contains(&letter.to_ascii_lowercase())
    }

    pub fn has_mul_div(&self) -> bool {
        self.has('m')
    }

    pub fn is_empty(&self) -> bool {
        self.letters.is_empty()
    }
}

impl fmt::Display for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.letters {
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}
