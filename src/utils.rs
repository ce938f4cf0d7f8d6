use crate::error::{Result, Rv32GenError};
use chrono::{DateTime, Local};
use log::info;
use rand::{Rng, distr::Alphanumeric};
use std::{fs::create_dir_all, path::PathBuf};

/// Output directory of a batch run: the fixed directory when given, otherwise
/// a fresh directory under the workspace named after the time and `seed`.
pub fn resolve_output_dir(
    output_dir: Option<PathBuf>,
    workspace_dir: Option<PathBuf>,
    seed: u64,
) -> Result<PathBuf> {
    let dir = match (output_dir, workspace_dir) {
        (Some(dir), None) => {
            info!("Using fixed output directory: {:?}", dir);
            dir
        }
        (None, workspace) => {
            let workspace = workspace.unwrap_or_else(|| PathBuf::from("workspace"));
            let batch_dir = workspace.join(batch_dir_name(seed));
            info!("Creating batch output directory: {:?}", batch_dir);
            batch_dir
        }
        (Some(_), Some(_)) => {
            unreachable!("clap should prevent both options being set")
        }
    };
    create_dir_all(&dir)?;
    Ok(dir)
}

/// `rv32gen_<date>_<time>_s<seed hex>_<tag>`. The tag keeps two batches
/// started in the same second with the same seed apart.
fn batch_dir_name(seed: u64) -> String {
    let started: DateTime<Local> = Local::now();
    let tag: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(4)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!(
        "rv32gen_{}_s{:x}_{}",
        started.format("%Y%m%d_%H%M%S"),
        seed,
        tag
    )
}

/// Hexadecimal CLI value, with or without a `0x` prefix ("200" is 512).
pub fn parse_hex_u32(value: &str) -> Result<u32> {
    let digits = value
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    u32::from_str_radix(digits, 16)
        .map_err(|e| Rv32GenError::config(format!("Invalid hex value '{}': {}", value, e)))
}

/// Seed value: decimal, or hexadecimal with a `0x` prefix.
pub fn parse_seed(value: &str) -> Result<u64> {
    let value = value.trim();
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse::<u64>(),
    };
    parsed.map_err(|e| Rv32GenError::config(format!("Invalid seed '{}': {}", value, e)))
}
