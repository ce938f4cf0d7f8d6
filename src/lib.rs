//! RV32 Random Instruction Generator Library
//!
//! This library generates pseudo-random but structurally valid RV32IMC
//! assembly programs for stress-testing processor cores and simulators.

pub mod analysis;
pub mod config;
pub mod consts;
pub mod error;
pub mod random_asm;
pub mod utils;
