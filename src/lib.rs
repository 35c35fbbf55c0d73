//! A deterministic linker driver: parses a cc/ld-style command line,
//! normalizes it, resolves libraries, reorders static archives, renders
//! a canonical backend invocation, executes it, and classifies failures
//! into actionable diagnostics.

pub mod cli;
pub mod config;
pub mod diagnose;
pub mod discovery;
pub mod driver;
pub mod emit;
pub mod execute;
pub mod logging;
pub mod normalize;
pub mod parse;
pub mod plan;
pub mod reorder;
pub mod resolve;
pub mod symbols;
pub mod triple;
pub mod types;

pub use types::{Error, Result};
