//! `relay check`: lower and verify without printing.

use super::{load_config, read_program};
use anyhow::Context;
use relay_engine::{lower_program, EngineConfig, LoweredProgram, Program};
use std::path::Path;

pub fn execute(file: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let program = read_program(file)?;
    let config = load_config(config)?;
    let lowered = check(&program, &config)?;

    let resumable = lowered.functions.iter().filter(|f| f.is_resumable()).count();
    println!(
        "{}: {} functions ({} resumable), {} labels",
        file.display(),
        lowered.functions.len(),
        resumable,
        lowered.label_count()
    );
    Ok(())
}

/// Lower with verification forced on
pub fn check(program: &Program, config: &EngineConfig) -> anyhow::Result<LoweredProgram> {
    let mut options = config.lower.clone();
    options.verify = true;
    lower_program(program, &options).context("Verification failed")
}
