//! `relay lower`: lower a program and print its entry routines.

use super::{load_config, read_program};
use anyhow::{anyhow, Context};
use relay_engine::{lower_function, lower_program, EngineConfig, PrettyPrint, Program};
use std::path::Path;

pub fn execute(file: &Path, config: Option<&Path>, function: Option<&str>) -> anyhow::Result<()> {
    let program = read_program(file)?;
    let config = load_config(config)?;
    print!("{}", render(&program, &config, function)?);
    Ok(())
}

/// Pretty-printed lowering of the whole program or one function
pub fn render(program: &Program, config: &EngineConfig, function: Option<&str>) -> anyhow::Result<String> {
    match function {
        Some(name) => {
            let id = program
                .function_by_name(name)
                .ok_or_else(|| anyhow!("No function named `{}`", name))?;
            let lowered =
                lower_function(program, id, &config.lower).with_context(|| format!("Failed to lower `{}`", name))?;
            Ok(lowered.pretty_print())
        }
        None => {
            let lowered = lower_program(program, &config.lower).context("Failed to lower program")?;
            Ok(lowered.pretty_print())
        }
    }
}
