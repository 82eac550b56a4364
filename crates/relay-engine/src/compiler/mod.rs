//! Compiler
//!
//! Lowers validated function bodies into resumable entry routines:
//!
//! 1. [`layout`] fixes each function's frame slots and issues labels
//! 2. [`lower`] walks the body and synthesizes flat code per node
//! 3. [`frame_type`] describes the saved activation of the function
//! 4. the entry dispatcher appends the implicit return and the resume switch

mod entry;
pub mod error;
pub mod frame_type;
pub mod ir;
pub mod layout;
pub mod lower;

pub use error::{LowerError, LowerResult};
pub use frame_type::FrameType;
pub use ir::{LoweredFunction, LoweredProgram, PrettyPrint};
pub use lower::{EvalContext, Lowerer};

use crate::ast::{FunctionId, Program};
use serde::{Deserialize, Serialize};

/// Lowering options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowerOptions {
    /// Run structural verification on every lowered function
    pub verify: bool,
    /// Prefix assertion messages with `file(line,col): `
    pub source_locations: bool,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self {
            verify: true,
            source_locations: true,
        }
    }
}

/// Lower a single function
pub fn lower_function(program: &Program, id: FunctionId, options: &LowerOptions) -> LowerResult<LoweredFunction> {
    let lowerer = Lowerer::new(program, id, options)?;
    let info = program.function(id).ok_or_else(|| LowerError::UnknownFunction {
        function: "<program>".to_string(),
        callee: id.0,
    })?;

    let frame_layout = layout::layout(info)?;
    let frame_type = FrameType::synthesize(id, &info.name, frame_layout);
    let (body, label_count) = lowerer.lower_body()?;
    let function = entry::assemble(id, info, frame_type, body, label_count, options.verify)?;

    tracing::debug!(
        function = %function.name,
        labels = function.label_count,
        slots = function.frame_type.slot_count(),
        instructions = function.body.len(),
        "lowered function"
    );
    Ok(function)
}

/// Lower every function of a program
pub fn lower_program(program: &Program, options: &LowerOptions) -> LowerResult<LoweredProgram> {
    let functions = program
        .iter_functions()
        .map(|(id, _)| lower_function(program, id, options))
        .collect::<LowerResult<Vec<_>>>()?;

    tracing::debug!(functions = functions.len(), "lowered program");
    Ok(LoweredProgram {
        file: program.file.clone(),
        functions,
        machines: program.machines.clone(),
        events: program.events.clone(),
    })
}
