//! Relay Engine
//!
//! Turns blocking-style state-machine code into resumable code and runs it:
//! - **AST**: The validated, resolved input program (`ast` module)
//! - **Compiler**: Label/frame lowering into entry routines (`compiler` module)
//! - **VM**: Values, frames, actors, and the entry-routine interpreter (`vm` module)
//! - **Config**: `relay.toml` loading (`config` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use relay_engine::{lower_program, Actor, Interpreter, LowerOptions, Program};
//!
//! let program: Program = serde_json::from_str(&json)?;
//! let lowered = lower_program(&program, &LowerOptions::default())?;
//!
//! // The scheduler owns actors and pushes the first frame of a handler
//! let mut actor = Actor::new(MachineId(0), MachineTypeId(0), &program.machines[0]);
//! actor.start_call(&lowered, entry, vec![])?;
//! let continuation = Interpreter::new(&lowered).execute(entry, &mut hooks, &mut actor)?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// Input AST: resolved functions, machines, and events
pub mod ast;

/// Compiler: layout, lowering, and the lowered IR
pub mod compiler;

/// Engine configuration
pub mod config;

/// VM: values, actors, and the entry-routine interpreter
pub mod vm;

// ============================================================================
// Re-exports
// ============================================================================

pub use ast::{FunctionId, FunctionInfo, MachineTypeId, Node, NodeKind, Program, Type};

pub use compiler::{
    lower_function, lower_program, FrameType, LowerError, LowerOptions, LowerResult, LoweredFunction, LoweredProgram,
    PrettyPrint,
};

pub use config::{ConfigError, EngineConfig};

pub use vm::{
    Actor, Continuation, Frame, Interpreter, MachineId, ResumeInput, RuntimeFailure, RuntimeOptions, RuntimeResult,
    SchedulerHooks, Value, YieldReason,
};
