//! Relay Runtime
//!
//! Executes lowered entry routines against actor state:
//! - Value model with aliasing compound values
//! - Saved frames and actor call stacks
//! - The entry-routine interpreter
//! - The contract with the external scheduler

pub mod actor;
pub mod error;
pub mod frame;
pub mod interpreter;
pub mod ops;
pub mod scheduler;
pub mod value;

pub use actor::{case_matches, Actor};
pub use error::{RuntimeFailure, RuntimeResult};
pub use frame::Frame;
pub use interpreter::{Interpreter, RuntimeOptions};
pub use scheduler::{Continuation, ResumeInput, SchedulerHooks, YieldReason};
pub use value::{MachineId, Value, ValueError, ValueResult};
