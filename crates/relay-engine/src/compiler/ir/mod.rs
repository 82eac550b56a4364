//! Lowered Representation
//!
//! What the lowering engine produces for each function: a flat instruction
//! list with explicit resumption labels, plus the label-indexed dispatch
//! switch that re-enters it.
//!
//! # Structure
//!
//! - `LoweredProgram` - All lowered functions plus machine/event declarations
//! - `LoweredFunction` - One resumable entry routine
//! - `Instr` - Flat instructions, including yields and landing labels
//! - `Operand` / `Place` - Read-context values and write-context slots

pub mod function;
pub mod instr;
pub mod pretty;

pub use function::{DispatchSwitch, LoweredFunction, LoweredProgram};
pub use instr::{
    Argument, Constant, ContainerKind, Instr, LabelId, MarkId, Operand, Place, ReceiveArm, Selector,
    Target, YieldRequest,
};
pub use pretty::PrettyPrint;
