//! Saved activation records
//!
//! A frame stores locals as a flat array so the scheduler can push and pop
//! frames without knowing anything about the function they belong to.
//! Per-function knowledge (names, defaults) lives in
//! [`crate::compiler::FrameType`].

use super::value::Value;
use crate::ast::FunctionId;
use crate::compiler::ir::LabelId;

/// One active, possibly suspended, invocation
#[derive(Debug)]
pub struct Frame {
    /// Function this frame belongs to
    pub function: FunctionId,
    /// Slot values, parallel to the function's layout
    pub locals: Vec<Value>,
    /// Where the entry routine resumes; [`LabelId::ENTRY`] for a fresh call
    pub label: LabelId,
    /// Callee still in progress when this frame was saved
    pub pending_call: Option<FunctionId>,
    /// Nondet choices recorded by the statement in progress
    pub choices: Vec<bool>,
}

impl Frame {
    /// Frame that starts at the top of the function
    pub fn at_start(function: FunctionId, locals: Vec<Value>) -> Self {
        Self::at_label(function, locals, LabelId::ENTRY)
    }

    /// Frame that resumes at `label`
    pub fn at_label(function: FunctionId, locals: Vec<Value>, label: LabelId) -> Self {
        Self {
            function,
            locals,
            label,
            pending_call: None,
            choices: Vec::new(),
        }
    }

    /// Copy that shares no mutable storage with `self`
    pub fn deep_clone(&self) -> Self {
        Self {
            function: self.function,
            locals: self.locals.iter().map(Value::deep_clone).collect(),
            label: self.label,
            pending_call: self.pending_call,
            choices: self.choices.clone(),
        }
    }

    /// Whether this frame resumes mid-body
    pub fn is_resuming(&self) -> bool {
        !self.label.is_entry()
    }
}
