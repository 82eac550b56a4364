//! Frame Synthesis
//!
//! Produces the saved-activation type of each function: how to build its
//! locals from call arguments, how to construct frames at the start or at a
//! label, and which slot each named parameter or local lives in.

use super::layout::{FrameLayout, Slot, SlotKind};
use super::ir::LabelId;
use crate::ast::FunctionId;
use crate::vm::error::{RuntimeFailure, RuntimeResult};
use crate::vm::frame::Frame;
use crate::vm::value::Value;
use rustc_hash::FxHashMap;

/// Saved-activation type of one function
#[derive(Debug, Clone)]
pub struct FrameType {
    function: FunctionId,
    name: String,
    slots: Vec<Slot>,
    param_count: usize,
    accessors: FxHashMap<String, u32>,
}

impl FrameType {
    /// Synthesize the frame type from a computed layout
    pub fn synthesize(function: FunctionId, name: &str, layout: FrameLayout) -> Self {
        let accessors = layout
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.kind != SlotKind::Temp)
            .map(|(i, slot)| (slot.name.clone(), i as u32))
            .collect();
        Self {
            function,
            name: name.to_string(),
            slots: layout.slots,
            param_count: layout.param_count,
            accessors,
        }
    }

    /// Owning function
    pub fn function(&self) -> FunctionId {
        self.function
    }

    /// Display name for diagnostics
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of slots, equal to the function's `max_num_locals`
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of parameter slots
    pub fn param_count(&self) -> usize {
        self.param_count
    }

    /// Slots in index order
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Slot of a named parameter or local
    pub fn slot_of(&self, name: &str) -> Option<u32> {
        self.accessors.get(name).copied()
    }

    /// Build initial locals from call arguments
    ///
    /// Arguments land in parameter slots as given; the caller has already
    /// applied each argument's transfer qualifier. Declared locals get their
    /// type's default and temporaries are null.
    pub fn create_locals(&self, args: Vec<Value>) -> RuntimeResult<Vec<Value>> {
        if args.len() != self.param_count {
            return Err(RuntimeFailure::internal(
                &self.name,
                format!("expected {} arguments, got {}", self.param_count, args.len()),
            ));
        }
        let mut locals = args;
        locals.extend(self.slots[self.param_count..].iter().map(|slot| match &slot.ty {
            Some(ty) => Value::default_for(ty),
            None => Value::Null,
        }));
        Ok(locals)
    }

    /// Frame that starts at the top of the function
    pub fn start_frame(&self, locals: Vec<Value>) -> Frame {
        Frame::at_start(self.function, locals)
    }

    /// Frame that resumes at `label`
    pub fn resume_frame(&self, locals: Vec<Value>, label: LabelId) -> Frame {
        Frame::at_label(self.function, locals, label)
    }

    /// Read a named slot of a frame
    pub fn get<'f>(&self, frame: &'f Frame, name: &str) -> Option<&'f Value> {
        self.slot_of(name).and_then(|slot| frame.locals.get(slot as usize))
    }

    /// Overwrite a named slot of a frame; false if the name is unknown
    pub fn set(&self, frame: &mut Frame, name: &str, value: Value) -> bool {
        match self.slot_of(name).and_then(|slot| frame.locals.get_mut(slot as usize)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}
