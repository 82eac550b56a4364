//! Lowered Function Representation

use super::instr::{Instr, LabelId, MarkId, Target};
use crate::ast::{EventDecl, FunctionId, MachineDecl, MachineTypeId};
use crate::compiler::frame_type::FrameType;
use rustc_hash::FxHashMap;

/// Label-indexed switch at the top of a resumable function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSwitch {
    /// `targets[n - 1]` is the instruction index of label `n`
    pub targets: Vec<usize>,
}

impl DispatchSwitch {
    /// Instruction index to resume at for `label`
    pub fn target(&self, label: LabelId) -> Option<usize> {
        label
            .0
            .checked_sub(1)
            .and_then(|i| self.targets.get(i as usize))
            .copied()
    }
}

/// A function lowered to its resumable entry routine
#[derive(Debug, Clone)]
pub struct LoweredFunction {
    /// Function id
    pub id: FunctionId,
    /// Display name
    pub name: String,
    /// Owning machine type; `None` for free functions
    pub owner: Option<MachineTypeId>,
    /// Saved-activation type
    pub frame_type: FrameType,
    /// Number of labels issued
    pub label_count: u32,
    /// Resume switch; absent when no labels were issued
    pub dispatch: Option<DispatchSwitch>,
    /// Lowered body, ending with the implicit return
    pub body: Vec<Instr>,
    /// Instruction index of every mark
    pub(crate) marks: FxHashMap<MarkId, usize>,
}

impl LoweredFunction {
    /// Instruction index of a jump target
    pub fn position(&self, target: Target) -> Option<usize> {
        match target {
            Target::Label(label) => self.dispatch.as_ref().and_then(|d| d.target(label)),
            Target::Mark(mark) => self.marks.get(&mark).copied(),
        }
    }

    /// Whether the function has any suspension point
    pub fn is_resumable(&self) -> bool {
        self.label_count > 0
    }

    /// Labels in the order they appear in the body
    pub fn labels_in_body(&self) -> Vec<LabelId> {
        self.body
            .iter()
            .filter_map(|instr| match instr {
                Instr::Label(label) => Some(*label),
                _ => None,
            })
            .collect()
    }
}

/// Every lowered function plus the declarations the runtime needs
#[derive(Debug, Clone, Default)]
pub struct LoweredProgram {
    /// Source file name
    pub file: String,
    /// Lowered functions, indexed by [`FunctionId`]
    pub functions: Vec<LoweredFunction>,
    /// Machine types
    pub machines: Vec<MachineDecl>,
    /// Events
    pub events: Vec<EventDecl>,
}

impl LoweredProgram {
    /// Look up a lowered function
    pub fn function(&self, id: FunctionId) -> Option<&LoweredFunction> {
        self.functions.get(id.index())
    }

    /// Look up a lowered function by name
    pub fn function_by_name(&self, name: &str) -> Option<&LoweredFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Look up a machine type
    pub fn machine(&self, id: MachineTypeId) -> Option<&MachineDecl> {
        self.machines.get(id.index())
    }

    /// Total labels issued across the program
    pub fn label_count(&self) -> u32 {
        self.functions.iter().map(|f| f.label_count).sum()
    }
}
