//! Label and frame layout allocation
//!
//! Labels are issued per function, strictly increasing from 1; label 0 is the
//! implicit function start. The frame layout places parameters first, then
//! declared locals, then temporaries up to the slot count the prior analysis
//! fixed.

use super::error::{LowerError, LowerResult};
use super::ir::{LabelId, MarkId};
use crate::ast::{FunctionInfo, Type};

/// Per-function issuer of resumption labels and local marks
#[derive(Debug, Default)]
pub struct LabelAllocator {
    next_label: u32,
    next_mark: u32,
}

impl LabelAllocator {
    /// Create an allocator for one function
    pub fn new() -> Self {
        Self::default()
    }

    /// Next resumption label
    pub fn fresh_label(&mut self) -> LabelId {
        self.next_label += 1;
        LabelId(self.next_label)
    }

    /// Next local mark
    pub fn fresh_mark(&mut self) -> MarkId {
        self.next_mark += 1;
        MarkId(self.next_mark)
    }

    /// Number of labels issued so far
    pub fn label_count(&self) -> u32 {
        self.next_label
    }
}

/// What occupies a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// Function parameter
    Param,
    /// Declared local
    Local,
    /// Compiler temporary padding
    Temp,
}

/// One slot of a frame layout
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    /// Variable name; temporaries get `$tN`
    pub name: String,
    /// Declared type; temporaries have none
    pub ty: Option<Type>,
    /// Occupant
    pub kind: SlotKind,
}

/// Ordered slots of one function's frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameLayout {
    /// Slots in index order
    pub slots: Vec<Slot>,
    /// Number of leading parameter slots
    pub param_count: usize,
}

impl FrameLayout {
    /// Total slot count
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the frame has no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Compute the frame layout of a function
pub fn layout(info: &FunctionInfo) -> LowerResult<FrameLayout> {
    let declared = info.params.len() + info.locals.len();
    if declared > info.max_num_locals as usize {
        return Err(LowerError::LocalsMismatch {
            function: info.name.clone(),
            declared,
            max: info.max_num_locals,
        });
    }

    let mut slots = Vec::with_capacity(info.max_num_locals as usize);
    let declared_vars = info
        .params
        .iter()
        .map(|p| (p, SlotKind::Param))
        .chain(info.locals.iter().map(|l| (l, SlotKind::Local)));
    for (var, kind) in declared_vars {
        let expected = slots.len() as u32;
        if var.slot != expected {
            return Err(LowerError::SlotMismatch {
                function: info.name.clone(),
                name: var.name.clone(),
                slot: var.slot,
                expected,
            });
        }
        slots.push(Slot {
            name: var.name.clone(),
            ty: Some(var.ty.clone()),
            kind,
        });
    }

    let mut temp = 0;
    while slots.len() < info.max_num_locals as usize {
        slots.push(Slot {
            name: format!("$t{}", temp),
            ty: None,
            kind: SlotKind::Temp,
        });
        temp += 1;
    }

    Ok(FrameLayout {
        slots,
        param_count: info.params.len(),
    })
}
