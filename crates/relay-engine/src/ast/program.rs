//! Program-level declarations and interned ids

use super::{Node, Type};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// Create from a raw index
            pub fn new(index: u32) -> Self {
                Self(index)
            }

            /// Raw index
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_id!(
    /// Index into [`Program::functions`]
    FunctionId
);
define_id!(
    /// Index into [`Program::machines`]
    MachineTypeId
);
define_id!(
    /// Index into [`Program::events`]
    EventId
);
define_id!(
    /// Index into a machine's state list
    StateId
);
define_id!(
    /// Key of a node in its function's type table
    NodeId
);

/// A parameter, local, or actor field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDecl {
    /// Source name
    pub name: String,
    /// Stable slot index
    pub slot: u32,
    /// Declared type
    pub ty: Type,
}

impl VarDecl {
    /// Create a declaration
    pub fn new(name: impl Into<String>, slot: u32, ty: Type) -> Self {
        Self {
            name: name.into(),
            slot,
            ty,
        }
    }
}

/// Everything lowering needs to know about one function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionInfo {
    /// Function name (anonymous handlers get a synthesized one)
    pub name: String,
    /// Ordered parameters
    pub params: Vec<VarDecl>,
    /// Ordered declared locals
    #[serde(default)]
    pub locals: Vec<VarDecl>,
    /// Return type, if the function returns a value
    #[serde(default)]
    pub return_type: Option<Type>,
    /// Slot count including compiler temporaries
    pub max_num_locals: u32,
    /// Owning machine type; `None` for free functions
    #[serde(default)]
    pub owner: Option<MachineTypeId>,
    /// Per-subexpression types from the checker
    #[serde(default)]
    pub types: FxHashMap<NodeId, Type>,
    /// Function body
    pub body: Node,
}

impl FunctionInfo {
    /// Type annotation of a node
    pub fn type_of(&self, id: NodeId) -> Option<&Type> {
        self.types.get(&id)
    }
}

/// A machine type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineDecl {
    /// Machine name
    pub name: String,
    /// Actor fields, indexed by [`super::VarRef::Field`]
    #[serde(default)]
    pub fields: Vec<VarDecl>,
    /// State names, indexed by [`StateId`]
    #[serde(default)]
    pub states: Vec<String>,
}

/// An event declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDecl {
    /// Event name
    pub name: String,
}

/// A validated, fully resolved program
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Source file name, used as the prefix of located messages
    #[serde(default)]
    pub file: String,
    /// Functions, indexed by [`FunctionId`]
    pub functions: Vec<FunctionInfo>,
    /// Machine types, indexed by [`MachineTypeId`]
    #[serde(default)]
    pub machines: Vec<MachineDecl>,
    /// Events, indexed by [`EventId`]
    #[serde(default)]
    pub events: Vec<EventDecl>,
}

impl Program {
    /// Look up a function
    pub fn function(&self, id: FunctionId) -> Option<&FunctionInfo> {
        self.functions.get(id.index())
    }

    /// Look up a machine type
    pub fn machine(&self, id: MachineTypeId) -> Option<&MachineDecl> {
        self.machines.get(id.index())
    }

    /// Event name for diagnostics
    pub fn event_name(&self, id: EventId) -> &str {
        self.events
            .get(id.index())
            .map(|e| e.name.as_str())
            .unwrap_or("<unknown event>")
    }

    /// Find a function by name
    pub fn function_by_name(&self, name: &str) -> Option<FunctionId> {
        self.functions
            .iter()
            .position(|f| f.name == name)
            .map(|i| FunctionId(i as u32))
    }

    /// Iterate over functions with their ids
    pub fn iter_functions(&self) -> impl Iterator<Item = (FunctionId, &FunctionInfo)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (FunctionId(i as u32), f))
    }
}
