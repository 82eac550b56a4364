//! Input AST
//!
//! The typed, already-validated tree the front end hands to lowering. Every
//! reference in here is resolved: locals are slot indices, actor fields are
//! field indices, and functions, machines, events and states are interned
//! ids into the owning [`Program`].
//!
//! Statement and expression forms share one closed [`NodeKind`] so the tree
//! walker can drive them uniformly.

mod program;
mod types;

pub use program::{
    EventDecl, EventId, FunctionId, FunctionInfo, MachineDecl, MachineTypeId, NodeId, Program,
    StateId, VarDecl,
};
pub use types::Type;

use serde::{Deserialize, Serialize};

/// Source position of a node, used for located diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

impl Span {
    /// Create a span
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A node of a function body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Key into the function's type table
    pub id: NodeId,
    /// Source position
    #[serde(default)]
    pub span: Span,
    /// What this node is
    pub kind: NodeKind,
}

impl Node {
    /// Create a node
    pub fn new(id: NodeId, span: Span, kind: NodeKind) -> Self {
        Self { id, span, kind }
    }
}

/// Assignment and argument transfer mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Qualifier {
    /// Deep-clone the source
    #[default]
    None,
    /// Hand the source over without cloning
    Move,
    /// Exchange source and destination
    Swap,
}

/// A resolved name reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VarRef {
    /// Slot in the current frame
    Local(u32),
    /// Field of the owning actor
    Field(u32),
    /// Event constant
    Event(EventId),
    /// Enum constant, already folded to its numeric value
    EnumConst(i64),
}

/// Literal values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Integer literal
    Int(i64),
    /// Boolean literal
    Bool(bool),
    /// The null sentinel (also the null event)
    Null,
    /// The built-in `halt` event
    Halt,
    /// The running actor
    This,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Boolean negation
    Not,
    /// Integer negation
    Neg,
    /// Key sequence of a map
    Keys,
    /// Value sequence of a map
    Values,
    /// Element count of a seq or map
    Sizeof,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// Integer `/`
    IntDiv,
    /// `&&`
    And,
    /// `||`
    Or,
    /// Structural `==`
    Eq,
    /// Structural `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `a[b]`
    Index,
    /// Map key membership
    In,
}

/// Tuple field selector as written in source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldSel {
    /// Positional field `t.0`
    Index(u32),
    /// Named field `t.name`, resolved through the base's type
    Name(String),
}

/// Event accepted by one receive case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseEvent {
    /// A declared event
    Event(EventId),
    /// The null event
    Null,
    /// The `halt` event
    Halt,
}

/// One `case E: handler` arm of a receive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiveCase {
    /// Accepted event
    pub event: CaseEvent,
    /// Anonymous handler function; its single parameter receives the payload
    pub handler: FunctionId,
}

/// Closed set of statement and expression forms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    // ---- expressions ----
    /// Resolved name reference
    Name(VarRef),
    /// Literal constant
    Lit(Literal),
    /// Nondeterministic boolean choice (`$`, or fair `$$`)
    Nondet {
        /// Fair choice
        fair: bool,
    },
    /// Unary operator application
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        arg: Box<Node>,
    },
    /// Binary operator application
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Box<Node>,
        /// Right operand
        rhs: Box<Node>,
    },
    /// Tuple field access
    Field {
        /// Tuple expression
        base: Box<Node>,
        /// Selected field
        field: FieldSel,
    },
    /// Positional tuple construction over an `Exprs` list
    Tuple(Box<Node>),
    /// Named tuple construction over a `NamedExprs` list
    NamedTuple(Box<Node>),
    /// Default value of a type
    Default(Type),
    /// Dynamic cast
    Cast {
        /// Value being cast
        expr: Box<Node>,
        /// Target type
        ty: Type,
    },
    /// Expression-position call, runs the callee to completion
    App {
        /// Callee
        callee: FunctionId,
        /// `Exprs` argument list
        args: Option<Box<Node>>,
    },
    /// Right-recursive list cell with a per-element qualifier
    Exprs {
        /// Transfer mode of `head`
        qualifier: Qualifier,
        /// Element
        head: Box<Node>,
        /// Remaining elements
        tail: Option<Box<Node>>,
    },
    /// Right-recursive named list cell
    NamedExprs {
        /// Field name of `head`
        name: String,
        /// Element
        head: Box<Node>,
        /// Remaining elements
        tail: Option<Box<Node>>,
    },

    // ---- statements ----
    /// Spawn a machine
    New {
        /// Machine type
        machine: MachineTypeId,
        /// `Exprs` argument list
        args: Option<Box<Node>>,
        /// Where the created instance is stored
        out: Option<Box<Node>>,
    },
    /// Statement-position call
    Call {
        /// Callee
        callee: FunctionId,
        /// `Exprs` argument list
        args: Option<Box<Node>>,
        /// Where the returned value is stored
        out: Option<Box<Node>>,
    },
    /// State transition
    Goto {
        /// Destination state
        state: StateId,
        /// `Exprs` payload list
        args: Option<Box<Node>>,
    },
    /// Raise an event on the running actor
    Raise {
        /// Event expression
        event: Box<Node>,
        /// `Exprs` payload list
        args: Option<Box<Node>>,
    },
    /// Send an event to another actor
    Send {
        /// Target actor
        target: Box<Node>,
        /// Event expression
        event: Box<Node>,
        /// `Exprs` payload list
        args: Option<Box<Node>>,
    },
    /// Broadcast an event to observers without suspending
    Announce {
        /// Event expression
        event: Box<Node>,
        /// `Exprs` payload list
        args: Option<Box<Node>>,
    },
    /// Block until one of the case events arrives
    Receive(Vec<ReceiveCase>),
    /// Runtime check
    Assert {
        /// Condition
        cond: Box<Node>,
        /// User message
        message: Option<String>,
    },
    /// Formatted output with `{i}` placeholders
    Print {
        /// Format string
        format: String,
        /// `Exprs` argument list
        args: Option<Box<Node>>,
    },
    /// Assignment `lhs = rhs` under a qualifier
    Assign {
        /// Destination
        lhs: Box<Node>,
        /// Source
        rhs: Box<Node>,
        /// Transfer mode
        qualifier: Qualifier,
    },
    /// `target -= key`
    Remove {
        /// Seq or map being shrunk
        target: Box<Node>,
        /// Index or key
        key: Box<Node>,
    },
    /// `target += (key, value)`
    Insert {
        /// Seq or map being grown
        target: Box<Node>,
        /// Two-field tuple of index/key and value
        entry: Box<Node>,
    },
    /// Pop the current state
    Pop,
    /// Return from the function
    Return(Option<Box<Node>>),
    /// Loop
    While {
        /// Condition
        cond: Box<Node>,
        /// Body
        body: Box<Node>,
    },
    /// Conditional
    If {
        /// Condition
        cond: Box<Node>,
        /// Taken branch
        then_branch: Box<Node>,
        /// Other branch
        else_branch: Option<Box<Node>>,
    },
    /// Right-recursive statement sequence
    Seq {
        /// First statement
        first: Box<Node>,
        /// Rest
        rest: Box<Node>,
    },
    /// Braced statement list
    Block(Vec<Node>),
}
