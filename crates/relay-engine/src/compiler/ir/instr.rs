//! Lowered Instructions
//!
//! A lowered body is a flat instruction list. Control transfers between
//! suspension points are explicit: a [`Instr::Yield`] followed by
//! [`Instr::Exit`] leaves the call, and a [`Instr::Label`] marks where a
//! saved frame resumes. Non-suspending computation is expressed as
//! [`Operand`] trees that evaluate atomically.

use crate::ast::{BinaryOp, CaseEvent, EventId, FunctionId, MachineTypeId, Qualifier, StateId, Type, UnaryOp};
use std::fmt;
use std::rc::Rc;

/// Resumption point of a function; 0 is the implicit function start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LabelId(pub u32);

impl LabelId {
    /// Function start
    pub const ENTRY: LabelId = LabelId(0);

    /// Whether this is the function start
    pub fn is_entry(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Internal jump target that is never resumed into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkId(pub u32);

impl fmt::Display for MarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// Destination of a jump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// A resumption label
    Label(LabelId),
    /// A local mark
    Mark(MarkId),
}

/// Compile-time constants
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    /// Null sentinel
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Declared event
    Event(EventId),
    /// `halt` event
    Halt,
}

/// Container flavour chosen from the checker's type annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// Integer-indexed sequence
    Seq,
    /// Key-indexed map
    Map,
}

/// An aliasable storage location (write context)
#[derive(Debug, Clone, PartialEq)]
pub enum Place {
    /// Frame slot
    Local(u32),
    /// Actor field
    Field(u32),
    /// The actor's current trigger event
    Trigger,
    /// The actor's current payload
    Payload,
    /// Field of a tuple stored at `base`
    TupleField {
        /// Tuple location
        base: Box<Place>,
        /// Field index
        index: u32,
    },
    /// Element of a seq or map stored at `base`
    Element {
        /// Container location
        base: Box<Place>,
        /// Index or key
        key: Box<Operand>,
        /// Container flavour
        container: ContainerKind,
    },
}

/// Part of a container addressed by an in-place mutation
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Tuple field
    Field(u32),
    /// Seq index or map key
    Element {
        /// Index or key
        key: Operand,
        /// Container flavour
        container: ContainerKind,
    },
}

/// A call argument and how it is handed over
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    /// Argument value
    pub value: Operand,
    /// Transfer mode
    pub qualifier: Qualifier,
}

/// A non-suspending expression (read context)
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Constant
    Const(Constant),
    /// The running actor's handle
    This,
    /// Alias of the value held at a place
    Load(Place),
    /// Independent copy of a value
    Clone(Box<Operand>),
    /// Unary operator
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        arg: Box<Operand>,
    },
    /// Binary operator, dispatched on runtime value kind
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Box<Operand>,
        /// Right operand
        rhs: Box<Operand>,
    },
    /// Seq or map element, aliased
    Lookup {
        /// Container
        base: Box<Operand>,
        /// Index or key
        key: Box<Operand>,
        /// Container flavour
        container: ContainerKind,
    },
    /// Tuple field, aliased
    TupleField {
        /// Tuple
        base: Box<Operand>,
        /// Field index
        index: u32,
    },
    /// Positional tuple construction
    Tuple(Vec<Operand>),
    /// Named tuple construction
    NamedTuple {
        /// Field names
        names: Rc<[String]>,
        /// Field values
        values: Vec<Operand>,
    },
    /// Default value of a type
    Default(Type),
    /// Checked cast
    Cast {
        /// Value
        value: Box<Operand>,
        /// Target type
        ty: Type,
    },
    /// Call run to completion
    Call {
        /// Callee
        callee: FunctionId,
        /// Arguments
        args: Vec<Argument>,
    },
    /// Boolean stored by the matching [`Instr::RecordChoice`]
    NondetChoice(u32),
}

impl Operand {
    /// Null constant
    pub fn null() -> Self {
        Operand::Const(Constant::Null)
    }

    /// Deep copy of this operand's value, without stacking copies
    pub fn cloned(self) -> Self {
        match self {
            already @ Operand::Clone(_) => already,
            scalar @ (Operand::Const(_) | Operand::This | Operand::NondetChoice(_)) => scalar,
            other => Operand::Clone(Box::new(other)),
        }
    }

    /// Apply a transfer qualifier to a source value
    pub fn transferred(self, qualifier: Qualifier) -> Self {
        match qualifier {
            Qualifier::Move => self,
            Qualifier::None | Qualifier::Swap => self.cloned(),
        }
    }
}

/// One arm of a receive dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiveArm {
    /// Accepted event
    pub event: CaseEvent,
    /// Handler function
    pub handler: FunctionId,
    /// Label in front of the handler invocation
    pub entry: LabelId,
}

/// What a yield asks the scheduler for
#[derive(Debug, Clone, PartialEq)]
pub enum YieldRequest {
    /// Transition to the stored goto destination
    Goto,
    /// Handle the stored trigger
    Raise,
    /// Fairness checkpoint after an enqueue
    Send {
        /// Landing label
        resume: LabelId,
    },
    /// Wait for an event in the wait-set
    Receive {
        /// Landing label
        resume: LabelId,
    },
    /// Spawn a machine
    New {
        /// Machine type
        machine: MachineTypeId,
        /// Constructor payload
        payload: Operand,
        /// Landing label
        resume: LabelId,
    },
    /// Pick a boolean
    Nondet {
        /// Landing label
        resume: LabelId,
    },
    /// Pop the current state
    Pop,
    /// Return without a value
    Return,
    /// Return a value
    ReturnValue(Operand),
}

impl YieldRequest {
    /// Landing label, for requests that resume this call
    pub fn resume_label(&self) -> Option<LabelId> {
        match self {
            YieldRequest::Send { resume }
            | YieldRequest::Receive { resume }
            | YieldRequest::New { resume, .. }
            | YieldRequest::Nondet { resume } => Some(*resume),
            _ => None,
        }
    }

    /// Short name for dumps and logs
    pub fn name(&self) -> &'static str {
        match self {
            YieldRequest::Goto => "goto",
            YieldRequest::Raise => "raise",
            YieldRequest::Send { .. } => "send",
            YieldRequest::Receive { .. } => "receive",
            YieldRequest::New { .. } => "new",
            YieldRequest::Nondet { .. } => "nondet",
            YieldRequest::Pop => "pop",
            YieldRequest::Return => "return",
            YieldRequest::ReturnValue(_) => "return-value",
        }
    }
}

/// Lowered instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    /// Resumption landing point
    Label(LabelId),
    /// Local jump target
    Mark(MarkId),
    /// Unconditional jump
    Jump(Target),
    /// Jump when the condition is false
    JumpIfFalse {
        /// Condition
        cond: Operand,
        /// Destination
        target: Target,
    },
    /// `dest = value`
    Assign {
        /// Destination
        dest: Place,
        /// Source
        value: Operand,
    },
    /// Exchange two places
    Swap {
        /// Destination
        dest: Place,
        /// Source
        source: Place,
    },
    /// Overwrite part of a container in place
    Update {
        /// Container location
        container: Place,
        /// Updated part
        selector: Selector,
        /// New value
        value: Operand,
    },
    /// Store `source` into part of a container and move the old part into `source`
    Exchange {
        /// Container location
        container: Place,
        /// Updated part
        selector: Selector,
        /// Source location
        source: Place,
    },
    /// Remove a seq index or map key
    Remove {
        /// Container location
        container: Place,
        /// Container flavour
        kind: ContainerKind,
        /// Index or key
        key: Operand,
    },
    /// Insert an `(index or key, value)` entry
    Insert {
        /// Container location
        container: Place,
        /// Container flavour
        kind: ContainerKind,
        /// Two-field entry tuple
        entry: Operand,
    },
    /// Fail the actor with `message` unless `cond` holds
    Assert {
        /// Condition
        cond: Operand,
        /// Located message
        message: String,
    },
    /// Formatted output
    Print {
        /// Format with `{i}` placeholders
        format: String,
        /// Placeholder values
        args: Vec<Operand>,
    },
    /// Broadcast to observers
    Announce {
        /// Event
        event: Operand,
        /// Payload
        payload: Operand,
    },
    /// Put an event into a target mailbox
    Enqueue {
        /// Target actor
        target: Operand,
        /// Event
        event: Operand,
        /// Payload
        payload: Operand,
    },
    /// Record the goto destination on the actor
    SetGotoTarget(StateId),
    /// Add an event to the actor's wait-set
    RegisterReceive(CaseEvent),
    /// Jump to the arm whose event equals the current trigger
    DispatchReceive(Vec<ReceiveArm>),
    /// Push a fresh callee frame built from arguments
    PushFrame {
        /// Callee
        callee: FunctionId,
        /// Arguments
        args: Vec<Argument>,
    },
    /// Run the callee's entry routine on the frame at the top of the stack
    Invoke {
        /// Callee
        callee: FunctionId,
    },
    /// If the last invocation suspended, save this frame at `resume` and leave
    PropagateSuspension {
        /// Callee that suspended
        callee: FunctionId,
        /// Landing label in front of the invocation
        resume: LabelId,
    },
    /// Store the last invocation's returned value
    CollectReturn {
        /// Destination
        dest: Place,
    },
    /// Copy a slot of the last invocation's final locals back into a place
    WriteBack {
        /// Destination
        dest: Place,
        /// Callee slot
        slot: u32,
    },
    /// Store the instance created by the preceding `new` yield
    ReadCreated {
        /// Destination
        dest: Place,
    },
    /// Store the boolean chosen at the preceding nondet yield as choice `n`
    RecordChoice(u32),
    /// Hand a request to the scheduler, saving the frame when it resumes here
    Yield(YieldRequest),
    /// Leave the call with the pending continuation
    Exit,
}

impl Instr {
    /// Whether this instruction can transfer control out of the call
    pub fn leaves_call(&self) -> bool {
        matches!(self, Instr::Exit | Instr::PropagateSuspension { .. })
    }
}
