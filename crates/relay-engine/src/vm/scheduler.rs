//! Scheduler contract
//!
//! The scheduler owns every actor and its call stack and decides global
//! interleaving. Entry routines talk to it in two directions: synchronous
//! hooks for side effects that must not wait ([`SchedulerHooks`]), and a
//! [`Continuation`] returned from every invocation that says whether the
//! call finished or which yield it stopped at.

use super::error::RuntimeResult;
use super::value::{MachineId, Value};
use crate::ast::MachineTypeId;

/// Why an invocation handed control back
#[derive(Debug, Clone, PartialEq)]
pub enum YieldReason {
    /// Transition to the actor's goto destination
    Goto,
    /// Handle the actor's trigger
    Raise,
    /// Fairness checkpoint; the event is already in the target mailbox
    Send,
    /// Wait for one of the events in the actor's wait-set
    Receive,
    /// Create an instance, then resume with it in [`ResumeInput::created`]
    New {
        /// Machine type to instantiate
        machine: MachineTypeId,
        /// Constructor payload
        payload: Value,
    },
    /// Choose a boolean, then resume with it in [`ResumeInput::nondet`]
    Nondet,
    /// Pop the actor's current state
    Pop,
}

impl YieldReason {
    /// Name for logs
    pub fn name(&self) -> &'static str {
        match self {
            YieldReason::Goto => "goto",
            YieldReason::Raise => "raise",
            YieldReason::Send => "send",
            YieldReason::Receive => "receive",
            YieldReason::New { .. } => "new",
            YieldReason::Nondet => "nondet",
            YieldReason::Pop => "pop",
        }
    }

    /// Whether no frame was saved, so the user-level operation cannot resume
    pub fn is_terminal(&self) -> bool {
        matches!(self, YieldReason::Goto | YieldReason::Raise | YieldReason::Pop)
    }
}

/// Outcome of one entry-routine invocation
#[derive(Debug, Clone, PartialEq)]
pub enum Continuation {
    /// The function returned
    Completed {
        /// Returned value, if any
        value: Option<Value>,
        /// Final locals, used for swap write-back
        locals: Vec<Value>,
    },
    /// The function yielded; resumable frames are on the actor's call stack
    Suspended(YieldReason),
}

impl Continuation {
    /// Whether the call returned
    pub fn is_completed(&self) -> bool {
        matches!(self, Continuation::Completed { .. })
    }

    /// Yield reason, if suspended
    pub fn reason(&self) -> Option<&YieldReason> {
        match self {
            Continuation::Suspended(reason) => Some(reason),
            Continuation::Completed { .. } => None,
        }
    }
}

/// Values the scheduler hands to a resumed actor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResumeInput {
    /// Boolean chosen for the last nondet yield
    pub nondet: Option<bool>,
    /// Instance created for the last new yield
    pub created: Option<MachineId>,
}

/// Synchronous side effects an entry routine needs from the scheduler
pub trait SchedulerHooks {
    /// Put `(event, payload)` into `target`'s mailbox right now
    fn enqueue(&mut self, sender: MachineId, target: MachineId, event: Value, payload: Value) -> RuntimeResult<()>;

    /// Broadcast `(event, payload)` to observers
    fn announce(&mut self, sender: MachineId, event: Value, payload: Value) -> RuntimeResult<()> {
        tracing::trace!(machine = sender.0, %event, %payload, "announce");
        Ok(())
    }

    /// Emit program output
    fn print(&mut self, sender: MachineId, message: &str) {
        tracing::info!(machine = sender.0, "{}", message);
    }
}
