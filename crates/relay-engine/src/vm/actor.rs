//! Actor instances
//!
//! The state an entry routine runs against: fields, the call stack of saved
//! frames, the current trigger and payload, and the registers the scheduler
//! reads after a yield.

use super::error::{RuntimeFailure, RuntimeResult};
use super::frame::Frame;
use super::scheduler::ResumeInput;
use super::value::{MachineId, Value};
use crate::ast::{CaseEvent, FunctionId, MachineDecl, MachineTypeId, StateId};
use crate::compiler::ir::LoweredProgram;

/// A running state-machine instance
#[derive(Debug)]
pub struct Actor {
    /// Instance handle
    pub id: MachineId,
    /// Machine type
    pub machine: MachineTypeId,
    /// Machine name, for logs
    pub name: String,
    /// Field values
    pub fields: Vec<Value>,
    /// Event being handled
    pub trigger: Value,
    /// Payload of the event being handled
    pub payload: Value,
    /// Destination recorded by the last goto
    pub goto_target: Option<StateId>,
    /// Events accepted by the pending receive
    pub receive_set: Vec<CaseEvent>,
    /// Values supplied by the scheduler on resume
    pub resume: ResumeInput,
    call_stack: Vec<Frame>,
}

impl Actor {
    /// Create an instance with default field values
    pub fn new(id: MachineId, machine: MachineTypeId, decl: &MachineDecl) -> Self {
        Self {
            id,
            machine,
            name: decl.name.clone(),
            fields: decl.fields.iter().map(|f| Value::default_for(&f.ty)).collect(),
            trigger: Value::Null,
            payload: Value::Null,
            goto_target: None,
            receive_set: Vec::new(),
            resume: ResumeInput::default(),
            call_stack: Vec::new(),
        }
    }

    /// Push a fresh frame for `function` built from call arguments
    pub fn start_call(&mut self, program: &LoweredProgram, function: FunctionId, args: Vec<Value>) -> RuntimeResult<()> {
        let lowered = program
            .function(function)
            .ok_or_else(|| RuntimeFailure::internal(&self.name, format!("unknown function fn#{}", function.0)))?;
        let locals = lowered.frame_type.create_locals(args)?;
        self.push_frame(lowered.frame_type.start_frame(locals));
        Ok(())
    }

    /// Push a frame
    pub fn push_frame(&mut self, frame: Frame) {
        self.call_stack.push(frame);
    }

    /// Pop the top frame
    pub fn pop_frame(&mut self) -> Option<Frame> {
        self.call_stack.pop()
    }

    /// Top frame
    pub fn top_frame(&self) -> Option<&Frame> {
        self.call_stack.last()
    }

    /// Saved frames, bottom first
    pub fn frames(&self) -> &[Frame] {
        &self.call_stack
    }

    /// Number of saved frames
    pub fn stack_depth(&self) -> usize {
        self.call_stack.len()
    }

    /// Drop every saved frame
    pub fn clear_stack(&mut self) {
        self.call_stack.clear();
    }

    /// Whether `event` is in the wait-set
    pub fn accepts(&self, event: &Value) -> bool {
        self.receive_set.iter().any(|case| case_matches(*case, event))
    }

    /// Independent copy of the whole instance, saved frames included
    ///
    /// Used to explore alternative schedules from the same point; no field,
    /// payload or local of the copy aliases the original.
    pub fn fork(&self) -> Actor {
        Actor {
            id: self.id,
            machine: self.machine,
            name: self.name.clone(),
            fields: self.fields.iter().map(Value::deep_clone).collect(),
            trigger: self.trigger.deep_clone(),
            payload: self.payload.deep_clone(),
            goto_target: self.goto_target,
            receive_set: self.receive_set.clone(),
            resume: self.resume.clone(),
            call_stack: self.call_stack.iter().map(Frame::deep_clone).collect(),
        }
    }

    /// Deliver an event for a resumed receive
    pub fn deliver(&mut self, event: Value, payload: Value) {
        self.trigger = event;
        self.payload = payload;
    }
}

/// Whether a receive case accepts a runtime event value
pub fn case_matches(case: CaseEvent, event: &Value) -> bool {
    match (case, event) {
        (CaseEvent::Event(id), Value::Event(ev)) => id == *ev,
        (CaseEvent::Null, Value::Null) => true,
        (CaseEvent::Halt, Value::Halt) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{EventId, Type, VarDecl};

    #[test]
    fn test_new_actor_defaults_fields() {
        let decl = MachineDecl {
            name: "Client".into(),
            fields: vec![VarDecl::new("count", 0, Type::Int), VarDecl::new("peer", 1, Type::Machine)],
            states: vec!["Init".into()],
        };
        let actor = Actor::new(MachineId(3), MachineTypeId(0), &decl);
        assert_eq!(actor.fields, vec![Value::Int(0), Value::Null]);
        assert_eq!(actor.stack_depth(), 0);
        assert_eq!(actor.name, "Client");
    }

    #[test]
    fn test_fork_shares_no_storage() {
        let decl = MachineDecl {
            name: "M".into(),
            fields: vec![VarDecl::new("log", 0, Type::Seq(Box::new(Type::Int)))],
            states: vec![],
        };
        let mut actor = Actor::new(MachineId(1), MachineTypeId(0), &decl);
        let local = Value::seq(vec![Value::Int(1)]);
        let mut frame = Frame::at_label(FunctionId(0), vec![local.clone()], crate::compiler::ir::LabelId(2));
        frame.choices = vec![true];
        actor.push_frame(frame);

        let copy = actor.fork();
        local.update(&Value::Int(0), Value::Int(9)).unwrap();
        actor.fields[0].insert(&Value::Int(0), Value::Int(4)).unwrap();

        assert_eq!(copy.fields[0], Value::seq(vec![]));
        let saved = copy.top_frame().unwrap();
        assert_eq!(saved.locals[0], Value::seq(vec![Value::Int(1)]));
        assert_eq!(saved.choices, vec![true]);
        assert_eq!(saved.label.0, 2);
    }

    #[test]
    fn test_wait_set_matching() {
        let decl = MachineDecl { name: "M".into(), fields: vec![], states: vec![] };
        let mut actor = Actor::new(MachineId(0), MachineTypeId(0), &decl);
        actor.receive_set = vec![CaseEvent::Event(EventId(2)), CaseEvent::Halt];
        assert!(actor.accepts(&Value::Event(EventId(2))));
        assert!(actor.accepts(&Value::Halt));
        assert!(!actor.accepts(&Value::Event(EventId(1))));
        assert!(!actor.accepts(&Value::Null));
    }
}
