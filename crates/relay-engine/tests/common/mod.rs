//! Shared fixtures: an AST builder and a deterministic in-test scheduler

#![allow(dead_code)]

use relay_engine::ast::{
    BinaryOp, CaseEvent, EventDecl, EventId, FieldSel, FunctionId, FunctionInfo, Literal, MachineDecl, MachineTypeId,
    Node, NodeId, NodeKind, Program, Qualifier, ReceiveCase, Span, StateId, Type, UnaryOp, VarDecl, VarRef,
};
use relay_engine::vm::{Actor, Continuation, Interpreter, MachineId, RuntimeResult, SchedulerHooks, Value, YieldReason};
use relay_engine::{lower_program, LowerOptions, LoweredProgram};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

// ============================================================================
// AST builder
// ============================================================================

/// Builds one function body, numbering nodes and recording their types
pub struct Body {
    next_id: u32,
    line: u32,
    types: FxHashMap<NodeId, Type>,
}

impl Body {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            line: 1,
            types: FxHashMap::default(),
        }
    }

    pub fn node(&mut self, kind: NodeKind) -> Node {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        Node::new(id, Span::new(self.line, 5), kind)
    }

    pub fn typed(&mut self, kind: NodeKind, ty: Type) -> Node {
        let node = self.node(kind);
        self.types.insert(node.id, ty);
        node
    }

    /// Statements built after this call report `line`
    pub fn at_line(&mut self, line: u32) -> &mut Self {
        self.line = line;
        self
    }

    pub fn local(&mut self, slot: u32) -> Node {
        self.node(NodeKind::Name(VarRef::Local(slot)))
    }

    pub fn typed_local(&mut self, slot: u32, ty: Type) -> Node {
        self.typed(NodeKind::Name(VarRef::Local(slot)), ty)
    }

    pub fn field(&mut self, index: u32) -> Node {
        self.node(NodeKind::Name(VarRef::Field(index)))
    }

    pub fn event(&mut self, id: u32) -> Node {
        self.node(NodeKind::Name(VarRef::Event(EventId(id))))
    }

    pub fn int(&mut self, value: i64) -> Node {
        self.node(NodeKind::Lit(Literal::Int(value)))
    }

    pub fn boolean(&mut self, value: bool) -> Node {
        self.node(NodeKind::Lit(Literal::Bool(value)))
    }

    pub fn null(&mut self) -> Node {
        self.node(NodeKind::Lit(Literal::Null))
    }

    pub fn this(&mut self) -> Node {
        self.node(NodeKind::Lit(Literal::This))
    }

    pub fn nondet(&mut self) -> Node {
        self.node(NodeKind::Nondet { fair: false })
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: Node, rhs: Node) -> Node {
        self.node(NodeKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    /// `base[key]`; `base` must carry a seq or map type
    pub fn index(&mut self, base: Node, key: Node) -> Node {
        self.binary(BinaryOp::Index, base, key)
    }

    pub fn tuple_field(&mut self, base: Node, index: u32) -> Node {
        self.node(NodeKind::Field {
            base: Box::new(base),
            field: FieldSel::Index(index),
        })
    }

    pub fn named_field(&mut self, base: Node, name: &str) -> Node {
        self.node(NodeKind::Field {
            base: Box::new(base),
            field: FieldSel::Name(name.to_string()),
        })
    }

    /// Right-recursive argument list
    pub fn list(&mut self, items: Vec<(Qualifier, Node)>) -> Option<Box<Node>> {
        let mut tail = None;
        for (qualifier, head) in items.into_iter().rev() {
            tail = Some(Box::new(self.node(NodeKind::Exprs {
                qualifier,
                head: Box::new(head),
                tail,
            })));
        }
        tail
    }

    /// List where every element is passed with no qualifier
    pub fn args(&mut self, items: Vec<Node>) -> Option<Box<Node>> {
        self.list(items.into_iter().map(|node| (Qualifier::None, node)).collect())
    }

    pub fn tuple(&mut self, items: Vec<Node>) -> Node {
        let list = self.args(items).expect("tuple needs at least one element");
        self.node(NodeKind::Tuple(list))
    }

    pub fn assign(&mut self, lhs: Node, rhs: Node) -> Node {
        self.assign_with(lhs, rhs, Qualifier::None)
    }

    pub fn assign_with(&mut self, lhs: Node, rhs: Node, qualifier: Qualifier) -> Node {
        self.node(NodeKind::Assign {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            qualifier,
        })
    }

    pub fn insert(&mut self, target: Node, key: Node, value: Node) -> Node {
        let entry = self.tuple(vec![key, value]);
        self.node(NodeKind::Insert {
            target: Box::new(target),
            entry: Box::new(entry),
        })
    }

    pub fn remove(&mut self, target: Node, key: Node) -> Node {
        self.node(NodeKind::Remove {
            target: Box::new(target),
            key: Box::new(key),
        })
    }

    pub fn unary(&mut self, op: UnaryOp, arg: Node) -> Node {
        self.node(NodeKind::Unary { op, arg: Box::new(arg) })
    }

    pub fn announce(&mut self, event: Node, payload: Vec<Node>) -> Node {
        let args = self.args(payload);
        self.node(NodeKind::Announce {
            event: Box::new(event),
            args,
        })
    }

    pub fn send(&mut self, target: Node, event: Node, payload: Vec<Node>) -> Node {
        let args = self.args(payload);
        self.node(NodeKind::Send {
            target: Box::new(target),
            event: Box::new(event),
            args,
        })
    }

    pub fn raise(&mut self, event: Node) -> Node {
        self.node(NodeKind::Raise {
            event: Box::new(event),
            args: None,
        })
    }

    pub fn goto(&mut self, state: u32) -> Node {
        self.node(NodeKind::Goto {
            state: StateId(state),
            args: None,
        })
    }

    pub fn receive(&mut self, cases: Vec<(CaseEvent, u32)>) -> Node {
        self.node(NodeKind::Receive(
            cases
                .into_iter()
                .map(|(event, handler)| ReceiveCase {
                    event,
                    handler: FunctionId(handler),
                })
                .collect(),
        ))
    }

    pub fn call(&mut self, callee: u32, args: Vec<(Qualifier, Node)>, out: Option<Node>) -> Node {
        let args = self.list(args);
        self.node(NodeKind::Call {
            callee: FunctionId(callee),
            args,
            out: out.map(Box::new),
        })
    }

    pub fn app(&mut self, callee: u32, args: Vec<Node>) -> Node {
        let args = self.args(args);
        self.node(NodeKind::App {
            callee: FunctionId(callee),
            args,
        })
    }

    pub fn new_machine(&mut self, machine: u32, payload: Vec<Node>, out: Option<Node>) -> Node {
        let args = self.args(payload);
        self.node(NodeKind::New {
            machine: MachineTypeId(machine),
            args,
            out: out.map(Box::new),
        })
    }

    pub fn print(&mut self, format: &str, args: Vec<Node>) -> Node {
        let args = self.args(args);
        self.node(NodeKind::Print {
            format: format.to_string(),
            args,
        })
    }

    pub fn assert(&mut self, cond: Node, message: Option<&str>) -> Node {
        self.node(NodeKind::Assert {
            cond: Box::new(cond),
            message: message.map(str::to_string),
        })
    }

    pub fn ret(&mut self, value: Option<Node>) -> Node {
        self.node(NodeKind::Return(value.map(Box::new)))
    }

    pub fn while_loop(&mut self, cond: Node, body: Vec<Node>) -> Node {
        let body = self.block(body);
        self.node(NodeKind::While {
            cond: Box::new(cond),
            body: Box::new(body),
        })
    }

    pub fn if_else(&mut self, cond: Node, then_branch: Vec<Node>, else_branch: Option<Vec<Node>>) -> Node {
        let then_branch = self.block(then_branch);
        let else_branch = else_branch.map(|stmts| Box::new(self.block(stmts)));
        self.node(NodeKind::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch,
        })
    }

    pub fn block(&mut self, stmts: Vec<Node>) -> Node {
        self.node(NodeKind::Block(stmts))
    }

    /// Finish as a function; `max_num_locals` covers params and locals exactly
    pub fn finish(self, name: &str, params: Vec<VarDecl>, locals: Vec<VarDecl>, body: Node) -> FunctionInfo {
        let max_num_locals = (params.len() + locals.len()) as u32;
        FunctionInfo {
            name: name.to_string(),
            params,
            locals,
            return_type: None,
            max_num_locals,
            owner: None,
            types: self.types,
            body,
        }
    }
}

pub fn var(name: &str, slot: u32, ty: Type) -> VarDecl {
    VarDecl::new(name, slot, ty)
}

pub fn seq_of(ty: Type) -> Type {
    Type::Seq(Box::new(ty))
}

/// Program with one machine per entry of `machines` and events `E0..En`
pub fn program(functions: Vec<FunctionInfo>, machines: Vec<MachineDecl>, events: usize) -> Program {
    Program {
        file: "test.p".to_string(),
        functions,
        machines,
        events: (0..events).map(|i| EventDecl { name: format!("E{}", i) }).collect(),
    }
}

pub fn machine(name: &str, fields: Vec<VarDecl>) -> MachineDecl {
    MachineDecl {
        name: name.to_string(),
        fields,
        states: vec!["Init".to_string(), "Done".to_string()],
    }
}

pub fn lower(program: &Program) -> LoweredProgram {
    lower_program(program, &LowerOptions::default()).expect("lowering failed")
}

// ============================================================================
// Scheduler
// ============================================================================

/// Side-effect sink shared by every actor
#[derive(Debug, Default)]
pub struct Bus {
    pub mailboxes: Vec<VecDeque<(Value, Value)>>,
    pub printed: Vec<String>,
    pub announced: Vec<(Value, Value)>,
}

impl SchedulerHooks for Bus {
    fn enqueue(&mut self, _sender: MachineId, target: MachineId, event: Value, payload: Value) -> RuntimeResult<()> {
        self.mailboxes[target.0 as usize].push_back((event, payload));
        Ok(())
    }

    fn announce(&mut self, _sender: MachineId, event: Value, payload: Value) -> RuntimeResult<()> {
        self.announced.push((event, payload));
        Ok(())
    }

    fn print(&mut self, _sender: MachineId, message: &str) {
        self.printed.push(message.to_string());
    }
}

/// Deterministic single-threaded scheduler over lowered code
pub struct World<'p> {
    pub program: &'p LoweredProgram,
    pub actors: Vec<Actor>,
    pub bus: Bus,
    /// Answers for nondet yields, consumed front to back
    pub choices: VecDeque<bool>,
    /// Every continuation returned by an invocation, in order
    pub trace: Vec<Continuation>,
}

impl<'p> World<'p> {
    pub fn new(program: &'p LoweredProgram) -> Self {
        Self {
            program,
            actors: Vec::new(),
            bus: Bus::default(),
            choices: VecDeque::new(),
            trace: Vec::new(),
        }
    }

    pub fn spawn(&mut self, machine: u32) -> MachineId {
        let id = MachineId(self.actors.len() as u32);
        let decl = self.program.machine(MachineTypeId(machine)).expect("unknown machine");
        self.actors.push(Actor::new(id, MachineTypeId(machine), decl));
        self.bus.mailboxes.push(VecDeque::new());
        id
    }

    pub fn actor(&self, id: MachineId) -> &Actor {
        &self.actors[id.0 as usize]
    }

    pub fn actor_mut(&mut self, id: MachineId) -> &mut Actor {
        &mut self.actors[id.0 as usize]
    }

    /// Run the frame on top of the actor's stack once
    pub fn step(&mut self, id: MachineId) -> RuntimeResult<Continuation> {
        let actor = &mut self.actors[id.0 as usize];
        let function = actor.top_frame().expect("nothing to run").function;
        let continuation = Interpreter::new(self.program).execute(function, &mut self.bus, actor)?;
        self.trace.push(continuation.clone());
        Ok(continuation)
    }

    /// Start `function` on the actor and run it once
    pub fn invoke(&mut self, id: MachineId, function: u32, args: Vec<Value>) -> RuntimeResult<Continuation> {
        let program = self.program;
        self.actor_mut(id).start_call(program, FunctionId(function), args)?;
        self.step(id)
    }

    /// Take the first queued event the actor's wait-set accepts
    pub fn deliver(&mut self, id: MachineId) -> bool {
        let actor = &mut self.actors[id.0 as usize];
        let mailbox = &mut self.bus.mailboxes[id.0 as usize];
        let Some(position) = mailbox.iter().position(|(event, _)| actor.accepts(event)) else {
            return false;
        };
        let (event, payload) = mailbox.remove(position).expect("position is in range");
        actor.deliver(event, payload);
        true
    }

    /// Keep resuming until the actor completes, blocks on a receive, or makes a transition
    pub fn drive(&mut self, id: MachineId, mut continuation: Continuation) -> RuntimeResult<Continuation> {
        loop {
            match &continuation {
                Continuation::Completed { .. } => return Ok(continuation),
                Continuation::Suspended(YieldReason::Send) => {}
                Continuation::Suspended(YieldReason::Nondet) => {
                    let choice = self.choices.pop_front().expect("no nondet choice scripted");
                    self.actor_mut(id).resume.nondet = Some(choice);
                }
                Continuation::Suspended(YieldReason::New { machine, .. }) => {
                    let created = self.spawn(machine.0);
                    self.actor_mut(id).resume.created = Some(created);
                }
                Continuation::Suspended(YieldReason::Receive) => {
                    if !self.deliver(id) {
                        return Ok(continuation);
                    }
                }
                Continuation::Suspended(reason) if reason.is_terminal() => {
                    self.actor_mut(id).clear_stack();
                    return Ok(continuation);
                }
                Continuation::Suspended(_) => unreachable!(),
            }
            continuation = self.step(id)?;
        }
    }

    pub fn run(&mut self, id: MachineId, function: u32, args: Vec<Value>) -> RuntimeResult<Continuation> {
        let first = self.invoke(id, function, args)?;
        self.drive(id, first)
    }
}

pub fn completed_value(continuation: &Continuation) -> Option<Value> {
    match continuation {
        Continuation::Completed { value, .. } => value.clone(),
        Continuation::Suspended(reason) => panic!("expected completion, got {}", reason.name()),
    }
}

pub fn ints(values: &[i64]) -> Value {
    Value::seq(values.iter().map(|v| Value::Int(*v)).collect())
}
