//! Entry routine interpreter
//!
//! Runs a lowered function against an actor. Each invocation pops the
//! function's frame from the actor's call stack, enters at the start or jumps
//! through the dispatch switch to the frame's label, and runs until an
//! `exit` hands back a [`Continuation`].
//!
//! Suspension never unwinds native state: a yielding routine saves its frame
//! on the actor's stack and returns. A suspended callee leaves its own frame
//! below the caller's, so re-invoking the caller re-enters the callee.

use super::actor::{case_matches, Actor};
use super::error::{RuntimeFailure, RuntimeResult};
use super::frame::Frame;
use super::ops::{eval_binary, eval_unary, format_message};
use super::scheduler::{Continuation, SchedulerHooks, YieldReason};
use super::value::{Value, ValueError};
use crate::ast::{BinaryOp, FunctionId};
use crate::compiler::ir::{
    Argument, Constant, ContainerKind, Instr, LabelId, LoweredFunction, LoweredProgram, Operand, Place, ReceiveArm,
    Selector, Target, YieldRequest,
};
use serde::{Deserialize, Serialize};

/// Runtime limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    /// Maximum nesting of synchronous calls within one actor
    pub max_call_depth: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self { max_call_depth: 1024 }
    }
}

/// State of one running invocation
struct Activation<'p> {
    function: &'p LoweredFunction,
    frame: Frame,
    pc: usize,
    /// Continuation of the most recent `invoke`
    last_call: Option<Continuation>,
    /// Continuation built by the most recent `yield`
    pending: Option<Continuation>,
}

/// Executes lowered entry routines
pub struct Interpreter<'p> {
    program: &'p LoweredProgram,
    options: RuntimeOptions,
    depth: usize,
}

impl<'p> Interpreter<'p> {
    /// Create an interpreter with default limits
    pub fn new(program: &'p LoweredProgram) -> Self {
        Self {
            program,
            options: RuntimeOptions::default(),
            depth: 0,
        }
    }

    /// Replace the runtime limits
    pub fn with_options(mut self, options: RuntimeOptions) -> Self {
        self.options = options;
        self
    }

    /// Program being executed
    pub fn program(&self) -> &'p LoweredProgram {
        self.program
    }

    /// Run `function`'s entry routine on the frame at the top of the actor's stack
    pub fn execute(
        &mut self,
        function: FunctionId,
        hooks: &mut dyn SchedulerHooks,
        actor: &mut Actor,
    ) -> RuntimeResult<Continuation> {
        let lowered = self
            .program
            .function(function)
            .ok_or_else(|| RuntimeFailure::internal(&actor.name, format!("unknown function fn#{}", function.0)))?;
        let frame = actor
            .pop_frame()
            .ok_or_else(|| RuntimeFailure::internal(&lowered.name, "call stack is empty"))?;
        if frame.function != function {
            return Err(RuntimeFailure::internal(
                &lowered.name,
                format!("top frame belongs to fn#{}", frame.function.0),
            ));
        }
        if let Some(owner) = lowered.owner {
            if owner != actor.machine {
                return Err(RuntimeFailure::internal(
                    &lowered.name,
                    format!("bound to machine#{} but run on {}", owner.0, actor.name),
                ));
            }
        }
        if frame.locals.len() != lowered.frame_type.slot_count() {
            return Err(RuntimeFailure::internal(
                &lowered.name,
                format!(
                    "frame has {} slots, layout has {}",
                    frame.locals.len(),
                    lowered.frame_type.slot_count()
                ),
            ));
        }

        // A caller resuming into a suspended call needs the callee's frame right below it.
        if let Some(callee) = frame.pending_call {
            if actor.top_frame().map(|below| below.function) != Some(callee) {
                return Err(RuntimeFailure::internal(
                    &lowered.name,
                    format!("suspended call to fn#{} has no saved frame", callee.0),
                ));
            }
        }

        let pc = if frame.label.is_entry() {
            0
        } else {
            lowered
                .dispatch
                .as_ref()
                .and_then(|dispatch| dispatch.target(frame.label))
                .ok_or_else(|| RuntimeFailure::internal(&lowered.name, format!("no landing point for {}", frame.label)))?
        };

        if self.depth >= self.options.max_call_depth {
            return Err(RuntimeFailure::CallDepthExceeded {
                limit: self.options.max_call_depth,
            });
        }
        tracing::trace!(function = %lowered.name, label = frame.label.0, machine = actor.id.0, "enter");

        self.depth += 1;
        let mut activation = Activation {
            function: lowered,
            frame,
            pc,
            last_call: None,
            pending: None,
        };
        let result = self.run(&mut activation, hooks, actor);
        self.depth -= 1;
        result
    }

    fn run(
        &mut self,
        act: &mut Activation<'p>,
        hooks: &mut dyn SchedulerHooks,
        actor: &mut Actor,
    ) -> RuntimeResult<Continuation> {
        let function = act.function;
        loop {
            let instr = function
                .body
                .get(act.pc)
                .ok_or_else(|| RuntimeFailure::internal(&function.name, "ran past the end of the body"))?;
            act.pc += 1;

            match instr {
                Instr::Label(_) | Instr::Mark(_) => {}
                Instr::Jump(target) => act.pc = position(function, *target)?,
                Instr::JumpIfFalse { cond, target } => {
                    if !self.eval(act, hooks, actor, cond)?.as_bool("condition")? {
                        act.pc = position(function, *target)?;
                    }
                }
                Instr::Assign { dest, value } => {
                    let value = self.eval(act, hooks, actor, value)?;
                    self.store(act, hooks, actor, dest, value)?;
                }
                Instr::Swap { dest, source } => {
                    let old_dest = self.load(act, hooks, actor, dest)?;
                    let old_source = self.load(act, hooks, actor, source)?;
                    self.store(act, hooks, actor, dest, old_source)?;
                    self.store(act, hooks, actor, source, old_dest)?;
                }
                Instr::Update {
                    container,
                    selector,
                    value,
                } => {
                    let value = self.eval(act, hooks, actor, value)?;
                    let container = self.load(act, hooks, actor, container)?;
                    self.replace_part(act, hooks, actor, &container, selector, value)?;
                }
                Instr::Exchange {
                    container,
                    selector,
                    source,
                } => {
                    let incoming = self.load(act, hooks, actor, source)?;
                    let container = self.load(act, hooks, actor, container)?;
                    let old = self.replace_part(act, hooks, actor, &container, selector, incoming)?;
                    self.store(act, hooks, actor, source, old)?;
                }
                Instr::Remove { container, kind, key } => {
                    let key = self.eval(act, hooks, actor, key)?;
                    let container = self.load(act, hooks, actor, container)?;
                    expect_kind(&container, *kind)?;
                    container.remove(&key)?;
                }
                Instr::Insert { container, kind, entry } => {
                    let entry = self.eval(act, hooks, actor, entry)?;
                    let container = self.load(act, hooks, actor, container)?;
                    expect_kind(&container, *kind)?;
                    container.insert(&entry.field(0)?, entry.field(1)?)?;
                }
                Instr::Assert { cond, message } => {
                    if !self.eval(act, hooks, actor, cond)?.as_bool("assert")? {
                        return Err(RuntimeFailure::AssertionFailed {
                            message: message.clone(),
                        });
                    }
                }
                Instr::Print { format, args } => {
                    let values = self.eval_all(act, hooks, actor, args)?;
                    hooks.print(actor.id, &format_message(format, &values));
                }
                Instr::Announce { event, payload } => {
                    let event = self.eval(act, hooks, actor, event)?;
                    let payload = self.eval(act, hooks, actor, payload)?;
                    hooks.announce(actor.id, event, payload)?;
                }
                Instr::Enqueue { target, event, payload } => {
                    let target = self.eval(act, hooks, actor, target)?.as_machine("send target")?;
                    let event = self.eval(act, hooks, actor, event)?;
                    if !event.is_event() {
                        return Err(ValueError::TypeMismatch {
                            op: "send",
                            expected: "event",
                            found: event.kind_name(),
                        }
                        .into());
                    }
                    let payload = self.eval(act, hooks, actor, payload)?;
                    tracing::trace!(from = actor.id.0, to = target.0, %event, %payload, "enqueue");
                    hooks.enqueue(actor.id, target, event, payload)?;
                }
                Instr::SetGotoTarget(state) => actor.goto_target = Some(*state),
                Instr::RegisterReceive(event) => {
                    if !actor.receive_set.contains(event) {
                        actor.receive_set.push(*event);
                    }
                }
                Instr::DispatchReceive(arms) => {
                    act.pc = self.dispatch_receive(function, actor, arms)?;
                }
                Instr::PushFrame { callee, args } => {
                    let values = self.eval_args(act, hooks, actor, args)?;
                    actor.start_call(self.program, *callee, values)?;
                }
                Instr::Invoke { callee } => {
                    let continuation = self.execute(*callee, hooks, actor)?;
                    act.last_call = Some(continuation);
                }
                Instr::PropagateSuspension { callee, resume } => {
                    let suspended = match &act.last_call {
                        Some(Continuation::Suspended(reason)) => Some(reason.clone()),
                        Some(Continuation::Completed { .. }) => None,
                        None => {
                            return Err(RuntimeFailure::internal(&function.name, "no invocation to inspect"));
                        }
                    };
                    if let Some(reason) = suspended {
                        save_frame(act, actor, *resume, Some(*callee));
                        tracing::trace!(function = %function.name, reason = reason.name(), "propagate suspension");
                        return Ok(Continuation::Suspended(reason));
                    }
                }
                Instr::CollectReturn { dest } => {
                    let value = match &act.last_call {
                        Some(Continuation::Completed { value, .. }) => value.clone().unwrap_or(Value::Null),
                        _ => return Err(RuntimeFailure::internal(&function.name, "no completed call to collect")),
                    };
                    self.store(act, hooks, actor, dest, value)?;
                }
                Instr::WriteBack { dest, slot } => {
                    let value = match &act.last_call {
                        Some(Continuation::Completed { locals, .. }) => locals.get(*slot as usize).cloned(),
                        _ => None,
                    }
                    .ok_or_else(|| RuntimeFailure::internal(&function.name, format!("no returned slot {}", slot)))?;
                    self.store(act, hooks, actor, dest, value)?;
                }
                Instr::ReadCreated { dest } => {
                    let created = actor
                        .resume
                        .created
                        .take()
                        .ok_or_else(|| RuntimeFailure::internal(&function.name, "resumed after new without an instance"))?;
                    self.store(act, hooks, actor, dest, Value::Machine(created))?;
                }
                Instr::RecordChoice(choice) => {
                    let chosen = actor
                        .resume
                        .nondet
                        .take()
                        .ok_or_else(|| RuntimeFailure::internal(&function.name, "resumed after nondet without a choice"))?;
                    let slot = *choice as usize;
                    if act.frame.choices.len() <= slot {
                        act.frame.choices.resize(slot + 1, false);
                    }
                    act.frame.choices[slot] = chosen;
                }
                Instr::Yield(request) => {
                    let continuation = self.yield_request(act, hooks, actor, request)?;
                    act.pending = Some(continuation);
                }
                Instr::Exit => {
                    return act
                        .pending
                        .take()
                        .ok_or_else(|| RuntimeFailure::internal(&function.name, "exit without a pending yield"));
                }
            }
        }
    }

    fn yield_request(
        &mut self,
        act: &mut Activation<'p>,
        hooks: &mut dyn SchedulerHooks,
        actor: &mut Actor,
        request: &YieldRequest,
    ) -> RuntimeResult<Continuation> {
        let name = &act.function.name;
        tracing::trace!(function = %name, request = request.name(), "yield");
        let continuation = match request {
            YieldRequest::Goto => {
                tracing::info!(machine = %actor.name, id = actor.id.0, state = ?actor.goto_target, "goto");
                Continuation::Suspended(YieldReason::Goto)
            }
            YieldRequest::Raise => {
                tracing::info!(machine = %actor.name, id = actor.id.0, event = %actor.trigger, "raise");
                Continuation::Suspended(YieldReason::Raise)
            }
            YieldRequest::Send { resume } => {
                save_frame(act, actor, *resume, None);
                Continuation::Suspended(YieldReason::Send)
            }
            YieldRequest::Receive { resume } => {
                save_frame(act, actor, *resume, None);
                Continuation::Suspended(YieldReason::Receive)
            }
            YieldRequest::New { machine, payload, resume } => {
                let payload = self.eval(act, hooks, actor, payload)?;
                save_frame(act, actor, *resume, None);
                Continuation::Suspended(YieldReason::New {
                    machine: *machine,
                    payload,
                })
            }
            YieldRequest::Nondet { resume } => {
                save_frame(act, actor, *resume, None);
                Continuation::Suspended(YieldReason::Nondet)
            }
            YieldRequest::Pop => Continuation::Suspended(YieldReason::Pop),
            YieldRequest::Return => Continuation::Completed {
                value: None,
                locals: std::mem::take(&mut act.frame.locals),
            },
            YieldRequest::ReturnValue(value) => {
                let value = self.eval(act, hooks, actor, value)?;
                Continuation::Completed {
                    value: Some(value),
                    locals: std::mem::take(&mut act.frame.locals),
                }
            }
        };
        Ok(continuation)
    }

    /// Push the handler frame of the arm matching the trigger; returns its entry position
    fn dispatch_receive(
        &mut self,
        function: &LoweredFunction,
        actor: &mut Actor,
        arms: &[ReceiveArm],
    ) -> RuntimeResult<usize> {
        let mut matching = arms.iter().filter(|arm| case_matches(arm.event, &actor.trigger));
        let arm = matching.next().ok_or_else(|| {
            RuntimeFailure::internal(&function.name, format!("no receive case matches {}", actor.trigger))
        })?;
        if matching.next().is_some() {
            return Err(RuntimeFailure::internal(
                &function.name,
                format!("several receive cases match {}", actor.trigger),
            ));
        }

        actor.receive_set.clear();
        let handler = self
            .program
            .function(arm.handler)
            .ok_or_else(|| RuntimeFailure::internal(&function.name, format!("unknown handler fn#{}", arm.handler.0)))?;
        let args = match handler.frame_type.param_count() {
            0 => Vec::new(),
            _ => vec![actor.payload.deep_clone()],
        };
        actor.start_call(self.program, arm.handler, args)?;
        position(function, Target::Label(arm.entry))
    }

    // ========================================================================
    // Operands and places
    // ========================================================================

    fn eval(
        &mut self,
        act: &mut Activation<'p>,
        hooks: &mut dyn SchedulerHooks,
        actor: &mut Actor,
        operand: &Operand,
    ) -> RuntimeResult<Value> {
        Ok(match operand {
            Operand::Const(constant) => match constant {
                Constant::Null => Value::Null,
                Constant::Bool(b) => Value::Bool(*b),
                Constant::Int(i) => Value::Int(*i),
                Constant::Event(id) => Value::Event(*id),
                Constant::Halt => Value::Halt,
            },
            Operand::This => Value::Machine(actor.id),
            Operand::Load(place) => self.load(act, hooks, actor, place)?,
            Operand::Clone(inner) => self.eval(act, hooks, actor, inner)?.deep_clone(),
            Operand::Unary { op, arg } => {
                let arg = self.eval(act, hooks, actor, arg)?;
                eval_unary(*op, &arg)?
            }
            Operand::Binary {
                op: op @ (BinaryOp::And | BinaryOp::Or),
                lhs,
                rhs,
            } => {
                let name = if *op == BinaryOp::And { "&&" } else { "||" };
                let lhs = self.eval(act, hooks, actor, lhs)?.as_bool(name)?;
                // Short-circuit: `false && _` and `true || _` skip the right side.
                if lhs == (*op == BinaryOp::Or) {
                    Value::Bool(lhs)
                } else {
                    Value::Bool(self.eval(act, hooks, actor, rhs)?.as_bool(name)?)
                }
            }
            Operand::Binary { op, lhs, rhs } => {
                let lhs = self.eval(act, hooks, actor, lhs)?;
                let rhs = self.eval(act, hooks, actor, rhs)?;
                eval_binary(*op, &lhs, &rhs)?
            }
            Operand::Lookup { base, key, container } => {
                let base = self.eval(act, hooks, actor, base)?;
                expect_kind(&base, *container)?;
                let key = self.eval(act, hooks, actor, key)?;
                base.lookup(&key)?
            }
            Operand::TupleField { base, index } => self.eval(act, hooks, actor, base)?.field(*index)?,
            Operand::Tuple(items) => Value::tuple(self.eval_all(act, hooks, actor, items)?),
            Operand::NamedTuple { names, values } => {
                Value::named_tuple(names.clone(), self.eval_all(act, hooks, actor, values)?)
            }
            Operand::Default(ty) => Value::default_for(ty),
            Operand::Cast { value, ty } => self.eval(act, hooks, actor, value)?.cast(ty)?,
            Operand::Call { callee, args } => self.call_to_completion(act, hooks, actor, *callee, args)?,
            Operand::NondetChoice(choice) => {
                let chosen = act.frame.choices.get(*choice as usize).copied().ok_or_else(|| {
                    RuntimeFailure::internal(&act.function.name, format!("choice#{} was never recorded", choice))
                })?;
                Value::Bool(chosen)
            }
        })
    }

    fn eval_all(
        &mut self,
        act: &mut Activation<'p>,
        hooks: &mut dyn SchedulerHooks,
        actor: &mut Actor,
        operands: &[Operand],
    ) -> RuntimeResult<Vec<Value>> {
        let mut values = Vec::with_capacity(operands.len());
        for operand in operands {
            values.push(self.eval(act, hooks, actor, operand)?);
        }
        Ok(values)
    }

    fn eval_args(
        &mut self,
        act: &mut Activation<'p>,
        hooks: &mut dyn SchedulerHooks,
        actor: &mut Actor,
        args: &[Argument],
    ) -> RuntimeResult<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(act, hooks, actor, &arg.value)?);
        }
        Ok(values)
    }

    /// Expression-position call; the callee must not suspend
    fn call_to_completion(
        &mut self,
        act: &mut Activation<'p>,
        hooks: &mut dyn SchedulerHooks,
        actor: &mut Actor,
        callee: FunctionId,
        args: &[Argument],
    ) -> RuntimeResult<Value> {
        let values = self.eval_args(act, hooks, actor, args)?;
        actor.start_call(self.program, callee, values)?;
        match self.execute(callee, hooks, actor)? {
            Continuation::Completed { value, .. } => Ok(value.unwrap_or(Value::Null)),
            Continuation::Suspended(reason) => Err(RuntimeFailure::internal(
                &act.function.name,
                format!("fn#{} yielded {} inside an expression", callee.0, reason.name()),
            )),
        }
    }

    /// Alias of the value at a place
    fn load(
        &mut self,
        act: &mut Activation<'p>,
        hooks: &mut dyn SchedulerHooks,
        actor: &mut Actor,
        place: &Place,
    ) -> RuntimeResult<Value> {
        Ok(match place {
            Place::Local(slot) => act
                .frame
                .locals
                .get(*slot as usize)
                .cloned()
                .ok_or_else(|| RuntimeFailure::internal(&act.function.name, format!("no slot {}", slot)))?,
            Place::Field(index) => actor
                .fields
                .get(*index as usize)
                .cloned()
                .ok_or_else(|| RuntimeFailure::internal(&act.function.name, format!("no field {}", index)))?,
            Place::Trigger => actor.trigger.clone(),
            Place::Payload => actor.payload.clone(),
            Place::TupleField { base, index } => self.load(act, hooks, actor, base)?.field(*index)?,
            Place::Element { base, key, container } => {
                let base = self.load(act, hooks, actor, base)?;
                expect_kind(&base, *container)?;
                let key = self.eval(act, hooks, actor, key)?;
                base.lookup(&key)?
            }
        })
    }

    /// Overwrite the value at a place; compound bases are mutated in place
    fn store(
        &mut self,
        act: &mut Activation<'p>,
        hooks: &mut dyn SchedulerHooks,
        actor: &mut Actor,
        place: &Place,
        value: Value,
    ) -> RuntimeResult<()> {
        match place {
            Place::Local(slot) => {
                let name = &act.function.name;
                let slot = act
                    .frame
                    .locals
                    .get_mut(*slot as usize)
                    .ok_or_else(|| RuntimeFailure::internal(name, format!("no slot {}", slot)))?;
                *slot = value;
            }
            Place::Field(index) => {
                let field = actor
                    .fields
                    .get_mut(*index as usize)
                    .ok_or_else(|| RuntimeFailure::internal(&act.function.name, format!("no field {}", index)))?;
                *field = value;
            }
            Place::Trigger => actor.trigger = value,
            Place::Payload => actor.payload = value,
            Place::TupleField { base, index } => {
                self.load(act, hooks, actor, base)?.update_field(*index, value)?;
            }
            Place::Element { base, key, container } => {
                let base = self.load(act, hooks, actor, base)?;
                expect_kind(&base, *container)?;
                let key = self.eval(act, hooks, actor, key)?;
                base.update(&key, value)?;
            }
        }
        Ok(())
    }

    /// Replace part of a container, returning the previous part
    fn replace_part(
        &mut self,
        act: &mut Activation<'p>,
        hooks: &mut dyn SchedulerHooks,
        actor: &mut Actor,
        container: &Value,
        selector: &Selector,
        value: Value,
    ) -> RuntimeResult<Value> {
        Ok(match selector {
            Selector::Field(index) => container.update_field_and_return_old(*index, value)?,
            Selector::Element { key, container: kind } => {
                expect_kind(container, *kind)?;
                let key = self.eval(act, hooks, actor, key)?;
                container.update_and_return_old(&key, value)?
            }
        })
    }
}

/// Save the running frame at `label` on the actor's call stack
fn save_frame(act: &mut Activation<'_>, actor: &mut Actor, label: LabelId, pending_call: Option<FunctionId>) {
    let locals = std::mem::take(&mut act.frame.locals);
    let mut frame = act.function.frame_type.resume_frame(locals, label);
    frame.choices = std::mem::take(&mut act.frame.choices);
    frame.pending_call = pending_call;
    actor.push_frame(frame);
}

fn position(function: &LoweredFunction, target: Target) -> RuntimeResult<usize> {
    function
        .position(target)
        .ok_or_else(|| RuntimeFailure::internal(&function.name, format!("missing jump target {:?}", target)))
}

fn expect_kind(value: &Value, kind: ContainerKind) -> Result<(), ValueError> {
    match (kind, value) {
        (ContainerKind::Seq, Value::Seq(_)) | (ContainerKind::Map, Value::Map(_)) => Ok(()),
        (ContainerKind::Seq, other) => Err(ValueError::TypeMismatch {
            op: "index",
            expected: "seq",
            found: other.kind_name(),
        }),
        (ContainerKind::Map, other) => Err(ValueError::TypeMismatch {
            op: "index",
            expected: "map",
            found: other.kind_name(),
        }),
    }
}
