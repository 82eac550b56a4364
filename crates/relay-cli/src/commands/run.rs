//! `relay run`: run one function on a fresh actor and report every outcome.
//!
//! Each nondeterministic choice forks the actor, so the report covers every
//! combination of choices. Events the actor sends to itself are delivered to
//! its own receives; other machines are never scheduled.

use super::{load_config, read_program};
use anyhow::{bail, Context};
use relay_engine::{
    lower_program, Actor, Continuation, EngineConfig, Interpreter, LoweredProgram, MachineId, MachineTypeId,
    RuntimeResult, SchedulerHooks, Value, YieldReason,
};
use std::collections::VecDeque;
use std::fmt;
use std::path::Path;

pub fn execute(
    file: &Path,
    config: Option<&Path>,
    machine: &str,
    function: &str,
    max_branches: usize,
) -> anyhow::Result<()> {
    let program = read_program(file)?;
    let config = load_config(config)?;
    let lowered = lower_program(&program, &config.lower).context("Lowering failed")?;
    for outcome in explore(&lowered, &config, machine, function, max_branches)? {
        println!("{}", outcome);
    }
    Ok(())
}

/// How a branch ended
#[derive(Debug, Clone, PartialEq)]
pub enum End {
    /// The function returned
    Returned(Option<Value>),
    /// Waiting on a receive no queued event satisfies
    Blocked,
    /// Goto, raise or pop handed control to the state machine
    Transition(&'static str),
    /// The actor halted with a runtime failure
    Failed(String),
}

/// One fully explored branch
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub choices: Vec<bool>,
    pub end: End,
    pub output: Vec<String>,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let choices: String = self.choices.iter().map(|c| if *c { 't' } else { 'f' }).collect();
        write!(f, "[{}] ", choices)?;
        match &self.end {
            End::Returned(Some(value)) => write!(f, "returned {}", value)?,
            End::Returned(None) => write!(f, "returned")?,
            End::Blocked => write!(f, "blocked on receive")?,
            End::Transition(name) => write!(f, "{}", name)?,
            End::Failed(message) => write!(f, "failed: {}", message)?,
        }
        for line in &self.output {
            write!(f, "\n  | {}", line)?;
        }
        Ok(())
    }
}

/// The running actor's own mailbox plus everything it printed
struct Outbox {
    own: MachineId,
    inbox: VecDeque<(Value, Value)>,
    output: Vec<String>,
}

impl SchedulerHooks for Outbox {
    fn enqueue(&mut self, sender: MachineId, target: MachineId, event: Value, payload: Value) -> RuntimeResult<()> {
        if target == self.own {
            self.inbox.push_back((event, payload));
        } else {
            tracing::info!(from = sender.0, to = target.0, %event, %payload, "dropped send to an unscheduled machine");
        }
        Ok(())
    }

    fn print(&mut self, _sender: MachineId, message: &str) {
        self.output.push(message.to_string());
    }
}

struct Branch {
    actor: Actor,
    outbox: Outbox,
    choices: Vec<bool>,
    spawned: u32,
}

impl Branch {
    fn fork(&self) -> Branch {
        Branch {
            actor: self.actor.fork(),
            outbox: Outbox {
                own: self.outbox.own,
                inbox: self
                    .outbox
                    .inbox
                    .iter()
                    .map(|(event, payload)| (event.deep_clone(), payload.deep_clone()))
                    .collect(),
                output: self.outbox.output.clone(),
            },
            choices: self.choices.clone(),
            spawned: self.spawned,
        }
    }

    fn choose(mut self, choice: bool) -> Branch {
        self.actor.resume.nondet = Some(choice);
        self.choices.push(choice);
        self
    }

    /// Resume until the branch ends; `None` when a nondet choice is pending
    fn advance(&mut self, interpreter: &mut Interpreter<'_>) -> Option<End> {
        loop {
            let Some(function) = self.actor.top_frame().map(|frame| frame.function) else {
                return Some(End::Failed("nothing left to run".to_string()));
            };
            let continuation = match interpreter.execute(function, &mut self.outbox, &mut self.actor) {
                Ok(continuation) => continuation,
                Err(failure) => return Some(End::Failed(failure.to_string())),
            };
            match continuation {
                Continuation::Completed { value, .. } => return Some(End::Returned(value)),
                Continuation::Suspended(YieldReason::Send) => {}
                Continuation::Suspended(YieldReason::Nondet) => return None,
                Continuation::Suspended(YieldReason::New { machine, .. }) => {
                    self.spawned += 1;
                    tracing::info!(machine = machine.0, id = self.spawned, "created instance is not scheduled");
                    self.actor.resume.created = Some(MachineId(self.spawned));
                }
                Continuation::Suspended(YieldReason::Receive) => {
                    if !self.deliver() {
                        return Some(End::Blocked);
                    }
                }
                Continuation::Suspended(reason) => {
                    self.actor.clear_stack();
                    return Some(End::Transition(reason.name()));
                }
            }
        }
    }

    fn deliver(&mut self) -> bool {
        let actor = &mut self.actor;
        let inbox = &mut self.outbox.inbox;
        match inbox.iter().position(|(event, _)| actor.accepts(event)) {
            Some(position) => match inbox.remove(position) {
                Some((event, payload)) => {
                    actor.deliver(event, payload);
                    true
                }
                None => false,
            },
            None => false,
        }
    }
}

/// Run `function` on a fresh `machine` instance under every sequence of choices
pub fn explore(
    program: &LoweredProgram,
    config: &EngineConfig,
    machine: &str,
    function: &str,
    max_branches: usize,
) -> anyhow::Result<Vec<Outcome>> {
    let (machine_type, decl) = program
        .machines
        .iter()
        .enumerate()
        .find(|(_, decl)| decl.name == machine)
        .map(|(index, decl)| (MachineTypeId(index as u32), decl))
        .with_context(|| format!("No machine named `{}`", machine))?;
    let entry = program
        .function_by_name(function)
        .with_context(|| format!("No function named `{}`", function))?;

    let frame_type = &entry.frame_type;
    let args = frame_type.slots()[..frame_type.param_count()]
        .iter()
        .map(|slot| slot.ty.as_ref().map_or(Value::Null, Value::default_for))
        .collect();
    let own = MachineId(0);
    let mut actor = Actor::new(own, machine_type, decl);
    actor.start_call(program, entry.id, args)?;

    let mut interpreter = Interpreter::new(program).with_options(config.runtime.clone());
    let mut pending = vec![Branch {
        actor,
        outbox: Outbox {
            own,
            inbox: VecDeque::new(),
            output: Vec::new(),
        },
        choices: Vec::new(),
        spawned: 0,
    }];
    let mut outcomes = Vec::new();
    while let Some(mut branch) = pending.pop() {
        match branch.advance(&mut interpreter) {
            Some(end) => outcomes.push(Outcome {
                choices: branch.choices,
                end,
                output: branch.outbox.output,
            }),
            None => {
                if outcomes.len() + pending.len() + 2 > max_branches {
                    bail!("More than {} branches; raise --max-branches", max_branches);
                }
                let other = branch.fork();
                pending.push(other.choose(true));
                pending.push(branch.choose(false));
            }
        }
    }
    tracing::debug!(function, branches = outcomes.len(), "explored");
    Ok(outcomes)
}
