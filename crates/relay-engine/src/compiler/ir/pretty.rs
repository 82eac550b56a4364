//! Pretty-printing for lowered code
//!
//! The dump is deterministic: lowering the same program twice prints the same
//! text, which is what downstream tooling diffs against.

use super::function::{LoweredFunction, LoweredProgram};
use super::instr::{
    Argument, Constant, ContainerKind, Instr, Operand, Place, ReceiveArm, Selector, Target, YieldRequest,
};
use crate::ast::{BinaryOp, CaseEvent, Qualifier, UnaryOp};
use std::fmt::Write;

/// Trait for pretty-printing lowered constructs
pub trait PrettyPrint {
    /// Render as text
    fn pretty_print(&self) -> String;
}

impl PrettyPrint for LoweredProgram {
    fn pretty_print(&self) -> String {
        let mut output = String::new();
        writeln!(output, "; program {}", self.file).unwrap();
        writeln!(output).unwrap();

        for machine in &self.machines {
            writeln!(output, "; machine {}", machine.name).unwrap();
            for field in &machine.fields {
                writeln!(output, ";   field {}: {}", field.name, field.ty).unwrap();
            }
            writeln!(output).unwrap();
        }

        for func in &self.functions {
            output.push_str(&func.pretty_print());
            writeln!(output).unwrap();
        }

        output
    }
}

impl PrettyPrint for LoweredFunction {
    fn pretty_print(&self) -> String {
        let mut output = String::new();

        let owner = match self.owner {
            Some(owner) => format!(" machine#{}", owner.0),
            None => String::new(),
        };
        writeln!(
            output,
            "fn {}{} [slots {}, labels {}] {{",
            self.name,
            owner,
            self.frame_type.slot_count(),
            self.label_count
        )
        .unwrap();

        let slots: Vec<String> = self
            .frame_type
            .slots()
            .iter()
            .enumerate()
            .map(|(i, slot)| format!("%{}={}", i, slot.name))
            .collect();
        if !slots.is_empty() {
            writeln!(output, "  ; frame: {}", slots.join(", ")).unwrap();
        }

        if let Some(dispatch) = &self.dispatch {
            let arms: Vec<String> = dispatch
                .targets
                .iter()
                .enumerate()
                .map(|(i, pc)| format!("L{} => @{}", i + 1, pc))
                .collect();
            writeln!(output, "  switch label {{ {} }}", arms.join(", ")).unwrap();
        }

        for (pc, instr) in self.body.iter().enumerate() {
            match instr {
                Instr::Label(_) | Instr::Mark(_) => {
                    writeln!(output, "{}:", format_instr(instr)).unwrap();
                }
                _ => writeln!(output, "  @{:<3} {}", pc, format_instr(instr)).unwrap(),
            }
        }

        writeln!(output, "}}").unwrap();
        output
    }
}

fn format_instr(instr: &Instr) -> String {
    match instr {
        Instr::Label(label) => format!("{}", label),
        Instr::Mark(mark) => format!("{}", mark),
        Instr::Jump(target) => format!("jump {}", format_target(target)),
        Instr::JumpIfFalse { cond, target } => {
            format!("jump {} unless {}", format_target(target), format_operand(cond))
        }
        Instr::Assign { dest, value } => {
            format!("{} = {}", format_place(dest), format_operand(value))
        }
        Instr::Swap { dest, source } => {
            format!("swap {}, {}", format_place(dest), format_place(source))
        }
        Instr::Update { container, selector, value } => format!(
            "{}{} = {}",
            format_place(container),
            format_selector(selector),
            format_operand(value)
        ),
        Instr::Exchange { container, selector, source } => format!(
            "{} = {}{}.update_and_return_old({})",
            format_place(source),
            format_place(container),
            format_selector(selector),
            format_place(source)
        ),
        Instr::Remove { container, kind, key } => format!(
            "{}.remove({}) ; {}",
            format_place(container),
            format_operand(key),
            format_kind(*kind)
        ),
        Instr::Insert { container, kind, entry } => format!(
            "{}.insert({}) ; {}",
            format_place(container),
            format_operand(entry),
            format_kind(*kind)
        ),
        Instr::Assert { cond, message } => {
            format!("assert {}, {:?}", format_operand(cond), message)
        }
        Instr::Print { format, args } => {
            format!("print {:?}{}", format, format_list_suffix(args))
        }
        Instr::Announce { event, payload } => {
            format!("announce {}, {}", format_operand(event), format_operand(payload))
        }
        Instr::Enqueue { target, event, payload } => format!(
            "enqueue {} <- {}, {}",
            format_operand(target),
            format_operand(event),
            format_operand(payload)
        ),
        Instr::SetGotoTarget(state) => format!("goto_target = state#{}", state.0),
        Instr::RegisterReceive(event) => format!("wait_for {}", format_case_event(*event)),
        Instr::DispatchReceive(arms) => {
            let arms: Vec<String> = arms.iter().map(format_arm).collect();
            format!("dispatch trigger {{ {} }}", arms.join(", "))
        }
        Instr::PushFrame { callee, args } => {
            let args: Vec<String> = args.iter().map(format_argument).collect();
            format!("push_frame fn#{}({})", callee.0, args.join(", "))
        }
        Instr::Invoke { callee } => format!("invoke fn#{}", callee.0),
        Instr::PropagateSuspension { callee, resume } => {
            format!("propagate_suspension fn#{} resume {}", callee.0, resume)
        }
        Instr::CollectReturn { dest } => format!("{} = return_value", format_place(dest)),
        Instr::WriteBack { dest, slot } => {
            format!("{} = returned_locals[{}]", format_place(dest), slot)
        }
        Instr::ReadCreated { dest } => format!("{} = created_instance", format_place(dest)),
        Instr::RecordChoice(n) => format!("choice#{} = nondet_choice", n),
        Instr::Yield(request) => format_yield(request),
        Instr::Exit => "exit".to_string(),
    }
}

fn format_yield(request: &YieldRequest) -> String {
    match request {
        YieldRequest::New { machine, payload, resume } => format!(
            "yield new machine#{}({}) resume {}",
            machine.0,
            format_operand(payload),
            resume
        ),
        YieldRequest::ReturnValue(value) => format!("yield return-value {}", format_operand(value)),
        other => match other.resume_label() {
            Some(resume) => format!("yield {} resume {}", other.name(), resume),
            None => format!("yield {}", other.name()),
        },
    }
}

fn format_target(target: &Target) -> String {
    match target {
        Target::Label(label) => format!("{}", label),
        Target::Mark(mark) => format!("{}", mark),
    }
}

fn format_kind(kind: ContainerKind) -> &'static str {
    match kind {
        ContainerKind::Seq => "seq",
        ContainerKind::Map => "map",
    }
}

fn format_case_event(event: CaseEvent) -> String {
    match event {
        CaseEvent::Event(id) => format!("event#{}", id.0),
        CaseEvent::Null => "null".to_string(),
        CaseEvent::Halt => "halt".to_string(),
    }
}

fn format_arm(arm: &ReceiveArm) -> String {
    format!(
        "{} => fn#{} at {}",
        format_case_event(arm.event),
        arm.handler.0,
        arm.entry
    )
}

fn format_argument(arg: &Argument) -> String {
    match arg.qualifier {
        Qualifier::None => format_operand(&arg.value),
        Qualifier::Move => format!("{} move", format_operand(&arg.value)),
        Qualifier::Swap => format!("{} swap", format_operand(&arg.value)),
    }
}

fn format_selector(selector: &Selector) -> String {
    match selector {
        Selector::Field(index) => format!(".{}", index),
        Selector::Element { key, .. } => format!("[{}]", format_operand(key)),
    }
}

fn format_place(place: &Place) -> String {
    match place {
        Place::Local(slot) => format!("%{}", slot),
        Place::Field(index) => format!("self.{}", index),
        Place::Trigger => "trigger".to_string(),
        Place::Payload => "payload".to_string(),
        Place::TupleField { base, index } => format!("{}.{}", format_place(base), index),
        Place::Element { base, key, .. } => format!("{}[{}]", format_place(base), format_operand(key)),
    }
}

fn format_constant(constant: &Constant) -> String {
    match constant {
        Constant::Null => "null".to_string(),
        Constant::Bool(b) => b.to_string(),
        Constant::Int(i) => i.to_string(),
        Constant::Event(id) => format!("event#{}", id.0),
        Constant::Halt => "halt".to_string(),
    }
}

fn format_list_suffix(args: &[Operand]) -> String {
    args.iter().map(|a| format!(", {}", format_operand(a))).collect()
}

fn format_operand(operand: &Operand) -> String {
    match operand {
        Operand::Const(c) => format_constant(c),
        Operand::This => "this".to_string(),
        Operand::Load(place) => format_place(place),
        Operand::Clone(inner) => format!("clone({})", format_operand(inner)),
        Operand::Unary { op, arg } => {
            let op = match op {
                UnaryOp::Not => "!",
                UnaryOp::Neg => "-",
                UnaryOp::Keys => "keys ",
                UnaryOp::Values => "values ",
                UnaryOp::Sizeof => "sizeof ",
            };
            format!("{}{}", op, format_operand(arg))
        }
        Operand::Binary { op, lhs, rhs } => {
            let op = match op {
                BinaryOp::Add => "+",
                BinaryOp::Sub => "-",
                BinaryOp::Mul => "*",
                BinaryOp::IntDiv => "/",
                BinaryOp::And => "&&",
                BinaryOp::Or => "||",
                BinaryOp::Eq => "==",
                BinaryOp::Ne => "!=",
                BinaryOp::Lt => "<",
                BinaryOp::Le => "<=",
                BinaryOp::Gt => ">",
                BinaryOp::Ge => ">=",
                BinaryOp::Index => "index",
                BinaryOp::In => "in",
            };
            format!("({} {} {})", format_operand(lhs), op, format_operand(rhs))
        }
        Operand::Lookup { base, key, .. } => format!("{}[{}]", format_operand(base), format_operand(key)),
        Operand::TupleField { base, index } => format!("{}.{}", format_operand(base), index),
        Operand::Tuple(items) => {
            let items: Vec<String> = items.iter().map(format_operand).collect();
            if items.len() == 1 {
                format!("({},)", items[0])
            } else {
                format!("({})", items.join(", "))
            }
        }
        Operand::NamedTuple { names, values } => {
            let fields: Vec<String> = names
                .iter()
                .zip(values)
                .map(|(n, v)| format!("{} = {}", n, format_operand(v)))
                .collect();
            format!("({})", fields.join(", "))
        }
        Operand::Default(ty) => format!("default({})", ty),
        Operand::Cast { value, ty } => format!("({} as {})", format_operand(value), ty),
        Operand::Call { callee, args } => {
            let args: Vec<String> = args.iter().map(format_argument).collect();
            format!("call fn#{}({})", callee.0, args.join(", "))
        }
        Operand::NondetChoice(n) => format!("choice#{}", n),
    }
}
