//! Lowering: label numbering, suspension layout, and rejected inputs

mod common;

use common::*;
use relay_engine::ast::{BinaryOp, CaseEvent, EventId, FunctionId, Qualifier, Type, UnaryOp};
use relay_engine::compiler::ir::{Instr, LabelId, MarkId, Operand, Place, Target, YieldRequest};
use relay_engine::{lower_function, lower_program, LowerError, LowerOptions, PrettyPrint};

/// `send`, a two-case `receive`, and a statement call in one body
fn mixed_program() -> relay_engine::Program {
    let mut b = Body::new();
    let target = b.local(0);
    let event = b.event(0);
    let send = b.send(target, event, vec![]);
    let receive = b.receive(vec![(CaseEvent::Event(EventId(1)), 1), (CaseEvent::Event(EventId(2)), 1)]);
    let call = b.call(2, vec![], None);
    let body = b.block(vec![send, receive, call]);
    let main = b.finish("main", vec![var("peer", 0, Type::Machine)], vec![], body);

    let mut b = Body::new();
    let body = b.block(vec![]);
    let handler = b.finish("handler", vec![var("payload", 0, Type::Any)], vec![], body);

    let mut b = Body::new();
    let body = b.block(vec![]);
    let helper = b.finish("helper", vec![], vec![], body);

    program(vec![main, handler, helper], vec![machine("Main", vec![])], 3)
}

#[test]
fn test_labels_are_dense_from_one() {
    let lowered = lower(&mixed_program());
    let main = lowered.function(FunctionId(0)).unwrap();

    // send 1, receive 4 (after, done, one per case), call 1
    assert_eq!(main.label_count, 6);
    let mut labels = main.labels_in_body();
    labels.sort();
    assert_eq!(labels, (1..=6).map(LabelId).collect::<Vec<_>>());

    let dispatch = main.dispatch.as_ref().unwrap();
    for n in 1..=6 {
        let pc = dispatch.target(LabelId(n)).unwrap();
        assert_eq!(main.body[pc], Instr::Label(LabelId(n)));
    }
    assert!(dispatch.target(LabelId(7)).is_none());
}

#[test]
fn test_relowering_is_deterministic() {
    let program = mixed_program();
    let first = lower(&program);
    let second = lower(&program);
    assert_eq!(first.pretty_print(), second.pretty_print());
}

#[test]
fn test_program_from_json_lowers_the_same() {
    let program = mixed_program();
    let json = serde_json::to_string(&program).unwrap();
    let decoded: relay_engine::Program = serde_json::from_str(&json).unwrap();
    assert_eq!(lower(&decoded).pretty_print(), lower(&program).pretty_print());
}

#[test]
fn test_no_suspension_means_no_dispatch() {
    let lowered = lower(&mixed_program());
    let helper = lowered.function(FunctionId(2)).unwrap();
    assert_eq!(helper.label_count, 0);
    assert!(helper.dispatch.is_none());
    assert!(!helper.is_resumable());
    assert_eq!(helper.body, vec![Instr::Yield(YieldRequest::Return), Instr::Exit]);
}

#[test]
fn test_send_enqueues_before_yielding() {
    let lowered = lower(&mixed_program());
    let main = lowered.function(FunctionId(0)).unwrap();
    let enqueue = main.body.iter().position(|i| matches!(i, Instr::Enqueue { .. })).unwrap();
    assert_eq!(main.body[enqueue + 1], Instr::Yield(YieldRequest::Send { resume: LabelId(1) }));
    assert_eq!(main.body[enqueue + 2], Instr::Exit);
    assert_eq!(main.body[enqueue + 3], Instr::Label(LabelId(1)));
}

#[test]
fn test_receive_layout() {
    let lowered = lower(&mixed_program());
    let main = lowered.function(FunctionId(0)).unwrap();
    let text = main.pretty_print();
    assert!(text.contains("wait_for event#1"), "{}", text);
    assert!(text.contains("wait_for event#2"), "{}", text);
    assert!(text.contains("yield receive resume L2"), "{}", text);

    let dispatch = main
        .body
        .iter()
        .find_map(|i| match i {
            Instr::DispatchReceive(arms) => Some(arms.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(dispatch.len(), 2);
    assert_eq!(dispatch[0].entry, LabelId(4));
    assert_eq!(dispatch[1].entry, LabelId(5));

    // Each arm jumps to the shared `done` label after its handler.
    let done = Target::Label(LabelId(3));
    let jumps = main.body.iter().filter(|i| **i == Instr::Jump(done)).count();
    assert_eq!(jumps, 2);
}

#[test]
fn test_index_read_is_cloned() {
    let mut b = Body::new();
    let x = b.local(1);
    let s = b.typed_local(0, seq_of(Type::Int));
    let zero = b.int(0);
    let element = b.index(s, zero);
    let assign = b.assign(x, element);
    let body = b.block(vec![assign]);
    let f = b.finish(
        "f",
        vec![var("s", 0, seq_of(Type::Int))],
        vec![var("x", 1, Type::Int)],
        body,
    );
    let lowered = lower(&program(vec![f], vec![], 0));
    let body = &lowered.function(FunctionId(0)).unwrap().body;

    match &body[0] {
        Instr::Assign { dest: Place::Local(1), value: Operand::Clone(inner) } => {
            assert!(matches!(**inner, Operand::Lookup { .. }), "{:?}", inner);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_element_swap_lowers_to_exchange() {
    let mut b = Body::new();
    let s = b.typed_local(0, seq_of(Type::Int));
    let zero = b.int(0);
    let lhs = b.index(s, zero);
    let x = b.local(1);
    let swap = b.assign_with(lhs, x, Qualifier::Swap);
    let body = b.block(vec![swap]);
    let f = b.finish(
        "f",
        vec![var("s", 0, seq_of(Type::Int))],
        vec![var("x", 1, Type::Int)],
        body,
    );
    let lowered = lower(&program(vec![f], vec![], 0));
    let text = lowered.function(FunctionId(0)).unwrap().pretty_print();
    assert!(text.contains("%1 = %0[0].update_and_return_old(%1)"), "{}", text);
}

#[test]
fn test_nondet_loop_condition_rechosen_each_iteration() {
    let mut b = Body::new();
    let cond = b.nondet();
    let stmt = b.print("tick", vec![]);
    let body = b.while_loop(cond, vec![stmt]);
    let f = b.finish("spin", vec![], vec![], body);
    let lowered = lower(&program(vec![f], vec![], 0));
    let body = &lowered.function(FunctionId(0)).unwrap().body;

    assert!(matches!(body[0], Instr::Mark(_)));
    assert_eq!(body[1], Instr::Yield(YieldRequest::Nondet { resume: LabelId(1) }));
    assert_eq!(body[4], Instr::RecordChoice(0));
    assert!(matches!(
        &body[5],
        Instr::JumpIfFalse { cond: Operand::NondetChoice(0), .. }
    ));
    // The back edge returns to the mark in front of the yield.
    let back = body.iter().rev().find(|i| matches!(i, Instr::Jump(_))).unwrap();
    assert_eq!(*back, Instr::Jump(Target::Mark(MarkId(1))));
}

#[test]
fn test_raise_checks_event_with_located_message() {
    let mut b = Body::new();
    b.at_line(3);
    let event = b.local(0);
    let raise = b.raise(event);
    let body = b.block(vec![raise]);
    let f = b.finish("fire", vec![var("e", 0, Type::Event)], vec![], body);
    let lowered = lower(&program(vec![f], vec![], 0));
    let body = &lowered.function(FunctionId(0)).unwrap().body;

    match &body[0] {
        Instr::Assert { message, .. } => assert_eq!(message, "test.p(3,5): Raised event must be non-null"),
        other => panic!("unexpected {:?}", other),
    }
    // Terminal: no landing label follows the exit.
    assert_eq!(lowered.function(FunctionId(0)).unwrap().label_count, 0);
}

#[test]
fn test_source_locations_can_be_disabled() {
    let mut b = Body::new();
    let cond = b.boolean(false);
    let assert = b.assert(cond, None);
    let body = b.block(vec![assert]);
    let f = b.finish("check", vec![], vec![], body);
    let options = LowerOptions { verify: true, source_locations: false };
    let lowered = lower_program(&program(vec![f], vec![], 0), &options).unwrap();

    match &lowered.function(FunctionId(0)).unwrap().body[0] {
        Instr::Assert { message, .. } => assert_eq!(message, "Assert failed"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_rejects_nested_new() {
    let mut b = Body::new();
    let inner = b.new_machine(0, vec![], None);
    // `new` is a statement; putting one in another's payload is malformed input
    let outer = b.new_machine(0, vec![inner], None);
    let body = b.block(vec![outer]);
    let f = b.finish("spawn", vec![], vec![], body);
    let program = program(vec![f], vec![machine("Main", vec![])], 0);

    let err = lower_function(&program, FunctionId(0), &LowerOptions::default()).unwrap_err();
    assert!(matches!(err, LowerError::NestedNew { .. }), "{:?}", err);
}

#[test]
fn test_rejects_locals_beyond_slot_count() {
    let mut b = Body::new();
    let body = b.block(vec![]);
    let mut f = b.finish("f", vec![var("a", 0, Type::Int)], vec![var("b", 1, Type::Int)], body);
    f.max_num_locals = 1;
    let err = lower_program(&program(vec![f], vec![], 0), &LowerOptions::default()).unwrap_err();
    assert_eq!(
        err,
        LowerError::LocalsMismatch {
            function: "f".to_string(),
            declared: 2,
            max: 1
        }
    );
}

#[test]
fn test_nested_choices_are_chosen_before_their_statement() {
    // x = $ && !$
    let mut b = Body::new();
    let x = b.local(0);
    let first = b.nondet();
    let second = b.nondet();
    let negated = b.unary(UnaryOp::Not, second);
    let both = b.binary(BinaryOp::And, first, negated);
    let assign = b.assign(x, both);
    let body = b.block(vec![assign]);
    let f = b.finish("f", vec![], vec![var("x", 0, Type::Bool)], body);
    let lowered = lower(&program(vec![f], vec![], 0));
    let f = lowered.function(FunctionId(0)).unwrap();

    assert_eq!(f.label_count, 2);
    assert_eq!(
        &f.body[..8],
        &[
            Instr::Yield(YieldRequest::Nondet { resume: LabelId(1) }),
            Instr::Exit,
            Instr::Label(LabelId(1)),
            Instr::RecordChoice(0),
            Instr::Yield(YieldRequest::Nondet { resume: LabelId(2) }),
            Instr::Exit,
            Instr::Label(LabelId(2)),
            Instr::RecordChoice(1),
        ]
    );
    let text = f.pretty_print();
    assert!(text.contains("(choice#0 && !choice#1)"), "{}", text);
}

#[test]
fn test_branch_choice_stays_out_of_nested_statements() {
    // if (!$) { x = $ }
    let mut b = Body::new();
    let outer = b.nondet();
    let cond = b.unary(UnaryOp::Not, outer);
    let x = b.local(0);
    let inner = b.nondet();
    let assign = b.assign(x, inner);
    let branch = b.if_else(cond, vec![assign], None);
    let body = b.block(vec![branch]);
    let f = b.finish("f", vec![], vec![var("x", 0, Type::Bool)], body);
    let lowered = lower(&program(vec![f], vec![], 0));
    let body = &lowered.function(FunctionId(0)).unwrap().body;

    // The condition's choice is made in front of the branch, the body's inside it.
    assert_eq!(body[3], Instr::RecordChoice(0));
    assert!(matches!(&body[4], Instr::JumpIfFalse { .. }));
    assert_eq!(body[8], Instr::RecordChoice(1));
    assert!(matches!(&body[9], Instr::Assign { value: Operand::NondetChoice(1), .. }));
}

#[test]
fn test_send_checks_event_with_located_message() {
    let mut b = Body::new();
    b.at_line(4);
    let (this, event) = (b.this(), b.local(0));
    let send = b.send(this, event, vec![]);
    let body = b.block(vec![send]);
    let f = b.finish("post", vec![var("e", 0, Type::Event)], vec![], body);
    let lowered = lower(&program(vec![f], vec![], 0));
    let body = &lowered.function(FunctionId(0)).unwrap().body;

    match &body[0] {
        Instr::Assert { message, .. } => assert_eq!(message, "test.p(4,5): Sent event must be non-null"),
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(body[1], Instr::Enqueue { .. }));
}

#[test]
fn test_rejects_index_without_container_type() {
    let mut b = Body::new();
    let x = b.local(1);
    let s = b.local(0);
    let zero = b.int(0);
    let element = b.index(s, zero);
    let assign = b.assign(x, element);
    let body = b.block(vec![assign]);
    let f = b.finish("f", vec![var("s", 0, seq_of(Type::Int))], vec![var("x", 1, Type::Int)], body);
    let err = lower_program(&program(vec![f], vec![], 0), &LowerOptions::default()).unwrap_err();
    assert!(matches!(err, LowerError::MissingType { .. }), "{:?}", err);
}

#[test]
fn test_rejects_unknown_callee() {
    let mut b = Body::new();
    let call = b.call(9, vec![], None);
    let body = b.block(vec![call]);
    let f = b.finish("f", vec![], vec![], body);
    let err = lower_program(&program(vec![f], vec![], 0), &LowerOptions::default()).unwrap_err();
    assert!(matches!(err, LowerError::UnknownFunction { callee: 9, .. }), "{:?}", err);
}
