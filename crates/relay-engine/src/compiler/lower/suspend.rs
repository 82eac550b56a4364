//! Suspension Point Lowering
//!
//! Every operation that can hand control to the scheduler is split into the
//! work done before suspending, a yield request, an exit out of the current
//! call, and (unless the operation is terminal) a landing label where the
//! saved frame resumes.
//!
//! Send and receive deliberately differ: send enqueues synchronously and its
//! yield is only a fairness checkpoint, while receive's yield is a real wait.

use super::{Fragment, Lowerer, Parts};
use crate::ast::{BinaryOp, FunctionId, MachineTypeId, Node, Qualifier, ReceiveCase, Span, StateId};
use crate::compiler::error::LowerResult;
use crate::compiler::ir::{Argument, Instr, LabelId, Operand, Place, ReceiveArm, Target, YieldRequest};

impl<'p> Lowerer<'p> {
    /// Yield, leave the call, and land on a fresh label
    pub(super) fn suspend(&mut self, code: &mut Vec<Instr>, request: impl FnOnce(LabelId) -> YieldRequest) -> LabelId {
        let label = self.labels.fresh_label();
        code.push(Instr::Yield(request(label)));
        code.push(Instr::Exit);
        code.push(Instr::Label(label));
        label
    }

    /// Yield and leave the call for good
    fn terminate(code: &mut Vec<Instr>, request: YieldRequest) {
        code.push(Instr::Yield(request));
        code.push(Instr::Exit);
    }

    fn non_null(event: &Operand) -> Operand {
        Operand::Binary {
            op: BinaryOp::Ne,
            lhs: Box::new(event.clone()),
            rhs: Box::new(Operand::null()),
        }
    }

    /// Event payload: nothing is null, one value is itself, more form a tuple
    pub(super) fn payload(&self, args: Option<&Node>, parts: &mut Parts) -> LowerResult<Operand> {
        let items = self.flatten_list(args)?;
        let mut values = items
            .iter()
            .map(|item| Ok(self.value(parts)?.transferred(item.qualifier)))
            .collect::<LowerResult<Vec<_>>>()?;
        Ok(match values.len() {
            0 => Operand::null(),
            1 => values.remove(0),
            _ => Operand::Tuple(values),
        })
    }

    pub(super) fn fold_goto(&mut self, state: StateId, args: Option<&Node>, parts: &mut Parts) -> LowerResult<Fragment> {
        let payload = self.payload(args, parts)?;
        let mut code = vec![
            Instr::Assign {
                dest: Place::Trigger,
                value: Operand::null(),
            },
            Instr::Assign {
                dest: Place::Payload,
                value: payload,
            },
            Instr::SetGotoTarget(state),
        ];
        Self::terminate(&mut code, YieldRequest::Goto);
        Ok(Fragment::Code(code))
    }

    pub(super) fn fold_raise(&mut self, span: Span, args: Option<&Node>, parts: &mut Parts) -> LowerResult<Fragment> {
        let event = self.value(parts)?;
        let payload = self.payload(args, parts)?;
        let mut code = vec![
            Instr::Assert {
                cond: Self::non_null(&event),
                message: self.located(span, "Raised event must be non-null"),
            },
            Instr::Assign {
                dest: Place::Trigger,
                value: event,
            },
            Instr::Assign {
                dest: Place::Payload,
                value: payload,
            },
        ];
        Self::terminate(&mut code, YieldRequest::Raise);
        Ok(Fragment::Code(code))
    }

    pub(super) fn fold_send(&mut self, span: Span, args: Option<&Node>, parts: &mut Parts) -> LowerResult<Fragment> {
        let target = self.value(parts)?;
        let event = self.value(parts)?;
        let payload = self.payload(args, parts)?;
        let mut code = vec![
            Instr::Assert {
                cond: Self::non_null(&event),
                message: self.located(span, "Sent event must be non-null"),
            },
            // Delivery happens here, before the scheduler gets a chance to run anyone else.
            Instr::Enqueue { target, event, payload },
        ];
        self.suspend(&mut code, |resume| YieldRequest::Send { resume });
        Ok(Fragment::Code(code))
    }

    pub(super) fn fold_receive(&mut self, cases: &[ReceiveCase]) -> LowerResult<Fragment> {
        let mut code = Vec::with_capacity(cases.len() * 4 + 4);
        for case in cases {
            self.check_function(case.handler)?;
            code.push(Instr::RegisterReceive(case.event));
        }

        let after = self.labels.fresh_label();
        let done = self.labels.fresh_label();
        let arms: Vec<ReceiveArm> = cases
            .iter()
            .map(|case| ReceiveArm {
                event: case.event,
                handler: case.handler,
                entry: self.labels.fresh_label(),
            })
            .collect();

        code.push(Instr::Yield(YieldRequest::Receive { resume: after }));
        code.push(Instr::Exit);
        code.push(Instr::Label(after));
        code.push(Instr::DispatchReceive(arms.clone()));
        for arm in &arms {
            code.push(Instr::Label(arm.entry));
            code.push(Instr::Invoke { callee: arm.handler });
            code.push(Instr::PropagateSuspension {
                callee: arm.handler,
                resume: arm.entry,
            });
            code.push(Instr::Jump(Target::Label(done)));
        }
        code.push(Instr::Label(done));
        Ok(Fragment::Code(code))
    }

    pub(super) fn fold_new(
        &mut self,
        machine: MachineTypeId,
        args: Option<&Node>,
        has_out: bool,
        parts: &mut Parts,
    ) -> LowerResult<Fragment> {
        let payload = self.payload(args, parts)?;
        let out = if has_out { Some(self.place(parts)?) } else { None };

        let mut code = Vec::new();
        self.suspend(&mut code, |resume| YieldRequest::New {
            machine,
            payload,
            resume,
        });
        if let Some(dest) = out {
            code.push(Instr::ReadCreated { dest });
        }
        Ok(Fragment::Code(code))
    }

    /// Statement-position call
    ///
    /// The callee frame is pushed once; the landing label sits in front of
    /// the invocation so a resumed caller re-enters the callee, whose own
    /// saved frame is then on top of the stack.
    pub(super) fn fold_call(
        &mut self,
        callee: FunctionId,
        args: Option<&Node>,
        has_out: bool,
        parts: &mut Parts,
    ) -> LowerResult<Fragment> {
        self.check_function(callee)?;
        let items = self.flatten_list(args)?;
        let mut arguments = Vec::with_capacity(items.len());
        let mut write_backs = Vec::new();
        for (slot, item) in items.iter().enumerate() {
            match item.qualifier {
                Qualifier::Swap => {
                    let place = self.place(parts)?;
                    arguments.push(Argument {
                        value: Operand::Load(place.clone()).cloned(),
                        qualifier: Qualifier::Swap,
                    });
                    write_backs.push((place, slot as u32));
                }
                qualifier => arguments.push(Argument {
                    value: self.value(parts)?.transferred(qualifier),
                    qualifier,
                }),
            }
        }
        let out = if has_out { Some(self.place(parts)?) } else { None };

        let landing = self.labels.fresh_label();
        let mut code = vec![
            Instr::PushFrame {
                callee,
                args: arguments,
            },
            Instr::Label(landing),
            Instr::Invoke { callee },
            Instr::PropagateSuspension {
                callee,
                resume: landing,
            },
        ];
        if let Some(dest) = out {
            code.push(Instr::CollectReturn { dest });
        }
        code.extend(
            write_backs
                .into_iter()
                .map(|(dest, slot)| Instr::WriteBack { dest, slot }),
        );
        Ok(Fragment::Code(code))
    }

    pub(super) fn fold_pop(&mut self) -> LowerResult<Fragment> {
        let mut code = vec![
            Instr::Assign {
                dest: Place::Trigger,
                value: Operand::null(),
            },
            Instr::Assign {
                dest: Place::Payload,
                value: Operand::null(),
            },
        ];
        Self::terminate(&mut code, YieldRequest::Pop);
        Ok(Fragment::Code(code))
    }

    pub(super) fn fold_return(&mut self, has_value: bool, parts: &mut Parts) -> LowerResult<Fragment> {
        let mut code = Vec::new();
        let request = if has_value {
            YieldRequest::ReturnValue(self.value(parts)?.cloned())
        } else {
            YieldRequest::Return
        };
        Self::terminate(&mut code, request);
        Ok(Fragment::Code(code))
    }
}
