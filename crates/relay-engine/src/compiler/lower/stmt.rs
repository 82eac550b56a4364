//! Statement Lowering
//!
//! Non-suspending statements: assignment under a qualifier, container
//! mutation, assert, print, announce, and structured control flow flattened
//! into marks and jumps.

use super::{Fragment, Lowerer, Parts};
use crate::ast::{BinaryOp, Node, NodeKind, Qualifier, Span};
use crate::compiler::error::LowerResult;
use crate::compiler::ir::{Instr, Operand, Place, Selector, Target};

/// Right-hand side of an assignment after its qualifier is applied
enum Source {
    Value(Operand),
    Place(Place),
}

impl<'p> Lowerer<'p> {
    /// `lhs = rhs` under `qualifier`
    ///
    /// - none: the destination receives a deep clone of the source
    /// - move: the destination receives the source value itself
    /// - swap: destination and source exchange contents
    pub(super) fn fold_assign(&mut self, lhs: &Node, qualifier: Qualifier, parts: &mut Parts) -> LowerResult<Fragment> {
        let mut code = Vec::new();
        let source = match qualifier {
            Qualifier::Swap => Source::Place(self.place(parts)?),
            _ => Source::Value(self.value(parts)?.transferred(qualifier)),
        };

        match &lhs.kind {
            NodeKind::Binary { op: BinaryOp::Index, lhs: base, .. } => {
                let container = self.place(parts)?;
                let key = self.value(parts)?;
                let selector = Selector::Element {
                    key,
                    container: self.container_kind(base)?,
                };
                code.push(Self::element_update(container, selector, source));
            }
            NodeKind::Field { base, field } => {
                let container = self.place(parts)?;
                let selector = Selector::Field(self.field_index(base, field)?);
                code.push(Self::element_update(container, selector, source));
            }
            _ => {
                let dest = self.place(parts)?;
                code.push(match source {
                    Source::Value(value) => Instr::Assign { dest, value },
                    Source::Place(source) => Instr::Swap { dest, source },
                });
            }
        }
        Ok(Fragment::Code(code))
    }

    fn element_update(container: Place, selector: Selector, source: Source) -> Instr {
        match source {
            Source::Value(value) => Instr::Update { container, selector, value },
            Source::Place(source) => Instr::Exchange { container, selector, source },
        }
    }

    /// `target -= key`
    pub(super) fn fold_remove(&self, target: &Node, parts: &mut Parts) -> LowerResult<Fragment> {
        let key = self.value(parts)?;
        let container = self.place(parts)?;
        let kind = self.container_kind(target)?;
        Ok(Fragment::Code(vec![Instr::Remove { container, kind, key }]))
    }

    /// `target += (key, value)`
    pub(super) fn fold_insert(&self, target: &Node, parts: &mut Parts) -> LowerResult<Fragment> {
        let entry = self.value(parts)?;
        let container = self.place(parts)?;
        let kind = self.container_kind(target)?;
        Ok(Fragment::Code(vec![Instr::Insert { container, kind, entry }]))
    }

    pub(super) fn fold_assert(&self, span: Span, message: Option<&str>, parts: &mut Parts) -> LowerResult<Fragment> {
        let cond = self.value(parts)?;
        let message = self.located(span, message.unwrap_or("Assert failed"));
        Ok(Fragment::Code(vec![Instr::Assert { cond, message }]))
    }

    pub(super) fn fold_print(&self, format: &str, args: Option<&Node>, parts: &mut Parts) -> LowerResult<Fragment> {
        let count = self.flatten_list(args)?.len();
        let args = self.values(parts, count)?;
        Ok(Fragment::Code(vec![Instr::Print {
            format: format.to_string(),
            args,
        }]))
    }

    pub(super) fn fold_announce(&self, args: Option<&Node>, parts: &mut Parts) -> LowerResult<Fragment> {
        let event = self.value(parts)?;
        let payload = self.payload(args, parts)?;
        Ok(Fragment::Code(vec![Instr::Announce { event, payload }]))
    }

    pub(super) fn fold_while(&mut self, parts: &mut Parts) -> LowerResult<Fragment> {
        let cond = self.value(parts)?;
        let body = self.next(parts)?;
        let body = self.expect_code(body)?;

        let start = self.labels.fresh_mark();
        let end = self.labels.fresh_mark();
        let mut code = vec![Instr::Mark(start)];
        code.push(Instr::JumpIfFalse {
            cond,
            target: Target::Mark(end),
        });
        code.extend(body);
        code.push(Instr::Jump(Target::Mark(start)));
        code.push(Instr::Mark(end));
        Ok(Fragment::Code(code))
    }

    pub(super) fn fold_if(&mut self, has_else: bool, parts: &mut Parts) -> LowerResult<Fragment> {
        let mut code = Vec::new();
        let cond = self.value(parts)?;
        let then_branch = self.next(parts)?;
        let then_branch = self.expect_code(then_branch)?;

        let end = self.labels.fresh_mark();
        if has_else {
            let else_branch = self.next(parts)?;
            let else_branch = self.expect_code(else_branch)?;
            let otherwise = self.labels.fresh_mark();
            code.push(Instr::JumpIfFalse {
                cond,
                target: Target::Mark(otherwise),
            });
            code.extend(then_branch);
            code.push(Instr::Jump(Target::Mark(end)));
            code.push(Instr::Mark(otherwise));
            code.extend(else_branch);
        } else {
            code.push(Instr::JumpIfFalse {
                cond,
                target: Target::Mark(end),
            });
            code.extend(then_branch);
        }
        code.push(Instr::Mark(end));
        Ok(Fragment::Code(code))
    }
}
