//! Expression Lowering
//!
//! Non-suspending expression forms. Read context yields operands whose
//! accessed elements are cloned; write context yields places that later
//! instructions mutate in place.

use super::{EvalContext, Fragment, Lowerer, Parts};
use crate::ast::{BinaryOp, FieldSel, FunctionId, Literal, Node, Type, UnaryOp, VarRef};
use crate::compiler::error::{LowerError, LowerResult};
use crate::compiler::ir::{Argument, Constant, ContainerKind, Operand, Place};
use std::rc::Rc;

impl<'p> Lowerer<'p> {
    pub(super) fn fold_name(&self, var: &VarRef, ctx: EvalContext) -> LowerResult<Fragment> {
        let place = match var {
            VarRef::Local(slot) => Place::Local(*slot),
            VarRef::Field(index) => Place::Field(*index),
            VarRef::Event(id) => return self.read_only(ctx, Operand::Const(Constant::Event(*id))),
            VarRef::EnumConst(value) => return self.read_only(ctx, Operand::Const(Constant::Int(*value))),
        };
        Ok(match ctx {
            EvalContext::Read => Fragment::Value(Operand::Load(place)),
            EvalContext::Write => Fragment::Place(place),
        })
    }

    pub(super) fn fold_literal(&self, lit: Literal, ctx: EvalContext) -> LowerResult<Fragment> {
        let operand = match lit {
            Literal::Int(i) => Operand::Const(Constant::Int(i)),
            Literal::Bool(b) => Operand::Const(Constant::Bool(b)),
            Literal::Null => Operand::Const(Constant::Null),
            Literal::Halt => Operand::Const(Constant::Halt),
            Literal::This => Operand::This,
        };
        self.read_only(ctx, operand)
    }

    pub(super) fn fold_unary(&self, op: UnaryOp, ctx: EvalContext, parts: &mut Parts) -> LowerResult<Fragment> {
        let arg = self.value(parts)?;
        self.read_only(ctx, Operand::Unary { op, arg: Box::new(arg) })
    }

    pub(super) fn fold_binary(&self, op: BinaryOp, ctx: EvalContext, parts: &mut Parts) -> LowerResult<Fragment> {
        let lhs = self.value(parts)?;
        let rhs = self.value(parts)?;
        self.read_only(
            ctx,
            Operand::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        )
    }

    /// `base[key]`: a cloned element when read, an element slot when written
    pub(super) fn fold_index(&self, base: &Node, ctx: EvalContext, parts: &mut Parts) -> LowerResult<Fragment> {
        let container = self.container_kind(base)?;
        match ctx {
            EvalContext::Read => {
                let base = self.value(parts)?;
                let key = self.value(parts)?;
                let lookup = Operand::Lookup {
                    base: Box::new(base),
                    key: Box::new(key),
                    container,
                };
                Ok(Fragment::Value(lookup.cloned()))
            }
            EvalContext::Write => {
                let base = self.place(parts)?;
                let key = self.value(parts)?;
                Ok(Fragment::Place(Place::Element {
                    base: Box::new(base),
                    key: Box::new(key),
                    container,
                }))
            }
        }
    }

    pub(super) fn fold_field(
        &self,
        base: &Node,
        field: &FieldSel,
        ctx: EvalContext,
        parts: &mut Parts,
    ) -> LowerResult<Fragment> {
        let index = self.field_index(base, field)?;
        match ctx {
            EvalContext::Read => {
                let base = self.value(parts)?;
                let field = Operand::TupleField {
                    base: Box::new(base),
                    index,
                };
                Ok(Fragment::Value(field.cloned()))
            }
            EvalContext::Write => Ok(Fragment::Place(Place::TupleField {
                base: Box::new(self.place(parts)?),
                index,
            })),
        }
    }

    pub(super) fn fold_tuple(&self, list: &Node, ctx: EvalContext, parts: &mut Parts) -> LowerResult<Fragment> {
        let items = self.flatten_list(Some(list))?;
        let values = items
            .iter()
            .map(|item| Ok(self.value(parts)?.transferred(item.qualifier)))
            .collect::<LowerResult<Vec<_>>>()?;
        self.read_only(ctx, Operand::Tuple(values))
    }

    pub(super) fn fold_named_tuple(&self, list: &Node, ctx: EvalContext, parts: &mut Parts) -> LowerResult<Fragment> {
        let items = self.flatten_list(Some(list))?;
        let mut names = Vec::with_capacity(items.len());
        let mut values = Vec::with_capacity(items.len());
        for item in &items {
            let name = item
                .name
                .ok_or_else(|| self.unexpected("named field", "positional field"))?;
            names.push(name.to_string());
            values.push(self.value(parts)?.transferred(item.qualifier));
        }
        let names: Rc<[String]> = names.into();
        self.read_only(ctx, Operand::NamedTuple { names, values })
    }

    pub(super) fn fold_cast(&self, ty: &Type, ctx: EvalContext, parts: &mut Parts) -> LowerResult<Fragment> {
        let value = self.value(parts)?;
        self.read_only(
            ctx,
            Operand::Cast {
                value: Box::new(value),
                ty: ty.clone(),
            },
        )
    }

    /// Expression-position call; the callee runs to completion
    pub(super) fn fold_app(
        &self,
        callee: FunctionId,
        args: Option<&Node>,
        ctx: EvalContext,
        parts: &mut Parts,
    ) -> LowerResult<Fragment> {
        self.check_function(callee)?;
        let items = self.flatten_list(args)?;
        let args = items
            .iter()
            .map(|item| {
                Ok(Argument {
                    value: self.value(parts)?.transferred(item.qualifier),
                    qualifier: item.qualifier,
                })
            })
            .collect::<LowerResult<Vec<_>>>()?;
        self.read_only(ctx, Operand::Call { callee, args })
    }

    // ------------------------------------------------------------------
    // Type-directed resolution
    // ------------------------------------------------------------------

    pub(super) fn container_kind(&self, container: &Node) -> LowerResult<ContainerKind> {
        match self.type_of(container)? {
            Type::Seq(_) => Ok(ContainerKind::Seq),
            Type::Map(..) => Ok(ContainerKind::Map),
            other => Err(LowerError::NotAContainer {
                function: self.function.name.clone(),
                ty: other.to_string(),
            }),
        }
    }

    pub(super) fn field_index(&self, base: &Node, field: &FieldSel) -> LowerResult<u32> {
        match field {
            FieldSel::Index(index) => Ok(*index),
            FieldSel::Name(name) => {
                let ty = self.type_of(base)?;
                ty.field_index(name).ok_or_else(|| LowerError::UnknownField {
                    function: self.function.name.clone(),
                    field: name.clone(),
                    ty: ty.to_string(),
                })
            }
        }
    }
}
