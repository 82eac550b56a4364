//! AST to Lowered Code
//!
//! A generic post-order rewrite driver. For every node, `unfold` picks the
//! children to lower and the evaluation context each one is lowered in;
//! once those children are fragments, `fold` synthesizes the node's own
//! fragment. Suspending forms are synthesized in `suspend`, the rest in
//! `expr` and `stmt`.

mod expr;
mod stmt;
mod suspend;

use super::error::{LowerError, LowerResult};
use super::ir::{Instr, Operand, Place, YieldRequest};
use super::layout::LabelAllocator;
use super::LowerOptions;
use crate::ast::{BinaryOp, FunctionId, FunctionInfo, Node, NodeKind, Program, Qualifier, Span, Type};

/// Whether an expression is lowered for its value or as a storage location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalContext {
    /// Value is read; accessed elements are cloned
    Read,
    /// Expression names a slot that will be mutated in place
    Write,
}

/// Result of lowering one node
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Read-context value
    Value(Operand),
    /// Write-context slot
    Place(Place),
    /// Statement code
    Code(Vec<Instr>),
}

impl Fragment {
    fn kind_name(&self) -> &'static str {
        match self {
            Fragment::Value(_) => "value",
            Fragment::Place(_) => "place",
            Fragment::Code(_) => "statement",
        }
    }
}

/// A child selected by `unfold`
struct Child<'n> {
    node: &'n Node,
    ctx: EvalContext,
}

impl<'n> Child<'n> {
    fn read(node: &'n Node) -> Self {
        Self { node, ctx: EvalContext::Read }
    }

    fn write(node: &'n Node) -> Self {
        Self { node, ctx: EvalContext::Write }
    }
}

/// Element of a flattened argument or tuple list
pub(crate) struct ListItem<'n> {
    pub node: &'n Node,
    pub qualifier: Qualifier,
    pub name: Option<&'n str>,
}

/// Lowered children of a node, consumed in unfold order
pub(crate) struct Parts {
    items: std::vec::IntoIter<Fragment>,
}

/// Lowers the body of one function
pub struct Lowerer<'p> {
    program: &'p Program,
    function: &'p FunctionInfo,
    options: &'p LowerOptions,
    labels: LabelAllocator,
    new_depth: u32,
    /// Nondet choices read by expressions whose statement has not been folded yet
    pending_choices: Vec<u32>,
    next_choice: u32,
}

impl<'p> Lowerer<'p> {
    /// Create a lowerer for `function_id`
    pub fn new(program: &'p Program, function_id: FunctionId, options: &'p LowerOptions) -> LowerResult<Self> {
        let function = program.function(function_id).ok_or_else(|| LowerError::UnknownFunction {
            function: "<program>".to_string(),
            callee: function_id.0,
        })?;
        Ok(Self {
            program,
            function,
            options,
            labels: LabelAllocator::new(),
            new_depth: 0,
            pending_choices: Vec::new(),
            next_choice: 0,
        })
    }

    /// Lower the whole body; returns the code and the number of labels issued
    pub fn lower_body(mut self) -> LowerResult<(Vec<Instr>, u32)> {
        let function = self.function;
        let fragment = self.lower_node(&function.body, EvalContext::Read)?;
        let code = self.expect_code(fragment)?;
        Ok((code, self.labels.label_count()))
    }

    fn lower_node(&mut self, node: &Node, ctx: EvalContext) -> LowerResult<Fragment> {
        let is_new = matches!(node.kind, NodeKind::New { .. });
        if is_new {
            if self.new_depth > 0 {
                return Err(LowerError::NestedNew {
                    function: self.function.name.clone(),
                });
            }
            self.new_depth += 1;
        }

        let choices_before = self.pending_choices.len();
        let children = self.unfold(node, ctx);
        let lowered = children.and_then(|children| {
            children
                .into_iter()
                .map(|child| self.lower_node(child.node, child.ctx))
                .collect::<LowerResult<Vec<_>>>()
        });

        if is_new {
            self.new_depth -= 1;
        }
        match self.fold(node, ctx, lowered?)? {
            Fragment::Code(code) => Ok(Fragment::Code(self.settle_choices(node, choices_before, code))),
            other => Ok(other),
        }
    }

    /// Put the nondet yields of a statement's own operands in front of it
    ///
    /// Nested statements have already settled theirs, so whatever is pending
    /// past `from` was read by this statement's expressions.
    fn settle_choices(&mut self, node: &Node, from: usize, mut code: Vec<Instr>) -> Vec<Instr> {
        if self.pending_choices.len() <= from {
            return code;
        }
        let mut prefix = Vec::new();
        for choice in self.pending_choices.split_off(from) {
            self.suspend(&mut prefix, |resume| YieldRequest::Nondet { resume });
            prefix.push(Instr::RecordChoice(choice));
        }
        // A loop condition is re-chosen on every iteration.
        let at = match (&node.kind, code.first()) {
            (NodeKind::While { .. }, Some(Instr::Mark(_))) => 1,
            _ => 0,
        };
        code.splice(at..at, prefix);
        code
    }

    // ========================================================================
    // Unfold
    // ========================================================================

    fn unfold<'n>(&self, node: &'n Node, ctx: EvalContext) -> LowerResult<Vec<Child<'n>>> {
        let children = match &node.kind {
            NodeKind::Name(_)
            | NodeKind::Lit(_)
            | NodeKind::Nondet { .. }
            | NodeKind::Default(_)
            | NodeKind::Pop
            | NodeKind::Receive(_) => Vec::new(),

            NodeKind::Unary { arg, .. } => vec![Child::read(arg)],
            NodeKind::Binary { op: BinaryOp::Index, lhs, rhs } => {
                vec![Child { node: lhs, ctx }, Child::read(rhs)]
            }
            NodeKind::Binary { lhs, rhs, .. } => vec![Child::read(lhs), Child::read(rhs)],
            NodeKind::Field { base, .. } => vec![Child { node: base, ctx }],
            NodeKind::Tuple(list) | NodeKind::NamedTuple(list) => self.read_list(Some(list))?,
            NodeKind::Cast { expr, .. } => vec![Child::read(expr)],
            NodeKind::App { args, .. } => self.read_list(args.as_deref())?,
            NodeKind::Exprs { .. } | NodeKind::NamedExprs { .. } => {
                return Err(self.unexpected("expression or statement", "bare argument list"));
            }

            NodeKind::New { args, out, .. } => {
                let mut children = self.read_list(args.as_deref())?;
                children.extend(out.as_deref().map(Child::write));
                children
            }
            NodeKind::Call { args, out, .. } => {
                let mut children: Vec<Child<'n>> = self
                    .flatten_list(args.as_deref())?
                    .into_iter()
                    .map(|item| match item.qualifier {
                        Qualifier::Swap => Child::write(item.node),
                        _ => Child::read(item.node),
                    })
                    .collect();
                children.extend(out.as_deref().map(Child::write));
                children
            }
            NodeKind::Goto { args, .. } => self.read_list(args.as_deref())?,
            NodeKind::Raise { event, args } | NodeKind::Announce { event, args } => {
                let mut children = vec![Child::read(event)];
                children.extend(self.read_list(args.as_deref())?);
                children
            }
            NodeKind::Send { target, event, args } => {
                let mut children = vec![Child::read(target), Child::read(event)];
                children.extend(self.read_list(args.as_deref())?);
                children
            }
            NodeKind::Assert { cond, .. } => vec![Child::read(cond)],
            NodeKind::Print { args, .. } => self.read_list(args.as_deref())?,

            NodeKind::Assign { lhs, rhs, qualifier } => {
                let mut children = vec![match qualifier {
                    Qualifier::Swap => Child::write(rhs),
                    _ => Child::read(rhs),
                }];
                match &lhs.kind {
                    NodeKind::Binary { op: BinaryOp::Index, lhs: base, rhs: index } => {
                        children.push(Child::write(base));
                        children.push(Child::read(index));
                    }
                    NodeKind::Field { base, .. } => children.push(Child::write(base)),
                    _ => children.push(Child::write(lhs)),
                }
                children
            }
            NodeKind::Remove { target, key } => vec![Child::read(key), Child::write(target)],
            NodeKind::Insert { target, entry } => vec![Child::read(entry), Child::write(target)],
            NodeKind::Return(value) => value.as_deref().map(Child::read).into_iter().collect(),

            NodeKind::While { cond, body } => vec![Child::read(cond), Child::read(body)],
            NodeKind::If { cond, then_branch, else_branch } => {
                let mut children = vec![Child::read(cond), Child::read(then_branch)];
                children.extend(else_branch.as_deref().map(Child::read));
                children
            }
            NodeKind::Seq { first, rest } => vec![Child::read(first), Child::read(rest)],
            NodeKind::Block(stmts) => stmts.iter().map(Child::read).collect(),
        };
        Ok(children)
    }

    /// Flatten a right-recursive `Exprs`/`NamedExprs` chain
    pub(crate) fn flatten_list<'n>(&self, list: Option<&'n Node>) -> LowerResult<Vec<ListItem<'n>>> {
        let mut items = Vec::new();
        let mut cursor = list;
        while let Some(cell) = cursor {
            match &cell.kind {
                NodeKind::Exprs { qualifier, head, tail } => {
                    items.push(ListItem { node: head, qualifier: *qualifier, name: None });
                    cursor = tail.as_deref();
                }
                NodeKind::NamedExprs { name, head, tail } => {
                    items.push(ListItem {
                        node: head,
                        qualifier: Qualifier::None,
                        name: Some(name.as_str()),
                    });
                    cursor = tail.as_deref();
                }
                _ => return Err(self.unexpected("argument list", node_kind_name(&cell.kind))),
            }
        }
        Ok(items)
    }

    fn read_list<'n>(&self, list: Option<&'n Node>) -> LowerResult<Vec<Child<'n>>> {
        Ok(self
            .flatten_list(list)?
            .into_iter()
            .map(|item| Child::read(item.node))
            .collect())
    }

    // ========================================================================
    // Fold
    // ========================================================================

    fn fold(&mut self, node: &Node, ctx: EvalContext, children: Vec<Fragment>) -> LowerResult<Fragment> {
        let mut parts = Parts {
            items: children.into_iter(),
        };
        match &node.kind {
            NodeKind::Name(var) => self.fold_name(var, ctx),
            NodeKind::Lit(lit) => self.fold_literal(*lit, ctx),
            NodeKind::Nondet { .. } => match ctx {
                EvalContext::Read => {
                    let choice = self.next_choice;
                    self.next_choice += 1;
                    self.pending_choices.push(choice);
                    Ok(Fragment::Value(Operand::NondetChoice(choice)))
                }
                EvalContext::Write => Err(self.unexpected("assignable place", "nondeterministic choice")),
            },
            NodeKind::Unary { op, .. } => self.fold_unary(*op, ctx, &mut parts),
            NodeKind::Binary { op: BinaryOp::Index, lhs, .. } => self.fold_index(lhs, ctx, &mut parts),
            NodeKind::Binary { op, .. } => self.fold_binary(*op, ctx, &mut parts),
            NodeKind::Field { base, field } => self.fold_field(base, field, ctx, &mut parts),
            NodeKind::Tuple(list) => self.fold_tuple(list, ctx, &mut parts),
            NodeKind::NamedTuple(list) => self.fold_named_tuple(list, ctx, &mut parts),
            NodeKind::Default(ty) => self.read_only(ctx, Operand::Default(ty.clone())),
            NodeKind::Cast { ty, .. } => self.fold_cast(ty, ctx, &mut parts),
            NodeKind::App { callee, args } => self.fold_app(*callee, args.as_deref(), ctx, &mut parts),
            NodeKind::Exprs { .. } | NodeKind::NamedExprs { .. } => {
                Err(self.unexpected("expression or statement", "bare argument list"))
            }

            NodeKind::New { machine, args, out } => {
                self.fold_new(*machine, args.as_deref(), out.is_some(), &mut parts)
            }
            NodeKind::Call { callee, args, out } => {
                self.fold_call(*callee, args.as_deref(), out.is_some(), &mut parts)
            }
            NodeKind::Goto { state, args } => self.fold_goto(*state, args.as_deref(), &mut parts),
            NodeKind::Raise { args, .. } => self.fold_raise(node.span, args.as_deref(), &mut parts),
            NodeKind::Send { args, .. } => self.fold_send(node.span, args.as_deref(), &mut parts),
            NodeKind::Receive(cases) => self.fold_receive(cases),
            NodeKind::Pop => self.fold_pop(),
            NodeKind::Return(value) => self.fold_return(value.is_some(), &mut parts),

            NodeKind::Announce { args, .. } => self.fold_announce(args.as_deref(), &mut parts),
            NodeKind::Assert { message, .. } => self.fold_assert(node.span, message.as_deref(), &mut parts),
            NodeKind::Print { format, args } => self.fold_print(format, args.as_deref(), &mut parts),
            NodeKind::Assign { lhs, qualifier, .. } => self.fold_assign(lhs, *qualifier, &mut parts),
            NodeKind::Remove { target, .. } => self.fold_remove(target, &mut parts),
            NodeKind::Insert { target, .. } => self.fold_insert(target, &mut parts),
            NodeKind::While { .. } => self.fold_while(&mut parts),
            NodeKind::If { else_branch, .. } => self.fold_if(else_branch.is_some(), &mut parts),
            NodeKind::Seq { .. } | NodeKind::Block(_) => {
                let mut code = Vec::new();
                for part in parts.items {
                    code.extend(self.expect_code(part)?);
                }
                Ok(Fragment::Code(code))
            }
        }
    }

    // ========================================================================
    // Shared helpers
    // ========================================================================

    pub(crate) fn next(&self, parts: &mut Parts) -> LowerResult<Fragment> {
        parts
            .items
            .next()
            .ok_or_else(|| self.unexpected("lowered child", "end of children"))
    }

    /// Next child as a read-context value
    pub(crate) fn value(&self, parts: &mut Parts) -> LowerResult<Operand> {
        match self.next(parts)? {
            Fragment::Value(op) => Ok(op),
            other => Err(self.unexpected("value", other.kind_name())),
        }
    }

    /// Next child as a write-context place
    pub(crate) fn place(&self, parts: &mut Parts) -> LowerResult<Place> {
        match self.next(parts)? {
            Fragment::Place(place) => Ok(place),
            other => Err(self.unexpected("assignable place", other.kind_name())),
        }
    }

    /// Next `count` children as values
    pub(crate) fn values(&self, parts: &mut Parts, count: usize) -> LowerResult<Vec<Operand>> {
        (0..count).map(|_| self.value(parts)).collect()
    }

    pub(crate) fn expect_code(&self, fragment: Fragment) -> LowerResult<Vec<Instr>> {
        match fragment {
            Fragment::Code(code) => Ok(code),
            other => Err(self.unexpected("statement", other.kind_name())),
        }
    }

    /// Wrap an operand that has no place form
    pub(crate) fn read_only(&self, ctx: EvalContext, operand: Operand) -> LowerResult<Fragment> {
        match ctx {
            EvalContext::Read => Ok(Fragment::Value(operand)),
            EvalContext::Write => Err(self.unexpected("assignable place", "computed value")),
        }
    }

    pub(crate) fn type_of(&self, node: &Node) -> LowerResult<&'p Type> {
        self.function.type_of(node.id).ok_or_else(|| LowerError::MissingType {
            function: self.function.name.clone(),
            node: node.id.0,
        })
    }

    pub(crate) fn check_function(&self, callee: FunctionId) -> LowerResult<&'p FunctionInfo> {
        self.program.function(callee).ok_or_else(|| LowerError::UnknownFunction {
            function: self.function.name.clone(),
            callee: callee.0,
        })
    }

    /// Prefix a message with the source position when configured to
    pub(crate) fn located(&self, span: Span, message: &str) -> String {
        if self.options.source_locations {
            format!("{}({},{}): {}", self.program.file, span.line, span.column, message)
        } else {
            message.to_string()
        }
    }

    pub(crate) fn unexpected(&self, expected: &'static str, found: &'static str) -> LowerError {
        LowerError::UnexpectedNode {
            function: self.function.name.clone(),
            expected,
            found,
        }
    }
}

fn node_kind_name(kind: &NodeKind) -> &'static str {
    match kind {
        NodeKind::Name(_) => "name",
        NodeKind::Lit(_) => "literal",
        NodeKind::Nondet { .. } => "nondet",
        NodeKind::Unary { .. } => "unary",
        NodeKind::Binary { .. } => "binary",
        NodeKind::Field { .. } => "field",
        NodeKind::Tuple(_) => "tuple",
        NodeKind::NamedTuple(_) => "named tuple",
        NodeKind::Default(_) => "default",
        NodeKind::Cast { .. } => "cast",
        NodeKind::App { .. } => "application",
        NodeKind::Exprs { .. } => "exprs",
        NodeKind::NamedExprs { .. } => "named exprs",
        NodeKind::New { .. } => "new",
        NodeKind::Call { .. } => "call",
        NodeKind::Goto { .. } => "goto",
        NodeKind::Raise { .. } => "raise",
        NodeKind::Send { .. } => "send",
        NodeKind::Announce { .. } => "announce",
        NodeKind::Receive(_) => "receive",
        NodeKind::Assert { .. } => "assert",
        NodeKind::Print { .. } => "print",
        NodeKind::Assign { .. } => "assign",
        NodeKind::Remove { .. } => "remove",
        NodeKind::Insert { .. } => "insert",
        NodeKind::Pop => "pop",
        NodeKind::Return(_) => "return",
        NodeKind::While { .. } => "while",
        NodeKind::If { .. } => "if",
        NodeKind::Seq { .. } => "seq",
        NodeKind::Block(_) => "block",
    }
}
