//! Runtime values
//!
//! Scalars are stored inline. Tuples, sequences and maps live behind shared
//! cells, so [`Value::clone`] produces an alias while [`Value::deep_clone`]
//! produces an independent copy. Lowered code decides which of the two a
//! given access needs.

use crate::ast::{EventId, Type};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use thiserror::Error;

/// Runtime handle of an actor instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MachineId(pub u32);

/// Field storage of a named tuple
#[derive(Debug)]
pub struct NamedFields {
    /// Field names, shared by every value of the same shape
    pub names: Rc<[String]>,
    /// Field values, parallel to `names`
    pub values: Vec<Value>,
}

/// A runtime value
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Null sentinel, also the null event
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Declared event
    Event(EventId),
    /// Built-in `halt` event
    Halt,
    /// Actor handle
    Machine(MachineId),
    /// Positional tuple
    Tuple(Rc<RefCell<Vec<Value>>>),
    /// Named tuple
    NamedTuple(Rc<RefCell<NamedFields>>),
    /// Sequence
    Seq(Rc<RefCell<Vec<Value>>>),
    /// Map with insertion-ordered entries
    Map(Rc<RefCell<IndexMap<Value, Value>>>),
}

/// Errors raised by value operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValueError {
    /// Operand of the wrong kind
    #[error("{op} expects {expected}, found {found}")]
    TypeMismatch {
        /// Operation name
        op: &'static str,
        /// Expected kind
        expected: &'static str,
        /// Actual kind
        found: &'static str,
    },

    /// Sequence index outside the valid range
    #[error("index {index} out of range for sequence of length {len}")]
    IndexOutOfRange {
        /// Requested index
        index: i64,
        /// Sequence length
        len: usize,
    },

    /// Tuple field outside the tuple
    #[error("field {index} out of range for tuple of arity {arity}")]
    FieldOutOfRange {
        /// Requested field
        index: u32,
        /// Tuple arity
        arity: usize,
    },

    /// Map lookup or removal of an absent key
    #[error("key {key} not found in map")]
    KeyNotFound {
        /// Displayed key
        key: String,
    },

    /// Map insertion of a present key
    #[error("key {key} already present in map")]
    DuplicateKey {
        /// Displayed key
        key: String,
    },

    /// Integer division by zero
    #[error("division by zero")]
    DivisionByZero,

    /// Value does not conform to the cast target
    #[error("cannot cast {value} to {ty}")]
    CastFailed {
        /// Displayed value
        value: String,
        /// Target type
        ty: String,
    },
}

/// Result alias for value operations
pub type ValueResult<T> = Result<T, ValueError>;

impl Value {
    /// Build a positional tuple
    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Rc::new(RefCell::new(items)))
    }

    /// Build a named tuple
    pub fn named_tuple(names: Rc<[String]>, values: Vec<Value>) -> Self {
        Value::NamedTuple(Rc::new(RefCell::new(NamedFields { names, values })))
    }

    /// Build a sequence
    pub fn seq(items: Vec<Value>) -> Self {
        Value::Seq(Rc::new(RefCell::new(items)))
    }

    /// Build a map
    pub fn map(entries: IndexMap<Value, Value>) -> Self {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    /// Kind name for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Event(_) | Value::Halt => "event",
            Value::Machine(_) => "machine",
            Value::Tuple(_) => "tuple",
            Value::NamedTuple(_) => "named tuple",
            Value::Seq(_) => "seq",
            Value::Map(_) => "map",
        }
    }

    /// Whether two values share the same compound storage
    pub fn same_storage(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Tuple(a), Value::Tuple(b)) | (Value::Seq(a), Value::Seq(b)) => {
                Rc::ptr_eq(a, b)
            }
            (Value::NamedTuple(a), Value::NamedTuple(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Independent copy; nothing mutable is shared with `self` afterwards
    pub fn deep_clone(&self) -> Value {
        match self {
            Value::Tuple(items) => Value::tuple(items.borrow().iter().map(Value::deep_clone).collect()),
            Value::NamedTuple(fields) => {
                let fields = fields.borrow();
                Value::named_tuple(
                    fields.names.clone(),
                    fields.values.iter().map(Value::deep_clone).collect(),
                )
            }
            Value::Seq(items) => Value::seq(items.borrow().iter().map(Value::deep_clone).collect()),
            Value::Map(entries) => Value::map(
                entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.deep_clone(), v.deep_clone()))
                    .collect(),
            ),
            scalar => scalar.clone(),
        }
    }

    /// Default value of a type
    pub fn default_for(ty: &Type) -> Value {
        match ty {
            Type::Null | Type::Event | Type::Machine | Type::Any => Value::Null,
            Type::Bool => Value::Bool(false),
            Type::Int => Value::Int(0),
            Type::Tuple(items) => Value::tuple(items.iter().map(Value::default_for).collect()),
            Type::NamedTuple(fields) => Value::named_tuple(
                fields.iter().map(|(n, _)| n.clone()).collect(),
                fields.iter().map(|(_, t)| Value::default_for(t)).collect(),
            ),
            Type::Seq(_) => Value::seq(Vec::new()),
            Type::Map(..) => Value::map(IndexMap::new()),
        }
    }

    /// Whether this value inhabits `ty`
    pub fn conforms_to(&self, ty: &Type) -> bool {
        match (ty, self) {
            (Type::Any, _) => true,
            (Type::Null, Value::Null) => true,
            (Type::Bool, Value::Bool(_)) => true,
            (Type::Int, Value::Int(_)) => true,
            (Type::Event, Value::Null | Value::Event(_) | Value::Halt) => true,
            (Type::Machine, Value::Null | Value::Machine(_)) => true,
            (Type::Tuple(types), Value::Tuple(items)) => {
                let items = items.borrow();
                items.len() == types.len() && items.iter().zip(types).all(|(v, t)| v.conforms_to(t))
            }
            (Type::NamedTuple(types), Value::NamedTuple(fields)) => {
                let fields = fields.borrow();
                fields.values.len() == types.len()
                    && fields
                        .names
                        .iter()
                        .zip(&fields.values)
                        .zip(types)
                        .all(|((n, v), (tn, t))| n == tn && v.conforms_to(t))
            }
            (Type::Seq(elem), Value::Seq(items)) => items.borrow().iter().all(|v| v.conforms_to(elem)),
            (Type::Map(kt, vt), Value::Map(entries)) => entries
                .borrow()
                .iter()
                .all(|(k, v)| k.conforms_to(kt) && v.conforms_to(vt)),
            _ => false,
        }
    }

    /// Checked cast; yields an alias of `self` on success
    pub fn cast(&self, ty: &Type) -> ValueResult<Value> {
        if self.conforms_to(ty) {
            Ok(self.clone())
        } else {
            Err(ValueError::CastFailed {
                value: self.to_string(),
                ty: ty.to_string(),
            })
        }
    }

    /// Boolean payload
    pub fn as_bool(&self, op: &'static str) -> ValueResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch(op, "bool", other)),
        }
    }

    /// Integer payload
    pub fn as_int(&self, op: &'static str) -> ValueResult<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(mismatch(op, "int", other)),
        }
    }

    /// Actor handle payload
    pub fn as_machine(&self, op: &'static str) -> ValueResult<MachineId> {
        match self {
            Value::Machine(id) => Ok(*id),
            other => Err(mismatch(op, "machine", other)),
        }
    }

    /// Whether this is an event (including `halt`); null is not
    pub fn is_event(&self) -> bool {
        matches!(self, Value::Event(_) | Value::Halt)
    }

    // ------------------------------------------------------------------
    // Container contract
    // ------------------------------------------------------------------

    /// Element count of a seq or map
    pub fn size(&self) -> ValueResult<i64> {
        match self {
            Value::Seq(items) => Ok(items.borrow().len() as i64),
            Value::Map(entries) => Ok(entries.borrow().len() as i64),
            other => Err(mismatch("sizeof", "seq or map", other)),
        }
    }

    /// Fresh sequence of cloned map keys
    pub fn keys(&self) -> ValueResult<Value> {
        match self {
            Value::Map(entries) => Ok(Value::seq(entries.borrow().keys().map(Value::deep_clone).collect())),
            other => Err(mismatch("keys", "map", other)),
        }
    }

    /// Fresh sequence of cloned map values
    pub fn values(&self) -> ValueResult<Value> {
        match self {
            Value::Map(entries) => Ok(Value::seq(entries.borrow().values().map(Value::deep_clone).collect())),
            other => Err(mismatch("values", "map", other)),
        }
    }

    /// Map key membership
    pub fn contains_key(&self, key: &Value) -> ValueResult<bool> {
        match self {
            Value::Map(entries) => Ok(entries.borrow().contains_key(key)),
            other => Err(mismatch("in", "map", other)),
        }
    }

    /// Element at `key`, aliased
    pub fn lookup(&self, key: &Value) -> ValueResult<Value> {
        match self {
            Value::Seq(items) => {
                let items = items.borrow();
                let index = seq_index(key, items.len(), false)?;
                Ok(items[index].clone())
            }
            Value::Map(entries) => entries
                .borrow()
                .get(key)
                .cloned()
                .ok_or_else(|| ValueError::KeyNotFound { key: key.to_string() }),
            other => Err(mismatch("index", "seq or map", other)),
        }
    }

    /// Overwrite the element at `key`; maps insert absent keys
    pub fn update(&self, key: &Value, value: Value) -> ValueResult<()> {
        self.update_and_return_old(key, value).map(|_| ())
    }

    /// Overwrite the element at `key` and hand back what was there
    pub fn update_and_return_old(&self, key: &Value, value: Value) -> ValueResult<Value> {
        match self {
            Value::Seq(items) => {
                let mut items = items.borrow_mut();
                let index = seq_index(key, items.len(), false)?;
                Ok(std::mem::replace(&mut items[index], value))
            }
            Value::Map(entries) => Ok(entries
                .borrow_mut()
                .insert(key.deep_clone(), value)
                .unwrap_or(Value::Null)),
            other => Err(mismatch("update", "seq or map", other)),
        }
    }

    /// Remove the element at an index or key
    pub fn remove(&self, key: &Value) -> ValueResult<()> {
        match self {
            Value::Seq(items) => {
                let mut items = items.borrow_mut();
                let index = seq_index(key, items.len(), false)?;
                items.remove(index);
                Ok(())
            }
            Value::Map(entries) => entries
                .borrow_mut()
                .shift_remove(key)
                .map(|_| ())
                .ok_or_else(|| ValueError::KeyNotFound { key: key.to_string() }),
            other => Err(mismatch("remove", "seq or map", other)),
        }
    }

    /// Insert at a seq index (shifting the tail) or under a new map key
    pub fn insert(&self, key: &Value, value: Value) -> ValueResult<()> {
        match self {
            Value::Seq(items) => {
                let mut items = items.borrow_mut();
                let index = seq_index(key, items.len(), true)?;
                items.insert(index, value);
                Ok(())
            }
            Value::Map(entries) => {
                let mut entries = entries.borrow_mut();
                if entries.contains_key(key) {
                    return Err(ValueError::DuplicateKey { key: key.to_string() });
                }
                entries.insert(key.deep_clone(), value);
                Ok(())
            }
            other => Err(mismatch("insert", "seq or map", other)),
        }
    }

    // ------------------------------------------------------------------
    // Tuple contract
    // ------------------------------------------------------------------

    /// Tuple field, aliased
    pub fn field(&self, index: u32) -> ValueResult<Value> {
        match self {
            Value::Tuple(items) => {
                let items = items.borrow();
                items
                    .get(index as usize)
                    .cloned()
                    .ok_or(ValueError::FieldOutOfRange { index, arity: items.len() })
            }
            Value::NamedTuple(fields) => {
                let fields = fields.borrow();
                fields
                    .values
                    .get(index as usize)
                    .cloned()
                    .ok_or(ValueError::FieldOutOfRange { index, arity: fields.values.len() })
            }
            other => Err(mismatch("field access", "tuple", other)),
        }
    }

    /// Overwrite a tuple field
    pub fn update_field(&self, index: u32, value: Value) -> ValueResult<()> {
        self.update_field_and_return_old(index, value).map(|_| ())
    }

    /// Overwrite a tuple field and hand back what was there
    pub fn update_field_and_return_old(&self, index: u32, value: Value) -> ValueResult<Value> {
        let slot = |items: &mut Vec<Value>| -> ValueResult<Value> {
            let arity = items.len();
            let slot = items
                .get_mut(index as usize)
                .ok_or(ValueError::FieldOutOfRange { index, arity })?;
            Ok(std::mem::replace(slot, value))
        };
        match self {
            Value::Tuple(items) => slot(&mut items.borrow_mut()),
            Value::NamedTuple(fields) => slot(&mut fields.borrow_mut().values),
            other => Err(mismatch("field update", "tuple", other)),
        }
    }
}

fn mismatch(op: &'static str, expected: &'static str, found: &Value) -> ValueError {
    ValueError::TypeMismatch {
        op,
        expected,
        found: found.kind_name(),
    }
}

/// Validate a sequence index; `inclusive` admits `len` for insertion
fn seq_index(key: &Value, len: usize, inclusive: bool) -> ValueResult<usize> {
    let index = key.as_int("seq index")?;
    let in_range = index >= 0 && (index as usize) < len + usize::from(inclusive);
    if in_range {
        Ok(index as usize)
    } else {
        Err(ValueError::IndexOutOfRange { index, len })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) | (Value::Halt, Value::Halt) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Event(a), Value::Event(b)) => a == b,
            (Value::Machine(a), Value::Machine(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) | (Value::Seq(a), Value::Seq(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::NamedTuple(a), Value::NamedTuple(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.names == b.names && a.values == b.values
            }
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null | Value::Halt => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Event(e) => e.hash(state),
            Value::Machine(m) => m.hash(state),
            Value::Tuple(items) | Value::Seq(items) => items.borrow().hash(state),
            Value::NamedTuple(fields) => {
                let fields = fields.borrow();
                fields.names.hash(state);
                fields.values.hash(state);
            }
            // Map equality ignores entry order, so only the size feeds the hash.
            Value::Map(entries) => entries.borrow().len().hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Event(e) => write!(f, "event#{}", e.0),
            Value::Halt => write!(f, "halt"),
            Value::Machine(m) => write!(f, "machine#{}", m.0),
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, v) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, ")")
            }
            Value::NamedTuple(fields) => {
                let fields = fields.borrow();
                write!(f, "(")?;
                for (i, (n, v)) in fields.names.iter().zip(&fields.values).enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", n, v)?;
                }
                write!(f, ")")
            }
            Value::Seq(items) => {
                write!(f, "[")?;
                for (i, v) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "(")?;
                for (i, (k, v)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} -> {}", k, v)?;
                }
                write!(f, ")")
            }
        }
    }
}
