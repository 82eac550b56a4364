//! Type descriptors attached to nodes by the checker

use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic type of a local, field or subexpression
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// Only the null sentinel
    Null,
    /// Booleans
    Bool,
    /// Integers
    Int,
    /// Event tags
    Event,
    /// Actor handles
    Machine,
    /// Any value
    Any,
    /// Positional tuple
    Tuple(Vec<Type>),
    /// Named tuple
    NamedTuple(Vec<(String, Type)>),
    /// Sequence
    Seq(Box<Type>),
    /// Map
    Map(Box<Type>, Box<Type>),
}

impl Type {
    /// Position of a named field, if this is a named tuple that has it
    pub fn field_index(&self, name: &str) -> Option<u32> {
        match self {
            Type::NamedTuple(fields) => fields
                .iter()
                .position(|(field, _)| field == name)
                .map(|i| i as u32),
            _ => None,
        }
    }

    /// Field names of a named tuple
    pub fn field_names(&self) -> Option<Vec<String>> {
        match self {
            Type::NamedTuple(fields) => Some(fields.iter().map(|(n, _)| n.clone()).collect()),
            _ => None,
        }
    }

    /// Whether this is a map type
    pub fn is_map(&self) -> bool {
        matches!(self, Type::Map(..))
    }

    /// Whether this is a sequence type
    pub fn is_seq(&self) -> bool {
        matches!(self, Type::Seq(_))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Null => write!(f, "null"),
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Event => write!(f, "event"),
            Type::Machine => write!(f, "machine"),
            Type::Any => write!(f, "any"),
            Type::Tuple(items) => {
                write!(f, "(")?;
                for (i, ty) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", ty)?;
                }
                write!(f, ")")
            }
            Type::NamedTuple(fields) => {
                write!(f, "(")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, ty)?;
                }
                write!(f, ")")
            }
            Type::Seq(elem) => write!(f, "seq[{}]", elem),
            Type::Map(key, value) => write!(f, "map[{}, {}]", key, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_field_index() {
        let ty = Type::NamedTuple(vec![("a".into(), Type::Int), ("b".into(), Type::Bool)]);
        assert_eq!(ty.field_index("b"), Some(1));
        assert_eq!(ty.field_index("c"), None);
        assert_eq!(Type::Int.field_index("a"), None);
    }

    #[test]
    fn test_type_display() {
        let ty = Type::Map(Box::new(Type::Int), Box::new(Type::Seq(Box::new(Type::Bool))));
        assert_eq!(ty.to_string(), "map[int, seq[bool]]");
    }
}
