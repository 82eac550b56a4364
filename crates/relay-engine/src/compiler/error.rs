//! Lowering errors
//!
//! Every variant is an internal error: lowering trusts validated input, so
//! reaching one of these means the front end or checker handed over
//! something it should have rejected. Lowering aborts on the first one.

use thiserror::Error;

/// Fatal error raised while lowering a function
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LowerError {
    /// A node kind showed up where the tree walker cannot place it
    #[error("{function}: unexpected {found} where {expected} was expected")]
    UnexpectedNode {
        /// Function being lowered
        function: String,
        /// What the parent needed
        expected: &'static str,
        /// What was found
        found: &'static str,
    },

    /// A `new` inside the arguments of another `new`
    #[error("{function}: `new` nested inside another `new`")]
    NestedNew {
        /// Function being lowered
        function: String,
    },

    /// Declared parameters and locals do not fit the computed slot count
    #[error("{function}: {declared} declared slots exceed max_num_locals {max}")]
    LocalsMismatch {
        /// Function being lowered
        function: String,
        /// Parameters plus locals
        declared: usize,
        /// Slot count from the prior analysis
        max: u32,
    },

    /// A declaration's slot index disagrees with its layout position
    #[error("{function}: `{name}` has slot {slot} but is laid out at {expected}")]
    SlotMismatch {
        /// Function being lowered
        function: String,
        /// Variable name
        name: String,
        /// Declared slot
        slot: u32,
        /// Layout position
        expected: u32,
    },

    /// A node the lowering needs a type for has no annotation
    #[error("{function}: node {node} has no type annotation")]
    MissingType {
        /// Function being lowered
        function: String,
        /// Node id
        node: u32,
    },

    /// A named field that the base type does not declare
    #[error("{function}: no field `{field}` in {ty}")]
    UnknownField {
        /// Function being lowered
        function: String,
        /// Field name
        field: String,
        /// Base type
        ty: String,
    },

    /// Indexing something that is neither a seq nor a map
    #[error("{function}: cannot index into {ty}")]
    NotAContainer {
        /// Function being lowered
        function: String,
        /// Base type
        ty: String,
    },

    /// A reference to a function id outside the program
    #[error("{function}: unknown function id {callee}")]
    UnknownFunction {
        /// Function being lowered
        function: String,
        /// Missing id
        callee: u32,
    },

    /// The lowered body failed post-lowering verification
    #[error("{function}: verification failed: {message}")]
    Verification {
        /// Function being lowered
        function: String,
        /// What went wrong
        message: String,
    },
}

/// Result alias for lowering
pub type LowerResult<T> = Result<T, LowerError>;
