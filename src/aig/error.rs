use std::num::TryFromIntError;

use thiserror::Error;

use super::NodeId;

/// The result of an AIG operation.
pub type Result<T> = std::result::Result<T, AigError>;

/// Error returned when an AIG operation failed.
#[derive(Debug, Error)]
pub enum AigError {
    /// The id 0 is reserved for the `False` constant node only.
    #[error("id=0 is for node False only")]
    IdZeroButNotFalse,

    /// The node with given id does not exist.
    #[error("node with id={0} does not exist")]
    NodeDoesNotExist(NodeId),

    /// The number of values given for an evaluation does not match the number of inputs.
    #[error("expected {expected} input values, got {found}")]
    InputCountMismatch { expected: usize, found: usize },

    /// A node id could not be turned into a SAT literal.
    #[error("node id could not be converted to a literal: {0}")]
    NodeIdToLit(#[from] TryFromIntError),

    /// The AIG has reached an invalid state. This should never happen.
    /// For example, when tracking the nodes internally with the hashmap nodes,
    /// node `nodes[id]` should have id `id`.
    #[error("the AIG has reached an invalid state - this should not happen - error: {0}")]
    InvalidState(String),
}
