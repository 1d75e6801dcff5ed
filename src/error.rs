use thiserror::Error;

use crate::{aig::AigError, sat::SatError};

/// The result of a classification operation.
pub type Result<T> = std::result::Result<T, FaultError>;

/// Error returned when building, resolving or classifying faults failed.
#[derive(Debug, Error)]
pub enum FaultError {
    /// No primary input, primary output or gate carries the given name.
    #[error("no input, output or gate is named `{0}`")]
    UnknownFaultTarget(String),

    /// Several nodes share the name the fault refers to.
    #[error("fault target `{name}` is ambiguous: {count} nodes share this name")]
    AmbiguousFaultTarget { name: String, count: usize },

    /// A redirect fault substitutes a function whose arity does not fit the target.
    #[error("fault {kind} cannot be placed on `{node}`: it has {found} fanin(s)")]
    FaultArityMismatch {
        kind: String,
        node: String,
        found: usize,
    },

    /// The fault kind token is not part of the vocabulary (nor a library cell name).
    #[error("unknown fault kind `{0}`")]
    UnknownFaultKind(String),

    /// The netlist is malformed.
    #[error("invalid netlist: {0}")]
    InvalidNetlist(String),

    /// The classification settings are malformed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Just forwarding an [`AigError`].
    #[error("{0}")]
    Aig(#[from] AigError),

    /// Just forwarding a [`SatError`].
    #[error("{0}")]
    Sat(#[from] SatError),

    /// The classification has reached an invalid state. This should never happen,
    /// and points at a bug in miter construction or simulation rather than at the data.
    #[error("the classification reached an invalid state - this should not happen - error: {0}")]
    InvalidState(String),
}

impl FaultError {
    /// Per-fault errors: the offending fault is skipped and the run goes on.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FaultError::UnknownFaultTarget(_)
                | FaultError::AmbiguousFaultTarget { .. }
                | FaultError::FaultArityMismatch { .. }
                | FaultError::UnknownFaultKind(_)
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn configuration_errors_test() {
        assert!(FaultError::UnknownFaultTarget("n1".to_string()).is_configuration());
        assert!(FaultError::UnknownFaultKind("SA2".to_string()).is_configuration());
        assert!(!FaultError::InvalidNetlist("cycle".to_string()).is_configuration());
        assert!(!FaultError::InvalidState("oops".to_string()).is_configuration());
    }

    #[test]
    fn display_test() {
        let e = FaultError::AmbiguousFaultTarget {
            name: "n1".to_string(),
            count: 2,
        };
        assert_eq!(
            e.to_string(),
            "fault target `n1` is ambiguous: 2 nodes share this name"
        );
    }
}
