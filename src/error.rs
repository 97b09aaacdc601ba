//! Error types for fault-tree analysis.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while building a model or running an analysis.
///
/// Numeric soundness violations of the approximations (a rare-event sum
/// above 1, a BDD probability escaping [0, 1] by rounding) are *not* errors;
/// they are recorded as human-readable warnings on the analysis.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid model construction: undefined child id, duplicate event id,
    /// vote number out of range, probability outside [0, 1], or a cyclic
    /// gate definition.
    #[error("model error: {0}")]
    Model(String),

    /// Internal invariant violation detected mid-pass. Fatal: the analysis
    /// aborts and no partial result is returned.
    #[error("logic error in {pass} at gate {index}: {msg}")]
    Logic {
        /// Name of the rewriting pass that detected the breach.
        pass: &'static str,
        /// Index of the offending gate.
        index: u32,
        msg: String,
    },

    /// Cut-set expansion exceeded the configured product cap.
    #[error("cut set limit exceeded: {size} products over the cap of {cap}")]
    LimitExceeded { cap: usize, size: usize },

    /// Invalid analysis settings.
    #[error("settings error: {0}")]
    Settings(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::Logic {
            pass: "normalize",
            index: 42,
            msg: "negative gate reference".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "logic error in normalize at gate 42: negative gate reference"
        );
    }
}
