//! # Construction Errors
//!
//! Every failure is raised synchronously while a classifier is being
//! selected, configured, or bound to a parameter scope; none are retryable.

use thiserror::Error;

/// Classifier construction error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArchError {
    /// The architecture name is not in the registry.
    #[error("architecture {name:?} does not exist, available ones are {valid:?}")]
    UnknownArchitecture {
        /// The requested name.
        name: String,

        /// Every registered name, in registry order.
        valid: Vec<&'static str>,
    },

    /// The input batch does not match the topology's fixed assumptions.
    #[error("{architecture}: input shape mismatch; expected {expected}, got {actual:?}")]
    ShapeMismatch {
        /// The architecture that rejected the input.
        architecture: String,

        /// Description of the accepted shapes.
        expected: String,

        /// The received dims.
        actual: Vec<usize>,
    },

    /// A hyperparameter is out of range for the selected topology.
    #[error("invalid hyperparameter {name}={value}; expected {expected}")]
    InvalidHyperparameter {
        /// Hyperparameter name.
        name: &'static str,

        /// Received value, rendered.
        value: String,

        /// Description of the accepted values.
        expected: String,
    },

    /// The dataset statistics are unusable.
    #[error("invalid dataset statistics: {0}")]
    InvalidStatistics(String),

    /// A parameter scope exists, but cannot be used as requested.
    #[error("parameter scope {scope:?}: {reason}")]
    ScopeConflict {
        /// Scope key.
        scope: String,

        /// What went wrong.
        reason: String,
    },

    /// Reuse of a parameter scope was required, but it was never created.
    #[error("parameter scope {scope:?} does not exist")]
    MissingScope {
        /// Scope key.
        scope: String,
    },
}

impl ArchError {
    /// Build an [`ArchError::InvalidHyperparameter`].
    pub fn invalid_hyperparameter<V: ToString, E: Into<String>>(
        name: &'static str,
        value: V,
        expected: E,
    ) -> Self {
        Self::InvalidHyperparameter {
            name,
            value: value.to_string(),
            expected: expected.into(),
        }
    }
}

/// Result alias for classifier construction.
///
/// The error parameter defaults to [`ArchError`] and may be overridden.
pub type Result<T, E = ArchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_architecture_message_lists_names() {
        let err = ArchError::UnknownArchitecture {
            name: "vgg".to_string(),
            valid: vec!["cnn13", "resnet"],
        };
        let message = err.to_string();
        assert!(message.contains("\"vgg\""));
        assert!(message.contains("\"cnn13\""));
        assert!(message.contains("\"resnet\""));
    }

    #[test]
    fn test_invalid_hyperparameter_helper() {
        let err = ArchError::invalid_hyperparameter("scales", 4, "3");
        assert_eq!(
            err,
            ArchError::InvalidHyperparameter {
                name: "scales",
                value: "4".to_string(),
                expected: "3".to_string(),
            }
        );
        assert_eq!(
            err.to_string(),
            "invalid hyperparameter scales=4; expected 3"
        );
    }

    #[test]
    fn test_result_alias_takes_an_error_override() {
        fn parse(text: &str) -> Result<usize, std::num::ParseIntError> {
            text.parse()
        }
        fn positive(value: usize) -> Result<usize> {
            if value == 0 {
                return Err(ArchError::invalid_hyperparameter("value", value, "value >= 1"));
            }
            Ok(value)
        }

        assert_eq!(parse("7"), Ok(7));
        assert!(parse("seven").is_err());
        assert_eq!(positive(3), Ok(3));
        assert!(positive(0).is_err());
    }
}
