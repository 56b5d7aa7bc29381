// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use crate::provider::ProviderError;
use crate::EngineState;

#[derive(Debug)]
/// Represents errors that can occur while driving a [`SamplingEngine`](crate::SamplingEngine).
///
/// Lifecycle misuse is reported synchronously to the caller of
/// [`start`](crate::SamplingEngine::start), [`stop`](crate::SamplingEngine::stop) or
/// [`reset`](crate::SamplingEngine::reset). Per-tick provider failures are recovered
/// inside the engine as dropped samples and never returned from a control operation.
pub enum Error {
    /// The sampler configuration is invalid (for example a zero sampling interval)
    Configuration {
        /// Additional context about the error
        details: String,
    },
    /// An operation was requested in a lifecycle state that does not allow it
    InvalidState {
        /// The operation that was rejected (e.g., "reset")
        operation: &'static str,
        /// The state the engine was in when the operation was requested
        state: EngineState,
    },
    /// A metrics provider could not produce a reading for a tick
    ProviderUnavailable {
        /// Name of the provider that failed
        provider: &'static str,
        /// The original provider error
        source: ProviderError,
    },
    /// An internal invariant of the engine was broken
    InvariantViolation {
        /// Additional context about the violated invariant
        details: String,
    },
    /// The background runtime used to drive ticks could not be created
    Runtime {
        /// Additional context about the error
        details: String,
    },
}

/// Implementation of the Display trait for Error enum.
///
/// Provides human-readable error messages for each error variant.
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Configuration { details } => {
                write!(f, "Invalid sampler configuration: {details}")
            }
            Error::InvalidState { operation, state } => {
                write!(
                    f,
                    "Operation '{}' is not allowed while the sampler is {}",
                    operation, state
                )
            }
            Error::ProviderUnavailable { provider, source } => {
                write!(f, "Metrics provider '{}' is unavailable: {}", provider, source)
            }
            Error::InvariantViolation { details } => {
                write!(f, "Sampler invariant violated: {details}")
            }
            Error::Runtime { details } => {
                write!(f, "Sampler runtime error: {details}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ProviderUnavailable { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// A Result type specialized for sampler operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_display_messages() {
        let err = Error::Configuration {
            details: "interval must be greater than zero".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid sampler configuration: interval must be greater than zero"
        );

        let err = Error::InvalidState {
            operation: "reset",
            state: EngineState::Running,
        };
        assert_eq!(
            err.to_string(),
            "Operation 'reset' is not allowed while the sampler is running"
        );
    }

    #[test]
    fn test_provider_error_is_source() {
        let err = Error::ProviderUnavailable {
            provider: "process",
            source: ProviderError::Unavailable {
                details: "statm unreadable".to_string(),
            },
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("process"));
        assert!(err.to_string().contains("statm unreadable"));

        let err = Error::Runtime {
            details: "no threads".to_string(),
        };
        assert!(err.source().is_none());
    }
}
