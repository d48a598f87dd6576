//! Request error taxonomy
//!
//! Every failure path surfaces one of these codes in a structured response;
//! stack traces and provider internals never leak to the caller.

use std::time::Duration;

use thiserror::Error;

/// Fatal or recoverable request-level errors
#[derive(Debug, Error)]
pub enum PlanError {
    /// Input failed validation in a way clarification cannot fix
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// A required external provider could not serve the request
    #[error("provider unavailable: {provider}")]
    ProviderUnavailable { provider: String },

    /// The request deadline elapsed; in-flight external calls were released
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// A state the validator should make unreachable escaped anyway
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    /// Client exceeded its token bucket
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
}

impl PlanError {
    /// Stable machine-readable code for the response body
    pub fn code(&self) -> &'static str {
        match self {
            Self::InputInvalid(_) => "input_invalid",
            Self::ProviderUnavailable { .. } => "provider_unavailable",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::InternalInvariant(_) => "internal_invariant_violated",
            Self::RateLimited { .. } => "rate_limited",
        }
    }

    /// Whether the client can usefully retry or rephrase
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InputInvalid(_) | Self::ProviderUnavailable { .. } | Self::RateLimited { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(PlanError::DeadlineExceeded.code(), "deadline_exceeded");
        assert_eq!(
            PlanError::ProviderUnavailable {
                provider: "map".to_string()
            }
            .code(),
            "provider_unavailable"
        );
        assert_eq!(
            PlanError::InternalInvariant("dup poi".to_string()).code(),
            "internal_invariant_violated"
        );
    }

    #[test]
    fn test_recoverability() {
        assert!(PlanError::InputInvalid("no city".to_string()).is_recoverable());
        assert!(!PlanError::DeadlineExceeded.is_recoverable());
        assert!(!PlanError::InternalInvariant("x".to_string()).is_recoverable());
    }
}
