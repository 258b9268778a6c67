use thiserror::Error;

use crate::api::ApiError;

/// Shown when the credential endpoint rejects without giving a reason
pub const GENERIC_REJECTION: &str = "Sign-in failed. Check your email and password.";

/// Shown when the credential endpoint cannot be reached or misbehaves
pub const GENERIC_UNAVAILABLE: &str = "Unable to reach the server. Please try again.";

/// Expected ways a login attempt ends without a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    #[error("Email and password required")]
    MissingCredentials,

    #[error("{reason}")]
    Rejected { reason: String },

    #[error("{}", GENERIC_UNAVAILABLE)]
    Unavailable,

    #[error("Could not save the session on this device")]
    Storage,

    /// A logout or invalidation happened while the attempt was in flight.
    #[error("Sign-in was cancelled")]
    Superseded,
}

impl LoginError {
    /// A reason in the error payload wins for any status; without one,
    /// refusals get the generic rejection and everything else is unavailable.
    pub(crate) fn from_api(err: &ApiError) -> Self {
        match err.reason() {
            Some(reason) => LoginError::Rejected {
                reason: reason.to_string(),
            },
            None if err.is_rejection() => LoginError::Rejected {
                reason: GENERIC_REJECTION.to_string(),
            },
            None => LoginError::Unavailable,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
    /// Client-side validation failed; nothing was sent
    #[error("{0}")]
    Invalid(String),

    #[error("{reason}")]
    Rejected { reason: String },

    #[error("{}", GENERIC_UNAVAILABLE)]
    Unavailable,
}

/// Shown when registration is refused without a reason
const GENERIC_REGISTER_REJECTION: &str = "Registration failed. Please try again.";

impl RegisterError {
    pub(crate) fn from_api(err: &ApiError) -> Self {
        match err.reason() {
            Some(reason) => RegisterError::Rejected {
                reason: reason.to_string(),
            },
            None if err.is_rejection() => RegisterError::Rejected {
                reason: GENERIC_REGISTER_REJECTION.to_string(),
            },
            None => RegisterError::Unavailable,
        }
    }
}
