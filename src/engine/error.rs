//! Engine error taxonomy
//!
//! `ApiError` is what a resource collaborator reports for a single remote call.
//! `ReconcileError` is what an engine operation reports to its caller.

use thiserror::Error;

/// Failure of one remote call made through a [`super::api::ResourceApi`]
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The appliance answered, but the object does not exist
    #[error("remote object not found")]
    NotFound,

    /// The appliance answered with a non-success status
    #[error("appliance returned {status}: {message}")]
    Status {
        status: u16,
        message: String,
        /// Raw response body, kept for diagnosis
        body: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode appliance response: {0}")]
    Decode(String),

    /// The request could not be built (missing scope value, bad path)
    #[error("invalid request: {0}")]
    Request(String),

    /// The resource kind has no endpoint for this call
    #[error("operation not supported by resource kind: {0}")]
    Unsupported(&'static str),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound)
    }

    /// Raw server body, when the appliance sent one
    pub fn body(&self) -> Option<&str> {
        match self {
            ApiError::Status { body, .. } if !body.is_empty() => Some(body),
            _ => None,
        }
    }
}

/// Failure of an engine operation
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Update target could not be resolved on the appliance
    #[error("{kind} not found on appliance ({identity})")]
    NotFound { kind: String, identity: String },

    #[error("{context}: {source}")]
    Api {
        context: String,
        #[source]
        source: ApiError,
    },

    /// Persisted identity could not be decoded; the stored handle is corrupt
    #[error("malformed identity {identity:?}: {reason}")]
    MalformedIdentity { identity: String, reason: String },

    #[error("invalid desired state: {0}")]
    InvalidDesiredState(String),
}

impl ReconcileError {
    pub fn api(context: impl Into<String>, source: ApiError) -> Self {
        ReconcileError::Api {
            context: context.into(),
            source,
        }
    }

    pub fn malformed(identity: &str, reason: impl Into<String>) -> Self {
        ReconcileError::MalformedIdentity {
            identity: identity.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_keeps_body() {
        let err = ApiError::Status {
            status: 500,
            message: "Internal Server Error".to_string(),
            body: r#"{"ERSResponse":{"messages":[{"title":"boom"}]}}"#.to_string(),
        };
        assert!(err.body().unwrap().contains("boom"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_api_context_in_message() {
        let err = ReconcileError::api("create network-device", ApiError::Transport("reset".into()));
        assert_eq!(err.to_string(), "create network-device: transport error: reset");
    }
}
