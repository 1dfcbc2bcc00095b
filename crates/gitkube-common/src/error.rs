//! Error types for gitkube
//!
//! Kubernetes API failures are classified by status code at the store
//! boundary so callers can tell a missing object from a refused request or a
//! lost optimistic-concurrency race without inspecting raw responses.

use thiserror::Error;

/// Main error type for gitkube operations
#[derive(Debug, Error)]
pub enum Error {
    /// The requested object does not exist (HTTP 404)
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Resource kind (e.g. "Secret")
        kind: String,
        /// Namespace of the object
        namespace: String,
        /// Name of the object
        name: String,
    },

    /// The controller is not allowed to access the object (HTTP 403)
    #[error("access to {kind} {namespace}/{name} forbidden")]
    Forbidden {
        /// Resource kind (e.g. "Secret")
        kind: String,
        /// Namespace of the object
        namespace: String,
        /// Name of the object
        name: String,
    },

    /// The object changed since it was read (HTTP 409)
    #[error("conflict updating {kind} {namespace}/{name}: {message}")]
    Conflict {
        /// Resource kind (e.g. "Deployment")
        kind: String,
        /// Namespace of the object
        namespace: String,
        /// Name of the object
        name: String,
        /// Message returned by the API server
        message: String,
    },

    /// Any other Kubernetes API or transport error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g. "reconciler", "restart")
        context: String,
    },
}

impl Error {
    /// Classify a kube-rs error for the object `kind` `namespace/name`
    ///
    /// 404, 403 and 409 responses map to `NotFound`, `Forbidden` and
    /// `Conflict`; everything else is kept as `Kube`.
    pub fn from_kube(
        err: kube::Error,
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 404 => Self::NotFound {
                kind: kind.into(),
                namespace: namespace.into(),
                name: name.into(),
            },
            kube::Error::Api(ae) if ae.code == 403 => Self::Forbidden {
                kind: kind.into(),
                namespace: namespace.into(),
                name: name.into(),
            },
            kube::Error::Api(ae) if ae.code == 409 => Self::Conflict {
                kind: kind.into(),
                namespace: namespace.into(),
                name: name.into(),
                message: ae.message,
            },
            other => Self::Kube { source: other },
        }
    }

    /// Create a not-found error
    pub fn not_found(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Whether the object was modified concurrently
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    /// Whether the object does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Short machine-readable label, used for log fields and metric labels
    pub fn reason(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::Forbidden { .. } => "forbidden",
            Error::Conflict { .. } => "conflict",
            Error::Kube { .. } => "kube",
            Error::Serialization { .. } => "serialization",
            Error::Internal { .. } => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16, message: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: message.to_string(),
            reason: String::new(),
            code,
        })
    }

    #[test]
    fn classifies_api_status_codes() {
        let err = Error::from_kube(api_error(404, "gone"), "Secret", "ns1", "regsecret");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Secret ns1/regsecret not found");

        let err = Error::from_kube(api_error(403, "nope"), "Secret", "ns1", "regsecret");
        assert!(matches!(err, Error::Forbidden { .. }));
        assert_eq!(err.reason(), "forbidden");

        let err = Error::from_kube(api_error(409, "stale"), "Deployment", "ns1", "web");
        assert!(err.is_conflict());
        assert!(err.to_string().contains("stale"));
    }

    #[test]
    fn other_api_errors_stay_kube_errors() {
        let err = Error::from_kube(api_error(500, "boom"), "Remote", "", "");
        assert!(matches!(err, Error::Kube { .. }));
        assert_eq!(err.reason(), "kube");
        assert!(!err.is_conflict());
    }

    #[test]
    fn serialization_errors_are_labelled() {
        let err = Error::serialization("bad document");
        assert_eq!(err.to_string(), "serialization error: bad document");
        assert_eq!(err.reason(), "serialization");
    }

    #[test]
    fn internal_errors_carry_context() {
        let err = Error::internal_with_context("restart", "deployment has no spec");
        assert_eq!(
            err.to_string(),
            "internal error [restart]: deployment has no spec"
        );
    }
}
