//! Fatal error taxonomy.
//!
//! Readiness lookups never produce an [`Error`]: failures there are absorbed
//! by the legacy `Endpoints` fallback (see [`ReadinessResolver`](crate::ReadinessResolver)).

use std::time::Duration;

use crate::source::SourceError;

/// Result type for scan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that stop a scan, and the process with it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Conflicting scope flags or an unusable credentials source.
    #[error("{0}")]
    Config(String),

    /// Loading the kube client configuration failed.
    #[error("kubeconfig: {0}")]
    Kubeconfig(#[from] kube::config::InferConfigError),

    /// Building the typed API client failed.
    #[error("client: {0}")]
    Client(#[source] kube::Error),

    /// Listing services failed.
    #[error("scan: listing services: {0}")]
    Enumeration(#[source] SourceError),

    /// Listing services did not finish within the request timeout.
    #[error("scan: listing services timed out after {0:?}")]
    EnumerationTimeout(Duration),

    /// The idle service gauge could not be created or encoded.
    #[error("metrics registry: {0}")]
    Registry(#[from] prometheus::Error),

    /// The metrics listener could not be started.
    #[error("metrics listener on {addr}: {source}")]
    Metrics {
        /// Address the listener tried to bind.
        addr: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Process exit code for this error.
    ///
    /// Every fatal error maps to `2`; `1` is reserved for "idle services found".
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_)
            | Self::Kubeconfig(_)
            | Self::Client(_)
            | Self::Enumeration(_)
            | Self::EnumerationTimeout(_)
            | Self::Registry(_)
            | Self::Metrics { .. } => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_displays_message_verbatim() {
        let err = Error::Config("use either -A or --namespace, not both".to_string());
        assert_eq!(err.to_string(), "use either -A or --namespace, not both");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn enumeration_error_keeps_source_message() {
        let err = Error::Enumeration("services is forbidden".into());
        assert_eq!(err.to_string(), "scan: listing services: services is forbidden");
    }

    #[test]
    fn enumeration_timeout_is_fatal() {
        let err = Error::EnumerationTimeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "scan: listing services timed out after 5s");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn registry_error_is_fatal() {
        let err = Error::from(prometheus::Error::AlreadyReg);
        assert!(err.to_string().starts_with("metrics registry: "));
        assert_eq!(err.exit_code(), 2);
    }
}
