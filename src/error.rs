//! Error taxonomy shared by the codec, the stores and the service layer.

use thiserror::Error;

/// Failures surfaced by geoapi operations.
///
/// `EntityNotFound` is kept apart from `BackendFault` so callers can answer
/// "nothing there" instead of "server error".
#[derive(Debug, Error)]
pub enum GeoError {
    /// Coordinate payload has the wrong nesting or non-numeric leaves
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A lookup by key matched nothing
    #[error("{0} not found")]
    EntityNotFound(String),

    /// Required caller-supplied fields are absent
    #[error("missing parameters: {0}")]
    MissingParameters(String),

    /// A supplied value violates a domain constraint (range, sign, ...)
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The storage engine is unreachable or answered with something unusable
    #[error("backend fault: {0:#}")]
    BackendFault(#[from] anyhow::Error),
}

impl GeoError {
    pub fn invalid_geometry(msg: impl Into<String>) -> Self {
        GeoError::InvalidGeometry(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        GeoError::EntityNotFound(what.into())
    }

    pub fn missing(what: impl Into<String>) -> Self {
        GeoError::MissingParameters(what.into())
    }

    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        GeoError::InvalidParameter(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GeoError::EntityNotFound(_))
    }
}

pub type Result<T, E = GeoError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_backend_fault_keeps_context_chain() {
        let inner: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        let err: GeoError = inner.context("Failed to reach Elasticsearch").unwrap_err().into();

        let msg = err.to_string();
        assert!(msg.starts_with("backend fault: Failed to reach Elasticsearch"));
        assert!(msg.contains("connection refused"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_found_message() {
        let err = GeoError::not_found("city 123");
        assert_eq!(err.to_string(), "city 123 not found");
        assert!(err.is_not_found());
    }
}
