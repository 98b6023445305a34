//! Error types for CRM API access.

use thiserror::Error;

/// Errors that can occur while fetching a page from the CRM.
#[derive(Debug, Error)]
pub enum CrmError {
    /// The request never produced a response (connect, timeout, TLS).
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// The CRM answered with a non-success status.
    #[error("CRM API error {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not the expected JSON shape.
    #[error("failed to decode CRM response: {0}")]
    Decode(String),
}

impl CrmError {
    /// HTTP status of the upstream response, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            CrmError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CrmError::Status {
            status: 401,
            body: "expired token".to_string(),
        };
        assert_eq!(err.to_string(), "CRM API error 401: expired token");
        assert_eq!(err.status(), Some(401));

        let err = CrmError::Decode("missing field `id`".to_string());
        assert_eq!(err.status(), None);
        assert!(err.to_string().contains("missing field"));
    }
}
