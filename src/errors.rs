//! Error taxonomy for the client.
//!
//! A single [`ClientError`] enum covers every failure kind the core can
//! surface: malformed documents, registry misuse, transport failures, and
//! server-reported API errors. Every public fallible operation in this crate
//! returns `Result<T, ClientError>`.

use thiserror::Error;

use crate::deserializer::ApiError;
use crate::transport::TransportError;

/// Which side of the wire a failure originated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDomain {
    /// The failure was detected locally (malformed document, unregistered
    /// type, local validation).
    Client,
    /// The server reported the failure (status >= 400, or an non-empty
    /// `errors[]` array in the response document).
    Server,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("document is not a JSON object")]
    InvalidDocumentStructure,

    #[error("top-level document must contain at least one of data, errors, meta")]
    TopLevelEntryMissing,

    #[error("top-level document cannot contain both data and errors")]
    TopLevelDataAndErrorsCoexist,

    #[error("resource representation is not an object")]
    InvalidResourceStructure,

    #[error("resource object is missing required field 'type'")]
    ResourceTypeMissing,

    #[error("resource object is missing required field 'id'")]
    ResourceIDMissing,

    #[error("resource type '{0}' is not registered with this client")]
    ResourceTypeUnregistered(String),

    #[error("network error (status {code})")]
    NetworkError { code: u16 },

    #[error("server reported {} error(s), first: {}", .errors.len(), first_error_summary(.errors))]
    ServerError { code: u16, errors: Vec<ApiError> },

    #[error("resource not found")]
    ResourceNotFound,

    #[error("no next page is available for this collection")]
    NextPageNotAvailable,

    #[error("no previous page is available for this collection")]
    PreviousPageNotAvailable,

    #[error("operation was cancelled")]
    Cancelled,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn first_error_summary(errors: &[ApiError]) -> String {
    errors
        .first()
        .and_then(|e| e.title.clone())
        .unwrap_or_else(|| "(no title)".to_string())
}

impl ClientError {
    /// Which side of the wire this error originated on.
    pub fn domain(&self) -> ErrorDomain {
        match self {
            ClientError::NetworkError { .. } | ClientError::ServerError { .. } => ErrorDomain::Server,
            _ => ErrorDomain::Client,
        }
    }

    /// The first server-reported `ApiError`, if this is a `ServerError`.
    pub fn first_api_error(&self) -> Option<&ApiError> {
        match self {
            ClientError::ServerError { errors, .. } => errors.first(),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_error_is_server_domain() {
        let err = ClientError::NetworkError { code: 503 };
        assert_eq!(err.domain(), ErrorDomain::Server);
    }

    #[test]
    fn missing_type_is_client_domain() {
        let err = ClientError::ResourceTypeMissing;
        assert_eq!(err.domain(), ErrorDomain::Client);
    }
}
