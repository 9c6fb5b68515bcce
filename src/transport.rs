//! Pluggable HTTP transport.
//!
//! The core never constructs a concrete HTTP client. Every operation goes
//! through the [`Transport`] trait, which is the only seam between this
//! crate and the network, rather than threading connection types through
//! every layer.

use async_trait::async_trait;
use std::fmt;

/// HTTP methods the core issues. JSON:API never needs more than these four.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

/// A raw HTTP response as handed back by a transport.
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Option<Vec<u8>>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_api_failure(&self) -> bool {
        (400..600).contains(&self.status)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport-level failure: {0}")]
    Failed(String),
}

/// The sole collaborator the core depends on for network access.
///
/// Implementations are expected to be cheap to clone/share (an `Arc` around
/// an HTTP client, typically) since the client facade holds one for the
/// lifetime of the process.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<TransportResponse, TransportError>;
}

/// Default transport backed by `reqwest`, gated behind the `reqwest-transport`
/// feature so the core itself stays free of a hard HTTP-client dependency.
#[cfg(feature = "reqwest-transport")]
pub mod reqwest_transport {
    use super::*;

    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new() -> Self {
            Self { client: reqwest::Client::new() }
        }

        pub fn with_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    impl Default for ReqwestTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl Transport for ReqwestTransport {
        async fn execute(
            &self,
            method: Method,
            url: &str,
            body: Option<Vec<u8>>,
        ) -> Result<TransportResponse, TransportError> {
            let reqwest_method = match method {
                Method::Get => reqwest::Method::GET,
                Method::Post => reqwest::Method::POST,
                Method::Patch => reqwest::Method::PATCH,
                Method::Delete => reqwest::Method::DELETE,
            };

            let mut request = self
                .client
                .request(reqwest_method, url)
                .header("Content-Type", "application/vnd.api+json")
                .header("Accept", "application/vnd.api+json");

            if let Some(body) = body {
                request = request.body(body);
            }

            let response = request
                .send()
                .await
                .map_err(|err| TransportError::Failed(err.to_string()))?;

            let status = response.status().as_u16();
            let bytes = response
                .bytes()
                .await
                .map_err(|err| TransportError::Failed(err.to_string()))?;

            Ok(TransportResponse {
                status,
                body: if bytes.is_empty() { None } else { Some(bytes.to_vec()) },
            })
        }
    }
}

#[cfg(feature = "reqwest-transport")]
pub use reqwest_transport::ReqwestTransport;
