//! Response Envelope Classifier
//!
//! Every backend endpoint answers with `{ status: "success", data }` or
//! `{ status: "error", message }`. This module turns a raw response into the
//! typed payload or one of the [`ApiFailure`] categories, so callers never
//! branch on HTTP status codes themselves.
//!
//! Classification order:
//! 1. Parse the body as an envelope. On failure, fall through to the status.
//! 2. Unparseable body: 502, 503/504 and 500 map to their own categories,
//!    any other status to [`ApiFailure::RequestFailed`].
//! 3. Parsed `error` envelope: [`ApiFailure::Application`].
//! 4. Parsed `success` envelope: the `data` payload.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire envelope shared by all backend endpoints
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Envelope<T> {
    Success { data: T },
    Error { message: String },
}

/// Failure categories a remote call can end in
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum ApiFailure {
    #[error("502 Bad Gateway, please try again in a moment")]
    GatewayUnavailable,

    #[error("{status} Gateway Timeout, the server is overloaded right now")]
    GatewayTimeout { status: u16 },

    #[error("500 Internal Server Error, please wait while the server recovers")]
    InternalServerError,

    #[error("{} error: the server returned {status} {status_text}", failing_side(.status))]
    RequestFailed { status: u16, status_text: String },

    #[error("Error: {0}")]
    Application(String),
}

impl ApiFailure {
    /// Category for a response whose body could not be understood
    pub fn from_status(status: u16, status_text: &str) -> Self {
        match status {
            502 => Self::GatewayUnavailable,
            503 | 504 => Self::GatewayTimeout { status },
            500 => Self::InternalServerError,
            _ => Self::RequestFailed {
                status,
                status_text: status_text.to_string(),
            },
        }
    }

    /// HTTP status attached to the failure, when there is one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::GatewayUnavailable => Some(502),
            Self::GatewayTimeout { status } => Some(*status),
            Self::InternalServerError => Some(500),
            Self::RequestFailed { status, .. } => Some(*status),
            Self::Application(_) => None,
        }
    }
}

fn failing_side(status: &u16) -> &'static str {
    if *status > 500 {
        "Server"
    } else {
        "Request"
    }
}

/// A fully read HTTP response, detached from the transport
#[derive(Clone, Debug)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            body: body.into(),
        }
    }

    /// Reads the whole body of a reqwest response
    pub async fn read(response: reqwest::Response) -> Result<Self, reqwest::Error> {
        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or("").to_string();
        let body = response.bytes().await?.to_vec();
        Ok(Self {
            status: status.as_u16(),
            status_text,
            body,
        })
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Classifies this response into a payload or a failure category
    pub fn classify<T: DeserializeOwned>(&self) -> Result<T, ApiFailure> {
        classify(self.status, &self.status_text, &self.body)
    }
}

/// Classifies a response into its `data` payload or an [`ApiFailure`].
pub fn classify<T: DeserializeOwned>(
    status: u16,
    status_text: &str,
    body: &[u8],
) -> Result<T, ApiFailure> {
    match serde_json::from_slice::<Envelope<T>>(body) {
        Ok(Envelope::Success { data }) => Ok(data),
        Ok(Envelope::Error { message }) => Err(ApiFailure::Application(message)),
        Err(e) => {
            tracing::debug!(status, "Response body is not an envelope: {}", e);
            Err(ApiFailure::from_status(status, status_text))
        }
    }
}
