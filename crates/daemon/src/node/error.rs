use reqwest::StatusCode;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("HTTP status {0}: {1}")]
    HttpStatus(StatusCode, String),
}

/// Error body returned by Kubo's RPC API on non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct KuboErrorBody {
    #[serde(rename = "Message")]
    pub message: String,
}

impl ApiError {
    /// Build an `HttpStatus` error from a raw response body, preferring the
    /// `Message` field of a Kubo error document when there is one.
    pub(crate) fn from_status(status: StatusCode, body: String) -> Self {
        let message = serde_json::from_str::<KuboErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or(body);
        ApiError::HttpStatus(status, message)
    }

    /// The node accepted the request semantically but the desired state
    /// already holds (peer already connected, address already listed, ...).
    pub fn is_already_satisfied(&self) -> bool {
        match self {
            ApiError::HttpStatus(_, message) => {
                let message = message.to_ascii_lowercase();
                message.contains("already") || message.contains("dial to self")
            }
            _ => false,
        }
    }

    /// No node answered at all, as opposed to a node rejecting the call.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ApiError::Reqwest(e) if e.is_connect() || e.is_timeout())
    }

    /// `pin/rm` on something that is not (directly) pinned.
    pub fn is_not_pinned(&self) -> bool {
        matches!(self, ApiError::HttpStatus(_, message) if message.contains("not pinned"))
    }
}
