use serde_json::Value;
use session::{Role, StorageError};
use thiserror::Error;

pub const GENERIC_MESSAGE: &str = "Something went wrong. Please try again.";

#[derive(Error, Debug)]
pub enum ClientError {
    /// The backend rejected the stored token. The session has already been
    /// cleared by the time the caller sees this.
    #[error("your session has expired; please log in again")]
    SessionExpired,

    /// Rejected locally by the role guard; no request was sent.
    #[error("this action requires the {} role", describe_roles(.required))]
    Unauthorized {
        required: Vec<Role>,
        actual: Option<Role>,
    },

    #[error("{message}")]
    Api { message: String, status: u16 },

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("client configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Transport-level failure: the request may never have reached the
    /// backend, so it is safe to queue and retry later.
    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::Network(_) | ClientError::Timeout)
    }

    /// The user must be sent back to the login screen.
    pub fn requires_login(&self) -> bool {
        matches!(self, ClientError::SessionExpired)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::SessionExpired => Some(401),
            _ => None,
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        ClientError::Validation(msg.into())
    }

    /// Normalizes a non-2xx response.
    ///
    /// Message precedence: server-supplied `message` (or `error`) string,
    /// then the transport reason phrase, then [`GENERIC_MESSAGE`].
    pub fn from_response(status: u16, reason: Option<&str>, body: &str) -> Self {
        let message = server_message(body)
            .or_else(|| {
                reason.map(|r| format!("Request failed with status code {status} ({r})"))
            })
            .unwrap_or_else(|| GENERIC_MESSAGE.to_string());

        ClientError::Api { message, status }
    }

    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ClientError::Timeout;
        }
        if err.is_builder() {
            return ClientError::Config(err.to_string());
        }
        if let (true, Some(status)) = (err.is_decode(), err.status()) {
            return ClientError::Api {
                message: format!("invalid response from server: {err}"),
                status: status.as_u16(),
            };
        }
        ClientError::Network(err.to_string())
    }
}

fn server_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;

    ["message", "error"]
        .iter()
        .filter_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::trim)
        .find(|msg| !msg.is_empty())
        .map(str::to_string)
}

fn describe_roles(roles: &[Role]) -> String {
    match roles {
        [] => "no".to_string(),
        [only] => only.to_string(),
        many => many
            .iter()
            .map(Role::as_str)
            .collect::<Vec<_>>()
            .join(" or "),
    }
}
