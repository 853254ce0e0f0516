use anyhow::{anyhow, Context};
use serde_json::json;

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Null byte in string is not allowed {0:?}")]
    NullByteInString(String),

    #[error("Comment {0} is still being posted")]
    CommentStillPending(String),
}

impl Error {
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::PermissionDenied => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::Server(_) => StatusCode::BAD_GATEWAY,
            Error::Network(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Error::NullByteInString(_) => StatusCode::BAD_REQUEST,
            Error::CommentStillPending(_) => StatusCode::CONFLICT,
        }
    }

    /// The message as the backend worded it, used to recognize backend
    /// conventions that are folded into the error channel.
    pub fn message(&self) -> String {
        match self {
            Error::Unknown(msg)
            | Error::NotFound(msg)
            | Error::InvalidRequest(msg)
            | Error::Server(msg)
            | Error::Network(msg) => msg.clone(),
            _ => self.to_string(),
        }
    }

    /// Whether retrying the same request later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Unknown(_) | Error::Server(_) | Error::Network(_) | Error::Timeout => true,
            Error::PermissionDenied
            | Error::NotFound(_)
            | Error::InvalidRequest(_)
            | Error::NullByteInString(_)
            | Error::CommentStillPending(_) => false,
        }
    }

    /// Build an error out of a non-successful HTTP response.
    ///
    /// The backend answers either with a typed body as produced by
    /// [`Error::contents`], with a bare `{ "message": ... }` object, or with
    /// plain text.
    pub fn from_response(status: http::StatusCode, body: &[u8]) -> Error {
        use http::StatusCode;
        if let Ok(err) = Error::parse(body) {
            return err;
        }
        let message = serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.get("message")
                    .and_then(|m| m.as_str())
                    .map(String::from)
            })
            .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::PermissionDenied,
            StatusCode::NOT_FOUND => Error::NotFound(message),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => Error::Timeout,
            s if s.is_server_error() => Error::Server(message),
            s if s.is_client_error() => Error::InvalidRequest(message),
            _ => Error::Unknown(message),
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({
                "message": msg,
                "type": "unknown",
            }),
            Error::PermissionDenied => json!({
                "message": "permission denied",
                "type": "permission-denied",
            }),
            Error::NotFound(msg) => json!({
                "message": msg,
                "type": "not-found",
            }),
            Error::InvalidRequest(msg) => json!({
                "message": msg,
                "type": "invalid-request",
            }),
            Error::Server(msg) => json!({
                "message": msg,
                "type": "server",
            }),
            Error::Network(msg) => json!({
                "message": msg,
                "type": "network",
            }),
            Error::Timeout => json!({
                "message": "request timed out",
                "type": "timeout",
            }),
            Error::NullByteInString(s) => json!({
                "message": "there was a null byte in argument string",
                "type": "null-byte",
                "string": s,
            }),
            Error::CommentStillPending(id) => json!({
                "message": "comment is still being posted",
                "type": "comment-pending",
                "id": id,
            }),
        })
        .expect("serializing error contents")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        let message = || {
            String::from(
                data.get("message")
                    .and_then(|msg| msg.as_str())
                    .unwrap_or(""),
            )
        };
        Ok(
            match data
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| anyhow!("error type is not a string"))?
            {
                "unknown" => Error::Unknown(message()),
                "permission-denied" => Error::PermissionDenied,
                "not-found" => Error::NotFound(message()),
                "invalid-request" => Error::InvalidRequest(message()),
                "server" => Error::Server(message()),
                "network" => Error::Network(message()),
                "timeout" => Error::Timeout,
                "null-byte" => Error::NullByteInString(String::from(
                    data.get("string").and_then(|s| s.as_str()).ok_or_else(|| {
                        anyhow!("error is a null-byte-in-string without a string")
                    })?,
                )),
                "comment-pending" => Error::CommentStillPending(String::from(
                    data.get("id")
                        .and_then(|id| id.as_str())
                        .ok_or_else(|| anyhow!("error is a pending comment without an id"))?,
                )),
                _ => return Err(anyhow!("error contents has unknown type")),
            },
        )
    }
}
