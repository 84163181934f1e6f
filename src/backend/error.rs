use std::io;

/// Failure of a backend request.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Session expired; sign in again")]
    SessionExpired,
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Server error {status}: {body}")]
    Server { status: u16, body: String },
    #[error("HTTP error: {0}")]
    Transport(String),
    #[error("JSON error: {0}")]
    Json(String),
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl BackendError {
    /// Short cause code shown next to failure messages.
    pub fn code(&self) -> String {
        match self {
            Self::SessionExpired => "401".to_string(),
            Self::BadRequest(_) => "400".to_string(),
            Self::Server { status, .. } => status.to_string(),
            Self::Transport(_) => "network".to_string(),
            Self::Json(_) => "parse".to_string(),
            Self::InvalidUrl(_) => "url".to_string(),
            Self::Io(_) => "io".to_string(),
        }
    }

    /// The one failure message every operation shows.
    pub fn user_message(&self, operation: &str) -> String {
        format!("{operation} failed, please retry ({})", self.code())
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Worth another attempt for idempotent requests.
    pub(crate) fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub(crate) fn map_status_error(code: u16, body: String) -> BackendError {
    match code {
        400 => BackendError::BadRequest(body),
        401 => BackendError::SessionExpired,
        _ => BackendError::Server { status: code, body },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_variants() {
        assert!(map_status_error(401, String::new()).is_session_expired());
        assert!(matches!(map_status_error(400, "bad".into()), BackendError::BadRequest(body) if body == "bad"));
        assert!(matches!(
            map_status_error(503, String::new()),
            BackendError::Server { status: 503, .. }
        ));
        assert!(matches!(
            map_status_error(404, String::new()),
            BackendError::Server { status: 404, .. }
        ));
    }

    #[test]
    fn user_message_names_operation_and_code() {
        let err = BackendError::Server {
            status: 502,
            body: "gateway".to_string(),
        };
        assert_eq!(err.user_message("Submit changes"), "Submit changes failed, please retry (502)");
        assert_eq!(
            BackendError::Transport("refused".into()).user_message("Load files"),
            "Load files failed, please retry (network)"
        );
    }

    #[test]
    fn only_transport_and_5xx_are_retryable() {
        assert!(BackendError::Transport(String::new()).is_retryable());
        assert!(map_status_error(500, String::new()).is_retryable());
        assert!(!map_status_error(429, String::new()).is_retryable());
        assert!(!BackendError::SessionExpired.is_retryable());
    }
}
