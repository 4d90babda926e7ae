pub type ClientResult<T> = Result<T, ClientError>;

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("session expired: {0}")]
    SessionExpired(String),
    #[error("could not load permissions")]
    PermissionsUnavailable,
    #[error("decode error: {0}")]
    Decode(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("session store error: {0}")]
    Session(String),
    #[error("validation error: {0}")]
    Validation(String),
}

impl ClientError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    pub fn session_expired(message: impl Into<String>) -> Self {
        Self::SessionExpired(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn session(message: impl Into<String>) -> Self {
        Self::Session(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// HTTP status carried by the error, if the backend answered at all.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Short machine-readable kind, used in log fields and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::Transport(_) => "transport",
            ClientError::Status { .. } => "status",
            ClientError::SessionExpired(_) => "session_expired",
            ClientError::PermissionsUnavailable => "permissions_unavailable",
            ClientError::Decode(_) => "decode",
            ClientError::Configuration(_) => "configuration",
            ClientError::Session(_) => "session",
            ClientError::Validation(_) => "validation",
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}
