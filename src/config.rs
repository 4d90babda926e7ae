use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use crate::errors::ClientError;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SESSION_FILE: &str = ".erp-session.json";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub timeout: Duration,
    pub session_file: PathBuf,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
        })
    }

    pub fn from_env() -> Result<Self, ClientError> {
        let base_url = std::env::var("API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let timeout_secs = std::env::var("API_TIMEOUT_SECS")
            .map(|val| val.parse::<u64>())
            .unwrap_or(Ok(DEFAULT_TIMEOUT_SECS))
            .map_err(|_| ClientError::configuration("API_TIMEOUT_SECS must be a valid integer"))?;
        if timeout_secs == 0 {
            return Err(ClientError::configuration("API_TIMEOUT_SECS must be greater than zero"));
        }
        let session_file = std::env::var("ERP_SESSION_FILE").unwrap_or_else(|_| DEFAULT_SESSION_FILE.to_string());

        Ok(Self {
            base_url: parse_base_url(&base_url)?,
            timeout: Duration::from_secs(timeout_secs),
            session_file: PathBuf::from(session_file),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = path.into();
        self
    }
}

// `Url::join` drops the last path segment unless it ends with a slash.
fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized).map_err(|err| ClientError::configuration(format!("API_BASE_URL is invalid: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_keeps_path_prefix() {
        let config = ClientConfig::new("http://erp.local/api").unwrap();
        assert_eq!(config.base_url.as_str(), "http://erp.local/api/");
        assert_eq!(
            config.base_url.join("auth/login").unwrap().as_str(),
            "http://erp.local/api/auth/login"
        );
    }

    #[test]
    fn invalid_base_url_is_a_configuration_error() {
        let err = ClientConfig::new("not a url").unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));
    }
}
