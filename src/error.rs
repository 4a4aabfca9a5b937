use reqwest::StatusCode;
use thiserror::Error;

pub const NETWORK_HINT: &str = "Cannot reach the server. Check your connection and the API URL.";

/// Everything that can go wrong talking to the task API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No response was received: DNS, refused connection, timeout or a broken body stream.
    #[error("could not reach the server: {0}")]
    Network(#[source] reqwest::Error),

    #[error("{message}")]
    Http { status: StatusCode, message: String },

    /// 2xx response whose envelope says `success: false`.
    #[error("{0}")]
    Rejected(String),

    #[error("unexpected response from server: {0}")]
    UnexpectedResponse(String),
}

impl ApiError {
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }

    /// Text for notifications. Network failures get a fixed hint instead of the
    /// transport error.
    pub fn user_message(&self) -> String {
        if self.is_network() {
            NETWORK_HINT.to_string()
        } else {
            self.to_string()
        }
    }

    /// Generic `HTTP <status>: <reason>` message used when the body carries none.
    pub fn generic_http(status: StatusCode) -> Self {
        ApiError::Http {
            status,
            message: format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to write session file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode session data: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("no data directory available; set data_dir in the config file")]
    NoDataDir,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_http_message() {
        let err = ApiError::generic_http(StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "HTTP 404: Not Found");
        assert!(matches!(err, ApiError::Http { status: StatusCode::NOT_FOUND, .. }));
        assert!(!err.is_network());
        assert_eq!(err.user_message(), "HTTP 404: Not Found");
    }
}
