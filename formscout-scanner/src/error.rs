use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Timed out after {after:?} while {action}")]
    Timeout { action: String, after: Duration },

    #[error("Browser driver error: {0}")]
    Driver(String),

    #[error("Failed to launch browser driver: {0}")]
    Launch(String),

    #[error("Operation not supported by this driver: {0}")]
    Unsupported(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

impl ScanError {
    pub fn timeout(action: impl Into<String>, after: Duration) -> Self {
        ScanError::Timeout {
            action: action.into(),
            after,
        }
    }

    /// Whether retrying the same work on a fresh page could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ScanError::Navigation { .. } | ScanError::Timeout { .. } => true,
            ScanError::HttpError(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ScanError::timeout("loading homepage", Duration::from_secs(1)).is_transient());
        assert!(
            ScanError::Navigation {
                url: "http://127.0.0.1:1/".to_string(),
                reason: "connection refused".to_string(),
            }
            .is_transient()
        );
        assert!(!ScanError::InvalidUrl("nope".to_string()).is_transient());
        assert!(!ScanError::Launch("no browser".to_string()).is_transient());
    }

    #[tokio::test]
    async fn test_panicked_task_converts_to_join_error() {
        let handle = tokio::spawn(async { panic!("worker blew up") });
        let err: ScanError = handle.await.unwrap_err().into();

        assert!(matches!(err, ScanError::JoinError(_)));
        assert!(err.to_string().starts_with("Task join error: "));
        assert!(!err.is_transient());
    }
}
