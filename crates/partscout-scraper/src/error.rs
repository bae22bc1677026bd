use thiserror::Error;

/// Failure of a single fetch attempt.
///
/// Every variant is transient from the session pool's point of view: it is
/// retried with backoff and, once retries are exhausted, surfaces to callers
/// as "no content".
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus {
        status: u16,
        url: String,
        /// Leading slice of the response body, kept for block classification.
        body_excerpt: String,
    },

    #[error("session pool is shut down")]
    PoolClosed,
}

impl FetchError {
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            FetchError::UnexpectedStatus { status, .. } => Some(*status),
            FetchError::Http(e) => e.status().map(|s| s.as_u16()),
            FetchError::PoolClosed => None,
        }
    }

    /// Text handed to the blocking monitor: the error message plus any body
    /// excerpt, so block pages ("Access Denied", captcha walls) are visible
    /// to its vocabulary check.
    #[must_use]
    pub fn monitor_text(&self) -> String {
        match self {
            FetchError::UnexpectedStatus { body_excerpt, .. } if !body_excerpt.is_empty() => {
                format!("{self}: {body_excerpt}")
            }
            _ => self.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("failed to build HTTP session: {0}")]
    SessionBuild(#[source] reqwest::Error),

    #[error("session pool size must be at least 1")]
    EmptyPool,

    #[error("invalid selector \"{selector}\" for vendor {vendor}: {reason}")]
    InvalidSelector {
        vendor: String,
        selector: String,
        reason: String,
    },

    #[error("failed to open monitor log {path}: {source}")]
    MonitorSink {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
