//! Error types for the speed test client and the scrape pipeline.
//!
//! `SpeedtestError` describes what went wrong while talking to a test server.
//! `ScrapeError` wraps it with the stage of the scrape that failed; its
//! `Display` output is what a failed `/metrics` request returns verbatim.

use thiserror::Error;

/// Failure inside a single speed test client call.
#[derive(Debug, Error)]
pub enum SpeedtestError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("failed to parse {what}: {detail}")]
    Parse { what: &'static str, detail: String },

    #[error("no data transferred during {0} test")]
    NoData(&'static str),

    #[error("{0}")]
    Other(String),
}

impl SpeedtestError {
    pub fn parse<S: Into<String>>(what: &'static str, detail: S) -> Self {
        Self::Parse {
            what,
            detail: detail.into(),
        }
    }

    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other(message.into())
    }

    /// Whether the request hit the per-request timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http { source, .. } if source.is_timeout())
    }
}

/// Failure of one scrape, tagged with the stage that aborted it.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("failed to fetch user info: {0}")]
    UserInfo(SpeedtestError),

    #[error("failed to fetch server list: {0}")]
    ServerList(SpeedtestError),

    #[error("failed to find available server: no available server found")]
    NoServer,

    #[error("failed to run ping test: {0}")]
    Ping(SpeedtestError),

    #[error("failed to run download test: {0}")]
    Download(SpeedtestError),

    #[error("failed to run upload test: {0}")]
    Upload(SpeedtestError),
}

impl ScrapeError {
    /// Stage name used as a log field and telemetry label.
    pub fn stage(&self) -> &'static str {
        match self {
            ScrapeError::UserInfo(_) => "user_info",
            ScrapeError::ServerList(_) => "server_list",
            ScrapeError::NoServer => "server_selection",
            ScrapeError::Ping(_) => "ping",
            ScrapeError::Download(_) => "download",
            ScrapeError::Upload(_) => "upload",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_error_prefixes() {
        let err = ScrapeError::Download(SpeedtestError::other("connection reset"));
        assert_eq!(
            err.to_string(),
            "failed to run download test: connection reset"
        );
        assert_eq!(err.stage(), "download");

        let err = ScrapeError::NoServer;
        assert!(err.to_string().contains("no available server found"));
        assert_eq!(err.stage(), "server_selection");
    }

    #[test]
    fn test_speedtest_error_display() {
        let err = SpeedtestError::Status {
            url: "http://example.invalid/latency.txt".into(),
            status: 503,
        };
        assert_eq!(
            err.to_string(),
            "unexpected status 503 from http://example.invalid/latency.txt"
        );
        assert_eq!(
            SpeedtestError::NoData("upload").to_string(),
            "no data transferred during upload test"
        );
    }
}
