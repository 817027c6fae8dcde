//! Gateway error taxonomy
//!
//! Every failure a request can run into ends up as one of these kinds, and
//! each kind has exactly one externally visible outcome.

use crate::ftp::FtpError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connect or login failed, or no pool slot became free in time
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    /// The upstream store reports the file as absent
    #[error("not found upstream: {0}")]
    NotFound(String),
    /// Range header is not a single `start-end` / `start-` byte range
    #[error("malformed range header: {0}")]
    MalformedRange(String),
    /// Range header parsed but does not fit the file
    #[error("range not satisfiable for {total} bytes: {header}")]
    UnsatisfiableRange { header: String, total: u64 },
    /// Failure after response headers were committed
    #[error("stream interrupted after {delivered} bytes: {reason}")]
    StreamInterrupted { delivered: u64, reason: String },
    /// A pooled session failed its liveness probe
    #[error("stale upstream connection #{id}: {reason}")]
    StaleConnection { id: u64, reason: String },
    /// Request path is reserved or outside the served namespace
    #[error("forbidden path: {0}")]
    Forbidden(String),
}

impl GatewayError {
    /// HTTP status this error resolves to
    ///
    /// Range errors never reach the client as errors: the full file is
    /// served instead. A stale connection is retried internally and only
    /// shows up as a 500 if reconnecting fails too.
    pub const fn status(&self) -> u16 {
        match self {
            Self::MalformedRange(_) | Self::UnsatisfiableRange { .. } => 200,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::UpstreamUnavailable(_) | Self::StaleConnection { .. } => 500,
            Self::StreamInterrupted { .. } => 503,
        }
    }

    /// Short failure category for diagnostic response bodies
    ///
    /// Never carries upstream reply text or paths.
    pub const fn cause(&self) -> &'static str {
        match self {
            Self::UpstreamUnavailable(_) | Self::StaleConnection { .. } => "upstream unavailable",
            Self::NotFound(_) => "file not found upstream",
            Self::MalformedRange(_) | Self::UnsatisfiableRange { .. } => "range not usable",
            Self::StreamInterrupted { .. } => "upstream transfer interrupted",
            Self::Forbidden(_) => "path not allowed",
        }
    }

    /// Classify a failure that happened before any body byte was sent
    pub fn from_upstream(path: &str, err: &FtpError) -> Self {
        if err.is_not_found() {
            Self::NotFound(path.to_string())
        } else {
            Self::UpstreamUnavailable(format!("{path}: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(GatewayError::Forbidden("/".into()).status(), 403);
        assert_eq!(GatewayError::NotFound("a".into()).status(), 404);
        assert_eq!(GatewayError::UpstreamUnavailable("x".into()).status(), 500);
        assert_eq!(
            GatewayError::StreamInterrupted {
                delivered: 10,
                reason: "reset".into()
            }
            .status(),
            503
        );
        assert_eq!(GatewayError::MalformedRange("bytes=-5".into()).status(), 200);
    }

    #[test]
    fn test_cause_hides_details() {
        let err = GatewayError::UpstreamUnavailable("ftp.internal:21: 530 login".into());
        assert_eq!(err.cause(), "upstream unavailable");
        assert_eq!(GatewayError::NotFound("/srv/a.mp4".into()).cause(), "file not found upstream");
    }

    #[test]
    fn test_from_upstream() {
        let missing = FtpError::Reply {
            code: 550,
            text: "550 No such file".into(),
        };
        assert!(matches!(
            GatewayError::from_upstream("a.mp4", &missing),
            GatewayError::NotFound(_)
        ));
        assert!(matches!(
            GatewayError::from_upstream("a.mp4", &FtpError::Closed),
            GatewayError::UpstreamUnavailable(_)
        ));
    }
}
