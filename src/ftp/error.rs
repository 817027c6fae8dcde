//! FTP protocol error type

use thiserror::Error;

/// Failure talking to the upstream FTP server
#[derive(Debug, Error)]
pub enum FtpError {
    /// Socket level failure on the control or data channel
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// An operation exceeded its configured deadline
    #[error("{0} timed out")]
    Timeout(&'static str),
    /// The server closed the control channel
    #[error("control connection closed by server")]
    Closed,
    /// The server answered with an unexpected reply class
    #[error("server replied {code}: {text}")]
    Reply { code: u16, text: String },
    /// The server sent something that is not a valid FTP reply
    #[error("malformed reply: {0}")]
    Protocol(String),
}

pub type FtpResult<T> = Result<T, FtpError>;

impl FtpError {
    /// Whether the server reported that the file does not exist
    ///
    /// 550 is the standard "file unavailable" reply. Some servers use 450
    /// for the same condition, so the text is checked there.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Reply { code: 550, .. } => true,
            Self::Reply { code: 450, text } => {
                let lower = text.to_lowercase();
                lower.contains("not found") || lower.contains("no such")
            }
            _ => false,
        }
    }

    /// Whether the control channel is left in an unknown state
    ///
    /// A negative reply leaves the session usable; anything else does not.
    pub const fn is_transport(&self) -> bool {
        !matches!(self, Self::Reply { .. })
    }
}
