// Error taxonomy shared by the drive client, the transfer code and the
// navigation loop. Every variant is recoverable by the caller: the loop
// only ever ends on an explicit exit.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Remote path or item id does not exist.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Credential rejected or expired.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Network or remote-side failure during a request or transfer.
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// The remote answered with a record we cannot interpret.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Local directory creation or file write failed.
    #[error("local I/O error at {}: {source}", .path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound { what: what.into() }
    }

    pub fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::LocalIo {
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transfer(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
