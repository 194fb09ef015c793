use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Domain-specific error codes for live tracking session processing.
/// Includes vehicle lookup, message format, persistence, and server errors.
#[derive(Error, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Error {
    #[error("code: unknown_vehicle, description: {0}")]
    UnknownVehicle(String),

    #[error("code: invalid_format, description: {0}")]
    InvalidFormat(String),

    #[error("code: persistence_error, description: {0}")]
    Persistence(String),

    #[error("code: directory_error, description: {0}")]
    Directory(String),

    #[error("code: server_error, description: {0}")]
    ServerError(String),
}

impl Error {
    /// Returns the error code.
    #[must_use]
    pub const fn code(&self) -> &str {
        match self {
            Self::UnknownVehicle(_) => "unknown_vehicle",
            Self::InvalidFormat(_) => "invalid_format",
            Self::Persistence(_) => "persistence_error",
            Self::Directory(_) => "directory_error",
            Self::ServerError(_) => "server_error",
        }
    }

    /// Returns the error description.
    #[must_use]
    pub fn description(&self) -> String {
        self.to_string()
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<Self>() {
            Some(Self::UnknownVehicle(e)) => Self::UnknownVehicle(format!("{err}: {e}")),
            Some(Self::InvalidFormat(e)) => Self::InvalidFormat(format!("{err}: {e}")),
            Some(Self::Persistence(e)) => Self::Persistence(format!("{err}: {e}")),
            Some(Self::Directory(e)) => Self::Directory(format!("{err}: {e}")),
            Some(Self::ServerError(e)) => Self::ServerError(format!("{err}: {e}")),
            None => {
                let stack = err.chain().fold(String::new(), |cause, e| format!("{cause} -> {e}"));
                let stack = stack.trim_start_matches(" -> ").to_string();
                Self::ServerError(stack)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
