use thiserror::Error;

use crate::client::LoginError;

/// Crate-level error for everything the playgrounds can fail on.
///
/// Lost updates in the unsynchronized race are *not* errors; they are
/// reported through [`crate::race::RaceReport::lost_updates`].
#[derive(Error, Debug)]
pub enum PlaygroundError {
    #[error("Failed to parse config file {path}: {message}")]
    Config { path: String, message: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Task '{task}' panicked while appending")]
    TaskPanicked { task: String },

    #[error("Channel to the sequence owner closed early")]
    ChannelClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Login(#[from] LoginError),

    #[error("no code to highlight")]
    EmptySnippet,
}

impl PlaygroundError {
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn config(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PlaygroundError>;
