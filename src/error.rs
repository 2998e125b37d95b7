//! Errors surfaced while setting up navigation: bad configuration, unreadable
//! level data, or a floor scan that found nothing to walk on.
//!
//! Query and search misses are not errors. They come back as `None` or an
//! empty [`Path`](crate::nav::path::Path).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NavError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The floor scan produced no walkable cell. Nothing may be spawned or
    /// pathed against the resulting graph.
    #[error("no walkable floor found after scanning {scanned} cells")]
    EmptyGraph { scanned: usize },

    #[error("blueprint error: {0}")]
    Blueprint(String),

    #[error("failed to parse settings: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type NavResult<T> = Result<T, NavError>;
