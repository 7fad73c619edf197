//! The errors CrabPano can hand back. Detail goes in the `Display` text for
//! the logs; `public_message` is what an end user gets to see.

/**
 *     /\
 *    ( /   @ @    ()
 *     \  __| |__  /
 *      -/   "   \-
 *     /-|       |-\
 *    / /-\     /-\ \
 *     / /-`---'-\ \
 *      /         \ CRABPANO
 *
 *   error.rs - error taxonomy
 *   Author - bjb8@st-andrews.ac.uk
 *
 */

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PanoError>;

#[derive(Debug, Error)]
pub enum PanoError {
    /// Malformed or out of range input. Never reaches the store.
    #[error("Validation Error: {0}")]
    Validation(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    /// A write touched the wrong number of rows or could not be committed.
    #[error("Persistence Error: {0}")]
    Persistence(String),

    #[error("Decode Error: {0}")]
    Decode(String),

    #[error("Database Error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Connection Error: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("Database Pool Error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
}

/// The broad class of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Persistence,
    Decode,
}

impl PanoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PanoError::Validation(_) => ErrorKind::Validation,
            PanoError::NotFound(_) => ErrorKind::NotFound,
            PanoError::Decode(_) => ErrorKind::Decode,
            PanoError::Persistence(_)
            | PanoError::Database(_)
            | PanoError::Connection(_)
            | PanoError::Pool(_) => ErrorKind::Persistence,
        }
    }

    /// A message fit for an end user. Validation and not-found detail is the
    /// caller's own input so it is passed through; store failures are not.
    pub fn public_message(&self) -> String {
        match self {
            PanoError::Validation(msg) => format!("Invalid input: {}", msg),
            PanoError::NotFound(msg) => format!("Not found: {}", msg),
            PanoError::Decode(_) => String::from("Stored geometry could not be read"),
            _ => String::from("The panorama store could not complete the request"),
        }
    }
}
