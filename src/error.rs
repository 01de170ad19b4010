//! Error types for the feed pipeline.
//!
//! Each stage of a render cycle has its own error enum so a failed feed
//! can be reported precisely while the other feeds keep going.

use thiserror::Error;

/// Characters of a rejected response body kept for display.
pub const EXCERPT_CHARS: usize = 200;

/// Failure while fetching a feed from the HIS API.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The API answered with a non-2xx status code.
    #[error("HIS API returned HTTP {0}")]
    HttpStatus(u16),

    /// The body was not a JSON array of flat objects. Carries the raw body.
    #[error("invalid JSON payload ({} bytes)", .0.len())]
    InvalidPayload(String),

    /// Connection, timeout or body read failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Failure while checking a table against its feed's schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("expected column '{0}' is missing from every row")]
    MissingColumn(String),
}

/// Failure while computing an aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
}

/// Any failure that stops a single feed from producing a table.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

impl FetchError {
    /// Start of the rejected body, for operators to see what the API sent.
    pub fn body_excerpt(&self) -> Option<String> {
        match self {
            FetchError::InvalidPayload(body) => Some(excerpt(body, EXCERPT_CHARS)),
            _ => None,
        }
    }
}

impl FeedError {
    /// True when the host could not be reached at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, FeedError::Fetch(FetchError::Transport(_)))
    }

    /// Extra detail shown next to the error message, if any.
    pub fn detail(&self) -> Option<String> {
        match self {
            FeedError::Fetch(e) => e.body_excerpt(),
            FeedError::Normalize(_) => None,
        }
    }
}

/// First `max` characters of `text`, trimmed, with an ellipsis when cut.
fn excerpt(text: &str, max: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}…", &text[..end]),
        None => text.to_string(),
    }
}
