//! Error types for the external collaborators
//!
//! Every one of these is caught by the handler that triggered it and
//! reported on the console; none of them ends the main loop.

use std::io;
use thiserror::Error;

/// Speech-to-text failures. Display strings are the console diagnostics.
#[derive(Debug, Error)]
pub enum ListenError {
    #[error("Sorry, I couldn't understand what you said.")]
    Unintelligible,

    #[error("Speech recognition service is unavailable. ({0})")]
    Unavailable(String),

    #[error("No speech detected within timeout.")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("model returned no text")]
    EmptyResponse,

    #[error("{0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Model(#[from] LlmError),

    #[error("cannot write response: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to open {target}: {source}")]
    Open { target: String, source: io::Error },
}
