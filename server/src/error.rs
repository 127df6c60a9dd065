//! Error types for the game server
//!
//! Startup errors stop the process. Everything else is scoped to a single
//! connection and ends up as a [`Violation`] that gets the connection evicted.

use shared::ProtocolError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Problems reading polynomial coefficients
#[derive(Debug, Error)]
pub enum CoefficientError {
    #[error("failed to open coefficient file {0}: {1}")]
    Open(PathBuf, io::Error),

    #[error("failed to read coefficients: {0}")]
    Read(#[from] io::Error),

    #[error("malformed coefficient line: {0}")]
    Malformed(#[from] ProtocolError),

    #[error("coefficient line holds no coefficients")]
    NoCoefficients,

    #[error("coefficient line holds {found} coefficients, at most {max} allowed")]
    TooMany { found: usize, max: usize },

    #[error("coefficient source has no lines")]
    Exhausted,
}

/// Why a connection has to be dropped
#[derive(Debug, Error)]
pub enum Violation {
    #[error("malformed handshake: {0:?}")]
    MalformedHello(String),

    #[error("no valid HELLO within the handshake timeout")]
    HandshakeTimeout,

    #[error("line exceeds {0} bytes without a terminator")]
    LineTooLong(usize),

    #[error("peer closed the connection")]
    PeerClosed,

    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    #[error("cannot serve coefficients: {0}")]
    Coefficients(#[from] CoefficientError),
}

/// Errors that prevent the server from starting or keep it from running
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("cannot listen on port {0}: {1}")]
    Bind(u16, io::Error),

    #[error(transparent)]
    Coefficients(#[from] CoefficientError),

    #[error("event loop failure: {0}")]
    Io(#[from] io::Error),
}
