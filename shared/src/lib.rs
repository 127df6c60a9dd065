//! Protocol pieces shared by the approximation game server and client.
//!
//! Everything here is pure: validators, parsers and serializers for the
//! CRLF-delimited text protocol, plus the game-rule constants both sides agree on.

use std::time::Duration;

pub mod protocol;

pub use protocol::{
    count_lowercase, format_value, is_integer, is_rational, is_valid_id, parse_coefficients,
    parse_rational, ClientMessage, ProtocolError, Put, Score, ServerMessage,
};

/// Terminator of every protocol line.
pub const LINE_TERMINATOR: &str = "\r\n";

/// Longest unterminated input a server buffers for one connection.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Maximum number of digits allowed after the decimal point of a rational.
pub const MAX_FRACTION_DIGITS: usize = 7;

/// Largest magnitude a guessed value may have before it is a bad put.
pub const MAX_ABS_VALUE: f64 = 5.0;

/// Time a fresh connection has to send a valid `HELLO`.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(3);

/// Delay applied to every `BAD_PUT` reply.
pub const BAD_PUT_DELAY: Duration = Duration::from_secs(1);

/// Pause between two consecutive rounds.
pub const ROUND_PAUSE: Duration = Duration::from_secs(1);
