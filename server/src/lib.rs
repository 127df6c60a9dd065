//! # Approximation Game Server
//!
//! Authoritative server for a multiplayer curve approximation game. Every
//! player is assigned a hidden polynomial and tries to approximate its values
//! at the integer points `0..=k` by sending additive guesses. The server keeps
//! each player's approximation and squared error, answers every guess after a
//! per-player delay, and closes the round with a scoreboard once enough
//! guesses have been accepted.
//!
//! ## Core Responsibilities
//!
//! ### Handshake
//! A fresh connection has three seconds to introduce itself with
//! `HELLO <id>`. It then receives the coefficients of its polynomial, taken
//! from the next line of the coefficient file.
//!
//! ### Guess Processing
//! `PUT <point> <value>` adds `value` to the approximation at `point`. A guess
//! is only accepted while no earlier reply is still owed to the player:
//! - Invalid points or values are answered with `BAD_PUT` after one second
//! - Guesses sent before the previous reply arrived earn a `PENALTY`
//! - Accepted guesses are answered with the full `STATE` after a delay equal
//!   to the number of lowercase letters in the player's identifier
//!
//! ### Rounds
//! A round ends once the configured number of guesses has been accepted
//! across all players. Every player that completed the handshake then gets
//! its outstanding replies and a `SCORING` line, all connections are closed,
//! and a new round starts a second later on the same listener.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! All sockets are non-blocking and multiplexed with `mio` on one thread.
//! Per-connection readiness is latched so the controller can treat it as a
//! level: a socket counts as readable or writable until it answers
//! `WouldBlock`. The loop blocks only as long as nothing can make progress,
//! bounded by the nearest handshake deadline or delayed reply.
//!
//! ### Delayed Replies
//! Each connection owns a mailbox ordered by send time. A ready reply may
//! overtake a delayed one, but a reply that started going out is always
//! completed before the next one begins.
//!
//! ## Module Organization
//!
//! - `coefficients`: coefficient file reading and polynomial evaluation
//! - `config`: command line flags
//! - `connection`: socket plus protocol state with readiness latches
//! - `error`: startup and per-connection error types
//! - `framing`: CRLF line extraction from a byte stream
//! - `multiplexer`: listener, poller and dense connection table
//! - `player`: per-player protocol state machine and scoring
//! - `queue`: delayed outbound message queue with partial write support
//! - `session`: round controller
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::coefficients::CoefficientFile;
//! use server::config::ServerConfig;
//! use server::session::Session;
//! use std::path::PathBuf;
//! use std::sync::atomic::AtomicBool;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         port: 2345,
//!         points: 100,
//!         degree: 4,
//!         target: 131,
//!         coefficients: PathBuf::from("coefficients.txt"),
//!     };
//!     let source = CoefficientFile::open(&config.coefficients, config.max_coefficients())?;
//!
//!     let mut session = Session::new(config, source)?;
//!     let stop = AtomicBool::new(false);
//!     session.serve(&stop)?;
//!     Ok(())
//! }
//! ```

pub mod coefficients;
pub mod config;
pub mod connection;
pub mod error;
pub mod framing;
pub mod multiplexer;
pub mod player;
pub mod queue;
pub mod session;
