//! # Approximation Game Client
//!
//! Interactive terminal client for the approximation game server. It performs
//! the `HELLO` handshake, shows the coefficients of the hidden polynomial and
//! then forwards guesses typed as `<point> <value>` lines while printing every
//! reply the server sends.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Mirror of the server-side state: coefficients, latest approximation,
//! rejection counters and the final scoreboard.
//!
//! ### Input Module (`input`)
//! Validation of typed guesses before they go on the wire.
//!
//! ### Network Module (`network`)
//! Name resolution with an optional address family restriction, and the
//! session loop multiplexing server lines with player input.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{connect, play, Family};
//! use tokio::io::{stdin, stdout, BufReader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stream = connect("localhost", 2345, Family::Any).await?;
//!     let view = play(stream, "alice", BufReader::new(stdin()), stdout()).await?;
//!     println!("final error: {:?}", view.own_score());
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
