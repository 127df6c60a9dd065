//! Round controller driving the single threaded event loop
//!
//! A round lasts until the configured number of guesses has been accepted
//! across all players, or until the stop flag is raised. Each tick accepts new
//! connections, services every connection in slot order (read, flush, update
//! write interest) and evicts the ones that broke the protocol. Input behind
//! the guess that reaches the target is never handled. At the end of a round
//! every handshaken player receives its outstanding replies followed by the
//! `SCORING` line, and all connections are half-closed and drained before they
//! are dropped. The listener survives between rounds.

use crate::coefficients::CoefficientSource;
use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::{ServerError, Violation};
use crate::multiplexer::Multiplexer;
use crate::player::Outcome;
use log::{debug, error, info, warn};
use mio::Waker;
use shared::{Score, ServerMessage, ROUND_PAUSE};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const READ_CHUNK: usize = 4096;

/// How a round ended
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSummary {
    /// Final errors of the handshaken players, ordered by identifier.
    pub scores: Vec<Score>,
    /// Accepted guesses still counted when the round ended.
    pub accepted: u64,
    /// The round was cut short by the stop flag.
    pub stopped: bool,
}

pub struct Session<S> {
    config: ServerConfig,
    mux: Multiplexer,
    source: S,
    accepted: u64,
    scratch: Vec<u8>,
}

impl<S: CoefficientSource> Session<S> {
    pub fn new(config: ServerConfig, source: S) -> Result<Self, ServerError> {
        let mux = Multiplexer::bind(config.port)?;
        Ok(Self {
            config,
            mux,
            source,
            accepted: 0,
            scratch: vec![0; READ_CHUNK],
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.mux.local_addr()
    }

    /// Handle used to interrupt a blocked wait, e.g. from a signal handler.
    pub fn waker(&self) -> Arc<Waker> {
        self.mux.waker()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Plays rounds back to back until `stop` is raised.
    pub fn serve(&mut self, stop: &AtomicBool) -> Result<(), ServerError> {
        loop {
            let summary = self.play_round(stop)?;
            if summary.stopped || stop.load(Ordering::SeqCst) {
                info!("Server shutting down");
                return Ok(());
            }
            thread::sleep(ROUND_PAUSE);
        }
    }

    pub fn play_round(&mut self, stop: &AtomicBool) -> Result<RoundSummary, ServerError> {
        self.accepted = 0;
        info!(
            "Round started, {} accepted guesses end it",
            self.config.target
        );

        let stopped = loop {
            if stop.load(Ordering::SeqCst) {
                info!("Stop requested, ending round early");
                break true;
            }
            let timeout = self.next_timeout(Instant::now());
            self.mux.wait(timeout)?;
            if self.tick(Instant::now()) {
                break false;
            }
        };

        Ok(self.finish_round(stopped))
    }

    /// One pass over the listener and every connection. Returns true once the
    /// round target has been reached.
    fn tick(&mut self, now: Instant) -> bool {
        self.mux.accept_pending(self.config.points, now);

        let mut slot = 0;
        while slot < self.mux.len() {
            match self.service(slot, now) {
                Ok(true) => return true,
                Ok(false) => {}
                Err(violation) => {
                    // The last connection now sits in this slot.
                    self.evict(slot, violation);
                    continue;
                }
            }
            slot += 1;
        }
        false
    }

    /// Reads, counts and flushes one connection. Returns true as soon as an
    /// accepted guess reaches the round target, leaving any input behind it
    /// unhandled.
    fn service(&mut self, slot: usize, now: Instant) -> Result<bool, Violation> {
        let connection = self.mux.get_mut(slot);

        while connection.read_available(now, &mut self.source, &mut self.scratch)?
            == Outcome::Progress
        {
            self.accepted += 1;
            debug!(
                "Accepted guesses: {}/{}",
                self.accepted, self.config.target
            );
            if self.accepted >= self.config.target {
                return Ok(true);
            }
        }
        if connection
            .player()
            .handshake_deadline()
            .is_some_and(|deadline| now >= deadline)
        {
            return Err(Violation::HandshakeTimeout);
        }

        connection.flush(now)?;
        self.mux.sync_interest(slot)?;
        Ok(false)
    }

    fn evict(&mut self, slot: usize, violation: Violation) {
        let connection = self.mux.remove(slot);
        let player = connection.player();

        match &violation {
            Violation::PeerClosed => info!("{} disconnected", player),
            Violation::Coefficients(e) => error!("Dropping {}: {}", player, e),
            _ => warn!("Dropping {}: {}", player, violation),
        }

        if player.accepted() > 0 {
            self.accepted = self.accepted.saturating_sub(player.accepted());
            debug!(
                "Discarded {} accepted guesses of {}",
                player.accepted(),
                player
            );
        }
    }

    fn finish_round(&mut self, stopped: bool) -> RoundSummary {
        let connections = self.mux.drain();

        let mut scores: Vec<Score> = connections
            .iter()
            .filter_map(|connection| {
                let player = connection.player();
                player.id().map(|id| Score {
                    id: id.to_string(),
                    error: player.error(),
                })
            })
            .collect();
        scores.sort_by(|a, b| a.id.cmp(&b.id));
        let scoring = ServerMessage::Scoring(scores.clone());
        let line = scoring.to_line();

        for mut connection in connections {
            if connection.player().is_active() {
                deliver(&mut connection, line.as_bytes());
            }
            connection.close(&mut self.scratch);
        }
        info!("Round over: {}", scoring);

        RoundSummary {
            scores,
            accepted: self.accepted,
            stopped,
        }
    }

    /// How long the loop may block: zero while some connection still has work
    /// it can do right now, otherwise until the nearest handshake deadline or
    /// delayed reply, or indefinitely when nothing is scheduled.
    fn next_timeout(&self, now: Instant) -> Option<Duration> {
        let mut earliest: Option<Instant> = None;

        for connection in self.mux.connections() {
            let player = connection.player();
            if connection.is_readable()
                || connection.has_pending_input()
                || (connection.is_writable() && player.outbox().ready(now))
            {
                return Some(Duration::ZERO);
            }

            let upcoming = player
                .outbox()
                .next_ready_time()
                .filter(|at| *at > now);
            for at in [player.handshake_deadline(), upcoming].into_iter().flatten() {
                earliest = Some(earliest.map_or(at, |current| current.min(at)));
            }
        }

        earliest.map(|at| at.saturating_duration_since(now))
    }
}

fn deliver(connection: &mut Connection, scoring: &[u8]) {
    if let Err(e) = connection.deliver_final(scoring) {
        warn!("Could not deliver scoring to {}: {}", connection.player(), e);
    }
}
