//! Per-connection protocol state machine
//!
//! A [`Player`] owns everything the server knows about one client apart from
//! the socket itself: the framing buffer, the handshake phase, the running
//! approximation with its error, and the outbound reply queue.
//!
//! ## Reply discipline
//!
//! A guess is only accepted while the player has no reply outstanding. A guess
//! that arrives while a reply is still queued or being written, or that started
//! arriving before the previous reply was fully sent, is answered with
//! `PENALTY` and never touches the approximation. Bad guesses are answered with
//! `BAD_PUT` in both situations.

#![warn(missing_docs)]

use crate::coefficients::{targets, CoefficientSource};
use crate::error::Violation;
use crate::framing::LineBuffer;
use crate::queue::{DelayedQueue, Priority};
use log::{debug, info, warn};
use shared::{
    count_lowercase, ClientMessage, Put, ServerMessage, BAD_PUT_DELAY, HANDSHAKE_TIMEOUT,
    MAX_LINE_LENGTH,
};
use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// What handling received bytes amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing that counts toward the round target.
    Idle,
    /// A guess was accepted and applied.
    Progress,
}

/// Identity established by a valid `HELLO`
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    /// Letters and digits only.
    pub id: String,
    /// STATE replies are held back one second per lowercase letter of the id.
    pub state_delay: Duration,
}

/// Where a connection stands in the protocol
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    /// Connected, the first line has not arrived yet.
    AwaitingHello,
    /// Handshake done, guesses are played.
    Active(Identity),
}

/// Everything the server tracks for one connected client
#[derive(Debug)]
pub struct Player {
    addr: SocketAddr,
    connected_at: Instant,
    phase: Phase,
    points: usize,
    inbox: LineBuffer,
    arrived_before_reply: bool,
    approximation: Vec<f64>,
    targets: Vec<f64>,
    error: f64,
    accepted: u64,
    outbox: DelayedQueue,
}

impl Player {
    /// Creates a player for a fresh connection. The approximation covers the
    /// points `0..=points`.
    pub fn new(addr: SocketAddr, points: usize, now: Instant) -> Self {
        Self {
            addr,
            connected_at: now,
            phase: Phase::AwaitingHello,
            points,
            inbox: LineBuffer::new(),
            arrived_before_reply: false,
            approximation: vec![0.0; points + 1],
            targets: vec![0.0; points + 1],
            error: 0.0,
            accepted: 0,
            outbox: DelayedQueue::new(),
        }
    }

    /// Handshake progress.
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// True once the handshake is done.
    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Active(_))
    }

    /// Identifier sent with `HELLO`, if any.
    pub fn id(&self) -> Option<&str> {
        match &self.phase {
            Phase::Active(identity) => Some(&identity.id),
            Phase::AwaitingHello => None,
        }
    }

    /// Deadline for the handshake, `None` once it is done.
    pub fn handshake_deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::AwaitingHello => Some(self.connected_at + HANDSHAKE_TIMEOUT),
            Phase::Active(_) => None,
        }
    }

    /// Running approximation at the points `0..=k`.
    pub fn approximation(&self) -> &[f64] {
        &self.approximation
    }

    /// Hidden polynomial evaluated at the same points.
    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    /// Sum of squared differences between approximation and targets.
    pub fn error(&self) -> f64 {
        self.error
    }

    /// Number of guesses that were accepted and applied.
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Replies queued for this player.
    pub fn outbox(&self) -> &DelayedQueue {
        &self.outbox
    }

    /// Mutable reply queue, for flushing.
    pub fn outbox_mut(&mut self) -> &mut DelayedQueue {
        &mut self.outbox
    }

    /// True when a complete line is buffered but not handled yet.
    pub fn has_pending_line(&self) -> bool {
        self.inbox.has_line()
    }

    /// Feeds freshly received bytes through the state machine, see
    /// [`Player::process`].
    pub fn receive(
        &mut self,
        bytes: &[u8],
        now: Instant,
        source: &mut dyn CoefficientSource,
    ) -> Result<Outcome, Violation> {
        if self.inbox.is_empty() && !self.outbox.is_empty() {
            self.arrived_before_reply = true;
        }
        self.inbox.extend(bytes);
        self.process(now, source)
    }

    /// Handles buffered lines in order until one of them gets a guess accepted.
    ///
    /// Lines behind an accepted guess stay buffered so the caller can count the
    /// acceptance first. They were sent before its STATE reply and earn a
    /// penalty once handled.
    pub fn process(
        &mut self,
        now: Instant,
        source: &mut dyn CoefficientSource,
    ) -> Result<Outcome, Violation> {
        let mut outcome = Outcome::Idle;
        let mut handled_any = false;
        while outcome == Outcome::Idle {
            let Some(line) = self.inbox.next_line() else {
                break;
            };
            outcome = self.handle_line(&line, now, source)?;
            self.arrived_before_reply = false;
            handled_any = true;
        }

        // Whatever is left was sent before the replies to the handled lines.
        if handled_any && !self.inbox.is_empty() {
            self.arrived_before_reply = !self.outbox.is_empty();
        }
        if !self.inbox.has_line() && self.inbox.len() > MAX_LINE_LENGTH {
            return Err(Violation::LineTooLong(MAX_LINE_LENGTH));
        }
        Ok(outcome)
    }

    fn handle_line(
        &mut self,
        line: &[u8],
        now: Instant,
        source: &mut dyn CoefficientSource,
    ) -> Result<Outcome, Violation> {
        let text = String::from_utf8_lossy(line);
        match self.phase {
            Phase::AwaitingHello => {
                self.handshake(&text, now, source)?;
                Ok(Outcome::Idle)
            }
            Phase::Active(_) => Ok(self.handle_guess(&text, now)),
        }
    }

    fn handshake(
        &mut self,
        line: &str,
        now: Instant,
        source: &mut dyn CoefficientSource,
    ) -> Result<(), Violation> {
        let id = match ClientMessage::parse(line) {
            Ok(ClientMessage::Hello(id)) => id,
            _ => return Err(Violation::MalformedHello(line.to_string())),
        };

        let coefficients = source.next_coefficients()?;
        self.targets = targets(&coefficients, self.points);
        self.approximation = vec![0.0; self.points + 1];
        self.error = self.targets.iter().map(|target| target * target).sum();

        let state_delay = Duration::from_secs(count_lowercase(&id));
        self.phase = Phase::Active(Identity { id, state_delay });
        info!("{} completed handshake", self);

        self.reply(ServerMessage::Coeff(coefficients), Duration::ZERO, now);
        Ok(())
    }

    fn handle_guess(&mut self, line: &str, now: Instant) -> Outcome {
        let put = match ClientMessage::parse_put(line) {
            Ok(put) => put,
            Err(e) => {
                warn!("Bad message from {}: {}", self, e);
                return Outcome::Idle;
            }
        };

        let outstanding = self.arrived_before_reply || !self.outbox.is_empty();
        let bad = put.is_bad(self.points);

        if outstanding {
            let penalty = ServerMessage::Penalty(put.clone());
            self.reply_with(penalty, Duration::ZERO, Priority::Urgent, now);
            if bad {
                self.reply(ServerMessage::BadPut(put), BAD_PUT_DELAY, now);
            }
            return Outcome::Idle;
        }

        if bad {
            self.reply(ServerMessage::BadPut(put), BAD_PUT_DELAY, now);
            return Outcome::Idle;
        }

        self.accept(&put, now);
        Outcome::Progress
    }

    fn accept(&mut self, put: &Put, now: Instant) {
        // `is_bad` already rejected out of range indices.
        let Some(index) = put.index() else {
            return;
        };
        self.apply_guess(index, put.amount());
        self.accepted += 1;

        let delay = match &self.phase {
            Phase::Active(identity) => identity.state_delay,
            Phase::AwaitingHello => Duration::ZERO,
        };
        self.reply(ServerMessage::State(self.approximation.clone()), delay, now);
    }

    /// Adds `value` to the approximation at `index` and updates the error in
    /// place: `(a + v - t)^2 - (a - t)^2 = v * (v + 2 (a - t))`.
    pub fn apply_guess(&mut self, index: usize, value: f64) {
        let offset = self.approximation[index] - self.targets[index];
        self.error += value * (value + 2.0 * offset);
        self.approximation[index] += value;
    }

    fn reply(&mut self, message: ServerMessage, delay: Duration, now: Instant) {
        self.reply_with(message, delay, Priority::Normal, now);
    }

    fn reply_with(
        &mut self,
        message: ServerMessage,
        delay: Duration,
        priority: Priority,
        now: Instant,
    ) {
        debug!("Queueing for {} in {:?}: {}", self, delay, message);
        self.outbox.push_with(message.to_line(), delay, priority, now);
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]:{}", self.addr.ip(), self.addr.port())?;
        match self.id() {
            Some(id) => write!(f, " ({})", id),
            None => write!(f, " (UNKNOWN)"),
        }
    }
}
