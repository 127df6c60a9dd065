//! A client socket paired with its protocol state

#![warn(missing_docs)]

use crate::coefficients::CoefficientSource;
use crate::error::Violation;
use crate::player::{Outcome, Player};
use crate::queue::Flush;
use log::debug;
use mio::net::TcpStream;
use mio::{Interest, Registry, Token};
use std::io::{self, ErrorKind, Read, Write};
use std::net::Shutdown;
use std::time::Instant;

/// Accepted TCP connection registered with the multiplexer.
///
/// mio reports readiness edges, so the connection keeps a latch per direction:
/// set by an event, cleared only when the socket answers `WouldBlock`. The
/// controller can then treat readiness as a level.
#[derive(Debug)]
pub struct Connection {
    token: Token,
    stream: TcpStream,
    player: Player,
    readable: bool,
    writable: bool,
    write_interest: bool,
}

impl Connection {
    /// Wraps a freshly accepted stream. Both latches start cleared until the
    /// first readiness event arrives.
    pub fn new(token: Token, stream: TcpStream, player: Player) -> Self {
        Self {
            token,
            stream,
            player,
            readable: false,
            writable: false,
            write_interest: false,
        }
    }

    /// Token the stream is registered under.
    pub fn token(&self) -> Token {
        self.token
    }

    /// Protocol state of the peer.
    pub fn player(&self) -> &Player {
        &self.player
    }

    /// Raw socket, for registration with the poller.
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// Latches a readable event until a read returns `WouldBlock`.
    pub fn mark_readable(&mut self) {
        self.readable = true;
    }

    /// Latches a writable event until a write comes up short.
    pub fn mark_writable(&mut self) {
        self.writable = true;
    }

    /// True while reading may still make progress.
    pub fn is_readable(&self) -> bool {
        self.readable
    }

    /// True while writing may still make progress.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// True while there is input to handle without touching the socket.
    pub fn has_pending_input(&self) -> bool {
        self.player.has_pending_line()
    }

    /// Handles buffered lines, then reads until the socket runs dry or a guess
    /// gets accepted.
    ///
    /// An accepted guess returns right away. Lines and bytes behind it are left
    /// for the next call, once the controller has counted the acceptance.
    pub fn read_available(
        &mut self,
        now: Instant,
        source: &mut dyn CoefficientSource,
        scratch: &mut [u8],
    ) -> Result<Outcome, Violation> {
        if self.player.process(now, source)? == Outcome::Progress {
            return Ok(Outcome::Progress);
        }
        while self.readable {
            match self.stream.read(scratch) {
                Ok(0) => return Err(Violation::PeerClosed),
                Ok(n) => {
                    debug!("Read {} bytes from {}", n, self.player);
                    if self.player.receive(&scratch[..n], now, source)? == Outcome::Progress {
                        return Ok(Outcome::Progress);
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => self.readable = false,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Violation::Io(e)),
            }
        }
        Ok(Outcome::Idle)
    }

    /// Writes every reply whose send time has come, as far as the socket allows.
    pub fn flush(&mut self, now: Instant) -> Result<(), Violation> {
        while self.writable && self.player.outbox().ready(now) {
            match self.player.outbox_mut().send(&mut self.stream, now)? {
                Flush::Complete => continue,
                Flush::Partial => self.writable = false,
            }
        }
        Ok(())
    }

    /// Keeps write interest registered exactly while replies are queued.
    pub fn sync_interest(&mut self, registry: &Registry) -> io::Result<()> {
        let wanted = !self.player.outbox().is_empty();
        if wanted == self.write_interest {
            return Ok(());
        }
        let interest = if wanted {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        };
        registry.reregister(&mut self.stream, self.token, interest)?;
        self.write_interest = wanted;
        Ok(())
    }

    /// Best effort delivery of everything still queued followed by `last`.
    ///
    /// Used once at the end of a round: remaining delays are waived, nothing is
    /// retried and the first `WouldBlock` or error gives up on this connection.
    pub fn deliver_final(&mut self, last: &[u8]) -> io::Result<()> {
        let mut bytes = self.player.outbox_mut().take_remaining();
        bytes.extend_from_slice(last);

        let mut written = 0;
        while written < bytes.len() {
            match self.stream.write(&bytes[written..]) {
                Ok(0) => return Err(ErrorKind::WriteZero.into()),
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Half-closes the socket and discards unread input before it is dropped.
    ///
    /// Closing a socket with unread data makes the kernel answer with a reset,
    /// which can destroy replies the peer has not read yet.
    pub fn close(&mut self, scratch: &mut [u8]) {
        if let Err(e) = self.stream.shutdown(Shutdown::Write) {
            debug!("Shutdown of {} failed: {}", self.player, e);
        }
        loop {
            match self.stream.read(scratch) {
                Ok(0) => break,
                Ok(n) => debug!("Discarded {} bytes from {}", n, self.player),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    }
}
