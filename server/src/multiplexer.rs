//! Readiness multiplexer owning the listening socket and every connection
//!
//! The listener is registered under [`LISTENER`] (readiness slot 0). Connections
//! get stable tokens that never get reused, and live in a dense vector so the
//! controller can walk them by slot. Removing a slot swaps the last connection
//! into its place; iteration order after a removal is therefore unspecified and
//! a caller walking slots upwards must revisit the slot it just removed.

#![warn(missing_docs)]

use crate::connection::Connection;
use crate::error::ServerError;
use crate::player::Player;
use log::{debug, error, info, warn};
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token, Waker};
use socket2::{Domain, Protocol, Socket, Type};
use std::collections::HashMap;
use std::io::{self, ErrorKind};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Token of the listening socket.
pub const LISTENER: Token = Token(0);
/// Token of the cross-thread waker, never handed to a connection.
pub const WAKER: Token = Token(usize::MAX);

const LISTEN_BACKLOG: i32 = 1024;
const EVENTS_CAPACITY: usize = 1024;

/// Poller, listener and the connections of the current round.
///
/// Connections live in a dense vector of slots. Removal swaps the last slot
/// into the hole, and `handles` maps each token back to its current slot.
pub struct Multiplexer {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    waker: Arc<Waker>,
    slots: Vec<Connection>,
    handles: HashMap<Token, usize>,
    next_token: usize,
}

impl Multiplexer {
    /// Listens on `port` on all interfaces, dual stack when IPv6 is available.
    pub fn bind(port: u16) -> Result<Self, ServerError> {
        let listener = listen(port).map_err(|e| ServerError::Bind(port, e))?;
        let mut listener = TcpListener::from_std(listener);

        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER)?);

        Ok(Self {
            poll,
            events: Events::with_capacity(EVENTS_CAPACITY),
            listener,
            waker,
            slots: Vec::new(),
            handles: HashMap::new(),
            next_token: 1,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle that interrupts a pending [`Multiplexer::wait`] from another thread.
    pub fn waker(&self) -> Arc<Waker> {
        Arc::clone(&self.waker)
    }

    /// Blocks until readiness changes or `timeout` elapses (`None` waits
    /// indefinitely), then latches the reported readiness on the connections.
    pub fn wait(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(e),
        }

        for event in self.events.iter() {
            match event.token() {
                LISTENER | WAKER => {}
                token => {
                    let Some(&slot) = self.handles.get(&token) else {
                        continue;
                    };
                    let connection = &mut self.slots[slot];
                    if event.is_readable() || event.is_read_closed() || event.is_error() {
                        connection.mark_readable();
                    }
                    if event.is_writable() || event.is_write_closed() {
                        connection.mark_writable();
                    }
                }
            }
        }
        Ok(())
    }

    /// Accepts every pending connection; a no-op when none is waiting.
    pub fn accept_pending(&mut self, points: usize, now: Instant) -> usize {
        let mut accepted = 0;
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;

                    if let Err(e) =
                        self.poll
                            .registry()
                            .register(&mut stream, token, Interest::READABLE)
                    {
                        error!("Failed to register connection from {}: {}", addr, e);
                        continue;
                    }

                    let player = Player::new(addr, points, now);
                    info!("New connection from {}", player);
                    self.handles.insert(token, self.slots.len());
                    self.slots.push(Connection::new(token, stream, player));
                    accepted += 1;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    break;
                }
            }
        }
        accepted
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no connection is open.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Connection in `slot`, which must be below [`Multiplexer::len`].
    pub fn get(&self, slot: usize) -> &Connection {
        &self.slots[slot]
    }

    /// Mutable connection in `slot`.
    pub fn get_mut(&mut self, slot: usize) -> &mut Connection {
        &mut self.slots[slot]
    }

    /// Current slot of the connection registered under `token`.
    pub fn slot_of(&self, token: Token) -> Option<usize> {
        self.handles.get(&token).copied()
    }

    /// Connections in slot order.
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.slots.iter()
    }

    /// See [`Connection::sync_interest`].
    pub fn sync_interest(&mut self, slot: usize) -> io::Result<()> {
        self.slots[slot].sync_interest(self.poll.registry())
    }

    /// Deregisters the connection in `slot` and moves the last one into its place.
    pub fn remove(&mut self, slot: usize) -> Connection {
        let mut connection = self.slots.swap_remove(slot);
        self.handles.remove(&connection.token());
        if let Some(moved) = self.slots.get(slot) {
            self.handles.insert(moved.token(), slot);
        }
        if let Err(e) = self.poll.registry().deregister(connection.stream_mut()) {
            debug!("Failed to deregister {}: {}", connection.player(), e);
        }
        connection
    }

    /// Removes every connection, leaving only the listener registered.
    pub fn drain(&mut self) -> Vec<Connection> {
        self.handles.clear();
        let mut connections: Vec<Connection> = self.slots.drain(..).collect();
        for connection in &mut connections {
            if let Err(e) = self.poll.registry().deregister(connection.stream_mut()) {
                debug!("Failed to deregister {}: {}", connection.player(), e);
            }
        }
        connections
    }
}

fn listen(port: u16) -> io::Result<std::net::TcpListener> {
    match listen_on(Domain::IPV6, port) {
        Ok(listener) => Ok(listener),
        Err(e) => {
            warn!("IPv6 listener unavailable ({}), falling back to IPv4", e);
            listen_on(Domain::IPV4, port)
        }
    }
}

fn listen_on(domain: Domain, port: u16) -> io::Result<std::net::TcpListener> {
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    let addr: SocketAddr = if domain == Domain::IPV6 {
        socket.set_only_v6(false)?;
        (Ipv6Addr::UNSPECIFIED, port).into()
    } else {
        (Ipv4Addr::UNSPECIFIED, port).into()
    };
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(socket.into())
}
