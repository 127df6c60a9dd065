//! Connection to the game server and the interactive session loop

use crate::game::GameView;
use crate::input::parse_guess;
use log::{debug, info, warn};
use shared::{ClientMessage, ProtocolError, ServerMessage};
use std::io;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{lookup_host, TcpStream};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no {family} address found for {host}")]
    NoAddress { host: String, family: Family },

    #[error("network error: {0}")]
    Io(#[from] io::Error),

    #[error("unexpected message from server: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Address family restriction for name resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Family {
    #[default]
    Any,
    V4,
    V6,
}

impl Family {
    /// Maps the `-4` and `-6` flags to a family. IPv4 wins when both are set.
    pub fn from_flags(ipv4: bool, ipv6: bool) -> Self {
        match (ipv4, ipv6) {
            (true, _) => Family::V4,
            (false, true) => Family::V6,
            (false, false) => Family::Any,
        }
    }

    pub fn matches(self, addr: &SocketAddr) -> bool {
        match self {
            Family::Any => true,
            Family::V4 => addr.is_ipv4(),
            Family::V6 => addr.is_ipv6(),
        }
    }
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Family::Any => write!(f, "IP"),
            Family::V4 => write!(f, "IPv4"),
            Family::V6 => write!(f, "IPv6"),
        }
    }
}

/// Resolves `host` and connects to the first address of the wanted family
/// that accepts the connection.
pub async fn connect(host: &str, port: u16, family: Family) -> Result<TcpStream, ClientError> {
    let candidates: Vec<SocketAddr> = lookup_host((host, port))
        .await?
        .filter(|addr| family.matches(addr))
        .collect();

    let mut last_error = None;
    for addr in candidates {
        debug!("Trying {}", addr);
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                info!("Connected to {}", addr);
                return Ok(stream);
            }
            Err(e) => {
                warn!("Failed to connect to {}: {}", addr, e);
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) => Err(e.into()),
        None => Err(ClientError::NoAddress {
            host: host.to_string(),
            family,
        }),
    }
}

/// Plays one round over `stream`.
///
/// Sends the handshake, then forwards player guesses from `input` once the
/// coefficients arrived and writes a description of every server message to
/// `output`. Returns after the scoreboard or when the server hangs up. Input
/// reaching end of file only stops the guessing.
pub async fn play<S, I, W>(
    stream: S,
    id: &str,
    input: I,
    mut output: W,
) -> Result<GameView, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    I: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut server_lines = BufReader::new(reader).lines();
    let mut input_lines = input.lines();
    let mut input_open = true;
    let mut view = GameView::new(id);

    let hello = ClientMessage::Hello(id.to_string());
    writer.write_all(hello.to_line().as_bytes()).await?;
    debug!("Sent {}", hello);

    loop {
        tokio::select! {
            line = server_lines.next_line() => {
                let Some(line) = line? else {
                    info!("Server closed the connection");
                    break;
                };
                let message = ServerMessage::parse(line.trim_end_matches('\r'))?;
                view.apply(&message);
                output
                    .write_all(format!("{}\n", view.describe(&message)).as_bytes())
                    .await?;
                if view.is_finished() {
                    break;
                }
            }
            line = input_lines.next_line(), if input_open && view.is_ready() => {
                match line? {
                    Some(line) => match parse_guess(&line) {
                        Ok(Some(message)) => {
                            writer.write_all(message.to_line().as_bytes()).await?;
                            debug!("Sent {}", message);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            output
                                .write_all(format!("Not sent: {}\n", e).as_bytes())
                                .await?;
                        }
                    },
                    None => {
                        debug!("Input closed, waiting for the round to end");
                        input_open = false;
                    }
                }
            }
        }
    }

    output.flush().await?;
    Ok(view)
}
