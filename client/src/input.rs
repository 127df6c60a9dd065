//! Turns typed player input into protocol messages

use shared::{ClientMessage, ProtocolError, Put};

/// Parses a `<point> <value>` line typed by the player.
///
/// Blank lines yield `None`. Lines that would not form a well formed `PUT` are
/// rejected locally; guesses that are merely out of range are still sent so the
/// server can answer them.
pub fn parse_guess(line: &str) -> Result<Option<ClientMessage>, ProtocolError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        [] => Ok(None),
        [point, value] => Ok(Some(ClientMessage::Put(Put::new(*point, *value)?))),
        _ => Err(ProtocolError::MalformedPut(line.trim().to_string())),
    }
}
