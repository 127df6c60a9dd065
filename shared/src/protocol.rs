//! Text protocol codec
//!
//! Lines handed to the parsers here never include the trailing CRLF; framing is
//! the transport's job. Serializers come in two flavours: `Display` renders the
//! bare line and `to_line` appends the terminator ready for the wire.

use crate::{LINE_TERMINATOR, MAX_ABS_VALUE, MAX_FRACTION_DIGITS};
use std::fmt;
use thiserror::Error;

/// Reasons a line fails to decode
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("malformed HELLO: {0:?}")]
    MalformedHello(String),

    #[error("malformed PUT: {0:?}")]
    MalformedPut(String),

    #[error("invalid rational {0:?}")]
    InvalidRational(String),

    #[error("invalid number {0:?}")]
    InvalidNumber(String),

    #[error("unknown message: {0:?}")]
    UnknownMessage(String),
}

/// Identifiers are non-empty and made of ASCII letters and digits only.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Non-empty run of ASCII digits.
pub fn is_integer(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

/// Optional `-`, digits, then optionally `.` followed by one to seven digits.
pub fn is_rational(token: &str) -> bool {
    let unsigned = token.strip_prefix('-').unwrap_or(token);
    match unsigned.split_once('.') {
        Some((whole, fraction)) => {
            is_integer(whole)
                && is_integer(fraction)
                && fraction.len() <= MAX_FRACTION_DIGITS
        }
        None => is_integer(unsigned),
    }
}

/// Parses a token that must satisfy [`is_rational`].
pub fn parse_rational(token: &str) -> Result<f64, ProtocolError> {
    if !is_rational(token) {
        return Err(ProtocolError::InvalidRational(token.to_string()));
    }
    token
        .parse()
        .map_err(|_| ProtocolError::InvalidRational(token.to_string()))
}

/// Parses a whitespace separated list of rationals, e.g. the body of a `COEFF` line.
pub fn parse_coefficients(line: &str) -> Result<Vec<f64>, ProtocolError> {
    line.split_whitespace().map(parse_rational).collect()
}

/// Number of lowercase ASCII letters, used as the STATE reply delay in seconds.
pub fn count_lowercase(id: &str) -> u64 {
    id.bytes().filter(|b| b.is_ascii_lowercase()).count() as u64
}

/// Shortest decimal form that reads back to the same double.
pub fn format_value(value: f64) -> String {
    format!("{}", value)
}

fn parse_number(token: &str) -> Result<f64, ProtocolError> {
    token
        .parse()
        .map_err(|_| ProtocolError::InvalidNumber(token.to_string()))
}

fn write_values(f: &mut fmt::Formatter<'_>, tag: &str, values: &[f64]) -> fmt::Result {
    write!(f, "{}", tag)?;
    for value in values {
        write!(f, " {}", format_value(*value))?;
    }
    Ok(())
}

/// A syntactically valid guess.
///
/// The original tokens are kept so `BAD_PUT` and `PENALTY` echo exactly what the
/// client sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Put {
    point: String,
    value: String,
}

impl Put {
    pub fn new(point: impl Into<String>, value: impl Into<String>) -> Result<Self, ProtocolError> {
        let point = point.into();
        let value = value.into();
        if !is_integer(&point) || !is_rational(&value) {
            return Err(ProtocolError::MalformedPut(format!("PUT {} {}", point, value)));
        }
        Ok(Self { point, value })
    }

    pub fn point(&self) -> &str {
        &self.point
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Point index, `None` when it does not even fit a `usize`.
    pub fn index(&self) -> Option<usize> {
        self.point.parse().ok()
    }

    pub fn amount(&self) -> f64 {
        // Validated in `new`, the standard parser accepts every rational we do.
        self.value.parse().unwrap_or(f64::NAN)
    }

    /// A guess is bad when it targets a point past `points` or its magnitude
    /// exceeds [`MAX_ABS_VALUE`]. The bound is inclusive.
    pub fn is_bad(&self, points: usize) -> bool {
        match self.index() {
            Some(index) if index <= points => {
                let amount = self.amount();
                amount.is_nan() || amount.abs() > MAX_ABS_VALUE
            }
            _ => true,
        }
    }
}

impl fmt::Display for Put {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.point, self.value)
    }
}

/// Messages sent by a client
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Hello(String),
    Put(Put),
}

impl ClientMessage {
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        if let Some(id) = line.strip_prefix("HELLO ") {
            if !is_valid_id(id) {
                return Err(ProtocolError::MalformedHello(line.to_string()));
            }
            return Ok(ClientMessage::Hello(id.to_string()));
        }
        if line.starts_with("HELLO") {
            return Err(ProtocolError::MalformedHello(line.to_string()));
        }
        if line.starts_with("PUT") {
            return Self::parse_put(line).map(ClientMessage::Put);
        }
        Err(ProtocolError::UnknownMessage(line.to_string()))
    }

    /// Accepts exactly `PUT <point> <value>` with single spaces.
    pub fn parse_put(line: &str) -> Result<Put, ProtocolError> {
        let malformed = || ProtocolError::MalformedPut(line.to_string());
        let body = line.strip_prefix("PUT ").ok_or_else(malformed)?;
        let (point, value) = body.split_once(' ').ok_or_else(malformed)?;
        Put::new(point, value).map_err(|_| malformed())
    }

    pub fn to_line(&self) -> String {
        format!("{}{}", self, LINE_TERMINATOR)
    }
}

impl fmt::Display for ClientMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientMessage::Hello(id) => write!(f, "HELLO {}", id),
            ClientMessage::Put(put) => write!(f, "PUT {}", put),
        }
    }
}

/// One entry of a `SCORING` line
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub id: String,
    pub error: f64,
}

/// Messages sent by the server
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Coeff(Vec<f64>),
    State(Vec<f64>),
    BadPut(Put),
    Penalty(Put),
    Scoring(Vec<Score>),
}

impl ServerMessage {
    /// Builds a `SCORING` message with entries ordered by identifier.
    pub fn scoring(mut scores: Vec<Score>) -> Self {
        scores.sort_by(|a, b| a.id.cmp(&b.id));
        ServerMessage::Scoring(scores)
    }

    /// Decodes a server line. Numbers are read leniently since the server prints
    /// full double precision.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let mut tokens = line.split(' ');
        let tag = tokens.next().unwrap_or_default();
        let rest: Vec<&str> = tokens.collect();

        let numbers = |rest: &[&str]| -> Result<Vec<f64>, ProtocolError> {
            rest.iter().map(|token| parse_number(token)).collect()
        };
        let guess = |rest: &[&str]| -> Result<Put, ProtocolError> {
            match rest {
                [point, value] => Put::new(*point, *value),
                _ => Err(ProtocolError::MalformedPut(line.to_string())),
            }
        };

        match tag {
            "COEFF" => Ok(ServerMessage::Coeff(numbers(&rest)?)),
            "STATE" => Ok(ServerMessage::State(numbers(&rest)?)),
            "BAD_PUT" => Ok(ServerMessage::BadPut(guess(&rest)?)),
            "PENALTY" => Ok(ServerMessage::Penalty(guess(&rest)?)),
            "SCORING" => {
                if rest.len() % 2 != 0 {
                    return Err(ProtocolError::UnknownMessage(line.to_string()));
                }
                let scores = rest
                    .chunks(2)
                    .map(|pair| {
                        Ok(Score {
                            id: pair[0].to_string(),
                            error: parse_number(pair[1])?,
                        })
                    })
                    .collect::<Result<Vec<_>, ProtocolError>>()?;
                Ok(ServerMessage::Scoring(scores))
            }
            _ => Err(ProtocolError::UnknownMessage(line.to_string())),
        }
    }

    pub fn to_line(&self) -> String {
        format!("{}{}", self, LINE_TERMINATOR)
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Coeff(values) => write_values(f, "COEFF", values),
            ServerMessage::State(values) => write_values(f, "STATE", values),
            ServerMessage::BadPut(put) => write!(f, "BAD_PUT {}", put),
            ServerMessage::Penalty(put) => write!(f, "PENALTY {}", put),
            ServerMessage::Scoring(scores) => {
                write!(f, "SCORING")?;
                for score in scores {
                    write!(f, " {} {}", score.id, format_value(score.error))?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_identifier_validity() {
        assert!(is_valid_id("abc"));
        assert!(is_valid_id("Player01"));
        assert!(is_valid_id("7"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("with space"));
        assert!(!is_valid_id("under_score"));
        assert!(!is_valid_id("zażółć"));
    }

    #[test]
    fn test_rational_validity() {
        for token in ["0", "-0", "12", "-3.5", "4.1234567", "007.10"] {
            assert!(is_rational(token), "{} should be a rational", token);
        }
        for token in ["", "-", ".5", "1.", "1.2.3", "1e5", "+1", "4.12345678", "1,5", " 1"] {
            assert!(!is_rational(token), "{:?} should not be a rational", token);
        }
    }

    #[test]
    fn test_parse_rational() {
        assert_approx_eq!(parse_rational("-2.25").unwrap(), -2.25);
        assert_approx_eq!(parse_rational("3").unwrap(), 3.0);
        assert_eq!(
            parse_rational("3.00000001"),
            Err(ProtocolError::InvalidRational("3.00000001".to_string()))
        );
    }

    #[test]
    fn test_parse_coefficients() {
        let coefficients = parse_coefficients("1 -2.5  0.125").unwrap();
        assert_eq!(coefficients, vec![1.0, -2.5, 0.125]);
        assert!(parse_coefficients("1 x").is_err());
        assert!(parse_coefficients("").unwrap().is_empty());
    }

    #[test]
    fn test_count_lowercase() {
        assert_eq!(count_lowercase("abc"), 3);
        assert_eq!(count_lowercase("AbC9d"), 2);
        assert_eq!(count_lowercase("XYZ123"), 0);
    }

    #[test]
    fn test_parse_hello() {
        assert_eq!(
            ClientMessage::parse("HELLO abc1").unwrap(),
            ClientMessage::Hello("abc1".to_string())
        );
        assert!(matches!(
            ClientMessage::parse("HELLO "),
            Err(ProtocolError::MalformedHello(_))
        ));
        assert!(matches!(
            ClientMessage::parse("HELLO a b"),
            Err(ProtocolError::MalformedHello(_))
        ));
        assert!(matches!(
            ClientMessage::parse("HELLOabc"),
            Err(ProtocolError::MalformedHello(_))
        ));
    }

    #[test]
    fn test_parse_put() {
        let put = ClientMessage::parse_put("PUT 3 -1.5").unwrap();
        assert_eq!(put.point(), "3");
        assert_eq!(put.value(), "-1.5");
        assert_eq!(put.index(), Some(3));
        assert_approx_eq!(put.amount(), -1.5);

        for line in [
            "PUT 3",
            "PUT  3 1",
            "PUT 3  1",
            "PUT -3 1",
            "PUT 3 1 ",
            "PUT x 1",
            "PUT 3 1.",
            "put 3 1",
        ] {
            assert!(ClientMessage::parse_put(line).is_err(), "{:?} accepted", line);
        }
    }

    #[test]
    fn test_bad_put_point_boundary() {
        let points = 2;
        assert!(!Put::new("2", "1").unwrap().is_bad(points));
        assert!(Put::new("3", "0").unwrap().is_bad(points));
        assert!(Put::new("99999999999999999999999", "0").unwrap().is_bad(points));
    }

    #[test]
    fn test_bad_put_value_boundary() {
        assert!(!Put::new("0", "5.000000").unwrap().is_bad(10));
        assert!(!Put::new("0", "-5").unwrap().is_bad(10));
        assert!(Put::new("0", "5.0000001").unwrap().is_bad(10));
        assert!(Put::new("0", "-6").unwrap().is_bad(10));
        assert!(Put::new("0", "5.00000001").is_err());
    }

    #[test]
    fn test_client_message_lines() {
        let put = Put::new("1", "0.5").unwrap();
        assert_eq!(ClientMessage::Put(put).to_line(), "PUT 1 0.5\r\n");
        assert_eq!(ClientMessage::Hello("me".to_string()).to_line(), "HELLO me\r\n");
    }

    #[test]
    fn test_server_message_lines() {
        assert_eq!(
            ServerMessage::State(vec![1.0, 0.0, -0.25]).to_line(),
            "STATE 1 0 -0.25\r\n"
        );
        assert_eq!(
            ServerMessage::Penalty(Put::new("4", "1.50").unwrap()).to_string(),
            "PENALTY 4 1.50"
        );
        assert_eq!(
            ServerMessage::BadPut(Put::new("9", "7").unwrap()).to_string(),
            "BAD_PUT 9 7"
        );
    }

    #[test]
    fn test_scoring_sorted_by_identifier() {
        let message = ServerMessage::scoring(vec![
            Score { id: "bob".to_string(), error: 2.5 },
            Score { id: "Zed".to_string(), error: 1.0 },
            Score { id: "alice".to_string(), error: 0.0 },
        ]);
        assert_eq!(message.to_string(), "SCORING Zed 1 alice 0 bob 2.5");
    }

    #[test]
    fn test_parse_server_messages() {
        assert_eq!(
            ServerMessage::parse("STATE 1 0.30000000000000004").unwrap(),
            ServerMessage::State(vec![1.0, 0.30000000000000004])
        );
        assert_eq!(
            ServerMessage::parse("SCORING a 1.5 b 2").unwrap(),
            ServerMessage::Scoring(vec![
                Score { id: "a".to_string(), error: 1.5 },
                Score { id: "b".to_string(), error: 2.0 },
            ])
        );
        assert!(ServerMessage::parse("SCORING a").is_err());
        assert!(ServerMessage::parse("BAD_PUT 1").is_err());
        assert!(ServerMessage::parse("HELLO x").is_err());
    }
}
