//! Client-side view of the game
//!
//! The client holds no authority. It mirrors what the server reports: the
//! coefficients of its polynomial, the latest approximation and, at the end of
//! the round, the scoreboard. It also keeps a few counters so the player can
//! see how many guesses were rejected or penalized.

use shared::{format_value, Score, ServerMessage};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameView {
    id: String,
    coefficients: Option<Vec<f64>>,
    approximation: Vec<f64>,
    scores: Option<Vec<Score>>,
    bad_puts: u32,
    penalties: u32,
}

impl GameView {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn coefficients(&self) -> Option<&[f64]> {
        self.coefficients.as_deref()
    }

    pub fn approximation(&self) -> &[f64] {
        &self.approximation
    }

    pub fn scores(&self) -> Option<&[Score]> {
        self.scores.as_deref()
    }

    pub fn bad_puts(&self) -> u32 {
        self.bad_puts
    }

    pub fn penalties(&self) -> u32 {
        self.penalties
    }

    /// Guesses only make sense once the coefficients are known.
    pub fn is_ready(&self) -> bool {
        self.coefficients.is_some()
    }

    /// The round is over once the scoreboard arrived.
    pub fn is_finished(&self) -> bool {
        self.scores.is_some()
    }

    /// Our own final error, if we appear on the scoreboard.
    pub fn own_score(&self) -> Option<f64> {
        self.scores
            .as_ref()?
            .iter()
            .find(|score| score.id == self.id)
            .map(|score| score.error)
    }

    /// Folds a server message into the view.
    pub fn apply(&mut self, message: &ServerMessage) {
        match message {
            ServerMessage::Coeff(coefficients) => self.coefficients = Some(coefficients.clone()),
            ServerMessage::State(values) => self.approximation = values.clone(),
            ServerMessage::BadPut(_) => self.bad_puts += 1,
            ServerMessage::Penalty(_) => self.penalties += 1,
            ServerMessage::Scoring(scores) => self.scores = Some(scores.clone()),
        }
    }

    /// Human readable line for a server message.
    pub fn describe(&self, message: &ServerMessage) -> String {
        match message {
            ServerMessage::Coeff(coefficients) => {
                format!("Target polynomial: {}", polynomial(coefficients))
            }
            ServerMessage::State(values) => format!("Approximation: {}", join(values)),
            ServerMessage::BadPut(put) => format!("Rejected guess {}", put),
            ServerMessage::Penalty(put) => {
                format!("Penalty for {} (sent before the previous reply)", put)
            }
            ServerMessage::Scoring(scores) => {
                let mut text = String::from("Round over:");
                for score in scores {
                    let marker = if score.id == self.id { " (you)" } else { "" };
                    text.push_str(&format!(
                        "\n  {}{}: {}",
                        score.id,
                        marker,
                        format_value(score.error)
                    ));
                }
                text
            }
        }
    }
}

fn join(values: &[f64]) -> String {
    values
        .iter()
        .map(|value| format_value(*value))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Renders `c0 + c1*x + c2*x^2 ...`.
fn polynomial(coefficients: &[f64]) -> String {
    coefficients
        .iter()
        .enumerate()
        .map(|(power, coefficient)| match power {
            0 => format_value(*coefficient),
            1 => format!("{}*x", format_value(*coefficient)),
            _ => format!("{}*x^{}", format_value(*coefficient), power),
        })
        .collect::<Vec<_>>()
        .join(" + ")
}
