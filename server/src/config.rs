//! Command line configuration of the game server

use clap::Parser;
use std::path::PathBuf;

/// Approximation game server
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Port to listen on, 0 picks an ephemeral one
    #[arg(short = 'p', long, default_value_t = 0)]
    pub port: u16,

    /// Largest point index a player may guess at
    #[arg(short = 'k', long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..=10000))]
    pub points: u32,

    /// Maximum degree of the hidden polynomials
    #[arg(short = 'n', long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..=8))]
    pub degree: u32,

    /// Accepted guesses that end a round
    #[arg(short = 'm', long, default_value_t = 131, value_parser = clap::value_parser!(u64).range(1..=12341234))]
    pub target: u64,

    /// File with one line of polynomial coefficients per player
    #[arg(short = 'f', long)]
    pub file: PathBuf,
}

/// Validated server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub points: usize,
    pub degree: usize,
    pub target: u64,
    pub coefficients: PathBuf,
}

impl ServerConfig {
    /// A polynomial of degree `n` has at most `n + 1` coefficients.
    pub fn max_coefficients(&self) -> usize {
        self.degree + 1
    }
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            port: args.port,
            points: args.points as usize,
            degree: args.degree as usize,
            target: args.target,
            coefficients: args.file,
        }
    }
}
