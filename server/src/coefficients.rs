//! Polynomial coefficient source and hidden target computation

use crate::error::CoefficientError;
use shared::parse_coefficients;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

/// Supplies one coefficient set per completed handshake.
pub trait CoefficientSource {
    fn next_coefficients(&mut self) -> Result<Vec<f64>, CoefficientError>;
}

/// Line oriented coefficient file.
///
/// Every line holds `COEFF c0 c1 ... cj`, the `COEFF` tag being optional. Blank
/// lines are skipped and the file is read again from the top once exhausted.
#[derive(Debug)]
pub struct CoefficientFile<R> {
    reader: R,
    max_coefficients: usize,
}

impl CoefficientFile<BufReader<File>> {
    pub fn open(path: &Path, max_coefficients: usize) -> Result<Self, CoefficientError> {
        let file = File::open(path).map_err(|e| CoefficientError::Open(path.to_path_buf(), e))?;
        Ok(Self::from_reader(BufReader::new(file), max_coefficients))
    }
}

impl<R: BufRead + Seek> CoefficientFile<R> {
    pub fn from_reader(reader: R, max_coefficients: usize) -> Self {
        Self {
            reader,
            max_coefficients,
        }
    }
}

impl<R: BufRead + Seek> CoefficientSource for CoefficientFile<R> {
    fn next_coefficients(&mut self) -> Result<Vec<f64>, CoefficientError> {
        let mut line = String::new();
        let mut rewound = false;

        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                if rewound {
                    return Err(CoefficientError::Exhausted);
                }
                self.reader.seek(SeekFrom::Start(0))?;
                rewound = true;
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }
            return parse_coefficient_line(&line, self.max_coefficients);
        }
    }
}

/// Parses one line of a coefficient file.
pub fn parse_coefficient_line(line: &str, max: usize) -> Result<Vec<f64>, CoefficientError> {
    let body = line.trim_end_matches(&['\r', '\n'][..]);
    let body = body.strip_prefix("COEFF").unwrap_or(body);
    let coefficients = parse_coefficients(body)?;

    if coefficients.is_empty() {
        return Err(CoefficientError::NoCoefficients);
    }
    if coefficients.len() > max {
        return Err(CoefficientError::TooMany {
            found: coefficients.len(),
            max,
        });
    }
    Ok(coefficients)
}

/// Evaluates `c0 + c1 x + ... + cj x^j` with Horner's scheme.
pub fn evaluate(coefficients: &[f64], x: f64) -> f64 {
    coefficients
        .iter()
        .rev()
        .fold(0.0, |acc, coefficient| acc * x + coefficient)
}

/// Values of the polynomial at the integer points `0..=points`.
pub fn targets(coefficients: &[f64], points: usize) -> Vec<f64> {
    (0..=points)
        .map(|x| evaluate(coefficients, x as f64))
        .collect()
}
