//! ICAO 9303 check digits.

use serde::{Deserialize, Serialize};

const WEIGHTS: [u32; 3] = [7, 3, 1];

/// Numeric value of an MRZ character: digits as is, `A`-`Z` from 10, filler 0.
pub fn char_value(c: char) -> Option<u32> {
    match c {
        '0'..='9' => c.to_digit(10),
        'A'..='Z' => Some(c as u32 - 'A' as u32 + 10),
        '<' => Some(0),
        _ => None,
    }
}

/// Compute the 7-3-1 weighted check digit of a field.
pub fn check_digit(field: &str) -> Option<u32> {
    let mut sum = 0;
    for (i, c) in field.chars().enumerate() {
        sum += char_value(c)? * WEIGHTS[i % 3];
    }
    Some(sum % 10)
}

/// A check digit as printed next to the value it guards, and as recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckDigit {
    pub read: Option<u32>,
    pub computed: Option<u32>,
}

impl CheckDigit {
    /// Read the digit at `digit` and recompute it over `field`.
    ///
    /// A filler in the digit position counts as zero.
    pub fn verify(field: &str, digit: char) -> Self {
        Self {
            read: match digit {
                '<' => Some(0),
                d => d.to_digit(10),
            },
            computed: check_digit(field),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.read.is_some() && self.read == self.computed
    }
}
