//! ISO-8601 period text for duration-valued configuration keys.
//!
//! Accepted shape: `P[nW][nD][T[nH][nM][n[.f]S]]`. Designators are
//! case-insensitive, so `PT5m` and `PT5M` are the same period. Days are
//! fixed at 24 hours and weeks at 7 days. Year and month designators are
//! rejected because they do not map to a fixed length of time, and negative
//! periods are rejected because every duration key is a delay or timeout.

use std::fmt;
use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;
const SECOND: u128 = NANOS_PER_SEC;
const MINUTE: u128 = 60 * SECOND;
const HOUR: u128 = 60 * MINUTE;
const DAY: u128 = 24 * HOUR;
const WEEK: u128 = 7 * DAY;

/// Reasons period text can be rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeriodError {
    #[error("period must start with 'P'")]
    MissingPrefix,
    #[error("period has no components")]
    Empty,
    #[error("unexpected character {0:?}")]
    Unexpected(char),
    #[error("number is missing a unit designator")]
    DanglingNumber,
    #[error("unit {0:?} is repeated or out of order")]
    OutOfOrder(char),
    #[error("only seconds may carry a fraction")]
    Fraction,
    #[error("years and months have no fixed length")]
    VariableLength,
    #[error("period does not fit in a duration")]
    Overflow,
}

/// Parses ISO-8601 period text into a [`Duration`].
///
/// # Errors
///
/// Returns a [`PeriodError`] describing the first malformed part of the text.
pub fn parse(text: &str) -> Result<Duration, PeriodError> {
    let upper = text.trim().to_ascii_uppercase();
    let bytes = upper.as_bytes();

    if bytes.first() != Some(&b'P') {
        return Err(PeriodError::MissingPrefix);
    }

    let mut i = 1;
    let mut in_time = false;
    let mut last_rank = 0u8;
    let mut total: u128 = 0;

    while i < bytes.len() {
        if bytes[i] == b'T' {
            if in_time {
                return Err(PeriodError::Unexpected('T'));
            }
            in_time = true;
            i += 1;
            continue;
        }

        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == start {
            return Err(PeriodError::Unexpected(char_at(&upper, i)));
        }
        let whole = &upper[start..i];

        let mut fraction = None;
        if i < bytes.len() && (bytes[i] == b'.' || bytes[i] == b',') {
            i += 1;
            let frac_start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i == frac_start {
                return Err(if i < bytes.len() {
                    PeriodError::Unexpected(char_at(&upper, i))
                } else {
                    PeriodError::DanglingNumber
                });
            }
            fraction = Some(&upper[frac_start..i]);
        }

        let Some(&unit) = bytes.get(i) else {
            return Err(PeriodError::DanglingNumber);
        };
        i += 1;

        let (rank, scale) = match (in_time, unit) {
            (false, b'Y' | b'M') => return Err(PeriodError::VariableLength),
            (false, b'W') => (1, WEEK),
            (false, b'D') => (2, DAY),
            (true, b'H') => (3, HOUR),
            (true, b'M') => (4, MINUTE),
            (true, b'S') => (5, SECOND),
            _ => return Err(PeriodError::Unexpected(char_at(&upper, i - 1))),
        };
        if rank <= last_rank {
            return Err(PeriodError::OutOfOrder(char::from(unit)));
        }
        last_rank = rank;

        let amount: u128 = whole.parse().map_err(|_| PeriodError::Overflow)?;
        total = amount
            .checked_mul(scale)
            .and_then(|nanos| total.checked_add(nanos))
            .ok_or(PeriodError::Overflow)?;

        if let Some(digits) = fraction {
            if unit != b'S' {
                return Err(PeriodError::Fraction);
            }
            total = total
                .checked_add(fraction_nanos(digits))
                .ok_or(PeriodError::Overflow)?;
        }
    }

    // "P" and "PT", and a dangling "T" after date components.
    if last_rank == 0 || (in_time && last_rank < 3) {
        return Err(PeriodError::Empty);
    }

    let secs = u64::try_from(total / NANOS_PER_SEC).map_err(|_| PeriodError::Overflow)?;
    // Remainder of a division by 1e9 always fits in u32.
    let nanos = u32::try_from(total % NANOS_PER_SEC).map_err(|_| PeriodError::Overflow)?;
    Ok(Duration::new(secs, nanos))
}

/// The character starting at byte offset `at`. Offsets passed here always
/// follow ASCII bytes, so they sit on a character boundary.
fn char_at(text: &str, at: usize) -> char {
    text.get(at..)
        .and_then(|rest| rest.chars().next())
        .unwrap_or(char::REPLACEMENT_CHARACTER)
}

/// Nanoseconds represented by the digits after a decimal separator.
/// Digits beyond nanosecond precision are dropped.
fn fraction_nanos(digits: &str) -> u128 {
    digits
        .bytes()
        .chain(std::iter::repeat(b'0'))
        .take(9)
        .fold(0, |acc, b| acc * 10 + u128::from(b - b'0'))
}

/// Renders a [`Duration`] as canonical ISO-8601 period text.
///
/// Zero renders as `PT0S`; days are folded into hours so the output always
/// parses back to the same duration: `PT48H`, `PT1H30M`, `PT0.25S`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Iso8601(pub Duration);

impl fmt::Display for Iso8601 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let duration = self.0;
        if duration.is_zero() {
            return f.write_str("PT0S");
        }

        let total = duration.as_secs();
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;
        let nanos = duration.subsec_nanos();

        f.write_str("PT")?;
        if hours > 0 {
            write!(f, "{hours}H")?;
        }
        if minutes > 0 {
            write!(f, "{minutes}M")?;
        }
        if seconds > 0 || nanos > 0 {
            write!(f, "{seconds}")?;
            if nanos > 0 {
                let digits = format!("{nanos:09}");
                write!(f, ".{}", digits.trim_end_matches('0'))?;
            }
            f.write_str("S")?;
        }
        Ok(())
    }
}

/// Shorthand for `Iso8601(duration).to_string()`.
#[must_use]
pub fn format(duration: Duration) -> String {
    Iso8601(duration).to_string()
}
