//! Declarative per-field constraints for the server configuration.
//!
//! Each numeric field carries an inclusive `[min, max]` range. The upper
//! bound of most fields is the width of the document type (32-bit signed for
//! int-typed keys, 64-bit signed for long-typed keys), so the same check that
//! enforces a declared minimum also rejects values that cannot be stored.

use std::fmt;

use crate::config::keys;
use crate::error::ValidationError;

/// Largest value of an int-typed document key.
pub const INT_MAX: i64 = 2_147_483_647;

/// Largest value of a long-typed document key.
pub const LONG_MAX: i64 = i64::MAX;

/// A rule a configuration value must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constraint {
    /// Value must be greater than or equal to the bound.
    AtLeast(i64),
    /// Value must be less than or equal to the bound.
    AtMost(i64),
    /// Key may be omitted but must not be explicitly null.
    NonNull,
    /// Value must be ISO-8601 period text such as `PT5M`.
    IsoPeriod,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtLeast(min) => write!(f, "must be >= {min}"),
            Self::AtMost(max) => write!(f, "must be <= {max}"),
            Self::NonNull => f.write_str("must not be null"),
            Self::IsoPeriod => f.write_str("must be an ISO-8601 period"),
        }
    }
}

/// Inclusive numeric range declared for one configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    /// Document key the rule applies to.
    pub field: &'static str,
    /// Smallest accepted value.
    pub min: i64,
    /// Largest accepted value.
    pub max: i64,
}

impl FieldRule {
    const fn new(field: &'static str, min: i64, max: i64) -> Self {
        Self { field, min, max }
    }

    /// Checks `value` against the rule, reporting the lower bound first.
    ///
    /// Takes a wide integer so that input beyond 64 bits still reaches the
    /// rule and is reported as a maximum violation.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the field, the value and the
    /// violated bound.
    pub fn check(&self, value: i128) -> Result<i64, ValidationError> {
        if value < i128::from(self.min) {
            return Err(ValidationError::new(
                self.field,
                value,
                Constraint::AtLeast(self.min),
            ));
        }
        match i64::try_from(value) {
            Ok(narrowed) if narrowed <= self.max => Ok(narrowed),
            _ => Err(ValidationError::new(
                self.field,
                value,
                Constraint::AtMost(self.max),
            )),
        }
    }
}

/// `numThreads`: at least one worker thread.
pub const NUM_THREADS: FieldRule = FieldRule::new(keys::NUM_THREADS, 1, INT_MAX);
/// `queueSize`: at least one queued request.
pub const QUEUE_SIZE: FieldRule = FieldRule::new(keys::QUEUE_SIZE, 1, INT_MAX);
/// `defaultQueryTimeout`: milliseconds, zero allowed.
pub const DEFAULT_QUERY_TIMEOUT: FieldRule =
    FieldRule::new(keys::DEFAULT_QUERY_TIMEOUT, 0, LONG_MAX);
/// `maxScatterGatherBytes`: at least one byte.
pub const MAX_SCATTER_GATHER_BYTES: FieldRule =
    FieldRule::new(keys::MAX_SCATTER_GATHER_BYTES, 1, LONG_MAX);
/// `maxQueryTimeout`: at least one millisecond.
pub const MAX_QUERY_TIMEOUT: FieldRule = FieldRule::new(keys::MAX_QUERY_TIMEOUT, 1, LONG_MAX);
/// Header size has no declared minimum; the lower bound of 0 only keeps the
/// value storable as an unsigned size.
pub const MAX_REQUEST_HEADER_SIZE: FieldRule =
    FieldRule::new(keys::MAX_REQUEST_HEADER_SIZE, 0, INT_MAX);
/// `inflateBufferSize`: bytes, zero allowed.
pub const INFLATE_BUFFER_SIZE: FieldRule = FieldRule::new(keys::INFLATE_BUFFER_SIZE, 0, INT_MAX);
/// `compressionLevel`: zlib levels 0-9, or -1 for the codec default.
pub const COMPRESSION_LEVEL: FieldRule = FieldRule::new(keys::COMPRESSION_LEVEL, -1, 9);

/// Every numeric rule, in declared field order.
pub const FIELD_RULES: [FieldRule; 8] = [
    NUM_THREADS,
    QUEUE_SIZE,
    DEFAULT_QUERY_TIMEOUT,
    MAX_SCATTER_GATHER_BYTES,
    MAX_QUERY_TIMEOUT,
    MAX_REQUEST_HEADER_SIZE,
    INFLATE_BUFFER_SIZE,
    COMPRESSION_LEVEL,
];
