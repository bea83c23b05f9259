//! Validation error raised while constructing a [`ServerConfig`](crate::ServerConfig).

use crate::constraint::Constraint;

/// A single field of the server configuration failed its declared constraint.
///
/// This is the only failure mode of configuration construction. It carries
/// enough detail for an operator to correct the input: the document key, the
/// supplied (or derived) value, and the rule that was violated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field} {constraint}{}", describe_value(.constraint, .value))]
pub struct ValidationError {
    /// Document key of the offending field, e.g. `numThreads`.
    pub field: &'static str,
    /// The rejected value as it appeared in the input.
    pub value: String,
    /// The rule the value violated.
    pub constraint: Constraint,
}

impl ValidationError {
    pub(crate) fn new(field: &'static str, value: impl ToString, constraint: Constraint) -> Self {
        Self {
            field,
            value: value.to_string(),
            constraint,
        }
    }
}

fn describe_value(constraint: &Constraint, value: &str) -> String {
    match constraint {
        Constraint::NonNull => String::new(),
        Constraint::IsoPeriod => format!(", got {value:?}"),
        Constraint::AtLeast(_) | Constraint::AtMost(_) => format!(", got {value}"),
    }
}
