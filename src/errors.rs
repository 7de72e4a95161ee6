//! Error types for parsing and topology operations

use thiserror::Error;

/// Errors produced while parsing server strings or mutating the layout
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    /// Bad grammar in a modeline, mode or metamode record
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A display identifier or modeline name that does not resolve
    #[error("missing reference: {0}")]
    MissingReference(String),

    /// A transport round-trip failed while building the layout
    #[error("query '{query}' failed: {reason}")]
    QueryFailure { query: String, reason: String },

    /// A record that parses but would break a graph invariant
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl LayoutError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput(msg.into())
    }

    pub fn missing(msg: impl Into<String>) -> Self {
        Self::MissingReference(msg.into())
    }

    pub fn query(query: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::QueryFailure {
            query: query.into(),
            reason: reason.into(),
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Whether the caller may skip the offending record and keep going.
    /// Only query failures abort a build.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::QueryFailure { .. })
    }
}

/// Result type for layout operations
pub type Result<T> = std::result::Result<T, LayoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_failure_is_not_recoverable() {
        assert!(!LayoutError::query("metamodes", "timeout").is_recoverable());
        assert!(LayoutError::malformed("x").is_recoverable());
        assert!(LayoutError::missing("DPY-9").is_recoverable());
        assert!(LayoutError::invariant("empty").is_recoverable());
    }

    #[test]
    fn test_display_messages() {
        let err = LayoutError::query("modelines", "connection closed");
        assert_eq!(err.to_string(), "query 'modelines' failed: connection closed");
        assert_eq!(
            LayoutError::malformed("bad flag").to_string(),
            "malformed input: bad flag"
        );
    }
}
