//! Error types for model skill assessment.

use thiserror::Error;

/// Result type alias using SkillError.
pub type SkillResult<T> = Result<T, SkillError>;

/// Errors raised while building, matching and scoring model/observation data.
#[derive(Debug, Error)]
pub enum SkillError {
    // === Input Errors ===
    /// An input has the wrong kind: non-time index, non-numeric column,
    /// unsupported model/observation combination.
    #[error("invalid type: {0}")]
    InvalidType(String),

    /// An input has the right kind but an unusable value.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// A requested position is outside the model domain.
    #[error("{what} ({x}, {y}) is outside {domain}")]
    OutsideDomain {
        what: String,
        x: f64,
        y: f64,
        domain: String,
    },

    /// Two variables would end up with the same name.
    #[error("name collision: {0}")]
    NameCollision(String),

    // === Lookup Errors ===
    #[error("no data: {0}")]
    NoData(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("index {index} is out of range for {len} items")]
    IndexOutOfRange { index: i64, len: usize },

    // === Query Errors ===
    #[error("invalid query '{expr}': {message}")]
    Query { expr: String, message: String },

    // === Persistence Errors ===
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SkillError {
    pub fn invalid_type(msg: impl Into<String>) -> Self {
        Self::InvalidType(msg.into())
    }

    pub fn invalid_value(msg: impl Into<String>) -> Self {
        Self::InvalidValue(msg.into())
    }

    /// Create an OutsideDomain error.
    pub fn outside_domain(what: impl Into<String>, x: f64, y: f64, domain: impl Into<String>) -> Self {
        Self::OutsideDomain {
            what: what.into(),
            x,
            y,
            domain: domain.into(),
        }
    }

    pub fn name_collision(msg: impl Into<String>) -> Self {
        Self::NameCollision(msg.into())
    }

    pub fn no_data(msg: impl Into<String>) -> Self {
        Self::NoData(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a Query error for an expression.
    pub fn query(expr: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            expr: expr.into(),
            message: message.into(),
        }
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }
}

impl From<serde_json::Error> for SkillError {
    fn from(err: serde_json::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outside_domain_message() {
        let err = SkillError::outside_domain("observation 'Klagshamn'", 11.0, 56.2, "model domain");
        let msg = err.to_string();
        assert!(msg.contains("outside"));
        assert!(msg.contains("Klagshamn"));
    }

    #[test]
    fn test_json_error_maps_to_persistence() {
        let err: SkillError = serde_json::from_str::<f64>("not json").unwrap_err().into();
        assert!(matches!(err, SkillError::Persistence(_)));
    }
}
