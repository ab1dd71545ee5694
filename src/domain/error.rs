//! Domain error types.
//!
//! Three families: validation errors (malformed tokens, unknown names,
//! parameter/timeframe problems), evaluation errors (length mismatches,
//! alignment and provider failures), and the ambient config/io errors of the
//! CLI surface. Nothing is retried internally.

/// Top-level error type for stratsim.
#[derive(Debug, thiserror::Error)]
pub enum StratsimError {
    // --- validation ---
    #[error("unknown indicator {name:?}")]
    UnknownIndicator { name: String },

    #[error("unknown function {name:?}")]
    UnknownFunction { name: String },

    #[error("unknown logical operator {op:?}")]
    UnknownLogicalOperator { op: String },

    #[error("invalid timeframe {value:?}")]
    InvalidTimeframe { value: String },

    #[error("{owner}: unknown param {name:?}")]
    UnknownParam { owner: String, name: String },

    #[error("{owner}: missing required params: {names:?}")]
    MissingParams { owner: String, names: Vec<String> },

    #[error("{owner}: param {name:?} must be a number")]
    NonNumericParam { owner: String, name: String },

    #[error("condition error at token {position}: {message}")]
    Condition { message: String, position: usize },

    // --- evaluation ---
    #[error("series length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("unsupported plan op {op:?}")]
    UnsupportedOp { op: String },

    #[error("alignment failed: {reason}")]
    Alignment { reason: String },

    #[error("data provider error: {reason}")]
    DataProvider { reason: String },

    #[error("no data for {symbol} at {timeframe}")]
    NoData { symbol: String, timeframe: String },

    // --- request / config / io ---
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StratsimError {
    /// Shorthand for a positioned condition error.
    pub fn condition(message: impl Into<String>, position: usize) -> Self {
        StratsimError::Condition {
            message: message.into(),
            position,
        }
    }
}

impl StratsimError {
    fn exit_class(&self) -> u8 {
        match self {
            StratsimError::Io(_) | StratsimError::Json(_) => 1,
            StratsimError::ConfigParse { .. } | StratsimError::InvalidRequest { .. } => 2,
            StratsimError::DataProvider { .. } | StratsimError::NoData { .. } => 3,
            StratsimError::UnknownIndicator { .. }
            | StratsimError::UnknownFunction { .. }
            | StratsimError::UnknownLogicalOperator { .. }
            | StratsimError::InvalidTimeframe { .. }
            | StratsimError::UnknownParam { .. }
            | StratsimError::MissingParams { .. }
            | StratsimError::NonNumericParam { .. }
            | StratsimError::Condition { .. } => 4,
            StratsimError::LengthMismatch { .. }
            | StratsimError::UnsupportedOp { .. }
            | StratsimError::Alignment { .. } => 5,
        }
    }
}

impl From<&StratsimError> for std::process::ExitCode {
    fn from(err: &StratsimError) -> Self {
        std::process::ExitCode::from(err.exit_class())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_position() {
        let err = StratsimError::condition("missing comparison operator", 3);
        assert_eq!(
            err.to_string(),
            "condition error at token 3: missing comparison operator"
        );
    }

    #[test]
    fn display_names_offender() {
        let err = StratsimError::UnknownIndicator {
            name: "SuperDuper".into(),
        };
        assert!(err.to_string().contains("SuperDuper"));
    }

    #[test]
    fn exit_codes_by_family() {
        let validation = StratsimError::InvalidTimeframe { value: "7m".into() };
        let eval = StratsimError::LengthMismatch { left: 5, right: 6 };
        let data = StratsimError::NoData {
            symbol: "RELIANCE".into(),
            timeframe: "5m".into(),
        };
        assert_eq!(validation.exit_class(), 4);
        assert_eq!(eval.exit_class(), 5);
        assert_eq!(data.exit_class(), 3);
    }
}
