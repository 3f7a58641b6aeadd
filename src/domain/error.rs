//! Domain error types.
//!
//! Two taxonomies are kept apart: [`ValidationError`] describes an ill-typed or
//! ill-shaped gene and is consumed as a yes/no outcome by `Gene::validate`, while
//! [`AlphaError`] is a fault that aborts whatever operation raised it.

use chrono::NaiveDate;

/// A parse error with position information for expression parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Why a gene failed to type-check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("argument {index} of {operator}: expected dimension '{expected}', found '{found}'")]
    ArgumentDimension {
        operator: String,
        index: usize,
        expected: String,
        found: String,
    },

    #[error("argument {index} of {operator}: '{found}' is not an allowed value")]
    ArgumentValue {
        operator: String,
        index: usize,
        found: String,
    },

    #[error("{operator}: incompatible dimensions '{left}' and '{right}'")]
    Incompatible {
        operator: String,
        left: String,
        right: String,
    },

    #[error("{operator}: {reason}")]
    Rule { operator: String, reason: String },

    #[error("gene ends at position {position} while an argument is still expected")]
    Truncated { position: usize },

    #[error("{count} trailing node(s) after the root expression")]
    Trailing { count: usize },
}

/// Direction of a calendar shift, used in range faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Backward,
    Forward,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Backward => write!(f, "backward"),
            Direction::Forward => write!(f, "forward"),
        }
    }
}

/// Top-level error type for alphagene.
#[derive(Debug, thiserror::Error)]
pub enum AlphaError {
    #[error("date {date} lies outside the calendar")]
    DateOutOfRange { date: NaiveDate },

    #[error("shifting {date} {direction} by {offset} trading days leaves the calendar")]
    ShiftOutOfRange {
        date: NaiveDate,
        offset: usize,
        direction: Direction,
    },

    #[error("window {start} to {end} is not covered by series '{series}'")]
    WindowOutOfRange {
        series: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("unknown data series '{0}'")]
    UnknownSeries(String),

    #[error("'{0}' is neither a constant, a data series nor an operator")]
    UnknownNode(String),

    #[error("duplicate {kind} '{name}'")]
    Duplicate { kind: &'static str, name: String },

    #[error("catalog error: {reason}")]
    Catalog { reason: String },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("xml error: {reason}")]
    Xml { reason: String },

    #[error("malformed gene: {0}")]
    Malformed(#[from] ValidationError),

    #[error("evaluation of {operator} failed: {reason}")]
    Eval { operator: String, reason: String },

    #[error("shape mismatch: {reason}")]
    Shape { reason: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AlphaError {
    pub fn eval(operator: impl Into<String>, reason: impl Into<String>) -> Self {
        AlphaError::Eval {
            operator: operator.into(),
            reason: reason.into(),
        }
    }

    /// True for the faults raised when a window or lookback exceeds the known history.
    pub fn is_range_fault(&self) -> bool {
        matches!(
            self,
            AlphaError::DateOutOfRange { .. }
                | AlphaError::ShiftOutOfRange { .. }
                | AlphaError::WindowOutOfRange { .. }
        )
    }
}

impl From<&AlphaError> for std::process::ExitCode {
    fn from(err: &AlphaError) -> Self {
        let code: u8 = match err {
            AlphaError::Io(_) => 1,
            AlphaError::ConfigParse { .. }
            | AlphaError::ConfigMissing { .. }
            | AlphaError::ConfigInvalid { .. }
            | AlphaError::Duplicate { .. }
            | AlphaError::Catalog { .. } => 2,
            AlphaError::Data { .. } | AlphaError::UnknownSeries(_) => 3,
            AlphaError::Parse(_)
            | AlphaError::Xml { .. }
            | AlphaError::UnknownNode(_)
            | AlphaError::Malformed(_) => 4,
            AlphaError::DateOutOfRange { .. }
            | AlphaError::ShiftOutOfRange { .. }
            | AlphaError::WindowOutOfRange { .. } => 5,
            AlphaError::Eval { .. } | AlphaError::Shape { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
