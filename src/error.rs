//! Error types for influxdb-line.

use thiserror::Error;

/// Error type for line-protocol parsing, decoding, and encoding.
///
/// Every failure is an ordinary value: each variant carries the raw text
/// that triggered it so callers can report the exact offending input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A line in a batch failed to parse. Batch parsing is all-or-nothing,
    /// so this is the only error `parse_points*` ever returns.
    #[error("unable to parse '{line}': {source}")]
    Line {
        /// Raw text of the offending line.
        line: String,
        /// The per-line failure.
        source: Box<Error>,
    },

    /// The measurement name at the start of the key is empty.
    #[error("missing measurement")]
    MissingMeasurement(String),

    /// No field assignments follow the key.
    #[error("missing fields")]
    MissingFields(String),

    /// A field name is not followed by a value (`name=` at end of input,
    /// or directly before `,` or a space).
    #[error("missing field value")]
    MissingFieldValue(String),

    /// A tag pair has no `=` before the next comma or end of key.
    #[error("missing tag value")]
    MissingTagValue(String),

    /// Two tags in one key share a name.
    #[error("duplicate tags")]
    DuplicateTags(String),

    /// A numeric field value has a malformed digit sequence.
    #[error("invalid number")]
    InvalidNumber(String),

    /// A boolean field value is not one of t, T, f, F, true, TRUE, false,
    /// FALSE.
    #[error("invalid boolean")]
    InvalidBoolean(String),

    /// A quoted string value is not terminated before the end of the field
    /// block.
    #[error("unbalanced quotes")]
    UnbalancedQuotes(String),

    /// The timestamp block contains something other than ASCII digits.
    #[error("bad timestamp")]
    BadTimestamp(String),

    /// A stored field encoding could not be decoded back into values.
    #[error("invalid field bytes: '{0}'")]
    InvalidFieldBytes(String),
}

impl Error {
    /// The raw text carried by this error.
    pub fn offending_text(&self) -> &str {
        match self {
            Error::Line { line, .. } => line,
            Error::MissingMeasurement(s)
            | Error::MissingFields(s)
            | Error::MissingFieldValue(s)
            | Error::MissingTagValue(s)
            | Error::DuplicateTags(s)
            | Error::InvalidNumber(s)
            | Error::InvalidBoolean(s)
            | Error::UnbalancedQuotes(s)
            | Error::BadTimestamp(s)
            | Error::InvalidFieldBytes(s) => s,
        }
    }
}

/// Result type alias for influxdb-line operations.
pub type Result<T> = std::result::Result<T, Error>;
