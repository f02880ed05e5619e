use std::fmt;

use thiserror::Error;

/// Location of a parse or decode failure.
///
/// `line` is 1-based and counted by row separators consumed so far, so a
/// row separator embedded in a quoted field advances it as well.
/// `offset` is a byte offset: into the decoded text for syntax errors, into
/// the raw input for decode failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub offset: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}", self.line)
    }
}

#[derive(Error, Debug)]
/// CSV engine error
pub enum CsvError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{message} in {position}.")]
    MalformedCsv { message: String, position: Position },

    #[error("invalid byte sequence in {encoding} in {position}.")]
    MalformedEncoding { encoding: String, position: Position },

    #[error("unmappable character for {encoding} in line {line}.")]
    UnmappableCharacter { encoding: String, line: usize },

    #[error("transform failed: {0}")]
    Transform(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CsvError {
    pub(crate) fn malformed(message: impl Into<String>, position: Position) -> Self {
        CsvError::MalformedCsv {
            message: message.into(),
            position,
        }
    }

    /// Wraps any displayable failure raised from a user transform.
    pub fn transform(error: impl fmt::Display) -> Self {
        CsvError::Transform(error.to_string())
    }

    /// Line number carried by positioned errors.
    pub fn line(&self) -> Option<usize> {
        match self {
            CsvError::MalformedCsv { position, .. } => Some(position.line),
            CsvError::MalformedEncoding { position, .. } => Some(position.line),
            CsvError::UnmappableCharacter { line, .. } => Some(*line),
            _ => None,
        }
    }
}

/// Non-fatal condition reported while a stream is set up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    UnsupportedEncoding { name: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnsupportedEncoding { name } => {
                write!(f, "unsupported encoding {} ignored", name)
            }
        }
    }
}
