//! Result and errors.
use std::{
    fmt::{self, Display, Formatter},
    io,
    string::FromUtf8Error,
};

pub type JackResult<T> = std::result::Result<T, JackError>;

#[derive(Debug)]
pub enum JackError {
    /// Lexical, syntactic or semantic failure in a source class.
    Compile(CompileError),
    Io(io::Error),
    Utf8(FromUtf8Error),
}

impl Display for JackError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Compile(err) => write!(f, "{}", err),
            Self::Io(err) => write!(f, "{}", err),
            Self::Utf8(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for JackError {}

impl From<CompileError> for JackError {
    fn from(err: CompileError) -> Self {
        JackError::Compile(err)
    }
}

impl From<io::Error> for JackError {
    fn from(err: io::Error) -> Self {
        JackError::Io(err)
    }
}

impl From<FromUtf8Error> for JackError {
    fn from(err: FromUtf8Error) -> Self {
        JackError::Utf8(err)
    }
}

/// Diagnostic for a failure in a source class.
///
/// Carries the 1-based line number of the offending token, or the
/// opening line for multi-line issues such as an unclosed block
/// comment.
#[derive(Debug)]
pub struct CompileError {
    pub line: usize,
    pub message: String,
}

impl CompileError {
    pub fn new(line: usize, message: impl ToString) -> Self {
        Self {
            line,
            message: message.to_string(),
        }
    }
}

impl Display for CompileError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Error on line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for CompileError {}
