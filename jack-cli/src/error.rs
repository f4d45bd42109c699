//! Driver errors.
use std::{fmt, io, path::PathBuf};

#[derive(Debug)]
pub struct AppError {
    pub kind: ErrorKind,
}

#[derive(Debug)]
pub enum ErrorKind {
    /// Compilation failure, tagged with the source file it came
    /// from.
    Compile(PathBuf, jack::JackError),
    Io(PathBuf, io::Error),
    Argument(String),
}

impl AppError {
    pub fn compile(path: impl Into<PathBuf>, err: jack::JackError) -> Self {
        Self {
            kind: ErrorKind::Compile(path.into(), err),
        }
    }

    pub fn io(path: impl Into<PathBuf>, err: io::Error) -> Self {
        Self {
            kind: ErrorKind::Io(path.into(), err),
        }
    }

    pub fn argument(message: impl ToString) -> Self {
        Self {
            kind: ErrorKind::Argument(message.to_string()),
        }
    }
}

impl std::error::Error for AppError {}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compile(path, err) => {
                write!(f, "compilation error in file {}: {}", path.display(), err)
            }
            Self::Io(path, err) => write!(f, "could not access {}: {}", path.display(), err),
            Self::Argument(message) => write!(f, "{message}"),
        }
    }
}
