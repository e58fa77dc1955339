use std::fmt;

/// Python-style exception classes raised by the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SyntaxError,
    IndentationError,
    NameError,
    TypeError,
    ValueError,
    KeyError,
    IndexError,
    AttributeError,
    ZeroDivisionError,
    OverflowError,
    ImportError,
    MemoryError,
    RuntimeError,
}

impl ErrorKind {
    /// Class name as reported to clients.
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::SyntaxError => "SyntaxError",
            Self::IndentationError => "IndentationError",
            Self::NameError => "NameError",
            Self::TypeError => "TypeError",
            Self::ValueError => "ValueError",
            Self::KeyError => "KeyError",
            Self::IndexError => "IndexError",
            Self::AttributeError => "AttributeError",
            Self::ZeroDivisionError => "ZeroDivisionError",
            Self::OverflowError => "OverflowError",
            Self::ImportError => "ImportError",
            Self::MemoryError => "MemoryError",
            Self::RuntimeError => "RuntimeError",
        }
    }

    /// True for errors detected before any statement runs.
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::SyntaxError | Self::IndentationError)
    }
}

/// An error raised while compiling or running a script.
///
/// `Display` renders the one-line form `"<Class> at line <N>: <message>"`
/// that the exec services put into their `err` field.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptError {
    pub kind: ErrorKind,
    pub line: usize,
    pub message: String,
}

impl ScriptError {
    pub fn new(kind: ErrorKind, line: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            line,
            message: message.into(),
        }
    }

    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SyntaxError, line, message)
    }

    pub fn indentation(line: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IndentationError, line, message)
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at line {}: {}",
            self.kind.class_name(),
            self.line,
            self.message
        )
    }
}

impl std::error::Error for ScriptError {}

/// A runtime error before a line number is attached.
///
/// Expression evaluation produces these; the statement executor stamps the
/// current line when converting into a [`ScriptError`].
#[derive(Debug, Clone, PartialEq)]
pub struct Raised {
    pub kind: ErrorKind,
    pub message: String,
}

impl Raised {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn at(self, line: usize) -> ScriptError {
        ScriptError::new(self.kind, line, self.message)
    }
}

pub type RaiseResult<T> = std::result::Result<T, Raised>;

pub(crate) fn type_error(message: impl Into<String>) -> Raised {
    Raised::new(ErrorKind::TypeError, message)
}

pub(crate) fn value_error(message: impl Into<String>) -> Raised {
    Raised::new(ErrorKind::ValueError, message)
}

pub(crate) fn zero_division(message: &str) -> Raised {
    Raised::new(ErrorKind::ZeroDivisionError, message)
}

pub(crate) fn overflow() -> Raised {
    Raised::new(ErrorKind::OverflowError, "integer overflow")
}

pub(crate) fn too_large() -> Raised {
    Raised::new(ErrorKind::MemoryError, "result is too large")
}

pub(crate) fn recursion(context: &str) -> Raised {
    Raised::new(
        ErrorKind::RuntimeError,
        format!("maximum recursion depth exceeded {context}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_format() {
        let err = ScriptError::new(ErrorKind::ZeroDivisionError, 1, "division by zero");
        assert_eq!(err.to_string(), "ZeroDivisionError at line 1: division by zero");
    }

    #[test]
    fn test_raised_takes_line() {
        let err = Raised::new(ErrorKind::KeyError, "y").at(7);
        assert_eq!(err.line, 7);
        assert_eq!(err.to_string(), "KeyError at line 7: y");
    }

    #[test]
    fn test_syntax_kinds() {
        assert!(ErrorKind::SyntaxError.is_syntax());
        assert!(ErrorKind::IndentationError.is_syntax());
        assert!(!ErrorKind::NameError.is_syntax());
    }
}
