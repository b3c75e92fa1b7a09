use std::error::Error as StdError;
use std::io;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// In particular this means that use of Internal is never a guarantee
    /// the error is not, for example, due to a user error - merely that it
    /// cannot be confidently determined by the code.
    Internal,

    /// The user provided invalid input or performed an action that is
    /// unsupported or impossible to complete.
    User,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A caller-supplied argument cannot be used (e.g. a cursor column outside
    /// the terminal coordinate range).
    InvalidArgument,
    /// The input buffer could not grow to hold the next byte.
    OutOfMemory,
    /// Interaction with stdin/stdout or the console failed. The originating
    /// `io::Error` is kept as the source.
    Io,
    /// Nothing usable was entered: an empty line, a line consisting only of a
    /// line terminator, or empty piped input.
    NoInput,
    /// The input contained a byte outside the ASCII range.
    NonAsciiInput,
    /// Piped or redirected input was required but stdin is a terminal.
    InteractiveInputNotAllowed,
    /// Display configuration could not be loaded.
    Config,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct SecretioError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl SecretioError {
    /// Creates a new error with a required category and display message.
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that retains the originating source error.
    pub fn with_source(
        category: ErrorCategory,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: None,
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Shorthand for an internal `Io` error wrapping `source`.
    pub(crate) fn io(msg: impl Into<String>, source: io::Error) -> Self {
        Self::with_kind_and_source(ErrorCategory::Internal, ErrorKind::Io, msg, source)
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Returns true if the error was tagged with `kind`.
    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        self.kind == Some(kind)
    }

    /// The raw OS error code of the underlying I/O failure, if any.
    ///
    /// Walks the source chain, so this also works after `with_context`.
    pub fn os_error_code(&self) -> Option<i32> {
        let mut current: Option<&(dyn StdError + 'static)> = self
            .source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static));
        while let Some(err) = current {
            if let Some(io_err) = err.downcast_ref::<io::Error>() {
                return io_err.raw_os_error();
            }
            current = err.source();
        }
        None
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SecretioError>;
