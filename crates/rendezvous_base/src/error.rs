use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

use tracing_error::SpanTrace;

/* 📖 # Why a custom error type and not use anyhow/eyre/thiserror etc?

- Better control over error handling
- The rendezvous protocol needs a closed set of failure kinds that the HTTP layer can match on
- Span traces are captured at construction, so logs show where a request failed
 */

/// Error variants that can occur in rendezvous operations.
/// Each variant represents a specific error category with its associated context.
#[derive(Debug)]
pub enum ErrorKind {
    /// A required field was empty
    InvalidInput { message: String },

    /// No live entry exists for the id
    NotFound { id: String },

    /// The waiting entry already has a calling description attached
    AlreadyCalled { id: String },

    /// The URL, query string or JSON body could not be parsed
    MalformedRequest { message: String },

    /// No handler for this method and path
    UnknownRoute { method: String, path: String },

    /// File system operation failed
    FileError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Catch-all for other errors with a message
    Message { message: String },
}

/* 📖 # Why separate ErrorKind and RendezvousError?
ErrorKind holds the structural variants the HTTP layer and tests match on.
RendezvousError wraps it with context strings and the span trace at the point of failure.
*/

/// Error type wrapping an [`ErrorKind`] with context and a captured span trace.
pub struct RendezvousError {
    kind: ErrorKind,
    context: Vec<String>,
    span_trace: SpanTrace,
}

impl RendezvousError {
    /// Creates a new error from an ErrorKind, capturing the current span trace.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: vec![],
            span_trace: SpanTrace::capture(),
        }
    }

    /// Creates a [`ErrorKind::Message`] error.
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Message {
            message: message.into(),
        })
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput {
            message: message.into(),
        })
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound { id: id.into() })
    }

    pub fn already_called(id: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyCalled { id: id.into() })
    }

    pub fn malformed_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedRequest {
            message: message.into(),
        })
    }

    pub fn unknown_route(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownRoute {
            method: method.into(),
            path: path.into(),
        })
    }

    /// Attaches context to an error.
    /// Context is displayed before the error message.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Attaches context using lazy evaluation.
    pub fn with_context<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> String,
    {
        self.context.push(f());
        self
    }

    /// Returns a reference to the underlying ErrorKind.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the context strings in the order they were attached.
    pub fn get_context(&self) -> &[String] {
        &self.context
    }

    /// Returns the span trace captured when the error was created.
    pub fn span_trace(&self) -> &SpanTrace {
        &self.span_trace
    }

    /// Returns the innermost error in the chain.
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        let mut current: &(dyn StdError + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }
}

impl From<ErrorKind> for RendezvousError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<ErrorKind> for Box<RendezvousError> {
    fn from(kind: ErrorKind) -> Self {
        Box::new(RendezvousError::new(kind))
    }
}

impl StdError for RendezvousError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.kind {
            ErrorKind::FileError { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for RendezvousError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ctx in &self.context {
            write!(f, "{}: ", ctx)?;
        }

        match &self.kind {
            ErrorKind::InvalidInput { message } => write!(f, "Invalid input: {}", message),
            ErrorKind::NotFound { id } => write!(f, "No waiting entry with id '{}'", id),
            ErrorKind::AlreadyCalled { id } => {
                write!(f, "Waiting entry '{}' has already been called", id)
            }
            ErrorKind::MalformedRequest { message } => {
                write!(f, "Malformed request: {}", message)
            }
            ErrorKind::UnknownRoute { method, path } => {
                write!(f, "No route for {} {}", method, path)
            }
            ErrorKind::FileError { path, source } => {
                write!(f, "File error at {}: {}", path.display(), source)
            }
            ErrorKind::Message { message } => write!(f, "{}", message),
        }
    }
}

impl fmt::Debug for RendezvousError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self)?;
        write!(f, "Trace: {}", self.span_trace)
    }
}

/* 📖 # Why use Box<RendezvousError> in the result type?

Boxing the error reduces the size of the result type, making it more efficient to return in the common case.
The span trace alone would otherwise make every Result several words wide.
*/

/// Standard result type for rendezvous operations.
pub type RendezvousResult<T> = std::result::Result<T, Box<RendezvousError>>;

/// Builds a boxed [`ErrorKind::Message`] error from a format string.
#[macro_export]
macro_rules! err {
    ($($arg:tt)*) => {
        Box::new($crate::RendezvousError::message(format!($($arg)*)))
    };
}

/// Extension trait for attaching context to Results.
pub trait ResultExt<T> {
    /// Attaches context to an error, consuming and re-wrapping it.
    fn context(self, context: impl Into<String>) -> RendezvousResult<T>;

    /// Attaches context using lazy evaluation.
    /// Context is only evaluated if the result is an error.
    fn with_context<F>(self, f: F) -> RendezvousResult<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for RendezvousResult<T> {
    fn context(self, context: impl Into<String>) -> RendezvousResult<T> {
        self.map_err(|err| Box::new(err.context(context)))
    }

    fn with_context<F>(self, f: F) -> RendezvousResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|err| Box::new(err.with_context(f)))
    }
}
