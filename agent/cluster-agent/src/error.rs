use std::fmt::{Display, Formatter};

/// When an operation fails, it states which kind of failure occurred so that callers can decide
/// whether retrying or re-running makes sense.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// The requested configuration is invalid. No remote call was made.
    Validation,

    /// A queried entity does not exist.
    NotFound,

    /// The provider does not support the requested capability.
    NotImplemented,

    /// A cloud API, DNS API or remote command failed.
    Remote,

    /// The operation would overwrite something that already exists.
    Conflict,

    /// A bounded wait gave up before the awaited condition held.
    Timeout,
}

impl ErrorKind {
    pub fn message(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "Invalid configuration",
            ErrorKind::NotFound => "Not found",
            ErrorKind::NotImplemented => "Not implemented",
            ErrorKind::Remote => "Remote operation failed",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::Timeout => "Timed out",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self.message(), f)
    }
}

/// The error type returned by providers, remote executors and the orchestrator.
#[derive(Debug)]
pub struct ProviderError {
    kind: ErrorKind,

    /// Any message to be included with the error. This will be included in the formatted display
    /// before `inner`.
    context: Option<String>,

    /// The error that caused this error.
    inner: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

/// The result type returned by all cluster operations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

impl ProviderError {
    pub fn new_with_source_and_context<S, E>(kind: ErrorKind, context: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self {
            kind,
            context: Some(context.into()),
            inner: Some(source.into()),
        }
    }

    pub fn new_with_source<E>(kind: ErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self {
            kind,
            context: None,
            inner: Some(source.into()),
        }
    }

    pub fn new_with_context<S>(kind: ErrorKind, context: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            kind,
            context: Some(context.into()),
            inner: None,
        }
    }

    /// Shorthand for a provider that lacks `what`.
    pub fn not_implemented<S: Into<String>>(what: S) -> Self {
        Self::new_with_context(ErrorKind::NotImplemented, what)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn inner(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.inner.as_ref().map(|some| some.as_ref())
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(context) = self.context() {
            write!(f, ", {}", context)?;
        }
        if let Some(inner) = self.inner() {
            write!(f, ": {}", inner)?;
        }
        Ok(())
    }
}

// Make `ProviderError` function as a standard error.
impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<meshfleet_model::Error> for ProviderError {
    fn from(e: meshfleet_model::Error) -> Self {
        let kind = if e.is_not_found() {
            ErrorKind::NotFound
        } else {
            ErrorKind::Validation
        };
        ProviderError::new_with_source(kind, e)
    }
}

/// A trait that makes it possible to convert error types to `ProviderError` using a familiar
/// `context` function.
pub trait IntoProviderError<T> {
    /// Convert `self` into a `ProviderError`.
    fn context<S>(self, kind: ErrorKind, message: S) -> ProviderResult<T>
    where
        S: Into<String>;
}

// Implement `IntoProviderError` for all standard `Error + Send + Sync + 'static` types.
impl<T, E> IntoProviderError<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context<S>(self, kind: ErrorKind, message: S) -> ProviderResult<T>
    where
        S: Into<String>,
    {
        self.map_err(|e| ProviderError::new_with_source_and_context(kind, message, e))
    }
}

// Implement `IntoProviderError` for options where `None` is converted into an error.
impl<T> IntoProviderError<T> for std::option::Option<T> {
    fn context<S>(self, kind: ErrorKind, message: S) -> ProviderResult<T>
    where
        S: Into<String>,
    {
        self.ok_or_else(|| ProviderError::new_with_context(kind, message))
    }
}
