use crate::errors::types::Error;
use std::fmt;

/// Where an error happened
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Component where the error occurred
    pub component: String,
    /// Operation that was being performed
    pub operation: String,
    /// Additional context information
    pub details: Option<String>,
}

impl ErrorContext {
    pub fn new<S: Into<String>, T: Into<String>>(component: S, operation: T) -> Self {
        ErrorContext {
            component: component.into(),
            operation: operation.into(),
            details: None,
        }
    }

    pub fn with_details<S: Into<String>>(mut self, details: S) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "in component '{}' during operation '{}'", self.component, self.operation)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

/// Attach an [`ErrorContext`] to an error while keeping its kind
pub trait ErrorExt {
    fn context(self, ctx: ErrorContext) -> Error;

    fn with_context<S: Into<String>, T: Into<String>>(self, component: S, operation: T) -> Error
    where
        Self: Sized,
    {
        self.context(ErrorContext::new(component, operation))
    }
}

impl ErrorExt for Error {
    fn context(self, ctx: ErrorContext) -> Error {
        match self {
            Error::Config(msg) => Error::Config(format!("{} [{}]", msg, ctx)),
            Error::Logging(msg) => Error::Logging(format!("{} [{}]", msg, ctx)),
            Error::Validation(msg) => Error::Validation(format!("{} [{}]", msg, ctx)),
            Error::Io(e) => Error::Io(std::io::Error::new(e.kind(), format!("{} [{}]", e, ctx))),
        }
    }
}
