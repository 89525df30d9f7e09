use std::fmt::{Debug, Display};

pub struct Error {
    kind: ErrorKind,
    context: Vec<String>,
}

pub enum ErrorKind {
    Io(std::io::Error),
    WebDriverSession(fantoccini::error::NewSessionError),
    WebDriverCommand(fantoccini::error::CmdError),
    PrintConfiguration(fantoccini::error::PrintConfigurationError),
    Template(minijinja::Error),
    /// Navigation or network-idle wait exceeded the configured timeout
    Timeout,
    /// The owning job was cancelled or dropped
    Cancelled,
    /// Request input rejected before any work was done
    InvalidInput(String),
    Other(String),
}

pub trait AddContext<T> {
    fn add_context(self, ctx: &str) -> Result<T, Error>;
}

impl Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut context = self.context.clone();
        context.reverse();
        let context = if context.is_empty() {
            String::from("no context")
        } else {
            context.join(" -> ")
        };
        write!(f, "{context}")
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error {
            context: vec![format!("{:?}", value)],
            kind: ErrorKind::Io(value),
        }
    }
}

impl From<fantoccini::error::PrintConfigurationError> for Error {
    fn from(value: fantoccini::error::PrintConfigurationError) -> Self {
        Error {
            context: vec![format!("{:?}", value)],
            kind: ErrorKind::PrintConfiguration(value),
        }
    }
}

impl From<fantoccini::error::NewSessionError> for Error {
    fn from(value: fantoccini::error::NewSessionError) -> Self {
        Error {
            context: vec![format!("{:?}", value)],
            kind: ErrorKind::WebDriverSession(value),
        }
    }
}

impl From<fantoccini::error::CmdError> for Error {
    fn from(value: fantoccini::error::CmdError) -> Self {
        Error {
            context: vec![format!("{:?}", value)],
            kind: ErrorKind::WebDriverCommand(value),
        }
    }
}

impl From<minijinja::Error> for Error {
    fn from(value: minijinja::Error) -> Self {
        Error {
            context: vec![value.to_string()],
            kind: ErrorKind::Template(value),
        }
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error {
            context: vec![value.to_string()],
            kind: ErrorKind::Other(value),
        }
    }
}

impl Error {
    /// Build an error for input that was rejected before any rendering happened
    pub fn invalid_input(message: impl Into<String>) -> Error {
        let message = message.into();
        Error {
            context: vec![message.clone()],
            kind: ErrorKind::InvalidInput(message),
        }
    }

    pub fn timeout(context: &str) -> Error {
        Error {
            context: vec![context.to_string()],
            kind: ErrorKind::Timeout,
        }
    }

    pub fn cancelled() -> Error {
        Error {
            context: vec![String::from("cancelled")],
            kind: ErrorKind::Cancelled,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self.kind, ErrorKind::InvalidInput(_))
    }

    /// Add more context to the given error. This context will ultimately be displayed to the user
    /// or written to the server log, and could be useful for correcting bad input or filing a help
    /// ticket.
    ///
    /// Generally a single layer of context should be added for every level that an error is
    /// surfaced. If the error is surfaced all the way to main and not handled there, then all the
    /// context will be displayed in reverse order
    ///
    /// # Arguments
    /// * `context` - Any additional information that would be useful to see if the error is
    /// surfaced
    pub fn add_context(self, context: &str) -> Error {
        let mut existing = self.context.clone();
        existing.push(context.to_string());
        Self {
            context: existing,
            ..self
        }
    }
}

impl<T> AddContext<T> for Result<T, Error> {
    fn add_context(self, ctx: &str) -> Result<T, Error> {
        match self {
            Ok(d) => Ok(d),
            Err(e) => Err(e.add_context(ctx)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_displayed_outermost_first() {
        let err: Result<(), Error> = Err(Error::from(String::from("chromedriver exited")));
        let err = err
            .add_context("connecting to webdriver")
            .add_context("printing pdf")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "printing pdf -> connecting to webdriver -> chromedriver exited"
        );
    }

    #[test]
    fn kinds_are_reported() {
        assert!(Error::cancelled().is_cancelled());
        assert!(Error::invalid_input("missing params").is_invalid_input());
        assert!(matches!(
            Error::timeout("waiting for page").kind(),
            ErrorKind::Timeout
        ));
    }
}
