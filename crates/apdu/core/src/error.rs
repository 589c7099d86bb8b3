//! Core error type for all APDU operations

/// Result type for APDU operations
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Core error type for command encoding, response decoding and transport failures
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// Failed to connect to the device
    #[error("Connection error: failed to connect to device")]
    Connection,

    /// Failed to transmit data
    #[error("Transmission error: failed to transmit data")]
    Transmission,

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,

    /// Raw response or command bytes could not be parsed
    #[error("Parse error: {0}")]
    Parse(&'static str),

    /// Command data does not fit a short APDU
    #[error("Invalid command length: {0}")]
    InvalidCommandLength(usize),

    /// A command was submitted to a secure channel before it was established
    #[error("Secure channel not established")]
    SecureChannelNotEstablished,

    /// Context error with message and source error
    #[error("{context}: {source}")]
    Context {
        /// Contextual message
        context: String,
        /// Source error
        source: Box<Self>,
    },

    /// Generic dynamic error with string message
    #[error("{0}")]
    Message(String),
}

impl Error {
    /// Create a new error with context information
    pub fn with_context<S: Into<String>>(self, context: S) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a new error with a dynamic message
    pub fn message<S: Into<String>>(message: S) -> Self {
        Self::Message(message.into())
    }

    /// Strip any context wrappers and return the underlying error
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Extension trait for Result with APDU Errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context<S: Into<String>>(self, context: S) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context<S: Into<String>>(self, context: S) -> Self {
        self.map_err(|e| e.with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_chain() {
        let result: Result<()> = Err(Error::Transmission);
        let err = result.context("sending SELECT").unwrap_err();

        assert_eq!(
            err.to_string(),
            "sending SELECT: Transmission error: failed to transmit data"
        );
        assert_eq!(err.root(), &Error::Transmission);
    }
}
