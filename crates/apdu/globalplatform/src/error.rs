//! Error type for GlobalPlatform operations

use gpcard_apdu_core::StatusWord;
use thiserror::Error;

use crate::keys::KeyUsage;

/// Result type for GlobalPlatform operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for GlobalPlatform operations
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-related errors, including use of a channel that is not established
    #[error(transparent)]
    Transport(#[from] gpcard_apdu_core::Error),

    /// Malformed card data
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Authentication or integrity failure; the session is abandoned
    #[error("Security error: {0}")]
    Security(String),

    /// Card answered with a non-success status word
    #[error("Card returned error status {status} ({})", .name.unwrap_or("unknown"))]
    CardStatus {
        /// Raw status word
        status: StatusWord,
        /// Symbolic name, when known
        name: Option<&'static str>,
    },

    /// Key set or channel settings are not compatible with the card
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Feature the card or caller requested is not supported
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A key with the same usage or id is already present in the set
    #[error("Duplicate key: usage {usage}, id {id:#04x}")]
    DuplicateKey {
        /// Usage of the rejected key
        usage: KeyUsage,
        /// Id of the rejected key
        id: u8,
    },

    /// Cryptographic operation failed
    #[error("Cryptographic error: {0}")]
    Crypto(&'static str),
}

impl Error {
    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Create a security error
    pub fn security(message: impl Into<String>) -> Self {
        Self::Security(message.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create an unsupported-feature error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Create a card status error, attaching the symbolic name when known
    pub const fn card_status(status: StatusWord) -> Self {
        Self::CardStatus {
            status,
            name: status.name(),
        }
    }

    /// Status word carried by this error, if any
    pub const fn status(&self) -> Option<StatusWord> {
        match self {
            Self::CardStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<iso7816_tlv::TlvError> for Error {
    fn from(err: iso7816_tlv::TlvError) -> Self {
        Self::Protocol(format!("malformed TLV: {err:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_status_carries_name() {
        let err = Error::card_status(StatusWord::new(0x69, 0x85));
        assert_eq!(err.status(), Some(StatusWord::new(0x69, 0x85)));
        assert_eq!(
            err.to_string(),
            "Card returned error status 6985 (Conditions of use not satisfied)"
        );

        let err = Error::card_status(StatusWord::new(0x6F, 0x42));
        assert_eq!(err.to_string(), "Card returned error status 6F42 (unknown)");
    }

    #[test]
    fn test_transport_error_is_transparent() {
        let err = Error::from(gpcard_apdu_core::Error::SecureChannelNotEstablished);
        assert_eq!(err.to_string(), "Secure channel not established");
        assert!(err.status().is_none());
    }
}
