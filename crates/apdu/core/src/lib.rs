//! Core traits and types for APDU (Application Protocol Data Unit) operations
//!
//! This crate provides the foundational types for talking to smart cards
//! according to ISO/IEC 7816-4:
//!
//! - [`Command`] and the [`ApduCommand`] accessor trait for building short APDUs
//! - [`Response`] and [`StatusWord`] for interpreting what the card sent back
//! - [`CardTransport`], the single capability every card connection provides
//!
//! Secure messaging, card management and everything else protocol specific
//! lives in the crates layered on top of this one.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod command;
pub mod response;
pub mod transport;

mod error;
pub use error::{Error, Result, ResultExt};

pub use command::{ApduCommand, Command};
pub use response::Response;
pub use response::status::StatusWord;
pub use transport::CardTransport;

#[cfg(any(test, feature = "mock"))]
pub use transport::mock::ScriptedTransport;

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Bytes, BytesMut, Command, Error, Response, Result, command::ApduCommand,
        response::status::StatusWord, transport::CardTransport,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        let cmd = Command::new(0x00, 0xA4, 0x04, 0x00);
        assert_eq!(cmd.class(), 0x00);
        assert_eq!(cmd.instruction(), 0xA4);
        assert_eq!(cmd.p1(), 0x04);
        assert_eq!(cmd.p2(), 0x00);

        let resp = Response::success(Bytes::from_static(&[0x01, 0x02, 0x03]));
        assert!(resp.is_success());
        assert_eq!(resp.payload().as_ref(), &[0x01, 0x02, 0x03]);
        assert_eq!(resp.status(), StatusWord::new(0x90, 0x00));
    }
}
