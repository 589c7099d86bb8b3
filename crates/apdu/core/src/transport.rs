//! Transport trait for APDU communication with cards
//!
//! A transport moves raw APDU bytes to a card and back. It knows nothing
//! about command structure, secure messaging or card content.

use std::fmt;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::{ApduCommand, Command, Response, Result};

/// Trait for basic card transports
///
/// Implementors provide [`do_transmit_raw`](CardTransport::do_transmit_raw);
/// the provided methods add logging and command/response framing on top.
pub trait CardTransport: Send + fmt::Debug {
    /// Send raw APDU bytes to card and return response bytes
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes> {
        trace!(command = %hex::encode(command), "Transmitting raw command");
        let result = self.do_transmit_raw(command);
        match &result {
            Ok(response) => {
                trace!(response = %hex::encode(response), "Received raw response");
            }
            Err(e) => {
                debug!(error = ?e, "Transport error during transmission");
            }
        }
        result
    }

    /// Encode a command, transmit it and parse the card's answer
    fn transmit_command(&mut self, command: &Command) -> Result<Response> {
        command.validate()?;
        let raw = self.transmit_raw(&command.to_bytes())?;
        Response::from_bytes(&raw)
    }

    /// Implementation hook for [`transmit_raw`](CardTransport::transmit_raw)
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes>;

    /// Check if the transport is connected to a physical card
    fn is_connected(&self) -> bool {
        true
    }

    /// Reset the transport connection
    fn reset(&mut self) -> Result<()>;
}

impl<T: CardTransport + ?Sized> CardTransport for &mut T {
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes> {
        (**self).transmit_raw(command)
    }

    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes> {
        (**self).do_transmit_raw(command)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn reset(&mut self) -> Result<()> {
        (**self).reset()
    }
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    //! Scripted transport for tests

    use std::collections::VecDeque;

    use bytes::Bytes;

    use super::CardTransport;
    use crate::{Error, Result};

    /// Transport that replays a fixed script of card responses
    ///
    /// Every transmitted command is recorded. Once the script runs out,
    /// further transmissions fail with [`Error::Transmission`].
    #[derive(Debug, Clone, Default)]
    pub struct ScriptedTransport {
        responses: VecDeque<Bytes>,
        sent: Vec<Bytes>,
        resets: usize,
    }

    impl ScriptedTransport {
        /// Create a transport that answers with `responses` in order
        pub fn new<I, B>(responses: I) -> Self
        where
            I: IntoIterator<Item = B>,
            B: Into<Bytes>,
        {
            Self {
                responses: responses.into_iter().map(Into::into).collect(),
                sent: Vec::new(),
                resets: 0,
            }
        }

        /// Queue one more response
        pub fn push_response(&mut self, response: impl Into<Bytes>) {
            self.responses.push_back(response.into());
        }

        /// Commands transmitted so far, in order
        pub fn sent(&self) -> &[Bytes] {
            &self.sent
        }

        /// Number of responses not yet consumed
        pub fn remaining(&self) -> usize {
            self.responses.len()
        }

        /// Number of times the transport was reset
        pub const fn resets(&self) -> usize {
            self.resets
        }
    }

    impl CardTransport for ScriptedTransport {
        fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes> {
            self.sent.push(Bytes::copy_from_slice(command));
            self.responses.pop_front().ok_or(Error::Transmission)
        }

        fn reset(&mut self) -> Result<()> {
            self.resets += 1;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::mock::ScriptedTransport;
    use super::*;
    use crate::Error;

    #[test]
    fn test_scripted_transport_replays_in_order() {
        let mut transport = ScriptedTransport::new([
            Bytes::from_static(&hex!("0102 9000")),
            Bytes::from_static(&hex!("6A82")),
        ]);

        let select = Command::new_with_data(0x00, 0xA4, 0x04, 0x00, hex!("A000000151").to_vec());
        let first = transport.transmit_command(&select).unwrap();
        assert!(first.is_success());
        assert_eq!(first.payload().as_ref(), &hex!("0102"));

        let second = transport.transmit_raw(&hex!("00A40400")).unwrap();
        assert_eq!(second.as_ref(), &hex!("6A82"));

        assert_eq!(transport.sent()[0].as_ref(), &hex!("00A4040005A000000151"));
        assert_eq!(transport.remaining(), 0);
        assert_eq!(transport.transmit_raw(&hex!("00C00000")), Err(Error::Transmission));
    }

    #[test]
    fn test_transmit_command_rejects_oversized_data() {
        let mut transport = ScriptedTransport::new([Bytes::from_static(&hex!("9000"))]);
        let cmd = Command::new_with_data(0x80, 0xE8, 0x00, 0x00, vec![0u8; 256]);

        assert_eq!(
            transport.transmit_command(&cmd),
            Err(Error::InvalidCommandLength(256))
        );
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_reset_through_mut_ref() {
        fn reset_owned<T: CardTransport>(mut transport: T) {
            transport.reset().unwrap();
        }

        let mut transport = ScriptedTransport::default();
        reset_owned(&mut transport);
        assert_eq!(transport.resets(), 1);
    }
}
