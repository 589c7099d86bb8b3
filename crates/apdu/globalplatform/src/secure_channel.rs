//! Secure channel over a card transport
//!
//! [`GPSecureChannel`] runs the INITIALIZE UPDATE / EXTERNAL AUTHENTICATE
//! handshake and then wraps every command with the negotiated [`Session`].

use std::fmt;

use derive_more::Display;
use gpcard_apdu_core::{CardTransport, Command, Response, ResultExt};
use rand::RngCore;
use tracing::{debug, instrument, warn};

use crate::{
    Error, Result,
    commands::{InitializeUpdateCommand, InitializeUpdateResponse},
    constants::HOST_CHALLENGE_LENGTH,
    crypto::Block8,
    keys::{Diversification, KeySet},
    session::{ScpVersion, SecurityLevel, Session},
};

/// Lifecycle of a secure channel; transitions only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ChannelState {
    /// Nothing sent yet
    #[display("idle")]
    Idle,
    /// INITIALIZE UPDATE sent, EXTERNAL AUTHENTICATE pending
    #[display("awaiting authentication")]
    AwaitingAuthentication,
    /// Mutual authentication succeeded
    #[display("established")]
    Established,
    /// Closed or failed; a new channel is needed
    #[display("closed")]
    Closed,
}

/// Settings for opening a secure channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecureChannelConfig {
    /// Security level requested in EXTERNAL AUTHENTICATE
    pub security_level: SecurityLevel,

    /// Diversification to apply to the static keys
    pub diversification: Diversification,

    /// Expected protocol; `None` accepts what the card announces
    pub scp_version: Option<ScpVersion>,

    /// SCP01/02 `i` parameter; `None` uses the protocol default
    pub parameters: Option<u8>,

    /// Reject a card key version that differs from a nonzero key set version
    pub strict_key_version: bool,
}

impl Default for SecureChannelConfig {
    fn default() -> Self {
        Self {
            security_level: SecurityLevel::MAC,
            diversification: Diversification::None,
            scp_version: None,
            parameters: None,
            strict_key_version: true,
        }
    }
}

impl SecureChannelConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the requested security level
    pub const fn with_security_level(mut self, level: SecurityLevel) -> Self {
        self.security_level = level;
        self
    }

    /// Set the key diversification
    pub const fn with_diversification(mut self, diversification: Diversification) -> Self {
        self.diversification = diversification;
        self
    }

    /// Set the expected protocol version
    pub const fn with_scp_version(mut self, version: Option<ScpVersion>) -> Self {
        self.scp_version = version;
        self
    }

    /// Set the SCP01/02 `i` parameter
    pub const fn with_parameters(mut self, parameters: Option<u8>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set whether key version mismatches are fatal
    pub const fn with_strict_key_version(mut self, strict: bool) -> Self {
        self.strict_key_version = strict;
        self
    }
}

/// GlobalPlatform secure channel bound to one card connection
pub struct GPSecureChannel<T: CardTransport> {
    transport: T,
    keys: KeySet,
    config: SecureChannelConfig,
    state: ChannelState,
    session: Option<Session>,
}

impl<T: CardTransport> fmt::Debug for GPSecureChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GPSecureChannel")
            .field("transport", &self.transport)
            .field("keys", &self.keys.name())
            .field("state", &self.state)
            .field("session", &self.session)
            .finish()
    }
}

impl<T: CardTransport> GPSecureChannel<T> {
    /// Create an idle channel
    pub const fn new(transport: T, keys: KeySet, config: SecureChannelConfig) -> Self {
        Self {
            transport,
            keys,
            config,
            state: ChannelState::Idle,
            session: None,
        }
    }

    /// Current state
    pub const fn state(&self) -> ChannelState {
        self.state
    }

    /// Whether commands can be sent
    pub fn is_established(&self) -> bool {
        self.state == ChannelState::Established
    }

    /// Negotiated session, while established
    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Static keys the channel authenticates with
    pub const fn keys(&self) -> &KeySet {
        &self.keys
    }

    /// Channel settings
    pub const fn config(&self) -> &SecureChannelConfig {
        &self.config
    }

    /// Underlying transport, for commands sent outside the channel
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the channel and return the transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Run the handshake with a random host challenge
    pub fn open(&mut self) -> Result<()> {
        let mut host_challenge = [0u8; HOST_CHALLENGE_LENGTH];
        rand::rng().fill_bytes(&mut host_challenge);
        self.open_with_challenge(host_challenge)
    }

    /// Run the handshake with the given host challenge
    ///
    /// Any failure closes the channel; it is never retried.
    #[instrument(level = "debug", skip(self, host_challenge), fields(keys = self.keys.name()))]
    pub fn open_with_challenge(&mut self, host_challenge: Block8) -> Result<()> {
        if self.state != ChannelState::Idle {
            return Err(Error::security(format!(
                "cannot open a secure channel that is {}",
                self.state
            )));
        }

        match self.handshake(&host_challenge) {
            Ok(session) => {
                debug!(
                    version = %session.version(),
                    level = %session.security_level(),
                    "Secure channel established"
                );
                self.session = Some(session);
                self.state = ChannelState::Established;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Secure channel handshake failed");
                self.state = ChannelState::Closed;
                Err(e)
            }
        }
    }

    fn handshake(&mut self, host_challenge: &Block8) -> Result<Session> {
        let requested_version = self.keys.version();
        let command =
            InitializeUpdateCommand::with_challenge(requested_version, host_challenge).into_command();
        self.state = ChannelState::AwaitingAuthentication;

        let response = self
            .transport
            .transmit_command(&command)
            .context("INITIALIZE UPDATE")?;
        if !response.is_success() {
            warn!(status = %response.status(), "INITIALIZE UPDATE rejected");
            return Err(Error::card_status(response.status()));
        }

        let init = InitializeUpdateResponse::parse(response.payload())?;
        debug!(
            version = %init.scp_version,
            key_version = init.key_version,
            "INITIALIZE UPDATE response parsed"
        );

        if let Some(expected) = self.config.scp_version {
            if expected != init.scp_version {
                return Err(Error::configuration(format!(
                    "expected {expected}, card offers {}",
                    init.scp_version
                )));
            }
        }

        if requested_version != 0 && requested_version != init.key_version {
            if self.config.strict_key_version {
                return Err(Error::configuration(format!(
                    "card key version {:#04x} does not match key set version {requested_version:#04x}",
                    init.key_version
                )));
            }
            warn!(
                card = init.key_version,
                requested = requested_version,
                "Key version mismatch"
            );
        }

        let keys = self
            .keys
            .diversify(self.config.diversification, &init.diversification_data)?;
        let mut session = Session::new(&keys, &init, host_challenge, self.config.parameters)?;

        let command = session.external_authenticate(self.config.security_level)?;
        let response = self
            .transport
            .transmit_command(&command)
            .context("EXTERNAL AUTHENTICATE")?;
        if !response.is_success() {
            warn!(status = %response.status(), "EXTERNAL AUTHENTICATE rejected");
            return Err(Error::security(format!(
                "EXTERNAL AUTHENTICATE failed with status {}",
                response.status()
            )));
        }

        Ok(session)
    }

    /// Wrap, send and unwrap a command
    ///
    /// Any failure once wrapping has started closes the channel, since the
    /// chaining state no longer matches the card's. Error status words are
    /// returned as responses and keep the channel open.
    pub fn transmit(&mut self, command: &Command) -> Result<Response> {
        let session = match (self.state, self.session.as_mut()) {
            (ChannelState::Established, Some(session)) => session,
            _ => return Err(gpcard_apdu_core::Error::SecureChannelNotEstablished.into()),
        };

        let result = session.wrap(command).and_then(|wrapped| {
            let response = self.transport.transmit_command(&wrapped)?;
            session.unwrap(response)
        });
        if let Err(e) = &result {
            warn!(error = %e, "Secure channel command failed, closing channel");
            self.close();
        }
        result
    }

    /// Close the channel and drop the session keys
    pub fn close(&mut self) {
        if self.state != ChannelState::Closed {
            debug!(state = %self.state, "Closing secure channel");
        }
        self.session = None;
        self.state = ChannelState::Closed;
    }

    /// Reset the card connection and start over with an idle channel
    pub fn reset(&mut self) -> Result<()> {
        self.close();
        self.transport.reset()?;
        debug!("Transport reset, secure channel idle");
        self.state = ChannelState::Idle;
        Ok(())
    }
}
