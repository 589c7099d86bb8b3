//! INITIALIZE UPDATE command for GlobalPlatform
//!
//! This command starts a secure channel session. The card answers with its
//! diversification data, key information, challenge and cryptogram.

use std::fmt;

use gpcard_apdu_core::Command;

use crate::{
    Error, Result,
    constants::{HOST_CHALLENGE_LENGTH, cla, ins},
    crypto::Block8,
    keys::DIVERSIFICATION_DATA_LENGTH,
    session::ScpVersion,
};

/// Response length for SCP01 and SCP02
pub const SCP01_02_RESPONSE_LENGTH: usize = 28;

/// Response length for SCP03 (with the sequence counter)
pub const SCP03_RESPONSE_LENGTH: usize = 32;

gp_command! {
    /// INITIALIZE UPDATE command for GlobalPlatform
    InitializeUpdateCommand
}

impl InitializeUpdateCommand {
    /// Create the command for a key version (0 = any) and host challenge
    pub fn with_challenge(key_version: u8, host_challenge: &[u8; HOST_CHALLENGE_LENGTH]) -> Self {
        Self(
            Command::new_with_data(
                cla::GP,
                ins::INITIALIZE_UPDATE,
                key_version,
                0x00,
                host_challenge.to_vec(),
            )
            .with_le(0),
        )
    }
}

/// Parsed INITIALIZE UPDATE response data
#[derive(Clone, PartialEq, Eq)]
pub struct InitializeUpdateResponse {
    /// Key diversification data
    pub diversification_data: [u8; DIVERSIFICATION_DATA_LENGTH],
    /// Key version the card selected
    pub key_version: u8,
    /// Protocol announced by the card
    pub scp_version: ScpVersion,
    /// SCP03 `i` parameter
    pub scp03_parameters: Option<u8>,
    /// Card challenge (for SCP02 the first two bytes are the sequence counter)
    pub card_challenge: Block8,
    /// Card cryptogram
    pub card_cryptogram: Block8,
    /// SCP03 sequence counter
    pub scp03_sequence: Option<[u8; 3]>,
}

impl InitializeUpdateResponse {
    /// Parse the response data (without status word)
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != SCP01_02_RESPONSE_LENGTH && data.len() != SCP03_RESPONSE_LENGTH {
            return Err(Error::protocol(format!(
                "INITIALIZE UPDATE response of {} bytes",
                data.len()
            )));
        }

        let id = data[11];
        let scp_version = ScpVersion::from_id(id)
            .ok_or_else(|| Error::unsupported(format!("secure channel protocol {id:#04x}")))?;
        if data.len() != response_length(scp_version) {
            return Err(Error::protocol(format!(
                "{scp_version} announced in a {} byte response",
                data.len()
            )));
        }

        let mut diversification_data = [0u8; DIVERSIFICATION_DATA_LENGTH];
        diversification_data.copy_from_slice(&data[..DIVERSIFICATION_DATA_LENGTH]);

        let mut card_challenge = Block8::default();
        let mut card_cryptogram = Block8::default();
        let (scp03_parameters, scp03_sequence) = match scp_version {
            ScpVersion::Scp03 => {
                card_challenge.copy_from_slice(&data[13..21]);
                card_cryptogram.copy_from_slice(&data[21..29]);
                let mut sequence = [0u8; 3];
                sequence.copy_from_slice(&data[29..32]);
                (Some(data[12]), Some(sequence))
            }
            ScpVersion::Scp01 | ScpVersion::Scp02 => {
                card_challenge.copy_from_slice(&data[12..20]);
                card_cryptogram.copy_from_slice(&data[20..28]);
                (None, None)
            }
        };

        Ok(Self {
            diversification_data,
            key_version: data[10],
            scp_version,
            scp03_parameters,
            card_challenge,
            card_cryptogram,
            scp03_sequence,
        })
    }

    /// SCP02 sequence counter (first two bytes of the card challenge)
    pub fn sequence_counter(&self) -> [u8; 2] {
        [self.card_challenge[0], self.card_challenge[1]]
    }
}

const fn response_length(version: ScpVersion) -> usize {
    match version {
        ScpVersion::Scp01 | ScpVersion::Scp02 => SCP01_02_RESPONSE_LENGTH,
        ScpVersion::Scp03 => SCP03_RESPONSE_LENGTH,
    }
}

impl fmt::Debug for InitializeUpdateResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitializeUpdateResponse")
            .field("diversification_data", &hex::encode(self.diversification_data))
            .field("key_version", &format_args!("{:#04x}", self.key_version))
            .field("scp_version", &self.scp_version)
            .field("scp03_parameters", &self.scp03_parameters)
            .field("card_challenge", &hex::encode(self.card_challenge))
            .field("scp03_sequence", &self.scp03_sequence.map(hex::encode))
            .finish_non_exhaustive()
    }
}
