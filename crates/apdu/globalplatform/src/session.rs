//! Session state for the GlobalPlatform secure channel protocols
//!
//! A [`Session`] is created from the card's INITIALIZE UPDATE response. It
//! derives the session keys, checks the card cryptogram and then carries the
//! MAC chaining state used to wrap commands and unwrap responses for SCP01,
//! SCP02 and SCP03.

use std::fmt;

use bytes::{BufMut, BytesMut};
use derive_more::Display;
use gpcard_apdu_core::{ApduCommand, Command, Response, command::MAX_SHORT_DATA};
use tracing::{debug, trace, warn};

use crate::{
    Error, Result,
    commands::{ExternalAuthenticateCommand, InitializeUpdateResponse},
    constants::{cla, external_auth_p1, scp, scp03_derivation},
    crypto::{self, AES_BLOCK_SIZE, Block8, Block16, DES_BLOCK_SIZE},
    keys::{Key, KeySet, KeyUsage},
};

/// Secure Channel Protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ScpVersion {
    /// SCP01: static 3DES keys, full 3DES MAC
    #[display("SCP01")]
    Scp01,
    /// SCP02: 3DES session keys, retail MAC
    #[display("SCP02")]
    Scp02,
    /// SCP03: AES session keys, CMAC
    #[display("SCP03")]
    Scp03,
}

impl ScpVersion {
    /// Protocol for an identifier byte
    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            scp::SCP01 => Some(Self::Scp01),
            scp::SCP02 => Some(Self::Scp02),
            scp::SCP03 => Some(Self::Scp03),
            _ => None,
        }
    }

    /// Identifier byte
    pub const fn id(self) -> u8 {
        match self {
            Self::Scp01 => scp::SCP01,
            Self::Scp02 => scp::SCP02,
            Self::Scp03 => scp::SCP03,
        }
    }

    /// Default `i` parameter when the card does not report one
    pub const fn default_parameters(self) -> u8 {
        match self {
            Self::Scp01 => scp::DEFAULT_SCP01_PARAMETERS,
            Self::Scp02 => scp::DEFAULT_SCP02_PARAMETERS,
            Self::Scp03 => 0x00,
        }
    }
}

/// Protection applied to commands and responses once the channel is established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SecurityLevel {
    /// Command MAC
    pub c_mac: bool,
    /// Command data encryption
    pub c_enc: bool,
    /// Response MAC
    pub r_mac: bool,
    /// Response data encryption
    pub r_enc: bool,
}

impl SecurityLevel {
    /// No secure messaging after authentication
    pub const NONE: Self = Self::from_p1(0x00);
    /// Command MAC only
    pub const MAC: Self = Self::from_p1(external_auth_p1::C_MAC);
    /// Command MAC and command encryption
    pub const MAC_ENC: Self = Self::from_p1(external_auth_p1::C_MAC | external_auth_p1::C_ENC);
    /// Command MAC and response MAC
    pub const MAC_RMAC: Self = Self::from_p1(external_auth_p1::C_MAC | external_auth_p1::R_MAC);
    /// Every protection
    pub const FULL: Self = Self::from_p1(
        external_auth_p1::C_MAC
            | external_auth_p1::C_ENC
            | external_auth_p1::R_MAC
            | external_auth_p1::R_ENC,
    );

    /// Decode EXTERNAL AUTHENTICATE P1
    pub const fn from_p1(p1: u8) -> Self {
        Self {
            c_mac: p1 & external_auth_p1::C_MAC != 0,
            c_enc: p1 & external_auth_p1::C_ENC != 0,
            r_mac: p1 & external_auth_p1::R_MAC != 0,
            r_enc: p1 & external_auth_p1::R_ENC != 0,
        }
    }

    /// Encode as EXTERNAL AUTHENTICATE P1
    pub const fn to_p1(self) -> u8 {
        let mut p1 = 0;
        if self.c_mac {
            p1 |= external_auth_p1::C_MAC;
        }
        if self.c_enc {
            p1 |= external_auth_p1::C_ENC;
        }
        if self.r_mac {
            p1 |= external_auth_p1::R_MAC;
        }
        if self.r_enc {
            p1 |= external_auth_p1::R_ENC;
        }
        p1
    }
}

impl Default for SecurityLevel {
    fn default() -> Self {
        Self::MAC
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (self.c_mac, "C-MAC"),
            (self.c_enc, "C-ENC"),
            (self.r_mac, "R-MAC"),
            (self.r_enc, "R-ENC"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect();

        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join("+"))
        }
    }
}

/// MAC chaining state
#[derive(Clone, PartialEq, Eq)]
enum Chaining {
    /// SCP01/02: last C-MAC (none before the first command) and last R-MAC
    Des { icv: Option<Block8>, ricv: Block8 },
    /// SCP03: full CMAC of the last command and the encryption counter
    Aes { chaining: Block16, counter: u32 },
}

/// Session state of one secure channel
#[derive(Clone)]
pub struct Session {
    version: ScpVersion,
    parameters: u8,
    security_level: SecurityLevel,
    keys: KeySet,
    key_version: u8,
    host_challenge: Block8,
    card_challenge: Block8,
    chaining: Chaining,
    authenticated: bool,
    last_command: Option<Command>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("version", &self.version)
            .field("parameters", &format_args!("{:#04x}", self.parameters))
            .field("security_level", &self.security_level)
            .field("keys", &self.keys.name())
            .field("key_version", &self.key_version)
            .field("authenticated", &self.authenticated)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session from the card's INITIALIZE UPDATE response
    ///
    /// `static_keys` must already be diversified when the card requires it.
    /// `parameters` is the SCP01/02 `i` parameter, which cards do not report;
    /// `None` selects the protocol default. Fails with [`Error::Security`] if
    /// the card cryptogram does not verify.
    pub fn new(
        static_keys: &KeySet,
        response: &InitializeUpdateResponse,
        host_challenge: &Block8,
        parameters: Option<u8>,
    ) -> Result<Self> {
        let version = response.scp_version;
        let parameters = match version {
            ScpVersion::Scp03 => response.scp03_parameters.unwrap_or_default(),
            ScpVersion::Scp01 | ScpVersion::Scp02 => {
                parameters.unwrap_or(version.default_parameters())
            }
        };
        if version == ScpVersion::Scp03 && parameters & scp::SCP03_S16 != 0 {
            return Err(Error::unsupported("SCP03 S16 mode"));
        }

        let keys = match version {
            ScpVersion::Scp01 => static_keys.clone(),
            ScpVersion::Scp02 => static_keys.derive_scp02_session(&response.sequence_counter())?,
            ScpVersion::Scp03 => {
                static_keys.derive_scp03_session(&context(host_challenge, &response.card_challenge))?
            }
        };
        debug!(%version, parameters = format_args!("{parameters:#04x}"), keys = keys.name(), "Derived session keys");

        let session = Self::with_session_keys(
            version,
            parameters,
            keys,
            response.key_version,
            *host_challenge,
            response.card_challenge,
        );

        let expected = session.card_cryptogram()?;
        if !crypto::constant_time_eq(&expected, &response.card_cryptogram) {
            warn!(%version, "Card cryptogram mismatch");
            return Err(Error::security("card cryptogram does not verify"));
        }

        Ok(session)
    }

    fn with_session_keys(
        version: ScpVersion,
        parameters: u8,
        keys: KeySet,
        key_version: u8,
        host_challenge: Block8,
        card_challenge: Block8,
    ) -> Self {
        let chaining = match version {
            ScpVersion::Scp01 | ScpVersion::Scp02 => Chaining::Des {
                icv: None,
                ricv: Block8::default(),
            },
            ScpVersion::Scp03 => Chaining::Aes {
                chaining: Block16::default(),
                counter: 0,
            },
        };

        Self {
            version,
            parameters,
            security_level: SecurityLevel::MAC,
            keys,
            key_version,
            host_challenge,
            card_challenge,
            chaining,
            authenticated: false,
            last_command: None,
        }
    }

    /// Protocol version
    pub const fn version(&self) -> ScpVersion {
        self.version
    }

    /// `i` parameter in use
    pub const fn parameters(&self) -> u8 {
        self.parameters
    }

    /// Security level applied to wrapped commands
    pub const fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    /// Largest command data that still fits a short APDU once wrapped
    ///
    /// C-MAC adds 8 bytes; C-ENC pads to the next full block and always adds
    /// at least one byte.
    pub const fn max_data_length(&self) -> usize {
        let level = self.security_level;
        if !level.c_mac {
            MAX_SHORT_DATA
        } else if level.c_enc {
            MAX_SHORT_DATA - 2 * DES_BLOCK_SIZE
        } else {
            MAX_SHORT_DATA - DES_BLOCK_SIZE
        }
    }

    /// Session keys
    pub const fn keys(&self) -> &KeySet {
        &self.keys
    }

    /// Key version reported by the card
    pub const fn key_version(&self) -> u8 {
        self.key_version
    }

    /// Host challenge sent in INITIALIZE UPDATE
    pub const fn host_challenge(&self) -> &Block8 {
        &self.host_challenge
    }

    /// Card challenge received in INITIALIZE UPDATE
    pub const fn card_challenge(&self) -> &Block8 {
        &self.card_challenge
    }

    /// Whether EXTERNAL AUTHENTICATE has been prepared
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Session key for a usage
    pub fn key(&self, usage: KeyUsage) -> Result<&Key> {
        self.keys.get_key_by_type(usage).ok_or_else(|| {
            Error::configuration(format!("session key set has no {usage} key"))
        })
    }

    fn secret(&self, usage: KeyUsage) -> Result<&[u8]> {
        self.key(usage).map(Key::secret)
    }

    /// Cryptogram the card must have sent
    pub fn card_cryptogram(&self) -> Result<Block8> {
        match self.version {
            ScpVersion::Scp01 | ScpVersion::Scp02 => crypto::calculate_cryptogram(
                self.secret(KeyUsage::Enc)?,
                &self.host_challenge,
                &self.card_challenge,
            ),
            ScpVersion::Scp03 => self.scp03_cryptogram(scp03_derivation::CARD_CRYPTOGRAM),
        }
    }

    /// Cryptogram sent in EXTERNAL AUTHENTICATE
    pub fn host_cryptogram(&self) -> Result<Block8> {
        match self.version {
            ScpVersion::Scp01 | ScpVersion::Scp02 => crypto::calculate_cryptogram(
                self.secret(KeyUsage::Enc)?,
                &self.card_challenge,
                &self.host_challenge,
            ),
            ScpVersion::Scp03 => self.scp03_cryptogram(scp03_derivation::HOST_CRYPTOGRAM),
        }
    }

    fn scp03_cryptogram(&self, constant: u8) -> Result<Block8> {
        let ctx = context(&self.host_challenge, &self.card_challenge);
        let derived = crypto::scp03_kdf(self.secret(KeyUsage::Mac)?, constant, &ctx, 64)?;
        Block8::try_from(derived.as_slice()).map_err(|_| Error::Crypto("short SCP03 cryptogram"))
    }

    /// Check that a security level can be requested on this session
    pub fn check_security_level(&self, level: SecurityLevel) -> Result<()> {
        if level.c_enc && !level.c_mac {
            return Err(Error::configuration("C-ENC requires C-MAC"));
        }
        if level.r_enc && !(level.r_mac && level.c_enc) {
            return Err(Error::configuration("R-ENC requires R-MAC and C-ENC"));
        }

        match self.version {
            ScpVersion::Scp01 if level.r_mac || level.r_enc => Err(Error::configuration(
                "SCP01 does not support response protection",
            )),
            ScpVersion::Scp02 if level.r_enc => {
                Err(Error::configuration("SCP02 does not support R-ENC"))
            }
            ScpVersion::Scp03 if level.r_mac && self.parameters & scp::SCP03_R_MAC == 0 => {
                Err(Error::configuration(format!(
                    "card SCP03 parameters {:#04x} do not support R-MAC",
                    self.parameters
                )))
            }
            ScpVersion::Scp03 if level.r_enc && self.parameters & scp::SCP03_R_ENC == 0 => {
                Err(Error::configuration(format!(
                    "card SCP03 parameters {:#04x} do not support R-ENC",
                    self.parameters
                )))
            }
            _ => Ok(()),
        }
    }

    /// Build the wrapped EXTERNAL AUTHENTICATE command
    ///
    /// The command itself carries a C-MAC only; `level` applies to every
    /// command wrapped afterwards.
    pub fn external_authenticate(&mut self, level: SecurityLevel) -> Result<Command> {
        if self.authenticated {
            return Err(Error::security("session is already authenticated"));
        }
        self.check_security_level(level)?;

        let cryptogram = self.host_cryptogram()?;
        let command =
            ExternalAuthenticateCommand::with_host_cryptogram(level.to_p1(), &cryptogram)
                .into_command();
        let wrapped = self.wrap_with(&command, SecurityLevel::MAC)?;

        // Response MACs chain from the EXTERNAL AUTHENTICATE C-MAC
        if let Chaining::Des { icv: Some(mac), ricv } = &mut self.chaining {
            *ricv = *mac;
        }
        self.security_level = level;
        self.authenticated = true;

        Ok(wrapped)
    }

    /// Wrap a command at the session security level
    pub fn wrap(&mut self, command: &Command) -> Result<Command> {
        if !self.authenticated {
            return Err(gpcard_apdu_core::Error::SecureChannelNotEstablished.into());
        }

        if let Chaining::Aes { counter, .. } = &mut self.chaining {
            *counter = counter.wrapping_add(1);
        }
        self.last_command = self.security_level.r_mac.then(|| command.clone());

        let level = self.security_level;
        let wrapped = self.wrap_with(command, level)?;
        trace!(
            plain = %hex::encode(command.to_bytes()),
            wrapped = %hex::encode(wrapped.to_bytes()),
            "Wrapped command"
        );
        Ok(wrapped)
    }

    fn wrap_with(&mut self, command: &Command, level: SecurityLevel) -> Result<Command> {
        if !level.c_mac {
            return Ok(command.clone());
        }

        let data = command.data().unwrap_or_default();
        let cla = command.class() | cla::SECURE_MESSAGING;
        let wrapped_data = match self.version {
            ScpVersion::Scp01 | ScpVersion::Scp02 => self.wrap_des(command, cla, data, level.c_enc)?,
            ScpVersion::Scp03 => self.wrap_aes(command, cla, data, level.c_enc)?,
        };

        let mut wrapped = Command::new(cla, command.instruction(), command.p1(), command.p2())
            .with_data(wrapped_data);
        if let Some(le) = command.expected_length() {
            wrapped = wrapped.with_le(le);
        }
        Ok(wrapped)
    }

    fn wrap_des(&mut self, command: &Command, cla: u8, data: &[u8], encrypt: bool) -> Result<Vec<u8>> {
        let lc = checked_lc(data.len() + DES_BLOCK_SIZE)?;
        let mut mac_input = BytesMut::with_capacity(5 + data.len());
        mac_input.put_u8(cla);
        mac_input.put_u8(command.instruction());
        mac_input.put_u8(command.p1());
        mac_input.put_u8(command.p2());
        mac_input.put_u8(lc);
        mac_input.put_slice(data);

        let Chaining::Des { icv: previous, .. } = self.chaining else {
            return Err(Error::Crypto("DES chaining on an AES session"));
        };
        let mac_key = self.secret(KeyUsage::Mac)?;
        let icv = match previous {
            None => Block8::default(),
            Some(previous) if self.parameters & scp::ICV_ENCRYPTION != 0 => match self.version {
                ScpVersion::Scp01 => crypto::encrypt_icv_3des(mac_key, &previous)?,
                _ => crypto::encrypt_icv_des(mac_key, &previous)?,
            },
            Some(previous) => previous,
        };
        let mac = match self.version {
            ScpVersion::Scp01 => crypto::mac_3des(mac_key, &icv, &mac_input)?,
            _ => crypto::mac_retail(mac_key, &icv, &mac_input)?,
        };

        let mut body = if encrypt && !data.is_empty() {
            let enc_key = self.secret(KeyUsage::Enc)?;
            let plain = match self.version {
                ScpVersion::Scp01 => {
                    let mut plain = Vec::with_capacity(data.len() + 1);
                    plain.push(data.len() as u8);
                    plain.extend_from_slice(data);
                    if plain.len() % DES_BLOCK_SIZE != 0 {
                        plain = crypto::pad80(&plain, DES_BLOCK_SIZE);
                    }
                    plain
                }
                _ => crypto::pad80(data, DES_BLOCK_SIZE),
            };
            crypto::des3_cbc_encrypt(enc_key, &Block8::default(), &plain)?
        } else {
            data.to_vec()
        };
        body.extend_from_slice(&mac);
        checked_lc(body.len())?;

        if let Chaining::Des { icv, .. } = &mut self.chaining {
            *icv = Some(mac);
        }
        Ok(body)
    }

    fn wrap_aes(&mut self, command: &Command, cla: u8, data: &[u8], encrypt: bool) -> Result<Vec<u8>> {
        let Chaining::Aes { chaining, counter } = self.chaining else {
            return Err(Error::Crypto("AES chaining on a DES session"));
        };

        let mut body = if encrypt && !data.is_empty() {
            let enc_key = self.secret(KeyUsage::Enc)?;
            let mut counter_block = Block16::default();
            counter_block[12..].copy_from_slice(&counter.to_be_bytes());
            let icv = crypto::aes_encrypt_block(enc_key, &counter_block)?;
            crypto::aes_cbc_encrypt(enc_key, &icv, &crypto::pad80(data, AES_BLOCK_SIZE))?
        } else {
            data.to_vec()
        };
        let lc = checked_lc(body.len() + DES_BLOCK_SIZE)?;

        let mut mac_input = BytesMut::with_capacity(AES_BLOCK_SIZE + 5 + body.len());
        mac_input.put_slice(&chaining);
        mac_input.put_u8(cla);
        mac_input.put_u8(command.instruction());
        mac_input.put_u8(command.p1());
        mac_input.put_u8(command.p2());
        mac_input.put_u8(lc);
        mac_input.put_slice(&body);
        let mac = crypto::aes_cmac(self.secret(KeyUsage::Mac)?, &mac_input)?;

        body.extend_from_slice(&mac[..DES_BLOCK_SIZE]);
        self.chaining = Chaining::Aes {
            chaining: mac,
            counter,
        };
        Ok(body)
    }

    /// Verify and strip response protection
    ///
    /// Error responses too short to carry a MAC are returned untouched; a
    /// success response without a valid R-MAC fails with [`Error::Security`].
    pub fn unwrap(&mut self, response: Response) -> Result<Response> {
        let command = self.last_command.take();
        if !self.security_level.r_mac {
            return Ok(response);
        }

        let status = response.status();
        let payload = response.payload();
        if payload.len() < DES_BLOCK_SIZE {
            if !status.is_success() && !status.is_warning() {
                trace!(%status, "Error response without R-MAC");
                return Ok(response);
            }
            warn!(%status, "Response is missing its R-MAC");
            return Err(Error::security(format!("response {status} carries no R-MAC")));
        }
        let (body, mac) = payload.split_at(payload.len() - DES_BLOCK_SIZE);

        let expected = match self.version {
            ScpVersion::Scp01 => {
                return Err(Error::configuration("SCP01 does not support response protection"));
            }
            ScpVersion::Scp02 => {
                let command = command.ok_or_else(|| Error::security("R-MAC without a command"))?;
                self.scp02_rmac(&command, body, &response)?
            }
            ScpVersion::Scp03 => self.scp03_rmac(body, &response)?,
        };

        if !crypto::constant_time_eq(&expected, mac) {
            warn!(%status, "R-MAC mismatch");
            return Err(Error::security("response MAC does not verify"));
        }

        let plain = match &mut self.chaining {
            Chaining::Des { ricv, .. } => {
                *ricv = expected;
                body.to_vec()
            }
            Chaining::Aes { counter, .. } => {
                let counter = *counter;
                if self.security_level.r_enc && !body.is_empty() {
                    self.decrypt_response(body, counter)?
                } else {
                    body.to_vec()
                }
            }
        };

        Ok(Response::new(plain, status))
    }

    fn scp02_rmac(&self, command: &Command, body: &[u8], response: &Response) -> Result<Block8> {
        let Chaining::Des { ricv, .. } = self.chaining else {
            return Err(Error::Crypto("DES chaining on an AES session"));
        };
        let data = command.data().unwrap_or_default();
        let status = response.status();

        let mut input = BytesMut::with_capacity(7 + data.len() + body.len() + 2);
        input.put_u8(command.class() & !0x07);
        input.put_u8(command.instruction());
        input.put_u8(command.p1());
        input.put_u8(command.p2());
        input.put_u8(data.len() as u8);
        input.put_slice(data);
        input.put_u8(body.len() as u8);
        input.put_slice(body);
        input.put_u8(status.sw1);
        input.put_u8(status.sw2);

        crypto::mac_retail(self.secret(KeyUsage::Rmac)?, &ricv, &input)
    }

    fn scp03_rmac(&self, body: &[u8], response: &Response) -> Result<Block8> {
        let Chaining::Aes { chaining, .. } = self.chaining else {
            return Err(Error::Crypto("AES chaining on a DES session"));
        };
        let status = response.status();

        let mut input = BytesMut::with_capacity(AES_BLOCK_SIZE + body.len() + 2);
        input.put_slice(&chaining);
        input.put_slice(body);
        input.put_u8(status.sw1);
        input.put_u8(status.sw2);

        let mac = crypto::aes_cmac(self.secret(KeyUsage::Rmac)?, &input)?;
        let mut truncated = Block8::default();
        truncated.copy_from_slice(&mac[..DES_BLOCK_SIZE]);
        Ok(truncated)
    }

    fn decrypt_response(&self, body: &[u8], counter: u32) -> Result<Vec<u8>> {
        let enc_key = self.secret(KeyUsage::Enc)?;
        let mut counter_block = Block16::default();
        counter_block[0] = 0x80;
        counter_block[12..].copy_from_slice(&counter.to_be_bytes());
        let icv = crypto::aes_encrypt_block(enc_key, &counter_block)?;

        let decrypted = crypto::aes_cbc_decrypt(enc_key, &icv, body)
            .map_err(|_| Error::protocol("encrypted response is not block aligned"))?;
        let plain = crypto::unpad80(&decrypted)
            .map_err(|_| Error::protocol("encrypted response has invalid padding"))?;
        Ok(plain.to_vec())
    }
}

fn context(host_challenge: &Block8, card_challenge: &Block8) -> [u8; 16] {
    let mut ctx = [0u8; 16];
    ctx[..8].copy_from_slice(host_challenge);
    ctx[8..].copy_from_slice(card_challenge);
    ctx
}

fn checked_lc(len: usize) -> Result<u8> {
    if len > MAX_SHORT_DATA {
        return Err(Error::protocol(format!(
            "wrapped command data of {len} bytes exceeds {MAX_SHORT_DATA}"
        )));
    }
    Ok(len as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{DEFAULT_TEST_KEY, KeyCipher};
    use gpcard_apdu_core::StatusWord;
    use hex_literal::hex;

    const SCP02_INIT_RESPONSE: [u8; 28] =
        hex!("000002650183039536622002000de9c62ba1c4c8e55fcb91b6654ce4");
    const SCP02_HOST_CHALLENGE: Block8 = hex!("f0467f908e5ca23f");

    const SCP03_INIT_RESPONSE: [u8; 32] =
        hex!("000102030405060708093003701112131415161718d7c86a7d0a2d0ddc000001");
    const SCP03_HOST_CHALLENGE: Block8 = hex!("0102030405060708");

    fn scp02_session() -> Session {
        let response = InitializeUpdateResponse::parse(&SCP02_INIT_RESPONSE).unwrap();
        Session::new(
            &KeySet::default_test_keys(),
            &response,
            &SCP02_HOST_CHALLENGE,
            None,
        )
        .unwrap()
    }

    fn scp03_session() -> Session {
        let keys = KeySet::from_master("aes", 0x30, KeyCipher::Aes, DEFAULT_TEST_KEY).unwrap();
        let response = InitializeUpdateResponse::parse(&SCP03_INIT_RESPONSE).unwrap();
        Session::new(&keys, &response, &SCP03_HOST_CHALLENGE, None).unwrap()
    }

    fn get_status() -> Command {
        Command::new_with_data(0x80, 0xF2, 0x40, 0x02, hex!("4f00").to_vec()).with_le(0)
    }

    #[test]
    fn test_security_level_p1() {
        assert_eq!(SecurityLevel::MAC.to_p1(), 0x01);
        assert_eq!(SecurityLevel::MAC_ENC.to_p1(), 0x03);
        assert_eq!(SecurityLevel::FULL.to_p1(), 0x33);
        assert_eq!(SecurityLevel::from_p1(0x13), SecurityLevel {
            c_mac: true,
            c_enc: true,
            r_mac: true,
            r_enc: false,
        });
        assert_eq!(SecurityLevel::default(), SecurityLevel::MAC);
        assert_eq!(SecurityLevel::FULL.to_string(), "C-MAC+C-ENC+R-MAC+R-ENC");
        assert_eq!(SecurityLevel::NONE.to_string(), "none");
    }

    #[test]
    fn test_scp02_session_new() {
        let session = scp02_session();

        assert_eq!(session.version(), ScpVersion::Scp02);
        assert_eq!(session.parameters(), 0x55);
        assert_eq!(session.key_version(), 0x20);
        assert_eq!(
            session.secret(KeyUsage::Enc).unwrap(),
            hex!("217abf8cc47294b2411871f381d7534e")
        );
        assert_eq!(session.host_cryptogram().unwrap(), hex!("3ce060483aace927"));
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_scp02_bad_cryptogram() {
        let mut data = SCP02_INIT_RESPONSE;
        data[27] ^= 0x01;
        let response = InitializeUpdateResponse::parse(&data).unwrap();

        let result = Session::new(
            &KeySet::default_test_keys(),
            &response,
            &SCP02_HOST_CHALLENGE,
            None,
        );
        assert!(matches!(result, Err(Error::Security(_))));
    }

    #[test]
    fn test_wrap_command() {
        let keys = KeySet::new("test", 0)
            .with_key(
                Key::new(0, KeyUsage::Mac, KeyCipher::Des3, hex!("2983ba77d709c2daa1e6000abccac951"))
                    .unwrap(),
            )
            .unwrap();
        let mut session = Session::with_session_keys(
            ScpVersion::Scp02,
            0x55,
            keys,
            0,
            Block8::default(),
            Block8::default(),
        );

        let cmd = Command::new_with_data(0x80, 0x82, 0x01, 0x00, hex!("1d4de92eaf7a2c9f").to_vec());
        let wrapped = session.wrap_with(&cmd, SecurityLevel::MAC).unwrap();
        assert_eq!(
            wrapped.to_bytes().as_ref(),
            hex!("84820100101d4de92eaf7a2c9f8f9b0df681c1d3ec")
        );

        // The previous C-MAC, encrypted, is the next ICV
        let cmd = Command::new_with_data(0x80, 0xF2, 0x80, 0x02, hex!("4f00").to_vec()).with_le(0);
        let wrapped = session.wrap_with(&cmd, SecurityLevel::MAC).unwrap();
        assert_eq!(
            wrapped.to_bytes().as_ref(),
            hex!("84f280020a4f0030f149209e17b39700")
        );
    }

    #[test]
    fn test_scp02_external_authenticate() {
        let mut session = scp02_session();
        let ea = session.external_authenticate(SecurityLevel::MAC).unwrap();
        assert_eq!(
            ea.to_bytes().as_ref(),
            hex!("84820100103ce060483aace927a3cda954b0e88839")
        );
        assert!(session.is_authenticated());

        let wrapped = session.wrap(&get_status()).unwrap();
        assert_eq!(
            wrapped.to_bytes().as_ref(),
            hex!("84f240020a4f00b578b1e2867eb89200")
        );

        // Only once per session
        assert!(matches!(
            session.external_authenticate(SecurityLevel::MAC),
            Err(Error::Security(_))
        ));
    }

    #[test]
    fn test_scp02_encryption_level() {
        let mut session = scp02_session();
        let ea = session.external_authenticate(SecurityLevel::MAC_ENC).unwrap();
        assert_eq!(
            ea.to_bytes().as_ref(),
            hex!("84820300103ce060483aace9273e21b1f6c415651b")
        );
    }

    #[test]
    fn test_scp02_rmac() {
        let mut session = scp02_session();
        let level = SecurityLevel::from_p1(0x13);
        let ea = session.external_authenticate(level).unwrap();
        assert_eq!(
            ea.to_bytes().as_ref(),
            hex!("84821300103ce060483aace927ddce4630caebbd91")
        );

        let wrapped = session.wrap(&get_status()).unwrap();
        assert_eq!(
            wrapped.to_bytes().as_ref(),
            hex!("84f240021073a3e36bc7a2a6f587c710eda8ed16f400")
        );

        let response = Response::from_bytes(
            &hex!("e3114f08a000000151000000c5019e9f7001018e9858056bac0f5a9000")
                .to_vec()
                .into(),
        )
        .unwrap();
        let plain = session.unwrap(response).unwrap();
        assert_eq!(
            plain.payload().as_ref(),
            hex!("e3114f08a000000151000000c5019e9f700101")
        );

        // R-MAC chains into the next response
        let delete =
            Command::new_with_data(0x80, 0xE4, 0x00, 0x00, hex!("4f050102030405").to_vec()).with_le(0);
        let wrapped = session.wrap(&delete).unwrap();
        assert_eq!(
            wrapped.to_bytes().as_ref(),
            hex!("84e4000010ae9df2d0f41bc7bfeffe03848375912a00")
        );
        let response = Response::from_bytes(&hex!("00dca2eea8c7098ab59000").to_vec().into()).unwrap();
        assert_eq!(session.unwrap(response).unwrap().payload().as_ref(), hex!("00"));
    }

    #[test]
    fn test_scp02_rmac_failures() {
        let mut session = scp02_session();
        session.external_authenticate(SecurityLevel::MAC_RMAC).unwrap();

        // Error status without MAC passes through
        session.wrap(&get_status()).unwrap();
        let response = Response::status_only(StatusWord::new(0x6A, 0x82));
        assert_eq!(session.unwrap(response.clone()).unwrap(), response);

        // Success without MAC is rejected
        session.wrap(&get_status()).unwrap();
        assert!(matches!(
            session.unwrap(Response::status_only(0x9000u16)),
            Err(Error::Security(_))
        ));

        // Forged MAC is rejected
        session.wrap(&get_status()).unwrap();
        let forged = Response::new(hex!("0102030405060708090a").to_vec(), 0x9000u16);
        assert!(matches!(session.unwrap(forged), Err(Error::Security(_))));
    }

    #[test]
    fn test_scp01_session() {
        let mut keys = KeySet::default_test_keys();
        let mut data = SCP02_INIT_RESPONSE;
        data[11] = scp::SCP01;
        data[20..28].copy_from_slice(&hex!("432696115c9d4094"));
        let response = InitializeUpdateResponse::parse(&data).unwrap();
        let mut session = Session::new(&keys, &response, &SCP02_HOST_CHALLENGE, None).unwrap();
        assert_eq!(session.parameters(), 0x05);

        assert!(matches!(
            session.check_security_level(SecurityLevel::MAC_RMAC),
            Err(Error::Configuration(_))
        ));

        let ea = session.external_authenticate(SecurityLevel::MAC_ENC).unwrap();
        assert_eq!(
            ea.to_bytes().as_ref(),
            hex!("8482030010aadbe4d9881095c668ba61bfbcc2bca7")
        );
        assert_eq!(
            session.wrap(&get_status()).unwrap().to_bytes().as_ref(),
            hex!("84f2400210376d2ee390f557683c778c2b2b24320a00")
        );

        // Lc + data fills a block: no padding
        let delete =
            Command::new_with_data(0x80, 0xE4, 0x00, 0x00, hex!("4f050102030405").to_vec()).with_le(0);
        assert_eq!(
            session.wrap(&delete).unwrap().to_bytes().as_ref(),
            hex!("84e4000010586a164934a2cdf456e6c876d25c92c600")
        );

        keys = KeySet::new("empty", 0);
        assert!(Session::new(&keys, &response, &SCP02_HOST_CHALLENGE, None).is_err());
    }

    #[test]
    fn test_scp03_session() {
        let mut session = scp03_session();
        assert_eq!(session.version(), ScpVersion::Scp03);
        assert_eq!(session.parameters(), 0x70);
        assert_eq!(session.host_cryptogram().unwrap(), hex!("00b11d00f75c456b"));

        let ea = session.external_authenticate(SecurityLevel::FULL).unwrap();
        assert_eq!(
            ea.to_bytes().as_ref(),
            hex!("848233001000b11d00f75c456b51db83815e37a95d")
        );

        let wrapped = session.wrap(&get_status()).unwrap();
        assert_eq!(
            wrapped.to_bytes().as_ref(),
            hex!("84f24002188dbef710a5c9c7e42cefec3e1c02ec41737e462adfccd31300")
        );

        let response = Response::from_bytes(
            &hex!(
                "31c0997bb3ddede04f065819d1a72315ee8f9df0d32e6796cc59f8d23d31d588446b2ea49fcd2fab9000"
            )
            .to_vec()
            .into(),
        )
        .unwrap();
        let plain = session.unwrap(response).unwrap();
        assert_eq!(
            plain.payload().as_ref(),
            hex!("e3114f08a000000151000000c5019e9f700101")
        );
        assert!(plain.is_success());

        // Empty data is neither encrypted nor decrypted, the counter still moves
        let get_data = Command::new(0x80, 0xCA, 0x00, 0x66).with_le(0);
        assert_eq!(
            session.wrap(&get_data).unwrap().to_bytes().as_ref(),
            hex!("84ca006608dc587adeb2b794b100")
        );
        let response = Response::from_bytes(&hex!("0fb81e2e5dff20249000").to_vec().into()).unwrap();
        assert!(session.unwrap(response).unwrap().payload().is_empty());
    }

    #[test]
    fn test_scp03_level_checks() {
        let keys = KeySet::from_master("aes", 0x30, KeyCipher::Aes, DEFAULT_TEST_KEY).unwrap();

        // i = 0x00: no response protection
        let mut data = SCP03_INIT_RESPONSE;
        data[12] = 0x00;
        let response = InitializeUpdateResponse::parse(&data).unwrap();
        let session = Session::new(&keys, &response, &SCP03_HOST_CHALLENGE, None).unwrap();
        assert!(matches!(
            session.check_security_level(SecurityLevel::MAC_RMAC),
            Err(Error::Configuration(_))
        ));
        session.check_security_level(SecurityLevel::MAC_ENC).unwrap();

        // S16 mode
        data[12] = 0x71;
        let response = InitializeUpdateResponse::parse(&data).unwrap();
        assert!(matches!(
            Session::new(&keys, &response, &SCP03_HOST_CHALLENGE, None),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_wrap_requires_authentication() {
        let mut session = scp02_session();
        assert!(matches!(
            session.wrap(&get_status()),
            Err(Error::Transport(gpcard_apdu_core::Error::SecureChannelNotEstablished))
        ));
    }

    #[test]
    fn test_wrapped_length_limit() {
        let mut session = scp02_session();
        session.external_authenticate(SecurityLevel::MAC).unwrap();

        let fits = Command::new_with_data(0x80, 0xE8, 0x00, 0x00, vec![0u8; 247]);
        assert!(session.wrap(&fits).is_ok());

        let too_long = Command::new_with_data(0x80, 0xE8, 0x00, 0x01, vec![0u8; 248]);
        assert!(matches!(session.wrap(&too_long), Err(Error::Protocol(_))));
        assert_eq!(session.max_data_length(), 247);
    }

    #[test]
    fn test_max_data_length_with_encryption() {
        let mut session = scp03_session();
        session.external_authenticate(SecurityLevel::FULL).unwrap();
        assert_eq!(session.max_data_length(), 239);

        let fits = Command::new_with_data(0x80, 0xE8, 0x00, 0x00, vec![0u8; 239]);
        assert!(session.wrap(&fits).is_ok());
        let too_long = Command::new_with_data(0x80, 0xE8, 0x00, 0x01, vec![0u8; 240]);
        assert!(matches!(session.wrap(&too_long), Err(Error::Protocol(_))));

        let mut session = scp02_session();
        session.external_authenticate(SecurityLevel::MAC_ENC).unwrap();
        assert_eq!(session.max_data_length(), 239);
        let fits = Command::new_with_data(0x80, 0xE8, 0x00, 0x00, vec![0u8; 239]);
        assert!(session.wrap(&fits).is_ok());
    }
}
