//! Key model for GlobalPlatform secure channels
//!
//! A [`KeySet`] groups the static or session keys of one security domain key
//! version. Lookups fall back to the [`KeyUsage::Master`] key, so a set made of
//! a single master key serves every usage.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use derive_more::Display;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    Error, Result,
    constants::{scp02_derivation, scp03_derivation},
    crypto,
};

/// Default GlobalPlatform test key (40..4F)
pub const DEFAULT_TEST_KEY: [u8; 16] = [
    0x40, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49, 0x4A, 0x4B, 0x4C, 0x4D, 0x4E, 0x4F,
];

/// Length of the diversification data returned by INITIALIZE UPDATE
pub const DIVERSIFICATION_DATA_LENGTH: usize = 10;

/// Role of a key within a key set
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum KeyUsage {
    /// Fallback key used for any usage without a dedicated key
    #[display("MASTER")]
    Master,
    /// Encryption key (also used for SCP01/02 cryptograms)
    #[display("ENC")]
    Enc,
    /// Command MAC key
    #[display("MAC")]
    Mac,
    /// Key encryption key (DEK)
    #[display("KEK")]
    Kek,
    /// Response MAC key
    #[display("RMAC")]
    Rmac,
}

impl KeyUsage {
    /// Usage byte used in diversification blocks
    pub const fn diversify_id(self) -> u8 {
        match self {
            Self::Master => 0,
            Self::Enc => 1,
            Self::Mac => 2,
            Self::Kek => 3,
            Self::Rmac => 4,
        }
    }
}

/// Cipher a key is meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum KeyCipher {
    /// Untyped secret, usable wherever its length fits
    #[display("GENERIC")]
    Generic,
    /// Single DES
    #[display("DES")]
    Des,
    /// Triple DES
    #[display("DES3")]
    Des3,
    /// AES
    #[display("AES")]
    Aes,
}

impl KeyCipher {
    /// Check whether a secret of `len` bytes is valid for this cipher
    pub const fn accepts_length(self, len: usize) -> bool {
        match self {
            Self::Generic => len > 0 && len % 8 == 0 && len <= 32,
            Self::Des => len == 8,
            Self::Des3 => len == 8 || len == 16 || len == 24,
            Self::Aes => len == 16,
        }
    }

    /// Cipher class of a key type byte from a Key Information Template
    pub const fn from_key_type(key_type: u8) -> Option<Self> {
        use crate::constants::key_type;

        match key_type {
            key_type::DES_IMPLICIT | key_type::DES3 | key_type::DES3_CBC => Some(Self::Des3),
            key_type::DES_ECB | key_type::DES_CBC => Some(Self::Des),
            key_type::AES => Some(Self::Aes),
            _ => None,
        }
    }

    const fn is_aes(self) -> bool {
        matches!(self, Self::Aes)
    }
}

/// A single secure channel key
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Key {
    #[zeroize(skip)]
    id: u8,
    #[zeroize(skip)]
    usage: KeyUsage,
    #[zeroize(skip)]
    cipher: KeyCipher,
    secret: Vec<u8>,
}

impl Key {
    /// Create a key, checking the secret length against the cipher
    pub fn new(id: u8, usage: KeyUsage, cipher: KeyCipher, secret: impl Into<Vec<u8>>) -> Result<Self> {
        let secret = secret.into();
        if !cipher.accepts_length(secret.len()) {
            return Err(Error::configuration(format!(
                "{} key {usage} cannot hold a {} byte secret",
                cipher,
                secret.len()
            )));
        }

        Ok(Self {
            id,
            usage,
            cipher,
            secret,
        })
    }

    /// Key id (0 means "any")
    pub const fn id(&self) -> u8 {
        self.id
    }

    /// Key usage
    pub const fn usage(&self) -> KeyUsage {
        self.usage
    }

    /// Key cipher
    pub const fn cipher(&self) -> KeyCipher {
        self.cipher
    }

    /// Raw secret
    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    /// Secret length in bytes
    pub fn len(&self) -> usize {
        self.secret.len()
    }

    /// Whether the secret is empty (never true for a constructed key)
    pub fn is_empty(&self) -> bool {
        self.secret.is_empty()
    }

    /// New key keeping this key's id
    ///
    /// A master key stands in for several usages, so keys derived from it get id 0.
    fn derived(&self, usage: KeyUsage, cipher: KeyCipher, secret: Vec<u8>) -> Result<Self> {
        let id = if self.usage == KeyUsage::Master { 0 } else { self.id };
        Self::new(id, usage, cipher, secret)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("id", &self.id)
            .field("usage", &self.usage)
            .field("cipher", &self.cipher)
            .field("len", &self.secret.len())
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Key diversification scheme
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display)]
pub enum Diversification {
    /// Static keys
    #[default]
    #[display("none")]
    None,
    /// EMV CPS 1.1
    #[display("emv")]
    Emv,
    /// VISA2
    #[display("visa2")]
    Visa2,
}

impl FromStr for Diversification {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "emv" => Ok(Self::Emv),
            "visa2" => Ok(Self::Visa2),
            other => Err(Error::unsupported(format!(
                "unknown diversification algorithm '{other}'"
            ))),
        }
    }
}

impl Diversification {
    /// Build the 16 byte diversification block for one key usage
    fn block(self, data: &[u8; DIVERSIFICATION_DATA_LENGTH], usage: KeyUsage) -> Option<[u8; 16]> {
        let uid = usage.diversify_id();
        let mut block = [0u8; 16];
        match self {
            Self::None => return None,
            Self::Emv => {
                block[0..6].copy_from_slice(&data[4..10]);
                block[8..14].copy_from_slice(&data[4..10]);
            }
            Self::Visa2 => {
                block[0..2].copy_from_slice(&data[0..2]);
                block[2..6].copy_from_slice(&data[4..8]);
                block[8..10].copy_from_slice(&data[0..2]);
                block[10..14].copy_from_slice(&data[4..8]);
            }
        }
        block[6] = 0xF0;
        block[7] = uid;
        block[14] = 0x0F;
        block[15] = uid;
        Some(block)
    }
}

/// Named collection of keys sharing one key version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySet {
    name: String,
    version: u8,
    diversification: Diversification,
    keys: BTreeMap<KeyUsage, Key>,
    keys_by_id: BTreeMap<u8, KeyUsage>,
}

impl KeySet {
    /// Create an empty key set
    pub fn new(name: impl Into<String>, version: u8) -> Self {
        Self {
            name: name.into(),
            version,
            diversification: Diversification::None,
            keys: BTreeMap::new(),
            keys_by_id: BTreeMap::new(),
        }
    }

    /// Key set made of a single master key serving every usage
    pub fn from_master(name: impl Into<String>, version: u8, cipher: KeyCipher, secret: impl Into<Vec<u8>>) -> Result<Self> {
        Self::new(name, version).with_key(Key::new(0, KeyUsage::Master, cipher, secret)?)
    }

    /// The well-known 40..4F test keys, any key version
    pub fn default_test_keys() -> Self {
        let mut keys = Self::new("default", 0);
        keys.keys.insert(
            KeyUsage::Master,
            Key {
                id: 0,
                usage: KeyUsage::Master,
                cipher: KeyCipher::Generic,
                secret: DEFAULT_TEST_KEY.to_vec(),
            },
        );
        keys
    }

    /// Add a key, rejecting a second key for the same usage or nonzero id
    pub fn put_key(&mut self, key: Key) -> Result<()> {
        let duplicate_id = key.id != 0 && self.keys_by_id.contains_key(&key.id);
        if self.keys.contains_key(&key.usage) || duplicate_id {
            return Err(Error::DuplicateKey {
                usage: key.usage,
                id: key.id,
            });
        }

        if key.id != 0 {
            self.keys_by_id.insert(key.id, key.usage);
        }
        self.keys.insert(key.usage, key);
        Ok(())
    }

    /// Builder form of [`put_key`](Self::put_key)
    pub fn with_key(mut self, key: Key) -> Result<Self> {
        self.put_key(key)?;
        Ok(self)
    }

    /// Key for a usage, falling back to the master key
    pub fn get_key_by_type(&self, usage: KeyUsage) -> Option<&Key> {
        self.keys
            .get(&usage)
            .or_else(|| self.keys.get(&KeyUsage::Master))
    }

    /// Key with a nonzero id, falling back to the master key
    pub fn get_key_by_id(&self, id: u8) -> Option<&Key> {
        let exact = (id != 0)
            .then(|| self.keys_by_id.get(&id))
            .flatten()
            .and_then(|usage| self.keys.get(usage));
        exact.or_else(|| self.keys.get(&KeyUsage::Master))
    }

    /// Key registered for exactly this usage, without fallback
    pub fn get_exact(&self, usage: KeyUsage) -> Option<&Key> {
        self.keys.get(&usage)
    }

    /// Name of the set
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key version number (0 means "any")
    pub const fn version(&self) -> u8 {
        self.version
    }

    /// Diversification already applied to the keys
    pub const fn diversification(&self) -> Diversification {
        self.diversification
    }

    /// Iterate over the keys, ordered by usage
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.keys.values()
    }

    /// Number of keys in the set
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set holds no key
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn required(&self, usage: KeyUsage) -> Result<Cow<'_, Key>> {
        self.get_key_by_type(usage)
            .map(Cow::Borrowed)
            .ok_or_else(|| Error::configuration(format!("key set '{}' has no {usage} key", self.name)))
    }

    /// Source of the response MAC key: the explicit RMAC key, else the MAC key under id 0
    fn rmac_source(&self) -> Result<Cow<'_, Key>> {
        if let Some(rmac) = self.get_exact(KeyUsage::Rmac) {
            return Ok(Cow::Borrowed(rmac));
        }
        let mac = self.required(KeyUsage::Mac)?;
        Ok(Cow::Owned(Key::new(0, KeyUsage::Rmac, mac.cipher, mac.secret.clone())?))
    }

    /// Diversify the keys with card data from INITIALIZE UPDATE
    ///
    /// [`Diversification::None`] returns the set itself without copying.
    pub fn diversify(
        &self,
        algorithm: Diversification,
        data: &[u8; DIVERSIFICATION_DATA_LENGTH],
    ) -> Result<Cow<'_, Self>> {
        if algorithm == Diversification::None {
            return Ok(Cow::Borrowed(self));
        }
        if self.diversification != Diversification::None {
            return Err(Error::configuration(format!(
                "key set '{}' is already diversified ({})",
                self.name, self.diversification
            )));
        }

        let mut diversified = Self::new(format!("{}+{}", self.name, algorithm), self.version);
        diversified.diversification = algorithm;

        for usage in [KeyUsage::Enc, KeyUsage::Mac, KeyUsage::Kek, KeyUsage::Rmac] {
            let source = match usage {
                KeyUsage::Rmac => self.get_exact(usage),
                _ => self.get_key_by_type(usage),
            };
            let Some(source) = source else { continue };
            if source.cipher.is_aes() {
                return Err(Error::unsupported(format!(
                    "{algorithm} diversification of AES keys"
                )));
            }

            let Some(block) = algorithm.block(data, usage) else {
                continue;
            };
            let mut secret = crypto::des3_ecb_encrypt(source.secret(), &block)?;
            secret.truncate(source.len());
            diversified.put_key(source.derived(usage, source.cipher, secret)?)?;
        }

        debug!(name = %diversified.name, "Diversified key set");
        Ok(Cow::Owned(diversified))
    }

    /// Derive SCP02 session keys for a sequence counter
    pub fn derive_scp02_session(&self, sequence: &[u8; 2]) -> Result<Self> {
        let mut session = Self::new(format!("{}/scp02", self.name), self.version);
        session.diversification = self.diversification;

        for (usage, tag, source) in [
            (KeyUsage::Enc, scp02_derivation::ENC, self.required(KeyUsage::Enc)?),
            (KeyUsage::Mac, scp02_derivation::MAC, self.required(KeyUsage::Mac)?),
            (KeyUsage::Kek, scp02_derivation::KEK, self.required(KeyUsage::Kek)?),
            (KeyUsage::Rmac, scp02_derivation::RMAC, self.rmac_source()?),
        ] {
            if source.cipher.is_aes() {
                return Err(Error::unsupported("SCP02 with AES keys"));
            }
            let secret = crypto::derive_scp02_key(source.secret(), &tag, sequence)?;
            session.put_key(source.derived(usage, KeyCipher::Des3, secret.to_vec())?)?;
        }

        Ok(session)
    }

    /// Derive SCP03 session keys for the handshake context (host || card challenge)
    pub fn derive_scp03_session(&self, context: &[u8]) -> Result<Self> {
        let mut session = Self::new(format!("{}/scp03", self.name), self.version);
        session.diversification = self.diversification;

        for (usage, constant, source) in [
            (KeyUsage::Enc, scp03_derivation::S_ENC, self.required(KeyUsage::Enc)?),
            (KeyUsage::Mac, scp03_derivation::S_MAC, self.required(KeyUsage::Mac)?),
            (KeyUsage::Rmac, scp03_derivation::S_RMAC, self.rmac_source()?),
        ] {
            let bits = (source.len() * 8) as u16;
            let secret = crypto::scp03_kdf(source.secret(), constant, context, bits)?;
            session.put_key(source.derived(usage, KeyCipher::Aes, secret)?)?;
        }

        let kek = self.required(KeyUsage::Kek)?;
        session.put_key(kek.derived(KeyUsage::Kek, kek.cipher, kek.secret.clone())?)?;

        Ok(session)
    }
}
