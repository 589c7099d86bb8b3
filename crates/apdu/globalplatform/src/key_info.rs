//! Key Information Template parsing and key set matching
//!
//! The card reports the key slots of its security domain in a Key
//! Information Template (GET DATA `00E0`). Each `C0` entry names a key id, a
//! key version and the type and size of the key component. This module
//! decides whether a [`KeySet`] can authenticate against those slots, and
//! whether it can replace them.

use std::collections::BTreeSet;

use tracing::debug;

use crate::{
    Error, Result,
    constants::tags,
    keys::{Key, KeyCipher, KeySet, KeyUsage},
    util::tlv,
};

/// One key slot reported by the card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfoEntry {
    key_id: u8,
    key_version: u8,
    component_types: Vec<u8>,
    component_sizes: Vec<usize>,
}

impl KeyInfoEntry {
    /// Parse the value of a `C0` key information data object
    pub fn parse(data: &[u8]) -> Result<Self> {
        let [key_id, key_version, components @ ..] = data else {
            return Err(Error::protocol("key information data shorter than 2 bytes"));
        };
        if components.is_empty() || components.len() % 2 != 0 {
            return Err(Error::protocol(format!(
                "malformed key components for key {key_id:#04x}"
            )));
        }

        let (component_types, component_sizes): (Vec<u8>, Vec<usize>) = components
            .chunks_exact(2)
            .map(|pair| (pair[0], usize::from(pair[1])))
            .unzip();

        if component_types.len() > 1 {
            return Err(Error::unsupported(format!(
                "key {key_id:#04x} version {key_version:#04x} has {} components",
                component_types.len()
            )));
        }

        Ok(Self {
            key_id: *key_id,
            key_version: *key_version,
            component_types,
            component_sizes,
        })
    }

    /// Key id of the slot
    pub const fn key_id(&self) -> u8 {
        self.key_id
    }

    /// Key version of the slot (0 when the card does not require one)
    pub const fn key_version(&self) -> u8 {
        self.key_version
    }

    /// Raw key type bytes, one per component
    pub fn component_types(&self) -> &[u8] {
        &self.component_types
    }

    /// Component sizes in bytes
    pub fn component_sizes(&self) -> &[usize] {
        &self.component_sizes
    }

    /// Key type byte of the single component
    pub fn key_type(&self) -> u8 {
        self.component_types[0]
    }

    /// Key size of the single component
    pub fn key_size(&self) -> usize {
        self.component_sizes[0]
    }

    /// Cipher class of the key type, if it has one
    pub fn cipher(&self) -> Option<KeyCipher> {
        KeyCipher::from_key_type(self.key_type())
    }

    fn accepts_cipher_and_size(&self, key: &Key) -> bool {
        let cipher_ok = key.cipher() == KeyCipher::Generic || self.cipher() == Some(key.cipher());
        cipher_ok && key.len() == self.key_size()
    }

    /// Check whether `key` of a set with version `set_version` can use this slot
    pub fn matches(&self, key: &Key, set_version: u8) -> bool {
        let id_ok = key.id() == 0 || key.id() == self.key_id;
        let version_ok =
            self.key_version == 0 || set_version == 0 || self.key_version == set_version;
        id_ok && version_ok && self.accepts_cipher_and_size(key)
    }
}

/// Ordered key slots of a Key Information Template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyInfoTemplate {
    entries: Vec<KeyInfoEntry>,
}

impl KeyInfoTemplate {
    /// Parse GET DATA `00E0` response data
    ///
    /// Accepts the `E0` template as well as a bare list of `C0` objects.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let top = tlv::parse_ber(data)?;
        let objects = match top.as_slice() {
            [template] if tlv::has_tag(template, &[tags::KEY_INFO_TEMPLATE]) => {
                tlv::children(template).to_vec()
            }
            _ => top,
        };

        let entries = objects
            .iter()
            .filter(|object| tlv::has_tag(object, &[tags::KEY_INFO_DATA]))
            .map(|object| {
                tlv::primitive(object)
                    .ok_or_else(|| Error::protocol("constructed key information data"))
                    .and_then(KeyInfoEntry::parse)
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(entries = entries.len(), "Parsed key information template");
        Ok(Self { entries })
    }

    /// Build a template from entries
    pub const fn from_entries(entries: Vec<KeyInfoEntry>) -> Self {
        Self { entries }
    }

    /// Entries in card order
    pub fn entries(&self) -> &[KeyInfoEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the template is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Key versions present, in card order
    pub fn versions(&self) -> Vec<u8> {
        let mut versions = Vec::new();
        for entry in &self.entries {
            if !versions.contains(&entry.key_version) {
                versions.push(entry.key_version);
            }
        }
        versions
    }

    /// Check whether `keys` can open a secure channel against these slots
    ///
    /// The ENC, MAC and KEK keys (with master fallback) must each match an entry.
    pub fn is_usable(&self, keys: &KeySet) -> bool {
        [KeyUsage::Enc, KeyUsage::Mac, KeyUsage::Kek]
            .into_iter()
            .all(|usage| {
                keys.get_key_by_type(usage).is_some_and(|key| {
                    self.entries
                        .iter()
                        .any(|entry| entry.matches(key, keys.version()))
                })
            })
    }

    /// Check that `candidate` can replace the keys of one key version
    ///
    /// Only one version group is checked, since a multi-version card keeps
    /// the other groups untouched: the entries of the candidate's version when
    /// the template lists it, otherwise the entries of the first listed
    /// version. Every entry of that group needs a candidate key with the same
    /// id, cipher class and size, and every candidate key must fill a slot.
    pub fn check_replacement(&self, candidate: &KeySet) -> Result<()> {
        let version = if self.entries.iter().any(|e| e.key_version == candidate.version()) {
            Some(candidate.version())
        } else {
            self.entries.first().map(|entry| entry.key_version)
        };
        let Some(version) = version else {
            return Err(Error::configuration("card reported no key slots"));
        };

        let mut consumed = BTreeSet::new();
        for entry in self.entries.iter().filter(|e| e.key_version == version) {
            let key = candidate
                .keys()
                .find(|key| key.id() == entry.key_id)
                .ok_or_else(|| {
                    Error::configuration(format!(
                        "key set '{}' has no key with id {:#04x}",
                        candidate.name(),
                        entry.key_id
                    ))
                })?;

            if !entry.accepts_cipher_and_size(key) {
                return Err(Error::configuration(format!(
                    "{} key {:#04x} ({} bytes) does not fit slot type {:#04x} of {} bytes",
                    key.cipher(),
                    key.id(),
                    key.len(),
                    entry.key_type(),
                    entry.key_size()
                )));
            }
            consumed.insert(key.id());
        }

        if let Some(extra) = candidate.keys().find(|key| !consumed.contains(&key.id())) {
            return Err(Error::configuration(format!(
                "{} key with id {:#04x} has no matching slot",
                extra.usage(),
                extra.id()
            )));
        }

        Ok(())
    }
}
