//! GET STATUS registry data
//!
//! Parsers for the two GET STATUS response formats: the TLV format (one `E3`
//! template per entry) and the legacy fixed layout.

use std::fmt;

use derive_more::Display;

use crate::{
    Error, Result,
    constants::{get_status_p1, get_status_p2, set_status_p1, tags},
    util::tlv,
};

/// Registry subset queried with GET STATUS (P1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum RegistrySubset {
    /// Issuer security domain
    #[display("ISD")]
    IssuerSecurityDomain,
    /// Applications and supplementary security domains
    #[display("applications")]
    Applications,
    /// Executable load files
    #[display("load files")]
    LoadFiles,
    /// Executable load files with their modules
    #[display("load files and modules")]
    LoadFilesAndModules,
}

impl RegistrySubset {
    /// GET STATUS P1
    pub const fn p1(self) -> u8 {
        match self {
            Self::IssuerSecurityDomain => get_status_p1::ISSUER_SECURITY_DOMAIN,
            Self::Applications => get_status_p1::APPLICATIONS,
            Self::LoadFiles => get_status_p1::EXEC_LOAD_FILES,
            Self::LoadFilesAndModules => get_status_p1::EXEC_LOAD_FILES_AND_MODULES,
        }
    }
}

/// GET STATUS response format (P2 bit 1)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display)]
pub enum RegistryFormat {
    /// Fixed layout of GlobalPlatform 2.1 and earlier
    #[display("legacy")]
    Legacy,
    /// `E3` templates
    #[default]
    #[display("TLV")]
    Tlv,
}

impl RegistryFormat {
    /// GET STATUS P2 format bits
    pub const fn p2(self) -> u8 {
        match self {
            Self::Legacy => get_status_p2::LEGACY_DATA,
            Self::Tlv => get_status_p2::TLV_DATA,
        }
    }
}

/// Target of SET STATUS (P1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum StatusTarget {
    /// Issuer security domain (card life cycle)
    #[display("ISD")]
    IssuerSecurityDomain,
    /// Application or supplementary security domain
    #[display("application")]
    Application,
    /// Security domain and its associated applications
    #[display("security domain and applications")]
    SecurityDomainAndApplications,
}

impl StatusTarget {
    /// SET STATUS P1
    pub const fn p1(self) -> u8 {
        match self {
            Self::IssuerSecurityDomain => set_status_p1::ISSUER_SECURITY_DOMAIN,
            Self::Application => set_status_p1::APPLICATION_OR_SSD,
            Self::SecurityDomainAndApplications => set_status_p1::SD_AND_APPLICATIONS,
        }
    }
}

/// One registry entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryEntry {
    /// AID of the application, security domain or load file
    pub aid: Vec<u8>,
    /// Life cycle state
    pub lifecycle: u8,
    /// Privileges (empty for load files)
    pub privileges: Vec<u8>,
    /// Executable load file of an application
    pub executable_load_file: Option<Vec<u8>>,
    /// Executable modules of a load file
    pub executable_modules: Vec<Vec<u8>>,
    /// Load file version
    pub version: Option<Vec<u8>>,
    /// Associated security domain
    pub associated_security_domain: Option<Vec<u8>>,
}

impl fmt::Display for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (lifecycle {:#04x}", hex::encode_upper(&self.aid), self.lifecycle)?;
        if !self.privileges.is_empty() {
            write!(f, ", privileges {}", hex::encode_upper(&self.privileges))?;
        }
        f.write_str(")")
    }
}

impl RegistryEntry {
    /// Parse accumulated GET STATUS data
    pub fn parse(data: &[u8], subset: RegistrySubset, format: RegistryFormat) -> Result<Vec<Self>> {
        match format {
            RegistryFormat::Tlv => Self::parse_tlv(data),
            RegistryFormat::Legacy => {
                Self::parse_legacy(data, subset == RegistrySubset::LoadFilesAndModules)
            }
        }
    }

    /// Parse TLV data: a sequence of `E3` (or `E2`) templates
    pub fn parse_tlv(data: &[u8]) -> Result<Vec<Self>> {
        tlv::parse_ber(data)?
            .iter()
            .filter(|entry| {
                tlv::has_tag(entry, &[tags::REGISTRY_ENTRY])
                    || tlv::has_tag(entry, &[tags::REGISTRY_ENTRY_LEGACY])
            })
            .map(Self::from_template)
            .collect()
    }

    fn from_template(template: &iso7816_tlv::ber::Tlv) -> Result<Self> {
        let mut entry = Self::default();
        let mut has_aid = false;

        for field in tlv::children(template) {
            let Some(value) = tlv::primitive(field) else {
                continue;
            };
            let tag = field.tag().to_bytes();
            match tag {
                [tags::AID] => {
                    entry.aid = value.to_vec();
                    has_aid = true;
                }
                [0x9F, 0x70] => {
                    entry.lifecycle = value.first().copied().ok_or_else(|| {
                        Error::protocol("empty life cycle state in registry entry")
                    })?;
                }
                [tags::PRIVILEGES] => entry.privileges = value.to_vec(),
                [tags::EXECUTABLE_LOAD_FILE] => entry.executable_load_file = Some(value.to_vec()),
                [tags::EXECUTABLE_MODULE] => entry.executable_modules.push(value.to_vec()),
                [tags::VERSION] => entry.version = Some(value.to_vec()),
                [tags::ASSOCIATED_SECURITY_DOMAIN] => {
                    entry.associated_security_domain = Some(value.to_vec());
                }
                _ => {}
            }
        }

        if !has_aid {
            return Err(Error::protocol("registry entry without AID"));
        }
        Ok(entry)
    }

    /// Parse legacy data: `len aid lifecycle privileges` per entry, followed
    /// by `count (len aid)*` when modules were requested
    pub fn parse_legacy(data: &[u8], with_modules: bool) -> Result<Vec<Self>> {
        let mut reader = Reader(data);
        let mut entries = Vec::new();

        while !reader.is_empty() {
            let aid = reader.lv()?.to_vec();
            let lifecycle = reader.byte()?;
            let privileges = reader.byte()?;

            let mut entry = Self {
                aid,
                lifecycle,
                privileges: vec![privileges],
                ..Self::default()
            };
            if with_modules {
                let count = reader.byte()?;
                for _ in 0..count {
                    entry.executable_modules.push(reader.lv()?.to_vec());
                }
            }
            entries.push(entry);
        }

        Ok(entries)
    }
}

struct Reader<'a>(&'a [u8]);

impl<'a> Reader<'a> {
    const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.0.len() < len {
            return Err(Error::protocol("truncated legacy registry data"));
        }
        let (head, tail) = self.0.split_at(len);
        self.0 = tail;
        Ok(head)
    }

    fn byte(&mut self) -> Result<u8> {
        self.take(1).map(|bytes| bytes[0])
    }

    fn lv(&mut self) -> Result<&'a [u8]> {
        let len = self.byte()?;
        self.take(len as usize)
    }
}
