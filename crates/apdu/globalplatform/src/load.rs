//! Load file handling
//!
//! A [`LoadFile`] holds the Load File Data Block sent with LOAD commands and
//! splits it into numbered blocks. Reading CAP archives is left to the caller;
//! the component files can be handed over as-is with
//! [`LoadFile::from_components`].

use bytes::{BufMut, Bytes, BytesMut};
use sha2::{Digest, Sha256};

use crate::{
    Error, Result,
    constants::{DEFAULT_LOAD_BLOCK_SIZE, MAX_LOAD_BLOCK_SIZE, tags},
    util::tlv,
};

/// One LOAD block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadBlock<'a> {
    /// Block number (P2), wrapping after 255
    pub number: u8,
    /// Whether this is the last block (P1 0x80)
    pub last: bool,
    /// Block contents
    pub data: &'a [u8],
}

/// Load file ready to be sent to a card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFile {
    package_aid: Vec<u8>,
    data: Bytes,
    block_size: usize,
}

impl LoadFile {
    /// Wrap a complete Load File Data Block (including its `C4` header)
    pub fn new(
        package_aid: impl Into<Vec<u8>>,
        load_file_data: impl Into<Bytes>,
        block_size: usize,
    ) -> Result<Self> {
        let package_aid = package_aid.into();
        let data = load_file_data.into();

        if !(5..=16).contains(&package_aid.len()) {
            return Err(Error::configuration(format!(
                "package AID of {} bytes",
                package_aid.len()
            )));
        }
        if block_size == 0 || block_size > MAX_LOAD_BLOCK_SIZE {
            return Err(Error::configuration(format!(
                "LOAD block size {block_size}, expected 1..={MAX_LOAD_BLOCK_SIZE}"
            )));
        }
        if data.is_empty() {
            return Err(Error::configuration("empty load file"));
        }

        Ok(Self {
            package_aid,
            data,
            block_size,
        })
    }

    /// Build the Load File Data Block from CAP components in load order
    pub fn from_components<I, B>(
        package_aid: impl Into<Vec<u8>>,
        components: I,
        block_size: usize,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut code = BytesMut::new();
        for component in components {
            code.put_slice(component.as_ref());
        }

        let length = tlv::encode_length(code.len());
        let mut data = BytesMut::with_capacity(1 + length.len() + code.len());
        data.put_u8(tags::LOAD_FILE_DATA_BLOCK);
        data.put_slice(&length);
        data.put_slice(&code);

        Self::new(package_aid, data.freeze(), block_size)
    }

    /// Same as [`LoadFile::new`] with the default block size
    pub fn with_default_block_size(
        package_aid: impl Into<Vec<u8>>,
        load_file_data: impl Into<Bytes>,
    ) -> Result<Self> {
        Self::new(package_aid, load_file_data, DEFAULT_LOAD_BLOCK_SIZE)
    }

    /// Package AID
    pub fn package_aid(&self) -> &[u8] {
        &self.package_aid
    }

    /// Complete Load File Data Block
    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    /// Maximum bytes per LOAD command
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    /// Total bytes to load
    pub fn total_size(&self) -> usize {
        self.data.len()
    }

    /// Number of LOAD commands needed
    pub fn block_count(&self) -> usize {
        self.data.len().div_ceil(self.block_size)
    }

    /// Blocks in load order
    pub fn blocks(&self) -> impl Iterator<Item = LoadBlock<'_>> {
        let count = self.block_count();
        self.data
            .chunks(self.block_size)
            .enumerate()
            .map(move |(index, data)| LoadBlock {
                number: index as u8,
                last: index + 1 == count,
                data,
            })
    }

    /// SHA-256 of the Load File Data Block, sent with INSTALL [for load]
    pub fn data_block_hash(&self) -> [u8; 32] {
        Sha256::digest(&self.data).into()
    }
}

/// Options for INSTALL [for load]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Security domain receiving the load file; empty lets the card choose
    pub security_domain_aid: Vec<u8>,

    /// Send the load file data block hash
    pub include_hash: bool,

    /// Load parameters field
    pub load_parameters: Vec<u8>,

    /// Load token
    pub load_token: Vec<u8>,
}

impl LoadOptions {
    /// Create default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target security domain
    pub fn with_security_domain(mut self, aid: impl Into<Vec<u8>>) -> Self {
        self.security_domain_aid = aid.into();
        self
    }

    /// Set whether to send the load file hash
    pub const fn with_hash(mut self, include_hash: bool) -> Self {
        self.include_hash = include_hash;
        self
    }

    /// Set the load parameters
    pub fn with_load_parameters(mut self, parameters: impl Into<Vec<u8>>) -> Self {
        self.load_parameters = parameters.into();
        self
    }

    /// Set the load token
    pub fn with_load_token(mut self, token: impl Into<Vec<u8>>) -> Self {
        self.load_token = token.into();
        self
    }
}
