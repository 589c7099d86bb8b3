//! APDU command definitions and traits
//!
//! This module provides types and traits for working with short APDU commands
//! according to ISO/IEC 7816-4.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Result};

/// Largest data field a short APDU can carry
pub const MAX_SHORT_DATA: usize = 255;

/// Accessors shared by every APDU command
pub trait ApduCommand {
    /// Command class (CLA)
    fn class(&self) -> u8;

    /// Instruction code (INS)
    fn instruction(&self) -> u8;

    /// First parameter (P1)
    fn p1(&self) -> u8;

    /// Second parameter (P2)
    fn p2(&self) -> u8;

    /// Command payload data (optional)
    fn data(&self) -> Option<&[u8]>;

    /// Expected response length (optional, `0` meaning "up to 256")
    fn expected_length(&self) -> Option<u8>;

    /// Convert to raw APDU bytes
    ///
    /// Data fields longer than [`MAX_SHORT_DATA`] cannot be expressed; callers
    /// check [`Command::validate`] before transmitting.
    fn to_bytes(&self) -> Bytes {
        let mut buffer = BytesMut::with_capacity(self.command_length());

        // Header: CLA, INS, P1, P2
        buffer.put_u8(self.class());
        buffer.put_u8(self.instruction());
        buffer.put_u8(self.p1());
        buffer.put_u8(self.p2());

        // Add Lc and data if present
        if let Some(data) = self.data() {
            buffer.put_u8(data.len() as u8);
            buffer.put_slice(data);
        }

        if let Some(le) = self.expected_length() {
            buffer.put_u8(le);
        }

        buffer.freeze()
    }

    /// Calculate length of serialized command
    fn command_length(&self) -> usize {
        4 + self.data().map_or(0, |data| 1 + data.len()) + usize::from(self.expected_length().is_some())
    }

    /// Convert to a generic Command
    fn to_command(&self) -> Command {
        Command {
            cla: self.class(),
            ins: self.instruction(),
            p1: self.p1(),
            p2: self.p2(),
            data: self.data().map(Bytes::copy_from_slice),
            le: self.expected_length(),
        }
    }
}

/// Generic APDU command structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    /// Command data (optional)
    pub data: Option<Bytes>,
    /// Expected length (optional)
    pub le: Option<u8>,
}

impl Command {
    /// Create a new command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
        }
    }

    /// Create a new command with data
    pub fn new_with_data(cla: u8, ins: u8, p1: u8, p2: u8, data: impl Into<Bytes>) -> Self {
        Self::new(cla, ins, p1, p2).with_data(data)
    }

    /// Set the data field; an empty buffer removes it
    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        self.data = (!data.is_empty()).then_some(data);
        self
    }

    /// Set the expected response length
    pub const fn with_le(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Replace the class byte
    pub const fn with_class(mut self, cla: u8) -> Self {
        self.cla = cla;
        self
    }

    /// Length of the data field
    pub fn data_len(&self) -> usize {
        self.data.as_ref().map_or(0, Bytes::len)
    }

    /// Ensure the command can be encoded as a short APDU
    pub fn validate(&self) -> Result<()> {
        match self.data_len() {
            len if len > MAX_SHORT_DATA => Err(Error::InvalidCommandLength(len)),
            _ => Ok(()),
        }
    }

    /// Parse a command from raw bytes (short APDU cases 1 to 4)
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let (header, body) = match data {
            [cla, ins, p1, p2, rest @ ..] => (Self::new(*cla, *ins, *p1, *p2), rest),
            _ => return Err(Error::Parse("Command shorter than header")),
        };

        match body {
            // Case 1
            [] => Ok(header),
            // Case 2
            [le] => Ok(header.with_le(*le)),
            [lc, rest @ ..] => {
                let lc = usize::from(*lc);
                if lc == 0 {
                    return Err(Error::Parse("Zero Lc with trailing bytes"));
                }
                match rest.len().checked_sub(lc) {
                    // Case 3
                    Some(0) => Ok(header.with_data(Bytes::copy_from_slice(rest))),
                    // Case 4
                    Some(1) => Ok(header
                        .with_data(Bytes::copy_from_slice(&rest[..lc]))
                        .with_le(rest[lc])),
                    _ => Err(Error::Parse("Lc inconsistent with command length")),
                }
            }
        }
    }
}

impl ApduCommand for Command {
    fn class(&self) -> u8 {
        self.cla
    }

    fn instruction(&self) -> u8 {
        self.ins
    }

    fn p1(&self) -> u8 {
        self.p1
    }

    fn p2(&self) -> u8 {
        self.p2
    }

    fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    fn expected_length(&self) -> Option<u8> {
        self.le
    }

    fn to_command(&self) -> Command {
        self.clone()
    }
}
