//! LOAD command for GlobalPlatform
//!
//! This command is used to transfer a load file to the card, one block at a time.

use gpcard_apdu_core::Command;

use crate::constants::{cla, ins, load_p1};

gp_command! {
    /// LOAD command for GlobalPlatform
    LoadCommand
}

impl LoadCommand {
    /// Create a LOAD command with block data
    pub fn with_block_data(p1: u8, block_number: u8, data: impl Into<bytes::Bytes>) -> Self {
        Self(Command::new_with_data(cla::GP, ins::LOAD, p1, block_number, data).with_le(0))
    }

    /// Create a LOAD command for a block followed by more blocks
    pub fn more_blocks(block_number: u8, data: impl Into<bytes::Bytes>) -> Self {
        Self::with_block_data(load_p1::MORE_BLOCKS, block_number, data)
    }

    /// Create a LOAD command for the last block
    pub fn last_block(block_number: u8, data: impl Into<bytes::Bytes>) -> Self {
        Self::with_block_data(load_p1::LAST_BLOCK, block_number, data)
    }
}
