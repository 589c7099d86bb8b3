//! STORE DATA command for GlobalPlatform
//!
//! This command transfers personalization data to the selected security
//! domain, split in numbered blocks.

use gpcard_apdu_core::Command;

use crate::constants::{cla, ins, store_data_p1};

gp_command! {
    /// STORE DATA command for GlobalPlatform
    StoreDataCommand
}

impl StoreDataCommand {
    /// Create a STORE DATA command with P1, block number and data
    pub fn new_with_data(p1: u8, block_number: u8, data: impl Into<bytes::Bytes>) -> Self {
        Self(Command::new_with_data(cla::GP, ins::STORE_DATA, p1, block_number, data))
    }

    /// Create a STORE DATA command for a block followed by more blocks
    pub fn more_blocks(block_number: u8, data: impl Into<bytes::Bytes>) -> Self {
        Self::new_with_data(store_data_p1::MORE_BLOCKS, block_number, data)
    }

    /// Create a STORE DATA command for the last block
    pub fn last_block(block_number: u8, data: impl Into<bytes::Bytes>) -> Self {
        Self::new_with_data(store_data_p1::LAST_BLOCK, block_number, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpcard_apdu_core::ApduCommand;
    use hex_literal::hex;

    #[test]
    fn test_store_data_command() {
        let cmd = StoreDataCommand::more_blocks(0, hex!("8401FE0102").to_vec());

        assert_eq!(cmd.class(), cla::GP);
        assert_eq!(cmd.instruction(), ins::STORE_DATA);
        assert_eq!(cmd.p1(), store_data_p1::MORE_BLOCKS);
        assert_eq!(cmd.p2(), 0);
        assert_eq!(cmd.to_bytes().as_ref(), hex!("80E20000058401FE0102"));
    }

    #[test]
    fn test_store_data_last_block() {
        let cmd = StoreDataCommand::last_block(1, hex!("8402FE0304").to_vec());
        assert_eq!(cmd.to_bytes().as_ref(), hex!("80E28001058402FE0304"));
    }
}
