//! SELECT command for GlobalPlatform
//!
//! This command is used to select an application or security domain by its AID.

use gpcard_apdu_core::Command;

use crate::constants::{cla, ins, select_p1};

gp_command! {
    /// SELECT command for GlobalPlatform
    SelectCommand
}

impl SelectCommand {
    /// Create a SELECT by name command for an AID
    pub fn with_aid(aid: impl Into<bytes::Bytes>) -> Self {
        Self::new_with_params(select_p1::BY_NAME, 0x00, aid)
    }

    /// Create a SELECT command with specific P1, P2 and AID
    pub fn new_with_params(p1: u8, p2: u8, aid: impl Into<bytes::Bytes>) -> Self {
        Self(Command::new_with_data(cla::ISO7816, ins::SELECT, p1, p2, aid).with_le(0x00))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpcard_apdu_core::ApduCommand;
    use hex_literal::hex;

    #[test]
    fn test_select_command() {
        let cmd = SelectCommand::with_aid(hex!("A0000000030000").to_vec());

        assert_eq!(cmd.class(), cla::ISO7816);
        assert_eq!(cmd.instruction(), ins::SELECT);
        assert_eq!(cmd.p1(), select_p1::BY_NAME);
        assert_eq!(cmd.to_bytes().as_ref(), hex!("00A4040007A000000003000000"));
    }

    #[test]
    fn test_select_default() {
        // Empty AID selects the default application
        let cmd = SelectCommand::with_aid(Vec::new());
        assert_eq!(cmd.to_bytes().as_ref(), hex!("00A4040000"));
    }
}
