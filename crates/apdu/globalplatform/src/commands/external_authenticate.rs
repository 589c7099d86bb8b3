//! EXTERNAL AUTHENTICATE command for GlobalPlatform
//!
//! This command authenticates the host to the card and fixes the security
//! level of the secure channel. It is always sent with a C-MAC.

use gpcard_apdu_core::Command;

use crate::{
    constants::{cla, ins},
    crypto::Block8,
};

gp_command! {
    /// EXTERNAL AUTHENTICATE command for GlobalPlatform (before wrapping)
    ExternalAuthenticateCommand
}

impl ExternalAuthenticateCommand {
    /// Create the command carrying the host cryptogram
    pub fn with_host_cryptogram(security_level: u8, host_cryptogram: &Block8) -> Self {
        Self(Command::new_with_data(
            cla::GP,
            ins::EXTERNAL_AUTHENTICATE,
            security_level,
            0x00,
            host_cryptogram.to_vec(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::external_auth_p1;
    use gpcard_apdu_core::ApduCommand;
    use hex_literal::hex;

    #[test]
    fn test_external_authenticate_command() {
        let cmd = ExternalAuthenticateCommand::with_host_cryptogram(
            external_auth_p1::C_MAC | external_auth_p1::C_ENC,
            &hex!("3ce060483aace927"),
        );

        assert_eq!(cmd.p1(), 0x03);
        assert_eq!(cmd.expected_length(), None);
        assert_eq!(cmd.to_bytes().as_ref(), hex!("80820300083ce060483aace927"));
    }
}
