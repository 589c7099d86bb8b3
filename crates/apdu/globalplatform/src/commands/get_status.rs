//! GET STATUS command for GlobalPlatform
//!
//! This command retrieves registry entries of the issuer security domain,
//! applications and load files. Large registries are returned over several
//! responses; see [`GlobalPlatform::get_status`](crate::GlobalPlatform::get_status).

use gpcard_apdu_core::Command;

use crate::{
    Result,
    constants::{cla, get_status_p2, ins, tags},
    util::tlv,
};

gp_command! {
    /// GET STATUS command for GlobalPlatform
    GetStatusCommand
}

impl GetStatusCommand {
    /// Create a GET STATUS command with an AID filter
    pub fn with_aid_filter(p1: u8, p2: u8, aid: impl AsRef<[u8]>) -> Result<Self> {
        let data = tlv::simple(tags::AID, aid.as_ref())?;
        Ok(Self(
            Command::new_with_data(cla::GP, ins::GET_STATUS, p1, p2, data).with_le(0),
        ))
    }

    /// First page of every entry of `subset` in `format`
    pub fn first(subset: u8, format: u8) -> Self {
        Self::all(subset, format | get_status_p2::FIRST_OR_ALL)
    }

    /// Next page of every entry of `subset` in `format`
    pub fn next(subset: u8, format: u8) -> Self {
        Self::all(subset, format | get_status_p2::NEXT)
    }

    fn all(p1: u8, p2: u8) -> Self {
        let data = [tags::AID, 0x00];
        Self(Command::new_with_data(cla::GP, ins::GET_STATUS, p1, p2, data.to_vec()).with_le(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::get_status_p1;
    use gpcard_apdu_core::ApduCommand;
    use hex_literal::hex;

    #[test]
    fn test_get_status_command() {
        let cmd = GetStatusCommand::with_aid_filter(
            get_status_p1::APPLICATIONS,
            get_status_p2::TLV_DATA,
            hex!("AABBCC"),
        )
        .unwrap();

        assert_eq!(cmd.class(), cla::GP);
        assert_eq!(cmd.instruction(), ins::GET_STATUS);
        assert_eq!(cmd.data(), Some(hex!("4F03AABBCC").as_ref()));
        assert_eq!(cmd.to_bytes().as_ref(), hex!("80F2400205" "4F03AABBCC" "00"));
    }

    #[test]
    fn test_get_status_pages() {
        let first = GetStatusCommand::first(get_status_p1::APPLICATIONS, get_status_p2::TLV_DATA);
        assert_eq!(first.to_bytes().as_ref(), hex!("80F24002024F0000"));

        let next = GetStatusCommand::next(get_status_p1::APPLICATIONS, get_status_p2::TLV_DATA);
        assert_eq!(next.p2(), 0x03);
        assert_eq!(next.data(), Some(hex!("4F00").as_ref()));

        let legacy = GetStatusCommand::next(get_status_p1::EXEC_LOAD_FILES, get_status_p2::LEGACY_DATA);
        assert_eq!(legacy.p1(), 0x20);
        assert_eq!(legacy.p2(), 0x01);
    }
}
