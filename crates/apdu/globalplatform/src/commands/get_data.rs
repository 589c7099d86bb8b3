//! GET DATA command for GlobalPlatform

use gpcard_apdu_core::Command;

use crate::constants::{cla, get_data, ins};

gp_command! {
    /// GET DATA command for a two byte data object tag
    GetDataCommand
}

impl GetDataCommand {
    /// Create a GET DATA command for `tag` (P1P2)
    pub const fn with_tag(tag: u16) -> Self {
        let [p1, p2] = tag.to_be_bytes();
        Self(Command::new(cla::GP, ins::GET_DATA, p1, p2).with_le(0))
    }

    /// Card Production Life Cycle data
    pub const fn cplc() -> Self {
        Self::with_tag(get_data::CPLC)
    }

    /// Key Information Template
    pub const fn key_info_template() -> Self {
        Self::with_tag(get_data::KEY_INFO_TEMPLATE)
    }

    /// Card Data
    pub const fn card_data() -> Self {
        Self::with_tag(get_data::CARD_DATA)
    }
}
