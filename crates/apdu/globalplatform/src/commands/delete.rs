//! DELETE command for GlobalPlatform
//!
//! This command is used to delete applications, packages, and other objects.

use gpcard_apdu_core::Command;

use crate::{
    Result,
    constants::{cla, delete_p2, ins, tags},
    util::tlv,
};

gp_command! {
    /// DELETE command for GlobalPlatform
    DeleteCommand
}

impl DeleteCommand {
    /// Create a DELETE command for an AID with the given P2
    pub fn with_aid(aid: impl AsRef<[u8]>, p2: u8) -> Result<Self> {
        let data = tlv::simple(tags::AID, aid.as_ref())?;
        Ok(Self(
            Command::new_with_data(cla::GP, ins::DELETE, 0x00, p2, data).with_le(0),
        ))
    }

    /// Create a DELETE command for an object
    pub fn delete_object(aid: impl AsRef<[u8]>) -> Result<Self> {
        Self::with_aid(aid, delete_p2::OBJECT)
    }

    /// Create a DELETE command for an object and related objects
    pub fn delete_object_and_related(aid: impl AsRef<[u8]>) -> Result<Self> {
        Self::with_aid(aid, delete_p2::OBJECT_AND_RELATED)
    }
}
