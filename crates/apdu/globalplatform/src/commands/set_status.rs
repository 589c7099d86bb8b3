//! SET STATUS command for GlobalPlatform
//!
//! Changes the life cycle state of the card, a security domain or an
//! application. This layer sends exactly what it is asked to; transitions
//! such as locking or terminating the card are the caller's decision.

use gpcard_apdu_core::Command;

use crate::constants::{cla, ins};

gp_command! {
    /// SET STATUS command for GlobalPlatform
    SetStatusCommand
}

impl SetStatusCommand {
    /// Create a SET STATUS command; an empty AID leaves the data field out
    pub fn new(status_type: u8, state: u8, aid: impl AsRef<[u8]>) -> Self {
        Self(
            Command::new(cla::GP, ins::SET_STATUS, status_type, state)
                .with_data(aid.as_ref().to_vec()),
        )
    }
}
