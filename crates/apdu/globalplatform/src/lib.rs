//! GlobalPlatform secure channel and card content management
//!
//! This crate opens authenticated sessions with a card's issuer security
//! domain over SCP01, SCP02 or SCP03 and manages card content through them:
//! loading and installing applets, deleting objects, changing life cycle
//! states, reading the registry and rotating keys.
//!
//! The main entry point is [`GlobalPlatform`], which owns a
//! [`GPSecureChannel`] over any [`CardTransport`](gpcard_apdu_core::CardTransport).
//! [`Session`] holds the wrapping state of an established channel and can be
//! used on its own.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod application;
pub mod commands;
pub mod constants;
pub mod cplc;
pub mod crypto;
pub mod error;
pub mod key_info;
pub mod keys;
pub mod load;
pub mod registry;
pub mod secure_channel;
pub mod session;
pub mod util;

// Re-exports
pub use application::GlobalPlatform;
pub use cplc::Cplc;
pub use error::{Error, Result};
pub use key_info::{KeyInfoEntry, KeyInfoTemplate};
pub use keys::{Diversification, Key, KeyCipher, KeySet, KeyUsage};
pub use load::{LoadFile, LoadOptions};
pub use registry::{RegistryEntry, RegistryFormat, RegistrySubset, StatusTarget};
pub use secure_channel::{ChannelState, GPSecureChannel, SecureChannelConfig};
pub use session::{ScpVersion, SecurityLevel, Session};

// Re-export from gpcard_apdu_core for convenience
pub use gpcard_apdu_core::{CardTransport, Command, Response, StatusWord};

/// Convenience functions for common operations
pub mod operations {
    use gpcard_apdu_core::CardTransport;

    use crate::{
        GlobalPlatform, KeySet, RegistryEntry, RegistryFormat, RegistrySubset, Result,
        SecureChannelConfig,
    };

    /// Select the card manager and open a secure channel with `keys`
    pub fn connect_and_setup<T: CardTransport>(
        transport: T,
        keys: KeySet,
        config: SecureChannelConfig,
    ) -> Result<GlobalPlatform<T>> {
        let mut gp = GlobalPlatform::new(transport, keys, config);
        gp.select_card_manager()?;
        gp.open_secure_channel()?;
        Ok(gp)
    }

    /// List applications and security domains
    pub fn list_applications<T: CardTransport>(
        gp: &mut GlobalPlatform<T>,
    ) -> Result<Vec<RegistryEntry>> {
        gp.get_status(RegistrySubset::Applications, RegistryFormat::Tlv)
    }

    /// List executable load files with their modules
    pub fn list_packages<T: CardTransport>(
        gp: &mut GlobalPlatform<T>,
    ) -> Result<Vec<RegistryEntry>> {
        gp.get_status(RegistrySubset::LoadFilesAndModules, RegistryFormat::Tlv)
    }

    /// Delete a load file together with every application instantiated from it
    pub fn delete_package<T: CardTransport>(gp: &mut GlobalPlatform<T>, aid: &[u8]) -> Result<()> {
        gp.delete(aid, true)
    }
}
