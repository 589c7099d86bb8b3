//! Shared fixtures for the integration tests

#![allow(dead_code, unreachable_pub)]

use gpcard_apdu_core::ScriptedTransport;
use gpcard_globalplatform::{
    GlobalPlatform, KeyCipher, KeySet, ScpVersion, SecureChannelConfig, SecurityLevel,
    crypto::Block8, keys::DEFAULT_TEST_KEY,
};
use hex_literal::hex;
use tracing_subscriber::EnvFilter;

/// SCP02 INITIALIZE UPDATE answer for the 40..4F keys, sequence counter 000D
pub const SCP02_INIT_RESPONSE: [u8; 30] =
    hex!("000002650183039536622002000de9c62ba1c4c8e55fcb91b6654ce49000");
pub const SCP02_HOST_CHALLENGE: Block8 = hex!("f0467f908e5ca23f");

/// SCP03 INITIALIZE UPDATE answer (i = 70) for the 40..4F AES keys, version 30
pub const SCP03_INIT_RESPONSE: [u8; 34] =
    hex!("000102030405060708093003701112131415161718d7c86a7d0a2d0ddc0000019000");
pub const SCP03_HOST_CHALLENGE: Block8 = hex!("0102030405060708");

pub const OK: [u8; 2] = hex!("9000");

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Card manager with an open SCP02 C-MAC channel; `responses` follow the handshake
pub fn scp02_card(responses: &[&[u8]]) -> GlobalPlatform<ScriptedTransport> {
    init_tracing();
    let mut script = vec![SCP02_INIT_RESPONSE.to_vec(), OK.to_vec()];
    script.extend(responses.iter().map(|r| r.to_vec()));

    let mut gp = GlobalPlatform::with_default_keys(ScriptedTransport::new(script));
    gp.open_secure_channel_with_challenge(SCP02_HOST_CHALLENGE)
        .expect("SCP02 handshake");
    gp
}

/// Card manager with an open SCP03 channel at full security level
pub fn scp03_card(responses: &[&[u8]]) -> GlobalPlatform<ScriptedTransport> {
    init_tracing();
    let mut script = vec![SCP03_INIT_RESPONSE.to_vec(), OK.to_vec()];
    script.extend(responses.iter().map(|r| r.to_vec()));

    let keys = KeySet::from_master("aes", 0x30, KeyCipher::Aes, DEFAULT_TEST_KEY)
        .expect("AES master key");
    let config = SecureChannelConfig::default()
        .with_scp_version(Some(ScpVersion::Scp03))
        .with_security_level(SecurityLevel::FULL);

    let mut gp = GlobalPlatform::new(ScriptedTransport::new(script), keys, config);
    gp.open_secure_channel_with_challenge(SCP03_HOST_CHALLENGE)
        .expect("SCP03 handshake");
    gp
}

/// Commands sent so far
pub fn sent(gp: &mut GlobalPlatform<ScriptedTransport>) -> Vec<Vec<u8>> {
    gp.transport_mut().sent().iter().map(|c| c.to_vec()).collect()
}
