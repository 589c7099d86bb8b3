//! Secure channel handshakes and key management through the card manager

mod common;

use common::{OK, SCP02_HOST_CHALLENGE, SCP02_INIT_RESPONSE, scp02_card, scp03_card, sent};
use gpcard_apdu_core::ScriptedTransport;
use gpcard_globalplatform::{
    ChannelState, Error, GlobalPlatform, Key, KeyCipher, KeySet, KeyUsage, RegistryFormat,
    RegistrySubset, ScpVersion, SecureChannelConfig, SecurityLevel, keys::DEFAULT_TEST_KEY,
};
use hex_literal::hex;

#[test]
fn test_scp02_handshake() {
    let mut gp = scp02_card(&[]);
    assert!(gp.is_established());

    let session = gp.channel().session().unwrap();
    assert_eq!(session.version(), ScpVersion::Scp02);
    assert_eq!(session.security_level(), SecurityLevel::MAC);
    assert_eq!(session.key_version(), 0x20);

    let sent = sent(&mut gp);
    assert_eq!(sent[0], hex!("8050000008f0467f908e5ca23f00"));
    assert_eq!(sent[1], hex!("84820100103ce060483aace927a3cda954b0e88839"));
}

#[test]
fn test_master_key_with_id_opens_channel() {
    common::init_tracing();
    let keys = KeySet::new("master", 0)
        .with_key(Key::new(1, KeyUsage::Master, KeyCipher::Des3, DEFAULT_TEST_KEY).unwrap())
        .unwrap();
    let transport = ScriptedTransport::new([SCP02_INIT_RESPONSE.to_vec(), OK.to_vec()]);
    let mut gp = GlobalPlatform::new(transport, keys, SecureChannelConfig::default());

    gp.open_secure_channel_with_challenge(SCP02_HOST_CHALLENGE)
        .unwrap();
    assert!(gp.is_established());
    assert_eq!(
        sent(&mut gp)[1],
        hex!("84820100103ce060483aace927a3cda954b0e88839")
    );
}

#[test]
fn test_scp03_full_security() {
    let mut gp = scp03_card(&[&hex!(
        "31c0997bb3ddede04f065819d1a72315ee8f9df0d32e6796cc59f8d23d31d588446b2ea49fcd2fab9000"
    )]);
    let session = gp.channel().session().unwrap();
    assert_eq!(session.version(), ScpVersion::Scp03);
    assert_eq!(session.security_level(), SecurityLevel::FULL);

    let entries = gp
        .get_status(RegistrySubset::Applications, RegistryFormat::Tlv)
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].aid, hex!("A000000151000000"));
    assert_eq!(entries[0].privileges, hex!("9E"));

    let sent = sent(&mut gp);
    assert_eq!(sent[0], hex!("8050300008010203040506070800"));
    assert_eq!(sent[1], hex!("848233001000b11d00f75c456b51db83815e37a95d"));
    assert_eq!(
        sent[2],
        hex!("84f24002188dbef710a5c9c7e42cefec3e1c02ec41737e462adfccd31300")
    );
}

#[test]
fn test_tampered_response_closes_channel() {
    let mut gp = scp03_card(&[&hex!(
        "31c0997bb3ddede04f065819d1a72315ee8f9df0d32e6796cc59f8d23d31d588446b2ea49fcd2fac9000"
    )]);

    let err = gp
        .get_status(RegistrySubset::Applications, RegistryFormat::Tlv)
        .unwrap_err();
    assert!(matches!(err, Error::Security(_)));
    assert_eq!(gp.channel().state(), ChannelState::Closed);

    // Nothing more goes out once the channel is closed
    assert!(gp.delete(&hex!("A000000001"), false).is_err());
    assert_eq!(gp.transport_mut().sent().len(), 3);
}

#[test]
fn test_operations_without_channel() {
    common::init_tracing();
    let mut gp = GlobalPlatform::with_default_keys(ScriptedTransport::new(Vec::<Vec<u8>>::new()));

    assert!(matches!(
        gp.get_status(RegistrySubset::Applications, RegistryFormat::Tlv),
        Err(Error::Transport(gpcard_apdu_core::Error::SecureChannelNotEstablished))
    ));
    assert!(gp.transport_mut().sent().is_empty());
}

#[test]
fn test_reset_allows_new_session() {
    let mut gp = scp02_card(&[]);
    gp.reset().unwrap();
    assert_eq!(gp.channel().state(), ChannelState::Idle);
    assert_eq!(gp.transport_mut().resets(), 1);

    gp.transport_mut().push_response(SCP02_INIT_RESPONSE.to_vec());
    gp.transport_mut().push_response(OK.to_vec());
    gp.open_secure_channel_with_challenge(SCP02_HOST_CHALLENGE)
        .unwrap();
    assert!(gp.is_established());
}

fn replacement_keys() -> KeySet {
    let secret = hex!("000102030405060708090a0b0c0d0e0f");
    KeySet::new("replacement", 0x21)
        .with_key(Key::new(1, KeyUsage::Enc, KeyCipher::Des3, secret).unwrap())
        .unwrap()
        .with_key(Key::new(2, KeyUsage::Mac, KeyCipher::Des3, secret).unwrap())
        .unwrap()
        .with_key(Key::new(3, KeyUsage::Kek, KeyCipher::Des3, secret).unwrap())
        .unwrap()
}

#[test]
fn test_replace_keys() {
    let mut gp = scp02_card(&[
        &hex!("E012C00401208010C00402208010C004032080109000"),
        &OK,
    ]);

    gp.replace_keys(&replacement_keys(), 0x20).unwrap();

    let sent = sent(&mut gp);
    assert_eq!(&sent[2][..5], hex!("84CA00E008"));

    // Three keys encrypted under the session DEK
    let put_key = &sent[3];
    assert_eq!(&put_key[..5], hex!("84D820814B"));
    assert_eq!(put_key[5], 0x21);
    let block = hex!("8010d5ad544ed8ab4cadb00c8717fb051a1903ddada1");
    assert_eq!(&put_key[6..28], block);
    assert_eq!(&put_key[28..50], block);
    assert_eq!(&put_key[50..72], block);
}

#[test]
fn test_replace_keys_rejected_by_template() {
    // Card slots hold AES keys
    let mut gp = scp02_card(&[&hex!("E012C00401208810C00402208810C004032088109000")]);

    let err = gp.replace_keys(&replacement_keys(), 0x20).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
    // GET DATA only, no PUT KEY
    assert_eq!(gp.transport_mut().sent().len(), 3);
}

#[test]
fn test_replace_keys_without_template() {
    let mut gp = scp02_card(&[&hex!("6A88")]);

    let err = gp.replace_keys(&replacement_keys(), 0x00).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
    // GET DATA only, no key material sent
    assert_eq!(gp.transport_mut().sent().len(), 3);
}

#[test]
fn test_replace_keys_unchecked() {
    let mut gp = scp02_card(&[&OK]);

    gp.replace_keys_unchecked(&replacement_keys(), 0x00).unwrap();
    let sent = sent(&mut gp);
    assert_eq!(sent.len(), 3);
    assert_eq!(&sent[2][..4], hex!("84D80081"));
}

#[test]
fn test_replace_aes_keys_over_scp02() {
    let mut gp = scp02_card(&[]);
    let aes = KeySet::new("aes", 0x30)
        .with_key(Key::new(1, KeyUsage::Enc, KeyCipher::Aes, [0x11; 16]).unwrap())
        .unwrap();

    // The SCP02 session DEK cannot wrap AES keys
    let err = gp.replace_keys_unchecked(&aes, 0x00).unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)));
    assert_eq!(gp.transport_mut().sent().len(), 2);
}

#[test]
fn test_replace_keys_needs_version() {
    let mut gp = scp02_card(&[]);
    let keys = KeySet::new("unversioned", 0)
        .with_key(Key::new(1, KeyUsage::Enc, KeyCipher::Des3, [0x11; 16]).unwrap())
        .unwrap();

    assert!(matches!(
        gp.replace_keys(&keys, 0x20),
        Err(Error::Configuration(_))
    ));
}
