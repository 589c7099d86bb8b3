//! PUT KEY command for GlobalPlatform
//!
//! This command adds or replaces keys of the security domain. The key data
//! is already encrypted under the session KEK when it reaches this builder.

use bytes::{BufMut, BytesMut};
use gpcard_apdu_core::Command;

use crate::{
    Error, Result,
    constants::{cla, ins, put_key},
    crypto::{self, Block16},
    keys::{Key, KeyCipher},
};

gp_command! {
    /// PUT KEY command for GlobalPlatform
    PutKeyCommand
}

impl PutKeyCommand {
    /// Create a PUT KEY command
    ///
    /// `key_version` is the version being replaced (0 adds a new version),
    /// `key_id` the first key id of the block.
    pub fn new(
        key_id: u8,
        key_version: u8,
        key_data: impl Into<bytes::Bytes>,
        more_commands: bool,
        multiple_keys: bool,
    ) -> Self {
        let p1 = key_version | if more_commands { put_key::MORE_COMMANDS } else { 0 };
        let p2 = key_id | if multiple_keys { put_key::MULTIPLE_KEYS } else { 0 };
        Self(Command::new_with_data(cla::GP, ins::PUT_KEY, p1, p2, key_data).with_le(0))
    }

    /// Replace (or add, with `replaced_version` 0) a group of keys in one command
    ///
    /// Keys are sent in the given order, each encrypted under `kek`.
    pub fn with_keys(replaced_version: u8, new_version: u8, keys: &[&Key], kek: &Key) -> Result<Self> {
        let first = keys
            .first()
            .ok_or_else(|| Error::configuration("PUT KEY without keys"))?;

        let mut data = BytesMut::new();
        data.put_u8(new_version);
        for key in keys {
            data.put_slice(&encode_key(key, kek)?);
        }

        Ok(Self::new(first.id(), replaced_version, data.freeze(), false, keys.len() > 1))
    }
}

/// Encode one key component block: type, length, encrypted key and its check value
pub fn encode_key(key: &Key, kek: &Key) -> Result<Vec<u8>> {
    let mut block = Vec::with_capacity(3 + key.len() + 4);
    match (key.cipher(), kek.cipher()) {
        (KeyCipher::Aes | KeyCipher::Generic, KeyCipher::Aes)
        | (KeyCipher::Aes, KeyCipher::Generic) => {
            let encrypted = crypto::aes_cbc_encrypt(kek.secret(), &Block16::default(), key.secret())?;
            block.push(put_key::KEY_TYPE_AES);
            block.push(encrypted.len() as u8 + 1);
            block.push(key.len() as u8);
            block.extend_from_slice(&encrypted);
            block.push(put_key::KCV_LENGTH);
            block.extend_from_slice(&crypto::kcv_aes(key.secret())?);
        }
        (KeyCipher::Aes, _) => {
            return Err(Error::unsupported(format!(
                "AES key {:#04x} under a {} key encryption key",
                key.id(),
                kek.cipher()
            )));
        }
        (_, KeyCipher::Aes) => {
            return Err(Error::unsupported(format!(
                "{} key {:#04x} under an AES key encryption key",
                key.cipher(),
                key.id()
            )));
        }
        _ => {
            let encrypted = crypto::des3_ecb_encrypt(kek.secret(), key.secret())?;
            block.push(put_key::KEY_TYPE_DES3);
            block.push(encrypted.len() as u8);
            block.extend_from_slice(&encrypted);
            block.push(put_key::KCV_LENGTH);
            block.extend_from_slice(&crypto::kcv_des3(key.secret())?);
        }
    }
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{DEFAULT_TEST_KEY, KeyUsage};
    use gpcard_apdu_core::ApduCommand;
    use hex_literal::hex;

    #[test]
    fn test_put_key_command() {
        let cmd = PutKeyCommand::new(0x01, 0x00, hex!("4F07A0000001510000").to_vec(), false, false);

        assert_eq!(cmd.class(), cla::GP);
        assert_eq!(cmd.instruction(), ins::PUT_KEY);
        assert_eq!(cmd.to_bytes().as_ref(), hex!("80D80001094F07A000000151000000"));
    }

    #[test]
    fn test_encode_des3_key() {
        let kek = Key::new(3, KeyUsage::Kek, KeyCipher::Des3, hex!("bff2832f9ab9db03ad37b4e7e141c507")).unwrap();
        let key = Key::new(1, KeyUsage::Enc, KeyCipher::Des3, hex!("000102030405060708090a0b0c0d0e0f")).unwrap();

        assert_eq!(
            encode_key(&key, &kek).unwrap(),
            hex!("8010d5ad544ed8ab4cadb00c8717fb051a1903ddada1")
        );
    }

    #[test]
    fn test_encode_aes_key() {
        let kek = Key::new(3, KeyUsage::Kek, KeyCipher::Aes, DEFAULT_TEST_KEY).unwrap();
        let key = Key::new(1, KeyUsage::Enc, KeyCipher::Aes, hex!("000102030405060708090a0b0c0d0e0f")).unwrap();

        assert_eq!(
            encode_key(&key, &kek).unwrap(),
            hex!("8811103d0fa4b855d2a5aa4954b8b5df582a3a03c35280")
        );
    }

    #[test]
    fn test_encode_mixed_ciphers_unsupported() {
        let des_kek = Key::new(3, KeyUsage::Kek, KeyCipher::Des3, hex!("bff2832f9ab9db03ad37b4e7e141c507")).unwrap();
        let aes_key = Key::new(1, KeyUsage::Enc, KeyCipher::Aes, DEFAULT_TEST_KEY).unwrap();
        assert!(matches!(
            encode_key(&aes_key, &des_kek),
            Err(Error::Unsupported(_))
        ));

        // An untyped KEK takes the candidate's cipher
        let generic_kek = Key::new(3, KeyUsage::Kek, KeyCipher::Generic, DEFAULT_TEST_KEY).unwrap();
        assert_eq!(
            encode_key(&aes_key, &generic_kek).unwrap()[0],
            put_key::KEY_TYPE_AES
        );

        let aes_kek = Key::new(3, KeyUsage::Kek, KeyCipher::Aes, DEFAULT_TEST_KEY).unwrap();
        let des_key = Key::new(1, KeyUsage::Enc, KeyCipher::Des3, DEFAULT_TEST_KEY).unwrap();
        assert!(matches!(
            encode_key(&des_key, &aes_kek),
            Err(Error::Unsupported(_))
        ));
        assert!(matches!(
            PutKeyCommand::with_keys(0x00, 0x21, &[&aes_key], &des_kek),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_with_keys() {
        let kek = Key::new(0, KeyUsage::Kek, KeyCipher::Des3, DEFAULT_TEST_KEY).unwrap();
        let enc = Key::new(1, KeyUsage::Enc, KeyCipher::Des3, hex!("000102030405060708090a0b0c0d0e0f")).unwrap();
        let mac = Key::new(2, KeyUsage::Mac, KeyCipher::Des3, hex!("000102030405060708090a0b0c0d0e0f")).unwrap();

        let cmd = PutKeyCommand::with_keys(0x01, 0x02, &[&enc, &mac], &kek).unwrap();
        assert_eq!(cmd.p1(), 0x01);
        assert_eq!(cmd.p2(), 0x81);
        let block = hex!("8010f1d75e4f0d37c22cb8d54e6253bb40b103ddada1");
        let mut expected = vec![0x02];
        expected.extend_from_slice(&block);
        expected.extend_from_slice(&block);
        assert_eq!(cmd.data(), Some(expected.as_slice()));

        assert!(matches!(
            PutKeyCommand::with_keys(0x01, 0x02, &[], &kek),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_put_key_flags() {
        let cmd = PutKeyCommand::new(0x01, 0x20, hex!("21").to_vec(), true, true);
        assert_eq!(cmd.p1(), 0xA0);
        assert_eq!(cmd.p2(), 0x81);
    }
}
