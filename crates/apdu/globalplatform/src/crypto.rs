//! Cryptographic operations for the GlobalPlatform secure channel protocols
//!
//! GP-specific constructions (padding, MACs, key derivation, key check
//! values) built on top of the RustCrypto block ciphers. Keys are passed as
//! raw secrets; triple DES accepts 8, 16 or 24 byte secrets and AES accepts
//! 16 byte secrets.

use aes::Aes128;
use cbc_mac::{CbcMac, Mac};
use cipher::{
    BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit,
    block_padding::{Iso7816, RawPadding},
    generic_array::GenericArray,
};
use cmac::Cmac;
use des::{Des, TdesEde3};

use crate::{Error, Result};

/// DES block (and MAC) size
pub const DES_BLOCK_SIZE: usize = 8;

/// AES block size
pub const AES_BLOCK_SIZE: usize = 16;

/// An 8 byte MAC, cryptogram or chaining value
pub type Block8 = [u8; DES_BLOCK_SIZE];

/// A 16 byte AES block
pub type Block16 = [u8; AES_BLOCK_SIZE];

/// Apply ISO 7816-4 padding (0x80 then zeros), always adding at least one byte
pub fn pad80(data: &[u8], block_size: usize) -> Vec<u8> {
    let padded_len = (data.len() / block_size + 1) * block_size;
    let mut buffer = Vec::with_capacity(padded_len);
    buffer.extend_from_slice(data);
    buffer.resize(padded_len, 0x00);

    let last_block = padded_len - block_size;
    Iso7816::raw_pad(&mut buffer[last_block..], data.len() - last_block);
    buffer
}

/// Strip ISO 7816-4 padding
pub fn unpad80(data: &[u8]) -> Result<&[u8]> {
    Iso7816::raw_unpad(data).map_err(|_| Error::Crypto("invalid ISO 7816-4 padding"))
}

/// Expand an 8, 16 or 24 byte secret to a three-key triple DES key
///
/// A 16 byte secret is two-key triple DES: the first 8 bytes are repeated
/// as the third key.
pub fn resize_key(secret: &[u8]) -> Result<cipher::Key<TdesEde3>> {
    let mut key = cipher::Key::<TdesEde3>::default();
    match secret.len() {
        8 => key.chunks_mut(8).for_each(|chunk| chunk.copy_from_slice(secret)),
        16 => {
            key[..16].copy_from_slice(secret);
            key[16..].copy_from_slice(&secret[..8]);
        }
        24 => key.copy_from_slice(secret),
        _ => return Err(Error::Crypto("triple DES key must be 8, 16 or 24 bytes")),
    }
    Ok(key)
}

fn check_aligned(data: &[u8], block_size: usize) -> Result<()> {
    if data.len() % block_size != 0 {
        return Err(Error::Crypto("data is not block aligned"));
    }
    Ok(())
}

/// Triple DES ECB encryption of block-aligned data
pub fn des3_ecb_encrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    check_aligned(data, DES_BLOCK_SIZE)?;
    let cipher = TdesEde3::new(&resize_key(key)?);

    let mut out = data.to_vec();
    for chunk in out.chunks_exact_mut(DES_BLOCK_SIZE) {
        cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
    }
    Ok(out)
}

/// Triple DES CBC encryption of block-aligned data
pub fn des3_cbc_encrypt(key: &[u8], iv: &Block8, data: &[u8]) -> Result<Vec<u8>> {
    check_aligned(data, DES_BLOCK_SIZE)?;
    let mut encryptor =
        cbc::Encryptor::<TdesEde3>::new(&resize_key(key)?, GenericArray::from_slice(iv));

    let mut out = data.to_vec();
    for chunk in out.chunks_exact_mut(DES_BLOCK_SIZE) {
        encryptor.encrypt_block_mut(GenericArray::from_mut_slice(chunk));
    }
    Ok(out)
}

/// Full triple DES CBC-MAC with ISO padding (SCP01 MAC, SCP01/02 cryptograms)
pub fn mac_3des(key: &[u8], icv: &Block8, data: &[u8]) -> Result<Block8> {
    let encrypted = des3_cbc_encrypt(key, icv, &pad80(data, DES_BLOCK_SIZE))?;
    last_block(&encrypted)
}

/// SCP02 retail MAC: single DES CBC over all blocks but the last, triple DES on the last
pub fn mac_retail(key: &[u8], icv: &Block8, data: &[u8]) -> Result<Block8> {
    let padded = pad80(data, DES_BLOCK_SIZE);
    let des3 = TdesEde3::new(&resize_key(key)?);
    let des = Des::new_from_slice(&key[..DES_BLOCK_SIZE])
        .map_err(|_| Error::Crypto("invalid single DES key"))?;

    let (body, last) = padded.split_at(padded.len() - DES_BLOCK_SIZE);
    let mut current = GenericArray::clone_from_slice(icv);

    // Single DES chain over every block except the last one
    for chunk in body.chunks_exact(DES_BLOCK_SIZE) {
        current.iter_mut().zip(chunk).for_each(|(c, d)| *c ^= d);
        des.encrypt_block(&mut current);
    }

    current.iter_mut().zip(last).for_each(|(c, d)| *c ^= d);
    des3.encrypt_block(&mut current);

    Ok(current.into())
}

/// Encrypt an SCP02 initial chaining vector with single DES under the MAC key
pub fn encrypt_icv_des(mac_key: &[u8], icv: &Block8) -> Result<Block8> {
    let key = mac_key
        .get(..DES_BLOCK_SIZE)
        .ok_or(Error::Crypto("MAC key too short"))?;
    let mut mac = <CbcMac<Des> as Mac>::new_from_slice(key)
        .map_err(|_| Error::Crypto("invalid single DES key"))?;
    mac.update(icv);
    Ok(mac.finalize().into_bytes().into())
}

/// Encrypt an SCP01 initial chaining vector with triple DES under the MAC key
pub fn encrypt_icv_3des(mac_key: &[u8], icv: &Block8) -> Result<Block8> {
    last_block(&des3_ecb_encrypt(mac_key, icv)?)
}

/// Derive an SCP02 session key: 3DES-CBC with zero IV over `tag || seq || 00*12`
pub fn derive_scp02_key(key: &[u8], tag: &[u8; 2], sequence: &[u8; 2]) -> Result<Block16> {
    let mut derivation = [0u8; 16];
    derivation[0..2].copy_from_slice(tag);
    derivation[2..4].copy_from_slice(sequence);

    let encrypted = des3_cbc_encrypt(key, &Block8::default(), &derivation)?;
    let mut result = Block16::default();
    result.copy_from_slice(&encrypted);
    Ok(result)
}

/// SCP01/02 cryptogram: 3DES CBC-MAC with zero IV over `first || second`
pub fn calculate_cryptogram(enc_key: &[u8], first: &[u8], second: &[u8]) -> Result<Block8> {
    let mut data = Vec::with_capacity(first.len() + second.len());
    data.extend_from_slice(first);
    data.extend_from_slice(second);
    mac_3des(enc_key, &Block8::default(), &data)
}

fn aes_cipher(key: &[u8]) -> Result<Aes128> {
    Aes128::new_from_slice(key).map_err(|_| Error::Crypto("AES key must be 16 bytes"))
}

/// AES encryption of a single block
pub fn aes_encrypt_block(key: &[u8], block: &Block16) -> Result<Block16> {
    let mut out = GenericArray::clone_from_slice(block);
    aes_cipher(key)?.encrypt_block(&mut out);
    Ok(out.into())
}

/// AES CBC encryption of block-aligned data
pub fn aes_cbc_encrypt(key: &[u8], iv: &Block16, data: &[u8]) -> Result<Vec<u8>> {
    check_aligned(data, AES_BLOCK_SIZE)?;
    let mut encryptor = cbc::Encryptor::<Aes128>::new_from_slices(key, iv)
        .map_err(|_| Error::Crypto("AES key must be 16 bytes"))?;

    let mut out = data.to_vec();
    for chunk in out.chunks_exact_mut(AES_BLOCK_SIZE) {
        encryptor.encrypt_block_mut(GenericArray::from_mut_slice(chunk));
    }
    Ok(out)
}

/// AES CBC decryption of block-aligned data
pub fn aes_cbc_decrypt(key: &[u8], iv: &Block16, data: &[u8]) -> Result<Vec<u8>> {
    check_aligned(data, AES_BLOCK_SIZE)?;
    let mut decryptor = cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
        .map_err(|_| Error::Crypto("AES key must be 16 bytes"))?;

    let mut out = data.to_vec();
    for chunk in out.chunks_exact_mut(AES_BLOCK_SIZE) {
        decryptor.decrypt_block_mut(GenericArray::from_mut_slice(chunk));
    }
    Ok(out)
}

/// AES-CMAC
pub fn aes_cmac(key: &[u8], data: &[u8]) -> Result<Block16> {
    let mut mac = <Cmac<Aes128> as Mac>::new_from_slice(key)
        .map_err(|_| Error::Crypto("AES key must be 16 bytes"))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

/// SCP03 key derivation: NIST SP 800-108 counter mode with AES-CMAC
///
/// Each block is `CMAC(key, 00*11 || constant || 00 || L || i || context)`
/// with `L` the output length in bits (big endian) and `i` the block counter
/// starting at 1.
pub fn scp03_kdf(key: &[u8], constant: u8, context: &[u8], bits: u16) -> Result<Vec<u8>> {
    let length = usize::from(bits / 8);
    let blocks = length.div_ceil(AES_BLOCK_SIZE);

    let mut input = Vec::with_capacity(16 + context.len());
    input.extend_from_slice(&[0u8; 11]);
    input.push(constant);
    input.push(0x00);
    input.extend_from_slice(&bits.to_be_bytes());
    input.push(0x00);
    input.extend_from_slice(context);

    let mut out = Vec::with_capacity(blocks * AES_BLOCK_SIZE);
    for counter in 1..=blocks {
        input[15] = counter as u8;
        out.extend_from_slice(&aes_cmac(key, &input)?);
    }
    out.truncate(length);
    Ok(out)
}

/// Key check value of a triple DES key: first 3 bytes of 3DES(key, 00*8)
pub fn kcv_des3(key: &[u8]) -> Result<[u8; 3]> {
    let encrypted = des3_ecb_encrypt(key, &[0u8; DES_BLOCK_SIZE])?;
    Ok([encrypted[0], encrypted[1], encrypted[2]])
}

/// Key check value of an AES key: first 3 bytes of AES(key, 01*16)
pub fn kcv_aes(key: &[u8]) -> Result<[u8; 3]> {
    let encrypted = aes_encrypt_block(key, &[0x01; AES_BLOCK_SIZE])?;
    Ok([encrypted[0], encrypted[1], encrypted[2]])
}

/// Compare two byte strings without an early exit on the first mismatch
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn last_block(data: &[u8]) -> Result<Block8> {
    data.len()
        .checked_sub(DES_BLOCK_SIZE)
        .and_then(|start| data[start..].try_into().ok())
        .ok_or(Error::Crypto("empty cipher output"))
}
