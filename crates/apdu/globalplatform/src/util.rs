//! Common utilities for GlobalPlatform operations

pub mod tlv {
    use bytes::{BufMut, BytesMut};
    use iso7816_tlv::{ber, simple};

    use crate::{Error, Result};

    /// Encode a one byte tag TLV with a short length
    pub fn simple(tag: u8, value: &[u8]) -> Result<Vec<u8>> {
        let tlv = simple::Tlv::new(simple::Tag::try_from(tag)?, value.to_vec())?;
        Ok(tlv.to_vec())
    }

    /// Append a length-prefixed (LV) field, failing above 255 bytes
    pub fn put_lv(buffer: &mut BytesMut, value: &[u8]) -> Result<()> {
        let len = u8::try_from(value.len())
            .map_err(|_| Error::protocol(format!("field of {} bytes does not fit an LV", value.len())))?;
        buffer.put_u8(len);
        buffer.put_slice(value);
        Ok(())
    }

    /// Encode a BER length field
    pub fn encode_length(length: usize) -> Vec<u8> {
        match length {
            0..=0x7F => vec![length as u8],
            0x80..=0xFF => vec![0x81, length as u8],
            0x100..=0xFFFF => vec![0x82, (length >> 8) as u8, length as u8],
            _ => vec![0x83, (length >> 16) as u8, (length >> 8) as u8, length as u8],
        }
    }

    /// Parse consecutive BER-TLVs, failing on trailing garbage
    pub fn parse_ber(mut data: &[u8]) -> Result<Vec<ber::Tlv>> {
        let mut tlvs = Vec::new();
        while !data.is_empty() {
            let (tlv, remaining) = ber::Tlv::parse(data);
            tlvs.push(tlv?);
            data = remaining;
        }
        Ok(tlvs)
    }

    /// Check a BER tag against its encoded bytes
    pub fn has_tag(tlv: &ber::Tlv, tag: &[u8]) -> bool {
        tlv.tag().to_bytes() == tag
    }

    /// Primitive value of a TLV, `None` for constructed ones
    pub fn primitive(tlv: &ber::Tlv) -> Option<&[u8]> {
        match tlv.value() {
            ber::Value::Primitive(bytes) => Some(bytes),
            ber::Value::Constructed(_) => None,
        }
    }

    /// Children of a constructed TLV, empty for primitive ones
    pub fn children(tlv: &ber::Tlv) -> &[ber::Tlv] {
        match tlv.value() {
            ber::Value::Constructed(tlvs) => tlvs,
            ber::Value::Primitive(_) => &[],
        }
    }
}
