//! Card Production Life Cycle data (GET DATA `9F7F`)

use std::fmt;

use crate::{Error, Result};

/// Length of the CPLC value
pub const CPLC_LENGTH: usize = 42;

/// Parsed CPLC data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cplc {
    /// IC fabricator
    pub ic_fabricator: [u8; 2],
    /// IC type
    pub ic_type: [u8; 2],
    /// Operating system identifier
    pub os_id: [u8; 2],
    /// Operating system release date
    pub os_release_date: [u8; 2],
    /// Operating system release level
    pub os_release_level: [u8; 2],
    /// IC fabrication date
    pub ic_fabrication_date: [u8; 2],
    /// IC serial number
    pub ic_serial_number: [u8; 4],
    /// IC batch identifier
    pub ic_batch_id: [u8; 2],
    /// IC module fabricator
    pub ic_module_fabricator: [u8; 2],
    /// IC module packaging date
    pub ic_module_packaging_date: [u8; 2],
    /// ICC manufacturer
    pub icc_manufacturer: [u8; 2],
    /// IC embedding date
    pub ic_embedding_date: [u8; 2],
    /// IC pre-personalizer
    pub ic_pre_personalizer: [u8; 2],
    /// IC pre-personalization date
    pub ic_pre_personalization_date: [u8; 2],
    /// IC pre-personalization equipment identifier
    pub ic_pre_personalization_equipment: [u8; 4],
    /// IC personalizer
    pub ic_personalizer: [u8; 2],
    /// IC personalization date
    pub ic_personalization_date: [u8; 2],
    /// IC personalization equipment identifier
    pub ic_personalization_equipment: [u8; 4],
}

impl Cplc {
    /// Parse GET DATA `9F7F` response data, with or without its `9F7F 2A` header
    pub fn parse(data: &[u8]) -> Result<Self> {
        let value = match data {
            [0x9F, 0x7F, len, rest @ ..] if data.len() != CPLC_LENGTH => {
                if *len as usize != rest.len() {
                    return Err(Error::protocol(format!(
                        "CPLC header announces {len} bytes, {} present",
                        rest.len()
                    )));
                }
                rest
            }
            _ => data,
        };
        if value.len() != CPLC_LENGTH {
            return Err(Error::protocol(format!("CPLC of {} bytes", value.len())));
        }

        let mut offset = 0;
        Ok(Self {
            ic_fabricator: take(value, &mut offset),
            ic_type: take(value, &mut offset),
            os_id: take(value, &mut offset),
            os_release_date: take(value, &mut offset),
            os_release_level: take(value, &mut offset),
            ic_fabrication_date: take(value, &mut offset),
            ic_serial_number: take(value, &mut offset),
            ic_batch_id: take(value, &mut offset),
            ic_module_fabricator: take(value, &mut offset),
            ic_module_packaging_date: take(value, &mut offset),
            icc_manufacturer: take(value, &mut offset),
            ic_embedding_date: take(value, &mut offset),
            ic_pre_personalizer: take(value, &mut offset),
            ic_pre_personalization_date: take(value, &mut offset),
            ic_pre_personalization_equipment: take(value, &mut offset),
            ic_personalizer: take(value, &mut offset),
            ic_personalization_date: take(value, &mut offset),
            ic_personalization_equipment: take(value, &mut offset),
        })
    }
}

fn take<const N: usize>(value: &[u8], offset: &mut usize) -> [u8; N] {
    let mut field = [0u8; N];
    field.copy_from_slice(&value[*offset..*offset + N]);
    *offset += N;
    field
}

impl fmt::Display for Cplc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IC fabricator {}, IC type {}, OS {} (release {}), IC serial {}",
            hex::encode_upper(self.ic_fabricator),
            hex::encode_upper(self.ic_type),
            hex::encode_upper(self.os_id),
            hex::encode_upper(self.os_release_level),
            hex::encode_upper(self.ic_serial_number),
        )
    }
}
