//! INSTALL command for GlobalPlatform
//!
//! This command is used to prepare loads, create applet instances and make
//! them selectable. Every variant carries a sequence of length-prefixed fields.

use bytes::BytesMut;
use gpcard_apdu_core::Command;

use crate::{
    Result,
    constants::{cla, ins, install_p1, tags},
    util::tlv,
};

gp_command! {
    /// INSTALL command for GlobalPlatform
    InstallCommand
}

impl InstallCommand {
    /// Create an INSTALL command with P1 and prebuilt data
    pub fn with_p1_data(p1: u8, data: impl Into<bytes::Bytes>) -> Self {
        Self(Command::new_with_data(cla::GP, ins::INSTALL, p1, 0x00, data))
    }

    /// Create an INSTALL [for load] command
    ///
    /// Empty `hash`, `load_parameters` or `token` are sent as zero length fields.
    pub fn for_load(
        load_file_aid: impl AsRef<[u8]>,
        security_domain_aid: impl AsRef<[u8]>,
        hash: impl AsRef<[u8]>,
        load_parameters: impl AsRef<[u8]>,
        token: impl AsRef<[u8]>,
    ) -> Result<Self> {
        let mut data = BytesMut::new();
        for field in [
            load_file_aid.as_ref(),
            security_domain_aid.as_ref(),
            hash.as_ref(),
            load_parameters.as_ref(),
            token.as_ref(),
        ] {
            tlv::put_lv(&mut data, field)?;
        }

        Ok(Self::with_p1_data(install_p1::FOR_LOAD, data.freeze()))
    }

    /// Create an INSTALL [for install and make selectable] command
    pub fn for_install_and_make_selectable(
        executable_load_file_aid: impl AsRef<[u8]>,
        executable_module_aid: impl AsRef<[u8]>,
        application_aid: impl AsRef<[u8]>,
        privileges: impl AsRef<[u8]>,
        install_parameters: impl AsRef<[u8]>,
        install_token: impl AsRef<[u8]>,
    ) -> Result<Self> {
        let parameters = tlv::simple(tags::INSTALL_PARAMETERS, install_parameters.as_ref())?;

        let mut data = BytesMut::new();
        for field in [
            executable_load_file_aid.as_ref(),
            executable_module_aid.as_ref(),
            application_aid.as_ref(),
            privileges.as_ref(),
            parameters.as_slice(),
            install_token.as_ref(),
        ] {
            tlv::put_lv(&mut data, field)?;
        }

        Ok(Self::with_p1_data(
            install_p1::FOR_INSTALL_AND_MAKE_SELECTABLE,
            data.freeze(),
        ))
    }

    /// Create an INSTALL [for make selectable] command
    pub fn for_make_selectable(
        application_aid: impl AsRef<[u8]>,
        privileges: impl AsRef<[u8]>,
    ) -> Result<Self> {
        let empty: &[u8] = &[];
        let mut data = BytesMut::new();
        for field in [empty, empty, application_aid.as_ref(), privileges.as_ref(), empty, empty] {
            tlv::put_lv(&mut data, field)?;
        }

        Ok(Self::with_p1_data(install_p1::FOR_MAKE_SELECTABLE, data.freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpcard_apdu_core::ApduCommand;
    use hex_literal::hex;

    #[test]
    fn test_install_for_load() {
        let package_aid = hex!("53746174757357616C6C6574");
        let sd_aid = hex!("A000000151000000");
        let cmd = InstallCommand::for_load(package_aid, sd_aid, hex!(""), hex!(""), hex!("")).unwrap();

        assert_eq!(cmd.class(), cla::GP);
        assert_eq!(cmd.instruction(), ins::INSTALL);
        assert_eq!(cmd.p1(), install_p1::FOR_LOAD);
        assert_eq!(cmd.p2(), 0x00);
        assert_eq!(
            cmd.to_bytes().as_ref(),
            hex!("80E60200190C53746174757357616C6C657408A000000151000000000000")
        );
    }

    #[test]
    fn test_install_for_load_with_hash_and_token() {
        let cmd = InstallCommand::for_load(
            hex!("A00000000101"),
            hex!(""),
            [0xABu8; 32],
            hex!("EF04C6020100"),
            hex!("0102"),
        )
        .unwrap();

        let data = cmd.data().unwrap();
        assert_eq!(&data[..8], hex!("06A00000000101" "00"));
        assert_eq!(data[8], 0x20);
        assert_eq!(&data[41..], hex!("06EF04C6020100" "020102"));
    }

    #[test]
    fn test_install_for_install_and_make_selectable() {
        let package_aid = hex!("53746174757357616C6C6574");
        let module_aid = hex!("53746174757357616C6C6574417070");
        let privileges = hex!("01");
        let install_params = hex!("03AABBCC");

        let cmd = InstallCommand::for_install_and_make_selectable(
            package_aid,
            module_aid,
            module_aid,
            privileges,
            install_params,
            hex!(""),
        )
        .unwrap();

        assert_eq!(cmd.p1(), install_p1::FOR_INSTALL_AND_MAKE_SELECTABLE);
        assert_eq!(
            cmd.data(),
            Some(
                hex!(
                    "0C53746174757357616C6C65740F53746174757357616C6C65744170700F53746174757357616C6C6574417070010106C90403AABBCC00"
                )
                .as_ref()
            )
        );
    }

    #[test]
    fn test_install_empty_parameters() {
        let cmd = InstallCommand::for_install_and_make_selectable(
            hex!("A0000001"),
            hex!("A000000101"),
            hex!("A000000101"),
            hex!("00"),
            hex!(""),
            hex!(""),
        )
        .unwrap();
        assert!(cmd.data().unwrap().ends_with(&hex!("0100" "02C900" "00")));
    }

    #[test]
    fn test_install_for_make_selectable() {
        let cmd = InstallCommand::for_make_selectable(hex!("A000000101"), hex!("04")).unwrap();
        assert_eq!(cmd.to_bytes().as_ref(), hex!("80E608000C" "0000" "05A000000101" "0104" "0000"));
    }

    #[test]
    fn test_oversized_field_rejected() {
        assert!(InstallCommand::for_load([0u8; 256], hex!(""), hex!(""), hex!(""), hex!("")).is_err());
    }
}
