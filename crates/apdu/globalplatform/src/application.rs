//! GlobalPlatform card content management
//!
//! [`GlobalPlatform`] drives the issuer security domain: selection, the
//! secure channel, and the content management operations sent through it.
//! Multi-step operations stop at the first failure.

use bytes::{BufMut, Bytes, BytesMut};
use gpcard_apdu_core::{CardTransport, Command, Response, ResultExt};
use tracing::{debug, instrument, warn};

use crate::{
    Error, Result,
    commands::{
        DeleteCommand, GetDataCommand, GetStatusCommand, InstallCommand, LoadCommand,
        PutKeyCommand, SelectCommand, SetStatusCommand, StoreDataCommand,
    },
    constants::{
        LEGACY_CARD_MANAGER_AID, SECURITY_DOMAIN_AID, STORE_DATA_BLOCK_SIZE, delete_p2, get_data,
        load_p1, status, store_data_p1, tags,
    },
    cplc::Cplc,
    crypto::Block8,
    key_info::KeyInfoTemplate,
    keys::{Key, KeySet, KeyUsage},
    load::{LoadFile, LoadOptions},
    registry::{RegistryEntry, RegistryFormat, RegistrySubset, StatusTarget},
    secure_channel::{GPSecureChannel, SecureChannelConfig},
    util::tlv,
};

/// GlobalPlatform card management application
#[derive(Debug)]
pub struct GlobalPlatform<T: CardTransport> {
    channel: GPSecureChannel<T>,
}

impl<T: CardTransport> GlobalPlatform<T> {
    /// Create a new GlobalPlatform instance
    pub const fn new(transport: T, keys: KeySet, config: SecureChannelConfig) -> Self {
        Self {
            channel: GPSecureChannel::new(transport, keys, config),
        }
    }

    /// Create an instance using the 40..4F test keys and default settings
    pub fn with_default_keys(transport: T) -> Self {
        Self::new(transport, KeySet::default_test_keys(), SecureChannelConfig::default())
    }

    /// Secure channel
    pub const fn channel(&self) -> &GPSecureChannel<T> {
        &self.channel
    }

    /// Whether the secure channel is established
    pub fn is_established(&self) -> bool {
        self.channel.is_established()
    }

    /// Underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        self.channel.transport_mut()
    }

    /// Consume the application and return the transport
    pub fn into_transport(self) -> T {
        self.channel.into_transport()
    }

    /// Send through the secure channel, requiring 9000
    fn send(&mut self, command: impl Into<Command>, operation: &'static str) -> Result<Bytes> {
        let response = self.channel.transmit(&command.into())?;
        check(response, operation)
    }

    /// Send through the secure channel when established, in plain otherwise
    fn send_any(&mut self, command: impl Into<Command>) -> Result<Response> {
        let command = command.into();
        if self.channel.is_established() {
            self.channel.transmit(&command)
        } else {
            Ok(self.channel.transport_mut().transmit_command(&command)?)
        }
    }

    /// Select an application by AID, returning its FCI
    #[instrument(level = "debug", skip(self, aid), fields(aid = %hex::encode_upper(aid)))]
    pub fn select(&mut self, aid: &[u8]) -> Result<Bytes> {
        let command = SelectCommand::with_aid(aid.to_vec()).into_command();
        let response = self
            .channel
            .transport_mut()
            .transmit_command(&command)
            .context("SELECT")?;
        check(response, "SELECT")
    }

    /// Select the issuer security domain
    ///
    /// Falls back to the legacy card manager AID when the GlobalPlatform AID
    /// is not found.
    pub fn select_card_manager(&mut self) -> Result<Bytes> {
        match self.select(SECURITY_DOMAIN_AID) {
            Err(e) if e.status() == Some(status::FILE_NOT_FOUND) => {
                debug!("Issuer security domain not found, trying legacy card manager AID");
                self.select(LEGACY_CARD_MANAGER_AID)
            }
            result => result,
        }
    }

    /// Read a data object; `None` when the card does not have it
    pub fn get_data(&mut self, tag: u16) -> Result<Option<Bytes>> {
        let response = self.send_any(GetDataCommand::with_tag(tag))?;
        let sw = response.status();
        if sw.is_file_not_found() || sw.is_referenced_data_not_found() {
            debug!(tag = format_args!("{tag:04X}"), "Data object not present");
            return Ok(None);
        }
        check(response, "GET DATA").map(Some)
    }

    /// Read and parse the CPLC data
    pub fn get_cplc(&mut self) -> Result<Option<Cplc>> {
        self.get_data(get_data::CPLC)?
            .map(|data| Cplc::parse(&data))
            .transpose()
    }

    /// Read and parse the Key Information Template
    pub fn get_key_info_template(&mut self) -> Result<Option<KeyInfoTemplate>> {
        self.get_data(get_data::KEY_INFO_TEMPLATE)?
            .map(|data| KeyInfoTemplate::parse(&data))
            .transpose()
    }

    /// Open the secure channel with a random host challenge
    pub fn open_secure_channel(&mut self) -> Result<()> {
        self.channel.open()
    }

    /// Open the secure channel with a fixed host challenge
    pub fn open_secure_channel_with_challenge(&mut self, host_challenge: Block8) -> Result<()> {
        self.channel.open_with_challenge(host_challenge)
    }

    /// Delete an application or load file, optionally with its related objects
    #[instrument(level = "debug", skip(self, aid), fields(aid = %hex::encode_upper(aid)))]
    pub fn delete(&mut self, aid: &[u8], related: bool) -> Result<()> {
        let p2 = if related {
            delete_p2::OBJECT_AND_RELATED
        } else {
            delete_p2::OBJECT
        };
        self.send(DeleteCommand::with_aid(aid, p2)?, "DELETE")?;
        debug!("Deleted");
        Ok(())
    }

    /// Load a file: INSTALL [for load] followed by its LOAD blocks
    pub fn load_file(&mut self, file: &LoadFile, options: &LoadOptions) -> Result<()> {
        self.load_file_with_progress(file, options, |_, _| {})
    }

    /// Load a file, reporting `(blocks sent, total blocks)` after each LOAD
    ///
    /// Fails with [`Error::Configuration`] before INSTALL is sent when a LOAD
    /// block would not fit a short APDU once wrapped at the session level.
    #[instrument(
        level = "debug",
        skip_all,
        fields(package = %hex::encode_upper(file.package_aid()), size = file.total_size())
    )]
    pub fn load_file_with_progress(
        &mut self,
        file: &LoadFile,
        options: &LoadOptions,
        mut progress: impl FnMut(usize, usize),
    ) -> Result<()> {
        if let Some(session) = self.channel.session() {
            let max = session.max_data_length();
            if file.block_size() > max {
                return Err(Error::configuration(format!(
                    "LOAD block size {} exceeds {max} at security level {}",
                    file.block_size(),
                    session.security_level()
                )));
            }
        }

        let hash = if options.include_hash {
            file.data_block_hash().to_vec()
        } else {
            Vec::new()
        };
        let install = InstallCommand::for_load(
            file.package_aid(),
            &options.security_domain_aid,
            &hash,
            &options.load_parameters,
            &options.load_token,
        )?;
        self.send(install, "INSTALL [for load]")?;

        let total = file.block_count();
        for (index, block) in file.blocks().enumerate() {
            let p1 = if block.last {
                load_p1::LAST_BLOCK
            } else {
                load_p1::MORE_BLOCKS
            };
            self.send(
                LoadCommand::with_block_data(p1, block.number, block.data.to_vec()),
                "LOAD",
            )?;
            progress(index + 1, total);
        }

        debug!(blocks = total, "Load file loaded");
        Ok(())
    }

    /// Install and make selectable an applet instance
    ///
    /// The instance AID defaults to the module AID, privileges to `00` and
    /// install parameters to none.
    #[instrument(level = "debug", skip_all, fields(module = %hex::encode_upper(module_aid)))]
    pub fn install_applet(
        &mut self,
        package_aid: &[u8],
        module_aid: &[u8],
        applet_aid: Option<&[u8]>,
        privileges: Option<&[u8]>,
        parameters: Option<&[u8]>,
    ) -> Result<()> {
        let command = InstallCommand::for_install_and_make_selectable(
            package_aid,
            module_aid,
            applet_aid.unwrap_or(module_aid),
            privileges.unwrap_or(&[0x00]),
            parameters.unwrap_or_default(),
            Bytes::new(),
        )?;
        self.send(command, "INSTALL [for install and make selectable]")?;
        debug!("Applet installed");
        Ok(())
    }

    /// Make an installed application selectable
    pub fn make_selectable(&mut self, aid: &[u8], privileges: &[u8]) -> Result<()> {
        let command = InstallCommand::for_make_selectable(aid, privileges)?;
        self.send(command, "INSTALL [for make selectable]")?;
        Ok(())
    }

    /// Change the card identity (IIN, CIN) or the ISD AID with STORE DATA
    #[instrument(level = "debug", skip_all)]
    pub fn change_identity(
        &mut self,
        iin: Option<&[u8]>,
        cin: Option<&[u8]>,
        isd_aid: Option<&[u8]>,
    ) -> Result<()> {
        let mut data = BytesMut::new();
        for (tag, value) in [(tags::IIN, iin), (tags::CIN, cin), (tags::AID, isd_aid)] {
            if let Some(value) = value {
                data.put_slice(&tlv::simple(tag, value)?);
            }
        }
        if data.is_empty() {
            return Err(Error::configuration(
                "change identity needs an IIN, a CIN or an ISD AID",
            ));
        }

        let blocks: Vec<&[u8]> = data.chunks(STORE_DATA_BLOCK_SIZE).collect();
        let count = blocks.len();
        for (index, block) in blocks.into_iter().enumerate() {
            let p1 = if index + 1 == count {
                store_data_p1::LAST_BLOCK
            } else {
                store_data_p1::MORE_BLOCKS
            };
            self.send(
                StoreDataCommand::new_with_data(p1, index as u8, block.to_vec()),
                "STORE DATA",
            )?;
        }

        debug!(blocks = count, "Identity changed");
        Ok(())
    }

    /// Change a life cycle state
    pub fn set_status(&mut self, target: StatusTarget, aid: &[u8], state: u8) -> Result<()> {
        debug!(%target, aid = %hex::encode_upper(aid), state, "Setting status");
        self.send(SetStatusCommand::new(target.p1(), state, aid), "SET STATUS")?;
        Ok(())
    }

    /// Read the raw registry data of a subset, following continuation pages
    ///
    /// A registry without matching entries yields empty data.
    #[instrument(level = "debug", skip(self))]
    pub fn get_status_raw(&mut self, subset: RegistrySubset, format: RegistryFormat) -> Result<Bytes> {
        let mut data = BytesMut::new();
        let mut command = GetStatusCommand::first(subset.p1(), format.p2());

        loop {
            let response = self.channel.transmit(&command.into_command())?;
            let sw = response.status();
            data.put_slice(response.payload());

            if sw == status::MORE_DATA {
                command = GetStatusCommand::next(subset.p1(), format.p2());
                continue;
            }
            if sw.is_success() || sw.is_file_not_found() || sw.is_referenced_data_not_found() {
                break;
            }

            warn!(status = %sw, "GET STATUS failed");
            return Err(Error::card_status(sw));
        }

        debug!(bytes = data.len(), "Registry read");
        Ok(data.freeze())
    }

    /// Read and parse the registry entries of a subset
    pub fn get_status(
        &mut self,
        subset: RegistrySubset,
        format: RegistryFormat,
    ) -> Result<Vec<RegistryEntry>> {
        let data = self.get_status_raw(subset, format)?;
        RegistryEntry::parse(&data, subset, format)
    }

    /// Send one PUT KEY command with prepared key data
    pub fn put_key(
        &mut self,
        key_id: u8,
        key_version: u8,
        key_data: &[u8],
        multiple_keys: bool,
    ) -> Result<Bytes> {
        let command = PutKeyCommand::new(key_id, key_version, key_data.to_vec(), false, multiple_keys);
        self.send(command, "PUT KEY")
    }

    /// Check that the card's key slots accept `candidate`
    ///
    /// A card without a Key Information Template fails the check.
    pub fn check_keys(&mut self, candidate: &KeySet) -> Result<()> {
        match self.get_key_info_template()? {
            Some(template) => template.check_replacement(candidate),
            None => {
                warn!("Card has no key information template");
                Err(Error::configuration(
                    "card reports no key information template, key slots cannot be checked",
                ))
            }
        }
    }

    /// Replace the keys of `replaced_version` (0 adds a new version) with `candidate`
    #[instrument(level = "debug", skip(self, candidate), fields(keys = candidate.name(), version = candidate.version()))]
    pub fn replace_keys(&mut self, candidate: &KeySet, replaced_version: u8) -> Result<()> {
        check_version(candidate)?;
        self.check_keys(candidate)?;
        self.put_keys(candidate, replaced_version)
    }

    /// Replace keys without reading the card's key slots first
    ///
    /// For cards that do not publish a Key Information Template.
    #[instrument(level = "debug", skip(self, candidate), fields(keys = candidate.name(), version = candidate.version()))]
    pub fn replace_keys_unchecked(&mut self, candidate: &KeySet, replaced_version: u8) -> Result<()> {
        check_version(candidate)?;
        warn!("Replacing keys without checking the card's key slots");
        self.put_keys(candidate, replaced_version)
    }

    fn put_keys(&mut self, candidate: &KeySet, replaced_version: u8) -> Result<()> {
        let kek: Key = self
            .channel
            .session()
            .ok_or(gpcard_apdu_core::Error::SecureChannelNotEstablished)?
            .key(KeyUsage::Kek)?
            .clone();

        let mut keys: Vec<&Key> = candidate.keys().collect();
        keys.sort_by_key(|key| key.id());
        let command = PutKeyCommand::with_keys(replaced_version, candidate.version(), &keys, &kek)?;
        self.send(command, "PUT KEY")?;

        debug!(replaced = replaced_version, "Keys replaced");
        Ok(())
    }

    /// Close the secure channel
    pub fn close_secure_channel(&mut self) {
        self.channel.close();
    }

    /// Discard the session and reset the card connection
    pub fn reset(&mut self) -> Result<()> {
        self.channel.reset()
    }
}

fn check_version(candidate: &KeySet) -> Result<()> {
    if candidate.version() == 0 {
        return Err(Error::configuration("replacement keys need a nonzero key version"));
    }
    Ok(())
}

fn check(response: Response, operation: &'static str) -> Result<Bytes> {
    if response.is_success() {
        return Ok(response.into_payload());
    }
    let status = response.status();
    warn!(%status, operation, "Card rejected command");
    Err(Error::card_status(status))
}
