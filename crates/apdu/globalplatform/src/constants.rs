//! Constants used in GlobalPlatform operations
//!
//! This module contains the byte-exact values defined by the GlobalPlatform
//! Card Specification: CLA bytes, instruction codes, parameter values, tags
//! and the status words this crate reacts to.

/// GlobalPlatform command classes
pub mod cla {
    /// ISO7816 command class
    pub const ISO7816: u8 = 0x00;
    /// GlobalPlatform command class
    pub const GP: u8 = 0x80;
    /// Secure messaging command class (with MAC)
    pub const MAC: u8 = 0x84;
    /// Secure messaging indicator bit
    pub const SECURE_MESSAGING: u8 = 0x04;
}

/// GlobalPlatform instruction codes
pub mod ins {
    /// SELECT command
    pub const SELECT: u8 = 0xA4;
    /// INITIALIZE UPDATE command
    pub const INITIALIZE_UPDATE: u8 = 0x50;
    /// EXTERNAL AUTHENTICATE command
    pub const EXTERNAL_AUTHENTICATE: u8 = 0x82;
    /// GET DATA command
    pub const GET_DATA: u8 = 0xCA;
    /// DELETE command
    pub const DELETE: u8 = 0xE4;
    /// LOAD command
    pub const LOAD: u8 = 0xE8;
    /// INSTALL command
    pub const INSTALL: u8 = 0xE6;
    /// GET STATUS command
    pub const GET_STATUS: u8 = 0xF2;
    /// SET STATUS command
    pub const SET_STATUS: u8 = 0xF0;
    /// PUT KEY command
    pub const PUT_KEY: u8 = 0xD8;
    /// STORE DATA command
    pub const STORE_DATA: u8 = 0xE2;
}

/// Parameter values for SELECT command (P1)
pub mod select_p1 {
    /// Select by DF name
    pub const BY_NAME: u8 = 0x04;
}

/// Security level bits for EXTERNAL AUTHENTICATE (P1)
pub mod external_auth_p1 {
    /// Command MAC
    pub const C_MAC: u8 = 0x01;
    /// Command encryption
    pub const C_ENC: u8 = 0x02;
    /// Response MAC
    pub const R_MAC: u8 = 0x10;
    /// Response encryption
    pub const R_ENC: u8 = 0x20;
}

/// Parameter values for INSTALL command (P1)
pub mod install_p1 {
    /// Install for load
    pub const FOR_LOAD: u8 = 0x02;
    /// Install for install
    pub const FOR_INSTALL: u8 = 0x04;
    /// Install for make selectable
    pub const FOR_MAKE_SELECTABLE: u8 = 0x08;
    /// Install for install and make selectable
    pub const FOR_INSTALL_AND_MAKE_SELECTABLE: u8 = FOR_INSTALL | FOR_MAKE_SELECTABLE;
}

/// Parameter values for LOAD command (P1)
pub mod load_p1 {
    /// More blocks to follow
    pub const MORE_BLOCKS: u8 = 0x00;
    /// Last block
    pub const LAST_BLOCK: u8 = 0x80;
}

/// Parameter values for STORE DATA command (P1)
pub mod store_data_p1 {
    /// More blocks to follow
    pub const MORE_BLOCKS: u8 = 0x00;
    /// Last block
    pub const LAST_BLOCK: u8 = 0x80;
}

/// Parameter values for GET STATUS command (P1)
pub mod get_status_p1 {
    /// Get status of issuer security domain
    pub const ISSUER_SECURITY_DOMAIN: u8 = 0x80;
    /// Get status of applications and supplementary security domains
    pub const APPLICATIONS: u8 = 0x40;
    /// Get status of executable load files
    pub const EXEC_LOAD_FILES: u8 = 0x20;
    /// Get status of executable load files and modules
    pub const EXEC_LOAD_FILES_AND_MODULES: u8 = 0x10;
}

/// Parameter values for GET STATUS command (P2)
pub mod get_status_p2 {
    /// First or only occurrence
    pub const FIRST_OR_ALL: u8 = 0x00;
    /// Next occurrence
    pub const NEXT: u8 = 0x01;
    /// Legacy response data structure
    pub const LEGACY_DATA: u8 = 0x00;
    /// Return data in TLV format
    pub const TLV_DATA: u8 = 0x02;
}

/// Parameter values for SET STATUS command (P1)
pub mod set_status_p1 {
    /// Issuer security domain
    pub const ISSUER_SECURITY_DOMAIN: u8 = 0x80;
    /// Application or supplementary security domain
    pub const APPLICATION_OR_SSD: u8 = 0x40;
    /// Security domain and its associated applications
    pub const SD_AND_APPLICATIONS: u8 = 0x60;
}

/// Parameter values for DELETE command (P2)
pub mod delete_p2 {
    /// Delete object
    pub const OBJECT: u8 = 0x00;
    /// Delete object and related objects
    pub const OBJECT_AND_RELATED: u8 = 0x80;
}

/// Flags for PUT KEY command parameters
pub mod put_key {
    /// P1: more PUT KEY commands follow
    pub const MORE_COMMANDS: u8 = 0x80;
    /// P2: the command carries multiple keys
    pub const MULTIPLE_KEYS: u8 = 0x80;
    /// Key type byte for triple DES keys
    pub const KEY_TYPE_DES3: u8 = 0x80;
    /// Key type byte for AES keys
    pub const KEY_TYPE_AES: u8 = 0x88;
    /// Length of the key check value sent with every key
    pub const KCV_LENGTH: u8 = 0x03;
}

/// Key type bytes reported in Key Information Templates
pub mod key_type {
    /// DES, mode implicitly known (treated as triple DES)
    pub const DES_IMPLICIT: u8 = 0x80;
    /// Triple DES
    pub const DES3: u8 = 0x81;
    /// Triple DES in CBC mode
    pub const DES3_CBC: u8 = 0x82;
    /// DES in ECB mode
    pub const DES_ECB: u8 = 0x83;
    /// DES in CBC mode
    pub const DES_CBC: u8 = 0x84;
    /// AES
    pub const AES: u8 = 0x88;
}

/// GET DATA object tags (P1P2)
pub mod get_data {
    /// Card Production Life Cycle data
    pub const CPLC: u16 = 0x9F7F;
    /// Card Data
    pub const CARD_DATA: u16 = 0x0066;
    /// Key Information Template
    pub const KEY_INFO_TEMPLATE: u16 = 0x00E0;
    /// Issuer Identification Number
    pub const IIN: u16 = 0x0042;
    /// Card Image Number
    pub const CIN: u16 = 0x0045;
}

/// Commonly used status words in GlobalPlatform
pub mod status {
    use gpcard_apdu_core::StatusWord;

    /// Success
    pub const SUCCESS: StatusWord = StatusWord::new(0x90, 0x00);
    /// More data available (GET STATUS continuation)
    pub const MORE_DATA: StatusWord = StatusWord::new(0x63, 0x10);
    /// Wrong length
    pub const WRONG_LENGTH: StatusWord = StatusWord::new(0x67, 0x00);
    /// Wrong data
    pub const WRONG_DATA: StatusWord = StatusWord::new(0x6A, 0x80);
    /// File not found
    pub const FILE_NOT_FOUND: StatusWord = StatusWord::new(0x6A, 0x82);
    /// Referenced data not found
    pub const REFERENCED_DATA_NOT_FOUND: StatusWord = StatusWord::new(0x6A, 0x88);
    /// Security condition not satisfied
    pub const SECURITY_CONDITION_NOT_SATISFIED: StatusWord = StatusWord::new(0x69, 0x82);
    /// Conditions of use not satisfied
    pub const CONDITIONS_NOT_SATISFIED: StatusWord = StatusWord::new(0x69, 0x85);
}

/// Tags used in GlobalPlatform commands and responses
pub mod tags {
    /// AID
    pub const AID: u8 = 0x4F;
    /// Issuer Identification Number
    pub const IIN: u8 = 0x42;
    /// Card Image Number
    pub const CIN: u8 = 0x45;
    /// Load file data block
    pub const LOAD_FILE_DATA_BLOCK: u8 = 0xC4;
    /// Application specific install parameters
    pub const INSTALL_PARAMETERS: u8 = 0xC9;
    /// Key Information Template
    pub const KEY_INFO_TEMPLATE: u8 = 0xE0;
    /// Key Information Data
    pub const KEY_INFO_DATA: u8 = 0xC0;
    /// GlobalPlatform registry entry
    pub const REGISTRY_ENTRY: u8 = 0xE3;
    /// Registry entry tag used by some pre-2.2 cards
    pub const REGISTRY_ENTRY_LEGACY: u8 = 0xE2;
    /// Lifecycle state (two byte tag)
    pub const LIFECYCLE: [u8; 2] = [0x9F, 0x70];
    /// Privileges
    pub const PRIVILEGES: u8 = 0xC5;
    /// Executable load file AID
    pub const EXECUTABLE_LOAD_FILE: u8 = 0xC4;
    /// Executable module AID
    pub const EXECUTABLE_MODULE: u8 = 0x84;
    /// Load file version number
    pub const VERSION: u8 = 0xCE;
    /// Associated security domain AID
    pub const ASSOCIATED_SECURITY_DOMAIN: u8 = 0xCC;
    /// CPLC data object (two byte tag)
    pub const CPLC: [u8; 2] = [0x9F, 0x7F];
}

/// Secure Channel Protocol (SCP) versions
pub mod scp {
    /// SCP01 protocol version
    pub const SCP01: u8 = 0x01;
    /// SCP02 protocol version
    pub const SCP02: u8 = 0x02;
    /// SCP03 protocol version
    pub const SCP03: u8 = 0x03;

    /// SCP01/02 i parameter: initial chaining vector is encrypted
    pub const ICV_ENCRYPTION: u8 = 0x10;
    /// SCP03 i parameter: S16 mode
    pub const SCP03_S16: u8 = 0x01;
    /// SCP03 i parameter: R-MAC support
    pub const SCP03_R_MAC: u8 = 0x20;
    /// SCP03 i parameter: R-ENC support
    pub const SCP03_R_ENC: u8 = 0x40;

    /// Default SCP01 i parameter
    pub const DEFAULT_SCP01_PARAMETERS: u8 = 0x05;
    /// Default SCP02 i parameter
    pub const DEFAULT_SCP02_PARAMETERS: u8 = 0x55;
}

/// SCP02 session key derivation constants
pub mod scp02_derivation {
    /// C-MAC session key
    pub const MAC: [u8; 2] = [0x01, 0x01];
    /// R-MAC session key
    pub const RMAC: [u8; 2] = [0x01, 0x02];
    /// Data encryption session key
    pub const KEK: [u8; 2] = [0x01, 0x81];
    /// Encryption session key
    pub const ENC: [u8; 2] = [0x01, 0x82];
}

/// SCP03 KDF derivation constants
pub mod scp03_derivation {
    /// Card cryptogram
    pub const CARD_CRYPTOGRAM: u8 = 0x00;
    /// Host cryptogram
    pub const HOST_CRYPTOGRAM: u8 = 0x01;
    /// S-ENC session key
    pub const S_ENC: u8 = 0x04;
    /// S-MAC session key
    pub const S_MAC: u8 = 0x06;
    /// S-RMAC session key
    pub const S_RMAC: u8 = 0x07;
}

/// Card and application lifecycle states
pub mod lifecycle {
    /// Card: OP_READY
    pub const CARD_OP_READY: u8 = 0x01;
    /// Card: INITIALIZED
    pub const CARD_INITIALIZED: u8 = 0x07;
    /// Card: SECURED
    pub const CARD_SECURED: u8 = 0x0F;
    /// Card: CARD_LOCKED
    pub const CARD_LOCKED: u8 = 0x7F;
    /// Card: TERMINATED
    pub const CARD_TERMINATED: u8 = 0xFF;
    /// Application: INSTALLED
    pub const APP_INSTALLED: u8 = 0x03;
    /// Application: SELECTABLE
    pub const APP_SELECTABLE: u8 = 0x07;
    /// Application: LOCKED
    pub const APP_LOCKED: u8 = 0x83;
}

/// Host challenge length in bytes
pub const HOST_CHALLENGE_LENGTH: usize = 8;

/// Maximum size of one STORE DATA block
pub const STORE_DATA_BLOCK_SIZE: usize = 128;

/// Default LOAD block size (room left for a C-MAC and encryption padding)
pub const DEFAULT_LOAD_BLOCK_SIZE: usize = 239;

/// Largest LOAD block: a short APDU less the C-MAC
pub const MAX_LOAD_BLOCK_SIZE: usize = 247;

/// GlobalPlatform issuer security domain AID
pub const SECURITY_DOMAIN_AID: &[u8] = &[0xA0, 0x00, 0x00, 0x01, 0x51, 0x00, 0x00, 0x00];

/// Legacy Visa/OpenPlatform card manager AID
pub const LEGACY_CARD_MANAGER_AID: &[u8] = &[0xA0, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00];
