//! TLV type numbers.
//!
//! The standard packet-format numbers plus the multi-party signing numbers.
//! These values are wire-compatible across implementations and must not be
//! changed.

// Name components.
pub const IMPLICIT_SHA256_DIGEST_COMPONENT: u64 = 0x01;
pub const PARAMETERS_SHA256_DIGEST_COMPONENT: u64 = 0x02;
pub const GENERIC_NAME_COMPONENT: u64 = 0x08;
pub const VERSION_NAME_COMPONENT: u64 = 0x36;

// Packets.
pub const INTEREST: u64 = 0x05;
pub const DATA: u64 = 0x06;
pub const NAME: u64 = 0x07;

// Interest elements.
pub const NONCE: u64 = 0x0a;
pub const INTEREST_LIFETIME: u64 = 0x0c;
pub const MUST_BE_FRESH: u64 = 0x12;
pub const CAN_BE_PREFIX: u64 = 0x21;
pub const APPLICATION_PARAMETERS: u64 = 0x24;
pub const INTEREST_SIGNATURE_INFO: u64 = 0x2c;
pub const INTEREST_SIGNATURE_VALUE: u64 = 0x2e;

// Data elements.
pub const META_INFO: u64 = 0x14;
pub const CONTENT: u64 = 0x15;
pub const SIGNATURE_INFO: u64 = 0x16;
pub const SIGNATURE_VALUE: u64 = 0x17;
pub const FRESHNESS_PERIOD: u64 = 0x19;
pub const SIGNATURE_TYPE: u64 = 0x1b;
pub const KEY_LOCATOR: u64 = 0x1c;

// Certificate validity (carried inside SignatureInfo).
pub const VALIDITY_PERIOD: u64 = 0xfd;
pub const NOT_BEFORE: u64 = 0xfe;
pub const NOT_AFTER: u64 = 0xff;

// Multi-party signing elements.
pub const MPS_SIGNER_LIST: u64 = 200;
pub const STATUS: u64 = 203;
pub const PARAMETER_DATA_NAME: u64 = 205;
pub const RESULT_AFTER: u64 = 209;
pub const RESULT_NAME: u64 = 211;
pub const BLS_SIG_VALUE: u64 = 213;

/// SignatureType value for a BLS signature over the SHA-256 canonical form.
pub const SIGNATURE_SHA256_WITH_BLS: u16 = 64;
