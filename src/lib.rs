//! Multi-party BLS signatures over named data packets.
//!
//! Multiple independent signers, each holding a BLS12-381 key, cooperatively
//! sign the same unsigned packet; their signature shares aggregate into one
//! fixed-size signature that verifies against the sum of the participants'
//! public keys. Which signers must participate is declared by a
//! [schema::MultipartySchema] of wildcard name patterns; the participating
//! set itself travels as a [signer_list::MpsSignerList] packet named by the
//! signed packet's key locator.
//!
//! The crate splits into a pure core and a protocol layer:
//!
//! - [bls], [name], [packet], [schema], [signer_list] — primitives, the
//!   packet model with its canonical signed portion, and the schema engine.
//! - [signer], [verifier], [aggregator] — the cryptographic roles: produce
//!   a share over a fixed signature info, verify shares and aggregates,
//!   combine shares into the final packet.
//! - [protocol] — the request/ack/poll/fetch exchange between an initiator
//!   and its signer endpoints, plus the asynchronous verifier that resolves
//!   missing certificates and signer lists over the network.

pub mod aggregator;
pub mod bls;
pub mod codec;
pub mod name;
pub mod packet;
pub mod protocol;
pub mod schema;
pub mod signer;
pub mod signer_list;
pub mod tlv;
pub mod utils;
pub mod verifier;

pub use aggregator::MpsAggregator;
pub use name::{Component, Name};
pub use packet::{Data, Interest, SignatureInfo, ValidityPeriod};
pub use schema::{MultipartySchema, MultipartySchemaContainer, WildCardName};
pub use signer::MpsSigner;
pub use signer_list::MpsSignerList;
pub use verifier::MpsVerifier;
