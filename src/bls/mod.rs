//! BLS12-381 signatures.
//!
//! Public keys live in G1 (48 bytes compressed) and signatures in G2
//! (96 bytes compressed). Signatures over the same message bytes are
//! additively aggregatable, and one aggregate verifies against the sum of
//! the participants' public keys ([ops::fast_aggregate_verify]).
//!
//! The underlying library requires no process-wide initialization; every
//! operation is safe to call from the first use on. Deserialized elements
//! are subgroup-checked, so a decoded [Public] or [Signature] is always a
//! valid group member.
//!
//! # Warning
//!
//! Aggregation assumes the caller has vetted every participating public key
//! (for this crate: a certificate admitted by the injected verification
//! callback). Feeding unvetted keys into an aggregate enables rogue-key
//! attacks.

use thiserror::Error;

pub mod group;
pub mod ops;

pub use group::{Public, Scalar, Signature};

/// Errors that can occur when verifying or aggregating signatures.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("nothing to aggregate")]
    EmptyAggregation,
}
