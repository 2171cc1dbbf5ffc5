//! Signing, verification, and aggregation.
//!
//! All signatures are made over the caller's canonical message bytes with
//! the domain separation tag [group::MESSAGE_DST]; interoperating
//! implementations must hash with the same ciphersuite. Deserialization of
//! keys and signatures is provided by the [crate::codec::Decode] impls on
//! the group elements.

use super::{
    group::{self, Public, Scalar, Signature, MESSAGE_DST},
    Error,
};
use rand::RngCore;

/// Returns a new keypair derived from the provided randomness.
pub fn keypair<R: RngCore>(rng: &mut R) -> (Scalar, Public) {
    let private = Scalar::rand(rng);
    let mut public = Public::one();
    public.mul(&private);
    (private, public)
}

/// Returns the public key corresponding to a secret scalar.
pub fn public_key(private: &Scalar) -> Public {
    let mut public = Public::one();
    public.mul(private);
    public
}

/// Signs the provided message with the secret key.
///
/// Signatures produced by this function are deterministic.
pub fn sign(private: &Scalar, message: &[u8]) -> Signature {
    let mut sig = Signature::zero();
    sig.map(MESSAGE_DST, message);
    sig.mul(private);
    sig
}

/// Verifies the signature with the provided public key.
pub fn verify(public: &Public, message: &[u8], signature: &Signature) -> Result<(), Error> {
    let mut hm = Signature::zero();
    hm.map(MESSAGE_DST, message);
    if !group::equal(public, signature, &hm) {
        return Err(Error::InvalidSignature);
    }
    Ok(())
}

/// Aggregates multiple signatures over the same message.
pub fn aggregate_signatures(signatures: &[Signature]) -> Result<Signature, Error> {
    if signatures.is_empty() {
        return Err(Error::EmptyAggregation);
    }
    let mut agg = Signature::zero();
    for sig in signatures {
        agg.add(sig);
    }
    Ok(agg)
}

/// Aggregates multiple public keys.
///
/// The aggregate is a deterministic function of the keys: point addition is
/// commutative, so every holder of the same key set derives the same
/// aggregate.
pub fn aggregate_public_keys(publics: &[Public]) -> Result<Public, Error> {
    if publics.is_empty() {
        return Err(Error::EmptyAggregation);
    }
    let mut agg = Public::zero();
    for public in publics {
        agg.add(public);
    }
    Ok(agg)
}

/// Verifies one aggregate signature over a single message against a set of
/// public keys, as if verified against their sum.
///
/// # Warning
///
/// It is not safe to provide duplicate public keys, and every key must be
/// backed by a vetted certificate; otherwise a rogue-key attack can forge
/// aggregates.
pub fn fast_aggregate_verify(
    publics: &[Public],
    message: &[u8],
    signature: &Signature,
) -> Result<(), Error> {
    let agg = aggregate_public_keys(publics)?;
    verify(&agg, message, signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    #[test]
    fn test_sign_verify() {
        let (private, public) = keypair(&mut thread_rng());
        let message = b"hello";
        let sig = sign(&private, message);
        verify(&public, message, &sig).expect("signature should be valid");
    }

    #[test]
    fn test_tampered_message() {
        let (private, public) = keypair(&mut thread_rng());
        let sig = sign(&private, b"hello");
        assert_eq!(
            verify(&public, b"hellp", &sig).unwrap_err(),
            Error::InvalidSignature
        );
    }

    #[test]
    fn test_wrong_key() {
        let (private, _) = keypair(&mut thread_rng());
        let (_, other) = keypair(&mut thread_rng());
        let sig = sign(&private, b"hello");
        assert_eq!(
            verify(&other, b"hello", &sig).unwrap_err(),
            Error::InvalidSignature
        );
    }

    #[test]
    fn test_fast_aggregate_verify() {
        let message = b"message";
        let (private1, public1) = keypair(&mut thread_rng());
        let (private2, public2) = keypair(&mut thread_rng());
        let (private3, public3) = keypair(&mut thread_rng());
        let signatures = [
            sign(&private1, message),
            sign(&private2, message),
            sign(&private3, message),
        ];
        let agg = aggregate_signatures(&signatures).unwrap();
        fast_aggregate_verify(&[public1, public2, public3], message, &agg)
            .expect("aggregate should be valid");
    }

    #[test]
    fn test_aggregate_verify_wrong_public_keys() {
        let message = b"message";
        let (private1, public1) = keypair(&mut thread_rng());
        let (private2, public2) = keypair(&mut thread_rng());
        let (private3, _) = keypair(&mut thread_rng());
        let signatures = [
            sign(&private1, message),
            sign(&private2, message),
            sign(&private3, message),
        ];
        let agg = aggregate_signatures(&signatures).unwrap();
        let (_, public4) = keypair(&mut thread_rng());
        assert_eq!(
            fast_aggregate_verify(&[public1, public2, public4], message, &agg).unwrap_err(),
            Error::InvalidSignature
        );
    }

    #[test]
    fn test_aggregate_verify_wrong_key_count() {
        let message = b"message";
        let (private1, public1) = keypair(&mut thread_rng());
        let (private2, public2) = keypair(&mut thread_rng());
        let (private3, _) = keypair(&mut thread_rng());
        let signatures = [
            sign(&private1, message),
            sign(&private2, message),
            sign(&private3, message),
        ];
        let agg = aggregate_signatures(&signatures).unwrap();
        assert_eq!(
            fast_aggregate_verify(&[public1, public2], message, &agg).unwrap_err(),
            Error::InvalidSignature
        );
    }

    #[test]
    fn test_empty_aggregation() {
        assert_eq!(
            aggregate_signatures(&[]).unwrap_err(),
            Error::EmptyAggregation
        );
        assert_eq!(
            aggregate_public_keys(&[]).unwrap_err(),
            Error::EmptyAggregation
        );
    }

    #[test]
    fn test_aggregate_matches_blst() {
        // The aggregate verifies identically under the library's high-level
        // fast_aggregate_verify.
        let message = b"message";
        let (private1, public1) = keypair(&mut thread_rng());
        let (private2, public2) = keypair(&mut thread_rng());
        let signatures = [sign(&private1, message), sign(&private2, message)];
        let agg = aggregate_signatures(&signatures).unwrap();

        use crate::codec::Encode as _;
        let publics = [
            blst::min_pk::PublicKey::from_bytes(&public1.encode()).unwrap(),
            blst::min_pk::PublicKey::from_bytes(&public2.encode()).unwrap(),
        ];
        let publics: Vec<_> = publics.iter().collect();
        let agg = blst::min_pk::Signature::from_bytes(&agg.encode()).unwrap();
        assert!(matches!(
            agg.fast_aggregate_verify(true, message, MESSAGE_DST, &publics),
            blst::BLST_ERROR::BLST_SUCCESS
        ));
    }
}
