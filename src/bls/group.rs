//! Group elements of the BLS12-381 construction.
//!
//! Thin wrappers over `blst` types: [Scalar] over the scalar field,
//! [Public] over G1, and [Signature] over G2. Deserialization performs
//! subgroup and non-infinity checks, so elements received from untrusted
//! sources are safe to use once decoded.

use crate::{
    codec::{Decode, Encode, Error},
    utils,
};
use blst::{
    blst_bendian_from_scalar, blst_fr, blst_fr_from_scalar, blst_hash_to_g2, blst_keygen,
    blst_p1, blst_p1_add_or_double, blst_p1_affine, blst_p1_compress, blst_p1_from_affine,
    blst_p1_in_g1, blst_p1_is_inf, blst_p1_mult, blst_p1_to_affine, blst_p1_uncompress, blst_p2,
    blst_p2_add_or_double, blst_p2_affine, blst_p2_compress, blst_p2_from_affine, blst_p2_in_g2,
    blst_p2_is_inf, blst_p2_mult, blst_p2_to_affine, blst_p2_uncompress, blst_scalar,
    blst_scalar_from_bendian, blst_scalar_from_fr, blst_sk_check, Pairing, BLS12_381_G1,
    BLS12_381_NEG_G1, BLST_ERROR,
};
use bytes::{Buf, BufMut};
use rand::RngCore;
use std::{
    fmt::{self, Debug, Display},
    hash::{Hash, Hasher},
    ptr,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Domain separation tag for hashing a message to G2.
///
/// The proof-of-possession ciphersuite: any message may end up inside a
/// multi-signature, and participating keys are vetted out of band (via
/// certificates), which is the setting this suite is specified for.
pub const MESSAGE_DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// The length of an encoded secret scalar.
pub const SECRET_KEY_LENGTH: usize = 32;

/// The length of a compressed G1 public key.
pub const PUBLIC_KEY_LENGTH: usize = 48;

/// The length of a compressed G2 signature.
pub const SIGNATURE_LENGTH: usize = 96;

/// The number of iterations performed during scalar multiplication. Fixed at
/// the effective bit length of the group order so signing is constant-time.
const SCALAR_BITS: usize = 255;

/// A secret scalar. Zeroized on drop.
#[derive(Clone, Eq, PartialEq)]
#[repr(transparent)]
pub struct Scalar(blst_fr);

impl Scalar {
    /// Generates a random scalar from the provided randomness.
    pub fn rand<R: RngCore>(rng: &mut R) -> Self {
        let mut ikm = [0u8; 64];
        rng.fill_bytes(&mut ikm);

        let mut ret = blst_fr::default();
        unsafe {
            let mut sc = blst_scalar::default();
            blst_keygen(&mut sc, ikm.as_ptr(), ikm.len(), ptr::null(), 0);
            blst_fr_from_scalar(&mut ret, &sc);
        }

        ikm.zeroize();
        Self(ret)
    }

    fn as_slice(&self) -> [u8; SECRET_KEY_LENGTH] {
        let mut slice = [0u8; SECRET_KEY_LENGTH];
        unsafe {
            let mut scalar = blst_scalar::default();
            blst_scalar_from_fr(&mut scalar, &self.0);
            blst_bendian_from_scalar(slice.as_mut_ptr(), &scalar);
        }
        slice
    }
}

impl Encode for Scalar {
    fn encoded_len(&self) -> usize {
        SECRET_KEY_LENGTH
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.as_slice());
    }
}

impl Decode for Scalar {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        if buf.remaining() < SECRET_KEY_LENGTH {
            return Err(Error::EndOfBuffer);
        }
        let mut bytes = [0u8; SECRET_KEY_LENGTH];
        buf.copy_to_slice(&mut bytes);
        let mut ret = blst_fr::default();
        unsafe {
            let mut scalar = blst_scalar::default();
            blst_scalar_from_bendian(&mut scalar, bytes.as_ptr());
            // blst_sk_check performs the range check plus a non-zero check,
            // which the IETF BLS specification requires of secret keys.
            if !blst_sk_check(&scalar) {
                return Err(Error::Invalid("Scalar", "out of range"));
            }
            blst_fr_from_scalar(&mut ret, &scalar);
        }
        Ok(Self(ret))
    }
}

impl Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Secrets never render.
        write!(f, "Scalar(..)")
    }
}

impl Zeroize for Scalar {
    fn zeroize(&mut self) {
        self.0.l.zeroize();
    }
}

impl Drop for Scalar {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for Scalar {}

/// A public key: a point on G1.
#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct Public(blst_p1);

impl Public {
    /// Returns the additive identity.
    pub fn zero() -> Self {
        Self(blst_p1::default())
    }

    /// Returns the group generator.
    pub fn one() -> Self {
        let mut ret = blst_p1::default();
        unsafe {
            blst_p1_from_affine(&mut ret, &BLS12_381_G1);
        }
        Self(ret)
    }

    /// Adds to self in-place.
    pub fn add(&mut self, rhs: &Self) {
        unsafe {
            blst_p1_add_or_double(&mut self.0, &self.0, &rhs.0);
        }
    }

    /// Multiplies self by a scalar in-place.
    pub fn mul(&mut self, rhs: &Scalar) {
        let mut scalar = blst_scalar::default();
        unsafe {
            blst_scalar_from_fr(&mut scalar, &rhs.0);
            blst_p1_mult(&mut self.0, &self.0, scalar.b.as_ptr(), SCALAR_BITS);
        }
    }

    fn as_slice(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        let mut slice = [0u8; PUBLIC_KEY_LENGTH];
        unsafe {
            blst_p1_compress(slice.as_mut_ptr(), &self.0);
        }
        slice
    }
}

impl Encode for Public {
    fn encoded_len(&self) -> usize {
        PUBLIC_KEY_LENGTH
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.as_slice());
    }
}

impl Decode for Public {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        if buf.remaining() < PUBLIC_KEY_LENGTH {
            return Err(Error::EndOfBuffer);
        }
        let mut bytes = [0u8; PUBLIC_KEY_LENGTH];
        buf.copy_to_slice(&mut bytes);
        let mut ret = blst_p1::default();
        unsafe {
            let mut affine = blst_p1_affine::default();
            match blst_p1_uncompress(&mut affine, bytes.as_ptr()) {
                BLST_ERROR::BLST_SUCCESS => {}
                _ => return Err(Error::Invalid("Public", "bad encoding")),
            }
            blst_p1_from_affine(&mut ret, &affine);
            if blst_p1_is_inf(&ret) {
                return Err(Error::Invalid("Public", "infinity"));
            }
            if !blst_p1_in_g1(&ret) {
                return Err(Error::Invalid("Public", "outside G1"));
            }
        }
        Ok(Self(ret))
    }
}

impl PartialEq for Public {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for Public {}

impl Hash for Public {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(&self.as_slice());
    }
}

impl Debug for Public {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", utils::hex(&self.as_slice()))
    }
}

impl Display for Public {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", utils::hex(&self.as_slice()))
    }
}

/// A signature: a point on G2.
#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct Signature(blst_p2);

impl Signature {
    /// Returns the additive identity.
    pub fn zero() -> Self {
        Self(blst_p2::default())
    }

    /// Adds to self in-place.
    pub fn add(&mut self, rhs: &Self) {
        unsafe {
            blst_p2_add_or_double(&mut self.0, &self.0, &rhs.0);
        }
    }

    /// Multiplies self by a scalar in-place.
    pub fn mul(&mut self, rhs: &Scalar) {
        let mut scalar = blst_scalar::default();
        unsafe {
            blst_scalar_from_fr(&mut scalar, &rhs.0);
            blst_p2_mult(&mut self.0, &self.0, scalar.b.as_ptr(), SCALAR_BITS);
        }
    }

    /// Maps a message to a point with the given domain separation tag.
    pub fn map(&mut self, dst: &[u8], message: &[u8]) {
        unsafe {
            blst_hash_to_g2(
                &mut self.0,
                message.as_ptr(),
                message.len(),
                dst.as_ptr(),
                dst.len(),
                ptr::null(),
                0,
            );
        }
    }

    fn as_slice(&self) -> [u8; SIGNATURE_LENGTH] {
        let mut slice = [0u8; SIGNATURE_LENGTH];
        unsafe {
            blst_p2_compress(slice.as_mut_ptr(), &self.0);
        }
        slice
    }
}

impl Encode for Signature {
    fn encoded_len(&self) -> usize {
        SIGNATURE_LENGTH
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.as_slice());
    }
}

impl Decode for Signature {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        if buf.remaining() < SIGNATURE_LENGTH {
            return Err(Error::EndOfBuffer);
        }
        let mut bytes = [0u8; SIGNATURE_LENGTH];
        buf.copy_to_slice(&mut bytes);
        let mut ret = blst_p2::default();
        unsafe {
            let mut affine = blst_p2_affine::default();
            match blst_p2_uncompress(&mut affine, bytes.as_ptr()) {
                BLST_ERROR::BLST_SUCCESS => {}
                _ => return Err(Error::Invalid("Signature", "bad encoding")),
            }
            blst_p2_from_affine(&mut ret, &affine);
            if blst_p2_is_inf(&ret) {
                return Err(Error::Invalid("Signature", "infinity"));
            }
            if !blst_p2_in_g2(&ret) {
                return Err(Error::Invalid("Signature", "outside G2"));
            }
        }
        Ok(Self(ret))
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for Signature {}

impl Hash for Signature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(&self.as_slice());
    }
}

impl Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", utils::hex(&self.as_slice()))
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", utils::hex(&self.as_slice()))
    }
}

/// Verifies that `e(pk, hm)` equals `e(G1::one(), sig)` with a single product
/// check using the negated G1 generator: `e(pk, hm) * e(-G1::one(), sig) == 1`.
pub(super) fn equal(pk: &Public, sig: &Signature, hm: &Signature) -> bool {
    // Messages arrive pre-hashed, so the pairing context carries no DST.
    let mut pairing = Pairing::new(false, &[]);

    let mut q = blst_p2_affine::default();
    unsafe {
        blst_p2_to_affine(&mut q, &sig.0);
        pairing.raw_aggregate(&q, &BLS12_381_NEG_G1);
    }

    let mut p = blst_p1_affine::default();
    let mut q = blst_p2_affine::default();
    unsafe {
        blst_p1_to_affine(&mut p, &pk.0);
        blst_p2_to_affine(&mut q, &hm.0);
    }
    pairing.raw_aggregate(&q, &p);

    pairing.commit();
    pairing.finalverify(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    #[test]
    fn test_scalar_codec() {
        let original = Scalar::rand(&mut thread_rng());
        let encoded = original.encode();
        assert_eq!(encoded.len(), SECRET_KEY_LENGTH);
        let decoded = Scalar::decode(encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_public_codec() {
        let mut original = Public::one();
        original.mul(&Scalar::rand(&mut thread_rng()));
        let encoded = original.encode();
        assert_eq!(encoded.len(), PUBLIC_KEY_LENGTH);
        let decoded = Public::decode(encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_signature_codec() {
        let mut original = Signature::zero();
        original.map(MESSAGE_DST, b"message");
        let encoded = original.encode();
        assert_eq!(encoded.len(), SIGNATURE_LENGTH);
        let decoded = Signature::decode(encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Public::decode(&[0u8; PUBLIC_KEY_LENGTH][..]).is_err());
        assert!(Signature::decode(&[0u8; SIGNATURE_LENGTH][..]).is_err());
        assert!(Scalar::decode(&[0xff; SECRET_KEY_LENGTH][..]).is_err());
        assert!(Public::decode(&[0u8; 7][..]).is_err());
    }

    #[test]
    fn test_blst_compatibility() {
        // Encodings interoperate with the library's high-level min-pk types.
        let secret = Scalar::rand(&mut thread_rng());
        let mut public = Public::one();
        public.mul(&secret);
        blst::min_pk::SecretKey::from_bytes(&secret.as_slice()).unwrap();
        let decoded = blst::min_pk::PublicKey::from_bytes(&public.as_slice()).unwrap();
        decoded.validate().unwrap();
        assert_eq!(decoded.compress(), public.as_slice());
    }
}
