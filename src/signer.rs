//! The signing role: one BLS key bound to a signer key name.

use crate::{
    bls::{self, ops, Scalar},
    codec::{Decode as _, Encode as _, Error as CodecError},
    name::{Component, Name},
    packet::{Data, Interest, SignatureInfo, ValidityPeriod},
};
use bytes::Bytes;
use rand::{RngCore, SeedableRng as _};
use rand_chacha::ChaCha20Rng;
use thiserror::Error;

/// Errors produced when signing packets.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unsupported signature type {0}")]
    UnsupportedSignatureType(u16),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Holds one BLS keypair and the key name other parties know it by.
#[derive(Clone)]
pub struct MpsSigner {
    key_name: Name,
    secret: Scalar,
    public: bls::Public,
}

impl MpsSigner {
    /// Generates a fresh keypair from the provided randomness.
    pub fn new<R: RngCore>(key_name: Name, rng: &mut R) -> Self {
        let (secret, public) = ops::keypair(rng);
        Self {
            key_name,
            secret,
            public,
        }
    }

    /// Restores a signer from a serialized secret key.
    pub fn from_secret(key_name: Name, secret: &[u8]) -> Result<Self, Error> {
        let secret = Scalar::decode(secret)?;
        let public = ops::public_key(&secret);
        Ok(Self {
            key_name,
            secret,
            public,
        })
    }

    /// Derives a signer from a seed.
    ///
    /// # Warning
    ///
    /// This function is insecure and should only be used for examples and
    /// testing.
    pub fn from_seed(key_name: Name, seed: u64) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        Self::new(key_name, &mut rng)
    }

    pub fn key_name(&self) -> &Name {
        &self.key_name
    }

    pub fn public(&self) -> &bls::Public {
        &self.public
    }

    /// Returns the public key in its transmission form.
    pub fn public_bytes(&self) -> Bytes {
        self.public.encode()
    }

    /// Produces a signature share: the packet is canonicalized with the
    /// caller-supplied signature info installed and signed as-is. The info
    /// (and in particular its key locator) must be the one the final
    /// aggregate will carry.
    pub fn get_signature(
        &self,
        data: &Data,
        sig_info: &SignatureInfo,
    ) -> Result<bls::Signature, Error> {
        if !sig_info.is_bls() {
            return Err(Error::UnsupportedSignatureType(sig_info.sig_type));
        }
        let portion = data.signed_portion_with(sig_info);
        Ok(ops::sign(&self.secret, &portion))
    }

    /// Signs a data packet with this signer's own key: the key locator names
    /// the signer key directly.
    pub fn sign(&self, data: &mut Data) {
        let info = SignatureInfo::bls(self.key_name.clone());
        let portion = data.signed_portion_with(&info);
        data.signature_info = Some(info);
        data.signature_value = ops::sign(&self.secret, &portion).encode();
    }

    /// Signs an interest packet, installing empty application parameters if
    /// none are present (a signed interest must carry them).
    pub fn sign_interest(&self, interest: &mut Interest) {
        if interest.application_parameters.is_none() {
            interest.set_application_parameters(Bytes::new());
        }
        let info = SignatureInfo::bls(self.key_name.clone());
        let portion = interest.signed_portion_with(&info);
        interest.signature_info = Some(info);
        interest.signature_value = ops::sign(&self.secret, &portion).encode();
        interest.refresh_params_digest();
    }

    /// Produces a self-signed certificate carrying this signer's public key,
    /// named by the certificate convention under the signer key name. The
    /// validity window travels inside the signature info, so it is covered
    /// by the signature; verifiers reject the certificate outside it.
    pub fn self_sign_certificate<R: RngCore>(
        &self,
        validity: ValidityPeriod,
        rng: &mut R,
    ) -> Data {
        let name = self
            .key_name
            .clone()
            .append("KEY")
            .append(Component::number(rng.next_u64()))
            .append("self")
            .append(Component::version(1));
        let mut cert = Data::new(name);
        cert.content = self.public_bytes();
        let mut info = SignatureInfo::bls(self.key_name.clone());
        info.validity_period = Some(validity);
        let portion = cert.signed_portion_with(&info);
        cert.signature_info = Some(info);
        cert.signature_value = ops::sign(&self.secret, &portion).encode();
        cert
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Encode as _;
    use rand::thread_rng;

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    #[test]
    fn test_secret_roundtrip() {
        let signer = MpsSigner::new(name("/a/b/c"), &mut thread_rng());
        let secret = signer.secret.encode();
        let restored = MpsSigner::from_secret(name("/a/b/c"), &secret).unwrap();
        assert_eq!(restored.public(), signer.public());
        assert_eq!(restored.key_name(), &name("/a/b/c"));
    }

    #[test]
    fn test_from_secret_rejects_garbage() {
        assert!(MpsSigner::from_secret(name("/a"), &[0u8; 16]).is_err());
        assert!(MpsSigner::from_secret(name("/a"), &[0xff; 32]).is_err());
    }

    #[test]
    fn test_from_seed_is_deterministic() {
        let one = MpsSigner::from_seed(name("/a"), 42);
        let two = MpsSigner::from_seed(name("/a"), 42);
        let other = MpsSigner::from_seed(name("/a"), 43);
        assert_eq!(one.public(), two.public());
        assert_ne!(one.public(), other.public());
    }

    #[test]
    fn test_sign_attaches_value() {
        let signer = MpsSigner::from_seed(name("/a/b/c"), 1);
        let mut data = Data::new(name("/a/b/c/d"));
        data.content = Bytes::from_static(b"content");
        signer.sign(&mut data);
        assert_eq!(
            data.signature_value.len(),
            crate::bls::group::SIGNATURE_LENGTH
        );
        let info = data.signature_info.as_ref().unwrap();
        assert!(info.is_bls());
        assert_eq!(info.key_locator.as_ref().unwrap(), signer.key_name());
    }

    #[test]
    fn test_get_signature_rejects_non_bls() {
        let signer = MpsSigner::from_seed(name("/a/b/c"), 1);
        let data = Data::new(name("/a/b/c/d"));
        let info = SignatureInfo {
            sig_type: 0,
            key_locator: None,
            validity_period: None,
        };
        assert!(matches!(
            signer.get_signature(&data, &info),
            Err(Error::UnsupportedSignatureType(0))
        ));
    }

    #[test]
    fn test_certificate_convention() {
        let signer = MpsSigner::from_seed(name("/a/b/c"), 1);
        let now = std::time::SystemTime::now();
        let validity = ValidityPeriod::new(
            now - std::time::Duration::from_secs(1),
            now + std::time::Duration::from_secs(3600),
        );
        let cert = signer.self_sign_certificate(validity, &mut thread_rng());
        assert!(cert.name.is_certificate());
        assert!(cert.name.starts_with(&name("/a/b/c/KEY")));
        assert_eq!(cert.content, signer.public_bytes());
        let info = cert.signature_info.as_ref().unwrap();
        assert_eq!(info.key_locator.as_ref().unwrap(), signer.key_name());
        assert_eq!(info.validity_period, Some(validity));
    }
}
