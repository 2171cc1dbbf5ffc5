//! The ordered list of signer key names behind an aggregate signature.
//!
//! The list's wire order is the order in which verifiers sum the member
//! public keys, so the list as transmitted is the authoritative description
//! of the aggregate key. Duplicate entries are not permitted: a duplicated
//! key would let one signer masquerade as two.

use crate::{
    codec::{self, Decode, Encode, Error},
    name::Name,
    tlv,
};
use bytes::{Buf, BufMut};

/// An ordered, duplicate-free sequence of signer key names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MpsSignerList {
    signers: Vec<Name>,
}

impl MpsSignerList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signers(&self) -> &[Name] {
        &self.signers
    }

    pub fn len(&self) -> usize {
        self.signers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.signers.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Name> {
        self.signers.iter()
    }

    /// Appends a signer. Returns `false` (and leaves the list unchanged) if
    /// the name is already a member.
    pub fn push(&mut self, name: Name) -> bool {
        if self.contains(&name) {
            return false;
        }
        self.signers.push(name);
        true
    }

    /// Removes a signer, returning whether it was present.
    pub fn remove(&mut self, name: &Name) -> bool {
        let before = self.signers.len();
        self.signers.retain(|member| member != name);
        before != self.signers.len()
    }

    fn value_len(&self) -> usize {
        self.signers.iter().map(Encode::encoded_len).sum()
    }
}

impl From<Vec<Name>> for MpsSignerList {
    /// Builds a list from names, dropping duplicates while preserving the
    /// order of first occurrence.
    fn from(names: Vec<Name>) -> Self {
        let mut list = Self::new();
        for name in names {
            list.push(name);
        }
        list
    }
}

impl IntoIterator for MpsSignerList {
    type Item = Name;
    type IntoIter = std::vec::IntoIter<Name>;

    fn into_iter(self) -> Self::IntoIter {
        self.signers.into_iter()
    }
}

impl Encode for MpsSignerList {
    fn encoded_len(&self) -> usize {
        codec::tlv_len(tlv::MPS_SIGNER_LIST, self.value_len())
    }

    fn write(&self, buf: &mut impl BufMut) {
        codec::write_header(tlv::MPS_SIGNER_LIST, self.value_len(), buf);
        for signer in &self.signers {
            signer.write(buf);
        }
    }
}

impl Decode for MpsSignerList {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let len = codec::expect(tlv::MPS_SIGNER_LIST, buf)?;
        let mut value = buf.copy_to_bytes(len);
        let mut list = Self::new();
        while value.has_remaining() {
            let name = Name::read(&mut value)?;
            if !list.push(name) {
                return Err(Error::Invalid("signer list", "duplicate signer"));
            }
        }
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let list = MpsSignerList::from(vec![name("/a/b/c"), name("/a/b/d")]);
        let decoded = MpsSignerList::decode(list.encode()).unwrap();
        assert_eq!(decoded, list);
        assert_eq!(decoded.signers(), [name("/a/b/c"), name("/a/b/d")]);
    }

    #[test]
    fn test_dedup_on_build() {
        let list = MpsSignerList::from(vec![name("/a"), name("/b"), name("/a")]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.signers(), [name("/a"), name("/b")]);
    }

    #[test]
    fn test_decode_rejects_duplicates() {
        let mut duplicated = MpsSignerList::new();
        duplicated.signers = vec![name("/a"), name("/a")];
        assert!(matches!(
            MpsSignerList::decode(duplicated.encode()),
            Err(Error::Invalid(_, _))
        ));
    }

    #[test]
    fn test_remove() {
        let mut list = MpsSignerList::from(vec![name("/a"), name("/b")]);
        assert!(list.remove(&name("/a")));
        assert!(!list.remove(&name("/a")));
        assert_eq!(list.signers(), [name("/b")]);
    }
}
