//! Hierarchical names built from typed components.
//!
//! A [Name] is an ordered sequence of typed [Component]s with a canonical
//! URI form (`/a/b/v=3`). Names are compared componentwise by type number,
//! then value length, then value bytes, which makes map iteration order
//! deterministic wherever names are used as keys.

use crate::codec::{self, varnum, Decode, Encode, Error};
use crate::tlv;
use crate::utils;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::{
    cmp::Ordering,
    fmt::{self, Debug, Display, Write as _},
    str::FromStr,
};

/// One typed name component.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Component {
    typ: u64,
    value: Bytes,
}

impl Component {
    /// Creates a generic component from raw bytes.
    pub fn generic(value: impl Into<Bytes>) -> Self {
        Self {
            typ: tlv::GENERIC_NAME_COMPONENT,
            value: value.into(),
        }
    }

    /// Creates a generic component holding a nonnegative integer.
    pub fn number(value: u64) -> Self {
        let mut buf = BytesMut::with_capacity(varnum::int_size(value));
        varnum::write_int(value, &mut buf);
        Self {
            typ: tlv::GENERIC_NAME_COMPONENT,
            value: buf.freeze(),
        }
    }

    /// Creates a version component.
    pub fn version(version: u64) -> Self {
        let mut buf = BytesMut::with_capacity(varnum::int_size(version));
        varnum::write_int(version, &mut buf);
        Self {
            typ: tlv::VERSION_NAME_COMPONENT,
            value: buf.freeze(),
        }
    }

    /// Creates an implicit SHA-256 digest component.
    pub fn implicit_digest(digest: [u8; 32]) -> Self {
        Self {
            typ: tlv::IMPLICIT_SHA256_DIGEST_COMPONENT,
            value: Bytes::copy_from_slice(&digest),
        }
    }

    /// Creates a parameters SHA-256 digest component.
    pub fn params_digest(digest: [u8; 32]) -> Self {
        Self {
            typ: tlv::PARAMETERS_SHA256_DIGEST_COMPONENT,
            value: Bytes::copy_from_slice(&digest),
        }
    }

    /// Returns the component's TLV type number.
    pub fn typ(&self) -> u64 {
        self.typ
    }

    /// Returns the component's value bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn is_generic(&self) -> bool {
        self.typ == tlv::GENERIC_NAME_COMPONENT
    }

    pub fn is_implicit_digest(&self) -> bool {
        self.typ == tlv::IMPLICIT_SHA256_DIGEST_COMPONENT && self.value.len() == 32
    }

    pub fn is_params_digest(&self) -> bool {
        self.typ == tlv::PARAMETERS_SHA256_DIGEST_COMPONENT && self.value.len() == 32
    }

    pub fn is_version(&self) -> bool {
        self.typ == tlv::VERSION_NAME_COMPONENT
    }

    /// Interprets the value as a nonnegative integer, if it is one.
    pub fn as_number(&self) -> Option<u64> {
        let mut value = self.value.clone();
        varnum::read_int(&mut value, self.value.len()).ok()
    }
}

impl From<&str> for Component {
    /// Creates a generic component from a literal string, without URI
    /// unescaping.
    fn from(value: &str) -> Self {
        Self::generic(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        self.typ
            .cmp(&other.typ)
            .then_with(|| self.value.len().cmp(&other.value.len()))
            .then_with(|| self.value.cmp(&other.value))
    }
}

impl Encode for Component {
    fn encoded_len(&self) -> usize {
        codec::tlv_len(self.typ, self.value.len())
    }

    fn write(&self, buf: &mut impl BufMut) {
        codec::write_header(self.typ, self.value.len(), buf);
        buf.put_slice(&self.value);
    }
}

impl Decode for Component {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let (typ, len) = codec::read_header(buf)?;
        Ok(Self {
            typ,
            value: buf.copy_to_bytes(len),
        })
    }
}

impl Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.typ {
            tlv::GENERIC_NAME_COMPONENT => write_escaped(f, &self.value),
            tlv::IMPLICIT_SHA256_DIGEST_COMPONENT => {
                write!(f, "sha256digest={}", utils::hex(&self.value))
            }
            tlv::PARAMETERS_SHA256_DIGEST_COMPONENT => {
                write!(f, "params-sha256={}", utils::hex(&self.value))
            }
            tlv::VERSION_NAME_COMPONENT => match self.as_number() {
                Some(version) => write!(f, "v={version}"),
                None => write!(f, "v=0x{}", utils::hex(&self.value)),
            },
            typ => {
                write!(f, "{typ}=")?;
                write_escaped(f, &self.value)
            }
        }
    }
}

impl Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, value: &[u8]) -> fmt::Result {
    for &byte in value {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            f.write_char(byte as char)?;
        } else {
            write!(f, "%{byte:02X}")?;
        }
    }
    Ok(())
}

fn unescape(segment: &str) -> Result<Bytes, Error> {
    let raw = segment.as_bytes();
    let mut out = BytesMut::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' {
            let hex = segment
                .get(i + 1..i + 3)
                .ok_or(Error::Invalid("name", "truncated percent escape"))?;
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| Error::Invalid("name", "bad percent escape"))?;
            out.put_u8(byte);
            i += 3;
        } else {
            out.put_u8(raw[i]);
            i += 1;
        }
    }
    Ok(out.freeze())
}

fn parse_component(segment: &str) -> Result<Component, Error> {
    if segment.is_empty() {
        return Err(Error::Invalid("name", "empty component"));
    }
    if let Some(hex) = segment.strip_prefix("sha256digest=") {
        let digest: [u8; 32] = utils::from_hex(hex)
            .and_then(|b| b.try_into().ok())
            .ok_or(Error::Invalid("name", "bad digest component"))?;
        return Ok(Component::implicit_digest(digest));
    }
    if let Some(hex) = segment.strip_prefix("params-sha256=") {
        let digest: [u8; 32] = utils::from_hex(hex)
            .and_then(|b| b.try_into().ok())
            .ok_or(Error::Invalid("name", "bad digest component"))?;
        return Ok(Component::params_digest(digest));
    }
    if let Some(version) = segment.strip_prefix("v=") {
        let version = version
            .parse::<u64>()
            .map_err(|_| Error::Invalid("name", "bad version component"))?;
        return Ok(Component::version(version));
    }
    if let Some((typ, rest)) = segment.split_once('=') {
        if let Ok(typ) = typ.parse::<u64>() {
            return Ok(Component {
                typ,
                value: unescape(rest)?,
            });
        }
    }
    Ok(Component::generic(unescape(segment)?))
}

/// A hierarchical name: an ordered sequence of typed components.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Name {
    components: Vec<Component>,
}

impl Name {
    /// Creates an empty name.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns the component at the given position.
    pub fn get(&self, index: usize) -> Option<&Component> {
        self.components.get(index)
    }

    /// Returns the component at the given position from the back: 0 is the
    /// last component.
    pub fn get_back(&self, index: usize) -> Option<&Component> {
        self.len().checked_sub(index + 1).and_then(|i| self.get(i))
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Appends a component, returning the extended name.
    pub fn append(mut self, component: impl Into<Component>) -> Self {
        self.components.push(component.into());
        self
    }

    /// Pushes a component in place.
    pub fn push(&mut self, component: impl Into<Component>) {
        self.components.push(component.into());
    }

    /// Removes and returns the last component.
    pub fn pop(&mut self) -> Option<Component> {
        self.components.pop()
    }

    /// Returns the first `len` components as a new name.
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            components: self.components[..len.min(self.len())].to_vec(),
        }
    }

    /// Returns whether `prefix` is a prefix of this name.
    pub fn starts_with(&self, prefix: &Name) -> bool {
        self.len() >= prefix.len() && self.components[..prefix.len()] == prefix.components
    }

    /// Returns whether this name follows the certificate naming convention:
    /// at least four components with `KEY` fourth from the back
    /// (`<subject>/KEY/<key-id>/<issuer>/<version>`).
    pub fn is_certificate(&self) -> bool {
        self.get_back(3)
            .is_some_and(|c| c.is_generic() && c.value() == b"KEY")
    }

    /// Returns the canonical URI form.
    pub fn to_uri(&self) -> String {
        self.to_string()
    }
}

impl From<Vec<Component>> for Name {
    fn from(components: Vec<Component>) -> Self {
        Self { components }
    }
}

impl FromIterator<Component> for Name {
    fn from_iter<T: IntoIterator<Item = Component>>(iter: T) -> Self {
        Self {
            components: iter.into_iter().collect(),
        }
    }
}

impl Encode for Name {
    fn encoded_len(&self) -> usize {
        codec::tlv_len(tlv::NAME, self.value_len())
    }

    fn write(&self, buf: &mut impl BufMut) {
        codec::write_header(tlv::NAME, self.value_len(), buf);
        for component in &self.components {
            component.write(buf);
        }
    }
}

impl Name {
    fn value_len(&self) -> usize {
        self.components.iter().map(Encode::encoded_len).sum()
    }
}

impl Decode for Name {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let len = codec::expect(tlv::NAME, buf)?;
        let mut value = buf.copy_to_bytes(len);
        let mut components = Vec::new();
        while value.has_remaining() {
            components.push(Component::read(&mut value)?);
        }
        Ok(Self { components })
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return f.write_char('/');
        }
        for component in &self.components {
            f.write_char('/')?;
            Display::fmt(component, f)?;
        }
        Ok(())
    }
}

impl Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix('/')
            .ok_or(Error::Invalid("name", "missing leading slash"))?;
        if rest.is_empty() {
            return Ok(Self::new());
        }
        rest.split('/').map(parse_component).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    #[test]
    fn test_uri_roundtrip() {
        for uri in ["/", "/a/b/c", "/a/_/c", "/hello-world/x~y", "/a/v=42"] {
            assert_eq!(name(uri).to_uri(), uri);
        }
    }

    #[test]
    fn test_escaping() {
        let n = Name::new().append(Component::generic(&b"a b/c"[..]));
        assert_eq!(n.to_uri(), "/a%20b%2Fc");
        assert_eq!(name("/a%20b%2Fc"), n);
    }

    #[test]
    fn test_digest_components() {
        let digest = [0xab; 32];
        let n = Name::new()
            .append("wrapper")
            .append(Component::implicit_digest(digest));
        let uri = n.to_uri();
        assert!(uri.ends_with(&format!("sha256digest={}", "ab".repeat(32))));
        assert_eq!(name(&uri), n);
        assert!(n.get_back(0).unwrap().is_implicit_digest());
    }

    #[test]
    fn test_rejects_bad_uris() {
        assert!("a/b".parse::<Name>().is_err());
        assert!("/a//b".parse::<Name>().is_err());
        assert!("/a%2".parse::<Name>().is_err());
        assert!("/sha256digest=1234".parse::<Name>().is_err());
    }

    #[test]
    fn test_tlv_roundtrip() {
        let n = name("/a/b").append(Component::version(7));
        let encoded = n.encode();
        assert_eq!(Name::decode(encoded).unwrap(), n);
    }

    #[test]
    fn test_prefix_relations() {
        let n = name("/a/b/c");
        assert!(n.starts_with(&name("/")));
        assert!(n.starts_with(&name("/a/b")));
        assert!(n.starts_with(&n));
        assert!(!n.starts_with(&name("/a/c")));
        assert!(!name("/a").starts_with(&n));
        assert_eq!(n.prefix(2), name("/a/b"));
    }

    #[test]
    fn test_number_components() {
        let c = Component::number(0x1234);
        assert_eq!(c.as_number(), Some(0x1234));
        assert!(c.is_generic());
        let v = Component::version(3);
        assert!(v.is_version());
        assert_eq!(v.as_number(), Some(3));
    }

    #[test]
    fn test_certificate_convention() {
        assert!(name("/a/b/c/KEY/1/self/v=1").is_certificate());
        assert!(name("/KEY/1/self/v=1").is_certificate());
        assert!(!name("/a/b/c").is_certificate());
        assert!(!name("/a/KEY/1").is_certificate());
    }

    #[test]
    fn test_canonical_order() {
        // Shorter values sort first, then bytewise.
        let mut names = vec![name("/b"), name("/aa"), name("/a"), name("/a/b")];
        names.sort();
        assert_eq!(
            names,
            vec![name("/a"), name("/a/b"), name("/b"), name("/aa")]
        );
    }
}
