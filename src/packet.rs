//! Data and interest packets.
//!
//! Packets decode strictly: an unrecognized critical TLV aborts decoding, so
//! every packet this crate accepts re-encodes to the exact bytes it was
//! signed over. [Data::signed_portion] is the canonical byte sequence covered
//! by a signature: the Name, MetaInfo, Content, and SignatureInfo TLVs, in
//! order, with the outer header and the SignatureValue excluded.

use crate::{
    codec::{self, varnum, Decode, Encode, Error},
    name::{Component, Name},
    tlv,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use sha2::{Digest as _, Sha256};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// The window during which a certificate's key may be used, in milliseconds
/// since the UNIX epoch, both bounds inclusive. Carried inside the
/// certificate's signature info, so the window is covered by the signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidityPeriod {
    not_before: u64,
    not_after: u64,
}

fn unix_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|since| since.as_millis() as u64)
        .unwrap_or(0)
}

impl ValidityPeriod {
    pub fn new(not_before: SystemTime, not_after: SystemTime) -> Self {
        Self {
            not_before: unix_millis(not_before),
            not_after: unix_millis(not_after),
        }
    }

    /// Returns whether the instant falls inside the window.
    pub fn covers(&self, at: SystemTime) -> bool {
        let at = unix_millis(at);
        self.not_before <= at && at <= self.not_after
    }

    fn value_len(&self) -> usize {
        codec::tlv_len(tlv::NOT_BEFORE, varnum::int_size(self.not_before))
            + codec::tlv_len(tlv::NOT_AFTER, varnum::int_size(self.not_after))
    }

    fn from_value(mut value: Bytes) -> Result<Self, Error> {
        let len = codec::expect(tlv::NOT_BEFORE, &mut value)?;
        let not_before = varnum::read_int(&mut value, len)?;
        let len = codec::expect(tlv::NOT_AFTER, &mut value)?;
        let not_after = varnum::read_int(&mut value, len)?;
        if value.has_remaining() {
            return Err(Error::ExtraData(value.remaining()));
        }
        Ok(Self {
            not_before,
            not_after,
        })
    }
}

impl Encode for ValidityPeriod {
    fn encoded_len(&self) -> usize {
        codec::tlv_len(tlv::VALIDITY_PERIOD, self.value_len())
    }

    fn write(&self, buf: &mut impl BufMut) {
        codec::write_header(tlv::VALIDITY_PERIOD, self.value_len(), buf);
        codec::write_header(tlv::NOT_BEFORE, varnum::int_size(self.not_before), buf);
        varnum::write_int(self.not_before, buf);
        codec::write_header(tlv::NOT_AFTER, varnum::int_size(self.not_after), buf);
        varnum::write_int(self.not_after, buf);
    }
}

impl Decode for ValidityPeriod {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let len = codec::expect(tlv::VALIDITY_PERIOD, buf)?;
        Self::from_value(buf.copy_to_bytes(len))
    }
}

/// Describes how a packet is signed: the signature type, the key locator
/// naming the signing key (or, for a multi-party signature, the signer
/// list), and, on certificates, the key's validity period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureInfo {
    pub sig_type: u16,
    pub key_locator: Option<Name>,
    pub validity_period: Option<ValidityPeriod>,
}

impl SignatureInfo {
    /// Creates a BLS signature info with the given key locator.
    pub fn bls(key_locator: Name) -> Self {
        Self {
            sig_type: tlv::SIGNATURE_SHA256_WITH_BLS,
            key_locator: Some(key_locator),
            validity_period: None,
        }
    }

    pub fn is_bls(&self) -> bool {
        self.sig_type == tlv::SIGNATURE_SHA256_WITH_BLS
    }

    fn value_len(&self) -> usize {
        let mut len = codec::tlv_len(
            tlv::SIGNATURE_TYPE,
            varnum::int_size(self.sig_type as u64),
        );
        if let Some(locator) = &self.key_locator {
            len += codec::tlv_len(tlv::KEY_LOCATOR, locator.encoded_len());
        }
        if let Some(validity) = &self.validity_period {
            len += validity.encoded_len();
        }
        len
    }

    pub(crate) fn encoded_len_as(&self, typ: u64) -> usize {
        codec::tlv_len(typ, self.value_len())
    }

    pub(crate) fn write_as(&self, typ: u64, buf: &mut impl BufMut) {
        codec::write_header(typ, self.value_len(), buf);
        codec::write_header(
            tlv::SIGNATURE_TYPE,
            varnum::int_size(self.sig_type as u64),
            buf,
        );
        varnum::write_int(self.sig_type as u64, buf);
        if let Some(locator) = &self.key_locator {
            codec::write_header(tlv::KEY_LOCATOR, locator.encoded_len(), buf);
            locator.write(buf);
        }
        if let Some(validity) = &self.validity_period {
            validity.write(buf);
        }
    }

    fn from_value(mut value: Bytes) -> Result<Self, Error> {
        let len = codec::expect(tlv::SIGNATURE_TYPE, &mut value)?;
        let sig_type = varnum::read_int(&mut value, len)?;
        let sig_type = u16::try_from(sig_type)
            .map_err(|_| Error::Invalid("signature info", "signature type out of range"))?;
        let mut key_locator = None;
        let mut validity_period = None;
        while value.has_remaining() {
            let (typ, len) = codec::read_header(&mut value)?;
            let field = value.copy_to_bytes(len);
            match typ {
                tlv::KEY_LOCATOR => key_locator = Some(Name::decode(field)?),
                tlv::VALIDITY_PERIOD => {
                    validity_period = Some(ValidityPeriod::from_value(field)?)
                }
                t if codec::is_critical(t) => {
                    return Err(Error::Invalid("signature info", "unrecognized critical element"))
                }
                _ => {}
            }
        }
        Ok(Self {
            sig_type,
            key_locator,
            validity_period,
        })
    }
}

impl Encode for SignatureInfo {
    fn encoded_len(&self) -> usize {
        self.encoded_len_as(tlv::SIGNATURE_INFO)
    }

    fn write(&self, buf: &mut impl BufMut) {
        self.write_as(tlv::SIGNATURE_INFO, buf);
    }
}

impl Decode for SignatureInfo {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let len = codec::expect(tlv::SIGNATURE_INFO, buf)?;
        Self::from_value(buf.copy_to_bytes(len))
    }
}

/// Metadata carried by a data packet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetaInfo {
    pub freshness_period: Option<Duration>,
}

impl MetaInfo {
    fn is_empty(&self) -> bool {
        self.freshness_period.is_none()
    }

    fn value_len(&self) -> usize {
        self.freshness_period
            .map(|period| {
                codec::tlv_len(
                    tlv::FRESHNESS_PERIOD,
                    varnum::int_size(period.as_millis() as u64),
                )
            })
            .unwrap_or(0)
    }

    fn write(&self, buf: &mut impl BufMut) {
        codec::write_header(tlv::META_INFO, self.value_len(), buf);
        if let Some(period) = self.freshness_period {
            let ms = period.as_millis() as u64;
            codec::write_header(tlv::FRESHNESS_PERIOD, varnum::int_size(ms), buf);
            varnum::write_int(ms, buf);
        }
    }

    fn from_value(mut value: Bytes) -> Result<Self, Error> {
        let mut meta = Self::default();
        while value.has_remaining() {
            let (typ, len) = codec::read_header(&mut value)?;
            match typ {
                tlv::FRESHNESS_PERIOD => {
                    let ms = varnum::read_int(&mut value, len)?;
                    meta.freshness_period = Some(Duration::from_millis(ms));
                }
                t if codec::is_critical(t) => {
                    return Err(Error::Invalid("meta info", "unrecognized critical element"))
                }
                _ => value.advance(len),
            }
        }
        Ok(meta)
    }
}

/// A data packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Data {
    pub name: Name,
    pub meta_info: MetaInfo,
    pub content: Bytes,
    pub signature_info: Option<SignatureInfo>,
    pub signature_value: Bytes,
}

impl Data {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            meta_info: MetaInfo::default(),
            content: Bytes::new(),
            signature_info: None,
            signature_value: Bytes::new(),
        }
    }

    /// Returns the canonical bytes covered by this packet's signature.
    ///
    /// The signature info must already be installed: a signature is only
    /// meaningful over a packet whose key locator is fixed.
    pub fn signed_portion(&self) -> Result<Bytes, Error> {
        let info = self
            .signature_info
            .as_ref()
            .ok_or(Error::Invalid("data", "missing signature info"))?;
        Ok(self.signed_portion_with(info))
    }

    /// Returns the canonical bytes this packet would be signed over with the
    /// given signature info installed.
    pub fn signed_portion_with(&self, info: &SignatureInfo) -> Bytes {
        let mut buf = BytesMut::new();
        self.write_signed_elements(info, &mut buf);
        buf.freeze()
    }

    fn write_signed_elements(&self, info: &SignatureInfo, buf: &mut impl BufMut) {
        self.name.write(buf);
        if !self.meta_info.is_empty() {
            self.meta_info.write(buf);
        }
        codec::write_header(tlv::CONTENT, self.content.len(), buf);
        buf.put_slice(&self.content);
        info.write_as(tlv::SIGNATURE_INFO, buf);
    }

    fn signed_len(&self, info: &SignatureInfo) -> usize {
        let mut len = self.name.encoded_len();
        if !self.meta_info.is_empty() {
            len += codec::tlv_len(tlv::META_INFO, self.meta_info.value_len());
        }
        len += codec::tlv_len(tlv::CONTENT, self.content.len());
        len + info.encoded_len_as(tlv::SIGNATURE_INFO)
    }

    fn value_len(&self) -> usize {
        match &self.signature_info {
            Some(info) => {
                self.signed_len(info)
                    + codec::tlv_len(tlv::SIGNATURE_VALUE, self.signature_value.len())
            }
            None => {
                let mut len = self.name.encoded_len();
                if !self.meta_info.is_empty() {
                    len += codec::tlv_len(tlv::META_INFO, self.meta_info.value_len());
                }
                len + codec::tlv_len(tlv::CONTENT, self.content.len())
            }
        }
    }

    /// Returns the complete wire encoding.
    pub fn full_wire(&self) -> Bytes {
        self.encode()
    }

    /// Returns the name extended with the implicit SHA-256 digest of the
    /// complete wire encoding.
    pub fn full_name(&self) -> Name {
        let digest: [u8; 32] = Sha256::digest(self.full_wire()).into();
        self.name.clone().append(Component::implicit_digest(digest))
    }
}

impl Encode for Data {
    fn encoded_len(&self) -> usize {
        codec::tlv_len(tlv::DATA, self.value_len())
    }

    fn write(&self, buf: &mut impl BufMut) {
        codec::write_header(tlv::DATA, self.value_len(), buf);
        match &self.signature_info {
            Some(info) => {
                self.write_signed_elements(info, buf);
                codec::write_header(tlv::SIGNATURE_VALUE, self.signature_value.len(), buf);
                buf.put_slice(&self.signature_value);
            }
            None => {
                self.name.write(buf);
                if !self.meta_info.is_empty() {
                    self.meta_info.write(buf);
                }
                codec::write_header(tlv::CONTENT, self.content.len(), buf);
                buf.put_slice(&self.content);
            }
        }
    }
}

impl Decode for Data {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let len = codec::expect(tlv::DATA, buf)?;
        let mut value = buf.copy_to_bytes(len);
        let name = Name::read(&mut value)?;
        let mut data = Self::new(name);
        while value.has_remaining() {
            let (typ, len) = codec::read_header(&mut value)?;
            let field = value.copy_to_bytes(len);
            match typ {
                tlv::META_INFO => data.meta_info = MetaInfo::from_value(field)?,
                tlv::CONTENT => data.content = field,
                tlv::SIGNATURE_INFO => {
                    data.signature_info = Some(SignatureInfo::from_value(field)?)
                }
                tlv::SIGNATURE_VALUE => data.signature_value = field,
                t if codec::is_critical(t) => {
                    return Err(Error::Invalid("data", "unrecognized critical element"))
                }
                _ => {}
            }
        }
        Ok(data)
    }
}

/// An interest packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interest {
    pub name: Name,
    pub can_be_prefix: bool,
    pub must_be_fresh: bool,
    pub nonce: Option<u32>,
    pub lifetime: Option<Duration>,
    pub application_parameters: Option<Bytes>,
    pub signature_info: Option<SignatureInfo>,
    pub signature_value: Bytes,
}

impl Interest {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            can_be_prefix: false,
            must_be_fresh: false,
            nonce: None,
            lifetime: None,
            application_parameters: None,
            signature_info: None,
            signature_value: Bytes::new(),
        }
    }

    /// Installs application parameters and appends the parameters digest
    /// component to the name.
    pub fn set_application_parameters(&mut self, params: Bytes) {
        self.application_parameters = Some(params);
        self.refresh_params_digest();
    }

    /// Recomputes the trailing parameters-digest name component. Called after
    /// any change to the parameters or the interest signature.
    pub fn refresh_params_digest(&mut self) {
        if self
            .name
            .get_back(0)
            .is_some_and(Component::is_params_digest)
        {
            self.name.pop();
        }
        let digest: [u8; 32] = Sha256::digest(self.params_region()).into();
        self.name.push(Component::params_digest(digest));
    }

    /// The bytes covered by the parameters digest: every element from
    /// ApplicationParameters onward.
    fn params_region(&self) -> Bytes {
        let mut buf = BytesMut::new();
        let params = self.application_parameters.as_deref().unwrap_or(&[]);
        codec::write_header(tlv::APPLICATION_PARAMETERS, params.len(), &mut buf);
        buf.put_slice(params);
        if let Some(info) = &self.signature_info {
            info.write_as(tlv::INTEREST_SIGNATURE_INFO, &mut buf);
            codec::write_header(
                tlv::INTEREST_SIGNATURE_VALUE,
                self.signature_value.len(),
                &mut buf,
            );
            buf.put_slice(&self.signature_value);
        }
        buf.freeze()
    }

    /// Returns the canonical bytes covered by an interest signature: the name
    /// components without the parameters digest, the application parameters,
    /// and the signature info.
    pub fn signed_portion(&self) -> Result<Bytes, Error> {
        let info = self
            .signature_info
            .as_ref()
            .ok_or(Error::Invalid("interest", "missing signature info"))?;
        Ok(self.signed_portion_with(info))
    }

    /// Returns the canonical bytes this interest would be signed over with
    /// the given signature info installed.
    pub fn signed_portion_with(&self, info: &SignatureInfo) -> Bytes {
        let mut buf = BytesMut::new();
        for component in self.name.components() {
            if !component.is_params_digest() {
                component.write(&mut buf);
            }
        }
        let params = self.application_parameters.as_deref().unwrap_or(&[]);
        codec::write_header(tlv::APPLICATION_PARAMETERS, params.len(), &mut buf);
        buf.put_slice(params);
        info.write_as(tlv::INTEREST_SIGNATURE_INFO, &mut buf);
        buf.freeze()
    }

    fn value_len(&self) -> usize {
        let mut len = self.name.encoded_len();
        if self.can_be_prefix {
            len += codec::tlv_len(tlv::CAN_BE_PREFIX, 0);
        }
        if self.must_be_fresh {
            len += codec::tlv_len(tlv::MUST_BE_FRESH, 0);
        }
        if self.nonce.is_some() {
            len += codec::tlv_len(tlv::NONCE, 4);
        }
        if let Some(lifetime) = self.lifetime {
            len += codec::tlv_len(
                tlv::INTEREST_LIFETIME,
                varnum::int_size(lifetime.as_millis() as u64),
            );
        }
        if let Some(params) = &self.application_parameters {
            len += codec::tlv_len(tlv::APPLICATION_PARAMETERS, params.len());
        }
        if let Some(info) = &self.signature_info {
            len += info.encoded_len_as(tlv::INTEREST_SIGNATURE_INFO);
            len += codec::tlv_len(tlv::INTEREST_SIGNATURE_VALUE, self.signature_value.len());
        }
        len
    }
}

impl Encode for Interest {
    fn encoded_len(&self) -> usize {
        codec::tlv_len(tlv::INTEREST, self.value_len())
    }

    fn write(&self, buf: &mut impl BufMut) {
        codec::write_header(tlv::INTEREST, self.value_len(), buf);
        self.name.write(buf);
        if self.can_be_prefix {
            codec::write_header(tlv::CAN_BE_PREFIX, 0, buf);
        }
        if self.must_be_fresh {
            codec::write_header(tlv::MUST_BE_FRESH, 0, buf);
        }
        if let Some(nonce) = self.nonce {
            codec::write_header(tlv::NONCE, 4, buf);
            buf.put_u32(nonce);
        }
        if let Some(lifetime) = self.lifetime {
            let ms = lifetime.as_millis() as u64;
            codec::write_header(tlv::INTEREST_LIFETIME, varnum::int_size(ms), buf);
            varnum::write_int(ms, buf);
        }
        if let Some(params) = &self.application_parameters {
            codec::write_header(tlv::APPLICATION_PARAMETERS, params.len(), buf);
            buf.put_slice(params);
        }
        if let Some(info) = &self.signature_info {
            info.write_as(tlv::INTEREST_SIGNATURE_INFO, buf);
            codec::write_header(tlv::INTEREST_SIGNATURE_VALUE, self.signature_value.len(), buf);
            buf.put_slice(&self.signature_value);
        }
    }
}

impl Decode for Interest {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let len = codec::expect(tlv::INTEREST, buf)?;
        let mut value = buf.copy_to_bytes(len);
        let name = Name::read(&mut value)?;
        let mut interest = Self::new(name);
        while value.has_remaining() {
            let (typ, len) = codec::read_header(&mut value)?;
            let mut field = value.copy_to_bytes(len);
            match typ {
                tlv::CAN_BE_PREFIX => interest.can_be_prefix = true,
                tlv::MUST_BE_FRESH => interest.must_be_fresh = true,
                tlv::NONCE => {
                    if field.len() != 4 {
                        return Err(Error::Invalid("interest", "bad nonce length"));
                    }
                    interest.nonce = Some(field.get_u32());
                }
                tlv::INTEREST_LIFETIME => {
                    let ms = varnum::read_int(&mut field, len)?;
                    interest.lifetime = Some(Duration::from_millis(ms));
                }
                tlv::APPLICATION_PARAMETERS => interest.application_parameters = Some(field),
                tlv::INTEREST_SIGNATURE_INFO => {
                    interest.signature_info = Some(SignatureInfo::from_value(field)?)
                }
                tlv::INTEREST_SIGNATURE_VALUE => interest.signature_value = field,
                t if codec::is_critical(t) => {
                    return Err(Error::Invalid("interest", "unrecognized critical element"))
                }
                _ => {}
            }
        }
        Ok(interest)
    }
}
