//! The verifying role: certificate and signer-list caches plus signature
//! verification.
//!
//! Both caches are monotone: entries are added on successful dependency
//! fetches and never silently replaced. The aggregate public key is
//! recomputed from the signer list on every verification, so a verifier and
//! an aggregator holding the same list always derive the same key.

use crate::{
    bls::{self, ops},
    codec::Decode as _,
    name::Name,
    packet::{Data, Interest, SignatureInfo},
    schema::MultipartySchema,
    signer_list::MpsSignerList,
};
use std::{collections::BTreeMap, time::SystemTime};
use tracing::debug;

/// A signature info declaring a validity window is only acceptable inside
/// it; one declaring none (ordinary data) is unconstrained.
fn within_validity(info: &SignatureInfo) -> bool {
    info.validity_period
        .map_or(true, |validity| validity.covers(SystemTime::now()))
}

/// Verifies single and multi-party BLS signatures against cached
/// certificates and signer lists.
#[derive(Clone, Debug, Default)]
pub struct MpsVerifier {
    certs: BTreeMap<Name, bls::Public>,
    signer_lists: BTreeMap<Name, MpsSignerList>,
}

impl MpsVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caches a public key under its key name.
    pub fn add_cert(&mut self, key_name: Name, key: bls::Public) {
        self.certs.insert(key_name, key);
    }

    pub fn cert(&self, key_name: &Name) -> Option<&bls::Public> {
        self.certs.get(key_name)
    }

    pub fn has_cert(&self, key_name: &Name) -> bool {
        self.certs.contains_key(key_name)
    }

    /// Caches a signer list under its list name.
    pub fn add_signer_list(&mut self, list_name: Name, list: MpsSignerList) {
        self.signer_lists.insert(list_name, list);
    }

    pub fn signer_list(&self, list_name: &Name) -> Option<&MpsSignerList> {
        self.signer_lists.get(list_name)
    }

    fn locator<'a>(&self, data: &'a Data) -> Option<&'a Name> {
        data.signature_info.as_ref()?.key_locator.as_ref()
    }

    /// Returns whether every input needed to verify the packet is cached:
    /// the key locator resolves either directly to a certificate, or to a
    /// signer list all of whose members have certificates.
    pub fn ready_to_verify(&self, data: &Data) -> bool {
        let Some(locator) = self.locator(data) else {
            return false;
        };
        if self.certs.contains_key(locator) {
            return true;
        }
        match self.signer_lists.get(locator) {
            Some(list) => list.iter().all(|member| self.certs.contains_key(member)),
            None => false,
        }
    }

    /// Returns the names of the packet's missing dependencies: the locator
    /// itself when it resolves to nothing cached, or the member keys still
    /// lacking certificates when it names a known signer list.
    pub fn items_to_fetch(&self, data: &Data) -> Vec<Name> {
        let Some(locator) = self.locator(data) else {
            return Vec::new();
        };
        if self.certs.contains_key(locator) {
            return Vec::new();
        }
        match self.signer_lists.get(locator) {
            Some(list) => list
                .iter()
                .filter(|member| !self.certs.contains_key(member))
                .cloned()
                .collect(),
            None => vec![locator.clone()],
        }
    }

    /// Verifies a multi-party signature against the schema: resolves the
    /// effective signer set from the key locator, requires the schema to be
    /// satisfied by it, and checks the aggregate over the canonical bytes.
    pub fn verify_signature(&self, data: &Data, schema: &MultipartySchema) -> bool {
        let Some(info) = data.signature_info.as_ref() else {
            return false;
        };
        if !within_validity(info) {
            debug!(name = %data.name, "packet outside its validity period");
            return false;
        }
        let Some(locator) = self.locator(data) else {
            return false;
        };
        let members: Vec<Name> = if let Some(list) = self.signer_lists.get(locator) {
            list.signers().to_vec()
        } else if self.certs.contains_key(locator) {
            vec![locator.clone()]
        } else {
            debug!(%locator, "key locator resolves to nothing cached");
            return false;
        };
        if !schema.is_satisfied(&members) {
            debug!(%locator, "signer set does not satisfy schema");
            return false;
        }
        let mut keys = Vec::with_capacity(members.len());
        for member in &members {
            match self.certs.get(member) {
                Some(key) => keys.push(*key),
                None => return false,
            }
        }
        let Ok(signature) = bls::Signature::decode(&data.signature_value[..]) else {
            return false;
        };
        let Ok(portion) = data.signed_portion() else {
            return false;
        };
        ops::fast_aggregate_verify(&keys, &portion, &signature).is_ok()
    }

    /// Verifies one signer's share over the canonicalization of `data` with
    /// `sig_info` installed.
    pub fn verify_signature_piece(
        &self,
        data: &Data,
        sig_info: &SignatureInfo,
        signed_by: &Name,
        piece: &bls::Signature,
    ) -> bool {
        if !sig_info.is_bls() {
            debug!(sig_type = sig_info.sig_type, "share with non-BLS signature type");
            return false;
        }
        let Some(key) = self.certs.get(signed_by) else {
            debug!(%signed_by, "no certificate for share signer");
            return false;
        };
        let mut prepared = data.clone();
        prepared.signature_info = Some(sig_info.clone());
        let Ok(portion) = prepared.signed_portion() else {
            return false;
        };
        ops::verify(key, &portion, piece).is_ok()
    }

    /// Verifies a conventionally signed data packet: the key locator names
    /// the one signing key directly.
    pub fn verify_data(&self, data: &Data) -> bool {
        let Some(info) = data.signature_info.as_ref() else {
            return false;
        };
        if !within_validity(info) {
            debug!(name = %data.name, "packet outside its validity period");
            return false;
        }
        let Some(locator) = self.locator(data) else {
            return false;
        };
        let Some(key) = self.certs.get(locator) else {
            return false;
        };
        let Ok(signature) = bls::Signature::decode(&data.signature_value[..]) else {
            return false;
        };
        let Ok(portion) = data.signed_portion() else {
            return false;
        };
        ops::verify(key, &portion, &signature).is_ok()
    }

    /// Verifies a signed interest.
    pub fn verify_interest(&self, interest: &Interest) -> bool {
        let Some(locator) = interest
            .signature_info
            .as_ref()
            .and_then(|info| info.key_locator.as_ref())
        else {
            return false;
        };
        let Some(key) = self.certs.get(locator) else {
            return false;
        };
        let Ok(signature) = bls::Signature::decode(&interest.signature_value[..]) else {
            return false;
        };
        let Ok(portion) = interest.signed_portion() else {
            return false;
        };
        ops::verify(key, &portion, &signature).is_ok()
    }
}
