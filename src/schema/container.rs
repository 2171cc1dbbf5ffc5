//! A container of schemas and the trusted signer identities behind them.
//!
//! The container is the initiator's view of the world: which schemas govern
//! which packet names, and which signer keys are trusted to participate.
//! Every search takes unavailability as an explicit parameter rather than
//! container state, so calls are pure and reentrant; candidate order is the
//! map's key order, which keeps results deterministic.

use super::{Error, MultipartySchema};
use crate::{
    bls::{self, ops},
    name::Name,
    signer_list::MpsSignerList,
};
use std::collections::{BTreeMap, BTreeSet};

/// Schemas plus the trusted signer identities they draw from.
#[derive(Clone, Debug, Default)]
pub struct MultipartySchemaContainer {
    pub schemas: Vec<MultipartySchema>,
    pub trusted_ids: BTreeMap<Name, bls::Public>,
}

impl MultipartySchemaContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a trusted signer identity.
    pub fn add_trusted(&mut self, key_name: Name, key: bls::Public) {
        self.trusted_ids.insert(key_name, key);
    }

    /// Returns the first schema governing the given packet name.
    pub fn find(&self, packet_name: &Name) -> Option<&MultipartySchema> {
        self.schemas
            .iter()
            .find(|schema| schema.match_packet(packet_name))
    }

    /// Returns whether the signer set satisfies the schema governing the
    /// packet name. A packet no schema governs is unsatisfiable.
    pub fn is_satisfied(&self, packet_name: &Name, signers: &MpsSignerList) -> bool {
        self.find(packet_name)
            .is_some_and(|schema| schema.is_satisfied(signers.signers()))
    }

    /// Returns a minimal signer set satisfying `schema`, drawn from the
    /// trusted identities minus `unavailable`. Returns an empty list when no
    /// such set exists.
    pub fn available_signers(
        &self,
        schema: &MultipartySchema,
        unavailable: &BTreeSet<Name>,
    ) -> MpsSignerList {
        let available: Vec<Name> = self
            .trusted_ids
            .keys()
            .filter(|name| !unavailable.contains(*name))
            .cloned()
            .collect();
        schema
            .min_signers(&available)
            .map(MpsSignerList::from)
            .unwrap_or_default()
    }

    /// Replaces a signer that became unavailable.
    ///
    /// Drops `lost` from the list; when the remainder still satisfies the
    /// schema, returns it with an empty diff. Otherwise tries each trusted
    /// identity (in key order, skipping members, `lost`, and `unavailable`)
    /// as a single replacement, returning the first restored list together
    /// with the added names. Returns `None` when no replacement restores
    /// satisfaction.
    pub fn replace_signer(
        &self,
        list: &MpsSignerList,
        lost: &Name,
        unavailable: &BTreeSet<Name>,
        schema: &MultipartySchema,
    ) -> Option<(MpsSignerList, Vec<Name>)> {
        let mut remainder = list.clone();
        remainder.remove(lost);
        if schema.is_satisfied(remainder.signers()) {
            return Some((remainder, Vec::new()));
        }
        for candidate in self.trusted_ids.keys() {
            if candidate == lost
                || unavailable.contains(candidate)
                || remainder.contains(candidate)
            {
                continue;
            }
            let mut restored = remainder.clone();
            restored.push(candidate.clone());
            if schema.is_satisfied(restored.signers()) {
                return Some((restored, vec![candidate.clone()]));
            }
        }
        None
    }

    /// Sums the public keys of the listed signers, in list order.
    pub fn aggregate_key(&self, list: &MpsSignerList) -> Result<bls::Public, Error> {
        let mut keys = Vec::with_capacity(list.len());
        for signer in list.iter() {
            let key = self
                .trusted_ids
                .get(signer)
                .ok_or_else(|| Error::UnknownSigner(signer.clone()))?;
            keys.push(*key);
        }
        ops::aggregate_public_keys(&keys).map_err(|_| Error::EmptySignerList)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::WildCardName;
    use rand::thread_rng;

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    fn pattern(s: &str) -> WildCardName {
        s.parse().unwrap()
    }

    fn container(keys: &[&str]) -> MultipartySchemaContainer {
        let mut container = MultipartySchemaContainer::new();
        for key in keys {
            let (_, public) = ops::keypair(&mut thread_rng());
            container.add_trusted(name(key), public);
        }
        container
    }

    #[test]
    fn test_available_signers() {
        let container = container(&["/A/1", "/A/2", "/A/3", "/B/1"]);
        let schema = MultipartySchema {
            signers: vec![pattern("2x/A/_")],
            ..Default::default()
        };
        let list = container.available_signers(&schema, &BTreeSet::new());
        assert_eq!(list.signers(), [name("/A/1"), name("/A/2")]);

        let unavailable = BTreeSet::from([name("/A/1")]);
        let list = container.available_signers(&schema, &unavailable);
        assert_eq!(list.signers(), [name("/A/2"), name("/A/3")]);

        let unavailable = BTreeSet::from([name("/A/1"), name("/A/2"), name("/A/3")]);
        assert!(container.available_signers(&schema, &unavailable).is_empty());
    }

    #[test]
    fn test_replace_signer() {
        let container = container(&["/A/1", "/A/2", "/A/3"]);
        let schema = MultipartySchema {
            signers: vec![pattern("2x/A/_")],
            ..Default::default()
        };
        let list = MpsSignerList::from(vec![name("/A/1"), name("/A/2")]);
        let unavailable = BTreeSet::from([name("/A/1")]);
        let (replaced, diff) = container
            .replace_signer(&list, &name("/A/1"), &unavailable, &schema)
            .unwrap();
        assert_eq!(replaced.signers(), [name("/A/2"), name("/A/3")]);
        assert_eq!(diff, vec![name("/A/3")]);
    }

    #[test]
    fn test_replace_signer_unneeded() {
        // The remainder still satisfies the schema, so nothing is added.
        let container = container(&["/A/1", "/A/2", "/A/3"]);
        let schema = MultipartySchema {
            signers: vec![pattern("2x/A/_")],
            ..Default::default()
        };
        let list = MpsSignerList::from(vec![name("/A/1"), name("/A/2"), name("/A/3")]);
        let (replaced, diff) = container
            .replace_signer(&list, &name("/A/1"), &BTreeSet::new(), &schema)
            .unwrap();
        assert_eq!(replaced.signers(), [name("/A/2"), name("/A/3")]);
        assert!(diff.is_empty());
    }

    #[test]
    fn test_replace_signer_exhausted() {
        let container = container(&["/A/1", "/A/2"]);
        let schema = MultipartySchema {
            signers: vec![pattern("2x/A/_")],
            ..Default::default()
        };
        let list = MpsSignerList::from(vec![name("/A/1"), name("/A/2")]);
        let unavailable = BTreeSet::from([name("/A/1")]);
        assert!(container
            .replace_signer(&list, &name("/A/1"), &unavailable, &schema)
            .is_none());
    }

    #[test]
    fn test_aggregate_key_requires_known_members() {
        let container = container(&["/A/1"]);
        let list = MpsSignerList::from(vec![name("/A/1"), name("/A/2")]);
        assert!(matches!(
            container.aggregate_key(&list),
            Err(Error::UnknownSigner(_))
        ));
        let list = MpsSignerList::from(vec![name("/A/1")]);
        assert!(container.aggregate_key(&list).is_ok());
    }

    #[test]
    fn test_find_schema() {
        let mut container = container(&[]);
        container.schemas.push(MultipartySchema {
            pkt_name: pattern("/data/_"),
            rule_id: "r1".to_string(),
            ..Default::default()
        });
        assert!(container.find(&name("/data/x")).is_some());
        assert!(container.find(&name("/other/x")).is_none());
    }
}
