//! The aggregating role: combining signature shares into one signature.

use crate::{
    bls::{self, ops},
    codec::Encode as _,
    packet::{Data, SignatureInfo},
};

/// Combines collected signature shares into the packet's final signature.
#[derive(Clone, Debug, Default)]
pub struct MpsAggregator;

impl MpsAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Installs `sig_info` on the packet, aggregates the shares, and sets
    /// the signature value, yielding the final wire form.
    ///
    /// Every share must have been produced over the packet's canonical bytes
    /// with exactly this `sig_info` installed; a share made under any other
    /// signature info will not verify.
    pub fn build_multi_signature(
        &self,
        data: &mut Data,
        sig_info: &SignatureInfo,
        pieces: &[bls::Signature],
    ) -> Result<(), bls::Error> {
        data.signature_info = Some(sig_info.clone());
        let aggregate = ops::aggregate_signatures(pieces)?;
        data.signature_value = aggregate.encode();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        name::Name,
        schema::{MultipartySchema, WildCardName},
        signer::MpsSigner,
        signer_list::MpsSignerList,
        verifier::MpsVerifier,
    };
    use crate::codec::Encode as _;

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    fn sample_data() -> Data {
        let mut data = Data::new(name("/a/b/c/d"));
        data.content = name("/1/2/3/4").encode();
        data
    }

    fn two_signer_setup() -> (MpsSigner, MpsSigner, MpsVerifier, MultipartySchema) {
        let signer1 = MpsSigner::from_seed(name("/a/b/c"), 1);
        let signer2 = MpsSigner::from_seed(name("/a/b/d"), 2);
        let mut verifier = MpsVerifier::new();
        verifier.add_cert(signer1.key_name().clone(), *signer1.public());
        verifier.add_cert(signer2.key_name().clone(), *signer2.public());
        let schema = MultipartySchema {
            signers: vec![
                WildCardName::new(signer1.key_name().clone()),
                WildCardName::new(signer2.key_name().clone()),
            ],
            ..Default::default()
        };
        (signer1, signer2, verifier, schema)
    }

    #[test]
    fn test_two_of_two_aggregate() {
        let (signer1, signer2, mut verifier, schema) = two_signer_setup();
        let list_name = name("/some/signer/list");
        verifier.add_signer_list(
            list_name.clone(),
            MpsSignerList::from(vec![
                signer1.key_name().clone(),
                signer2.key_name().clone(),
            ]),
        );

        let mut data = sample_data();
        let info = SignatureInfo::bls(list_name);
        let piece1 = signer1.get_signature(&data, &info).unwrap();
        let piece2 = signer2.get_signature(&data, &info).unwrap();
        assert!(verifier.verify_signature_piece(&data, &info, signer1.key_name(), &piece1));
        assert!(verifier.verify_signature_piece(&data, &info, signer2.key_name(), &piece2));

        MpsAggregator::new()
            .build_multi_signature(&mut data, &info, &[piece1, piece2])
            .unwrap();
        assert!(verifier.verify_signature(&data, &schema));
    }

    #[test]
    fn test_aggregate_rejected_when_list_missing_required_signer() {
        // The signer list omits a required signer, so the schema gate fails
        // before any pairing is attempted.
        let (signer1, signer2, mut verifier, schema) = two_signer_setup();
        let list_name = name("/some/signer/list");
        verifier.add_signer_list(
            list_name.clone(),
            MpsSignerList::from(vec![signer1.key_name().clone()]),
        );

        let mut data = sample_data();
        let info = SignatureInfo::bls(list_name);
        let piece1 = signer1.get_signature(&data, &info).unwrap();
        let piece2 = signer2.get_signature(&data, &info).unwrap();
        MpsAggregator::new()
            .build_multi_signature(&mut data, &info, &[piece1, piece2])
            .unwrap();
        assert!(!verifier.verify_signature(&data, &schema));
    }

    #[test]
    fn test_aggregate_rejected_on_tampered_share() {
        let (signer1, signer2, mut verifier, schema) = two_signer_setup();
        let list_name = name("/some/signer/list");
        verifier.add_signer_list(
            list_name.clone(),
            MpsSignerList::from(vec![
                signer1.key_name().clone(),
                signer2.key_name().clone(),
            ]),
        );

        let mut data = sample_data();
        let info = SignatureInfo::bls(list_name);
        let piece1 = signer1.get_signature(&data, &info).unwrap();
        // The second share is computed over different content.
        let mut mutated = data.clone();
        mutated.content = name("/1/2/3/4/5").encode();
        let piece2 = signer2.get_signature(&mutated, &info).unwrap();
        assert!(!verifier.verify_signature_piece(&data, &info, signer2.key_name(), &piece2));

        MpsAggregator::new()
            .build_multi_signature(&mut data, &info, &[piece1, piece2])
            .unwrap();
        assert!(!verifier.verify_signature(&data, &schema));
    }

    #[test]
    fn test_bit_flip_after_aggregation_rejected() {
        let (signer1, signer2, mut verifier, schema) = two_signer_setup();
        let list_name = name("/some/signer/list");
        verifier.add_signer_list(
            list_name.clone(),
            MpsSignerList::from(vec![
                signer1.key_name().clone(),
                signer2.key_name().clone(),
            ]),
        );

        let mut data = sample_data();
        let info = SignatureInfo::bls(list_name);
        let pieces = [
            signer1.get_signature(&data, &info).unwrap(),
            signer2.get_signature(&data, &info).unwrap(),
        ];
        MpsAggregator::new()
            .build_multi_signature(&mut data, &info, &pieces)
            .unwrap();
        assert!(verifier.verify_signature(&data, &schema));

        let mut content = data.content.to_vec();
        *content.last_mut().unwrap() ^= 0x01;
        data.content = content.into();
        assert!(!verifier.verify_signature(&data, &schema));
    }

    #[test]
    fn test_empty_share_set_rejected() {
        let mut data = sample_data();
        let info = SignatureInfo::bls(name("/some/signer/list"));
        assert!(MpsAggregator::new()
            .build_multi_signature(&mut data, &info, &[])
            .is_err());
    }
}
