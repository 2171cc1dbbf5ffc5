//! Signing the protocol's own packets.
//!
//! Wrappers, acks, and signer-list packets are conventional single-signer
//! packets, signed with whatever identity the deploying application gives
//! the actor: a local BLS signer here, or any external key-chain via a
//! custom implementation.

use crate::{
    packet::{Data, Interest},
    signer::MpsSigner,
};
use std::sync::Arc;

/// Signs outgoing protocol packets with the owning party's identity.
pub trait Keychain: Clone + Send + Sync + 'static {
    fn sign_data(&self, data: &mut Data);
    fn sign_interest(&self, interest: &mut Interest);
}

/// A [Keychain] backed by a local BLS signer.
#[derive(Clone)]
pub struct BlsKeychain {
    signer: Arc<MpsSigner>,
}

impl BlsKeychain {
    pub fn new(signer: MpsSigner) -> Self {
        Self {
            signer: Arc::new(signer),
        }
    }

    pub fn signer(&self) -> &MpsSigner {
        &self.signer
    }
}

impl Keychain for BlsKeychain {
    fn sign_data(&self, data: &mut Data) {
        self.signer.sign(data);
    }

    fn sign_interest(&self, interest: &mut Interest) {
        self.signer.sign_interest(interest);
    }
}
