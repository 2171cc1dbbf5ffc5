//! The asynchronous verifier: resolves missing dependencies, then verifies.
//!
//! A verification that is not immediately ready creates a record indexed by
//! each missing dependency name. Arriving certificates pass the injected
//! verification callback before their keys are installed; anything else is
//! treated as a signer list. When a record's last dependency resolves it
//! re-enters verification, possibly fetching further dependencies; the first
//! unrecoverable failure answers every dependent record with `false`.

use super::{
    face::{Face, FaceError},
    TIMEOUT,
};
use crate::{
    bls,
    codec::Decode as _,
    name::Name,
    packet::{Data, Interest},
    schema::MultipartySchema,
    signer_list::MpsSignerList,
    verifier::MpsVerifier,
};
use futures::{
    channel::{mpsc, oneshot},
    stream::FuturesUnordered,
    SinkExt as _, StreamExt as _,
};
use std::{
    collections::{BTreeSet, HashMap},
    future::Future,
    pin::Pin,
    sync::Arc,
    time::SystemTime,
};
use tracing::{debug, warn};

/// Decides whether a fetched certificate is acceptable.
pub type CertVerifier = Arc<dyn Fn(&Data) -> bool + Send + Sync>;

pub struct Config<F: Face> {
    pub face: F,
    pub verifier: MpsVerifier,
    pub verify_cert: CertVerifier,
    pub mailbox_size: usize,
}

enum Message {
    Verify {
        data: Data,
        schema: MultipartySchema,
        result: oneshot::Sender<bool>,
    },
}

/// Submits verifications to a running [AsyncVerifier].
#[derive(Clone)]
pub struct Mailbox {
    sender: mpsc::Sender<Message>,
}

impl Mailbox {
    /// Verifies a packet, fetching missing certificates and signer lists as
    /// needed. Returns `false` on any unrecoverable dependency failure.
    pub async fn verify(&mut self, data: Data, schema: MultipartySchema) -> bool {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(Message::Verify {
                data,
                schema,
                result: tx,
            })
            .await
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }
}

struct Record {
    data: Data,
    schema: MultipartySchema,
    result: oneshot::Sender<bool>,
    items_left: usize,
}

type FetchPool =
    FuturesUnordered<Pin<Box<dyn Future<Output = (Name, Result<Data, FaceError>)> + Send>>>;

/// The asynchronous verifier actor.
pub struct AsyncVerifier<F: Face> {
    face: F,
    verifier: MpsVerifier,
    verify_cert: CertVerifier,
    mailbox: mpsc::Receiver<Message>,
    records: HashMap<u32, Record>,
    index: HashMap<Name, BTreeSet<u32>>,
    inflight: BTreeSet<Name>,
}

impl<F: Face> AsyncVerifier<F> {
    pub fn new(cfg: Config<F>) -> (Self, Mailbox) {
        let (sender, receiver) = mpsc::channel(cfg.mailbox_size);
        (
            Self {
                face: cfg.face,
                verifier: cfg.verifier,
                verify_cert: cfg.verify_cert,
                mailbox: receiver,
                records: HashMap::new(),
                index: HashMap::new(),
                inflight: BTreeSet::new(),
            },
            Mailbox { sender },
        )
    }

    /// Runs the verifier until every mailbox handle is dropped.
    pub async fn run(mut self) {
        let mut fetches: FetchPool = FuturesUnordered::new();
        loop {
            tokio::select! {
                message = self.mailbox.next() => match message {
                    Some(Message::Verify { data, schema, result }) => {
                        self.begin(data, schema, result, &mut fetches)
                    }
                    None => break,
                },
                Some((name, result)) = fetches.next(), if !fetches.is_empty() => {
                    self.on_fetch(name, result, &mut fetches);
                },
            }
        }
        debug!("async verifier shutting down");
    }

    fn begin(
        &mut self,
        data: Data,
        schema: MultipartySchema,
        result: oneshot::Sender<bool>,
        fetches: &mut FetchPool,
    ) {
        if self.verifier.ready_to_verify(&data) {
            let _ = result.send(self.verifier.verify_signature(&data, &schema));
            return;
        }
        let items = self.verifier.items_to_fetch(&data);
        if items.is_empty() {
            // No key locator to chase.
            let _ = result.send(false);
            return;
        }

        let mut id = rand::random::<u32>();
        while self.records.contains_key(&id) {
            id = rand::random();
        }
        for item in &items {
            self.index.entry(item.clone()).or_default().insert(id);
            if self.inflight.insert(item.clone()) {
                let mut face = self.face.clone();
                let item = item.clone();
                fetches.push(Box::pin(async move {
                    let mut interest = Interest::new(item.clone());
                    interest.can_be_prefix = true;
                    interest.must_be_fresh = true;
                    interest.lifetime = Some(TIMEOUT);
                    (item, face.express(interest).await)
                }));
            }
        }
        debug!(id, items = items.len(), "verification pending dependencies");
        self.records.insert(
            id,
            Record {
                data,
                schema,
                result,
                items_left: items.len(),
            },
        );
    }

    fn on_fetch(&mut self, name: Name, result: Result<Data, FaceError>, fetches: &mut FetchPool) {
        self.inflight.remove(&name);
        let data = match result {
            Ok(data) => data,
            Err(err) => {
                warn!(?err, %name, "dependency fetch failed");
                self.fail_dependents(&name);
                return;
            }
        };
        if data.name.is_certificate() {
            // A certificate must declare a validity window and be inside it.
            let current = data
                .signature_info
                .as_ref()
                .and_then(|info| info.validity_period)
                .is_some_and(|validity| validity.covers(SystemTime::now()));
            if !current {
                warn!(%name, "certificate missing or outside its validity period");
                self.fail_dependents(&name);
                return;
            }
            if !(self.verify_cert)(&data) {
                warn!(%name, "certificate failed verification");
                self.fail_dependents(&name);
                return;
            }
            let Ok(key) = bls::Public::decode(data.content.clone()) else {
                warn!(%name, "undecodable certificate key");
                self.fail_dependents(&name);
                return;
            };
            self.verifier.add_cert(name.clone(), key);
        } else {
            let Ok(list) = MpsSignerList::decode(data.content.clone()) else {
                warn!(%name, "undecodable signer list");
                self.fail_dependents(&name);
                return;
            };
            self.verifier.add_signer_list(name.clone(), list);
        }
        self.satisfy(&name, fetches);
    }

    fn satisfy(&mut self, name: &Name, fetches: &mut FetchPool) {
        let Some(ids) = self.index.remove(name) else {
            return;
        };
        for id in ids {
            let resolved = match self.records.get_mut(&id) {
                Some(record) => {
                    record.items_left -= 1;
                    record.items_left == 0
                }
                None => continue,
            };
            if resolved {
                if let Some(record) = self.records.remove(&id) {
                    self.begin(record.data, record.schema, record.result, fetches);
                }
            }
        }
    }

    fn fail_dependents(&mut self, name: &Name) {
        let Some(ids) = self.index.remove(name) else {
            return;
        };
        for id in ids {
            if let Some(record) = self.records.remove(&id) {
                let _ = record.result.send(false);
            }
        }
    }
}
