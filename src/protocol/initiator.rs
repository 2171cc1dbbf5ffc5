//! The initiator: drives a multi-party signing session.
//!
//! A session publishes the unsigned packet inside a signed wrapper, sends a
//! sign request to every eligible signer, polls for their shares, and
//! aggregates the moment the collected signer set satisfies the schema.
//! Failures are per-key: a session aborts only when the surviving candidates
//! can no longer satisfy the schema, or when the session deadline passes
//! first.

use super::{
    face::{Face, FaceError, Incoming},
    keychain::Keychain,
    poll_delay, session_deadline, Reply, ReplyCode, SignRequestParameters, TIMEOUT,
};
use crate::{
    aggregator::MpsAggregator,
    bls,
    codec::{Decode as _, Encode as _},
    name::Name,
    packet::{Data, Interest, SignatureInfo},
    schema::MultipartySchema,
    signer_list::MpsSignerList,
    utils,
    verifier::MpsVerifier,
};
use bytes::Bytes;
use futures::{
    channel::{mpsc, oneshot},
    stream::FuturesUnordered,
    SinkExt as _, StreamExt as _,
};
use rand::RngCore as _;
use std::{
    collections::{BTreeMap, HashMap},
    future::Future,
    pin::Pin,
};
use thiserror::Error;
use tracing::{debug, warn};

/// Why a signing session failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InitiateError {
    #[error("not enough available signers to satisfy schema")]
    SchemaUnsatisfiable,
    #[error("too many signers refused to sign")]
    TooManyRefusals,
    #[error("insufficient signature pieces at deadline; collected {collected} pieces")]
    Deadline { collected: usize },
    #[error("aggregation failed")]
    Aggregation,
    #[error("initiator shut down")]
    Shutdown,
}

pub struct Config<F: Face, K: Keychain> {
    pub face: F,
    /// The prefix wrappers and signer lists are published under.
    pub prefix: Name,
    /// Signs wrappers, sign requests, and signer-list packets.
    pub keychain: K,
    /// Must hold a certificate for every configured signer.
    pub verifier: MpsVerifier,
    /// Signer key name to the endpoint prefix serving it.
    pub signers: BTreeMap<Name, Name>,
    pub mailbox_size: usize,
}

/// The artifacts of a successful session: the fully signed packet and the
/// signer-list packet named by its key locator.
pub type SignOutcome = Result<(Data, Data), InitiateError>;

enum Message {
    Sign {
        schema: MultipartySchema,
        data: Data,
        result: oneshot::Sender<SignOutcome>,
    },
}

/// Submits signing sessions to a running [Initiator].
#[derive(Clone)]
pub struct Mailbox {
    sender: mpsc::Sender<Message>,
}

impl Mailbox {
    /// Runs one multi-party signing session to completion.
    pub async fn sign(&mut self, schema: MultipartySchema, data: Data) -> SignOutcome {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(Message::Sign {
                schema,
                data,
                result: tx,
            })
            .await
            .is_err()
        {
            return Err(InitiateError::Shutdown);
        }
        rx.await.unwrap_or(Err(InitiateError::Shutdown))
    }
}

struct Session {
    schema: MultipartySchema,
    unsigned: Data,
    sig_info: SignatureInfo,
    list_name: Name,
    wrapper: Data,
    wrapper_name: Name,
    available: Vec<Name>,
    pieces: BTreeMap<Name, bls::Signature>,
    result: oneshot::Sender<SignOutcome>,
}

enum Event {
    Reply {
        session: u32,
        key: Name,
        response: Result<Data, FaceError>,
    },
    Deadline {
        session: u32,
    },
}

type EventPool = FuturesUnordered<Pin<Box<dyn Future<Output = Event> + Send>>>;

/// The initiator actor.
pub struct Initiator<F: Face, K: Keychain> {
    face: F,
    prefix: Name,
    keychain: K,
    verifier: MpsVerifier,
    signers: BTreeMap<Name, Name>,
    mailbox: mpsc::Receiver<Message>,
    sessions: HashMap<u32, Session>,
    wrappers: HashMap<Name, u32>,
}

impl<F: Face, K: Keychain> Initiator<F, K> {
    pub fn new(cfg: Config<F, K>) -> (Self, Mailbox) {
        let (sender, receiver) = mpsc::channel(cfg.mailbox_size);
        (
            Self {
                face: cfg.face,
                prefix: cfg.prefix,
                keychain: cfg.keychain,
                verifier: cfg.verifier,
                signers: cfg.signers,
                mailbox: receiver,
                sessions: HashMap::new(),
                wrappers: HashMap::new(),
            },
            Mailbox { sender },
        )
    }

    /// Runs the initiator until every mailbox handle is dropped.
    pub async fn run(mut self) {
        let wrapper_prefix = self.prefix.clone().append("mps").append("wrapper");
        let mut wrapper_requests = self.face.register(wrapper_prefix).await;
        let mut events: EventPool = FuturesUnordered::new();
        loop {
            tokio::select! {
                message = self.mailbox.next() => match message {
                    Some(Message::Sign { schema, data, result }) => {
                        self.start_session(schema, data, result, &mut events)
                    }
                    None => break,
                },
                incoming = wrapper_requests.next() => match incoming {
                    Some(incoming) => self.serve_wrapper(incoming),
                    None => break,
                },
                Some(event) = events.next(), if !events.is_empty() => match event {
                    Event::Reply { session, key, response } => {
                        self.on_reply(session, key, response, &mut events)
                    }
                    Event::Deadline { session } => self.on_deadline(session),
                },
            }
        }
        debug!(prefix = %self.prefix, "initiator shutting down");
    }

    fn start_session(
        &mut self,
        schema: MultipartySchema,
        data: Data,
        result: oneshot::Sender<SignOutcome>,
        events: &mut EventPool,
    ) {
        let candidates: Vec<Name> = self
            .signers
            .keys()
            .filter(|key| !schema.key_matches(key).is_empty())
            .cloned()
            .collect();
        if schema.min_signers(&candidates).is_none() {
            warn!(
                candidates = candidates.len(),
                "not enough available signers to satisfy schema"
            );
            let _ = result.send(Err(InitiateError::SchemaUnsatisfiable));
            return;
        }

        let mut session_id = rand::random::<u32>();
        while self.sessions.contains_key(&session_id) {
            session_id = rand::random();
        }
        let mut wrapper_id = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut wrapper_id);
        let wrapper_id = utils::hex(&wrapper_id);

        // The key locator is fixed before any share is computed; every share
        // and the final aggregate cover the same bytes.
        let list_name = self
            .prefix
            .clone()
            .append("mps")
            .append("signers")
            .append(wrapper_id.as_str());
        let sig_info = SignatureInfo::bls(list_name.clone());
        let mut unsigned = data;
        unsigned.signature_info = Some(sig_info.clone());
        unsigned.signature_value = Bytes::new();

        let mut wrapper = Data::new(
            self.prefix
                .clone()
                .append("mps")
                .append("wrapper")
                .append(wrapper_id.as_str()),
        );
        wrapper.content = unsigned.encode();
        wrapper.meta_info.freshness_period = Some(TIMEOUT);
        self.keychain.sign_data(&mut wrapper);
        let wrapper_name = wrapper.full_name();

        for key in &candidates {
            let Some(endpoint) = self.signers.get(key).cloned() else {
                continue;
            };
            let mut request = Interest::new(endpoint.append("mps").append("sign"));
            request.set_application_parameters(
                SignRequestParameters {
                    wrapper_name: wrapper_name.clone(),
                }
                .encode(),
            );
            request.must_be_fresh = true;
            request.lifetime = Some(TIMEOUT);
            self.keychain.sign_interest(&mut request);

            let mut face = self.face.clone();
            let key = key.clone();
            events.push(Box::pin(async move {
                let response = face.express(request).await;
                Event::Reply {
                    session: session_id,
                    key,
                    response,
                }
            }));
        }
        events.push(Box::pin(async move {
            tokio::time::sleep(session_deadline()).await;
            Event::Deadline {
                session: session_id,
            }
        }));

        debug!(session = session_id, candidates = candidates.len(), "session started");
        self.wrappers.insert(wrapper_name.clone(), session_id);
        self.sessions.insert(
            session_id,
            Session {
                schema,
                unsigned,
                sig_info,
                list_name,
                wrapper,
                wrapper_name,
                available: candidates,
                pieces: BTreeMap::new(),
                result,
            },
        );
    }

    fn serve_wrapper(&mut self, incoming: Incoming) {
        let name = &incoming.interest.name;
        match self
            .wrappers
            .get(name)
            .and_then(|session| self.sessions.get(session))
        {
            Some(session) => incoming.respond(session.wrapper.clone()),
            None => {
                warn!(%name, "unexpected wrapper fetch");
                incoming.nack();
            }
        }
    }

    fn on_reply(
        &mut self,
        session_id: u32,
        key: Name,
        response: Result<Data, FaceError>,
        events: &mut EventPool,
    ) {
        if !self.sessions.contains_key(&session_id) {
            return;
        }
        let data = match response {
            Ok(data) => data,
            Err(err) => {
                debug!(?err, %key, "signer request failed");
                self.lose_key(session_id, &key);
                return;
            }
        };
        let reply = match Reply::decode(data.content.clone()) {
            Ok(reply) => reply,
            Err(err) => {
                debug!(?err, %key, "undecodable signer reply");
                self.lose_key(session_id, &key);
                return;
            }
        };
        match reply.status {
            ReplyCode::Processing => {
                let Some(result_name) = reply.result_name else {
                    debug!(%key, "processing reply without result name");
                    self.lose_key(session_id, &key);
                    return;
                };
                let delay = reply.result_after.unwrap_or_else(poll_delay);
                let mut face = self.face.clone();
                events.push(Box::pin(async move {
                    tokio::time::sleep(delay).await;
                    let mut poll = Interest::new(result_name);
                    poll.can_be_prefix = true;
                    poll.must_be_fresh = true;
                    poll.lifetime = Some(TIMEOUT);
                    let response = face.express(poll).await;
                    Event::Reply {
                        session: session_id,
                        key,
                        response,
                    }
                }));
            }
            ReplyCode::Ok => self.on_share(session_id, key, reply),
            code => {
                debug!(%key, ?code, "signer replied error status");
                self.lose_key(session_id, &key);
            }
        }
    }

    fn on_share(&mut self, session_id: u32, key: Name, reply: Reply) {
        let Some(encoded) = reply.signature_value else {
            debug!(%key, "ok reply without signature value");
            self.lose_key(session_id, &key);
            return;
        };
        let Ok(piece) = bls::Signature::decode(encoded) else {
            debug!(%key, "undecodable signature share");
            self.lose_key(session_id, &key);
            return;
        };
        let satisfied = {
            let Some(session) = self.sessions.get_mut(&session_id) else {
                return;
            };
            if !self.verifier.verify_signature_piece(
                &session.unsigned,
                &session.sig_info,
                &key,
                &piece,
            ) {
                warn!(%key, "invalid signature share");
                None
            } else {
                debug!(%key, collected = session.pieces.len() + 1, "share accepted");
                session.pieces.insert(key.clone(), piece);
                let collected: Vec<Name> = session.pieces.keys().cloned().collect();
                Some(session.schema.is_satisfied(&collected))
            }
        };
        match satisfied {
            None => self.lose_key(session_id, &key),
            Some(true) => self.complete(session_id),
            Some(false) => {}
        }
    }

    fn lose_key(&mut self, session_id: u32, key: &Name) {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return;
        };
        let Some(index) = session.available.iter().position(|k| k == key) else {
            return;
        };
        session.available.remove(index);
        if session.schema.min_signers(&session.available).is_none() {
            warn!(name = %session.unsigned.name, "too many signers refused to sign");
            self.fail(session_id, InitiateError::TooManyRefusals);
        }
    }

    fn fail(&mut self, session_id: u32, error: InitiateError) {
        let Some(session) = self.sessions.remove(&session_id) else {
            return;
        };
        self.wrappers.remove(&session.wrapper_name);
        let _ = session.result.send(Err(error));
    }

    fn complete(&mut self, session_id: u32) {
        let Some(mut session) = self.sessions.remove(&session_id) else {
            return;
        };
        self.wrappers.remove(&session.wrapper_name);

        let list = MpsSignerList::from(session.pieces.keys().cloned().collect::<Vec<_>>());
        let mut list_data = Data::new(session.list_name.clone());
        list_data.content = list.encode();
        list_data.meta_info.freshness_period = session.unsigned.meta_info.freshness_period;
        self.keychain.sign_data(&mut list_data);

        let pieces: Vec<bls::Signature> = session.pieces.values().copied().collect();
        if MpsAggregator::new()
            .build_multi_signature(&mut session.unsigned, &session.sig_info, &pieces)
            .is_err()
        {
            warn!(session = session_id, "aggregation failed");
            let _ = session.result.send(Err(InitiateError::Aggregation));
            return;
        }
        debug!(session = session_id, signers = list.len(), "session complete");
        let _ = session.result.send(Ok((session.unsigned, list_data)));
    }

    fn on_deadline(&mut self, session_id: u32) {
        let Some(session) = self.sessions.get(&session_id) else {
            return;
        };
        let collected: Vec<Name> = session.pieces.keys().cloned().collect();
        if session.schema.is_satisfied(&collected) {
            self.complete(session_id);
        } else {
            warn!(
                collected = collected.len(),
                "insufficient signature pieces at deadline"
            );
            self.fail(
                session_id,
                InitiateError::Deadline {
                    collected: collected.len(),
                },
            );
        }
    }
}
