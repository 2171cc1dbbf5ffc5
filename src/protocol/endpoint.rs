//! The signer endpoint: serves sign requests and result polling.
//!
//! Each accepted request runs the state machine of one share: `Processing`
//! while the wrapper is fetched and verified, then `Ok` with the share or a
//! terminal error status. State is keyed by a fresh random 64-bit request
//! id; results are served at `<prefix>/mps/result/<id>` and deleted once
//! delivered.

use super::{
    face::{Face, FaceError, Incoming},
    keychain::Keychain,
    Reply, ReplyCode, SignRequestParameters, ESTIMATE_PROCESS_TIME, TIMEOUT,
};
use crate::{
    codec::{Decode as _, Encode as _},
    name::{Component, Name},
    packet::{Data, Interest},
    signer::MpsSigner,
};
use bytes::Bytes;
use futures::{stream::FuturesUnordered, StreamExt as _};
use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};
use tracing::{debug, warn};

/// Decides whether an incoming sign request is authorized.
pub type InterestVerifier = Arc<dyn Fn(&Interest) -> bool + Send + Sync>;

/// Decides whether a fetched unsigned packet may be signed.
pub type DataVerifier = Arc<dyn Fn(&Data) -> bool + Send + Sync>;

pub struct Config<F: Face, K: Keychain> {
    pub face: F,
    /// The prefix this endpoint serves under.
    pub prefix: Name,
    /// The BLS key producing shares.
    pub signer: Arc<MpsSigner>,
    /// Signs the endpoint's own outgoing packets.
    pub keychain: K,
    pub verify_interest: InterestVerifier,
    pub verify_data: DataVerifier,
}

struct RequestState {
    code: ReplyCode,
    version: u64,
    signature: Option<Bytes>,
}

type FetchPool =
    FuturesUnordered<Pin<Box<dyn Future<Output = (u64, Result<Data, FaceError>)> + Send>>>;

/// The signer endpoint actor.
pub struct Endpoint<F: Face, K: Keychain> {
    face: F,
    prefix: Name,
    signer: Arc<MpsSigner>,
    keychain: K,
    verify_interest: InterestVerifier,
    verify_data: DataVerifier,
    results: HashMap<u64, RequestState>,
}

impl<F: Face, K: Keychain> Endpoint<F, K> {
    pub fn new(cfg: Config<F, K>) -> Self {
        Self {
            face: cfg.face,
            prefix: cfg.prefix,
            signer: cfg.signer,
            keychain: cfg.keychain,
            verify_interest: cfg.verify_interest,
            verify_data: cfg.verify_data,
            results: HashMap::new(),
        }
    }

    /// Runs the endpoint until its registrations close.
    pub async fn run(mut self) {
        let sign_prefix = self.prefix.clone().append("mps").append("sign");
        let result_prefix = self.prefix.clone().append("mps").append("result");
        let mut sign_requests = self.face.register(sign_prefix).await;
        let mut result_requests = self.face.register(result_prefix).await;
        let mut fetches: FetchPool = FuturesUnordered::new();
        loop {
            tokio::select! {
                incoming = sign_requests.next() => match incoming {
                    Some(incoming) => self.on_sign_request(incoming, &mut fetches),
                    None => break,
                },
                incoming = result_requests.next() => match incoming {
                    Some(incoming) => self.on_result_fetch(incoming),
                    None => break,
                },
                Some((id, result)) = fetches.next(), if !fetches.is_empty() => {
                    self.on_wrapper(id, result);
                },
            }
        }
        debug!(prefix = %self.prefix, "endpoint shutting down");
    }

    fn on_sign_request(&mut self, incoming: Incoming, fetches: &mut FetchPool) {
        let interest_name = incoming.interest.name.clone();
        if !(self.verify_interest)(&incoming.interest) {
            debug!(name = %interest_name, "sign request failed interest verification");
            incoming.respond(self.ack(interest_name, ReplyCode::Unauthorized, 0));
            return;
        }
        let wrapper_name = match parse_sign_request(&incoming.interest) {
            Ok(name) => name,
            Err(reason) => {
                debug!(name = %interest_name, reason, "malformed sign request");
                incoming.respond(self.ack(interest_name, ReplyCode::BadRequest, 0));
                return;
            }
        };

        let id = rand::random::<u64>();
        self.results.insert(
            id,
            RequestState {
                code: ReplyCode::Processing,
                version: 0,
                signature: None,
            },
        );
        incoming.respond(self.ack(interest_name, ReplyCode::Processing, id));

        let mut face = self.face.clone();
        fetches.push(Box::pin(async move {
            let expected = wrapper_name.clone();
            let mut fetch = Interest::new(wrapper_name);
            fetch.must_be_fresh = true;
            fetch.lifetime = Some(TIMEOUT);
            let result = face.express(fetch).await.and_then(|data| {
                // The wrapper is content-addressed; anything else is a
                // failed dependency.
                if data.full_name() == expected {
                    Ok(data)
                } else {
                    Err(FaceError::Nack)
                }
            });
            (id, result)
        }));
    }

    fn on_wrapper(&mut self, id: u64, result: Result<Data, FaceError>) {
        if !self.results.contains_key(&id) {
            return;
        }
        let outcome = match result {
            Ok(wrapper) => self.process_wrapper(&wrapper),
            Err(err) => {
                debug!(?err, id, "wrapper fetch failed");
                Err(ReplyCode::FailedDependency)
            }
        };
        let Some(state) = self.results.get_mut(&id) else {
            return;
        };
        match outcome {
            Ok(signature) => {
                state.code = ReplyCode::Ok;
                state.signature = Some(signature);
            }
            Err(code) => state.code = code,
        }
    }

    fn process_wrapper(&self, wrapper: &Data) -> Result<Bytes, ReplyCode> {
        let Ok(unsigned) = Data::decode(wrapper.content.clone()) else {
            warn!(wrapper = %wrapper.name, "undecodable wrapped packet");
            return Err(ReplyCode::FailedDependency);
        };
        if !(self.verify_data)(&unsigned) {
            warn!(name = %unsigned.name, "wrapped packet failed verification");
            return Err(ReplyCode::Unauthorized);
        }
        let Some(info) = unsigned.signature_info.clone() else {
            warn!(name = %unsigned.name, "wrapped packet carries no signature info");
            return Err(ReplyCode::FailedDependency);
        };
        match self.signer.get_signature(&unsigned, &info) {
            Ok(share) => Ok(share.encode()),
            Err(err) => {
                warn!(?err, name = %unsigned.name, "share computation failed");
                Err(ReplyCode::InternalError)
            }
        }
    }

    fn on_result_fetch(&mut self, incoming: Incoming) {
        let name = &incoming.interest.name;
        // <prefix>/mps/result/<id>[/v=n]
        let id_index = self.prefix.len() + 2;
        let valid_len = name.len() == id_index + 1
            || (name.len() == id_index + 2 && name.get_back(0).is_some_and(Component::is_version));
        let id = name.get(id_index).and_then(Component::as_number);
        let Some(id) = id.filter(|_| valid_len) else {
            debug!(%name, "bad result request name");
            return; // unparseable: leave the interest to its lifetime
        };
        let Some(state) = self.results.get_mut(&id) else {
            debug!(id, "unknown or completed result id");
            return; // replayed or phished: likewise
        };
        let reply = match state.code {
            ReplyCode::Processing => {
                state.version += 1;
                let next = self
                    .prefix
                    .clone()
                    .append("mps")
                    .append("result")
                    .append(Component::number(id))
                    .append(Component::version(state.version));
                Reply::processing(ESTIMATE_PROCESS_TIME, next)
            }
            ReplyCode::Ok => {
                let signature = state.signature.take().unwrap_or_default();
                self.results.remove(&id);
                Reply::ok(signature)
            }
            code => {
                self.results.remove(&id);
                Reply::error(code)
            }
        };
        let response = self.reply_data(incoming.interest.name.clone(), &reply);
        incoming.respond(response);
    }

    fn ack(&self, interest_name: Name, code: ReplyCode, id: u64) -> Data {
        let reply = match code {
            ReplyCode::Processing => Reply::processing(
                ESTIMATE_PROCESS_TIME,
                self.prefix
                    .clone()
                    .append("mps")
                    .append("result")
                    .append(Component::number(id)),
            ),
            code => Reply::error(code),
        };
        self.reply_data(interest_name, &reply)
    }

    fn reply_data(&self, name: Name, reply: &Reply) -> Data {
        let mut data = Data::new(name);
        data.content = reply.encode();
        data.meta_info.freshness_period = Some(TIMEOUT);
        self.keychain.sign_data(&mut data);
        data
    }
}

fn parse_sign_request(interest: &Interest) -> Result<Name, &'static str> {
    if !interest
        .name
        .get_back(0)
        .is_some_and(Component::is_params_digest)
    {
        return Err("missing parameters digest");
    }
    let Some(params) = &interest.application_parameters else {
        return Err("missing parameters");
    };
    let Ok(params) = SignRequestParameters::decode(params.clone()) else {
        return Err("undecodable parameters");
    };
    if !params
        .wrapper_name
        .get_back(0)
        .is_some_and(Component::is_implicit_digest)
    {
        return Err("wrapper name not content-addressed");
    }
    Ok(params.wrapper_name)
}
