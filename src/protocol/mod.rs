//! The multi-party signing protocol.
//!
//! An [initiator::Initiator] publishes an unsigned packet inside a signed
//! wrapper, solicits signature shares from each eligible
//! [endpoint::Endpoint], and aggregates the shares once the collected signer
//! set satisfies the governing schema. A [verifier::AsyncVerifier] resolves
//! missing certificates and signer lists over the network before verifying.
//!
//! Every actor is a single `select!` loop on a cooperative runtime: state
//! transitions are atomic between awaits, share arrivals are serialized per
//! session, and dropping an actor drops its registrations and pending
//! operations with it.

use crate::{
    codec::{self, varnum, Decode, Encode, Error},
    name::Name,
    tlv,
};
use bytes::{Buf, BufMut, Bytes};
use std::time::Duration;

pub mod endpoint;
pub mod face;
pub mod initiator;
pub mod keychain;
pub mod mocks;
pub mod verifier;

/// Lifetime of every protocol interest; expiry and nack share one failure
/// path.
pub const TIMEOUT: Duration = Duration::from_secs(4);

/// How long a signer endpoint estimates a share will take.
pub const ESTIMATE_PROCESS_TIME: Duration = Duration::from_secs(1);

/// Default delay before polling a result name when the signer supplied no
/// estimate.
pub fn poll_delay() -> Duration {
    ESTIMATE_PROCESS_TIME + ESTIMATE_PROCESS_TIME / 5
}

/// Hard bound on a signing session: one round trip, processing, and a final
/// round trip.
pub fn session_deadline() -> Duration {
    TIMEOUT + ESTIMATE_PROCESS_TIME + TIMEOUT
}

/// Reserved prefix for deriving per-request HMAC keys; append the request id
/// when used.
pub fn hmac_key_prefix() -> Name {
    Name::new().append("ndn").append("mps").append("hmac")
}

/// Reply status carried in the `Status` TLV as a decimal ASCII string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyCode {
    Processing,
    Ok,
    BadRequest,
    Unauthorized,
    NotFound,
    FailedDependency,
    InternalError,
    Unavailable,
}

impl ReplyCode {
    pub fn code(&self) -> u16 {
        match self {
            Self::Processing => 102,
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::NotFound => 404,
            Self::FailedDependency => 424,
            Self::InternalError => 500,
            Self::Unavailable => 503,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            102 => Some(Self::Processing),
            200 => Some(Self::Ok),
            400 => Some(Self::BadRequest),
            401 => Some(Self::Unauthorized),
            404 => Some(Self::NotFound),
            424 => Some(Self::FailedDependency),
            500 => Some(Self::InternalError),
            503 => Some(Self::Unavailable),
            _ => None,
        }
    }
}

/// The application parameters of a sign request: the full (content-addressed)
/// name of the wrapper packet to fetch and sign.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignRequestParameters {
    pub wrapper_name: Name,
}

impl Encode for SignRequestParameters {
    fn encoded_len(&self) -> usize {
        codec::tlv_len(tlv::PARAMETER_DATA_NAME, self.wrapper_name.encoded_len())
    }

    fn write(&self, buf: &mut impl BufMut) {
        codec::write_header(
            tlv::PARAMETER_DATA_NAME,
            self.wrapper_name.encoded_len(),
            buf,
        );
        self.wrapper_name.write(buf);
    }
}

impl Decode for SignRequestParameters {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let mut wrapper_name = None;
        while buf.has_remaining() {
            let (typ, len) = codec::read_header(buf)?;
            let field = buf.copy_to_bytes(len);
            match typ {
                tlv::PARAMETER_DATA_NAME => wrapper_name = Some(Name::decode(field)?),
                t if codec::is_critical(t) => {
                    return Err(Error::Invalid(
                        "sign request",
                        "unrecognized critical element",
                    ))
                }
                _ => {}
            }
        }
        let wrapper_name =
            wrapper_name.ok_or(Error::Invalid("sign request", "missing wrapper name"))?;
        Ok(Self { wrapper_name })
    }
}

/// The content of every signer reply: the status, and depending on it, a
/// poll estimate, the next result name, or the signature share.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub status: ReplyCode,
    pub result_after: Option<Duration>,
    pub result_name: Option<Name>,
    pub signature_value: Option<Bytes>,
}

impl Reply {
    /// A processing ack: poll `result_name` after `result_after`.
    pub fn processing(result_after: Duration, result_name: Name) -> Self {
        Self {
            status: ReplyCode::Processing,
            result_after: Some(result_after),
            result_name: Some(result_name),
            signature_value: None,
        }
    }

    /// A successful result carrying the signature share.
    pub fn ok(signature_value: Bytes) -> Self {
        Self {
            status: ReplyCode::Ok,
            result_after: None,
            result_name: None,
            signature_value: Some(signature_value),
        }
    }

    /// A terminal error status.
    pub fn error(status: ReplyCode) -> Self {
        Self {
            status,
            result_after: None,
            result_name: None,
            signature_value: None,
        }
    }
}

impl Encode for Reply {
    fn encoded_len(&self) -> usize {
        let mut len = codec::tlv_len(tlv::STATUS, self.status.code().to_string().len());
        if let Some(after) = self.result_after {
            let ms = after.as_millis() as u64;
            len += codec::tlv_len(tlv::RESULT_AFTER, varnum::int_size(ms));
        }
        if let Some(name) = &self.result_name {
            len += codec::tlv_len(tlv::RESULT_NAME, name.encoded_len());
        }
        if let Some(signature) = &self.signature_value {
            len += codec::tlv_len(tlv::BLS_SIG_VALUE, signature.len());
        }
        len
    }

    fn write(&self, buf: &mut impl BufMut) {
        let status = self.status.code().to_string();
        codec::write_header(tlv::STATUS, status.len(), buf);
        buf.put_slice(status.as_bytes());
        if let Some(after) = self.result_after {
            let ms = after.as_millis() as u64;
            codec::write_header(tlv::RESULT_AFTER, varnum::int_size(ms), buf);
            varnum::write_int(ms, buf);
        }
        if let Some(name) = &self.result_name {
            codec::write_header(tlv::RESULT_NAME, name.encoded_len(), buf);
            name.write(buf);
        }
        if let Some(signature) = &self.signature_value {
            codec::write_header(tlv::BLS_SIG_VALUE, signature.len(), buf);
            buf.put_slice(signature);
        }
    }
}

impl Decode for Reply {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let mut status = None;
        let mut result_after = None;
        let mut result_name = None;
        let mut signature_value = None;
        while buf.has_remaining() {
            let (typ, len) = codec::read_header(buf)?;
            let mut field = buf.copy_to_bytes(len);
            match typ {
                tlv::STATUS => {
                    let code = std::str::from_utf8(&field)
                        .ok()
                        .and_then(|s| s.parse::<u16>().ok())
                        .and_then(ReplyCode::from_code)
                        .ok_or(Error::Invalid("reply", "unknown status"))?;
                    status = Some(code);
                }
                tlv::RESULT_AFTER => {
                    let ms = varnum::read_int(&mut field, len)?;
                    result_after = Some(Duration::from_millis(ms));
                }
                tlv::RESULT_NAME => result_name = Some(Name::decode(field)?),
                tlv::BLS_SIG_VALUE => signature_value = Some(field),
                t if codec::is_critical(t) => {
                    return Err(Error::Invalid("reply", "unrecognized critical element"))
                }
                _ => {}
            }
        }
        let status = status.ok_or(Error::Invalid("reply", "missing status"))?;
        Ok(Self {
            status,
            result_after,
            result_name,
            signature_value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_roundtrip() {
        let replies = [
            Reply::processing(
                ESTIMATE_PROCESS_TIME,
                "/signer/mps/result/1".parse().unwrap(),
            ),
            Reply::ok(Bytes::from_static(&[0xaa; 96])),
            Reply::error(ReplyCode::Unauthorized),
        ];
        for reply in replies {
            let decoded = Reply::decode(reply.encode()).unwrap();
            assert_eq!(decoded, reply);
        }
    }

    #[test]
    fn test_reply_rejects_unknown_status() {
        let reply = Reply::error(ReplyCode::NotFound);
        let mut encoded = reply.encode().to_vec();
        // Corrupt the status digits.
        encoded[2] = b'9';
        encoded[3] = b'9';
        encoded[4] = b'9';
        assert!(Reply::decode(&encoded[..]).is_err());
    }

    #[test]
    fn test_sign_request_parameters_roundtrip() {
        let params = SignRequestParameters {
            wrapper_name: "/init/mps/wrapper/00ff".parse().unwrap(),
        };
        let decoded = SignRequestParameters::decode(params.encode()).unwrap();
        assert_eq!(decoded, params);
    }

    #[test]
    fn test_status_codes() {
        for code in [
            ReplyCode::Processing,
            ReplyCode::Ok,
            ReplyCode::BadRequest,
            ReplyCode::Unauthorized,
            ReplyCode::NotFound,
            ReplyCode::FailedDependency,
            ReplyCode::InternalError,
            ReplyCode::Unavailable,
        ] {
            assert_eq!(ReplyCode::from_code(code.code()), Some(code));
        }
        assert_eq!(ReplyCode::from_code(999), None);
    }

    #[test]
    fn test_timing_constants() {
        assert_eq!(poll_delay(), Duration::from_millis(1200));
        assert_eq!(session_deadline(), Duration::from_secs(9));
        assert_eq!(hmac_key_prefix().to_uri(), "/ndn/mps/hmac");
    }
}
