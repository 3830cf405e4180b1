//! Serialization of a session value together with its [`Metadata`].
//!
//! Two codecs are provided. [`JsonCodec`] works with any serde type. [`ProtoCodec`] (feature
//! `proto`) works with protobuf messages and wraps them in a self-describing envelope.

use std::fmt::Debug;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use time::OffsetDateTime;

use crate::error::{Error, Result};

/// Bookkeeping stored alongside the session value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// When this session identity was first created. Never changes afterwards.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the session was last persisted, if ever.
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub updated_at: Option<OffsetDateTime>,
}

impl Metadata {
    pub fn new(created_at: OffsetDateTime) -> Self {
        Self {
            created_at,
            updated_at: None,
        }
    }

    /// The moment idle time is measured from.
    pub fn last_active(&self) -> OffsetDateTime {
        self.updated_at.unwrap_or(self.created_at)
    }
}

/// Converts a session value plus metadata to bytes and back.
pub trait Codec<T>: Debug + Clone + Send + Sync + 'static {
    fn encode(&self, value: &T, metadata: &Metadata) -> Result<Vec<u8>>;

    fn decode(&self, data: &[u8]) -> Result<(T, Metadata)>;
}

/// Structured-text codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonEnvelopeRef<'a, T> {
    data: &'a T,
    #[serde(flatten)]
    metadata: &'a Metadata,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonEnvelope<T> {
    data: T,
    #[serde(flatten)]
    metadata: Metadata,
}

impl<T> Codec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T, metadata: &Metadata) -> Result<Vec<u8>> {
        let envelope = JsonEnvelopeRef {
            data: value,
            metadata,
        };
        serde_json::to_vec(&envelope).map_err(|err| Error::Encode(err.to_string()))
    }

    fn decode(&self, data: &[u8]) -> Result<(T, Metadata)> {
        let envelope: JsonEnvelope<T> =
            serde_json::from_slice(data).map_err(|err| Error::Decode(err.to_string()))?;
        Ok((envelope.data, envelope.metadata))
    }
}

#[cfg(feature = "proto")]
pub use self::proto::ProtoCodec;

#[cfg(feature = "proto")]
mod proto {
    use std::time::SystemTime;

    use prost::Message as _;
    use prost_types::{Any, Timestamp};
    use time::OffsetDateTime;

    use super::{Codec, Metadata};
    use crate::error::{Error, Result};

    /// Binary codec for protobuf session types.
    ///
    /// The value is packed into a `google.protobuf.Any`, so the stored bytes carry the type URL
    /// of the message they hold.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct ProtoCodec;

    #[derive(Clone, PartialEq, prost::Message)]
    struct Envelope {
        #[prost(message, optional, tag = "1")]
        data: Option<Any>,
        #[prost(message, optional, tag = "2")]
        created_at: Option<Timestamp>,
        #[prost(message, optional, tag = "3")]
        updated_at: Option<Timestamp>,
    }

    fn to_timestamp(at: OffsetDateTime) -> Timestamp {
        Timestamp::from(SystemTime::from(at))
    }

    fn from_timestamp(ts: Timestamp) -> Result<OffsetDateTime> {
        let at = SystemTime::try_from(ts).map_err(|err| Error::Decode(err.to_string()))?;
        Ok(OffsetDateTime::from(at))
    }

    impl<T> Codec<T> for ProtoCodec
    where
        T: prost::Message + prost::Name + Default,
    {
        fn encode(&self, value: &T, metadata: &Metadata) -> Result<Vec<u8>> {
            let data = Any::from_msg(value).map_err(|err| Error::Encode(err.to_string()))?;
            let envelope = Envelope {
                data: Some(data),
                created_at: Some(to_timestamp(metadata.created_at)),
                updated_at: metadata.updated_at.map(to_timestamp),
            };
            Ok(envelope.encode_to_vec())
        }

        fn decode(&self, data: &[u8]) -> Result<(T, Metadata)> {
            let envelope =
                Envelope::decode(data).map_err(|err| Error::Decode(err.to_string()))?;

            let value = envelope
                .data
                .ok_or_else(|| Error::Decode("envelope has no data".into()))?
                .to_msg::<T>()
                .map_err(|err| Error::Decode(err.to_string()))?;
            let created_at = envelope
                .created_at
                .ok_or_else(|| Error::Decode("envelope has no creation time".into()))
                .and_then(from_timestamp)?;
            let updated_at = envelope.updated_at.map(from_timestamp).transpose()?;

            Ok((
                value,
                Metadata {
                    created_at,
                    updated_at,
                },
            ))
        }
    }
}
