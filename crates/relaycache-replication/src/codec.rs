//! Optional encode/decode hooks for values crossing the wire.
//!
//! Without a codec, values travel as [`Payload::Value`] and the transport is
//! trusted to carry them as-is. With one, the authority encodes every value
//! it serves and replicas decode before storing.

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CodecError;

/// A value as carried by a pull response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload<V> {
    /// Passed through unmodified.
    Value(V),
    /// Produced by the authority's encoder.
    Encoded(Vec<u8>),
}

impl<V> Payload<V> {
    pub fn is_encoded(&self) -> bool {
        matches!(self, Payload::Encoded(_))
    }
}

/// Value <-> bytes conversion applied at the replication boundary.
pub trait Codec<V>: Send + Sync {
    fn encode(&self, value: &V) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<V, CodecError>;
}

/// A codec built from a pair of closures.
pub struct FnCodec<E, D> {
    encode: E,
    decode: D,
}

impl<E, D> FnCodec<E, D> {
    pub fn new(encode: E, decode: D) -> Self {
        Self { encode, decode }
    }
}

impl<V, E, D> Codec<V> for FnCodec<E, D>
where
    E: Fn(&V) -> Result<Vec<u8>, CodecError> + Send + Sync,
    D: Fn(&[u8]) -> Result<V, CodecError> + Send + Sync,
{
    fn encode(&self, value: &V) -> Result<Vec<u8>, CodecError> {
        (self.encode)(value)
    }

    fn decode(&self, bytes: &[u8]) -> Result<V, CodecError> {
        (self.decode)(bytes)
    }
}

impl<E, D> fmt::Debug for FnCodec<E, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCodec").finish_non_exhaustive()
    }
}

/// JSON codec for any serde value.
pub struct JsonCodec<V> {
    _value: PhantomData<fn() -> V>,
}

impl<V> JsonCodec<V> {
    pub fn new() -> Self {
        Self {
            _value: PhantomData,
        }
    }
}

impl<V> Default for JsonCodec<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for JsonCodec<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JsonCodec")
    }
}

impl<V> Codec<V> for JsonCodec<V>
where
    V: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &V) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<V, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Score {
        player: String,
        points: u32,
    }

    #[test]
    fn test_json_codec_encodes_as_json_text() {
        let codec = JsonCodec::<Score>::new();
        let bytes = codec
            .encode(&Score {
                player: "ana".into(),
                points: 42,
            })
            .unwrap();
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            r#"{"player":"ana","points":42}"#
        );
    }

    #[test]
    fn test_json_codec_rejects_garbage() {
        let codec = JsonCodec::<Score>::new();
        let err = codec.decode(b"not json").unwrap_err();
        assert!(matches!(err, CodecError::Json(_)));
    }

    #[test]
    fn test_fn_codec_uses_closures() {
        let codec = FnCodec::new(
            |v: &u32| -> Result<Vec<u8>, CodecError> { Ok(v.to_be_bytes().to_vec()) },
            |b: &[u8]| -> Result<u32, CodecError> {
                let arr: [u8; 4] = b.try_into().map_err(|_| CodecError::decode("want 4 bytes"))?;
                Ok(u32::from_be_bytes(arr))
            },
        );

        let bytes = Codec::<u32>::encode(&codec, &7).unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 7]);
        assert!(matches!(
            Codec::<u32>::decode(&codec, &[1, 2]),
            Err(CodecError::Decode(_))
        ));
    }

    #[test]
    fn test_payload_is_encoded() {
        assert!(Payload::<u32>::Encoded(vec![1]).is_encoded());
        assert!(!Payload::Value(1u32).is_encoded());
    }
}
