use bytes::{BufMut, Bytes, BytesMut};
use serde::{de::DeserializeOwned, Serialize};

use super::{deserializer::WireDeserializer, serializer::WireSerializer};
use crate::{
    consts::{MAXIMUM_PACKET_SIZE, WIRE_VERSION},
    error::EncodingError,
};

/// Encodes one value into a standalone message
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Bytes, EncodingError> {
    encode_limited(value, MAXIMUM_PACKET_SIZE)
}

/// Encodes one value, failing if the message would exceed `limit` bytes
pub fn encode_limited<T: Serialize + ?Sized>(
    value: &T,
    limit: usize,
) -> Result<Bytes, EncodingError> {
    let mut buff = BytesMut::with_capacity(64);
    buff.put_u8(WIRE_VERSION);

    let mut ser = WireSerializer::new(&mut buff);
    value.serialize(&mut ser)?;

    if buff.len() > limit {
        return Err(EncodingError::TooLarge(buff.len(), limit));
    }
    Ok(buff.freeze())
}

/// Decodes a message produced by [`encode`]
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, EncodingError> {
    decode_limited(bytes, MAXIMUM_PACKET_SIZE)
}

/// Decodes a message, rejecting it up front if it is larger than `limit` bytes
pub fn decode_limited<T: DeserializeOwned>(bytes: &[u8], limit: usize) -> Result<T, EncodingError> {
    if bytes.len() > limit {
        return Err(EncodingError::TooLarge(bytes.len(), limit));
    }

    let (version, body) = bytes
        .split_first()
        .ok_or(EncodingError::NotEnoughData(0, 1))?;
    if *version == 0 || *version > WIRE_VERSION {
        return Err(EncodingError::UnsupportedVersion(*version));
    }

    let mut deser = WireDeserializer::new(body);
    let value = T::deserialize(&mut deser)?;

    if deser.remaining() > 0 {
        return Err(EncodingError::TrailingBytes(deser.remaining()));
    }
    Ok(value)
}
