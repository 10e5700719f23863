use bytes::Buf;
use serde::{
    de::{
        value::BorrowedStrDeserializer, DeserializeSeed, EnumAccess, IgnoredAny, MapAccess,
        SeqAccess, VariantAccess, Visitor,
    },
    forward_to_deserialize_any, Deserialize, Deserializer,
};

use super::tag;
use crate::{consts::MAXIMUM_NESTING_DEPTH, error::EncodingError};

/// Reads values written by [`super::serializer::WireSerializer`].
///
/// Every read is bounds checked, malformed input turns into an [`EncodingError`].
pub struct WireDeserializer<'de> {
    pub input: &'de [u8],
    pub consumed: usize,
    depth: usize,
}

impl<'de> WireDeserializer<'de> {
    pub fn new(input: &'de [u8]) -> Self {
        Self {
            input,
            consumed: 0,
            depth: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.input.len()
    }

    fn take(&mut self, len: usize) -> Result<&'de [u8], EncodingError> {
        if self.input.len() < len {
            return Err(EncodingError::NotEnoughData(self.input.len(), len));
        }
        let (head, tail) = self.input.split_at(len);
        self.input = tail;
        self.consumed += len;
        Ok(head)
    }

    fn get_u8(&mut self) -> Result<u8, EncodingError> {
        Ok(self.take(1)?.get_u8())
    }

    fn get_len(&mut self) -> Result<usize, EncodingError> {
        let len = self.take(4)?.get_u32();
        Ok(len.try_into()?)
    }

    /// Reads an element count, every element takes at least one byte
    fn get_count(&mut self) -> Result<usize, EncodingError> {
        let count = self.get_len()?;
        if count > self.remaining() {
            return Err(EncodingError::NotEnoughData(self.remaining(), count));
        }
        Ok(count)
    }

    fn get_name(&mut self) -> Result<&'de str, EncodingError> {
        let len: usize = self.get_u8()?.into();
        Ok(std::str::from_utf8(self.take(len)?)?)
    }

    fn expect_tag(&mut self, expected: u8) -> Result<(), EncodingError> {
        match self.get_u8()? {
            tag if tag == expected => Ok(()),
            tag => Err(EncodingError::UnexpectedTag(tag)),
        }
    }

    fn enter(&mut self) -> Result<(), EncodingError> {
        self.depth += 1;
        if self.depth > MAXIMUM_NESTING_DEPTH {
            return Err(EncodingError::TooDeep(MAXIMUM_NESTING_DEPTH));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn nested<V, F>(&mut self, visit: F) -> Result<V, EncodingError>
    where
        F: FnOnce(&mut Self) -> Result<V, EncodingError>,
    {
        self.enter()?;
        let value = visit(self)?;
        self.leave();
        Ok(value)
    }
}

impl<'de, 'a> Deserializer<'de> for &'a mut WireDeserializer<'de> {
    type Error = EncodingError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.get_u8()? {
            tag::UNIT => visitor.visit_unit(),
            tag::NONE => visitor.visit_none(),
            tag::SOME => self.nested(|de| visitor.visit_some(de)),
            tag::BOOL => match self.get_u8()? {
                0 => visitor.visit_bool(false),
                1 => visitor.visit_bool(true),
                other => Err(EncodingError::Custom(format!("invalid bool {other}"))),
            },
            tag::U8 => visitor.visit_u8(self.take(1)?.get_u8()),
            tag::U16 => visitor.visit_u16(self.take(2)?.get_u16()),
            tag::U32 => visitor.visit_u32(self.take(4)?.get_u32()),
            tag::U64 => visitor.visit_u64(self.take(8)?.get_u64()),
            tag::I8 => visitor.visit_i8(self.take(1)?.get_i8()),
            tag::I16 => visitor.visit_i16(self.take(2)?.get_i16()),
            tag::I32 => visitor.visit_i32(self.take(4)?.get_i32()),
            tag::I64 => visitor.visit_i64(self.take(8)?.get_i64()),
            tag::F32 => visitor.visit_f32(self.take(4)?.get_f32()),
            tag::F64 => visitor.visit_f64(self.take(8)?.get_f64()),
            tag::CHAR => {
                let value = self.take(4)?.get_u32();
                let c = char::from_u32(value).ok_or(EncodingError::BadChar(value))?;
                visitor.visit_char(c)
            }
            tag::STR => {
                let len = self.get_len()?;
                let s = std::str::from_utf8(self.take(len)?)?;
                visitor.visit_borrowed_str(s)
            }
            tag::BYTES => {
                let len = self.get_len()?;
                visitor.visit_borrowed_bytes(self.take(len)?)
            }
            tag::SEQ => {
                let len = self.get_count()?;
                self.nested(|de| {
                    let mut access = Access {
                        deserializer: de,
                        len,
                    };
                    let value = visitor.visit_seq(&mut access)?;
                    access.finish()?;
                    Ok(value)
                })
            }
            tag::MAP => {
                let len = self.get_count()?;
                self.nested(|de| {
                    let mut access = Access {
                        deserializer: de,
                        len,
                    };
                    visitor.visit_map(&mut access)
                })
            }
            tag::STRUCT => {
                let len = self.get_count()?;
                self.nested(|de| {
                    let mut access = FieldAccess {
                        deserializer: de,
                        len,
                    };
                    let value = visitor.visit_map(&mut access)?;
                    access.finish()?;
                    Ok(value)
                })
            }
            tag::VARIANT => {
                let variant = self.get_name()?;
                self.nested(|de| {
                    visitor.visit_enum(Variant {
                        deserializer: de,
                        variant,
                    })
                })
            }
            other => Err(EncodingError::UnexpectedTag(other)),
        }
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn is_human_readable(&self) -> bool {
        false
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct seq tuple
        tuple_struct map struct enum identifier ignored_any
    }
}

/// Sequences and maps, `len` counts elements or entries left
struct Access<'a, 'de: 'a> {
    deserializer: &'a mut WireDeserializer<'de>,
    len: usize,
}

impl<'a, 'de> Access<'a, 'de> {
    /// Skips whatever the visitor did not consume, so the stream stays aligned
    fn finish(&mut self) -> Result<(), EncodingError> {
        while self.len > 0 {
            self.len -= 1;
            skip_value(self.deserializer)?;
        }
        Ok(())
    }
}

impl<'a, 'de: 'a> SeqAccess<'de> for &mut Access<'a, 'de> {
    type Error = EncodingError;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
    where
        T: DeserializeSeed<'de>,
    {
        if self.len > 0 {
            self.len -= 1;
            let value = seed.deserialize(&mut *self.deserializer)?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.len)
    }
}

impl<'a, 'de: 'a> MapAccess<'de> for &mut Access<'a, 'de> {
    type Error = EncodingError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error>
    where
        K: DeserializeSeed<'de>,
    {
        if self.len > 0 {
            self.len -= 1;
            seed.deserialize(&mut *self.deserializer).map(Some)
        } else {
            Ok(None)
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
    where
        V: DeserializeSeed<'de>,
    {
        seed.deserialize(&mut *self.deserializer)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.len)
    }
}

/// Struct fields, keys are the field names written by the serializer
struct FieldAccess<'a, 'de: 'a> {
    deserializer: &'a mut WireDeserializer<'de>,
    len: usize,
}

impl<'a, 'de> FieldAccess<'a, 'de> {
    fn finish(&mut self) -> Result<(), EncodingError> {
        while self.len > 0 {
            self.len -= 1;
            self.deserializer.get_name()?;
            skip_value(self.deserializer)?;
        }
        Ok(())
    }
}

impl<'a, 'de: 'a> MapAccess<'de> for &mut FieldAccess<'a, 'de> {
    type Error = EncodingError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error>
    where
        K: DeserializeSeed<'de>,
    {
        if self.len == 0 {
            return Ok(None);
        }
        self.len -= 1;
        let name = self.deserializer.get_name()?;
        seed.deserialize(BorrowedStrDeserializer::<EncodingError>::new(name))
            .map(Some)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
    where
        V: DeserializeSeed<'de>,
    {
        seed.deserialize(&mut *self.deserializer)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.len)
    }
}

struct Variant<'a, 'de: 'a> {
    deserializer: &'a mut WireDeserializer<'de>,
    variant: &'de str,
}

impl<'a, 'de: 'a> EnumAccess<'de> for Variant<'a, 'de> {
    type Error = EncodingError;

    type Variant = Self;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant), Self::Error>
    where
        V: DeserializeSeed<'de>,
    {
        let value = seed.deserialize(BorrowedStrDeserializer::<EncodingError>::new(
            self.variant,
        ))?;
        Ok((value, self))
    }
}

impl<'a, 'de: 'a> VariantAccess<'de> for Variant<'a, 'de> {
    type Error = EncodingError;

    fn unit_variant(self) -> Result<(), Self::Error> {
        self.deserializer.expect_tag(tag::UNIT)
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value, Self::Error>
    where
        T: DeserializeSeed<'de>,
    {
        seed.deserialize(self.deserializer)
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserializer.deserialize_any(visitor)
    }

    fn struct_variant<V>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserializer.deserialize_any(visitor)
    }
}

fn skip_value(de: &mut WireDeserializer<'_>) -> Result<(), EncodingError> {
    IgnoredAny::deserialize(de)?;
    Ok(())
}
