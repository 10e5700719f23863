use bytes::BufMut;
use serde::{
    ser::{
        SerializeMap, SerializeSeq, SerializeStruct, SerializeStructVariant, SerializeTuple,
        SerializeTupleStruct, SerializeTupleVariant,
    },
    Serialize, Serializer,
};

use super::tag;
use crate::error::EncodingError;

/// Writes tagged values, sequences and maps without a known length are rejected
pub struct WireSerializer<B: BufMut> {
    pub output: B,
    pub size: usize,
}

impl<B: BufMut> WireSerializer<B> {
    pub fn new(output: B) -> Self {
        Self { output, size: 0 }
    }

    fn put_tag(&mut self, tag: u8) {
        self.output.put_u8(tag);
        self.size += 1;
    }

    fn put_len(&mut self, len: usize) -> Result<(), EncodingError> {
        let len: u32 = len.try_into()?;
        self.output.put_u32(len);
        self.size += 4;
        Ok(())
    }

    fn put_name(&mut self, name: &str) -> Result<(), EncodingError> {
        let len: u8 = name.len().try_into()?;
        self.output.put_u8(len);
        self.output.put_slice(name.as_bytes());
        self.size += 1 + name.len();
        Ok(())
    }

    fn put_variant(&mut self, variant: &'static str) -> Result<(), EncodingError> {
        self.put_tag(tag::VARIANT);
        self.put_name(variant)
    }
}

impl<'a, B: BufMut> Serializer for &'a mut WireSerializer<B> {
    type Ok = ();

    type Error = EncodingError;

    type SerializeSeq = Self;

    type SerializeTuple = Self;

    type SerializeTupleStruct = Self;

    type SerializeTupleVariant = Self;

    type SerializeMap = Self;

    type SerializeStruct = Self;

    type SerializeStructVariant = Self;

    fn serialize_bool(self, v: bool) -> Result<Self::Ok, Self::Error> {
        self.put_tag(tag::BOOL);
        self.output.put_u8(if v { 1 } else { 0 });
        self.size += 1;
        Ok(())
    }

    fn serialize_i8(self, v: i8) -> Result<Self::Ok, Self::Error> {
        self.put_tag(tag::I8);
        self.output.put_i8(v);
        self.size += 1;
        Ok(())
    }

    fn serialize_i16(self, v: i16) -> Result<Self::Ok, Self::Error> {
        self.put_tag(tag::I16);
        self.output.put_i16(v);
        self.size += 2;
        Ok(())
    }

    fn serialize_i32(self, v: i32) -> Result<Self::Ok, Self::Error> {
        self.put_tag(tag::I32);
        self.output.put_i32(v);
        self.size += 4;
        Ok(())
    }

    fn serialize_i64(self, v: i64) -> Result<Self::Ok, Self::Error> {
        self.put_tag(tag::I64);
        self.output.put_i64(v);
        self.size += 8;
        Ok(())
    }

    fn serialize_u8(self, v: u8) -> Result<Self::Ok, Self::Error> {
        self.put_tag(tag::U8);
        self.output.put_u8(v);
        self.size += 1;
        Ok(())
    }

    fn serialize_u16(self, v: u16) -> Result<Self::Ok, Self::Error> {
        self.put_tag(tag::U16);
        self.output.put_u16(v);
        self.size += 2;
        Ok(())
    }

    fn serialize_u32(self, v: u32) -> Result<Self::Ok, Self::Error> {
        self.put_tag(tag::U32);
        self.output.put_u32(v);
        self.size += 4;
        Ok(())
    }

    fn serialize_u64(self, v: u64) -> Result<Self::Ok, Self::Error> {
        self.put_tag(tag::U64);
        self.output.put_u64(v);
        self.size += 8;
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Result<Self::Ok, Self::Error> {
        self.put_tag(tag::F32);
        self.output.put_f32(v);
        self.size += 4;
        Ok(())
    }

    fn serialize_f64(self, v: f64) -> Result<Self::Ok, Self::Error> {
        self.put_tag(tag::F64);
        self.output.put_f64(v);
        self.size += 8;
        Ok(())
    }

    fn serialize_char(self, v: char) -> Result<Self::Ok, Self::Error> {
        self.put_tag(tag::CHAR);
        self.output.put_u32(v.into());
        self.size += 4;
        Ok(())
    }

    fn serialize_str(self, v: &str) -> Result<Self::Ok, Self::Error> {
        self.put_tag(tag::STR);
        self.put_len(v.len())?;
        self.output.put_slice(v.as_bytes());
        self.size += v.len();
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok, Self::Error> {
        self.put_tag(tag::BYTES);
        self.put_len(v.len())?;
        self.output.put_slice(v);
        self.size += v.len();
        Ok(())
    }

    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        self.put_tag(tag::NONE);
        Ok(())
    }

    fn serialize_some<T: ?Sized>(self, value: &T) -> Result<Self::Ok, Self::Error>
    where
        T: serde::Serialize,
    {
        self.put_tag(tag::SOME);
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
        self.put_tag(tag::UNIT);
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Self::Ok, Self::Error> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Self::Ok, Self::Error> {
        self.put_variant(variant)?;
        self.serialize_unit()
    }

    fn serialize_newtype_struct<T: ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error>
    where
        T: serde::Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error>
    where
        T: serde::Serialize,
    {
        self.put_variant(variant)?;
        value.serialize(&mut *self)
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        let len = len.ok_or(EncodingError::UnknownLength)?;
        self.put_tag(tag::SEQ);
        self.put_len(len)?;
        Ok(self)
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        self.put_tag(tag::SEQ);
        self.put_len(len)?;
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        self.serialize_tuple(len)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        self.put_variant(variant)?;
        self.serialize_tuple(len)
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        let len = len.ok_or(EncodingError::UnknownLength)?;
        self.put_tag(tag::MAP);
        self.put_len(len)?;
        Ok(self)
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        self.put_tag(tag::STRUCT);
        self.put_len(len)?;
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        self.put_variant(variant)?;
        self.serialize_struct(name, len)
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}

impl<'a, B: BufMut> SerializeStruct for &'a mut WireSerializer<B> {
    type Ok = ();

    type Error = EncodingError;

    fn serialize_field<T: ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error>
    where
        T: Serialize,
    {
        self.put_name(key)?;
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}

impl<'a, B: BufMut> SerializeSeq for &'a mut WireSerializer<B> {
    type Ok = ();

    type Error = EncodingError;

    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}

impl<'a, B: BufMut> SerializeTuple for &'a mut WireSerializer<B> {
    type Ok = ();

    type Error = EncodingError;

    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}
impl<'a, B: BufMut> SerializeTupleStruct for &'a mut WireSerializer<B> {
    type Ok = ();

    type Error = EncodingError;

    fn serialize_field<T: ?Sized>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}
impl<'a, B: BufMut> SerializeTupleVariant for &'a mut WireSerializer<B> {
    type Ok = ();

    type Error = EncodingError;

    fn serialize_field<T: ?Sized>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}
impl<'a, B: BufMut> SerializeMap for &'a mut WireSerializer<B> {
    type Ok = ();

    type Error = EncodingError;

    fn serialize_key<T: ?Sized>(&mut self, key: &T) -> Result<(), Self::Error>
    where
        T: Serialize,
    {
        key.serialize(&mut **self)
    }

    fn serialize_value<T: ?Sized>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}
impl<'a, B: BufMut> SerializeStructVariant for &'a mut WireSerializer<B> {
    type Ok = ();

    type Error = EncodingError;

    fn serialize_field<T: ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error>
    where
        T: Serialize,
    {
        self.put_name(key)?;
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}
