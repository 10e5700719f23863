//! Self-describing wire format for packets.
//!
//! Every value is prefixed with one of the type tags below, integers and floats are fixed
//! width big-endian and lengths are `u32` big-endian. Struct fields are written as
//! `(name, value)` pairs, so a decoder skips fields it does not know about and fields can be
//! added without breaking older peers.

pub mod codec;
pub mod deserializer;
pub mod serializer;

pub(crate) mod tag {
    pub const UNIT: u8 = 0x00;
    pub const NONE: u8 = 0x01;
    pub const SOME: u8 = 0x02;
    pub const BOOL: u8 = 0x03;
    pub const U8: u8 = 0x04;
    pub const U16: u8 = 0x05;
    pub const U32: u8 = 0x06;
    pub const U64: u8 = 0x07;
    pub const I8: u8 = 0x08;
    pub const I16: u8 = 0x09;
    pub const I32: u8 = 0x0A;
    pub const I64: u8 = 0x0B;
    pub const F32: u8 = 0x0C;
    pub const F64: u8 = 0x0D;
    pub const CHAR: u8 = 0x0E;
    pub const STR: u8 = 0x0F;
    pub const BYTES: u8 = 0x10;
    pub const SEQ: u8 = 0x11;
    pub const MAP: u8 = 0x12;
    pub const STRUCT: u8 = 0x13;
    pub const VARIANT: u8 = 0x14;
}

pub use codec::{decode, decode_limited, encode, encode_limited};
