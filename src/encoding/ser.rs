use super::error::{Error, Result};
use alloc::vec::Vec;
use serde::{
    ser::{
        self, Impossible, SerializeSeq, SerializeStruct, SerializeTuple, SerializeTupleStruct,
    },
    Serialize,
};

/// Size of one word of the encoding in bytes.
pub const SLOT_SIZE: usize = 32;

/// Sink for the encoded words.
///
/// Every call receives a multiple of [SLOT_SIZE] bytes.
pub trait Writer {
    fn write(&mut self, slot: &[u8]);
}

impl Writer for Vec<u8> {
    fn write(&mut self, slot: &[u8]) {
        self.extend_from_slice(slot);
    }
}

/// Serializer producing the canonical word encoding.
///
/// The encoding is static: every scalar occupies one 32 byte word (integers
/// and booleans right aligned, signed integers sign extended), byte strings
/// are left aligned and zero padded to whole words, sequences are prefixed
/// with their length and structs/tuples are the concatenation of their
/// fields. Because the length of every variable sized value is written
/// before its content, two different values of the same type never encode
/// to the same bytes.
pub struct Serializer<'a, W>
where
    W: Writer,
{
    writer: &'a mut W,
}

pub fn to_writer<T, W>(value: &T, writer: &mut W) -> Result<()>
where
    T: Serialize + ?Sized,
    W: Writer,
{
    let mut serializer = Serializer { writer };
    value.serialize(&mut serializer)
}

pub fn to_vec<T>(value: &T) -> Result<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    let mut buf = Vec::new();
    to_writer(value, &mut buf)?;
    Ok(buf)
}

impl<'a, W> Serializer<'a, W>
where
    W: Writer,
{
    // Panics if N > SLOT_SIZE
    fn write_right_aligned<const N: usize>(&mut self, v: [u8; N]) {
        let mut bytes = [0u8; SLOT_SIZE];
        bytes[SLOT_SIZE - N..].copy_from_slice(v.as_slice());
        self.writer.write(bytes.as_slice())
    }

    // Panics if N > SLOT_SIZE
    fn write_signed<const N: usize>(&mut self, negative: bool, v: [u8; N]) {
        let filler = if negative { 0xff } else { 0x00 };
        let mut bytes = [filler; SLOT_SIZE];
        bytes[SLOT_SIZE - N..].copy_from_slice(v.as_slice());
        self.writer.write(bytes.as_slice())
    }

    fn write_padded(&mut self, v: &[u8]) {
        let mut chunks = v.chunks_exact(SLOT_SIZE);
        for chunk in &mut chunks {
            self.writer.write(chunk);
        }
        let rest = chunks.remainder();
        if !rest.is_empty() {
            let mut bytes = [0u8; SLOT_SIZE];
            bytes[..rest.len()].copy_from_slice(rest);
            self.writer.write(bytes.as_slice());
        }
    }

    fn write_len(&mut self, len: usize) {
        self.write_right_aligned((len as u64).to_be_bytes())
    }
}

impl<'a, 'w, W> ser::Serializer for &'a mut Serializer<'w, W>
where
    W: Writer,
{
    type Ok = ();
    type Error = Error;

    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Impossible<(), Error>;
    type SerializeMap = Impossible<(), Error>;
    type SerializeStruct = Self;
    type SerializeStructVariant = Impossible<(), Error>;

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.write_right_aligned([v as u8]);
        Ok(())
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.write_signed(v < 0, v.to_be_bytes());
        Ok(())
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.write_signed(v < 0, v.to_be_bytes());
        Ok(())
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.write_signed(v < 0, v.to_be_bytes());
        Ok(())
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.write_signed(v < 0, v.to_be_bytes());
        Ok(())
    }

    fn serialize_i128(self, v: i128) -> Result<()> {
        self.write_signed(v < 0, v.to_be_bytes());
        Ok(())
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.write_right_aligned(v.to_be_bytes());
        Ok(())
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.write_right_aligned(v.to_be_bytes());
        Ok(())
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.write_right_aligned(v.to_be_bytes());
        Ok(())
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.write_right_aligned(v.to_be_bytes());
        Ok(())
    }

    fn serialize_u128(self, v: u128) -> Result<()> {
        self.write_right_aligned(v.to_be_bytes());
        Ok(())
    }

    fn serialize_f32(self, _v: f32) -> Result<()> {
        Err(Error::TypeNotRepresentable("f32"))
    }

    fn serialize_f64(self, _v: f64) -> Result<()> {
        Err(Error::TypeNotRepresentable("f64"))
    }

    fn serialize_char(self, v: char) -> Result<()> {
        self.serialize_u32(v as u32)
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.write_len(v.len());
        self.write_padded(v.as_bytes());
        Ok(())
    }

    // Fixed size byte types (Hash, Address, U256, Signature) go through here.
    // Their length is part of the type, so no length prefix is written.
    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        self.write_padded(v);
        Ok(())
    }

    fn serialize_none(self) -> Result<()> {
        self.serialize_bool(false)
    }

    fn serialize_some<T: ?Sized>(self, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        self.write_right_aligned([1u8]);
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
    ) -> Result<()> {
        self.serialize_u32(variant_index)
    }

    fn serialize_newtype_struct<T: ?Sized>(self, _name: &'static str, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<()>
    where
        T: Serialize,
    {
        Err(Error::TypeNotRepresentable("newtype variant"))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq> {
        match len {
            Some(len) => {
                self.write_len(len);
                Ok(self)
            }
            None => Err(Error::TypeNotRepresentable("sequence of unknown length")),
        }
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(Error::TypeNotRepresentable("tuple variant"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(Error::TypeNotRepresentable("map"))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(Error::TypeNotRepresentable("struct variant"))
    }
}

impl<'a, 'w, W> SerializeSeq for &'a mut Serializer<'w, W>
where
    W: Writer,
{
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<'a, 'w, W> SerializeTuple for &'a mut Serializer<'w, W>
where
    W: Writer,
{
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<'a, 'w, W> SerializeTupleStruct for &'a mut Serializer<'w, W>
where
    W: Writer,
{
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<'a, 'w, W> SerializeStruct for &'a mut Serializer<'w, W>
where
    W: Writer,
{
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, _key: &'static str, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, U256};

    fn words(expected: &str) -> Vec<u8> {
        let joined: alloc::string::String = expected.split_whitespace().collect();
        hex::decode(joined).unwrap()
    }

    #[derive(Serialize)]
    struct Sample {
        flag: bool,
        count: u64,
        delta: i8,
        who: Address,
        amounts: Vec<U256>,
    }

    #[test]
    fn struct_fields_are_concatenated_words() {
        let mut who = Address::default();
        who.0[19] = 0xaa;
        let value = Sample {
            flag: true,
            count: 0x1234,
            delta: -1,
            who,
            amounts: alloc::vec![U256::from(5u64), U256::from(6u64)],
        };

        let expected = words(
            "
            0000000000000000000000000000000000000000000000000000000000000001
            0000000000000000000000000000000000000000000000000000000000001234
            ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff
            00000000000000000000000000000000000000000000000000000000000000aa
            0000000000000000000000000000000000000000000000000000000000000002
            0000000000000000000000000000000000000000000000000000000000000005
            0000000000000000000000000000000000000000000000000000000000000006
            ",
        );

        assert_eq!(to_vec(&value).unwrap(), expected);
    }

    #[test]
    fn strings_are_length_prefixed_and_padded() {
        let expected = words(
            "
            0000000000000000000000000000000000000000000000000000000000000003
            6162630000000000000000000000000000000000000000000000000000000000
            ",
        );
        assert_eq!(to_vec("abc").unwrap(), expected);
    }

    #[test]
    fn options_are_tagged() {
        assert_eq!(to_vec(&None::<u8>).unwrap(), [0u8; 32].to_vec());
        let some = to_vec(&Some(7u8)).unwrap();
        assert_eq!(some.len(), 64);
        assert_eq!(some[31], 1);
        assert_eq!(some[63], 7);
    }

    #[test]
    fn floats_are_rejected() {
        assert_eq!(to_vec(&1.5f64), Err(Error::TypeNotRepresentable("f64")));
    }
}
