//! Canonical Encoding
//!
//! A `serde` serializer adapter that forwards to an inner serializer but keeps
//! apart values `serde_json` would otherwise merge: `None` vs `Some(x)`, nested
//! options, and non-finite floats (which `serde_json` writes as `null`).

use serde::ser::{
    Serialize, SerializeMap, SerializeSeq, SerializeStruct, SerializeStructVariant,
    SerializeTuple, SerializeTupleStruct, SerializeTupleVariant, Serializer,
};
use serde_json::Value;

use crate::error::Result;

const NONE_TAG: &str = "$none";
const SOME_TAG: &str = "$some";
const FLOAT_TAG: &str = "$float";

/// Encodes `value` into a JSON tree where every distinct input stays distinct.
pub(crate) fn to_value<T>(value: &T) -> Result<Value>
where
    T: Serialize + ?Sized,
{
    Ok(Canonical(value).serialize(serde_json::value::Serializer)?)
}

// == Wrappers ==
struct Canonical<'a, T: ?Sized>(&'a T);

impl<T> Serialize for Canonical<'_, T>
where
    T: Serialize + ?Sized,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(Tagging(serializer))
    }
}

/// Wraps a serializer, or one of its compound states, so nested values are
/// tagged too.
struct Tagging<S>(S);

impl<S> Tagging<S>
where
    S: Serializer,
{
    fn non_finite(self, v: f64) -> std::result::Result<S::Ok, S::Error> {
        // "NaN", "inf" and "-inf"
        self.0
            .serialize_newtype_variant("float", 0, FLOAT_TAG, &v.to_string())
    }
}

// == Serializer ==
impl<S> Serializer for Tagging<S>
where
    S: Serializer,
{
    type Ok = S::Ok;
    type Error = S::Error;
    type SerializeSeq = Tagging<S::SerializeSeq>;
    type SerializeTuple = Tagging<S::SerializeTuple>;
    type SerializeTupleStruct = Tagging<S::SerializeTupleStruct>;
    type SerializeTupleVariant = Tagging<S::SerializeTupleVariant>;
    type SerializeMap = Tagging<S::SerializeMap>;
    type SerializeStruct = Tagging<S::SerializeStruct>;
    type SerializeStructVariant = Tagging<S::SerializeStructVariant>;

    fn serialize_bool(self, v: bool) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize_bool(v)
    }

    fn serialize_i8(self, v: i8) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize_i8(v)
    }

    fn serialize_i16(self, v: i16) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize_i16(v)
    }

    fn serialize_i32(self, v: i32) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize_i32(v)
    }

    fn serialize_i64(self, v: i64) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize_i64(v)
    }

    fn serialize_i128(self, v: i128) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize_i128(v)
    }

    fn serialize_u8(self, v: u8) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize_u8(v)
    }

    fn serialize_u16(self, v: u16) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize_u16(v)
    }

    fn serialize_u32(self, v: u32) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize_u32(v)
    }

    fn serialize_u64(self, v: u64) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize_u64(v)
    }

    fn serialize_u128(self, v: u128) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize_u128(v)
    }

    fn serialize_f32(self, v: f32) -> std::result::Result<S::Ok, S::Error> {
        if v.is_finite() {
            self.0.serialize_f32(v)
        } else {
            self.non_finite(f64::from(v))
        }
    }

    fn serialize_f64(self, v: f64) -> std::result::Result<S::Ok, S::Error> {
        if v.is_finite() {
            self.0.serialize_f64(v)
        } else {
            self.non_finite(v)
        }
    }

    fn serialize_char(self, v: char) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize_char(v)
    }

    fn serialize_str(self, v: &str) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize_str(v)
    }

    fn serialize_bytes(self, v: &[u8]) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize_bytes(v)
    }

    fn serialize_none(self) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize_unit_variant("Option", 0, NONE_TAG)
    }

    fn serialize_some<T>(self, value: &T) -> std::result::Result<S::Ok, S::Error>
    where
        T: Serialize + ?Sized,
    {
        self.0
            .serialize_newtype_variant("Option", 1, SOME_TAG, &Canonical(value))
    }

    fn serialize_unit(self) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize_unit()
    }

    fn serialize_unit_struct(self, name: &'static str) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize_unit_struct(name)
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
    ) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize_unit_variant(name, variant_index, variant)
    }

    fn serialize_newtype_struct<T>(
        self,
        name: &'static str,
        value: &T,
    ) -> std::result::Result<S::Ok, S::Error>
    where
        T: Serialize + ?Sized,
    {
        self.0.serialize_newtype_struct(name, &Canonical(value))
    }

    fn serialize_newtype_variant<T>(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> std::result::Result<S::Ok, S::Error>
    where
        T: Serialize + ?Sized,
    {
        self.0
            .serialize_newtype_variant(name, variant_index, variant, &Canonical(value))
    }

    fn serialize_seq(self, len: Option<usize>) -> std::result::Result<Self::SerializeSeq, S::Error> {
        self.0.serialize_seq(len).map(Tagging)
    }

    fn serialize_tuple(self, len: usize) -> std::result::Result<Self::SerializeTuple, S::Error> {
        self.0.serialize_tuple(len).map(Tagging)
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> std::result::Result<Self::SerializeTupleStruct, S::Error> {
        self.0.serialize_tuple_struct(name, len).map(Tagging)
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> std::result::Result<Self::SerializeTupleVariant, S::Error> {
        self.0
            .serialize_tuple_variant(name, variant_index, variant, len)
            .map(Tagging)
    }

    fn serialize_map(self, len: Option<usize>) -> std::result::Result<Self::SerializeMap, S::Error> {
        self.0.serialize_map(len).map(Tagging)
    }

    fn serialize_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> std::result::Result<Self::SerializeStruct, S::Error> {
        self.0.serialize_struct(name, len).map(Tagging)
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> std::result::Result<Self::SerializeStructVariant, S::Error> {
        self.0
            .serialize_struct_variant(name, variant_index, variant, len)
            .map(Tagging)
    }

    fn is_human_readable(&self) -> bool {
        self.0.is_human_readable()
    }
}

// == Compound States ==
impl<C> SerializeSeq for Tagging<C>
where
    C: SerializeSeq,
{
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_element<T>(&mut self, value: &T) -> std::result::Result<(), C::Error>
    where
        T: Serialize + ?Sized,
    {
        self.0.serialize_element(&Canonical(value))
    }

    fn end(self) -> std::result::Result<C::Ok, C::Error> {
        self.0.end()
    }
}

impl<C> SerializeTuple for Tagging<C>
where
    C: SerializeTuple,
{
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_element<T>(&mut self, value: &T) -> std::result::Result<(), C::Error>
    where
        T: Serialize + ?Sized,
    {
        self.0.serialize_element(&Canonical(value))
    }

    fn end(self) -> std::result::Result<C::Ok, C::Error> {
        self.0.end()
    }
}

impl<C> SerializeTupleStruct for Tagging<C>
where
    C: SerializeTupleStruct,
{
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_field<T>(&mut self, value: &T) -> std::result::Result<(), C::Error>
    where
        T: Serialize + ?Sized,
    {
        self.0.serialize_field(&Canonical(value))
    }

    fn end(self) -> std::result::Result<C::Ok, C::Error> {
        self.0.end()
    }
}

impl<C> SerializeTupleVariant for Tagging<C>
where
    C: SerializeTupleVariant,
{
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_field<T>(&mut self, value: &T) -> std::result::Result<(), C::Error>
    where
        T: Serialize + ?Sized,
    {
        self.0.serialize_field(&Canonical(value))
    }

    fn end(self) -> std::result::Result<C::Ok, C::Error> {
        self.0.end()
    }
}

impl<C> SerializeMap for Tagging<C>
where
    C: SerializeMap,
{
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_key<T>(&mut self, key: &T) -> std::result::Result<(), C::Error>
    where
        T: Serialize + ?Sized,
    {
        self.0.serialize_key(&Canonical(key))
    }

    fn serialize_value<T>(&mut self, value: &T) -> std::result::Result<(), C::Error>
    where
        T: Serialize + ?Sized,
    {
        self.0.serialize_value(&Canonical(value))
    }

    fn end(self) -> std::result::Result<C::Ok, C::Error> {
        self.0.end()
    }
}

impl<C> SerializeStruct for Tagging<C>
where
    C: SerializeStruct,
{
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> std::result::Result<(), C::Error>
    where
        T: Serialize + ?Sized,
    {
        self.0.serialize_field(key, &Canonical(value))
    }

    fn skip_field(&mut self, key: &'static str) -> std::result::Result<(), C::Error> {
        self.0.skip_field(key)
    }

    fn end(self) -> std::result::Result<C::Ok, C::Error> {
        self.0.end()
    }
}

impl<C> SerializeStructVariant for Tagging<C>
where
    C: SerializeStructVariant,
{
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> std::result::Result<(), C::Error>
    where
        T: Serialize + ?Sized,
    {
        self.0.serialize_field(key, &Canonical(value))
    }

    fn skip_field(&mut self, key: &'static str) -> std::result::Result<(), C::Error> {
        self.0.skip_field(key)
    }

    fn end(self) -> std::result::Result<C::Ok, C::Error> {
        self.0.end()
    }
}
