//! Rejects non-finite floats before JSON conversion
//!
//! `serde_json` writes `NaN` and infinities as `null`, which would give them
//! the canonical form of an absent value. [`ensure_finite`] walks the value
//! through serde first and stops at the first such float.

use crate::canonical::EncodingError;
use serde::ser::{self, Serialize};

pub(crate) fn ensure_finite<T>(value: &T) -> Result<(), EncodingError>
where
    T: Serialize + ?Sized,
{
    value.serialize(FiniteCheck)
}

fn finite(value: f64) -> Result<(), EncodingError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EncodingError::NonFinite(value.to_string()))
    }
}

impl ser::Error for EncodingError {
    fn custom<M: std::fmt::Display>(msg: M) -> Self {
        Self::Unencodable(<serde_json::Error as ser::Error>::custom(msg))
    }
}

#[derive(Clone, Copy)]
struct FiniteCheck;

macro_rules! accept {
    ($($method:ident: $ty:ty),* $(,)?) => {
        $(
            fn $method(self, _: $ty) -> Result<(), EncodingError> {
                Ok(())
            }
        )*
    };
}

impl ser::Serializer for FiniteCheck {
    type Ok = ();
    type Error = EncodingError;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    accept! {
        serialize_bool: bool,
        serialize_i8: i8,
        serialize_i16: i16,
        serialize_i32: i32,
        serialize_i64: i64,
        serialize_i128: i128,
        serialize_u8: u8,
        serialize_u16: u16,
        serialize_u32: u32,
        serialize_u64: u64,
        serialize_u128: u128,
        serialize_char: char,
        serialize_str: &str,
        serialize_bytes: &[u8],
        serialize_unit_struct: &'static str,
    }

    fn serialize_f32(self, v: f32) -> Result<(), EncodingError> {
        finite(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<(), EncodingError> {
        finite(v)
    }

    fn serialize_none(self) -> Result<(), EncodingError> {
        Ok(())
    }

    fn serialize_some<T>(self, value: &T) -> Result<(), EncodingError>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), EncodingError> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
    ) -> Result<(), EncodingError> {
        Ok(())
    }

    fn serialize_newtype_struct<T>(self, _: &'static str, value: &T) -> Result<(), EncodingError>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> Result<(), EncodingError>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Self, EncodingError> {
        Ok(self)
    }

    fn serialize_tuple(self, _: usize) -> Result<Self, EncodingError> {
        Ok(self)
    }

    fn serialize_tuple_struct(self, _: &'static str, _: usize) -> Result<Self, EncodingError> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self, EncodingError> {
        Ok(self)
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self, EncodingError> {
        Ok(self)
    }

    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Self, EncodingError> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self, EncodingError> {
        Ok(self)
    }
}

impl ser::SerializeSeq for FiniteCheck {
    type Ok = ();
    type Error = EncodingError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), EncodingError>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), EncodingError> {
        Ok(())
    }
}

impl ser::SerializeTuple for FiniteCheck {
    type Ok = ();
    type Error = EncodingError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), EncodingError>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), EncodingError> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for FiniteCheck {
    type Ok = ();
    type Error = EncodingError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), EncodingError>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), EncodingError> {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for FiniteCheck {
    type Ok = ();
    type Error = EncodingError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), EncodingError>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), EncodingError> {
        Ok(())
    }
}

impl ser::SerializeMap for FiniteCheck {
    type Ok = ();
    type Error = EncodingError;

    fn serialize_key<T>(&mut self, key: &T) -> Result<(), EncodingError>
    where
        T: Serialize + ?Sized,
    {
        key.serialize(FiniteCheck)
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<(), EncodingError>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), EncodingError> {
        Ok(())
    }
}

impl ser::SerializeStruct for FiniteCheck {
    type Ok = ();
    type Error = EncodingError;

    fn serialize_field<T>(&mut self, _: &'static str, value: &T) -> Result<(), EncodingError>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), EncodingError> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for FiniteCheck {
    type Ok = ();
    type Error = EncodingError;

    fn serialize_field<T>(&mut self, _: &'static str, value: &T) -> Result<(), EncodingError>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), EncodingError> {
        Ok(())
    }
}
