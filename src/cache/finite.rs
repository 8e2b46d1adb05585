//! Non-finite float detection
//!
//! `serde_json` writes NaN and ±infinity as `null`, which then fails to
//! decode back into a float. [`has_non_finite_float`] walks a value through a
//! no-output serializer so the codec can route such values to bincode.

use std::fmt;

use serde::ser::{self, Serialize};

/// Returns `true` if any `f32`/`f64` reachable from `value` is NaN or infinite
pub(crate) fn has_non_finite_float<T: Serialize + ?Sized>(value: &T) -> bool {
    matches!(value.serialize(FiniteCheck), Err(Found::NonFinite))
}

#[derive(Debug)]
enum Found {
    NonFinite,
    /// Raised by the value's own `Serialize` impl; left for the real encoder
    Custom,
}

impl fmt::Display for Found {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Found::NonFinite => write!(f, "non-finite float"),
            Found::Custom => write!(f, "serialize error"),
        }
    }
}

impl std::error::Error for Found {}

impl ser::Error for Found {
    fn custom<M: fmt::Display>(_msg: M) -> Self {
        Found::Custom
    }
}

#[derive(Clone, Copy)]
struct FiniteCheck;

type Walk = std::result::Result<(), Found>;

fn float(finite: bool) -> Walk {
    if finite {
        Ok(())
    } else {
        Err(Found::NonFinite)
    }
}

impl ser::Serializer for FiniteCheck {
    type Ok = ();
    type Error = Found;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_bool(self, _v: bool) -> Walk {
        Ok(())
    }
    fn serialize_i8(self, _v: i8) -> Walk {
        Ok(())
    }
    fn serialize_i16(self, _v: i16) -> Walk {
        Ok(())
    }
    fn serialize_i32(self, _v: i32) -> Walk {
        Ok(())
    }
    fn serialize_i64(self, _v: i64) -> Walk {
        Ok(())
    }
    fn serialize_i128(self, _v: i128) -> Walk {
        Ok(())
    }
    fn serialize_u8(self, _v: u8) -> Walk {
        Ok(())
    }
    fn serialize_u16(self, _v: u16) -> Walk {
        Ok(())
    }
    fn serialize_u32(self, _v: u32) -> Walk {
        Ok(())
    }
    fn serialize_u64(self, _v: u64) -> Walk {
        Ok(())
    }
    fn serialize_u128(self, _v: u128) -> Walk {
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Walk {
        float(v.is_finite())
    }

    fn serialize_f64(self, v: f64) -> Walk {
        float(v.is_finite())
    }

    fn serialize_char(self, _v: char) -> Walk {
        Ok(())
    }
    fn serialize_str(self, _v: &str) -> Walk {
        Ok(())
    }
    fn serialize_bytes(self, _v: &[u8]) -> Walk {
        Ok(())
    }
    fn serialize_none(self) -> Walk {
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Walk {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Walk {
        Ok(())
    }
    fn serialize_unit_struct(self, _name: &'static str) -> Walk {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Walk {
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Walk {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Walk {
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> std::result::Result<Self, Found> {
        Ok(self)
    }

    fn serialize_tuple(self, _len: usize) -> std::result::Result<Self, Found> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> std::result::Result<Self, Found> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> std::result::Result<Self, Found> {
        Ok(self)
    }

    fn serialize_map(self, _len: Option<usize>) -> std::result::Result<Self, Found> {
        Ok(self)
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> std::result::Result<Self, Found> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> std::result::Result<Self, Found> {
        Ok(self)
    }
}

impl ser::SerializeSeq for FiniteCheck {
    type Ok = ();
    type Error = Found;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Walk {
        value.serialize(*self)
    }

    fn end(self) -> Walk {
        Ok(())
    }
}

impl ser::SerializeTuple for FiniteCheck {
    type Ok = ();
    type Error = Found;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Walk {
        value.serialize(*self)
    }

    fn end(self) -> Walk {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for FiniteCheck {
    type Ok = ();
    type Error = Found;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Walk {
        value.serialize(*self)
    }

    fn end(self) -> Walk {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for FiniteCheck {
    type Ok = ();
    type Error = Found;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Walk {
        value.serialize(*self)
    }

    fn end(self) -> Walk {
        Ok(())
    }
}

impl ser::SerializeMap for FiniteCheck {
    type Ok = ();
    type Error = Found;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Walk {
        key.serialize(*self)
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Walk {
        value.serialize(*self)
    }

    fn end(self) -> Walk {
        Ok(())
    }
}

impl ser::SerializeStruct for FiniteCheck {
    type Ok = ();
    type Error = Found;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, _key: &'static str, value: &T) -> Walk {
        value.serialize(*self)
    }

    fn end(self) -> Walk {
        Ok(())
    }
}

impl ser::SerializeStructVariant for FiniteCheck {
    type Ok = ();
    type Error = Found;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, _key: &'static str, value: &T) -> Walk {
        value.serialize(*self)
    }

    fn end(self) -> Walk {
        Ok(())
    }
}
