//! # Key Normalization
//!
//! Field names are stored as `underscore_divided_words`: every character that is
//! not a letter or a number separates words, and letters are lowercased.

use std::fmt::Display;

use serde::ser::{self, Impossible, Serialize, Serializer};
use unicode_general_category::{get_general_category, GeneralCategory};

/// Normalizes a free-form field name into a canonical key.
///
/// ```
/// use error_telemetry::normalize_key;
///
/// assert_eq!(normalize_key("Proxy-Addr!!"), "proxy_addr");
/// ```
pub fn normalize_key(raw: &str) -> String {
    raw.split(|c: char| !is_word_char(c))
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Letters (category L) and numbers (category N); combining marks separate
fn is_word_char(c: char) -> bool {
    use GeneralCategory::*;

    matches!(
        get_general_category(c),
        UppercaseLetter
            | LowercaseLetter
            | TitlecaseLetter
            | ModifierLetter
            | OtherLetter
            | DecimalNumber
            | LetterNumber
            | OtherNumber
    )
}

/// Renders a field value as the string stored in a record.
///
/// Strings are kept verbatim. Booleans, integers of any width and floats use
/// their `Display` form, so `NaN` and infinities survive. Anything else
/// becomes compact JSON. Returns `None` only if the value cannot be
/// serialized at all.
pub fn stringify<V: Serialize + ?Sized>(value: &V) -> Option<String> {
    match value.serialize(ScalarSerializer) {
        Ok(text) => Some(text),
        Err(NotScalar) => serde_json::to_string(value).ok(),
    }
}

#[derive(Debug, thiserror::Error)]
#[error("value is not a scalar")]
struct NotScalar;

impl ser::Error for NotScalar {
    fn custom<T: Display>(_msg: T) -> Self {
        NotScalar
    }
}

/// Serializes scalars to their plain text; everything else is refused
struct ScalarSerializer;

fn display<T: Display>(value: T) -> Result<String, NotScalar> {
    Ok(value.to_string())
}

impl Serializer for ScalarSerializer {
    type Ok = String;
    type Error = NotScalar;
    type SerializeSeq = Impossible<String, NotScalar>;
    type SerializeTuple = Impossible<String, NotScalar>;
    type SerializeTupleStruct = Impossible<String, NotScalar>;
    type SerializeTupleVariant = Impossible<String, NotScalar>;
    type SerializeMap = Impossible<String, NotScalar>;
    type SerializeStruct = Impossible<String, NotScalar>;
    type SerializeStructVariant = Impossible<String, NotScalar>;

    fn serialize_bool(self, v: bool) -> Result<String, NotScalar> {
        display(v)
    }
    fn serialize_i8(self, v: i8) -> Result<String, NotScalar> {
        display(v)
    }
    fn serialize_i16(self, v: i16) -> Result<String, NotScalar> {
        display(v)
    }
    fn serialize_i32(self, v: i32) -> Result<String, NotScalar> {
        display(v)
    }
    fn serialize_i64(self, v: i64) -> Result<String, NotScalar> {
        display(v)
    }
    fn serialize_i128(self, v: i128) -> Result<String, NotScalar> {
        display(v)
    }
    fn serialize_u8(self, v: u8) -> Result<String, NotScalar> {
        display(v)
    }
    fn serialize_u16(self, v: u16) -> Result<String, NotScalar> {
        display(v)
    }
    fn serialize_u32(self, v: u32) -> Result<String, NotScalar> {
        display(v)
    }
    fn serialize_u64(self, v: u64) -> Result<String, NotScalar> {
        display(v)
    }
    fn serialize_u128(self, v: u128) -> Result<String, NotScalar> {
        display(v)
    }
    fn serialize_f32(self, v: f32) -> Result<String, NotScalar> {
        display(v)
    }
    fn serialize_f64(self, v: f64) -> Result<String, NotScalar> {
        display(v)
    }
    fn serialize_char(self, v: char) -> Result<String, NotScalar> {
        display(v)
    }
    fn serialize_str(self, v: &str) -> Result<String, NotScalar> {
        display(v)
    }
    fn serialize_bytes(self, _v: &[u8]) -> Result<String, NotScalar> {
        Err(NotScalar)
    }
    fn serialize_none(self) -> Result<String, NotScalar> {
        display("null")
    }
    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<String, NotScalar> {
        value.serialize(self)
    }
    fn serialize_unit(self) -> Result<String, NotScalar> {
        display("null")
    }
    fn serialize_unit_struct(self, _name: &'static str) -> Result<String, NotScalar> {
        display("null")
    }
    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<String, NotScalar> {
        display(variant)
    }
    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<String, NotScalar> {
        value.serialize(self)
    }
    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String, NotScalar> {
        Err(NotScalar)
    }
    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, NotScalar> {
        Err(NotScalar)
    }
    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, NotScalar> {
        Err(NotScalar)
    }
    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, NotScalar> {
        Err(NotScalar)
    }
    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, NotScalar> {
        Err(NotScalar)
    }
    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, NotScalar> {
        Err(NotScalar)
    }
    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, NotScalar> {
        Err(NotScalar)
    }
    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, NotScalar> {
        Err(NotScalar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_normalize_separators_and_case() {
        assert_eq!(normalize_key("Proxy-Addr"), "proxy_addr");
        assert_eq!(normalize_key("proxy_addr"), "proxy_addr");
        assert_eq!(normalize_key("PROXY ADDR"), "proxy_addr");
        assert_eq!(normalize_key("  --proxy...addr--  "), "proxy_addr");
    }

    #[test]
    fn test_normalize_unicode() {
        assert_eq!(normalize_key("Größe/Ärger"), "größe_ärger");
        assert_eq!(normalize_key("id٣"), "id٣");
    }

    #[test]
    fn test_normalize_degenerate() {
        assert_eq!(normalize_key(""), "");
        assert_eq!(normalize_key("!!--"), "");
        assert_eq!(normalize_key("count2"), "count2");
    }

    #[test]
    fn test_stringify() {
        assert_eq!(stringify("plain").as_deref(), Some("plain"));
        assert_eq!(stringify(&true).as_deref(), Some("true"));
        assert_eq!(stringify(&42).as_deref(), Some("42"));
        assert_eq!(stringify(&-7i64).as_deref(), Some("-7"));
        assert_eq!(stringify(&1.5).as_deref(), Some("1.5"));
        assert_eq!(stringify(&Option::<u8>::None).as_deref(), Some("null"));
        assert_eq!(stringify(&vec![1, 2]).as_deref(), Some("[1,2]"));
    }

    #[test]
    fn test_normalize_splits_on_combining_marks() {
        // U+093F is a spacing combining mark, not a letter
        assert_eq!(normalize_key("\u{915}\u{93f}x"), "\u{915}_x");
    }

    #[test]
    fn test_stringify_keeps_non_finite_and_wide_numbers() {
        assert_eq!(stringify(&f64::NAN).as_deref(), Some("NaN"));
        assert_eq!(stringify(&f64::INFINITY).as_deref(), Some("inf"));
        assert_eq!(stringify(&f32::NEG_INFINITY).as_deref(), Some("-inf"));
        assert_eq!(stringify(&u128::MAX).as_deref(), Some(u128::MAX.to_string().as_str()));
        assert_eq!(stringify(&i128::MIN).as_deref(), Some(i128::MIN.to_string().as_str()));
        assert_eq!(stringify(&Some('x')).as_deref(), Some("x"));
        assert_eq!(stringify(&vec![u128::MAX]).as_deref(), Some(format!("[{}]", u128::MAX).as_str()));
    }

    #[test]
    fn test_stringify_unserializable() {
        let mut map = HashMap::new();
        map.insert(vec![1u8], "non-string key");
        assert_eq!(stringify(&map), None);
    }
}
