//! Value conversion facility.
//!
//! [`FromValue`] turns a loosely typed [`Value`] into a concrete Rust type.
//! Text is parsed, numbers are narrowed with range checks, and anything that
//! does not fit reports a [`ConversionError`]. [`convert_value_or`] is the one
//! place in datakit that swallows a conversion failure.

use crate::error::ConversionError;
use crate::value::Value;

/// Conversion from a dynamically typed [`Value`].
pub trait FromValue: Sized {
    /// Name used in conversion errors.
    const TYPE_NAME: &'static str;

    /// Convert, reporting unconvertible input.
    fn from_value(value: &Value) -> Result<Self, ConversionError>;
}

fn failure<T: FromValue>(value: &Value) -> ConversionError {
    ConversionError {
        value: value.to_string(),
        target: T::TYPE_NAME,
    }
}

/// Convert `value` to `T`.
pub fn try_convert_value<T: FromValue>(value: &Value) -> Result<T, ConversionError> {
    T::from_value(value)
}

/// Convert `value` to `T`, returning `default` on any failure.
pub fn convert_value_or<T: FromValue>(value: &Value, default: T) -> T {
    T::from_value(value).unwrap_or(default)
}

impl FromValue for Value {
    const TYPE_NAME: &'static str = "value";

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

impl FromValue for String {
    const TYPE_NAME: &'static str = "string";

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        if value.is_null() {
            return Err(failure::<Self>(value));
        }
        Ok(value.to_string())
    }
}

impl FromValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Json(serde_json::Value::Bool(b)) => Ok(*b),
            other => {
                if let Some(text) = other.as_str() {
                    let text = text.trim();
                    if text.eq_ignore_ascii_case("true") {
                        return Ok(true);
                    }
                    if text.eq_ignore_ascii_case("false") {
                        return Ok(false);
                    }
                }
                match other.as_i64() {
                    Some(n) => Ok(n != 0),
                    None => Err(failure::<Self>(other)),
                }
            }
        }
    }
}

macro_rules! impl_from_value_integer {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromValue for $ty {
                const TYPE_NAME: &'static str = stringify!($ty);

                fn from_value(value: &Value) -> Result<Self, ConversionError> {
                    if let Value::UBigInt(v) = value {
                        return <$ty>::try_from(*v).map_err(|_| failure::<Self>(value));
                    }
                    value
                        .as_i64()
                        .and_then(|v| <$ty>::try_from(v).ok())
                        .ok_or_else(|| failure::<Self>(value))
                }
            }
        )*
    };
}

impl_from_value_integer!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl FromValue for f64 {
    const TYPE_NAME: &'static str = "f64";

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        value.as_f64().ok_or_else(|| failure::<Self>(value))
    }
}

impl FromValue for f32 {
    const TYPE_NAME: &'static str = "f32";

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        value
            .as_f64()
            .map(|v| v as f32)
            .ok_or_else(|| failure::<Self>(value))
    }
}

impl FromValue for Vec<u8> {
    const TYPE_NAME: &'static str = "bytes";

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            other => match other.as_str() {
                Some(text) => from_hex_string(text, None),
                None => Err(failure::<Self>(other)),
            },
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const TYPE_NAME: &'static str = T::TYPE_NAME;

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        if value.is_null() {
            return Ok(None);
        }
        T::from_value(value).map(Some)
    }
}

/// Render bytes as hexadecimal digits, upper-case unless `lower` is set.
pub fn to_hex_string(bytes: &[u8], lower: bool) -> String {
    to_hex_string_with(bytes, None, lower)
}

/// Render bytes as hexadecimal digits with an optional separator between bytes.
pub fn to_hex_string_with(bytes: &[u8], separator: Option<char>, lower: bool) -> String {
    let alpha = if lower { b'a' } else { b'A' };
    let digit = |nibble: u8| -> char {
        if nibble < 10 {
            char::from(b'0' + nibble)
        } else {
            char::from(alpha + (nibble - 10))
        }
    };

    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            if let Some(sep) = separator {
                out.push(sep);
            }
        }
        out.push(digit(byte >> 4));
        out.push(digit(byte & 0x0f));
    }
    out
}

/// Parse hexadecimal text into bytes.
///
/// Whitespace and the optional `separator` are ignored. Any other
/// non-hex character, or a dangling half byte, fails the conversion.
pub fn from_hex_string(text: &str, separator: Option<char>) -> Result<Vec<u8>, ConversionError> {
    let error = || ConversionError {
        value: text.to_string(),
        target: "bytes",
    };

    let mut out = Vec::with_capacity(text.len() / 2);
    let mut high: Option<u8> = None;
    for ch in text.chars() {
        if ch.is_whitespace() || Some(ch) == separator {
            continue;
        }
        let nibble = ch.to_digit(16).ok_or_else(error)? as u8;
        match high.take() {
            Some(h) => out.push((h << 4) | nibble),
            None => high = Some(nibble),
        }
    }

    if high.is_some() {
        return Err(error());
    }
    Ok(out)
}
