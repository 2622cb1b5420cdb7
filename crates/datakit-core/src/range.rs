//! Inclusive ranges over a single field.
//!
//! A [`ConditionalRange`] has two optional boundaries and renders to the
//! narrowest [`Condition`] that expresses it. Its textual form is
//! `""`, `"(from)"`, `"(~to)"` or `"(from~to)"`.

use std::fmt;

use crate::condition::Condition;
use crate::convert::FromValue;
use crate::error::{ConversionError, Error};
use crate::value::Value;

/// Failure to parse the textual range form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeParseError {
    /// The input was empty, whitespace or an empty pair of parentheses.
    Blank,
    /// A boundary could not be converted to the requested type.
    Conversion(ConversionError),
}

impl fmt::Display for RangeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeParseError::Blank => f.write_str("range text is blank"),
            RangeParseError::Conversion(e) => {
                write!(f, "range boundary '{}' is not a valid {}", e.value, e.target)
            }
        }
    }
}

impl std::error::Error for RangeParseError {}

impl From<RangeParseError> for Error {
    fn from(err: RangeParseError) -> Self {
        match err {
            RangeParseError::Blank => Error::missing("range"),
            RangeParseError::Conversion(e) => Error::Conversion(e),
        }
    }
}

/// Two optional boundaries, both inclusive.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConditionalRange {
    from: Option<Value>,
    to: Option<Value>,
}

/// Unwrap arrays to their first element and drop blank values.
fn normalize(value: Value) -> Option<Value> {
    match value {
        Value::Array(items) => items.into_iter().next().and_then(normalize),
        Value::Json(serde_json::Value::Array(items)) => {
            items.into_iter().next().map(Value::from).and_then(normalize)
        }
        other if other.is_blank() => None,
        other => Some(other),
    }
}

impl ConditionalRange {
    pub fn new(from: impl Into<Value>, to: impl Into<Value>) -> Self {
        Self {
            from: normalize(from.into()),
            to: normalize(to.into()),
        }
    }

    pub fn from(&self) -> Option<&Value> {
        self.from.as_ref()
    }

    pub fn to(&self) -> Option<&Value> {
        self.to.as_ref()
    }

    /// Set the lower boundary; blank values clear it.
    pub fn set_from(&mut self, value: impl Into<Value>) {
        self.from = normalize(value.into());
    }

    /// Set the upper boundary; blank values clear it.
    pub fn set_to(&mut self, value: impl Into<Value>) {
        self.to = normalize(value.into());
    }

    /// True when at least one boundary is set.
    pub fn has_value(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    /// True when `range` is absent or has no boundary.
    pub fn is_empty(range: Option<&Self>) -> bool {
        range.is_none_or(|r| !r.has_value())
    }

    /// Render as a condition on `name`.
    ///
    /// Returns `None` for an empty range, `<=` for an upper bound only, `>=`
    /// for a lower bound only and `BETWEEN` otherwise.
    pub fn to_condition(&self, name: impl Into<String>) -> Option<Condition> {
        match (&self.from, &self.to) {
            (None, None) => None,
            (None, Some(to)) => Some(Condition::less_than_equal(name, to.clone())),
            (Some(from), None) => Some(Condition::greater_than_equal(name, from.clone())),
            (Some(from), Some(to)) => Some(Condition::between(name, from.clone(), to.clone())),
        }
    }

    /// Parse the textual form, converting each boundary to `T`.
    ///
    /// Blank input is an error. Input whose boundaries are all blank, such
    /// as `"(~)"`, parses successfully to `None`.
    ///
    /// ```
    /// use datakit_core::{ConditionalRange, Value};
    ///
    /// let range = ConditionalRange::try_parse::<i32>("(1~10)").unwrap().unwrap();
    /// assert_eq!(range.from(), Some(&Value::Int(1)));
    /// assert_eq!(range.to(), Some(&Value::Int(10)));
    ///
    /// assert!(ConditionalRange::try_parse::<i32>("(~)").unwrap().is_none());
    /// assert!(ConditionalRange::try_parse::<i32>("  ").is_err());
    /// ```
    pub fn try_parse<T>(text: &str) -> Result<Option<Self>, RangeParseError>
    where
        T: FromValue + Into<Value>,
    {
        let text = text.trim();
        let text = text.strip_prefix('(').unwrap_or(text);
        let text = text.strip_suffix(')').unwrap_or(text);
        if text.trim().is_empty() {
            return Err(RangeParseError::Blank);
        }

        let mut parts = text
            .split('~')
            .map(|part| part.trim().trim_matches(|c| c == '?' || c == '*'));

        let from = parts.next().map(parse_boundary::<T>).transpose()?.flatten();
        let to = parts.next().map(parse_boundary::<T>).transpose()?.flatten();

        if from.is_none() && to.is_none() {
            return Ok(None);
        }
        Ok(Some(Self { from, to }))
    }

    /// [`try_parse`](Self::try_parse) that maps every failure to `None`.
    pub fn parse<T>(text: &str) -> Option<Self>
    where
        T: FromValue + Into<Value>,
    {
        Self::try_parse::<T>(text).ok().flatten()
    }
}

fn parse_boundary<T>(part: &str) -> Result<Option<Value>, RangeParseError>
where
    T: FromValue + Into<Value>,
{
    if part.trim().is_empty() {
        return Ok(None);
    }
    let converted = T::from_value(&Value::Text(part.to_string()))
        .map_err(RangeParseError::Conversion)?;
    Ok(normalize(converted.into()))
}

impl fmt::Display for ConditionalRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.from, &self.to) {
            (None, None) => Ok(()),
            (None, Some(to)) => write!(f, "(~{})", to),
            (Some(from), None) => write!(f, "({})", from),
            (Some(from), Some(to)) => write!(f, "({}~{})", from, to),
        }
    }
}
