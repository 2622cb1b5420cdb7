//! Key resolution.
//!
//! Positional keys are matched against the primary key the driver declares
//! for the service. When they match, the lookup is a singleton: at most one
//! row can satisfy it. Otherwise, and for free-text search, the service's
//! [`KeyStrategy`] decides.

use serde::{Deserialize, Serialize};

use datakit_core::{
    Condition, ConditionCollection, ConditionCombination, Criteria, Error, Result, Value,
};

/// Most positional key values a lookup accepts.
pub const MAX_KEYS: usize = 3;

/// A resolved lookup condition.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedKey {
    pub criteria: Criteria,
    /// True when the condition identifies at most one row.
    pub singleton: bool,
}

impl ResolvedKey {
    pub fn single(criteria: impl Into<Criteria>) -> Self {
        Self {
            criteria: criteria.into(),
            singleton: true,
        }
    }

    pub fn many(criteria: impl Into<Criteria>) -> Self {
        Self {
            criteria: criteria.into(),
            singleton: false,
        }
    }
}

/// Service-specific key resolution.
///
/// Both methods default to "unsupported".
pub trait KeyStrategy: Send + Sync {
    /// Resolve positional values that do not match the primary key.
    fn resolve_key(&self, values: &[Value]) -> Option<Criteria> {
        let _ = values;
        None
    }

    /// Resolve a search keyword, already split into `tag` and `value`.
    ///
    /// `value` is `None` when the keyword ended right after the tag.
    fn resolve_search(&self, tag: Option<&str>, value: Option<&str>) -> Option<ResolvedKey> {
        let _ = (tag, value);
        None
    }
}

/// A strategy that resolves nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoKeyStrategy;

impl KeyStrategy for NoKeyStrategy {}

/// Build the equality condition for positional values against `primary_key`.
///
/// Returns `None` when no key is declared or the arity differs.
pub fn primary_key_condition(primary_key: &[String], values: &[Value]) -> Option<Criteria> {
    if primary_key.is_empty() || primary_key.len() != values.len() {
        return None;
    }

    let conditions = primary_key
        .iter()
        .zip(values)
        .map(|(field, value)| Condition::equal(field.as_str(), value.clone()));
    Some(ConditionCollection::with_items(ConditionCombination::And, conditions).into_criteria())
}

/// Resolve positional values.
///
/// More than [`MAX_KEYS`] values is an error. Values that match the primary
/// key resolve to a singleton lookup; anything else goes through `strategy`,
/// and a `None` from it is reported as an unresolved key naming `service`.
/// An empty `values` is unresolved without consulting `strategy`.
pub fn resolve_key(
    service: &str,
    primary_key: &[String],
    values: &[Value],
    strategy: &dyn KeyStrategy,
) -> Result<ResolvedKey> {
    if values.len() > MAX_KEYS {
        return Err(Error::too_many_keys(values.len()));
    }

    let unresolved = || {
        Error::unresolved_key(
            "keys",
            format!("the specified key is invalid for the '{}' service", service),
        )
    };
    if values.is_empty() {
        return Err(unresolved());
    }

    if let Some(criteria) = primary_key_condition(primary_key, values) {
        return Ok(ResolvedKey::single(criteria));
    }

    strategy
        .resolve_key(values)
        .map(|criteria| ResolvedKey::many(collapse(criteria)))
        .ok_or_else(unresolved)
}

/// Split a keyword into an optional tag and value.
///
/// The tag is whatever precedes the first `:` past the first character. A
/// keyword ending right after the colon has no value.
pub fn split_keyword(keyword: &str) -> (Option<&str>, Option<&str>) {
    match keyword.find(':') {
        Some(index) if index >= 1 => {
            let value = &keyword[index + 1..];
            (
                Some(&keyword[..index]),
                (!value.is_empty()).then_some(value),
            )
        }
        _ => (None, Some(keyword)),
    }
}

/// Resolve a search keyword through `strategy`.
pub fn resolve_search(
    service: &str,
    keyword: &str,
    strategy: &dyn KeyStrategy,
) -> Result<ResolvedKey> {
    let unsupported = || {
        Error::unresolved_key(
            "keyword",
            format!(
                "the '{}' service does not support search or the search key is invalid",
                service
            ),
        )
    };

    if keyword.trim().is_empty() {
        return Err(unsupported());
    }

    let (tag, value) = split_keyword(keyword);
    let resolved = strategy.resolve_search(tag, value).ok_or_else(unsupported)?;
    Ok(ResolvedKey {
        criteria: collapse(resolved.criteria),
        singleton: resolved.singleton,
    })
}

fn collapse(criteria: Criteria) -> Criteria {
    match criteria {
        Criteria::Collection(collection) => collection.into_criteria(),
        other => other,
    }
}

// ============================================================================
// Declarative search keys
// ============================================================================

/// One search tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchKey {
    pub tag: String,
    /// Fields compared for equality; several fields are OR-ed.
    pub fields: Vec<String>,
    /// Whether a match identifies at most one row.
    #[serde(default)]
    pub singleton: bool,
}

/// A [`KeyStrategy`] built from a table of search tags.
///
/// ```
/// use datakit_service::{KeyStrategy, SearchKeyMap};
///
/// let keys = SearchKeyMap::new()
///     .key("Key", ["Name", "PhoneNumber", "Email"], true)
///     .key("Namespace", ["Namespace"], false)
///     .default_tag("Key");
///
/// let resolved = keys.resolve_search(Some("Namespace"), Some("zongsoft")).unwrap();
/// assert!(!resolved.singleton);
/// assert!(keys.resolve_search(None, Some("alice")).unwrap().singleton);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchKeyMap {
    #[serde(default)]
    pub keys: Vec<SearchKey>,
    /// Tag used when the keyword carries none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_tag: Option<String>,
}

impl SearchKeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tag.
    pub fn key<I, S>(mut self, tag: impl Into<String>, fields: I, singleton: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys.push(SearchKey {
            tag: tag.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            singleton,
        });
        self
    }

    pub fn default_tag(mut self, tag: impl Into<String>) -> Self {
        self.default_tag = Some(tag.into());
        self
    }

    /// Find a tag, ignoring ASCII case.
    pub fn find(&self, tag: &str) -> Option<&SearchKey> {
        self.keys.iter().find(|k| k.tag.eq_ignore_ascii_case(tag))
    }
}

impl KeyStrategy for SearchKeyMap {
    fn resolve_search(&self, tag: Option<&str>, value: Option<&str>) -> Option<ResolvedKey> {
        let value = value?.trim();
        if value.is_empty() {
            return None;
        }

        let tag = tag.or(self.default_tag.as_deref())?;
        let key = self.find(tag.trim())?;

        let criteria = match key.fields.as_slice() {
            [] => return None,
            [field] => Criteria::from(Condition::equal(field.as_str(), value)),
            fields => ConditionCollection::with_items(
                ConditionCombination::Or,
                fields.iter().map(|f| Condition::equal(f.as_str(), value)),
            )
            .into(),
        };

        Some(ResolvedKey {
            criteria,
            singleton: key.singleton,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datakit_core::ArgumentErrorKind;

    fn pk(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| (*f).to_string()).collect()
    }

    #[test]
    fn test_single_field_key_is_plain_condition() {
        let resolved = resolve_key("Users", &pk(&["UserId"]), &[Value::from(7)], &NoKeyStrategy)
            .unwrap();
        assert!(resolved.singleton);
        assert_eq!(
            resolved.criteria,
            Criteria::from(Condition::equal("UserId", 7))
        );
    }

    #[test]
    fn test_composite_key_is_and_collection() {
        let resolved = resolve_key(
            "Members",
            &pk(&["A", "B"]),
            &[Value::from(1), Value::from(2)],
            &NoKeyStrategy,
        )
        .unwrap();
        assert!(resolved.singleton);

        let collection = resolved.criteria.as_collection().unwrap();
        assert_eq!(collection.combination(), ConditionCombination::And);
        assert_eq!(collection.len(), 2);
        assert_eq!(collection[0], Criteria::from(Condition::equal("A", 1)));
        assert_eq!(collection[1], Criteria::from(Condition::equal("B", 2)));
    }

    #[test]
    fn test_too_many_keys() {
        let values = [1, 2, 3, 4].map(Value::from);
        let err = resolve_key("Members", &pk(&["A"]), &values, &NoKeyStrategy).unwrap_err();
        assert_eq!(err.argument_kind(), Some(ArgumentErrorKind::TooManyKeys));
    }

    #[test]
    fn test_arity_mismatch_without_strategy_names_service() {
        let err = resolve_key(
            "Members",
            &pk(&["A", "B"]),
            &[Value::from(1)],
            &NoKeyStrategy,
        )
        .unwrap_err();
        assert_eq!(err.argument_kind(), Some(ArgumentErrorKind::UnresolvedKey));
        assert!(err.to_string().contains("Members"));
    }

    #[test]
    fn test_arity_mismatch_uses_strategy() {
        struct ByNamespace;
        impl KeyStrategy for ByNamespace {
            fn resolve_key(&self, values: &[Value]) -> Option<Criteria> {
                Some(
                    ConditionCollection::and()
                        .with(Condition::equal("Namespace", values[0].clone()))
                        .into(),
                )
            }
        }

        let resolved =
            resolve_key("Members", &pk(&["A", "B"]), &[Value::from("x")], &ByNamespace).unwrap();
        assert!(!resolved.singleton);
        assert_eq!(
            resolved.criteria,
            Criteria::from(Condition::equal("Namespace", "x"))
        );
    }

    #[test]
    fn test_empty_values_never_reach_strategy() {
        struct FirstValue;
        impl KeyStrategy for FirstValue {
            fn resolve_key(&self, values: &[Value]) -> Option<Criteria> {
                Some(Condition::equal("Name", values[0].clone()).into())
            }
        }

        let err = resolve_key("Members", &pk(&["A"]), &[], &FirstValue).unwrap_err();
        assert_eq!(err.argument_kind(), Some(ArgumentErrorKind::UnresolvedKey));
        assert!(err.to_string().contains("Members"));
    }

    #[test]
    fn test_split_keyword() {
        assert_eq!(split_keyword("Name:alice"), (Some("Name"), Some("alice")));
        assert_eq!(split_keyword("Name:"), (Some("Name"), None));
        assert_eq!(split_keyword(":alice"), (None, Some(":alice")));
        assert_eq!(split_keyword("alice"), (None, Some("alice")));
    }

    #[test]
    fn test_search_key_map_ors_fields() {
        let keys = SearchKeyMap::new().key("Key", ["Name", "Email"], true);
        let resolved = resolve_search("Users", "key:bob", &keys).unwrap();
        assert!(resolved.singleton);
        assert_eq!(resolved.criteria.to_string(), "(Name = bob OR Email = bob)");
    }

    #[test]
    fn test_search_blank_or_unknown_is_rejected() {
        let keys = SearchKeyMap::new().key("Key", ["Name"], true);
        assert!(resolve_search("Users", "  ", &keys).is_err());
        assert!(resolve_search("Users", "Phone:123", &keys).is_err());
        assert!(resolve_search("Users", "Key:", &keys).is_err());
        // no default tag configured
        assert!(resolve_search("Users", "bob", &keys).is_err());
        assert!(resolve_search("Users", "Key:bob", &NoKeyStrategy).is_err());
    }

    #[test]
    fn test_search_key_map_deserializes() {
        let keys: SearchKeyMap = serde_json::from_str(
            r#"{"keys":[{"tag":"Key","fields":["Name"],"singleton":true}],"default_tag":"Key"}"#,
        )
        .unwrap();
        assert!(keys.resolve_search(None, Some("bob")).unwrap().singleton);
    }
}
