//! Sequence-generated key fields.
//!
//! A [`SequenceDirective`] declares that the last of its `keys` is filled
//! from a sequence provider on insert. The leading keys scope the counter:
//! `["Namespace", "OrderId"]` keeps one counter per namespace.
//!
//! Directives are resolved once, when the service is built, into
//! [`SequenceToken`]s owned by that service instance.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use datakit_core::{
    DataDictionary, Entity, Error, FieldType, Result, Sequence, ServiceProvider, Value,
};

/// Prefix of every sequence key.
pub const SEQUENCE_KEY_PREFIX: &str = "datakit.sequence";

/// Declares a sequence-generated field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceDirective {
    /// Leading scope fields followed by the generated field.
    pub keys: Vec<String>,
    /// Literal inserted after the key prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Starting value of a fresh counter.
    #[serde(default)]
    pub seed: i64,
    /// Named sequence provider; the default provider when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<String>,
}

impl SequenceDirective {
    /// A directive over `keys`; the last key is the generated field.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            prefix: None,
            seed: 0,
            sequence: None,
        }
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn seed(mut self, seed: i64) -> Self {
        self.seed = seed;
        self
    }

    pub fn sequence(mut self, name: impl Into<String>) -> Self {
        self.sequence = Some(name.into());
        self
    }

    /// The generated field.
    pub fn field(&self) -> Option<&str> {
        self.keys.last().map(String::as_str)
    }

    /// The scope fields preceding the generated field.
    pub fn leading(&self) -> &[String] {
        match self.keys.split_last() {
            Some((_, leading)) => leading,
            None => &[],
        }
    }
}

/// A resolved directive.
#[derive(Clone)]
pub struct SequenceToken {
    pub sequence: Arc<dyn Sequence>,
    pub directive: SequenceDirective,
    pub field_type: FieldType,
}

impl fmt::Debug for SequenceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceToken")
            .field("directive", &self.directive)
            .field("field_type", &self.field_type)
            .finish_non_exhaustive()
    }
}

impl SequenceToken {
    /// Sequence key for `data`, or `None` when a scope field is absent or null.
    pub fn key_for(&self, data: &DataDictionary) -> Option<String> {
        let field = self.directive.field()?;
        let mut key = String::from(SEQUENCE_KEY_PREFIX);

        if let Some(prefix) = self.directive.prefix.as_deref().filter(|p| !p.trim().is_empty()) {
            key.push(':');
            key.push_str(prefix);
        }

        for name in self.directive.leading() {
            let value = data.get(name).filter(|v| !v.is_null())?;
            key.push(':');
            key.push_str(&value.to_string().to_lowercase());
        }

        key.push(':');
        key.push_str(&field.to_lowercase());
        Some(key)
    }
}

/// The per-service list of sequence tokens.
#[derive(Debug, Clone, Default)]
pub struct SequenceRegistrar {
    tokens: Vec<SequenceToken>,
}

impl SequenceRegistrar {
    /// Resolve `directives` against the entity's fields and `provider`.
    ///
    /// Fails when a directive has no keys, names a field the entity does not
    /// declare, names a non-numeric field, or names a provider that cannot be
    /// resolved.
    pub fn register<E: Entity>(
        service: &str,
        directives: &[SequenceDirective],
        provider: &dyn ServiceProvider,
    ) -> Result<Self> {
        let mut tokens = Vec::with_capacity(directives.len());

        for directive in directives {
            let Some(field_name) = directive.field() else {
                return Err(Error::config(service, "sequence directive declares no keys"));
            };

            let sequence = provider.sequence(directive.sequence.as_deref()).ok_or_else(|| {
                Error::config(
                    service,
                    format!(
                        "sequence '{}' not found",
                        directive.sequence.as_deref().unwrap_or("default")
                    ),
                )
            })?;

            let field = E::field(field_name).ok_or_else(|| {
                Error::config(
                    service,
                    format!("sequence field '{}' does not exist", field_name),
                )
            })?;

            if !field.field_type.is_numeric() {
                return Err(Error::config(
                    service,
                    format!(
                        "sequence field '{}' is {}, not numeric",
                        field_name,
                        field.field_type.name()
                    ),
                ));
            }

            tokens.push(SequenceToken {
                sequence,
                directive: directive.clone(),
                field_type: field.field_type,
            });
        }

        Ok(Self { tokens })
    }

    pub fn tokens(&self) -> &[SequenceToken] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Fill every unset generated field in `data`.
    ///
    /// A field is unset when absent, null or zero. Returns how many fields
    /// were assigned.
    pub fn increments(&self, data: &mut DataDictionary) -> Result<usize> {
        let mut assigned = 0;

        for token in &self.tokens {
            let Some(field) = token.directive.field() else {
                continue;
            };
            let Some(key) = token.key_for(data) else {
                tracing::debug!(field, "Sequence scope incomplete, skipping");
                continue;
            };

            let written = data.try_set_with(
                field,
                |current| current.is_none_or(|v| v.is_null() || v.is_zero()),
                || {
                    let next = token.sequence.increment(&key, 1, token.directive.seed)?;
                    tracing::debug!(key = %key, value = next, "Reserved sequence value");
                    Ok(coerce(next, token.field_type))
                },
            )?;

            if written {
                assigned += 1;
            }
        }

        Ok(assigned)
    }
}

/// Convert a reserved value to the representation of `field_type`.
fn coerce(value: i64, field_type: FieldType) -> Value {
    match field_type {
        FieldType::TinyInt | FieldType::SmallInt | FieldType::Integer => {
            i32::try_from(value).map_or(Value::BigInt(value), Value::Int)
        }
        FieldType::UnsignedInteger | FieldType::UnsignedBigInt => {
            u64::try_from(value).map_or(Value::BigInt(value), Value::UBigInt)
        }
        FieldType::Float | FieldType::Double | FieldType::Decimal => Value::Double(value as f64),
        _ => Value::BigInt(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use datakit_core::FieldInfo;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Ticket {
        #[serde(rename = "Namespace")]
        namespace: Option<String>,
        #[serde(rename = "TicketId")]
        ticket_id: u64,
        #[serde(rename = "Title")]
        title: String,
    }

    impl Entity for Ticket {
        const NAME: &'static str = "Tickets";

        fn fields() -> &'static [FieldInfo] {
            static FIELDS: &[FieldInfo] = &[
                FieldInfo::new("Namespace", FieldType::Text).nullable(true),
                FieldInfo::new("TicketId", FieldType::UnsignedBigInt).primary_key(true),
                FieldInfo::new("Title", FieldType::Text),
            ];
            FIELDS
        }
    }

    #[derive(Default)]
    struct Counter {
        calls: Mutex<Vec<String>>,
        values: Mutex<HashMap<String, i64>>,
    }

    impl Sequence for Counter {
        fn increment(&self, key: &str, step: i64, seed: i64) -> Result<i64> {
            self.calls.lock().unwrap().push(key.to_string());
            let mut values = self.values.lock().unwrap();
            let value = values.entry(key.to_string()).or_insert(seed);
            *value += step;
            Ok(*value)
        }
    }

    struct Provider(Arc<Counter>);

    impl ServiceProvider for Provider {
        fn sequence(&self, name: Option<&str>) -> Option<Arc<dyn Sequence>> {
            match name {
                None | Some("tickets") => Some(self.0.clone()),
                Some(_) => None,
            }
        }
    }

    fn registrar(directive: SequenceDirective) -> (SequenceRegistrar, Arc<Counter>) {
        let counter = Arc::new(Counter::default());
        let registrar =
            SequenceRegistrar::register::<Ticket>("Tickets", &[directive], &Provider(counter.clone()))
                .unwrap();
        (registrar, counter)
    }

    fn row(namespace: Option<&str>, id: u64) -> DataDictionary {
        DataDictionary::from_entity(&Ticket {
            namespace: namespace.map(str::to_string),
            ticket_id: id,
            title: "t".into(),
        })
        .unwrap()
    }

    #[test]
    fn test_key_layout() {
        let (registrar, _) =
            registrar(SequenceDirective::new(["Namespace", "TicketId"]).prefix("help"));
        let key = registrar.tokens()[0].key_for(&row(Some("ZongSoft"), 0));
        assert_eq!(key.as_deref(), Some("datakit.sequence:help:zongsoft:ticketid"));
    }

    #[test]
    fn test_unset_field_is_assigned_once() {
        let (registrar, counter) = registrar(SequenceDirective::new(["TicketId"]).seed(100));
        let mut data = row(None, 0);

        assert_eq!(registrar.increments(&mut data).unwrap(), 1);
        assert_eq!(data.get("TicketId"), Some(&Value::UBigInt(101)));
        assert_eq!(
            *counter.calls.lock().unwrap(),
            vec!["datakit.sequence:ticketid".to_string()]
        );
    }

    #[test]
    fn test_preset_field_is_kept() {
        let (registrar, counter) = registrar(SequenceDirective::new(["TicketId"]));
        let mut data = row(None, 42);

        assert_eq!(registrar.increments(&mut data).unwrap(), 0);
        assert_eq!(data.get("TicketId"), Some(&Value::BigInt(42)));
        assert!(counter.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_null_scope_skips_row() {
        let (registrar, counter) = registrar(SequenceDirective::new(["Namespace", "TicketId"]));
        let mut data = row(None, 0);

        assert_eq!(registrar.increments(&mut data).unwrap(), 0);
        assert!(counter.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_register_rejects_bad_directives() {
        let provider = Provider(Arc::new(Counter::default()));

        let missing = SequenceRegistrar::register::<Ticket>(
            "Tickets",
            &[SequenceDirective::new(["Nope"])],
            &provider,
        );
        assert!(matches!(missing, Err(Error::Config(_))));

        let text = SequenceRegistrar::register::<Ticket>(
            "Tickets",
            &[SequenceDirective::new(["Title"])],
            &provider,
        );
        assert!(matches!(text, Err(Error::Config(_))));

        let unknown = SequenceRegistrar::register::<Ticket>(
            "Tickets",
            &[SequenceDirective::new(["TicketId"]).sequence("orders")],
            &provider,
        );
        assert!(matches!(unknown, Err(Error::Config(_))));

        let empty = SequenceRegistrar::register::<Ticket>("Tickets", &[], &provider).unwrap();
        assert!(empty.is_empty());
    }
}
