//! The `Entity` trait implemented by every type a data service manages.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::field::FieldInfo;

/// A persistable entity.
///
/// Entities are projected into [`DataDictionary`](crate::DataDictionary)
/// payloads through `serde`, and rebuilt from driver rows the same way.
/// Field names in [`Entity::fields`] must match the serialized names.
///
/// # Example
///
/// ```
/// use datakit_core::{Entity, FieldInfo, FieldType};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct User {
///     #[serde(rename = "UserId")]
///     user_id: u32,
///     #[serde(rename = "Name")]
///     name: String,
/// }
///
/// impl Entity for User {
///     const NAME: &'static str = "Security.User";
///
///     fn fields() -> &'static [FieldInfo] {
///         static FIELDS: &[FieldInfo] = &[
///             FieldInfo::new("UserId", FieldType::UnsignedInteger).primary_key(true),
///             FieldInfo::new("Name", FieldType::Text),
///         ];
///         FIELDS
///     }
/// }
///
/// assert!(User::field("UserId").is_some());
/// ```
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Default logical name the driver knows this entity by.
    const NAME: &'static str;

    /// Declared fields.
    fn fields() -> &'static [FieldInfo];

    /// Look up a declared field by name.
    fn field(name: &str) -> Option<&'static FieldInfo> {
        Self::fields().iter().find(|f| f.name == name)
    }
}
