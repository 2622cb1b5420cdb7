//! Core types and traits for datakit.
//!
//! `datakit-core` is the contract layer shared by services and drivers.
//!
//! # Role In The Architecture
//!
//! - **Condition model**: `Condition`, `ConditionCollection`, `Criteria` and
//!   `ConditionalRange` describe predicates independently of any store.
//! - **Data model**: `Value`, `DataDictionary`, `Paging`, `Sorting` and
//!   `Grouping` carry inputs and outputs between layers.
//! - **Contracts**: `Entity` is implemented by user types, `DataAccess` by
//!   storage drivers, `Sequence` and `ServiceProvider` by infrastructure.
//!
//! # Who Uses This Crate
//!
//! - `datakit-service` builds `DataService` on top of these contracts.
//! - `datakit-memory` implements `DataAccess` and `Sequence` in memory.
//!
//! Most applications should use the `datakit` facade.

pub mod access;
pub mod condition;
pub mod convert;
pub mod dictionary;
pub mod entity;
pub mod error;
pub mod field;
pub mod query;
pub mod range;
pub mod sequence;
pub mod value;

pub use access::{DataAccess, ExecuteOutput, ScalarOutput, Transaction};
pub use condition::{
    Condition, ConditionCollection, ConditionCombination, ConditionOperator, Criteria, Operand,
};
pub use convert::{FromValue, convert_value_or, try_convert_value};
pub use dictionary::DataDictionary;
pub use entity::Entity;
pub use error::{
    ArgumentError, ArgumentErrorKind, ConfigError, ConversionError, Error, Result, StorageError,
    StorageErrorKind,
};
pub use field::{FieldInfo, FieldType};
pub use query::{Grouping, Paging, Sorting, SortingMode};
pub use range::{ConditionalRange, RangeParseError};
pub use sequence::{Sequence, ServiceProvider};
pub use value::Value;

/// Build a positional key array.
///
/// ```
/// use datakit_core::{Value, keys};
///
/// let key = keys!["zongsoft", 100];
/// assert_eq!(key, [Value::from("zongsoft"), Value::Int(100)]);
/// ```
#[macro_export]
macro_rules! keys {
    ($($value:expr),* $(,)?) => {
        [$($crate::Value::from($value)),*]
    };
}
