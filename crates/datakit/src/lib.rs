//! datakit: generic data-access services.
//!
//! A [`DataService`] turns entity operations (get, search, select, insert,
//! update, delete, count, increment, stored procedures) into calls on a
//! [`DataAccess`] storage driver. Around every call it runs a cancellable
//! pre-event and an overridable post-event, resolves positional keys to
//! single-row or set lookups, fills sequence-generated fields on insert and
//! wraps multi-row writes in one transaction.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use datakit::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Order {
//!     #[serde(rename = "OrderId")]
//!     order_id: u64,
//!     #[serde(rename = "Customer")]
//!     customer: String,
//! }
//!
//! impl Entity for Order {
//!     const NAME: &'static str = "Orders";
//!
//!     fn fields() -> &'static [FieldInfo] {
//!         static FIELDS: &[FieldInfo] = &[
//!             FieldInfo::new("OrderId", FieldType::UnsignedBigInt).primary_key(true),
//!             FieldInfo::new("Customer", FieldType::Text),
//!         ];
//!         FIELDS
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let registry = ServiceRegistry::new().with_sequence(Arc::new(MemorySequence::new()));
//! let orders = DataServiceBuilder::<Order>::new()
//!     .sequence(SequenceDirective::new(["OrderId"]).seed(1000))
//!     .build(MemoryDataAccess::new().with_table("Orders", ["OrderId"]), &registry)?;
//!
//! orders.insert(&Order { order_id: 0, customer: "zongsoft".into() }, None)?;
//!
//! let order = orders.get(&keys![1001], &QueryOptions::new())?.into_single();
//! assert_eq!(order.map(|o| o.customer).as_deref(), Some("zongsoft"));
//! # Ok(())
//! # }
//! ```
//!
//! # Crates
//!
//! - `datakit-core`: values, conditions, ranges, entity and driver contracts.
//! - `datakit-service`: `DataService`, events, key resolution, sequences.
//! - `datakit-memory` (feature `memory`, on by default): in-memory driver,
//!   sequence provider and service registry.

pub use datakit_core::{
    ArgumentError, ArgumentErrorKind, Condition, ConditionCollection, ConditionCombination,
    ConditionOperator, ConditionalRange, ConfigError, ConversionError, Criteria, DataAccess,
    DataDictionary, Entity, Error, ExecuteOutput, FieldInfo, FieldType, FromValue, Grouping,
    Operand, Paging, RangeParseError, Result, ScalarOutput, Sequence, ServiceProvider, Sorting,
    SortingMode, StorageError, StorageErrorKind, Transaction, Value, convert, convert_value_or,
    keys, try_convert_value,
};
pub use datakit_service::{
    DataEvents, DataOperation, DataService, DataServiceBuilder, DataServiceConfig, GetResult,
    KeyStrategy, NoKeyStrategy, Page, QueryOptions, ResolvedKey, SearchKey, SearchKeyMap,
    SequenceDirective, SequenceRegistrar, TransactionScope, events,
};

#[cfg(feature = "memory")]
pub use datakit_memory::{MemoryDataAccess, MemorySequence, ServiceRegistry};

/// Everything needed to declare entities and use data services.
pub mod prelude {
    pub use crate::{
        Condition, ConditionCollection, ConditionalRange, Criteria, DataAccess, DataDictionary,
        DataService, DataServiceBuilder, DataServiceConfig, Entity, Error, FieldInfo, FieldType,
        GetResult, Grouping, KeyStrategy, Paging, QueryOptions, Result, SearchKeyMap,
        SequenceDirective, ServiceProvider, Sorting, Value, keys,
    };

    #[cfg(feature = "memory")]
    pub use crate::{MemoryDataAccess, MemorySequence, ServiceRegistry};
}
