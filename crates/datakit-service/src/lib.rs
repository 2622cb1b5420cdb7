//! Generic data services for datakit.
//!
//! `datakit-service` sits between application code and a storage driver.
//! A [`DataService`] owns the per-entity behaviour that should not live in
//! either of them:
//!
//! - **Event pipeline**: every operation raises a cancellable pre-event and a
//!   post-event whose subscribers can rewrite inputs and results.
//! - **Key resolution**: positional key values resolve against the primary
//!   key, then against a [`KeyStrategy`] such as a [`SearchKeyMap`].
//! - **Sequences**: declared fields are filled from a sequence provider on
//!   insert.
//! - **Transactions**: multi-row writes commit as one unit.
//!
//! Most applications should use the `datakit` facade.

pub mod config;
pub mod events;
pub mod keys;
pub mod options;
pub mod sequence;
pub mod service;
pub mod transaction;

pub use config::DataServiceConfig;
pub use events::{
    CountArgs, DataEvents, DataOperation, DeleteArgs, Event, ExecuteArgs, ExecuteResult,
    ExistArgs, FailedArgs, FailedEvent, GetArgs, IncrementArgs, InsertArgs, InsertManyArgs,
    SelectArgs, UpdateArgs, UpdateManyArgs,
};
pub use keys::{KeyStrategy, MAX_KEYS, NoKeyStrategy, ResolvedKey, SearchKey, SearchKeyMap};
pub use options::QueryOptions;
pub use sequence::{SEQUENCE_KEY_PREFIX, SequenceDirective, SequenceRegistrar, SequenceToken};
pub use service::{DataService, DataServiceBuilder, GetResult, Page};
pub use transaction::TransactionScope;
