//! Event pipeline for data services.
//!
//! Every operation raises a pre-event before calling the driver and a
//! post-event afterwards. Both phases share one argument record type per
//! operation kind:
//!
//! - In the pre-event, subscribers may rewrite the inputs, set `cancel` and
//!   fill in `result`/`count`. A cancelled operation returns that value
//!   without reaching the driver.
//! - In the post-event, `result`/`count` holds the driver's answer and
//!   subscribers may override it. `cancel` is ignored.
//!
//! Handlers run in subscription order on the caller's thread. A handler
//! returning `Err` aborts the operation.

use std::fmt;

use datakit_core::{Criteria, DataDictionary, Error, Grouping, Paging, Result, Sorting, Value};

type Handler<A> = Box<dyn Fn(&mut A) -> Result<()> + Send + Sync>;
type FailureHandler = Box<dyn Fn(&FailedArgs<'_>) + Send + Sync>;

/// An ordered list of handlers for one event.
pub struct Event<A> {
    handlers: Vec<Handler<A>>,
}

impl<A> Default for Event<A> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }
}

impl<A> Event<A> {
    /// Append a handler.
    pub fn subscribe<F>(&mut self, handler: F)
    where
        F: Fn(&mut A) -> Result<()> + Send + Sync + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    /// Run every handler in subscription order, stopping at the first error.
    pub fn raise(&self, args: &mut A) -> Result<()> {
        for handler in &self.handlers {
            handler(args)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}

impl<A> fmt::Debug for Event<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Operation kinds reported to the `failed` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataOperation {
    Exists,
    Count,
    Increment,
    Decrement,
    Get,
    Select,
    Delete,
    Insert,
    InsertMany,
    Update,
    UpdateMany,
    Execute,
    ExecuteScalar,
}

impl DataOperation {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DataOperation::Exists => "exists",
            DataOperation::Count => "count",
            DataOperation::Increment => "increment",
            DataOperation::Decrement => "decrement",
            DataOperation::Get => "get",
            DataOperation::Select => "select",
            DataOperation::Delete => "delete",
            DataOperation::Insert => "insert",
            DataOperation::InsertMany => "insert_many",
            DataOperation::Update => "update",
            DataOperation::UpdateMany => "update_many",
            DataOperation::Execute => "execute",
            DataOperation::ExecuteScalar => "execute_scalar",
        }
    }
}

impl fmt::Display for DataOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Argument records
// ============================================================================

/// Arguments of `exists`.
#[derive(Debug, Clone)]
pub struct ExistArgs {
    pub(crate) name: String,
    pub condition: Option<Criteria>,
    pub cancel: bool,
    pub result: bool,
}

/// Arguments of `count`.
#[derive(Debug, Clone)]
pub struct CountArgs {
    pub(crate) name: String,
    pub condition: Option<Criteria>,
    pub includes: Option<String>,
    pub cancel: bool,
    pub result: u64,
}

/// Arguments of `increment` and `decrement`.
#[derive(Debug, Clone)]
pub struct IncrementArgs {
    pub(crate) name: String,
    pub member: String,
    pub condition: Option<Criteria>,
    pub interval: i64,
    pub cancel: bool,
    pub result: i64,
}

/// Arguments of a single-row `get`.
#[derive(Debug, Clone)]
pub struct GetArgs<E> {
    pub(crate) name: String,
    pub condition: Criteria,
    pub scope: Option<String>,
    pub cancel: bool,
    pub result: Option<E>,
}

/// Arguments of `select`.
#[derive(Debug, Clone)]
pub struct SelectArgs<E> {
    pub(crate) name: String,
    pub condition: Option<Criteria>,
    pub grouping: Option<Grouping>,
    pub scope: Option<String>,
    pub paging: Option<Paging>,
    pub sortings: Vec<Sorting>,
    pub cancel: bool,
    pub result: Vec<E>,
}

/// Arguments of `delete`.
#[derive(Debug, Clone)]
pub struct DeleteArgs {
    pub(crate) name: String,
    pub condition: Option<Criteria>,
    pub cascades: Option<String>,
    pub cancel: bool,
    pub count: u64,
}

/// Arguments of `insert`.
#[derive(Debug, Clone)]
pub struct InsertArgs {
    pub(crate) name: String,
    pub data: DataDictionary,
    pub scope: Option<String>,
    pub cancel: bool,
    pub count: u64,
}

/// Arguments of `insert_many`.
#[derive(Debug, Clone)]
pub struct InsertManyArgs {
    pub(crate) name: String,
    pub data: Vec<DataDictionary>,
    pub scope: Option<String>,
    pub cancel: bool,
    pub count: u64,
}

/// Arguments of `update`.
#[derive(Debug, Clone)]
pub struct UpdateArgs {
    pub(crate) name: String,
    pub data: DataDictionary,
    pub condition: Option<Criteria>,
    pub scope: Option<String>,
    pub cancel: bool,
    pub count: u64,
}

/// Arguments of `update_many`.
#[derive(Debug, Clone)]
pub struct UpdateManyArgs {
    pub(crate) name: String,
    pub data: Vec<DataDictionary>,
    pub condition: Option<Criteria>,
    pub scope: Option<String>,
    pub cancel: bool,
    pub count: u64,
}

macro_rules! service_name {
    ($($args:ident $(<$param:ident>)?),* $(,)?) => {$(
        impl$(<$param>)? $args$(<$param>)? {
            /// Name of the service, which is also the name the driver is called with.
            pub fn name(&self) -> &str {
                &self.name
            }
        }
    )*};
}

service_name!(
    ExistArgs,
    CountArgs,
    IncrementArgs,
    GetArgs<E>,
    SelectArgs<E>,
    DeleteArgs,
    InsertArgs,
    InsertManyArgs,
    UpdateArgs,
    UpdateManyArgs,
);

/// What a stored procedure produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecuteResult {
    /// Result rows as JSON documents.
    Rows(Vec<serde_json::Value>),
    /// A single value.
    Scalar(Value),
}

/// Arguments of `execute` and `execute_scalar`.
#[derive(Debug, Clone)]
pub struct ExecuteArgs {
    /// Procedure name.
    pub name: String,
    pub inputs: DataDictionary,
    pub outputs: DataDictionary,
    pub cancel: bool,
    pub result: ExecuteResult,
}

/// A driver failure, offered to observers before it propagates.
#[derive(Debug)]
pub struct FailedArgs<'a> {
    /// Service name.
    pub name: &'a str,
    pub operation: DataOperation,
    pub error: &'a Error,
}

// ============================================================================
// Event table
// ============================================================================

/// Observe-only handlers for driver failures.
#[derive(Default)]
pub struct FailedEvent {
    handlers: Vec<FailureHandler>,
}

impl FailedEvent {
    pub fn subscribe<F>(&mut self, handler: F)
    where
        F: Fn(&FailedArgs<'_>) + Send + Sync + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    pub fn raise(&self, args: &FailedArgs<'_>) {
        for handler in &self.handlers {
            handler(args);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for FailedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailedEvent")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Every event a data service raises.
pub struct DataEvents<E> {
    pub existing: Event<ExistArgs>,
    pub existed: Event<ExistArgs>,
    pub counting: Event<CountArgs>,
    pub counted: Event<CountArgs>,
    pub incrementing: Event<IncrementArgs>,
    pub incremented: Event<IncrementArgs>,
    pub decrementing: Event<IncrementArgs>,
    pub decremented: Event<IncrementArgs>,
    pub getting: Event<GetArgs<E>>,
    pub got: Event<GetArgs<E>>,
    pub selecting: Event<SelectArgs<E>>,
    pub selected: Event<SelectArgs<E>>,
    pub deleting: Event<DeleteArgs>,
    pub deleted: Event<DeleteArgs>,
    pub inserting: Event<InsertArgs>,
    pub inserted: Event<InsertArgs>,
    pub many_inserting: Event<InsertManyArgs>,
    pub many_inserted: Event<InsertManyArgs>,
    pub updating: Event<UpdateArgs>,
    pub updated: Event<UpdateArgs>,
    pub many_updating: Event<UpdateManyArgs>,
    pub many_updated: Event<UpdateManyArgs>,
    pub executing: Event<ExecuteArgs>,
    pub executed: Event<ExecuteArgs>,
    pub failed: FailedEvent,
}

impl<E> Default for DataEvents<E> {
    fn default() -> Self {
        Self {
            existing: Event::default(),
            existed: Event::default(),
            counting: Event::default(),
            counted: Event::default(),
            incrementing: Event::default(),
            incremented: Event::default(),
            decrementing: Event::default(),
            decremented: Event::default(),
            getting: Event::default(),
            got: Event::default(),
            selecting: Event::default(),
            selected: Event::default(),
            deleting: Event::default(),
            deleted: Event::default(),
            inserting: Event::default(),
            inserted: Event::default(),
            many_inserting: Event::default(),
            many_inserted: Event::default(),
            updating: Event::default(),
            updated: Event::default(),
            many_updating: Event::default(),
            many_updated: Event::default(),
            executing: Event::default(),
            executed: Event::default(),
            failed: FailedEvent::default(),
        }
    }
}

impl<E> fmt::Debug for DataEvents<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscribed = [
            self.existing.len(),
            self.existed.len(),
            self.counting.len(),
            self.counted.len(),
            self.incrementing.len(),
            self.incremented.len(),
            self.decrementing.len(),
            self.decremented.len(),
            self.getting.len(),
            self.got.len(),
            self.selecting.len(),
            self.selected.len(),
            self.deleting.len(),
            self.deleted.len(),
            self.inserting.len(),
            self.inserted.len(),
            self.many_inserting.len(),
            self.many_inserted.len(),
            self.updating.len(),
            self.updated.len(),
            self.many_updating.len(),
            self.many_updated.len(),
            self.executing.len(),
            self.executed.len(),
            self.failed.len(),
        ]
        .iter()
        .sum::<usize>();
        f.debug_struct("DataEvents")
            .field("handlers", &subscribed)
            .finish()
    }
}
