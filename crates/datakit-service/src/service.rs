//! The generic data service.
//!
//! `DataService<E, A>` turns entity operations into calls on a [`DataAccess`]
//! driver. Each operation:
//!
//! 1. builds its argument record and raises the pre-event,
//! 2. returns the record's result unchanged if a subscriber cancelled,
//! 3. otherwise calls the driver with the (possibly rewritten) inputs,
//! 4. raises the post-event and returns whatever the record then holds.
//!
//! Driver failures are offered to the `failed` event and then propagated.

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

use datakit_core::{
    Criteria, DataAccess, DataDictionary, Entity, Error, ExecuteOutput, Paging, Result,
    ScalarOutput, ServiceProvider, Value,
};

use crate::config::DataServiceConfig;
use crate::events::{
    CountArgs, DataEvents, DataOperation, DeleteArgs, ExecuteArgs, ExecuteResult, ExistArgs,
    FailedArgs, GetArgs, IncrementArgs, InsertArgs, InsertManyArgs, SelectArgs, UpdateArgs,
    UpdateManyArgs,
};
use crate::keys::{self, KeyStrategy, MAX_KEYS, NoKeyStrategy, ResolvedKey, SearchKeyMap};
use crate::options::QueryOptions;
use crate::sequence::{SequenceDirective, SequenceRegistrar};
use crate::transaction::TransactionScope;

// ============================================================================
// Results
// ============================================================================

/// Result of a key lookup: one row or a set, decided by key resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum GetResult<E> {
    Single(Option<E>),
    Many(Vec<E>),
}

impl<E> GetResult<E> {
    pub fn is_single(&self) -> bool {
        matches!(self, GetResult::Single(_))
    }

    /// The single row; `None` for set results.
    pub fn into_single(self) -> Option<E> {
        match self {
            GetResult::Single(entity) => entity,
            GetResult::Many(_) => None,
        }
    }

    /// All rows, whichever shape the lookup had.
    pub fn into_vec(self) -> Vec<E> {
        match self {
            GetResult::Single(entity) => entity.into_iter().collect(),
            GetResult::Many(entities) => entities,
        }
    }
}

/// Rows of a select together with the paging the driver filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<E> {
    pub items: Vec<E>,
    pub paging: Option<Paging>,
}

// ============================================================================
// Builder
// ============================================================================

/// Builds a [`DataService`].
///
/// All validation happens in [`build`](DataServiceBuilder::build).
pub struct DataServiceBuilder<E: Entity> {
    config: DataServiceConfig,
    key_strategy: Option<Box<dyn KeyStrategy>>,
    events: DataEvents<E>,
}

impl<E: Entity> Default for DataServiceBuilder<E> {
    fn default() -> Self {
        Self {
            config: DataServiceConfig::default(),
            key_strategy: None,
            events: DataEvents::default(),
        }
    }
}

impl<E: Entity> DataServiceBuilder<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: DataServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    /// Declare a sequence-generated field.
    pub fn sequence(mut self, directive: SequenceDirective) -> Self {
        self.config.sequences.push(directive);
        self
    }

    /// Use a declarative search key table.
    pub fn search_keys(mut self, keys: SearchKeyMap) -> Self {
        self.config.search = Some(keys);
        self
    }

    /// Use a custom key strategy. Takes precedence over search keys.
    pub fn key_strategy(mut self, strategy: impl KeyStrategy + 'static) -> Self {
        self.key_strategy = Some(Box::new(strategy));
        self
    }

    /// Subscribe to events before the service is shared.
    pub fn events(mut self, subscribe: impl FnOnce(&mut DataEvents<E>)) -> Self {
        subscribe(&mut self.events);
        self
    }

    /// Validate the configuration, resolve sequences and build the service.
    pub fn build<A: DataAccess>(
        self,
        access: A,
        provider: &dyn ServiceProvider,
    ) -> Result<DataService<E, A>> {
        self.config.validate()?;

        let name = self.config.resolve_name(E::NAME);
        let sequences = SequenceRegistrar::register::<E>(&name, &self.config.sequences, provider)?;

        let keys: Box<dyn KeyStrategy> = match (self.key_strategy, self.config.search) {
            (Some(strategy), _) => strategy,
            (None, Some(search)) => Box::new(search),
            (None, None) => Box::new(NoKeyStrategy),
        };

        tracing::info!(
            service = %name,
            entity = std::any::type_name::<E>(),
            sequences = sequences.tokens().len(),
            "Built data service"
        );

        Ok(DataService {
            name,
            access,
            events: self.events,
            keys,
            sequences,
        })
    }
}

// ============================================================================
// Service
// ============================================================================

/// Orchestrates entity operations over a storage driver.
///
/// The API takes `&self`; a built service is `Send + Sync` and can be shared
/// across threads. Subscribe to events through the builder or
/// [`events_mut`](DataService::events_mut) before sharing it.
pub struct DataService<E: Entity, A: DataAccess> {
    name: String,
    access: A,
    events: DataEvents<E>,
    keys: Box<dyn KeyStrategy>,
    sequences: SequenceRegistrar,
}

impl<E: Entity, A: DataAccess> fmt::Debug for DataService<E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataService")
            .field("name", &self.name)
            .field("entity", &std::any::type_name::<E>())
            .field("events", &self.events)
            .field("sequences", &self.sequences.tokens().len())
            .finish_non_exhaustive()
    }
}

impl<E: Entity, A: DataAccess> DataService<E, A> {
    /// A service with default configuration.
    pub fn new(access: A, provider: &dyn ServiceProvider) -> Result<Self> {
        DataServiceBuilder::new().build(access, provider)
    }

    /// Logical name the driver knows this service's entity set by.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn access(&self) -> &A {
        &self.access
    }

    pub fn events(&self) -> &DataEvents<E> {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut DataEvents<E> {
        &mut self.events
    }

    pub fn sequences(&self) -> &SequenceRegistrar {
        &self.sequences
    }

    /// Offer a driver failure to the `failed` event, then pass it on.
    fn observe<T>(&self, operation: DataOperation, result: Result<T>) -> Result<T> {
        result.map_err(|error| {
            tracing::warn!(
                service = %self.name,
                operation = %operation,
                error = %error,
                "Data access failed"
            );
            self.events.failed.raise(&FailedArgs {
                name: &self.name,
                operation,
                error: &error,
            });
            error
        })
    }

    fn cancelled(&self, operation: DataOperation) {
        tracing::debug!(service = %self.name, operation = %operation, "Cancelled by subscriber");
    }

    // ========================================================================
    // Key resolution
    // ========================================================================

    /// Resolve positional key values against the primary key.
    pub fn resolve_key(&self, keys: &[Value]) -> Result<ResolvedKey> {
        if keys.len() > MAX_KEYS {
            return Err(Error::too_many_keys(keys.len()));
        }
        let primary_key = self.access.primary_key(&self.name)?;
        keys::resolve_key(&self.name, &primary_key, keys, self.keys.as_ref())
    }

    fn dispatch(&self, resolved: ResolvedKey, options: &QueryOptions) -> Result<GetResult<E>> {
        if resolved.singleton {
            self.get_single(resolved.criteria, options.scope.as_deref())
                .map(GetResult::Single)
        } else {
            self.select(Some(resolved.criteria), options)
                .map(GetResult::Many)
        }
    }

    // ========================================================================
    // Execute
    // ========================================================================

    /// Run a stored procedure and deserialize its rows.
    #[tracing::instrument(level = "debug", skip(self, inputs), fields(service = %self.name))]
    pub fn execute<T: DeserializeOwned>(
        &self,
        procedure: &str,
        inputs: DataDictionary,
    ) -> Result<ExecuteOutput<T>> {
        let mut args = self.execute_args(procedure, inputs, ExecuteResult::Rows(Vec::new()))?;

        if args.cancel {
            self.cancelled(DataOperation::Execute);
        } else {
            let output = self.observe(
                DataOperation::Execute,
                self.access
                    .execute::<serde_json::Value>(&args.name, &args.inputs),
            )?;
            args.result = ExecuteResult::Rows(output.rows);
            args.outputs = output.outputs;
            self.events.executed.raise(&mut args)?;
        }

        let rows = match args.result {
            ExecuteResult::Rows(rows) => rows
                .into_iter()
                .map(serde_json::from_value)
                .collect::<std::result::Result<Vec<T>, _>>()?,
            ExecuteResult::Scalar(value) if value.is_null() => Vec::new(),
            ExecuteResult::Scalar(value) => vec![serde_json::from_value(value.to_json())?],
        };

        Ok(ExecuteOutput {
            rows,
            outputs: args.outputs,
        })
    }

    /// Run a stored procedure that yields one value.
    #[tracing::instrument(level = "debug", skip(self, inputs), fields(service = %self.name))]
    pub fn execute_scalar(&self, procedure: &str, inputs: DataDictionary) -> Result<ScalarOutput> {
        let mut args = self.execute_args(procedure, inputs, ExecuteResult::Scalar(Value::Null))?;

        if args.cancel {
            self.cancelled(DataOperation::ExecuteScalar);
        } else {
            let output = self.observe(
                DataOperation::ExecuteScalar,
                self.access.execute_scalar(&args.name, &args.inputs),
            )?;
            args.result = ExecuteResult::Scalar(output.value);
            args.outputs = output.outputs;
            self.events.executed.raise(&mut args)?;
        }

        let value = match args.result {
            ExecuteResult::Scalar(value) => value,
            ExecuteResult::Rows(rows) => rows.into_iter().next().map(Value::from).unwrap_or_default(),
        };

        Ok(ScalarOutput {
            value,
            outputs: args.outputs,
        })
    }

    fn execute_args(
        &self,
        procedure: &str,
        inputs: DataDictionary,
        result: ExecuteResult,
    ) -> Result<ExecuteArgs> {
        if procedure.trim().is_empty() {
            return Err(Error::missing("procedure"));
        }
        let mut args = ExecuteArgs {
            name: procedure.trim().to_string(),
            inputs,
            outputs: DataDictionary::new(),
            cancel: false,
            result,
        };
        self.events.executing.raise(&mut args)?;
        Ok(args)
    }

    // ========================================================================
    // Exists / Count
    // ========================================================================

    /// Whether any row matches.
    #[tracing::instrument(level = "debug", skip(self, condition), fields(service = %self.name))]
    pub fn exists(&self, condition: Option<Criteria>) -> Result<bool> {
        let mut args = ExistArgs {
            name: self.name.clone(),
            condition,
            cancel: false,
            result: false,
        };
        self.events.existing.raise(&mut args)?;

        if args.cancel {
            self.cancelled(DataOperation::Exists);
            return Ok(args.result);
        }

        args.result = self.observe(
            DataOperation::Exists,
            self.access.exists(&self.name, args.condition.as_ref()),
        )?;
        self.events.existed.raise(&mut args)?;
        Ok(args.result)
    }

    /// Whether the row identified by positional key values exists.
    pub fn exists_key(&self, keys: &[Value]) -> Result<bool> {
        let resolved = self.resolve_key(keys)?;
        self.exists(Some(resolved.criteria))
    }

    /// Number of matching rows.
    #[tracing::instrument(level = "debug", skip(self, condition), fields(service = %self.name))]
    pub fn count(&self, condition: Option<Criteria>, includes: Option<&str>) -> Result<u64> {
        let mut args = CountArgs {
            name: self.name.clone(),
            condition,
            includes: includes.map(str::to_string),
            cancel: false,
            result: 0,
        };
        self.events.counting.raise(&mut args)?;

        if args.cancel {
            self.cancelled(DataOperation::Count);
            return Ok(args.result);
        }

        args.result = self.observe(
            DataOperation::Count,
            self.access
                .count(&self.name, args.condition.as_ref(), args.includes.as_deref()),
        )?;
        self.events.counted.raise(&mut args)?;
        Ok(args.result)
    }

    // ========================================================================
    // Increment / Decrement
    // ========================================================================

    /// Add `interval` to `member` on the matching row.
    #[tracing::instrument(level = "debug", skip(self, condition), fields(service = %self.name))]
    pub fn increment(
        &self,
        member: &str,
        condition: Option<Criteria>,
        interval: i64,
    ) -> Result<i64> {
        let mut args = self.increment_args(member, condition, interval)?;
        self.events.incrementing.raise(&mut args)?;

        if args.cancel {
            self.cancelled(DataOperation::Increment);
            return Ok(args.result);
        }

        args.result = self.observe(
            DataOperation::Increment,
            self.access.increment(
                &self.name,
                &args.member,
                args.condition.as_ref(),
                args.interval,
            ),
        )?;
        self.events.incremented.raise(&mut args)?;
        Ok(args.result)
    }

    /// Subtract `interval` from `member` on the matching row.
    #[tracing::instrument(level = "debug", skip(self, condition), fields(service = %self.name))]
    pub fn decrement(
        &self,
        member: &str,
        condition: Option<Criteria>,
        interval: i64,
    ) -> Result<i64> {
        let mut args = self.increment_args(member, condition, interval)?;
        self.events.decrementing.raise(&mut args)?;

        if args.cancel {
            self.cancelled(DataOperation::Decrement);
            return Ok(args.result);
        }

        args.result = self.observe(
            DataOperation::Decrement,
            self.access.decrement(
                &self.name,
                &args.member,
                args.condition.as_ref(),
                args.interval,
            ),
        )?;
        self.events.decremented.raise(&mut args)?;
        Ok(args.result)
    }

    fn increment_args(
        &self,
        member: &str,
        condition: Option<Criteria>,
        interval: i64,
    ) -> Result<IncrementArgs> {
        if member.trim().is_empty() {
            return Err(Error::missing("member"));
        }
        Ok(IncrementArgs {
            name: self.name.clone(),
            member: member.trim().to_string(),
            condition,
            interval,
            cancel: false,
            result: 0,
        })
    }

    // ========================================================================
    // Get / Search / Select
    // ========================================================================

    /// Look up by positional key values.
    ///
    /// Values matching the primary key return [`GetResult::Single`]; values
    /// resolved by the key strategy return [`GetResult::Many`].
    #[tracing::instrument(level = "debug", skip(self, keys, options), fields(service = %self.name))]
    pub fn get(&self, keys: &[Value], options: &QueryOptions) -> Result<GetResult<E>> {
        let resolved = self.resolve_key(keys)?;
        self.dispatch(resolved, options)
    }

    /// Look up by a `"tag:value"` keyword through the key strategy.
    #[tracing::instrument(level = "debug", skip(self, options), fields(service = %self.name))]
    pub fn search(&self, keyword: &str, options: &QueryOptions) -> Result<GetResult<E>> {
        let resolved = keys::resolve_search(&self.name, keyword, self.keys.as_ref())?;
        self.dispatch(resolved, options)
    }

    fn get_single(&self, condition: Criteria, scope: Option<&str>) -> Result<Option<E>> {
        let mut args = GetArgs {
            name: self.name.clone(),
            condition,
            scope: scope.map(str::to_string),
            cancel: false,
            result: None,
        };
        self.events.getting.raise(&mut args)?;

        if args.cancel {
            self.cancelled(DataOperation::Get);
            return Ok(args.result);
        }

        let rows: Vec<E> = self.observe(
            DataOperation::Get,
            self.access.select(
                &self.name,
                Some(&args.condition),
                None,
                args.scope.as_deref(),
                None,
                &[],
            ),
        )?;
        args.result = rows.into_iter().next();
        self.events.got.raise(&mut args)?;
        Ok(args.result)
    }

    /// Query rows.
    pub fn select(&self, condition: Option<Criteria>, options: &QueryOptions) -> Result<Vec<E>> {
        self.select_page(condition, options).map(|page| page.items)
    }

    /// Query rows and report the paging the driver filled in.
    #[tracing::instrument(level = "debug", skip(self, condition, options), fields(service = %self.name))]
    pub fn select_page(
        &self,
        condition: Option<Criteria>,
        options: &QueryOptions,
    ) -> Result<Page<E>> {
        let mut args = SelectArgs {
            name: self.name.clone(),
            condition,
            grouping: options.grouping.clone(),
            scope: options.scope.clone(),
            paging: options.paging,
            sortings: options.sortings.clone(),
            cancel: false,
            result: Vec::new(),
        };
        self.events.selecting.raise(&mut args)?;

        if args.cancel {
            self.cancelled(DataOperation::Select);
            return Ok(Page {
                items: args.result,
                paging: args.paging,
            });
        }

        args.result = self.observe(
            DataOperation::Select,
            self.access.select(
                &self.name,
                args.condition.as_ref(),
                args.grouping.as_ref(),
                args.scope.as_deref(),
                args.paging.as_mut(),
                &args.sortings,
            ),
        )?;
        self.events.selected.raise(&mut args)?;
        Ok(Page {
            items: args.result,
            paging: args.paging,
        })
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Delete matching rows.
    ///
    /// A delete always needs a condition: `None` that no subscriber replaced
    /// is rejected without reaching the driver.
    #[tracing::instrument(level = "debug", skip(self, condition), fields(service = %self.name))]
    pub fn delete(&self, condition: Option<Criteria>, cascades: Option<&str>) -> Result<u64> {
        let mut args = DeleteArgs {
            name: self.name.clone(),
            condition,
            cascades: cascades.map(str::to_string),
            cancel: false,
            count: 0,
        };
        self.events.deleting.raise(&mut args)?;

        if args.cancel {
            self.cancelled(DataOperation::Delete);
            return Ok(args.count);
        }

        let Some(condition) = args.condition.as_ref() else {
            return Err(Error::invalid_argument(
                "condition",
                format!("a delete on the '{}' service requires a condition", self.name),
            ));
        };

        args.count = self.observe(
            DataOperation::Delete,
            self.access
                .delete(&self.name, condition, args.cascades.as_deref()),
        )?;
        self.events.deleted.raise(&mut args)?;
        Ok(args.count)
    }

    /// Delete the row(s) identified by positional key values.
    pub fn delete_key(&self, keys: &[Value], cascades: Option<&str>) -> Result<u64> {
        let resolved = self.resolve_key(keys)?;
        self.delete(Some(resolved.criteria), cascades)
    }

    // ========================================================================
    // Insert
    // ========================================================================

    /// Insert one row built from `data`.
    ///
    /// `data` may be the entity or any serializable object carrying a subset
    /// of its fields. Sequence-generated fields are filled before the
    /// `inserting` event.
    #[tracing::instrument(level = "debug", skip(self, data), fields(service = %self.name))]
    pub fn insert<T: Serialize + ?Sized>(&self, data: &T, scope: Option<&str>) -> Result<u64> {
        let mut row = DataDictionary::from_entity(data)?;
        self.sequences.increments(&mut row)?;

        let mut args = InsertArgs {
            name: self.name.clone(),
            data: row,
            scope: scope.map(str::to_string),
            cancel: false,
            count: 0,
        };
        self.events.inserting.raise(&mut args)?;

        if args.cancel {
            self.cancelled(DataOperation::Insert);
            return Ok(args.count);
        }

        args.count = self.observe(
            DataOperation::Insert,
            self.access
                .insert(&self.name, &args.data, args.scope.as_deref()),
        )?;
        self.events.inserted.raise(&mut args)?;
        Ok(args.count)
    }

    /// Insert every item inside one transaction.
    ///
    /// Either every row is written or, on the first failure, none is.
    #[tracing::instrument(level = "debug", skip(self, items), fields(service = %self.name, count = items.len()))]
    pub fn insert_many<T: Serialize>(&self, items: &[T], scope: Option<&str>) -> Result<u64> {
        let mut rows = items
            .iter()
            .map(DataDictionary::from_entity)
            .collect::<Result<Vec<_>>>()?;
        for row in &mut rows {
            self.sequences.increments(row)?;
        }

        let mut args = InsertManyArgs {
            name: self.name.clone(),
            data: rows,
            scope: scope.map(str::to_string),
            cancel: false,
            count: 0,
        };
        self.events.many_inserting.raise(&mut args)?;

        if args.cancel {
            self.cancelled(DataOperation::InsertMany);
            return Ok(args.count);
        }

        let transaction = self.observe(
            DataOperation::InsertMany,
            TransactionScope::begin(&self.access, &self.name),
        )?;
        let mut count = 0;
        for row in &args.data {
            count += self.observe(
                DataOperation::InsertMany,
                self.access.insert(&self.name, row, args.scope.as_deref()),
            )?;
        }
        self.observe(DataOperation::InsertMany, transaction.commit())?;

        args.count = count;
        self.events.many_inserted.raise(&mut args)?;
        Ok(args.count)
    }

    // ========================================================================
    // Update
    // ========================================================================

    /// Update rows from `data`.
    ///
    /// Without a condition the driver matches the row by the primary key
    /// values carried in `data`.
    #[tracing::instrument(level = "debug", skip(self, data, condition), fields(service = %self.name))]
    pub fn update<T: Serialize + ?Sized>(
        &self,
        data: &T,
        condition: Option<Criteria>,
        scope: Option<&str>,
    ) -> Result<u64> {
        let mut args = UpdateArgs {
            name: self.name.clone(),
            data: DataDictionary::from_entity(data)?,
            condition,
            scope: scope.map(str::to_string),
            cancel: false,
            count: 0,
        };
        self.events.updating.raise(&mut args)?;

        if args.cancel {
            self.cancelled(DataOperation::Update);
            return Ok(args.count);
        }

        args.count = self.observe(
            DataOperation::Update,
            self.access.update(
                &self.name,
                &args.data,
                args.condition.as_ref(),
                args.scope.as_deref(),
            ),
        )?;
        self.events.updated.raise(&mut args)?;
        Ok(args.count)
    }

    /// Update the row(s) identified by positional key values.
    pub fn update_key<T: Serialize + ?Sized>(
        &self,
        data: &T,
        keys: &[Value],
        scope: Option<&str>,
    ) -> Result<u64> {
        let resolved = self.resolve_key(keys)?;
        self.update(data, Some(resolved.criteria), scope)
    }

    /// Update from every item inside one transaction.
    #[tracing::instrument(level = "debug", skip(self, items, condition), fields(service = %self.name, count = items.len()))]
    pub fn update_many<T: Serialize>(
        &self,
        items: &[T],
        condition: Option<Criteria>,
        scope: Option<&str>,
    ) -> Result<u64> {
        let rows = items
            .iter()
            .map(DataDictionary::from_entity)
            .collect::<Result<Vec<_>>>()?;

        let mut args = UpdateManyArgs {
            name: self.name.clone(),
            data: rows,
            condition,
            scope: scope.map(str::to_string),
            cancel: false,
            count: 0,
        };
        self.events.many_updating.raise(&mut args)?;

        if args.cancel {
            self.cancelled(DataOperation::UpdateMany);
            return Ok(args.count);
        }

        let transaction = self.observe(
            DataOperation::UpdateMany,
            TransactionScope::begin(&self.access, &self.name),
        )?;
        let mut count = 0;
        for row in &args.data {
            count += self.observe(
                DataOperation::UpdateMany,
                self.access.update(
                    &self.name,
                    row,
                    args.condition.as_ref(),
                    args.scope.as_deref(),
                ),
            )?;
        }
        self.observe(DataOperation::UpdateMany, transaction.commit())?;

        args.count = count;
        self.events.many_updated.raise(&mut args)?;
        Ok(args.count)
    }

    /// [`update_many`](Self::update_many) restricted by positional key values.
    pub fn update_many_key<T: Serialize>(
        &self,
        items: &[T],
        keys: &[Value],
        scope: Option<&str>,
    ) -> Result<u64> {
        let resolved = self.resolve_key(keys)?;
        self.update_many(items, Some(resolved.criteria), scope)
    }
}
