//! In-memory [`DataAccess`] driver.
//!
//! Tables are vectors of [`DataDictionary`] rows behind one `RwLock`.
//! Transactions are ambient to the thread that began them: every write that
//! thread issues while the transaction is its innermost open one is journaled,
//! and rollback replays only that journal backwards. Writes from other callers
//! are never undone by it.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, ThreadId};

use serde::de::DeserializeOwned;

use datakit_core::{
    Condition, Criteria, DataAccess, DataDictionary, Error, ExecuteOutput, Grouping, Paging,
    Result, ScalarOutput, Sorting, StorageErrorKind, Transaction, Value,
};

use crate::filter;

/// A stored procedure: input parameters in, rows and output parameters out.
pub type Procedure =
    Box<dyn Fn(&DataDictionary) -> Result<ExecuteOutput<DataDictionary>> + Send + Sync>;

#[derive(Debug, Clone, Default)]
struct Table {
    primary_key: Vec<String>,
    rows: Vec<DataDictionary>,
}

impl Table {
    fn key_of(&self, row: &DataDictionary) -> Option<Criteria> {
        if self.primary_key.is_empty() {
            return None;
        }
        let mut conditions = Vec::with_capacity(self.primary_key.len());
        for field in &self.primary_key {
            let value = row.get(field).filter(|v| !v.is_null())?;
            conditions.push(Criteria::from(Condition::equal(field.clone(), value.clone())));
        }
        let mut conditions = conditions.into_iter();
        let first = conditions.next()?;
        Some(conditions.fold(first, |all, c| all.and(c)))
    }
}

/// Inverse of one journaled write.
#[derive(Debug)]
enum Undo {
    Inserted {
        table: String,
        row: DataDictionary,
    },
    Updated {
        table: String,
        before: DataDictionary,
        after: DataDictionary,
    },
    Deleted {
        table: String,
        index: usize,
        row: DataDictionary,
    },
}

#[derive(Debug)]
struct Journal {
    id: u64,
    thread: ThreadId,
    undo: Vec<Undo>,
}

#[derive(Debug, Default)]
struct Store {
    tables: BTreeMap<String, Table>,
    journals: Vec<Journal>,
}

impl Store {
    fn table(&self, name: &str) -> Result<&Table> {
        self.tables.get(name).ok_or_else(|| not_found(name))
    }

    /// The table plus the journal of the calling thread's innermost open
    /// transaction, if any.
    fn table_mut(&mut self, name: &str) -> Result<(&mut Table, Option<&mut Vec<Undo>>)> {
        let current = thread::current().id();
        let journal = self
            .journals
            .iter_mut()
            .rev()
            .find(|j| j.thread == current)
            .map(|j| &mut j.undo);
        let table = self.tables.get_mut(name).ok_or_else(|| not_found(name))?;
        Ok((table, journal))
    }

    fn take_journal(&mut self, id: u64) -> Option<Journal> {
        let index = self.journals.iter().position(|j| j.id == id)?;
        Some(self.journals.remove(index))
    }

    /// Rows changed since by another caller are left as they are.
    fn revert(&mut self, undo: Undo) {
        match undo {
            Undo::Inserted { table, row } => {
                if let Some(table) = self.tables.get_mut(&table) {
                    if let Some(index) = table.rows.iter().rposition(|r| *r == row) {
                        table.rows.remove(index);
                    }
                }
            }
            Undo::Updated {
                table,
                before,
                after,
            } => {
                if let Some(table) = self.tables.get_mut(&table) {
                    if let Some(row) = table.rows.iter_mut().rev().find(|r| **r == after) {
                        *row = before;
                    }
                }
            }
            Undo::Deleted { table, index, row } => {
                if let Some(table) = self.tables.get_mut(&table) {
                    let index = index.min(table.rows.len());
                    table.rows.insert(index, row);
                }
            }
        }
    }
}

// ============================================================================
// Driver
// ============================================================================

/// In-memory storage driver.
///
/// # Example
///
/// ```
/// use datakit_core::{DataAccess, DataDictionary, Value};
/// use datakit_memory::MemoryDataAccess;
///
/// let access = MemoryDataAccess::new().with_table("Users", ["UserId"]);
/// let row: DataDictionary = [("UserId", Value::from(1)), ("Name", Value::from("admin"))]
///     .into_iter()
///     .collect();
/// assert_eq!(access.insert("Users", &row, None).unwrap(), 1);
/// assert!(access.exists("Users", None).unwrap());
/// ```
#[derive(Default)]
pub struct MemoryDataAccess {
    store: RwLock<Store>,
    procedures: RwLock<HashMap<String, Procedure>>,
    next_transaction: AtomicU64,
}

impl fmt::Debug for MemoryDataAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables: Vec<String> = self
            .store
            .read()
            .map(|s| s.tables.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("MemoryDataAccess")
            .field("tables", &tables)
            .finish_non_exhaustive()
    }
}

fn poisoned<T>(_: PoisonError<T>) -> Error {
    Error::storage(StorageErrorKind::Other, "memory store lock poisoned")
}

fn not_found(name: &str) -> Error {
    Error::storage(
        StorageErrorKind::NotFound,
        format!("table '{}' is not defined", name),
    )
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

impl MemoryDataAccess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a table at construction.
    pub fn with_table<I, S>(mut self, name: impl Into<String>, primary_key: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let table = Table {
            primary_key: primary_key.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        };
        self.store
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .tables
            .insert(name.into(), table);
        self
    }

    /// Define (or redefine, dropping its rows) a table.
    pub fn define<I, S>(&self, name: impl Into<String>, primary_key: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let primary_key: Vec<String> = primary_key.into_iter().map(Into::into).collect();
        tracing::debug!(table = %name, primary_key = ?primary_key, "Defined memory table");
        self.write()?.tables.insert(
            name,
            Table {
                primary_key,
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    /// Register a stored procedure.
    pub fn procedure<F>(&self, name: impl Into<String>, procedure: F) -> Result<()>
    where
        F: Fn(&DataDictionary) -> Result<ExecuteOutput<DataDictionary>> + Send + Sync + 'static,
    {
        self.procedures
            .write()
            .map_err(poisoned)?
            .insert(name.into(), Box::new(procedure));
        Ok(())
    }

    /// Snapshot of every row in `name`, in insertion order.
    pub fn rows(&self, name: &str) -> Result<Vec<DataDictionary>> {
        Ok(self.read()?.table(name)?.rows.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Store>> {
        self.store.read().map_err(poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Store>> {
        self.store.write().map_err(poisoned)
    }

    fn matching(&self, name: &str, condition: Option<&Criteria>) -> Result<Vec<DataDictionary>> {
        let store = self.read()?;
        Ok(store
            .table(name)?
            .rows
            .iter()
            .filter(|row| filter::matches_optional(row, condition))
            .cloned()
            .collect())
    }

    fn procedure_output(
        &self,
        name: &str,
        inputs: &DataDictionary,
    ) -> Result<ExecuteOutput<DataDictionary>> {
        let procedures = self.procedures.read().map_err(poisoned)?;
        let procedure = procedures.get(name).ok_or_else(|| {
            Error::storage(
                StorageErrorKind::NotFound,
                format!("procedure '{}' is not registered", name),
            )
        })?;
        procedure(inputs)
    }
}

impl DataAccess for MemoryDataAccess {
    type Transaction<'a>
        = MemoryTransaction<'a>
    where
        Self: 'a;

    fn primary_key(&self, name: &str) -> Result<Vec<String>> {
        Ok(self.read()?.table(name)?.primary_key.clone())
    }

    fn select<T: DeserializeOwned>(
        &self,
        name: &str,
        condition: Option<&Criteria>,
        grouping: Option<&Grouping>,
        _scope: Option<&str>,
        paging: Option<&mut Paging>,
        sortings: &[Sorting],
    ) -> Result<Vec<T>> {
        let mut rows = self.matching(name, condition)?;
        if let Some(grouping) = grouping {
            rows = filter::group(rows, grouping);
        }
        filter::sort(&mut rows, sortings);

        if let Some(paging) = paging {
            paging.total_count = Some(rows.len() as u64);
            if paging.is_enabled() {
                rows = rows
                    .into_iter()
                    .skip(to_usize(paging.offset()))
                    .take(to_usize(paging.size))
                    .collect();
            }
        }

        tracing::trace!(table = name, rows = rows.len(), "Selected memory rows");
        rows.into_iter().map(DataDictionary::into_entity).collect()
    }

    fn exists(&self, name: &str, condition: Option<&Criteria>) -> Result<bool> {
        let store = self.read()?;
        Ok(store
            .table(name)?
            .rows
            .iter()
            .any(|row| filter::matches_optional(row, condition)))
    }

    /// Counts matching rows; with `includes`, only rows where that member is
    /// not null.
    fn count(
        &self,
        name: &str,
        condition: Option<&Criteria>,
        includes: Option<&str>,
    ) -> Result<u64> {
        let member = includes.map(str::trim).filter(|m| !m.is_empty() && *m != "*");
        let rows = self.matching(name, condition)?;
        Ok(rows
            .iter()
            .filter(|row| member.is_none_or(|m| row.get(m).is_some_and(|v| !v.is_null())))
            .count() as u64)
    }

    fn increment(
        &self,
        name: &str,
        member: &str,
        condition: Option<&Criteria>,
        interval: i64,
    ) -> Result<i64> {
        let mut store = self.write()?;
        let (table, mut journal) = store.table_mut(name)?;

        let mut result = None;
        for row in table
            .rows
            .iter_mut()
            .filter(|row| filter::matches_optional(row, condition))
        {
            let current = match row.get(member) {
                None => 0,
                Some(value) if value.is_null() => 0,
                Some(value) => value.as_i64().ok_or_else(|| {
                    Error::storage(
                        StorageErrorKind::Other,
                        format!("member '{}' of '{}' is not an integer", member, name),
                    )
                })?,
            };
            let next = current.saturating_add(interval);
            let before = row.clone();
            row.set(member, next);
            if let Some(journal) = journal.as_deref_mut() {
                journal.push(Undo::Updated {
                    table: name.to_string(),
                    before,
                    after: row.clone(),
                });
            }
            result.get_or_insert(next);
        }

        Ok(result.unwrap_or_default())
    }

    fn insert(&self, name: &str, data: &DataDictionary, _scope: Option<&str>) -> Result<u64> {
        let mut store = self.write()?;
        let (table, journal) = store.table_mut(name)?;

        if let Some(key) = table.key_of(data) {
            if table.rows.iter().any(|row| filter::matches(row, &key)) {
                return Err(Error::storage(
                    StorageErrorKind::Conflict,
                    format!("duplicate primary key in '{}': {}", name, key),
                ));
            }
        }

        table.rows.push(data.clone());
        if let Some(journal) = journal {
            journal.push(Undo::Inserted {
                table: name.to_string(),
                row: data.clone(),
            });
        }
        Ok(1)
    }

    fn update(
        &self,
        name: &str,
        data: &DataDictionary,
        condition: Option<&Criteria>,
        _scope: Option<&str>,
    ) -> Result<u64> {
        let mut store = self.write()?;
        let (table, mut journal) = store.table_mut(name)?;

        let key;
        let condition = match condition {
            Some(condition) => condition,
            None => {
                key = table.key_of(data).ok_or_else(|| {
                    Error::invalid_argument(
                        "data",
                        format!("an update of '{}' without a condition needs the primary key", name),
                    )
                })?;
                &key
            }
        };

        let mut count = 0;
        for row in table.rows.iter_mut().filter(|row| filter::matches(row, condition)) {
            let before = row.clone();
            for (field, value) in data.iter() {
                row.set(field, value.clone());
            }
            if let Some(journal) = journal.as_deref_mut() {
                journal.push(Undo::Updated {
                    table: name.to_string(),
                    before,
                    after: row.clone(),
                });
            }
            count += 1;
        }
        Ok(count)
    }

    fn delete(&self, name: &str, condition: &Criteria, _cascades: Option<&str>) -> Result<u64> {
        let mut store = self.write()?;
        let (table, journal) = store.table_mut(name)?;

        let mut index = 0;
        let mut removed = Vec::new();
        table.rows.retain(|row| {
            let keep = !filter::matches(row, condition);
            if !keep {
                removed.push((index, row.clone()));
            }
            index += 1;
            keep
        });

        let count = removed.len() as u64;
        if let Some(journal) = journal {
            // Replayed backwards, so the lowest index must be restored first.
            journal.extend(removed.into_iter().rev().map(|(index, row)| Undo::Deleted {
                table: name.to_string(),
                index,
                row,
            }));
        }
        Ok(count)
    }

    fn execute<T: DeserializeOwned>(
        &self,
        name: &str,
        inputs: &DataDictionary,
    ) -> Result<ExecuteOutput<T>> {
        let output = self.procedure_output(name, inputs)?;
        Ok(ExecuteOutput {
            rows: output
                .rows
                .into_iter()
                .map(DataDictionary::into_entity)
                .collect::<Result<_>>()?,
            outputs: output.outputs,
        })
    }

    /// The first field, in name order, of the procedure's first row.
    fn execute_scalar(&self, name: &str, inputs: &DataDictionary) -> Result<ScalarOutput> {
        let output = self.procedure_output(name, inputs)?;
        let value = output
            .rows
            .first()
            .and_then(|row| row.iter().next().map(|(_, v)| v.clone()))
            .unwrap_or(Value::Null);
        Ok(ScalarOutput {
            value,
            outputs: output.outputs,
        })
    }

    fn begin(&self) -> Result<Self::Transaction<'_>> {
        let id = self.next_transaction.fetch_add(1, Ordering::Relaxed);
        self.write()?.journals.push(Journal {
            id,
            thread: thread::current().id(),
            undo: Vec::new(),
        });
        tracing::debug!(transaction = id, "Began memory transaction");
        Ok(MemoryTransaction {
            access: self,
            id,
            open: true,
        })
    }
}

// ============================================================================
// Transactions
// ============================================================================

/// Journaled transaction over a [`MemoryDataAccess`].
///
/// Dropping it without [`commit`](Transaction::commit) reverts its writes.
pub struct MemoryTransaction<'a> {
    access: &'a MemoryDataAccess,
    id: u64,
    open: bool,
}

impl fmt::Debug for MemoryTransaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransaction")
            .field("id", &self.id)
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}

impl MemoryTransaction<'_> {
    fn finish(&mut self, revert: bool) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;

        let mut store = self.access.write()?;
        let Some(journal) = store.take_journal(self.id) else {
            return Ok(());
        };
        if revert {
            let writes = journal.undo.len();
            for undo in journal.undo.into_iter().rev() {
                store.revert(undo);
            }
            tracing::debug!(transaction = self.id, writes, "Rolled back memory transaction");
        } else {
            tracing::debug!(transaction = self.id, "Committed memory transaction");
        }
        Ok(())
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn commit(mut self) -> Result<()> {
        self.finish(false)
    }

    fn rollback(mut self) -> Result<()> {
        self.finish(true)
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.finish(true) {
            tracing::warn!(error = %e, "Memory transaction rollback failed");
        }
    }
}
