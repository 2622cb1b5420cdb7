//! Storage driver contract.
//!
//! [`DataAccess`] is the boundary between data services and a physical
//! store. Every operation is addressed by the entity's logical name;
//! predicates arrive as [`Criteria`] trees and write payloads as
//! [`DataDictionary`] rows.
//!
//! Transactions are ambient: between [`DataAccess::begin`] and the handle's
//! `commit`/`rollback`, writes issued through the same driver belong to the
//! open transaction.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::condition::Criteria;
use crate::dictionary::DataDictionary;
use crate::error::Result;
use crate::query::{Grouping, Paging, Sorting};
use crate::value::Value;

/// Rows and output parameters returned by a stored procedure.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteOutput<T> {
    pub rows: Vec<T>,
    pub outputs: DataDictionary,
}

impl<T> Default for ExecuteOutput<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            outputs: DataDictionary::new(),
        }
    }
}

/// Single value and output parameters returned by a stored procedure.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScalarOutput {
    pub value: Value,
    pub outputs: DataDictionary,
}

/// An open storage transaction.
///
/// Dropping the handle without calling [`commit`](Transaction::commit) must
/// leave the store as it was before the transaction began.
pub trait Transaction {
    fn commit(self) -> Result<()>;

    fn rollback(self) -> Result<()>;
}

/// A storage driver.
pub trait DataAccess: Send + Sync {
    /// Transaction handle type.
    type Transaction<'a>: Transaction
    where
        Self: 'a;

    /// Ordered primary key field names declared for `name`. Empty when none.
    fn primary_key(&self, name: &str) -> Result<Vec<String>>;

    /// Query rows. When `paging` is given the driver sets its `total_count`.
    fn select<T: DeserializeOwned>(
        &self,
        name: &str,
        condition: Option<&Criteria>,
        grouping: Option<&Grouping>,
        scope: Option<&str>,
        paging: Option<&mut Paging>,
        sortings: &[Sorting],
    ) -> Result<Vec<T>>;

    fn exists(&self, name: &str, condition: Option<&Criteria>) -> Result<bool>;

    fn count(&self, name: &str, condition: Option<&Criteria>, includes: Option<&str>)
    -> Result<u64>;

    /// Add `interval` to `member` on the matching row and return the new value.
    fn increment(
        &self,
        name: &str,
        member: &str,
        condition: Option<&Criteria>,
        interval: i64,
    ) -> Result<i64>;

    /// Subtract `interval` from `member` on the matching row and return the new value.
    fn decrement(
        &self,
        name: &str,
        member: &str,
        condition: Option<&Criteria>,
        interval: i64,
    ) -> Result<i64> {
        self.increment(name, member, condition, -interval)
    }

    fn insert(&self, name: &str, data: &DataDictionary, scope: Option<&str>) -> Result<u64>;

    /// Update matching rows. Without a condition the row is matched by the
    /// primary key values carried in `data`.
    fn update(
        &self,
        name: &str,
        data: &DataDictionary,
        condition: Option<&Criteria>,
        scope: Option<&str>,
    ) -> Result<u64>;

    fn delete(&self, name: &str, condition: &Criteria, cascades: Option<&str>) -> Result<u64>;

    /// Run a stored procedure.
    fn execute<T: DeserializeOwned>(
        &self,
        name: &str,
        inputs: &DataDictionary,
    ) -> Result<ExecuteOutput<T>>;

    /// Run a stored procedure that yields a single value.
    fn execute_scalar(&self, name: &str, inputs: &DataDictionary) -> Result<ScalarOutput>;

    /// Open a transaction.
    fn begin(&self) -> Result<Self::Transaction<'_>>;
}

impl<A: DataAccess> DataAccess for Arc<A> {
    type Transaction<'a>
        = A::Transaction<'a>
    where
        Self: 'a;

    fn primary_key(&self, name: &str) -> Result<Vec<String>> {
        (**self).primary_key(name)
    }

    fn select<T: DeserializeOwned>(
        &self,
        name: &str,
        condition: Option<&Criteria>,
        grouping: Option<&Grouping>,
        scope: Option<&str>,
        paging: Option<&mut Paging>,
        sortings: &[Sorting],
    ) -> Result<Vec<T>> {
        (**self).select(name, condition, grouping, scope, paging, sortings)
    }

    fn exists(&self, name: &str, condition: Option<&Criteria>) -> Result<bool> {
        (**self).exists(name, condition)
    }

    fn count(
        &self,
        name: &str,
        condition: Option<&Criteria>,
        includes: Option<&str>,
    ) -> Result<u64> {
        (**self).count(name, condition, includes)
    }

    fn increment(
        &self,
        name: &str,
        member: &str,
        condition: Option<&Criteria>,
        interval: i64,
    ) -> Result<i64> {
        (**self).increment(name, member, condition, interval)
    }

    fn decrement(
        &self,
        name: &str,
        member: &str,
        condition: Option<&Criteria>,
        interval: i64,
    ) -> Result<i64> {
        (**self).decrement(name, member, condition, interval)
    }

    fn insert(&self, name: &str, data: &DataDictionary, scope: Option<&str>) -> Result<u64> {
        (**self).insert(name, data, scope)
    }

    fn update(
        &self,
        name: &str,
        data: &DataDictionary,
        condition: Option<&Criteria>,
        scope: Option<&str>,
    ) -> Result<u64> {
        (**self).update(name, data, condition, scope)
    }

    fn delete(&self, name: &str, condition: &Criteria, cascades: Option<&str>) -> Result<u64> {
        (**self).delete(name, condition, cascades)
    }

    fn execute<T: DeserializeOwned>(
        &self,
        name: &str,
        inputs: &DataDictionary,
    ) -> Result<ExecuteOutput<T>> {
        (**self).execute(name, inputs)
    }

    fn execute_scalar(&self, name: &str, inputs: &DataDictionary) -> Result<ScalarOutput> {
        (**self).execute_scalar(name, inputs)
    }

    fn begin(&self) -> Result<Self::Transaction<'_>> {
        (**self).begin()
    }
}
