//! Commit-or-rollback guard for multi-row writes.

use datakit_core::{DataAccess, Result, Transaction};

/// Wraps an open transaction and rolls it back on drop unless committed.
///
/// ```ignore
/// let scope = TransactionScope::begin(&access, "Orders")?;
/// for row in &rows {
///     access.insert("Orders", row, None)?; // early return drops the scope
/// }
/// scope.commit()?;
/// ```
#[must_use = "a scope dropped without commit rolls back"]
pub struct TransactionScope<'s, T: Transaction> {
    transaction: Option<T>,
    service: &'s str,
}

impl<'s, T: Transaction> TransactionScope<'s, T> {
    pub fn new(transaction: T, service: &'s str) -> Self {
        Self {
            transaction: Some(transaction),
            service,
        }
    }

    /// Open a transaction on `access`.
    pub fn begin<'a, A>(access: &'a A, service: &'s str) -> Result<Self>
    where
        A: DataAccess<Transaction<'a> = T> + 'a,
    {
        let transaction = access.begin()?;
        tracing::debug!(service, "Began transaction scope");
        Ok(Self::new(transaction, service))
    }

    /// Commit the transaction.
    pub fn commit(mut self) -> Result<()> {
        match self.transaction.take() {
            Some(transaction) => {
                transaction.commit()?;
                tracing::info!(service = self.service, "Committed transaction scope");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Roll the transaction back now.
    pub fn rollback(mut self) -> Result<()> {
        match self.transaction.take() {
            Some(transaction) => transaction.rollback(),
            None => Ok(()),
        }
    }
}

impl<T: Transaction> Drop for TransactionScope<'_, T> {
    fn drop(&mut self) {
        if let Some(transaction) = self.transaction.take() {
            tracing::warn!(
                service = self.service,
                "Transaction scope dropped without commit, rolling back"
            );
            if let Err(e) = transaction.rollback() {
                tracing::warn!(service = self.service, error = %e, "Rollback failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counts {
        commits: AtomicUsize,
        rollbacks: AtomicUsize,
    }

    struct Probe(Arc<Counts>);

    impl Transaction for Probe {
        fn commit(self) -> Result<()> {
            self.0.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn rollback(self) -> Result<()> {
            self.0.rollbacks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_commit_does_not_roll_back() {
        let counts = Arc::new(Counts::default());
        TransactionScope::new(Probe(counts.clone()), "Orders")
            .commit()
            .unwrap();
        assert_eq!(counts.commits.load(Ordering::SeqCst), 1);
        assert_eq!(counts.rollbacks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_rolls_back() {
        let counts = Arc::new(Counts::default());
        {
            let _scope = TransactionScope::new(Probe(counts.clone()), "Orders");
        }
        assert_eq!(counts.commits.load(Ordering::SeqCst), 0);
        assert_eq!(counts.rollbacks.load(Ordering::SeqCst), 1);
    }
}
