//! Scoped warehouse transaction.
//!
//! A [`Transaction`] is open from a successful `Begin` until `Commit`
//! succeeds or `Abort` is issued. Dropping it while still open (the
//! enclosing future was cancelled) spawns an `Abort` on the current
//! runtime so no transaction is left dangling.

use std::sync::Arc;

use wharf_types::{BatchLocation, Statement};

use crate::env::{StatementResult, Warehouse};

pub(crate) struct Transaction<W: Warehouse> {
    warehouse: Arc<W>,
    base: BatchLocation,
    open: bool,
}

impl<W: Warehouse> Transaction<W> {
    /// Issue `Begin`.
    pub(crate) async fn begin(warehouse: &Arc<W>, base: &BatchLocation) -> anyhow::Result<Self> {
        warehouse.execute(&Statement::Begin).await?;
        Ok(Self {
            warehouse: Arc::clone(warehouse),
            base: base.clone(),
            open: true,
        })
    }

    pub(crate) async fn execute(&self, statement: &Statement) -> anyhow::Result<StatementResult> {
        debug_assert!(self.open, "statement issued outside a transaction");
        self.warehouse.execute(statement).await
    }

    /// Issue `Commit`. On failure the transaction stays open and must be
    /// aborted.
    pub(crate) async fn commit(&mut self) -> anyhow::Result<()> {
        self.warehouse.execute(&Statement::Commit).await?;
        self.open = false;
        Ok(())
    }

    /// Issue `Abort`, consuming the transaction.
    ///
    /// A failing `Abort` is logged rather than returned: the caller is
    /// already on a skip or error path and the server rolls back the
    /// transaction when the session ends.
    pub(crate) async fn abort(mut self) {
        self.open = false;
        if let Err(e) = self.warehouse.execute(&Statement::Abort).await {
            tracing::warn!(base = %self.base, error = %e, "Failed to abort transaction");
        }
    }
}

impl<W: Warehouse> Drop for Transaction<W> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        tracing::warn!(base = %self.base, "Transaction dropped while open, aborting");
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::error!(base = %self.base, "No runtime to abort dropped transaction");
            return;
        };
        let warehouse = Arc::clone(&self.warehouse);
        let base = self.base.clone();
        handle.spawn(async move {
            if let Err(e) = warehouse.execute(&Statement::Abort).await {
                tracing::warn!(base = %base, error = %e, "Failed to abort dropped transaction");
            }
        });
    }
}
