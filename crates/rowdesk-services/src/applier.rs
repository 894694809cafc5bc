//! Commit pending edits to the backing store
//!
//! Committing is split in three steps so the caller can keep editing while
//! the update is in flight: [`ChangeApplier::prepare`] snapshots the ledger,
//! [`ChangeApplier::submit`] sends the snapshot without touching the ledger,
//! and [`ChangeApplier::reconcile`] folds a successful result back in.

use std::sync::Arc;

use rowdesk_core::{Change, RemoteTableSource};

use crate::error::{ServiceError, ServiceResult};
use crate::pending::PendingChangeStore;

/// Snapshot of the ledger taken for one commit
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyBatch {
    pub connection: String,
    pub schema: String,
    pub table: String,
    pub changes: Vec<Change>,
    /// Ledger revision at snapshot time
    pub revision: u64,
    /// Ledger epoch at snapshot time
    pub epoch: u64,
}

impl ApplyBatch {
    pub fn cell_count(&self) -> usize {
        self.changes.iter().map(Change::len).sum()
    }
}

/// Outcome of a successful commit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub submitted_rows: usize,
    pub submitted_cells: usize,
    /// Rows still pending afterwards, edited while the commit was in flight
    pub retained_rows: usize,
}

/// Sends pending changes through a [`RemoteTableSource`]
pub struct ChangeApplier {
    source: Arc<dyn RemoteTableSource>,
}

impl ChangeApplier {
    pub fn new(source: Arc<dyn RemoteTableSource>) -> Self {
        Self { source }
    }

    /// Snapshot the ledger, or `None` when there is nothing to commit
    pub fn prepare(
        store: &PendingChangeStore,
        connection: &str,
        schema: &str,
        table: &str,
    ) -> Option<ApplyBatch> {
        if store.is_empty() {
            return None;
        }
        Some(ApplyBatch {
            connection: connection.to_string(),
            schema: schema.to_string(),
            table: table.to_string(),
            changes: store.list().to_vec(),
            revision: store.revision(),
            epoch: store.epoch(),
        })
    }

    /// Send a batch. The whole batch counts as failed on any error.
    #[tracing::instrument(
        skip(self, batch),
        fields(
            source = self.source.source_name(),
            schema = %batch.schema,
            table = %batch.table,
            rows = batch.changes.len()
        )
    )]
    pub async fn submit(&self, batch: &ApplyBatch) -> ServiceResult<()> {
        tracing::info!(cells = batch.cell_count(), "submitting pending changes");
        self.source
            .update_rows(&batch.connection, &batch.schema, &batch.table, &batch.changes)
            .await
            .map_err(|e| {
                tracing::warn!(
                    error = %e,
                    connection_lost = e.is_connection(),
                    "update_rows failed, keeping pending changes"
                );
                ServiceError::from_update(e)
            })
    }

    /// Fold a committed batch into the ledger.
    ///
    /// An untouched ledger is simply cleared; one edited or cleared since the
    /// snapshot keeps whatever its current edits still require.
    pub fn reconcile(store: &mut PendingChangeStore, batch: &ApplyBatch) -> ApplyReport {
        if store.revision() == batch.revision {
            store.clear();
        } else {
            store.settle(&batch.changes, batch.epoch);
        }
        let report = ApplyReport {
            submitted_rows: batch.changes.len(),
            submitted_cells: batch.cell_count(),
            retained_rows: store.len(),
        };
        tracing::info!(
            submitted_rows = report.submitted_rows,
            retained_rows = report.retained_rows,
            "pending changes committed"
        );
        report
    }

    /// Commit everything in `store` in one go.
    ///
    /// On failure the store is left exactly as it was.
    pub async fn apply(
        &self,
        store: &mut PendingChangeStore,
        connection: &str,
        schema: &str,
        table: &str,
    ) -> ServiceResult<ApplyReport> {
        let Some(batch) = Self::prepare(store, connection, schema, table) else {
            tracing::debug!("nothing to apply");
            return Ok(ApplyReport::default());
        };
        self.submit(&batch).await?;
        Ok(Self::reconcile(store, &batch))
    }
}
