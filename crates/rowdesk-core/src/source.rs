//! The backing store the editor reads from and writes to

use crate::{Change, QuerySpec, Result, TableData};
use async_trait::async_trait;

/// A remote table store.
///
/// Every call carries the connection URI; implementations decide how to pool
/// or cache the underlying connections. All operations may fail with a
/// connection or query error, which callers surface verbatim.
#[async_trait]
pub trait RemoteTableSource: Send + Sync {
    /// List schema names visible on the connection
    async fn list_schemas(&self, connection: &str) -> Result<Vec<String>>;

    /// List table names within a schema
    async fn list_tables(&self, connection: &str, schema: &str) -> Result<Vec<String>>;

    /// Primary-key column names of a table, empty when it has none
    async fn get_primary_keys(
        &self,
        connection: &str,
        schema: &str,
        table: &str,
    ) -> Result<Vec<String>>;

    /// Fetch one page of rows with its column metadata
    async fn get_table_data(&self, connection: &str, spec: &QuerySpec) -> Result<TableData>;

    /// Persist a batch of row changes.
    ///
    /// Each [`Change`] updates the row matching its primary key, setting only
    /// the columns in its change map. A failure means the caller treats the
    /// whole batch as not applied.
    async fn update_rows(
        &self,
        connection: &str,
        schema: &str,
        table: &str,
        changes: &[Change],
    ) -> Result<()>;

    /// Name of the source implementation, for logging
    fn source_name(&self) -> &str {
        "remote"
    }
}
