//! Browsing and editing state for one connection
//!
//! [`TableSession`] owns the navigation (connection, schema, table), the page
//! and filter state, the last fetched rows and the pending edit ledger. All of
//! it is mutated from one place; fetches run outside the session and come back
//! through [`TableSession::accept`], which drops any response whose parameters
//! no longer match what the session currently shows.

use std::sync::Arc;

use rowdesk_core::{
    CellEditor, ColumnMeta, QuerySpec, RemoteTableSource, Row, RowdeskError, TableData, Value,
};
use rowdesk_settings::TableSettings;
use serde::Deserialize;
use uuid::Uuid;

use crate::applier::{ApplyBatch, ApplyReport, ChangeApplier};
use crate::error::{ServiceError, ServiceResult};
use crate::materialize::{DisplayRow, materialize};
use crate::pending::{EditOutcome, PendingChangeStore, ReviewEntry};
use crate::query_spec::QuerySpecBuilder;

/// Session settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Page size used for newly selected tables
    pub default_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { default_limit: 100 }
    }
}

impl From<&TableSettings> for SessionConfig {
    fn from(settings: &TableSettings) -> Self {
        Self {
            default_limit: settings.default_limit.max(1),
        }
    }
}

/// Full parameters of a fetch; a response is only used while they still match
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchKey {
    Schemas {
        connection: String,
    },
    Tables {
        connection: String,
        schema: String,
    },
    PrimaryKeys {
        connection: String,
        schema: String,
        table: String,
    },
    TableData {
        connection: String,
        spec: QuerySpec,
    },
}

impl FetchKey {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Schemas { .. } => "schemas",
            Self::Tables { .. } => "tables",
            Self::PrimaryKeys { .. } => "primary_keys",
            Self::TableData { .. } => "table_data",
        }
    }
}

/// A fetch the session wants performed
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTicket {
    pub id: Uuid,
    pub key: FetchKey,
}

impl FetchTicket {
    fn new(key: FetchKey) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
        }
    }

    /// Perform the fetch against `source`
    #[tracing::instrument(skip(self, source), fields(id = %self.id, kind = self.key.kind()))]
    pub async fn run(self, source: Arc<dyn RemoteTableSource>) -> FetchResponse {
        let payload = match &self.key {
            FetchKey::Schemas { connection } => {
                source.list_schemas(connection).await.map(FetchPayload::Schemas)
            }
            FetchKey::Tables { connection, schema } => source
                .list_tables(connection, schema)
                .await
                .map(FetchPayload::Tables),
            FetchKey::PrimaryKeys {
                connection,
                schema,
                table,
            } => source
                .get_primary_keys(connection, schema, table)
                .await
                .map(FetchPayload::PrimaryKeys),
            FetchKey::TableData { connection, spec } => source
                .get_table_data(connection, spec)
                .await
                .map(FetchPayload::TableData),
        };
        FetchResponse {
            ticket: self,
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchPayload {
    Schemas(Vec<String>),
    Tables(Vec<String>),
    PrimaryKeys(Vec<String>),
    TableData(TableData),
}

#[derive(Debug)]
pub struct FetchResponse {
    pub ticket: FetchTicket,
    pub payload: Result<FetchPayload, RowdeskError>,
}

/// What [`TableSession::accept`] did with a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// Issued for parameters the session has since moved away from
    Stale,
}

/// Last failure per area, cleared by the next success in that area
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionErrors {
    pub connection: Option<String>,
    pub data: Option<String>,
    pub apply: Option<String>,
}

/// Result of finishing a commit
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyFinished {
    pub report: ApplyReport,
    /// Re-fetch of the current page, `None` when the table changed meanwhile
    pub refetch: Option<FetchTicket>,
}

pub struct TableSession {
    source: Arc<dyn RemoteTableSource>,
    applier: ChangeApplier,
    config: SessionConfig,
    connection: Option<String>,
    /// Target of a connect whose schema list has not come back yet
    connecting: Option<String>,
    connected: bool,
    schemas: Vec<String>,
    tables: Vec<String>,
    schema: Option<String>,
    table: Option<String>,
    limit: usize,
    offset: usize,
    query: QuerySpecBuilder,
    primary_keys: Option<Vec<String>>,
    data: Option<TableData>,
    rows: Vec<Row>,
    store: PendingChangeStore,
    errors: SessionErrors,
    applying: bool,
}

impl TableSession {
    pub fn new(source: Arc<dyn RemoteTableSource>) -> Self {
        Self::with_config(source, SessionConfig::default())
    }

    pub fn with_config(source: Arc<dyn RemoteTableSource>, config: SessionConfig) -> Self {
        Self {
            applier: ChangeApplier::new(source.clone()),
            source,
            limit: config.default_limit.max(1),
            config,
            connection: None,
            connecting: None,
            connected: false,
            schemas: Vec::new(),
            tables: Vec::new(),
            schema: None,
            table: None,
            offset: 0,
            query: QuerySpecBuilder::new(),
            primary_keys: None,
            data: None,
            rows: Vec::new(),
            store: PendingChangeStore::new(),
            errors: SessionErrors::default(),
            applying: false,
        }
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Start connecting to `uri`.
    ///
    /// The current connection stays in place until the schema list response
    /// arrives; only a successful response switches to `uri`.
    pub fn connect(&mut self, uri: impl Into<String>) -> FetchTicket {
        let uri = uri.into();
        tracing::info!("connecting");
        self.connecting = Some(uri.clone());
        FetchTicket::new(FetchKey::Schemas { connection: uri })
    }

    /// Select a schema, dropping the table selection and any pending edits
    pub fn select_schema(&mut self, schema: impl Into<String>) -> ServiceResult<FetchTicket> {
        let connection = self.require_connection()?.to_string();
        let schema = schema.into();
        tracing::debug!(%schema, "selecting schema");
        self.leave_table();
        self.tables.clear();
        self.schema = Some(schema.clone());
        Ok(FetchTicket::new(FetchKey::Tables { connection, schema }))
    }

    /// Select a table in the current schema.
    ///
    /// Pending edits, filters and sorts are dropped and the page resets to the
    /// first one. Returns the primary-key and data fetches, which may run
    /// concurrently.
    pub fn select_table(
        &mut self,
        table: impl Into<String>,
    ) -> ServiceResult<(FetchTicket, FetchTicket)> {
        let connection = self.require_connection()?.to_string();
        let schema = self.schema.clone().ok_or(ServiceError::NoSchemaSelected)?;
        let table = table.into();
        tracing::debug!(%schema, %table, "selecting table");
        self.leave_table();
        self.table = Some(table.clone());

        let pk_ticket = FetchTicket::new(FetchKey::PrimaryKeys {
            connection,
            schema,
            table,
        });
        Ok((pk_ticket, self.data_ticket()?))
    }

    fn leave_table(&mut self) {
        self.table = None;
        self.offset = 0;
        self.query.reset();
        self.store.clear();
        self.primary_keys = None;
        self.data = None;
        self.rows.clear();
        self.errors.data = None;
        self.errors.apply = None;
    }

    /// Fetch for the current page with the active filters and sorts
    pub fn data_ticket(&self) -> ServiceResult<FetchTicket> {
        let connection = self.require_connection()?.to_string();
        let spec = self.current_spec()?;
        Ok(FetchTicket::new(FetchKey::TableData { connection, spec }))
    }

    /// The request the current page is (or would be) fetched with
    pub fn current_spec(&self) -> ServiceResult<QuerySpec> {
        let schema = self.schema.as_deref().ok_or(ServiceError::NoSchemaSelected)?;
        let table = self.table.as_deref().ok_or(ServiceError::NoTableSelected)?;
        Ok(self
            .query
            .to_query_spec(schema, table, self.limit, self.offset))
    }

    // ------------------------------------------------------------------
    // Fetch results
    // ------------------------------------------------------------------

    fn is_current(&self, key: &FetchKey) -> bool {
        if let FetchKey::Schemas { connection } = key {
            return self.connecting.as_deref() == Some(connection.as_str());
        }
        let Some(current) = self.connection.as_deref() else {
            return false;
        };
        match key {
            FetchKey::Schemas { .. } => false,
            FetchKey::Tables { connection, schema } => {
                connection == current && self.schema.as_deref() == Some(schema.as_str())
            }
            FetchKey::PrimaryKeys {
                connection,
                schema,
                table,
            } => {
                connection == current
                    && self.schema.as_deref() == Some(schema.as_str())
                    && self.table.as_deref() == Some(table.as_str())
            }
            FetchKey::TableData { connection, spec } => {
                connection == current && self.current_spec().is_ok_and(|s| &s == spec)
            }
        }
    }

    /// Apply a fetch response, or drop it if the session has moved on.
    ///
    /// A failed fetch is recorded in [`TableSession::errors`] and returned.
    /// Failed data fetches keep the rows already on screen.
    pub fn accept(&mut self, response: FetchResponse) -> ServiceResult<FetchOutcome> {
        let FetchResponse { ticket, payload } = response;
        if !self.is_current(&ticket.key) {
            tracing::warn!(id = %ticket.id, kind = ticket.key.kind(), "discarding stale fetch response");
            return Ok(FetchOutcome::Stale);
        }

        match (ticket.key, payload) {
            (FetchKey::Schemas { connection }, Ok(FetchPayload::Schemas(schemas))) => {
                tracing::info!(count = schemas.len(), "connected");
                self.connecting = None;
                self.connection = Some(connection);
                self.connected = true;
                self.errors.connection = None;
                self.schema = None;
                self.tables.clear();
                self.leave_table();
                self.schemas = schemas;
            }
            (FetchKey::Schemas { .. }, Err(e)) => {
                tracing::warn!(error = %e, "failed to list schemas");
                self.connecting = None;
                self.connected = false;
                self.errors.connection = Some(e.to_string());
                return Err(ServiceError::ConnectionFailed(e.to_string()));
            }
            (FetchKey::Tables { .. }, Ok(FetchPayload::Tables(tables))) => {
                self.errors.data = None;
                self.tables = tables;
            }
            (FetchKey::PrimaryKeys { .. }, Ok(FetchPayload::PrimaryKeys(keys))) => {
                if keys.is_empty() {
                    tracing::warn!(table = ?self.table, "table has no primary key, editing disabled");
                }
                self.primary_keys = Some(keys);
            }
            (FetchKey::TableData { .. }, Ok(FetchPayload::TableData(data))) => {
                tracing::debug!(rows = data.row_count(), "table data loaded");
                self.errors.data = None;
                self.rows = data.to_rows();
                self.data = Some(data);
            }
            (key, Err(e)) => {
                tracing::warn!(
                    kind = key.kind(),
                    error = %e,
                    connection_lost = e.is_connection(),
                    "fetch failed"
                );
                self.errors.data = Some(e.to_string());
                return Err(ServiceError::from_fetch(e));
            }
            (key, Ok(_)) => {
                return Err(ServiceError::QueryFailed(format!(
                    "unexpected payload for {} fetch",
                    key.kind()
                )));
            }
        }
        Ok(FetchOutcome::Applied)
    }

    /// Run a ticket against the session's source and apply the response
    pub async fn run(&mut self, ticket: FetchTicket) -> ServiceResult<FetchOutcome> {
        let response = ticket.run(self.source.clone()).await;
        self.accept(response)
    }

    /// Connect and load the schema list
    pub async fn connect_and_load(&mut self, uri: impl Into<String>) -> ServiceResult<()> {
        let ticket = self.connect(uri);
        self.run(ticket).await.map(|_| ())
    }

    /// Select a schema and load its tables
    pub async fn open_schema(&mut self, schema: impl Into<String>) -> ServiceResult<()> {
        let ticket = self.select_schema(schema)?;
        self.run(ticket).await.map(|_| ())
    }

    /// Select a table, fetching its primary key and first page concurrently
    pub async fn open_table(&mut self, table: impl Into<String>) -> ServiceResult<()> {
        let (pk_ticket, data_ticket) = self.select_table(table)?;
        let (pk_response, data_response) = tokio::join!(
            pk_ticket.run(self.source.clone()),
            data_ticket.run(self.source.clone())
        );
        let pk_result = self.accept(pk_response);
        let data_result = self.accept(data_response);
        pk_result?;
        data_result?;
        Ok(())
    }

    /// Re-fetch the current page
    pub async fn refresh(&mut self) -> ServiceResult<()> {
        let ticket = self.data_ticket()?;
        self.run(ticket).await.map(|_| ())
    }

    // ------------------------------------------------------------------
    // Paging, filters, sorts
    // ------------------------------------------------------------------

    pub fn set_limit(&mut self, limit: usize) -> ServiceResult<FetchTicket> {
        if limit == 0 {
            return Err(ServiceError::InvalidPagination(
                "limit must be at least 1".to_string(),
            ));
        }
        self.limit = limit;
        self.offset = 0;
        self.data_ticket()
    }

    pub fn set_offset(&mut self, offset: usize) -> ServiceResult<FetchTicket> {
        self.offset = offset;
        self.data_ticket()
    }

    pub fn next_page(&mut self) -> ServiceResult<FetchTicket> {
        let offset = self.offset.checked_add(self.limit).ok_or_else(|| {
            ServiceError::InvalidPagination("offset would overflow".to_string())
        })?;
        self.set_offset(offset)
    }

    pub fn previous_page(&mut self) -> ServiceResult<FetchTicket> {
        self.set_offset(self.offset.saturating_sub(self.limit))
    }

    /// A full page suggests more rows follow
    pub fn has_next_page(&self) -> bool {
        self.limit > 0 && self.rows.len() >= self.limit
    }

    pub fn has_previous_page(&self) -> bool {
        self.offset > 0
    }

    /// Draft filter state, for the filter editor
    pub fn query_mut(&mut self) -> &mut QuerySpecBuilder {
        &mut self.query
    }

    pub fn query(&self) -> &QuerySpecBuilder {
        &self.query
    }

    /// Make the draft filters active and go back to the first page
    pub fn apply_filters(&mut self) -> ServiceResult<FetchTicket> {
        if self.query.apply_draft() {
            tracing::debug!(filters = self.query.active_filter_count(), "filters applied");
        }
        self.offset = 0;
        self.data_ticket()
    }

    pub fn toggle_sort(&mut self, column: &str, multi: bool) -> ServiceResult<FetchTicket> {
        self.query.toggle_sort(column, multi);
        self.data_ticket()
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// Rows of the current page with pending edits overlaid
    pub fn display_rows(&self) -> Vec<DisplayRow> {
        materialize(&self.rows, &self.store, self.primary_key_columns())
    }

    fn display_row(&self, row_index: usize) -> ServiceResult<DisplayRow> {
        let fetched = self
            .rows
            .get(row_index..=row_index)
            .ok_or(ServiceError::RowOutOfRange {
                index: row_index,
                len: self.rows.len(),
            })?;
        materialize(fetched, &self.store, self.primary_key_columns())
            .pop()
            .ok_or(ServiceError::RowOutOfRange {
                index: row_index,
                len: self.rows.len(),
            })
    }

    fn column_meta(&self, column: &str) -> ServiceResult<&ColumnMeta> {
        self.data
            .as_ref()
            .and_then(|d| d.column(column))
            .ok_or_else(|| ServiceError::UnknownColumn(column.to_string()))
    }

    fn editable_primary_key(&self) -> ServiceResult<()> {
        let table = self.table.as_deref().ok_or(ServiceError::NoTableSelected)?;
        match &self.primary_keys {
            Some(keys) if !keys.is_empty() => Ok(()),
            _ => Err(ServiceError::NoPrimaryKey(table.to_string())),
        }
    }

    /// Whether rows of the current table can be edited
    pub fn can_edit(&self) -> bool {
        self.editable_primary_key().is_ok()
    }

    /// Record a new value for one cell of the current page
    pub fn edit_cell(
        &mut self,
        row_index: usize,
        column: &str,
        value: Value,
    ) -> ServiceResult<EditOutcome> {
        self.require_connected()?;
        self.editable_primary_key()?;
        self.column_meta(column)?;
        let row = self.display_row(row_index)?;
        let primary_key = row.primary_key.ok_or_else(|| {
            ServiceError::NoPrimaryKey(self.table.clone().unwrap_or_default())
        })?;
        Ok(self.store.record_edit(primary_key, column, value, &row.row))
    }

    /// Editor for one cell, classified from its column and shown value
    pub fn cell_editor(&self, row_index: usize, column: &str) -> ServiceResult<CellEditor> {
        let meta = self.column_meta(column)?;
        let row = self.display_row(row_index)?;
        Ok(CellEditor::new(meta, row.get(column)))
    }

    /// Parse typed input with the column's rules and record it
    pub fn edit_cell_input(
        &mut self,
        row_index: usize,
        column: &str,
        input: &str,
    ) -> ServiceResult<EditOutcome> {
        let value = self.cell_editor(row_index, column)?.parse_input(input)?;
        self.edit_cell(row_index, column, value)
    }

    /// Set a cell to NULL; refused for non-nullable columns
    pub fn set_cell_null(&mut self, row_index: usize, column: &str) -> ServiceResult<EditOutcome> {
        let value = self.cell_editor(row_index, column)?.set_null()?;
        self.edit_cell(row_index, column, value)
    }

    pub fn review(&self) -> Vec<ReviewEntry> {
        self.store.review()
    }

    pub fn discard_changes(&mut self) {
        self.store.clear();
    }

    // ------------------------------------------------------------------
    // Commit
    // ------------------------------------------------------------------

    /// Snapshot pending edits for a commit.
    ///
    /// `None` when nothing is pending. Only one commit may be outstanding.
    pub fn begin_apply(&mut self) -> ServiceResult<Option<ApplyBatch>> {
        if self.applying {
            return Err(ServiceError::ApplyInProgress);
        }
        self.require_connected()?;
        let connection = self.require_connection()?;
        let schema = self.schema.as_deref().ok_or(ServiceError::NoSchemaSelected)?;
        let table = self.table.as_deref().ok_or(ServiceError::NoTableSelected)?;
        let batch = ChangeApplier::prepare(&self.store, connection, schema, table);
        if batch.is_some() {
            self.applying = true;
            self.errors.apply = None;
        }
        Ok(batch)
    }

    /// Fold the outcome of a commit back into the session.
    ///
    /// On failure every pending edit stays and the error is recorded. On
    /// success the ledger is reconciled and a re-fetch of the current page is
    /// returned, unless the table was switched while the commit was running.
    pub fn finish_apply(
        &mut self,
        batch: &ApplyBatch,
        result: ServiceResult<()>,
    ) -> ServiceResult<ApplyFinished> {
        self.applying = false;
        if let Err(e) = result {
            self.errors.apply = Some(e.to_string());
            return Err(e);
        }

        let same_table = self.connection.as_deref() == Some(batch.connection.as_str())
            && self.schema.as_deref() == Some(batch.schema.as_str())
            && self.table.as_deref() == Some(batch.table.as_str());
        if !same_table {
            tracing::debug!("table changed during commit, skipping reconcile");
            return Ok(ApplyFinished {
                report: ApplyReport {
                    submitted_rows: batch.changes.len(),
                    submitted_cells: batch.cell_count(),
                    retained_rows: self.store.len(),
                },
                refetch: None,
            });
        }

        let report = ChangeApplier::reconcile(&mut self.store, batch);
        Ok(ApplyFinished {
            report,
            refetch: Some(self.data_ticket()?),
        })
    }

    /// Commit all pending edits, then re-fetch the current page
    pub async fn apply_changes(&mut self) -> ServiceResult<ApplyReport> {
        let Some(batch) = self.begin_apply()? else {
            return Ok(ApplyReport::default());
        };
        let result = self.applier.submit(&batch).await;
        let finished = self.finish_apply(&batch, result)?;
        if let Some(ticket) = finished.refetch {
            // The commit already succeeded; a failed refresh only leaves stale rows
            if let Err(e) = self.run(ticket).await {
                tracing::warn!(error = %e, "refresh after commit failed");
            }
        }
        Ok(finished.report)
    }

    pub fn is_applying(&self) -> bool {
        self.applying
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    fn require_connection(&self) -> ServiceResult<&str> {
        self.connection.as_deref().ok_or(ServiceError::NotConnected)
    }

    fn require_connected(&self) -> ServiceResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(ServiceError::NotConnected)
        }
    }

    pub fn connection(&self) -> Option<&str> {
        self.connection.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn schemas(&self) -> &[String] {
        &self.schemas
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn selected_schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn selected_table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Empty while the primary key is unknown or the table has none
    pub fn primary_key_columns(&self) -> &[String] {
        self.primary_keys.as_deref().unwrap_or(&[])
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        match &self.data {
            Some(data) => &data.columns,
            None => &[],
        }
    }

    pub fn fetched_rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn pending(&self) -> &PendingChangeStore {
        &self.store
    }

    pub fn errors(&self) -> &SessionErrors {
        &self.errors
    }
}
