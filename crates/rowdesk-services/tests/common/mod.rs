//! Common test utilities and mocks

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use rowdesk_core::{
    Change, ColumnMeta, QuerySpec, RemoteTableSource, Result, Row, RowdeskError, TableData, Value,
};

/// In-memory table store for testing session and commit logic without a
/// real database.
///
/// Holds one table's rows keyed by its `id` column. `update_rows` writes into
/// them, so a re-fetch after a commit sees the committed values. Every call
/// is logged for assertions.
pub struct MockSource {
    pub schemas: Vec<String>,
    pub tables: Vec<String>,
    pub primary_keys: Vec<String>,
    pub columns: Vec<ColumnMeta>,
    pub rows: Arc<parking_lot::Mutex<Vec<Vec<Value>>>>,
    pub fail_connect: Arc<parking_lot::Mutex<bool>>,
    pub fail_data: Arc<parking_lot::Mutex<bool>>,
    pub fail_update: Arc<parking_lot::Mutex<bool>>,
    /// Every `get_table_data` request, in order
    pub data_requests: Arc<parking_lot::Mutex<Vec<QuerySpec>>>,
    /// Every batch passed to `update_rows`
    pub update_batches: Arc<parking_lot::Mutex<Vec<Vec<Change>>>>,
    pub call_log: Arc<parking_lot::Mutex<Vec<String>>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            schemas: vec!["public".to_string(), "audit".to_string()],
            tables: vec!["users".to_string(), "orders".to_string()],
            primary_keys: vec!["id".to_string()],
            columns: users_columns(),
            rows: Arc::new(parking_lot::Mutex::new(users_rows())),
            fail_connect: Arc::new(parking_lot::Mutex::new(false)),
            fail_data: Arc::new(parking_lot::Mutex::new(false)),
            fail_update: Arc::new(parking_lot::Mutex::new(false)),
            data_requests: Arc::new(parking_lot::Mutex::new(Vec::new())),
            update_batches: Arc::new(parking_lot::Mutex::new(Vec::new())),
            call_log: Arc::new(parking_lot::Mutex::new(Vec::new())),
        }
    }

    pub fn with_connect_failure(self) -> Self {
        self.set_connect_failure(true);
        self
    }

    pub fn without_primary_key(mut self) -> Self {
        self.primary_keys.clear();
        self
    }

    pub fn set_connect_failure(&self, fail: bool) {
        *self.fail_connect.lock() = fail;
    }

    pub fn set_data_failure(&self, fail: bool) {
        *self.fail_data.lock() = fail;
    }

    pub fn set_update_failure(&self, fail: bool) {
        *self.fail_update.lock() = fail;
    }

    pub fn data_requests(&self) -> Vec<QuerySpec> {
        self.data_requests.lock().clone()
    }

    pub fn update_batches(&self) -> Vec<Vec<Change>> {
        self.update_batches.lock().clone()
    }

    pub fn call_log(&self) -> Vec<String> {
        self.call_log.lock().clone()
    }

    /// Current stored value of `column` for the row with `id`
    pub fn stored_value(&self, id: i64, column: &str) -> Option<Value> {
        let index = self.columns.iter().position(|c| c.name == column)?;
        self.rows
            .lock()
            .iter()
            .find(|row| row.first() == Some(&Value::Int(id)))
            .and_then(|row| row.get(index).cloned())
    }
}

#[async_trait]
impl RemoteTableSource for MockSource {
    async fn list_schemas(&self, connection: &str) -> Result<Vec<String>> {
        self.call_log.lock().push(format!("list_schemas {}", connection));
        if *self.fail_connect.lock() {
            return Err(RowdeskError::Connection("connection refused".into()));
        }
        Ok(self.schemas.clone())
    }

    async fn list_tables(&self, _connection: &str, schema: &str) -> Result<Vec<String>> {
        self.call_log.lock().push(format!("list_tables {}", schema));
        Ok(self.tables.clone())
    }

    async fn get_primary_keys(
        &self,
        _connection: &str,
        schema: &str,
        table: &str,
    ) -> Result<Vec<String>> {
        self.call_log
            .lock()
            .push(format!("get_primary_keys {}.{}", schema, table));
        Ok(self.primary_keys.clone())
    }

    async fn get_table_data(&self, _connection: &str, spec: &QuerySpec) -> Result<TableData> {
        self.call_log
            .lock()
            .push(format!("get_table_data {}.{}", spec.schema, spec.table));
        self.data_requests.lock().push(spec.clone());
        if *self.fail_data.lock() {
            return Err(RowdeskError::Query("column \"nope\" does not exist".into()));
        }
        let rows = self
            .rows
            .lock()
            .iter()
            .skip(spec.offset)
            .take(spec.limit)
            .cloned()
            .collect();
        Ok(TableData::new(self.columns.clone(), rows))
    }

    async fn update_rows(
        &self,
        _connection: &str,
        schema: &str,
        table: &str,
        changes: &[Change],
    ) -> Result<()> {
        self.call_log
            .lock()
            .push(format!("update_rows {}.{}", schema, table));
        self.update_batches.lock().push(changes.to_vec());
        if *self.fail_update.lock() {
            return Err(RowdeskError::Update("deadlock detected".into()));
        }

        let mut rows = self.rows.lock();
        for change in changes {
            let id = change.primary_key().get("id").cloned();
            let Some(row) = rows.iter_mut().find(|r| r.first() == id.as_ref()) else {
                continue;
            };
            for (column, value) in change.changes() {
                if let Some(index) = self.columns.iter().position(|c| &c.name == column) {
                    row[index] = value.clone();
                }
            }
        }
        Ok(())
    }

    fn source_name(&self) -> &str {
        "mock"
    }
}

pub fn users_columns() -> Vec<ColumnMeta> {
    vec![
        ColumnMeta::new("id", "int4", false),
        ColumnMeta::new("name", "text", false),
        ColumnMeta::new("email", "varchar", true),
        ColumnMeta::new("active", "bool", true),
        ColumnMeta::new("created_at", "timestamptz", false),
    ]
}

pub fn users_rows() -> Vec<Vec<Value>> {
    vec![
        vec![
            Value::Int(1),
            Value::from("Alice"),
            Value::from("alice@example.com"),
            Value::Bool(true),
            Value::from("2024-01-01 09:00:00"),
        ],
        vec![
            Value::Int(2),
            Value::from("Bob"),
            Value::Null,
            Value::Bool(false),
            Value::from("2024-01-02 10:30:00"),
        ],
        vec![
            Value::Int(3),
            Value::from("Carol"),
            Value::from("carol@example.com"),
            Value::Null,
            Value::from("2024-01-03 12:00:00"),
        ],
    ]
}

pub fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

pub const TEST_URI: &str = "postgres://localhost/app";

/// Initialize logging for tests if not already initialized
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rowdesk_services=debug")),
            )
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
