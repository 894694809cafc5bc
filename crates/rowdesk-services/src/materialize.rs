//! Overlay pending edits onto fetched rows

use indexmap::IndexSet;
use rowdesk_core::{PrimaryKey, Row, Value};

use crate::pending::PendingChangeStore;

/// A fetched row as shown to the user, pending edits applied
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayRow {
    /// `None` when the table has no primary key
    pub primary_key: Option<PrimaryKey>,
    pub row: Row,
    /// Columns whose shown value is a pending edit
    pub pending: IndexSet<String>,
}

impl DisplayRow {
    pub fn is_pending(&self, column: &str) -> bool {
        self.pending.contains(column)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.row.get(column)
    }
}

/// Merge each row's pending change over its fetched values.
///
/// Rows without a change, and every row when `pk_columns` is empty, pass
/// through with nothing marked pending. Order and length follow `fetched`.
pub fn materialize(
    fetched: &[Row],
    store: &PendingChangeStore,
    pk_columns: &[String],
) -> Vec<DisplayRow> {
    fetched
        .iter()
        .map(|fetched_row| {
            if pk_columns.is_empty() {
                return DisplayRow {
                    primary_key: None,
                    row: fetched_row.clone(),
                    pending: IndexSet::new(),
                };
            }

            let primary_key = PrimaryKey::from_row(fetched_row, pk_columns);
            let mut row = fetched_row.clone();
            let mut pending = IndexSet::new();
            if let Some(change) = store.find_by_primary_key(&primary_key) {
                for (column, value) in change.changes() {
                    row.insert(column.clone(), value.clone());
                    pending.insert(column.clone());
                }
            }
            DisplayRow {
                primary_key: Some(primary_key),
                row,
                pending,
            }
        })
        .collect()
}
