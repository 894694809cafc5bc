//! Row identity and per-row uncommitted edits

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{Row, Value};

/// Primary-key column values identifying one row.
///
/// Equality ignores column order: `{a: 1, b: 2}` and `{b: 2, a: 1}` name the same row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrimaryKey(IndexMap<String, Value>);

impl PrimaryKey {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract the key of `row` for the given primary-key columns.
    ///
    /// A key column absent from the row is recorded as NULL.
    pub fn from_row(row: &Row, pk_columns: &[String]) -> Self {
        Self(
            pk_columns
                .iter()
                .map(|col| (col.clone(), row.get(col).cloned().unwrap_or(Value::Null)))
                .collect(),
        )
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Human-readable label such as `id: 1, org: acme`
    pub fn label(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v.coerced_string()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl PartialEq for PrimaryKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .all(|(k, v)| other.0.get(k).is_some_and(|o| o == v))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for PrimaryKey {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Result of recording one edit into a [`Change`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellEditResult {
    /// The column now holds a value that differs from the original
    Set,
    /// The column was set back to its original value and dropped
    Reverted,
}

/// All uncommitted edits to one row.
///
/// Always holds at least one column, and no column's pending value equals
/// its original under [`Value::coerced_eq`]. `original` is the row snapshot
/// taken when the first edit was made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pks: PrimaryKey,
    changes: IndexMap<String, Value>,
    original: Row,
}

impl Change {
    /// Start tracking a row with its first edit.
    ///
    /// Returns `None` when the value is indistinguishable from the original,
    /// since an empty change is never stored.
    pub fn first_edit(
        pks: PrimaryKey,
        column: impl Into<String>,
        value: Value,
        original: Row,
    ) -> Option<Self> {
        let column = column.into();
        let original_value = original.get(&column).unwrap_or(&Value::Null);
        if original_value.coerced_eq(&value) {
            return None;
        }
        let mut changes = IndexMap::new();
        changes.insert(column, value);
        Some(Self {
            pks,
            changes,
            original,
        })
    }

    /// Record a further edit to this row.
    ///
    /// Overwrites any pending value for the column; setting it back to the
    /// original value removes the column instead.
    pub fn record(&mut self, column: impl Into<String>, value: Value) -> CellEditResult {
        let column = column.into();
        if self.original_value(&column).coerced_eq(&value) {
            self.changes.shift_remove(&column);
            CellEditResult::Reverted
        } else {
            self.changes.insert(column, value);
            CellEditResult::Set
        }
    }

    /// Adopt `committed` as the new baseline for `column`.
    ///
    /// The value this change wants for the column is kept: its pending value,
    /// or the old baseline when nothing is pending. It stays pending only if
    /// it differs from `committed`.
    pub fn rebase(&mut self, column: &str, committed: Value) {
        let desired = match self.changes.get(column) {
            Some(pending) => pending.clone(),
            None => self.original_value(column).clone(),
        };
        if desired.coerced_eq(&committed) {
            self.changes.shift_remove(column);
        } else {
            self.changes.insert(column.to_string(), desired);
        }
        self.original.insert(column, committed);
    }

    /// Adopt `committed` as the new baseline for `column` without reasserting
    /// the old one. Used when this change was recorded after the committed
    /// one was discarded, so an absent column was never edited here.
    pub fn adopt(&mut self, column: &str, committed: Value) {
        if self
            .changes
            .get(column)
            .is_some_and(|pending| pending.coerced_eq(&committed))
        {
            self.changes.shift_remove(column);
        }
        self.original.insert(column, committed);
    }

    /// The change that undoes this one once it has been committed.
    ///
    /// Baseline is the committed row; pending values are the pre-edit ones.
    /// `None` when committing changed nothing observable.
    pub fn restoring_original(&self) -> Option<Self> {
        let mut original = self.original.clone();
        let mut changes = IndexMap::new();
        for (column, committed) in &self.changes {
            let before = self.original_value(column).clone();
            if !before.coerced_eq(committed) {
                changes.insert(column.clone(), before);
            }
            original.insert(column.clone(), committed.clone());
        }
        if changes.is_empty() {
            return None;
        }
        Some(Self {
            pks: self.pks.clone(),
            changes,
            original,
        })
    }

    pub fn primary_key(&self) -> &PrimaryKey {
        &self.pks
    }

    /// Pending column values, in the order they were first edited
    pub fn changes(&self) -> &IndexMap<String, Value> {
        &self.changes
    }

    pub fn original(&self) -> &Row {
        &self.original
    }

    /// The pre-edit value of `column`, NULL when the snapshot lacks it
    pub fn original_value(&self, column: &str) -> &Value {
        self.original.get(column).unwrap_or(&Value::Null)
    }

    pub fn pending_value(&self, column: &str) -> Option<&Value> {
        self.changes.get(column)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of pending cells
    pub fn len(&self) -> usize {
        self.changes.len()
    }
}
