//! Pending edit ledger
//!
//! Holds at most one [`Change`] per primary key. Edits merge into the row's
//! existing change, and an edit that puts a column back to its original value
//! drops it again, so the ledger only ever describes real differences.

use rowdesk_core::{CellEditResult, Change, PrimaryKey, Row, Value};
use serde::Serialize;

/// What recording an edit did to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// First edit to this row; a new change was stored
    Created,
    /// An existing change gained or replaced a column
    Updated,
    /// A column was set back to its original value and dropped
    Reverted,
    /// The last pending column was reverted and the change removed
    Removed,
    /// The edit matched the original value and nothing was stored
    Unchanged,
}

impl EditOutcome {
    pub fn modified_store(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// One pending cell, formatted for a confirmation dialog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewEntry {
    /// e.g. `id: 1`
    pub primary_key: String,
    pub column: String,
    pub old_value: String,
    pub new_value: String,
}

/// Uncommitted edits for the selected table, in first-edit order
#[derive(Debug, Clone, Default)]
pub struct PendingChangeStore {
    changes: Vec<Change>,
    revision: u64,
    epoch: u64,
}

impl PendingChangeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an edit of `column` on the row identified by `pks`.
    ///
    /// `displayed` is the row as currently shown; it becomes the change's
    /// original snapshot when this is the row's first edit, and is ignored
    /// afterwards.
    pub fn record_edit(
        &mut self,
        pks: PrimaryKey,
        column: &str,
        value: Value,
        displayed: &Row,
    ) -> EditOutcome {
        let outcome = match self.position(&pks) {
            Some(index) => {
                let result = self.changes[index].record(column, value);
                if self.changes[index].is_empty() {
                    self.changes.remove(index);
                    EditOutcome::Removed
                } else {
                    match result {
                        CellEditResult::Set => EditOutcome::Updated,
                        CellEditResult::Reverted => EditOutcome::Reverted,
                    }
                }
            }
            None => match Change::first_edit(pks, column, value, displayed.clone()) {
                Some(change) => {
                    self.changes.push(change);
                    EditOutcome::Created
                }
                None => EditOutcome::Unchanged,
            },
        };

        if outcome.modified_store() {
            self.revision += 1;
        }
        tracing::debug!(column, ?outcome, pending_rows = self.changes.len(), "recorded edit");
        outcome
    }

    /// Drop every pending change and start a new epoch
    pub fn clear(&mut self) {
        if !self.changes.is_empty() {
            tracing::debug!(dropped = self.changes.len(), "clearing pending changes");
            self.changes.clear();
        }
        self.revision += 1;
        self.epoch += 1;
    }

    /// All changes in first-edit order
    pub fn list(&self) -> &[Change] {
        &self.changes
    }

    pub fn find_by_primary_key(&self, pks: &PrimaryKey) -> Option<&Change> {
        self.changes.iter().find(|c| c.primary_key() == pks)
    }

    fn position(&self, pks: &PrimaryKey) -> Option<usize> {
        self.changes.iter().position(|c| c.primary_key() == pks)
    }

    /// Number of rows with pending edits
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of pending cells across all rows
    pub fn cell_count(&self) -> usize {
        self.changes.iter().map(Change::len).sum()
    }

    /// Counter bumped by every mutation, used to detect edits made while a
    /// commit was in flight
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Counter bumped by [`PendingChangeStore::clear`]. Changes recorded in
    /// an earlier epoch were discarded, not reverted.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Pending cells flattened for review, values in their string form
    pub fn review(&self) -> Vec<ReviewEntry> {
        self.changes
            .iter()
            .flat_map(|change| {
                let primary_key = change.primary_key().label();
                change.changes().iter().map(move |(column, new_value)| ReviewEntry {
                    primary_key: primary_key.clone(),
                    column: column.clone(),
                    old_value: change.original_value(column).coerced_string(),
                    new_value: new_value.coerced_string(),
                })
            })
            .collect()
    }

    /// Fold a committed batch into the ledger.
    ///
    /// Every submitted cell becomes the new baseline of its row. A row still
    /// wanting what was committed is dropped; a row edited again after the
    /// batch was taken keeps its newer values.
    ///
    /// A submitted row no longer in the ledger was reverted meanwhile, so its
    /// pre-edit values come back as pending edits. That only holds while the
    /// ledger is still in `epoch`, the epoch the batch was taken in; after a
    /// clear the missing rows were discarded and nothing is restored.
    pub fn settle(&mut self, submitted: &[Change], epoch: u64) {
        let cleared = epoch != self.epoch;
        for committed in submitted {
            match self.position(committed.primary_key()) {
                Some(index) => {
                    let change = &mut self.changes[index];
                    for (column, value) in committed.changes() {
                        if cleared {
                            change.adopt(column, value.clone());
                        } else {
                            change.rebase(column, value.clone());
                        }
                    }
                    if change.is_empty() {
                        self.changes.remove(index);
                    }
                }
                None if cleared => {}
                None => {
                    if let Some(undo) = committed.restoring_original() {
                        self.changes.push(undo);
                    }
                }
            }
        }
        self.revision += 1;
        tracing::debug!(
            remaining = self.changes.len(),
            cleared,
            "settled committed changes"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn alice() -> Row {
        Row::from_iter([
            ("id", Value::Int(1)),
            ("name", Value::from("Alice")),
            ("email", Value::from("alice@example.com")),
        ])
    }

    fn bob() -> Row {
        Row::from_iter([
            ("id", Value::Int(2)),
            ("name", Value::from("Bob")),
            ("email", Value::Null),
        ])
    }

    fn pk(id: i64) -> PrimaryKey {
        PrimaryKey::new().with("id", id)
    }

    #[test]
    fn edit_then_revert_leaves_no_change() {
        let mut store = PendingChangeStore::new();
        assert_eq!(
            store.record_edit(pk(1), "name", Value::from("Alicia"), &alice()),
            EditOutcome::Created
        );
        assert_eq!(store.len(), 1);

        assert_eq!(
            store.record_edit(pk(1), "name", Value::from("Alice"), &alice()),
            EditOutcome::Removed
        );
        assert!(store.is_empty());
        assert!(store.find_by_primary_key(&pk(1)).is_none());
    }

    #[test]
    fn edits_to_one_row_merge() {
        let mut store = PendingChangeStore::new();
        store.record_edit(pk(1), "name", Value::from("Bob"), &alice());
        assert_eq!(
            store.record_edit(pk(1), "email", Value::from("b@x.com"), &alice()),
            EditOutcome::Updated
        );

        assert_eq!(store.len(), 1);
        let change = store.find_by_primary_key(&pk(1)).unwrap();
        assert_eq!(change.changes().len(), 2);
        assert_eq!(change.pending_value("name"), Some(&Value::from("Bob")));
        assert_eq!(change.pending_value("email"), Some(&Value::from("b@x.com")));
    }

    #[test]
    fn original_is_captured_once() {
        let mut store = PendingChangeStore::new();
        store.record_edit(pk(1), "name", Value::from("Bob"), &alice());

        // The displayed row now shows the pending value; it must not replace the snapshot
        let mut displayed = alice();
        displayed.insert("name", Value::from("Bob"));
        store.record_edit(pk(1), "email", Value::from("b@x.com"), &displayed);

        let change = store.find_by_primary_key(&pk(1)).unwrap();
        assert_eq!(change.original_value("name"), &Value::from("Alice"));
    }

    #[test]
    fn reverting_one_of_two_columns_keeps_the_other() {
        let mut store = PendingChangeStore::new();
        store.record_edit(pk(1), "name", Value::from("Bob"), &alice());
        store.record_edit(pk(1), "email", Value::from("b@x.com"), &alice());
        assert_eq!(
            store.record_edit(pk(1), "name", Value::from("Alice"), &alice()),
            EditOutcome::Reverted
        );
        let change = store.find_by_primary_key(&pk(1)).unwrap();
        assert_eq!(change.changes().keys().collect::<Vec<_>>(), vec!["email"]);
    }

    #[test]
    fn equality_uses_string_form() {
        let mut store = PendingChangeStore::new();
        let row = Row::from_iter([("id", Value::Int(1)), ("age", Value::Int(30))]);
        assert_eq!(
            store.record_edit(pk(1), "age", Value::from("30"), &row),
            EditOutcome::Unchanged
        );
        store.record_edit(pk(1), "age", Value::Int(31), &row);
        assert_eq!(
            store.record_edit(pk(1), "age", Value::Float(30.0), &row),
            EditOutcome::Removed
        );
    }

    #[test]
    fn null_and_empty_string_differ() {
        let mut store = PendingChangeStore::new();
        assert_eq!(
            store.record_edit(pk(2), "email", Value::from(""), &bob()),
            EditOutcome::Created
        );
    }

    #[test]
    fn list_keeps_first_edit_order() {
        let mut store = PendingChangeStore::new();
        store.record_edit(pk(2), "name", Value::from("Robert"), &bob());
        store.record_edit(pk(1), "name", Value::from("Ally"), &alice());
        store.record_edit(pk(2), "email", Value::from("r@x.com"), &bob());

        let ids: Vec<_> = store
            .list()
            .iter()
            .map(|c| c.primary_key().get("id").cloned())
            .collect();
        assert_eq!(ids, vec![Some(Value::Int(2)), Some(Value::Int(1))]);
        assert_eq!(store.cell_count(), 3);
    }

    #[test]
    fn clear_drops_everything_and_bumps_revision() {
        let mut store = PendingChangeStore::new();
        store.record_edit(pk(1), "name", Value::from("Bob"), &alice());
        let revision = store.revision();
        store.clear();
        assert!(store.is_empty());
        assert!(store.revision() > revision);
        assert_eq!(store.epoch(), 1);
    }

    #[test]
    fn review_lists_every_cell() {
        let mut store = PendingChangeStore::new();
        store.record_edit(pk(2), "email", Value::from("bob@x.com"), &bob());

        assert_eq!(
            store.review(),
            vec![ReviewEntry {
                primary_key: "id: 2".to_string(),
                column: "email".to_string(),
                old_value: "null".to_string(),
                new_value: "bob@x.com".to_string(),
            }]
        );
    }

    #[test]
    fn settle_keeps_edits_made_after_submission() {
        let mut store = PendingChangeStore::new();
        store.record_edit(pk(1), "name", Value::from("Bob"), &alice());
        store.record_edit(pk(2), "name", Value::from("Robert"), &bob());
        let submitted = store.list().to_vec();

        // Arrive while the commit is in flight
        store.record_edit(pk(1), "email", Value::from("b@x.com"), &alice());
        store.record_edit(pk(2), "name", Value::from("Rob"), &bob());

        store.settle(&submitted, 0);

        let first = store.find_by_primary_key(&pk(1)).unwrap();
        assert_eq!(first.changes().keys().collect::<Vec<_>>(), vec!["email"]);
        assert_eq!(first.original_value("name"), &Value::from("Bob"));

        let second = store.find_by_primary_key(&pk(2)).unwrap();
        assert_eq!(second.pending_value("name"), Some(&Value::from("Rob")));
        assert_eq!(second.original_value("name"), &Value::from("Robert"));
    }

    #[test]
    fn settle_without_new_edits_empties_store() {
        let mut store = PendingChangeStore::new();
        store.record_edit(pk(1), "name", Value::from("Bob"), &alice());
        let submitted = store.list().to_vec();
        store.settle(&submitted, 0);
        assert!(store.is_empty());
    }

    #[test]
    fn settle_restores_revert_made_in_flight() {
        let mut store = PendingChangeStore::new();
        store.record_edit(pk(1), "name", Value::from("Bob"), &alice());
        let submitted = store.list().to_vec();
        store.record_edit(pk(1), "name", Value::from("Alice"), &alice());
        assert!(store.is_empty());

        store.settle(&submitted, 0);
        let change = store.find_by_primary_key(&pk(1)).unwrap();
        assert_eq!(change.pending_value("name"), Some(&Value::from("Alice")));
        assert_eq!(change.original_value("name"), &Value::from("Bob"));
    }

    #[test]
    fn settle_after_clear_restores_nothing() {
        let mut store = PendingChangeStore::new();
        store.record_edit(pk(1), "name", Value::from("Bob"), &alice());
        let submitted = store.list().to_vec();
        let epoch = store.epoch();

        store.clear();
        store.settle(&submitted, epoch);
        assert!(store.is_empty());
        assert!(store.review().is_empty());
    }

    #[test]
    fn settle_after_clear_still_rebases_new_edits() {
        let mut store = PendingChangeStore::new();
        store.record_edit(pk(1), "name", Value::from("Bob"), &alice());
        let submitted = store.list().to_vec();
        let epoch = store.epoch();

        store.clear();
        store.record_edit(pk(1), "email", Value::from("b@x.com"), &alice());
        store.settle(&submitted, epoch);

        let change = store.find_by_primary_key(&pk(1)).unwrap();
        assert_eq!(change.changes().keys().collect::<Vec<_>>(), vec!["email"]);
        assert_eq!(change.original_value("name"), &Value::from("Bob"));
    }
}
