//! Draft and active filter state for the table view
//!
//! Filters are edited as a draft and only drive fetches once applied. Sorts
//! skip the draft stage and take effect as soon as they change.

use rowdesk_core::{
    ColumnMeta, Filter, FilterOperator, LogicalOperator, QuerySpec, Sort, SortDirection, Value,
};

use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpecBuilder {
    draft_filters: Vec<Filter>,
    draft_logical_operator: LogicalOperator,
    active_filters: Vec<Filter>,
    active_logical_operator: LogicalOperator,
    sorts: Vec<Sort>,
}

impl QuerySpecBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a draft filter on the first column, `ILIKE` with an empty value.
    ///
    /// Returns the new filter's index.
    pub fn add_filter(&mut self, columns: &[ColumnMeta]) -> usize {
        let column = columns.first().map(|c| c.name.clone()).unwrap_or_default();
        self.draft_filters
            .push(Filter::new(column, FilterOperator::ILike, String::new()));
        self.draft_filters.len() - 1
    }

    pub fn remove_filter(&mut self, index: usize) -> ServiceResult<Filter> {
        self.check_index(index)?;
        Ok(self.draft_filters.remove(index))
    }

    pub fn set_column(&mut self, index: usize, column: impl Into<String>) -> ServiceResult<()> {
        self.draft_filter_mut(index)?.column_id = column.into();
        Ok(())
    }

    /// Change a draft filter's operator. The value is always reset to empty.
    pub fn set_operator(&mut self, index: usize, operator: FilterOperator) -> ServiceResult<()> {
        let filter = self.draft_filter_mut(index)?;
        filter.operator = operator;
        filter.value.clear();
        Ok(())
    }

    pub fn set_value(&mut self, index: usize, value: impl Into<String>) -> ServiceResult<()> {
        self.draft_filter_mut(index)?.value = value.into();
        Ok(())
    }

    /// Use a cell value as a filter value, NULL becoming empty
    pub fn set_value_from_cell(&mut self, index: usize, value: &Value) -> ServiceResult<()> {
        let text = match value {
            Value::Null => String::new(),
            other => other.coerced_string(),
        };
        self.set_value(index, text)
    }

    pub fn set_draft_logical_operator(&mut self, operator: LogicalOperator) {
        self.draft_logical_operator = operator;
    }

    pub fn toggle_draft_logical_operator(&mut self) {
        self.draft_logical_operator = self.draft_logical_operator.toggle();
    }

    /// Reset the draft to the active filters, discarding unapplied edits
    pub fn reopen_draft(&mut self) {
        self.draft_filters = self.active_filters.clone();
        self.draft_logical_operator = self.active_logical_operator;
    }

    /// Copy the draft over the active filters.
    ///
    /// Returns whether the active filters changed.
    pub fn apply_draft(&mut self) -> bool {
        let changed = self.active_filters != self.draft_filters
            || self.active_logical_operator != self.draft_logical_operator;
        self.active_filters = self.draft_filters.clone();
        self.active_logical_operator = self.draft_logical_operator;
        changed
    }

    /// Drop draft and active filters alike
    pub fn clear_filters(&mut self) {
        self.draft_filters.clear();
        self.active_filters.clear();
        self.draft_logical_operator = LogicalOperator::default();
        self.active_logical_operator = LogicalOperator::default();
    }

    /// Drop filters and sorts
    pub fn reset(&mut self) {
        self.clear_filters();
        self.sorts.clear();
    }

    /// Cycle a column's sort: none, ascending, descending, none.
    ///
    /// Without `multi` a newly sorted column replaces every other sort.
    pub fn toggle_sort(&mut self, column: &str, multi: bool) {
        match self.sorts.iter().position(|s| s.column_id == column) {
            Some(index) => match self.sorts[index].direction {
                SortDirection::Asc => self.sorts[index].direction = SortDirection::Desc,
                SortDirection::Desc => {
                    self.sorts.remove(index);
                }
            },
            None => {
                if !multi {
                    self.sorts.clear();
                }
                self.sorts.push(Sort::asc(column));
            }
        }
    }

    pub fn set_sorts(&mut self, sorts: Vec<Sort>) {
        self.sorts = sorts;
    }

    pub fn clear_sorts(&mut self) {
        self.sorts.clear();
    }

    pub fn draft_filters(&self) -> &[Filter] {
        &self.draft_filters
    }

    pub fn draft_logical_operator(&self) -> LogicalOperator {
        self.draft_logical_operator
    }

    pub fn active_filters(&self) -> &[Filter] {
        &self.active_filters
    }

    pub fn active_logical_operator(&self) -> LogicalOperator {
        self.active_logical_operator
    }

    pub fn active_filter_count(&self) -> usize {
        self.active_filters.len()
    }

    pub fn sorts(&self) -> &[Sort] {
        &self.sorts
    }

    /// Build the fetch request from the active filters and current sorts
    pub fn to_query_spec(
        &self,
        schema: impl Into<String>,
        table: impl Into<String>,
        limit: usize,
        offset: usize,
    ) -> QuerySpec {
        QuerySpec {
            filters: (!self.active_filters.is_empty())
                .then(|| self.active_filters.iter().map(Filter::normalized).collect()),
            logical_operator: self.active_logical_operator,
            sorts: (!self.sorts.is_empty()).then(|| self.sorts.clone()),
            ..QuerySpec::new(schema, table, limit, offset)
        }
    }

    fn check_index(&self, index: usize) -> ServiceResult<()> {
        if index >= self.draft_filters.len() {
            return Err(ServiceError::FilterOutOfRange {
                index,
                len: self.draft_filters.len(),
            });
        }
        Ok(())
    }

    fn draft_filter_mut(&mut self, index: usize) -> ServiceResult<&mut Filter> {
        self.check_index(index)?;
        Ok(&mut self.draft_filters[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn columns() -> Vec<ColumnMeta> {
        vec![
            ColumnMeta::new("id", "int4", false),
            ColumnMeta::new("name", "text", true),
        ]
    }

    #[test]
    fn new_filter_defaults_to_first_column_ilike() {
        let mut builder = QuerySpecBuilder::new();
        let index = builder.add_filter(&columns());
        assert_eq!(index, 0);
        assert_eq!(
            builder.draft_filters()[0],
            Filter::new("id", FilterOperator::ILike, "")
        );

        let mut empty = QuerySpecBuilder::new();
        empty.add_filter(&[]);
        assert_eq!(empty.draft_filters()[0].column_id, "");
    }

    #[test]
    fn operator_change_resets_value() {
        let mut builder = QuerySpecBuilder::new();
        builder.add_filter(&columns());
        builder.set_value(0, "42").unwrap();
        builder.set_operator(0, FilterOperator::Equal).unwrap();
        assert_eq!(builder.draft_filters()[0].value, "");

        builder.set_value(0, "42").unwrap();
        builder.set_operator(0, FilterOperator::IsNull).unwrap();
        builder.apply_draft();
        let spec = builder.to_query_spec("public", "users", 100, 0);
        assert_eq!(
            spec.filters,
            Some(vec![Filter::new("id", FilterOperator::IsNull, "")])
        );
    }

    #[test]
    fn draft_does_not_drive_fetch_until_applied() {
        let mut builder = QuerySpecBuilder::new();
        builder.add_filter(&columns());
        builder.set_column(0, "name").unwrap();
        builder.set_value(0, "%al%").unwrap();
        builder.set_draft_logical_operator(LogicalOperator::Or);

        let spec = builder.to_query_spec("public", "users", 100, 0);
        assert_eq!(spec.filters, None);
        assert_eq!(spec.logical_operator, LogicalOperator::And);

        assert!(builder.apply_draft());
        assert!(!builder.apply_draft());
        let spec = builder.to_query_spec("public", "users", 100, 0);
        assert_eq!(spec.filter_count(), 1);
        assert_eq!(spec.logical_operator, LogicalOperator::Or);
    }

    #[test]
    fn reopen_discards_unapplied_draft() {
        let mut builder = QuerySpecBuilder::new();
        builder.add_filter(&columns());
        builder.apply_draft();

        builder.add_filter(&columns());
        builder.toggle_draft_logical_operator();
        builder.reopen_draft();
        assert_eq!(builder.draft_filters(), builder.active_filters());
        assert_eq!(builder.draft_logical_operator(), LogicalOperator::And);
    }

    #[test]
    fn empty_lists_are_omitted() {
        let builder = QuerySpecBuilder::new();
        let spec = builder.to_query_spec("public", "users", 25, 50);
        assert_eq!(spec, QuerySpec::new("public", "users", 25, 50));
    }

    #[test]
    fn toggle_sort_cycles() {
        let mut builder = QuerySpecBuilder::new();
        builder.toggle_sort("name", false);
        assert_eq!(builder.sorts(), &[Sort::asc("name")]);
        builder.toggle_sort("name", false);
        assert_eq!(builder.sorts(), &[Sort::desc("name")]);
        builder.toggle_sort("name", false);
        assert!(builder.sorts().is_empty());
    }

    #[test]
    fn toggle_sort_replaces_unless_multi() {
        let mut builder = QuerySpecBuilder::new();
        builder.toggle_sort("name", false);
        builder.toggle_sort("id", false);
        assert_eq!(builder.sorts(), &[Sort::asc("id")]);

        builder.toggle_sort("name", true);
        assert_eq!(builder.sorts(), &[Sort::asc("id"), Sort::asc("name")]);
        let spec = builder.to_query_spec("public", "users", 100, 0);
        assert_eq!(spec.sorts, Some(vec![Sort::asc("id"), Sort::asc("name")]));
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let mut builder = QuerySpecBuilder::new();
        assert!(matches!(
            builder.set_operator(3, FilterOperator::Equal),
            Err(ServiceError::FilterOutOfRange { index: 3, len: 0 })
        ));
        assert!(builder.remove_filter(0).is_err());
    }

    #[test]
    fn cell_value_as_filter_value() {
        let mut builder = QuerySpecBuilder::new();
        builder.add_filter(&columns());
        builder.set_value_from_cell(0, &Value::Int(7)).unwrap();
        assert_eq!(builder.draft_filters()[0].value, "7");
        builder.set_value_from_cell(0, &Value::Null).unwrap();
        assert_eq!(builder.draft_filters()[0].value, "");
    }
}
