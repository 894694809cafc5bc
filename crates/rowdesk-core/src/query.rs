//! Filter and sort types for table fetches
//!
//! A [`QuerySpec`] is the normalized description of one page of one table,
//! handed verbatim to [`RemoteTableSource::get_table_data`](crate::RemoteTableSource::get_table_data).

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::RowdeskError;

/// Filter operators understood by the backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub enum FilterOperator {
    /// Case-insensitive pattern match
    #[default]
    #[serde(rename = "ILIKE")]
    ILike,
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "<>")]
    NotEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = "IS NULL")]
    IsNull,
    #[serde(rename = "IS NOT NULL")]
    IsNotNull,
}

impl FilterOperator {
    /// Wire form of the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ILike => "ILIKE",
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThanOrEqual => "<=",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }

    /// Returns true if this operator requires a value input
    pub fn requires_value(&self) -> bool {
        !matches!(self, Self::IsNull | Self::IsNotNull)
    }

    /// Get all available operators in display order
    pub fn all() -> &'static [FilterOperator] {
        &[
            Self::ILike,
            Self::Equal,
            Self::NotEqual,
            Self::GreaterThan,
            Self::LessThan,
            Self::GreaterThanOrEqual,
            Self::LessThanOrEqual,
            Self::IsNull,
            Self::IsNotNull,
        ]
    }
}

impl std::fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = RowdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Self::all()
            .iter()
            .copied()
            .find(|op| op.as_str() == upper)
            .ok_or_else(|| RowdeskError::Query(format!("unknown filter operator '{}'", s)))
    }
}

/// Logical operator combining filter conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }

    pub fn toggle(&self) -> Self {
        match self {
            Self::And => Self::Or,
            Self::Or => Self::And,
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggle(&self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// One filter condition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub column_id: String,
    pub operator: FilterOperator,
    /// Always empty for operators that take no value
    #[serde(default)]
    pub value: String,
}

impl Filter {
    pub fn new(
        column_id: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<String>,
    ) -> Self {
        Self {
            column_id: column_id.into(),
            operator,
            value: value.into(),
        }
    }

    /// Copy with the value cleared when the operator takes none
    pub fn normalized(&self) -> Self {
        let mut filter = self.clone();
        if !filter.operator.requires_value() {
            filter.value.clear();
        }
        filter
    }
}

/// One sort criterion
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sort {
    pub column_id: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(column_id: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column_id: column_id.into(),
            direction,
        }
    }

    pub fn asc(column_id: impl Into<String>) -> Self {
        Self::new(column_id, SortDirection::Asc)
    }

    pub fn desc(column_id: impl Into<String>) -> Self {
        Self::new(column_id, SortDirection::Desc)
    }
}

/// Everything the store needs to fetch one page of a table.
///
/// `filters` and `sorts` are omitted rather than sent empty. The logical
/// operator is always present and only matters alongside filters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    pub schema: String,
    pub table: String,
    pub limit: usize,
    pub offset: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<Filter>>,
    #[serde(default)]
    pub logical_operator: LogicalOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sorts: Option<Vec<Sort>>,
}

impl QuerySpec {
    /// Unfiltered, unsorted page
    pub fn new(schema: impl Into<String>, table: impl Into<String>, limit: usize, offset: usize) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            limit,
            offset,
            filters: None,
            logical_operator: LogicalOperator::And,
            sorts: None,
        }
    }

    pub fn filter_count(&self) -> usize {
        self.filters.as_ref().map_or(0, Vec::len)
    }
}
