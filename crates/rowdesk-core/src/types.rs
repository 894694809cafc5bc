//! Core types for rowdesk

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A cell value as fetched from or sent to the store.
///
/// Serializes to plain JSON (`null`, `true`, `1`, `1.5`, `"text"`, `[..]`, `{..}`),
/// which is the shape the backing store exchanges rows in. Dates and timestamps
/// travel as canonical strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// UTF-8 string (also dates, timestamps, UUIDs, decimals)
    String(String),
    /// Array of values (e.g. vectors)
    Array(Vec<Value>),
    /// Structured JSON object
    Json(serde_json::Value),
}

impl Value {
    /// Check if the value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::String(s) => s.parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Try to get as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::String(s) => s.parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Elements of a non-empty array whose every element is a number
    pub fn as_number_array(&self) -> Option<Vec<f64>> {
        let Value::Array(items) = self else {
            return None;
        };
        if items.is_empty() {
            return None;
        }
        items
            .iter()
            .map(|item| match item {
                Value::Int(v) => Some(*v as f64),
                Value::Float(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    /// The string form used to decide whether two values are "the same edit".
    ///
    /// Follows dynamic-language string coercion rather than structural equality:
    /// `null` becomes `"null"`, integral floats drop their fraction, arrays are
    /// comma-joined and every JSON object becomes `"[object Object]"`. Two
    /// different objects therefore compare equal; callers rely on this exact rule.
    pub fn coerced_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => coerce_float(*v),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    // Nulls inside arrays join as empty strings
                    Value::Null => String::new(),
                    other => other.coerced_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Json(json) => match json {
                serde_json::Value::Object(_) => "[object Object]".to_string(),
                other => Value::from(other.clone()).coerced_string(),
            },
        }
    }

    /// Whether two values are equal under [`Value::coerced_string`]
    pub fn coerced_eq(&self, other: &Value) -> bool {
        self.coerced_string() == other.coerced_string()
    }

    /// Convert to a plain JSON value
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(v) => serde_json::Value::Bool(*v),
            Value::Int(v) => serde_json::Value::from(*v),
            Value::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Json(json) => json.clone(),
        }
    }
}

fn coerce_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if v == 0.0 {
        "0".to_string()
    } else {
        // Display already prints integral floats without a fraction
        v.to_string()
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(v) => Value::Bool(v),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            object @ serde_json::Value::Object(_) => Value::Json(object),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Array(_) | Value::Json(_) => write!(f, "{}", self.to_json()),
        }
    }
}

/// A fetched row: column name to value, in fetch order.
///
/// Column order is kept for rendering only; row identity comes from its
/// [`PrimaryKey`](crate::PrimaryKey).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(IndexMap<String, Value>);

impl Row {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Zip column metadata with positional values
    pub fn from_values(columns: &[ColumnMeta], values: Vec<Value>) -> Self {
        Self(
            columns
                .iter()
                .map(|c| c.name.clone())
                .zip(values)
                .collect(),
        )
    }

    /// Get a value by column name
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// Set a column value, keeping the column's position if it already exists
    pub fn insert(&mut self, column: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(column.into(), value)
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    /// Column names in fetch order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
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
}

impl<K: Into<String>> FromIterator<(K, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Column metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ColumnMeta {
    /// Column name
    #[serde(default)]
    pub name: String,
    /// Declared data type (store-specific string, e.g. "int4", "timestamptz")
    #[serde(default, alias = "type", alias = "pg_type")]
    pub data_type: String,
    /// Whether the column can hold NULL
    #[serde(default, alias = "is_nullable")]
    pub nullable: bool,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
        }
    }
}

/// Result of a table data fetch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    /// Column metadata, in table order
    pub columns: Vec<ColumnMeta>,
    /// Positional row tuples matching `columns`
    pub rows: Vec<Vec<Value>>,
}

impl TableData {
    pub fn new(columns: Vec<ColumnMeta>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Check if the result has rows
    pub fn has_rows(&self) -> bool {
        !self.rows.is_empty()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Named rows, in fetch order
    pub fn to_rows(&self) -> Vec<Row> {
        self.rows
            .iter()
            .map(|values| Row::from_values(&self.columns, values.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerced_string_matches_dynamic_string_conversion() {
        assert_eq!(Value::Null.coerced_string(), "null");
        assert_eq!(Value::Bool(true).coerced_string(), "true");
        assert_eq!(Value::Int(42).coerced_string(), "42");
        assert_eq!(Value::Float(42.0).coerced_string(), "42");
        assert_eq!(Value::Float(-0.0).coerced_string(), "0");
        assert_eq!(Value::Float(1.5).coerced_string(), "1.5");
        assert_eq!(Value::Float(f64::INFINITY).coerced_string(), "Infinity");
        assert_eq!(
            Value::Array(vec![Value::Int(1), Value::Null, Value::Float(2.5)]).coerced_string(),
            "1,,2.5"
        );
        assert_eq!(
            Value::Json(json!({"a": 1})).coerced_string(),
            "[object Object]"
        );
    }

    #[test]
    fn number_and_its_text_compare_equal() {
        assert!(Value::Int(7).coerced_eq(&Value::String("7".into())));
        assert!(Value::Bool(false).coerced_eq(&Value::String("false".into())));
        assert!(!Value::Null.coerced_eq(&Value::String(String::new())));
    }

    #[test]
    fn distinct_objects_compare_equal() {
        let a = Value::Json(json!({"theme": "dark"}));
        let b = Value::Json(json!({"theme": "light"}));
        assert!(a.coerced_eq(&b));
    }

    #[test]
    fn json_round_trip_picks_variants() {
        let values: Vec<Value> =
            serde_json::from_value(json!([null, true, 3, 2.5, "x", [1, 2], {"k": "v"}])).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Bool(true),
                Value::Int(3),
                Value::Float(2.5),
                Value::String("x".into()),
                Value::Array(vec![Value::Int(1), Value::Int(2)]),
                Value::Json(json!({"k": "v"})),
            ]
        );
    }

    #[test]
    fn number_array_requires_all_numeric_elements() {
        let vector = Value::Array(vec![Value::Float(0.5), Value::Int(-1)]);
        assert_eq!(vector.as_number_array(), Some(vec![0.5, -1.0]));

        let mixed = Value::Array(vec![Value::Int(1), Value::String("a".into())]);
        assert_eq!(mixed.as_number_array(), None);
        assert_eq!(Value::Array(vec![]).as_number_array(), None);
    }

    #[test]
    fn table_data_rows_keep_column_order() {
        let data = TableData::new(
            vec![
                ColumnMeta::new("id", "int4", false),
                ColumnMeta::new("name", "text", true),
            ],
            vec![vec![Value::Int(1), Value::String("Alice".into())]],
        );
        let rows = data.to_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].columns().collect::<Vec<_>>(), vec!["id", "name"]);
        assert_eq!(rows[0].get("name"), Some(&Value::String("Alice".into())));
    }
}
