//! Per-column editing rules
//!
//! A column's declared type string, together with the shape of the value it
//! currently holds, picks one [`CellKind`]. The [`CellEditor`] for that kind
//! turns raw user input into the [`Value`] that gets recorded as a pending
//! edit, enforcing nullability and canonical date formatting on the way.
//!
//! Diffing never looks at the kind: pending edits are compared through
//! [`Value::coerced_eq`] whatever the column type.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::{ColumnMeta, Value};

/// Canonical output format for date-only columns
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Canonical output format for timestamp columns
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const TIMESTAMP_INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Editing behavior of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    /// true/false, plus NULL when the column is nullable
    Boolean { nullable: bool },
    Date,
    Timestamp,
    /// Integer columns reject fractional input
    Numeric { integer: bool },
    /// JSON/JSONB documents
    Structured,
    /// Numeric arrays, shown as a summary and never edited in place
    Vector,
    Text,
}

impl CellKind {
    /// Pick the editing behavior for a column.
    ///
    /// The declared type wins; the value shape is only consulted for types
    /// nothing else claims, where a non-empty all-numeric array is a vector.
    pub fn classify(data_type: &str, nullable: bool, value: Option<&Value>) -> Self {
        let t = data_type.trim().to_lowercase();

        if t == "vector" || t.starts_with("vector(") {
            return Self::Vector;
        }
        if is_boolean_type(&t) {
            return Self::Boolean { nullable };
        }
        if t == "date" {
            return Self::Date;
        }
        if is_timestamp_type(&t) {
            return Self::Timestamp;
        }
        if is_integer_type(&t) {
            return Self::Numeric { integer: true };
        }
        if is_float_type(&t) {
            return Self::Numeric { integer: false };
        }
        if t == "json" || t == "jsonb" {
            return Self::Structured;
        }
        if value.and_then(Value::as_number_array).is_some() {
            return Self::Vector;
        }
        Self::Text
    }

    /// Short name, e.g. for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Boolean { .. } => "boolean",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
            Self::Numeric { .. } => "numeric",
            Self::Structured => "structured",
            Self::Vector => "vector",
            Self::Text => "text",
        }
    }

    pub fn is_editable(&self) -> bool {
        !matches!(self, Self::Vector)
    }
}

fn is_boolean_type(t: &str) -> bool {
    matches!(t, "bool" | "boolean" | "bit" | "tinyint(1)")
}

fn is_timestamp_type(t: &str) -> bool {
    t.starts_with("timestamp") || t.starts_with("datetime") || t == "smalldatetime"
}

fn is_integer_type(t: &str) -> bool {
    matches!(
        t,
        "int2"
            | "int4"
            | "int8"
            | "smallint"
            | "integer"
            | "bigint"
            | "int"
            | "mediumint"
            | "tinyint"
            | "serial"
            | "bigserial"
            | "smallserial"
    )
}

fn is_float_type(t: &str) -> bool {
    matches!(
        t,
        "float4" | "float8" | "real" | "double precision" | "double" | "float"
    ) || t == "numeric"
        || t == "decimal"
        || t.starts_with("numeric(")
        || t.starts_with("decimal(")
}

/// Why an input could not become a cell value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CellError {
    #[error("column '{column}' does not accept NULL")]
    NotNullable { column: String },

    #[error("column '{column}' is read-only in the editor")]
    ReadOnly { column: String },

    #[error("'{input}' is not a valid number for column '{column}'")]
    InvalidNumber { column: String, input: String },

    #[error("'{input}' is not a valid boolean for column '{column}'")]
    InvalidBoolean { column: String, input: String },

    #[error("'{input}' is not a valid date for column '{column}'")]
    InvalidDate { column: String, input: String },

    #[error("'{input}' is not a valid timestamp for column '{column}'")]
    InvalidTimestamp { column: String, input: String },

    #[error("invalid JSON for column '{column}': {message}")]
    InvalidJson { column: String, message: String },
}

/// Input rules for one column
#[derive(Debug, Clone, PartialEq)]
pub struct CellEditor {
    column: String,
    kind: CellKind,
    nullable: bool,
}

impl CellEditor {
    /// Editor for `column`, whose cell currently holds `current`
    pub fn new(column: &ColumnMeta, current: Option<&Value>) -> Self {
        Self {
            column: column.name.clone(),
            kind: CellKind::classify(&column.data_type, column.nullable, current),
            nullable: column.nullable,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn kind(&self) -> CellKind {
        self.kind
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    /// Explicit NULL, refused for non-nullable and read-only columns
    pub fn set_null(&self) -> Result<Value, CellError> {
        if !self.kind.is_editable() {
            return Err(self.read_only());
        }
        if !self.nullable {
            return Err(CellError::NotNullable {
                column: self.column.clone(),
            });
        }
        Ok(Value::Null)
    }

    /// Choices offered by a boolean editor; `None` stands for NULL
    pub fn boolean_choices(&self) -> Vec<Option<bool>> {
        match self.kind {
            CellKind::Boolean { nullable: true } => vec![Some(true), Some(false), None],
            CellKind::Boolean { nullable: false } => vec![Some(true), Some(false)],
            _ => Vec::new(),
        }
    }

    /// Turn typed input text into the value to record.
    ///
    /// Empty input is an empty string for text columns and NULL elsewhere.
    pub fn parse_input(&self, input: &str) -> Result<Value, CellError> {
        match self.kind {
            CellKind::Vector => Err(self.read_only()),
            CellKind::Text => Ok(Value::String(input.to_string())),
            _ if input.trim().is_empty() => self.set_null(),
            CellKind::Boolean { .. } => self.parse_boolean(input.trim()),
            CellKind::Numeric { integer } => self.parse_number(input.trim(), integer),
            CellKind::Date => self.parse_date(input.trim()),
            CellKind::Timestamp => self.parse_timestamp(input.trim()),
            CellKind::Structured => serde_json::from_str::<serde_json::Value>(input)
                .map(Value::from)
                .map_err(|e| CellError::InvalidJson {
                    column: self.column.clone(),
                    message: e.to_string(),
                }),
        }
    }

    /// Normalize an already-typed value, e.g. from a picker or a select.
    ///
    /// Strings go through [`CellEditor::parse_input`]; other values are kept
    /// when they fit the column.
    pub fn coerce(&self, value: Value) -> Result<Value, CellError> {
        if !self.kind.is_editable() {
            return Err(self.read_only());
        }
        match (self.kind, value) {
            (_, Value::Null) => self.set_null(),
            (CellKind::Text, value) => Ok(value),
            (_, Value::String(s)) => self.parse_input(&s),
            (CellKind::Boolean { .. }, Value::Bool(b)) => Ok(Value::Bool(b)),
            (CellKind::Numeric { integer: true }, Value::Int(i)) => Ok(Value::Int(i)),
            (CellKind::Numeric { integer: true }, Value::Float(f)) => {
                self.parse_number(&f.to_string(), true)
            }
            (CellKind::Numeric { integer: false }, v @ (Value::Int(_) | Value::Float(_))) => Ok(v),
            (CellKind::Structured, v) => Ok(v),
            (_, other) => self.parse_input(&other.coerced_string()),
        }
    }

    /// Text to pre-fill an input with
    pub fn format_for_input(&self, value: &Value) -> String {
        match (self.kind, value) {
            (_, Value::Null) => String::new(),
            (CellKind::Date, Value::String(s)) => self
                .parse_date(s)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| s.clone()),
            (CellKind::Timestamp, Value::String(s)) => self
                .parse_timestamp(s)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| s.clone()),
            (CellKind::Structured, v) => {
                serde_json::to_string_pretty(&v.to_json()).unwrap_or_else(|_| v.to_string())
            }
            (_, v) => v.to_string(),
        }
    }

    fn read_only(&self) -> CellError {
        CellError::ReadOnly {
            column: self.column.clone(),
        }
    }

    fn parse_boolean(&self, input: &str) -> Result<Value, CellError> {
        match input.to_lowercase().as_str() {
            "true" | "t" | "1" | "yes" | "y" | "on" => Ok(Value::Bool(true)),
            "false" | "f" | "0" | "no" | "n" | "off" => Ok(Value::Bool(false)),
            "null" => self.set_null(),
            _ => Err(CellError::InvalidBoolean {
                column: self.column.clone(),
                input: input.to_string(),
            }),
        }
    }

    fn parse_number(&self, input: &str, integer: bool) -> Result<Value, CellError> {
        if let Ok(i) = input.parse::<i64>() {
            return Ok(Value::Int(i));
        }
        let invalid = || CellError::InvalidNumber {
            column: self.column.clone(),
            input: input.to_string(),
        };
        let f = input.parse::<f64>().map_err(|_| invalid())?;
        if !f.is_finite() {
            return Err(invalid());
        }
        if integer {
            if f.fract() != 0.0 || f.abs() > i64::MAX as f64 {
                return Err(invalid());
            }
            return Ok(Value::Int(f as i64));
        }
        Ok(Value::Float(f))
    }

    fn parse_date(&self, input: &str) -> Result<Value, CellError> {
        let date = NaiveDate::parse_from_str(input, DATE_FORMAT)
            .ok()
            .or_else(|| parse_datetime(input).map(|dt| dt.date()))
            .ok_or_else(|| CellError::InvalidDate {
                column: self.column.clone(),
                input: input.to_string(),
            })?;
        Ok(Value::String(date.format(DATE_FORMAT).to_string()))
    }

    fn parse_timestamp(&self, input: &str) -> Result<Value, CellError> {
        let timestamp = parse_datetime(input)
            .or_else(|| {
                NaiveDate::parse_from_str(input, DATE_FORMAT)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
            .ok_or_else(|| CellError::InvalidTimestamp {
                column: self.column.clone(),
                input: input.to_string(),
            })?;
        Ok(Value::String(timestamp.format(TIMESTAMP_FORMAT).to_string()))
    }
}

/// Parse the date-time shapes stores and pickers hand back.
///
/// Offsets are dropped, keeping the wall-clock time as written.
fn parse_datetime(input: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.naive_local());
    }
    let input = input.strip_suffix(" UTC").unwrap_or(input);
    TIMESTAMP_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
}

/// Summary statistics shown in place of a vector's elements
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorSummary {
    pub dims: usize,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl VectorSummary {
    /// Summarize a non-empty all-numeric array; anything else has no summary
    pub fn from_value(value: &Value) -> Option<Self> {
        let elements = value.as_number_array()?;
        let dims = elements.len();
        let min = elements.iter().copied().fold(f64::INFINITY, f64::min);
        let max = elements.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = elements.iter().sum::<f64>() / dims as f64;
        Some(Self {
            dims,
            min,
            max,
            avg,
        })
    }
}
