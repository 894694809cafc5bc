//! rowdesk core - shared types and traits for the table editor
//!
//! This crate provides the fundamental types that every other rowdesk crate
//! depends on. It defines:
//!
//! - `RemoteTableSource` - Trait for the backing store that executes fetches and updates
//! - `Value`, `Row`, `ColumnMeta`, `TableData` - Cell values and fetched table data
//! - `PrimaryKey`, `Change` - Row identity and one row's uncommitted edits
//! - `Filter`, `Sort`, `QuerySpec` - Normalized fetch parameters
//! - `CellKind`, `CellEditor` - Per-column editing and coercion rules

pub mod cell;
mod change;
mod error;
mod query;
mod source;
mod types;

pub use cell::{CellEditor, CellError, CellKind, VectorSummary};
pub use change::*;
pub use error::*;
pub use query::*;
pub use source::*;
pub use types::*;
