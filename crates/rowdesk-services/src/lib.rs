//! rowdesk services layer
//!
//! Everything between the UI and the backing store for browsing and editing
//! one table at a time.
//!
//! ```text
//! UI
//!     ↓
//! Service Layer (rowdesk-services) ← This crate
//!     ↓
//! rowdesk-core (types, RemoteTableSource)
//! ```
//!
//! # Services
//!
//! - [`PendingChangeStore`] - Uncommitted edits, one entry per row
//! - [`materialize`] - Pending edits overlaid onto fetched rows
//! - [`QuerySpecBuilder`] - Draft/active filters and sorts
//! - [`ChangeApplier`] - Commits pending edits and reconciles the result
//! - [`TableSession`] - Navigation, paging and editing state tying it together

mod applier;
mod error;
pub mod logging;
mod materialize;
mod pending;
mod query_spec;
mod table_session;

pub use applier::{ApplyBatch, ApplyReport, ChangeApplier};
pub use error::{ServiceError, ServiceResult};
pub use materialize::{DisplayRow, materialize};
pub use pending::{EditOutcome, PendingChangeStore, ReviewEntry};
pub use query_spec::QuerySpecBuilder;
pub use table_session::{
    ApplyFinished, FetchKey, FetchOutcome, FetchPayload, FetchResponse, FetchTicket,
    SessionConfig, SessionErrors, TableSession,
};
