//! Backing store for EPOS records.
//!
//! The pipeline only talks to the store through the
//! [`IdentifierValidationService`](crate::pipeline::validator::IdentifierValidationService)
//! and [`BulkUpdateService`](crate::pipeline::updater::BulkUpdateService)
//! traits; [`sqlite::SqliteRecordStore`] implements both against a local
//! SQLite database.

pub mod sqlite;
