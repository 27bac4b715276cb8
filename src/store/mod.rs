//! Persistence layer: the `Storage` trait and its libSQL backend.

pub mod libsql;
pub mod migrations;
pub mod traits;

pub use libsql::LibsqlStorage;
pub use traits::{ReminderStage, Storage};
