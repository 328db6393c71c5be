//! Account-store schema, migrations, and query builders.
//!
//! The server executes the built `(sql, values)` pairs against SQLite.

pub mod migrations;
pub mod tables;
pub mod users;

pub use tables::*;
