//! Canonical migration definitions.

/// A named migration: `(name, sql)`.
pub type Migration = (&'static str, &'static str);

/// Applied in order by the server on startup.
pub const MIGRATIONS: &[Migration] = &[(
    "0001_users",
    include_str!("../../migrations/0001_users.sql"),
)];
