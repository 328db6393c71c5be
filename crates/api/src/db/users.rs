//! User query builders.

use sea_query::{Expr, Query, SqliteQueryBuilder};

use super::tables::Users;

pub type Built = (String, sea_query::Values);

/// Insert a user with an encoded password hash.
pub fn insert(username: &str, password_hash: &str) -> Built {
    Query::insert()
        .into_table(Users::Table)
        .columns([Users::Username, Users::Password])
        .values_panic([username.into(), password_hash.into()])
        .build(SqliteQueryBuilder)
}

/// Find user by username for login (returns id, username, password).
pub fn get_by_username(username: &str) -> Built {
    Query::select()
        .columns([Users::Id, Users::Username, Users::Password])
        .from(Users::Table)
        .and_where(Expr::col(Users::Username).eq(username))
        .build(SqliteQueryBuilder)
}
