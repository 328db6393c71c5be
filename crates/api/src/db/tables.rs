//! Compile-time–checked column identifiers.

use sea_query::Iden;

#[derive(Iden)]
pub enum Users {
    Table,
    Id,
    Username,
    Password,
    CreatedAt,
}
