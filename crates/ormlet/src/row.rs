//! Row mapping traits and utilities

use crate::error::{DbError, DbResult};
use tokio_postgres::types::FromSql;
use tokio_postgres::Row;

/// Join a logical name prefix and a field name with a dot.
///
/// An empty prefix yields the bare name; this is how top-level fields keep
/// their plain column names while joined fields get `parent.column` aliases.
pub fn join_prefix(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

/// Trait for mapping a database row to a struct.
///
/// Usually derived via `#[derive(FromRow)]`. Joined child models decode from
/// dot-prefixed column aliases (e.g. `group.name`), which is what
/// [`from_row_prefixed`](FromRow::from_row_prefixed) is for.
pub trait FromRow: Sized {
    /// Map a row to `Self` using unprefixed column names.
    fn from_row(row: &Row) -> DbResult<Self> {
        Self::from_row_prefixed(row, "")
    }

    /// Map a row to `Self`, reading columns under the given logical prefix.
    fn from_row_prefixed(row: &Row, prefix: &str) -> DbResult<Self>;
}

/// Extension methods on [`tokio_postgres::Row`].
pub trait RowExt {
    /// Get a column value by name, wrapping decode failures in
    /// [`DbError::Decode`].
    fn try_get_column<'a, T: FromSql<'a>>(&'a self, column: &str) -> DbResult<T>;
}

impl RowExt for Row {
    fn try_get_column<'a, T: FromSql<'a>>(&'a self, column: &str) -> DbResult<T> {
        self.try_get(column)
            .map_err(|e| DbError::decode(column, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_prefix_empty() {
        assert_eq!(join_prefix("", "name"), "name");
    }

    #[test]
    fn join_prefix_nested() {
        assert_eq!(join_prefix("group", "name"), "group.name");
        assert_eq!(join_prefix("a.b", "c"), "a.b.c");
    }
}
