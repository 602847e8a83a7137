//! Named arguments and filter/update value wrappers.
//!
//! [`Args`] is an insertion-ordered map from logical field name to an
//! [`ArgValue`]. Insertion order is preserved all the way into the rendered
//! SQL, so equivalent calls produce identical query text.

use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// An owned, shareable SQL parameter value.
#[derive(Clone)]
pub struct SqlValue(Arc<dyn ToSql + Sync + Send>);

impl SqlValue {
    pub fn new<T>(value: T) -> Self
    where
        T: ToSql + Sync + Send + 'static,
    {
        Self(Arc::new(value))
    }

    /// Parameter reference compatible with `tokio-postgres`.
    pub fn as_param(&self) -> &(dyn ToSql + Sync) {
        self.0.as_ref() as &(dyn ToSql + Sync)
    }
}

impl std::fmt::Debug for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SqlValue(..)")
    }
}

/// One entry in an argument map.
#[derive(Clone, Debug)]
pub enum ArgValue {
    /// A plain value, bound through a named placeholder. In a WHERE position
    /// this renders as an equality comparison.
    Bind(SqlValue),
    /// Explicit null. In a WHERE position this renders as `is null` with no
    /// bound argument; in a SET position it renders as a literal `null`.
    Null,
    /// A raw SQL fragment, spliced verbatim. The caller must ensure the
    /// fragment is safe; it bypasses parameter binding entirely.
    Raw(String),
    /// Entry is skipped entirely; the field does not appear in the rendered
    /// SQL at all.
    Omit,
}

impl ArgValue {
    /// Wrap an optional value: `Some` binds, `None` is skipped entirely.
    pub fn omit_if_none<T>(value: Option<T>) -> Self
    where
        T: ToSql + Sync + Send + 'static,
    {
        match value {
            Some(v) => Self::Bind(SqlValue::new(v)),
            None => Self::Omit,
        }
    }

    /// Filter helper: `true` requires the column to be null, `false` puts no
    /// constraint on it at all.
    ///
    /// Typical use is scoping queries to non-deleted rows only on demand.
    pub fn null_or_omit(require_null: bool) -> Self {
        if require_null {
            Self::Raw("is null".to_string())
        } else {
            Self::Omit
        }
    }
}

/// Insertion-ordered named-argument map.
#[derive(Clone, Debug, Default)]
pub struct Args {
    entries: Vec<(String, ArgValue)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an entry, replacing any previous entry with the same name.
    pub fn set(mut self, name: impl Into<String>, value: ArgValue) -> Self {
        let name = name.into();
        if let Some(existing) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            existing.1 = value;
        } else {
            self.entries.push((name, value));
        }
        self
    }

    /// Bind a plain value.
    pub fn value<T>(self, name: impl Into<String>, value: T) -> Self
    where
        T: ToSql + Sync + Send + 'static,
    {
        self.set(name, ArgValue::Bind(SqlValue::new(value)))
    }

    /// Bind `Some` as a plain value, `None` as an explicit null.
    pub fn opt<T>(self, name: impl Into<String>, value: Option<T>) -> Self
    where
        T: ToSql + Sync + Send + 'static,
    {
        match value {
            Some(v) => self.value(name, v),
            None => self.null(name),
        }
    }

    /// Bind `Some` as a plain value; `None` omits the entry entirely.
    pub fn omit_if_none<T>(self, name: impl Into<String>, value: Option<T>) -> Self
    where
        T: ToSql + Sync + Send + 'static,
    {
        self.set(name, ArgValue::omit_if_none(value))
    }

    /// Set an explicit null.
    pub fn null(self, name: impl Into<String>) -> Self {
        self.set(name, ArgValue::Null)
    }

    /// Splice a raw SQL fragment verbatim.
    ///
    /// Also used for `@@` placeholder-substitution keys, whose values are
    /// spliced into the query text before named binding.
    pub fn raw(self, name: impl Into<String>, sql: impl Into<String>) -> Self {
        self.set(name, ArgValue::Raw(sql.into()))
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Append all entries of `other`, replacing same-named entries.
    pub fn merge(mut self, other: Args) -> Self {
        for (name, value) in other.entries {
            self = self.set(name, value);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_order_is_preserved() {
        let args = Args::new().value("b", 1_i64).value("a", 2_i64).null("c");
        let names: Vec<_> = args.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn set_replaces_in_place() {
        let args = Args::new().value("a", 1_i64).value("b", 2_i64).null("a");
        let names: Vec<_> = args.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(matches!(args.get("a"), Some(ArgValue::Null)));
    }

    #[test]
    fn omit_if_none_skips_unset() {
        assert!(matches!(
            ArgValue::omit_if_none(Option::<i64>::None),
            ArgValue::Omit
        ));
        assert!(matches!(
            ArgValue::omit_if_none(Some(5_i64)),
            ArgValue::Bind(_)
        ));
    }

    #[test]
    fn null_or_omit() {
        assert!(matches!(ArgValue::null_or_omit(false), ArgValue::Omit));
        match ArgValue::null_or_omit(true) {
            ArgValue::Raw(sql) => assert_eq!(sql, "is null"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
