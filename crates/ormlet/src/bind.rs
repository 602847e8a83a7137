//! Query text resolution and named-parameter binding.
//!
//! Queries are written with `:name` placeholders and rebound to the driver's
//! positional syntax (`$1, $2, ...`) at render time. Argument keys prefixed
//! with `@@` are compile-time text splices instead of bound parameters:
//! their raw value replaces the key in the query text before binding, which
//! allows dynamic table/column names inside otherwise-static templates.

use crate::args::{ArgValue, Args, SqlValue};
use crate::error::{DbError, DbResult};

/// Marker prefix for placeholder-substitution argument keys.
pub const SPLICE_PREFIX: &str = "@@";

/// A SQL template: one string, or one string per driver/dialect.
#[derive(Clone, Debug)]
pub enum QueryText {
    Sql(String),
    PerDriver(Vec<(String, String)>),
}

impl QueryText {
    /// Build a per-driver template map.
    pub fn per_driver<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::PerDriver(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Select the template for the given driver.
    ///
    /// A missing entry is a programming error (the deployment talks to a
    /// driver the query was never written for), surfaced as
    /// [`DbError::UnknownDriver`].
    pub fn resolve(&self, driver: &str) -> DbResult<&str> {
        match self {
            Self::Sql(sql) => Ok(sql),
            Self::PerDriver(entries) => entries
                .iter()
                .find(|(name, _)| name == driver)
                .map(|(_, sql)| sql.as_str())
                .ok_or_else(|| DbError::UnknownDriver(driver.to_string())),
        }
    }
}

impl From<&str> for QueryText {
    fn from(sql: &str) -> Self {
        Self::Sql(sql.to_string())
    }
}

impl From<String> for QueryText {
    fn from(sql: String) -> Self {
        Self::Sql(sql)
    }
}

/// Apply `@@` splices, returning the rewritten SQL. Spliced keys are excluded
/// from subsequent binding.
fn splice_placeholders(sql: &str, args: &Args) -> DbResult<String> {
    let mut out = sql.to_string();
    for (name, value) in args.iter() {
        if !name.starts_with(SPLICE_PREFIX) {
            continue;
        }
        let ArgValue::Raw(text) = value else {
            return Err(DbError::bind(format!(
                "splice argument '{}' must be a raw fragment",
                name
            )));
        };
        out = out.replace(name, text);
    }
    Ok(out)
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Resolve a template against a driver and rewrite `:name` placeholders to
/// `$1, $2, ...`, returning the final SQL and the bound values in placeholder
/// order. Repeated names share one ordinal. `::` casts and single-quoted
/// literals are left untouched.
pub fn bind_named(query: &QueryText, driver: &str, args: &Args) -> DbResult<(String, Vec<SqlValue>)> {
    let sql = query.resolve(driver)?;
    let sql = splice_placeholders(sql, args)?;

    let mut out = String::with_capacity(sql.len());
    let mut values: Vec<SqlValue> = Vec::new();
    let mut ordinals: Vec<(String, usize)> = Vec::new();

    let mut chars = sql.chars().peekable();
    let mut in_string = false;
    while let Some(c) = chars.next() {
        if c == '\'' {
            in_string = !in_string;
            out.push(c);
            continue;
        }
        if in_string || c != ':' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&':') {
            // `::` cast, not a placeholder
            chars.next();
            out.push_str("::");
            continue;
        }

        let mut name = String::new();
        while let Some(&n) = chars.peek() {
            if !is_name_char(n) {
                break;
            }
            name.push(n);
            chars.next();
        }
        if name.is_empty() {
            out.push(':');
            continue;
        }

        let ordinal = match ordinals.iter().find(|(n, _)| *n == name) {
            Some(&(_, ordinal)) => ordinal,
            None => {
                let value = match args.get(&name) {
                    Some(ArgValue::Bind(value)) => value.clone(),
                    Some(other) => {
                        return Err(DbError::bind(format!(
                            "argument '{}' cannot be bound as a parameter: {:?}",
                            name, other
                        )));
                    }
                    None => {
                        return Err(DbError::bind(format!(
                            "missing argument for placeholder ':{}'",
                            name
                        )));
                    }
                };
                values.push(value);
                let ordinal = values.len();
                ordinals.push((name.clone(), ordinal));
                ordinal
            }
        };
        out.push('$');
        out.push_str(&ordinal.to_string());
    }

    Ok((out, values))
}
