//! Soft deletion and finalizer bookkeeping.
//!
//! Records embed [`SoftDeleteFields`] (via `#[orm(flatten)]`): a nullable
//! `deleted_at` timestamp and a `finalizers` JSON object whose keys are the
//! finalizers currently holding the record. Soft-deleting sets `deleted_at`
//! in the database; a record is eligible for real removal once it is
//! soft-deleted and its finalizer set is empty.

use crate::args::Args;
use crate::bind::QueryText;
use crate::client::GenericClient;
use crate::error::{DbError, DbResult};
use crate::fields::{FieldCollector, Model};
use crate::querier::Querier;
use crate::row::RowExt;
use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use uuid::Uuid;

/// Embedded bookkeeping columns for soft-deletable tables.
///
/// Both columns are omitted on create: `deleted_at` starts null and
/// `finalizers` defaults to `{}` in the schema, and both are written back
/// from `returning`.
#[derive(Clone, Debug, Default)]
pub struct SoftDeleteFields {
    pub deleted_at: Option<DateTime<Utc>>,
    pub finalizers: serde_json::Value,
}

impl SoftDeleteFields {
    /// Names of the finalizers currently set.
    pub fn finalizers(&self) -> Vec<&str> {
        match self.finalizers.as_object() {
            Some(map) => map.keys().map(String::as_str).collect(),
            None => Vec::new(),
        }
    }

    pub fn has_finalizer(&self, name: &str) -> bool {
        self.finalizers
            .as_object()
            .is_some_and(|map| map.contains_key(name))
    }
}

impl Model for SoftDeleteFields {
    fn table_name() -> &'static str {
        "soft_delete_fields"
    }

    fn collect_fields(c: &mut FieldCollector) {
        c.column("deleted_at", true);
        c.column("finalizers", true);
    }

    fn field_value(&self, name: &str) -> Option<crate::SqlValue> {
        match name {
            "deleted_at" => Some(crate::SqlValue::new(self.deleted_at)),
            "finalizers" => Some(crate::SqlValue::new(self.finalizers.clone())),
            _ => None,
        }
    }

    fn write_back(&mut self, row: &Row) -> DbResult<()> {
        self.deleted_at = row.try_get_column("deleted_at")?;
        self.finalizers = row.try_get_column("finalizers")?;
        Ok(())
    }
}

impl crate::FromRow for SoftDeleteFields {
    fn from_row_prefixed(row: &Row, prefix: &str) -> DbResult<Self> {
        Ok(Self {
            deleted_at: row.try_get_column(crate::join_prefix(prefix, "deleted_at").as_str())?,
            finalizers: row.try_get_column(crate::join_prefix(prefix, "finalizers").as_str())?,
        })
    }
}

/// A model with embedded [`SoftDeleteFields`] and an integer primary key.
pub trait SoftDeletable: Model {
    fn id(&self) -> i64;
    fn soft_delete(&self) -> &SoftDeleteFields;
    fn soft_delete_mut(&mut self) -> &mut SoftDeleteFields;

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.soft_delete().deleted_at
    }

    fn has_finalizer(&self, name: &str) -> bool {
        self.soft_delete().has_finalizer(name)
    }
}

/// Mark exactly one row matching the filter map as deleted, using the
/// database clock.
pub async fn soft_delete<M, C>(q: &Querier<'_, C>, by: &Args) -> DbResult<()>
where
    M: Model,
    C: GenericClient,
{
    let updates = Args::new().raw("deleted_at", "current_timestamp");
    q.update_one::<M>(by, &updates).await
}

/// Soft-delete, but first prove a hard delete would succeed.
///
/// Inside a savepoint, the row is really deleted so that foreign-key
/// constraints fire; the savepoint is then rolled back and the row is
/// soft-deleted instead. Must run inside an open transaction. A constraint
/// violation from the probe delete propagates unchanged with the savepoint
/// still open, leaving the transaction in an aborted state; the caller is
/// expected to roll the transaction back.
pub async fn soft_delete_with_constraints<M, C>(q: &Querier<'_, C>, by: &Args) -> DbResult<()>
where
    M: Model,
    C: GenericClient,
{
    let savepoint = format!("s_{}", Uuid::new_v4().simple());
    q.execute_named(format!("savepoint {}", savepoint), &Args::new())
        .await?;

    q.delete_one::<M>(by).await?;
    q.execute_named(format!("rollback to savepoint {}", savepoint), &Args::new())
        .await?;

    soft_delete::<M, C>(q, by).await
}

/// Per-dialect finalizer patch: add (`true`) or strip (`null`) one key of the
/// `finalizers` JSON object and return the updated object.
fn finalizer_query() -> QueryText {
    QueryText::per_driver([
        (
            "postgres",
            "update @@table\n\
             set    finalizers = jsonb_strip_nulls(jsonb_set(to_jsonb(finalizers::json), '{@@key}', '@@value'))\n\
             where id = :id\n\
             returning finalizers",
        ),
        (
            "sqlite",
            "update @@table\n\
             set    finalizers = json_patch(finalizers, '{\"@@key\": @@value}')\n\
             where id = :id\n\
             returning finalizers",
        ),
    ])
}

async fn patch_finalizers<M, C>(
    q: &Querier<'_, C>,
    id: i64,
    finalizer: &str,
    present: bool,
) -> DbResult<serde_json::Value>
where
    M: Model,
    C: GenericClient,
{
    if finalizer.contains(|c: char| !c.is_ascii_alphanumeric() && c != '_' && c != '-' && c != '.')
    {
        return Err(DbError::bind(format!(
            "invalid finalizer name '{}'",
            finalizer
        )));
    }

    let args = Args::new()
        .value("id", id)
        .raw("@@table", format!("\"{}\"", M::table_name()))
        .raw("@@key", finalizer)
        .raw("@@value", if present { "true" } else { "null" });

    let row = q.query_one_named(finalizer_query(), &args).await?;
    row.try_get_column("finalizers")
}

/// Add a finalizer to a record, updating both the database row and the
/// record's in-memory finalizer set. No-op if already present.
pub async fn add_finalizer<M, C>(
    q: &Querier<'_, C>,
    record: &mut M,
    finalizer: &str,
) -> DbResult<()>
where
    M: SoftDeletable,
    C: GenericClient,
{
    if record.has_finalizer(finalizer) {
        return Ok(());
    }
    let updated = patch_finalizers::<M, C>(q, record.id(), finalizer, true).await?;
    record.soft_delete_mut().finalizers = updated;
    Ok(())
}

/// Remove a finalizer from a record, updating both the database row and the
/// record's in-memory finalizer set. No-op if not present.
pub async fn remove_finalizer<M, C>(
    q: &Querier<'_, C>,
    record: &mut M,
    finalizer: &str,
) -> DbResult<()>
where
    M: SoftDeletable,
    C: GenericClient,
{
    if !record.has_finalizer(finalizer) {
        return Ok(());
    }
    let updated = patch_finalizers::<M, C>(q, record.id(), finalizer, false).await?;
    record.soft_delete_mut().finalizers = updated;
    Ok(())
}
