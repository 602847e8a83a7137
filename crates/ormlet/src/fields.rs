//! Model field metadata: descriptors, the collector walk, and the `Model`
//! trait that derive macros implement.
//!
//! The field map for a type is assembled once by walking its
//! [`Model::collect_fields`] implementation (generated by
//! `#[derive(Model)]`) and is then cached for the lifetime of the process by
//! [`ModelRegistry`](crate::ModelRegistry).

use crate::args::SqlValue;
use crate::error::DbResult;
use crate::row::join_prefix;
use std::collections::HashMap;
use tokio_postgres::Row;

/// One mapped column of a model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Logical field name: the column name, dot-prefixed for joined fields
    /// (e.g. `group.name`).
    pub name: String,
    /// Qualified select expression, e.g. `"user"."name"`.
    pub select_expr: String,
    /// Excluded from INSERT column/value lists (still read back via
    /// RETURNING).
    pub omit_create: bool,
}

impl FieldDescriptor {
    /// Whether this field lives in a joined table rather than the model's own.
    pub fn is_joined(&self) -> bool {
        self.name.contains('.')
    }
}

/// A declared relation to another table, rendered as a SQL left join.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinDescriptor {
    pub left_table: String,
    pub right_table: String,
    pub left_id: String,
    pub right_id: String,
}

/// Overrides for a join declaration; unset parts fall back to the
/// parent/child table names and the literal column `id`.
#[derive(Clone, Debug, Default)]
pub struct JoinSpec {
    pub left_table: Option<&'static str>,
    pub right_table: Option<&'static str>,
    pub left_id: Option<&'static str>,
    pub right_id: Option<&'static str>,
}

/// The flattened field map and join list of one model type.
#[derive(Debug, Default)]
pub struct ModelFields {
    fields: Vec<FieldDescriptor>,
    by_name: HashMap<String, usize>,
    joins: Vec<JoinDescriptor>,
}

impl ModelFields {
    /// Leaf fields in discovery order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Joins in discovery order.
    pub fn joins(&self) -> &[JoinDescriptor] {
        &self.joins
    }

    /// Look up a field by its logical name.
    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }
}

/// Accumulates field descriptors while walking a model's shape.
///
/// Passed to [`Model::collect_fields`]; the generated implementation calls
/// [`column`](Self::column), [`flatten`](Self::flatten) and
/// [`join`](Self::join) for each mapped struct field.
pub struct FieldCollector {
    table: String,
    prefix: String,
    out: ModelFields,
}

impl FieldCollector {
    pub(crate) fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            prefix: String::new(),
            out: ModelFields::default(),
        }
    }

    /// Record a leaf column in the current table context.
    ///
    /// Duplicate logical names are a programming error in the model
    /// declaration; the later declaration wins, matching map-overwrite
    /// semantics.
    pub fn column(&mut self, column: &str, omit_create: bool) {
        let name = join_prefix(&self.prefix, column);
        let descriptor = FieldDescriptor {
            select_expr: format!(r#""{}"."{}""#, self.table, column),
            name: name.clone(),
            omit_create,
        };
        if let Some(&i) = self.out.by_name.get(&name) {
            self.out.fields[i] = descriptor;
        } else {
            self.out.by_name.insert(name, self.out.fields.len());
            self.out.fields.push(descriptor);
        }
    }

    /// Merge an embedded model's fields into the current namespace, with no
    /// prefix and the same table context.
    pub fn flatten<M: Model>(&mut self) {
        M::collect_fields(self);
    }

    /// Record a join relation and collect the child's fields under the given
    /// logical prefix, qualified by the joined table.
    pub fn join<M: Model>(&mut self, field_name: &str, spec: JoinSpec) {
        let join = JoinDescriptor {
            left_table: spec
                .left_table
                .map(str::to_string)
                .unwrap_or_else(|| self.table.clone()),
            right_table: spec
                .right_table
                .map(str::to_string)
                .unwrap_or_else(|| M::table_name().to_string()),
            left_id: spec.left_id.unwrap_or("id").to_string(),
            right_id: spec.right_id.unwrap_or("id").to_string(),
        };
        let right_table = join.right_table.clone();
        self.out.joins.push(join);

        let saved_table = std::mem::replace(&mut self.table, right_table);
        let saved_prefix = std::mem::replace(&mut self.prefix, String::new());
        self.prefix = join_prefix(&saved_prefix, field_name);
        M::collect_fields(self);
        self.table = saved_table;
        self.prefix = saved_prefix;
    }

    pub(crate) fn finish(self) -> ModelFields {
        self.out
    }
}

/// A record type mapped to a database table.
///
/// Implemented via `#[derive(Model)]`. The derive generates the field walk
/// plus statically-typed accessors replacing the reflective value access of
/// classic ORMs.
pub trait Model: Sized + Send + Sync + 'static {
    /// Table name: lower-snake-case type name unless overridden with
    /// `#[orm(table = "...")]`.
    fn table_name() -> &'static str;

    /// Walk the model's shape, recording columns, flattened embeds and joins.
    fn collect_fields(collector: &mut FieldCollector);

    /// Read the value of a leaf field by its logical name.
    ///
    /// Returns `None` for unknown names and for joined fields (which are
    /// never written directly).
    fn field_value(&self, name: &str) -> Option<SqlValue>;

    /// Write returned column values back into this record.
    ///
    /// Covers every non-joined leaf field (including flattened embeds); this
    /// is how generated ids and defaulted timestamps propagate back after
    /// `create`.
    fn write_back(&mut self, row: &Row) -> DbResult<()>;
}

/// Compute the full field map for `M`. Use
/// [`ModelRegistry`](crate::ModelRegistry) instead of calling this directly;
/// the registry caches the result per type.
pub(crate) fn collect_model_fields<M: Model>() -> ModelFields {
    let mut collector = FieldCollector::new(M::table_name());
    M::collect_fields(&mut collector);
    collector.finish()
}
