//! Querier: model-aware SQL rendering and execution.
//!
//! The builders in this module are pure: they turn a model's field map plus
//! caller arguments into SQL text with `:name` placeholders and an argument
//! set. [`Querier`] pairs them with a [`GenericClient`] and a
//! [`ModelRegistry`] to execute the result. Each call is a stateless
//! transformation; the querier holds no connection state and never manages
//! transactions.

use crate::args::{ArgValue, Args, SqlValue};
use crate::bind::{bind_named, QueryText};
use crate::client::GenericClient;
use crate::error::{DbError, DbResult};
use crate::fields::{Model, ModelFields};
use crate::registry::ModelRegistry;
use crate::row::FromRow;
use std::sync::Arc;
use tokio_postgres::Row;

/// Render a WHERE clause from a filter map.
///
/// Returns the clause text (without the `where` keyword) and the arguments to
/// bind. Per entry: omitted wrappers are skipped entirely, explicit nulls
/// render `is null` with no bound argument, raw fragments are inlined
/// verbatim, and plain values render as equality against a `_where_`-prefixed
/// named placeholder. Entries combine with `and` in insertion order.
pub fn build_where(fields: &ModelFields, by: &Args) -> DbResult<(String, Args)> {
    let mut conditions: Vec<String> = Vec::new();
    let mut args = Args::new();

    for (name, value) in by.iter() {
        let field = fields
            .get(name)
            .ok_or_else(|| DbError::MissingField(name.to_string()))?;

        match value {
            ArgValue::Omit => continue,
            ArgValue::Raw(sql) => {
                conditions.push(format!("{} {}", field.select_expr, sql));
            }
            ArgValue::Null => {
                conditions.push(format!("{} is null", field.select_expr));
            }
            ArgValue::Bind(v) => {
                let arg_name = format!("_where_{}", field.name);
                conditions.push(format!("{} = :{}", field.select_expr, arg_name));
                args = args.set(arg_name, ArgValue::Bind(v.clone()));
            }
        }
    }

    Ok((conditions.join(" and "), args))
}

/// Render a SELECT statement: every leaf projected as
/// `"table"."column" as "logical_name"`, left joins in discovery order, and
/// an optional pre-rendered WHERE clause.
pub fn build_select<M: Model>(fields: &ModelFields, where_sql: &str) -> String {
    let selects: Vec<String> = fields
        .fields()
        .iter()
        .map(|f| format!(r#"{} as "{}""#, f.select_expr, f.name))
        .collect();

    let mut query = format!("select {}", selects.join(",\n  "));
    query.push_str(&format!("\nfrom \"{}\"", M::table_name()));
    for j in fields.joins() {
        query.push_str(&format!(
            "\n  left join \"{}\" on \"{}\".\"{}\" = \"{}\".\"{}\"",
            j.right_table, j.left_table, j.left_id, j.right_table, j.right_id
        ));
    }
    if !where_sql.is_empty() {
        query.push_str(&format!("\nwhere {}", where_sql));
    }
    query
}

/// Render an INSERT statement for a record, with values taken from the
/// record's own fields.
///
/// Omit-on-create fields stay out of the column list but are still read back:
/// the `returning` clause lists every non-joined leaf so generated values
/// (ids, defaulted timestamps) can be written back into the record. With
/// `conflict_constraint` set, an upsert clause updates every insertable
/// column from `excluded`.
pub fn build_insert<M: Model>(
    fields: &ModelFields,
    record: &M,
    conflict_constraint: Option<&str>,
) -> DbResult<(String, Args)> {
    let mut columns: Vec<&str> = Vec::new();
    let mut placeholders: Vec<String> = Vec::new();
    let mut conflict_sets: Vec<String> = Vec::new();
    let mut returning: Vec<&str> = Vec::new();
    let mut args = Args::new();

    for field in fields.fields() {
        if field.is_joined() {
            continue;
        }
        returning.push(&field.name);
        if field.omit_create {
            continue;
        }

        let value = record
            .field_value(&field.name)
            .ok_or_else(|| DbError::MissingField(field.name.clone()))?;
        columns.push(&field.name);
        placeholders.push(format!(":{}", field.name));
        conflict_sets.push(format!("{} = excluded.{}", field.name, field.name));
        args = args.set(field.name.clone(), ArgValue::Bind(value));
    }

    let mut query = format!(
        "insert into \"{}\" ({}) values({})",
        M::table_name(),
        columns.join(", "),
        placeholders.join(", "),
    );
    if let Some(constraint) = conflict_constraint {
        query.push_str(&format!(
            " on conflict({}) do update set {}",
            constraint,
            conflict_sets.join(", "),
        ));
    }
    query.push_str(&format!(" returning {}", returning.join(", ")));

    Ok((query, args))
}

/// Render an UPDATE statement from a mapping of logical field name to new
/// value plus a pre-rendered WHERE clause.
///
/// Raw fragments are inlined on the right-hand side of their assignment;
/// explicit nulls render a literal `null`; plain values bind through
/// `_set_`-prefixed placeholders.
pub fn build_update<M: Model>(
    fields: &ModelFields,
    where_sql: &str,
    updates: &Args,
) -> DbResult<(String, Args)> {
    let mut sets: Vec<String> = Vec::new();
    let mut args = Args::new();

    for (name, value) in updates.iter() {
        let field = fields
            .get(name)
            .ok_or_else(|| DbError::MissingField(name.to_string()))?;

        match value {
            ArgValue::Omit => continue,
            ArgValue::Raw(sql) => sets.push(format!("{} = {}", field.name, sql)),
            ArgValue::Null => sets.push(format!("{} = null", field.name)),
            ArgValue::Bind(v) => {
                let arg_name = format!("_set_{}", field.name);
                sets.push(format!("{} = :{}", field.name, arg_name));
                args = args.set(arg_name, ArgValue::Bind(v.clone()));
            }
        }
    }

    let query = format!(
        "update \"{}\" set {} where {}",
        M::table_name(),
        sets.join(", "),
        where_sql,
    );
    Ok((query, args))
}

/// Render a DELETE statement with a pre-rendered WHERE clause.
pub fn build_delete<M: Model>(where_sql: &str) -> String {
    format!("delete from \"{}\" where {}", M::table_name(), where_sql)
}

/// Model-aware query executor.
///
/// Borrows an executor (plain connection or open transaction) and a field-map
/// registry. Cancellation follows the normal async contract: dropping an
/// operation's future aborts the underlying database call.
pub struct Querier<'a, C> {
    client: &'a C,
    registry: &'a ModelRegistry,
}

impl<'a, C: GenericClient> Querier<'a, C> {
    /// Create a querier backed by the shared global registry.
    pub fn new(client: &'a C) -> Self {
        Self {
            client,
            registry: ModelRegistry::global(),
        }
    }

    /// Create a querier with an explicit registry.
    pub fn with_registry(client: &'a C, registry: &'a ModelRegistry) -> Self {
        Self { client, registry }
    }

    pub fn client(&self) -> &'a C {
        self.client
    }

    pub fn registry(&self) -> &'a ModelRegistry {
        self.registry
    }

    fn fields<M: Model>(&self) -> Arc<ModelFields> {
        self.registry.get::<M>()
    }

    // ==================== Raw named-query APIs ====================

    async fn bound(&self, query: &QueryText, args: &Args) -> DbResult<(String, Vec<SqlValue>)> {
        let (sql, values) = bind_named(query, self.client.driver_name(), args)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(sql = %sql, params = values.len(), "executing query");
        Ok((sql, values))
    }

    /// Execute a named-placeholder query and return all rows.
    pub async fn query_named(
        &self,
        query: impl Into<QueryText>,
        args: &Args,
    ) -> DbResult<Vec<Row>> {
        let (sql, values) = self.bound(&query.into(), args).await?;
        let params: Vec<_> = values.iter().map(|v| v.as_param()).collect();
        self.client.query(&sql, &params).await
    }

    /// Execute a named-placeholder query and return the first row.
    ///
    /// Returns [`DbError::NotFound`] if no rows are returned.
    pub async fn query_one_named(
        &self,
        query: impl Into<QueryText>,
        args: &Args,
    ) -> DbResult<Row> {
        let (sql, values) = self.bound(&query.into(), args).await?;
        let params: Vec<_> = values.iter().map(|v| v.as_param()).collect();
        self.client.query_one(&sql, &params).await
    }

    /// Execute a named-placeholder query and map the first row to `T`.
    pub async fn get_named<T: FromRow>(
        &self,
        query: impl Into<QueryText>,
        args: &Args,
    ) -> DbResult<T> {
        let row = self.query_one_named(query, args).await?;
        T::from_row(&row)
    }

    /// Execute a named-placeholder query and map all rows to `T`.
    pub async fn select_named<T: FromRow>(
        &self,
        query: impl Into<QueryText>,
        args: &Args,
    ) -> DbResult<Vec<T>> {
        let rows = self.query_named(query, args).await?;
        rows.iter().map(T::from_row).collect()
    }

    /// Execute a named-placeholder statement and return the affected count.
    pub async fn execute_named(
        &self,
        query: impl Into<QueryText>,
        args: &Args,
    ) -> DbResult<u64> {
        let (sql, values) = self.bound(&query.into(), args).await?;
        let params: Vec<_> = values.iter().map(|v| v.as_param()).collect();
        self.client.execute(&sql, &params).await
    }

    /// Execute a statement that must affect exactly one row.
    ///
    /// Zero affected rows is [`DbError::NotFound`]; more than one is
    /// [`DbError::UnexpectedRowCount`].
    pub async fn execute_one_named(
        &self,
        query: impl Into<QueryText>,
        args: &Args,
    ) -> DbResult<()> {
        let affected = self.execute_named(query, args).await?;
        match affected {
            1 => Ok(()),
            0 => Err(DbError::not_found("no rows affected")),
            got => Err(DbError::UnexpectedRowCount { expected: 1, got }),
        }
    }

    // ==================== Select ====================

    /// Fetch one record matching the filter map.
    pub async fn get_one<M: Model + FromRow>(&self, by: &Args) -> DbResult<M> {
        let fields = self.fields::<M>();
        let (where_sql, args) = build_where(&fields, by)?;
        self.get_one_where(&where_sql, &args).await
    }

    /// Fetch one record matching a pre-rendered WHERE clause.
    pub async fn get_one_where<M: Model + FromRow>(
        &self,
        where_sql: &str,
        args: &Args,
    ) -> DbResult<M> {
        let fields = self.fields::<M>();
        let query = build_select::<M>(&fields, where_sql);
        self.get_named(query, args).await
    }

    /// Fetch all records matching the filter map.
    pub async fn get_many<M: Model + FromRow>(&self, by: &Args) -> DbResult<Vec<M>> {
        let fields = self.fields::<M>();
        let (where_sql, args) = build_where(&fields, by)?;
        self.get_many_where(&where_sql, &args).await
    }

    /// Fetch all records matching a pre-rendered WHERE clause.
    pub async fn get_many_where<M: Model + FromRow>(
        &self,
        where_sql: &str,
        args: &Args,
    ) -> DbResult<Vec<M>> {
        let fields = self.fields::<M>();
        let query = build_select::<M>(&fields, where_sql);
        self.select_named(query, args).await
    }

    // ==================== Insert ====================

    /// Insert a record, writing generated column values (ids, defaulted
    /// timestamps) back into it.
    pub async fn create<M: Model>(&self, record: &mut M) -> DbResult<()> {
        self.create_inner(record, None).await
    }

    /// Insert a record with an upsert clause on the given constraint,
    /// writing returned column values back into it.
    pub async fn create_or_update<M: Model>(
        &self,
        record: &mut M,
        constraint: &str,
    ) -> DbResult<()> {
        self.create_inner(record, Some(constraint)).await
    }

    async fn create_inner<M: Model>(
        &self,
        record: &mut M,
        constraint: Option<&str>,
    ) -> DbResult<()> {
        let fields = self.fields::<M>();
        let (query, args) = build_insert(&fields, &*record, constraint)?;
        let row = self.query_one_named(query, &args).await?;
        record.write_back(&row)
    }

    // ==================== Update ====================

    /// Update exactly one row matching the filter map.
    pub async fn update_one<M: Model>(&self, by: &Args, updates: &Args) -> DbResult<()> {
        let fields = self.fields::<M>();
        let (where_sql, where_args) = build_where(&fields, by)?;
        self.update_one_where::<M>(&where_sql, &where_args, updates)
            .await
    }

    /// Update exactly one row matching a pre-rendered WHERE clause.
    pub async fn update_one_where<M: Model>(
        &self,
        where_sql: &str,
        where_args: &Args,
        updates: &Args,
    ) -> DbResult<()> {
        let fields = self.fields::<M>();
        let (query, set_args) = build_update::<M>(&fields, where_sql, updates)?;
        let args = where_args.clone().merge(set_args);
        self.execute_one_named(query, &args).await
    }

    /// Update the named fields of a record, selected by its `id` field,
    /// taking the new values from the record itself.
    pub async fn update_one_from_record<M: Model>(
        &self,
        record: &M,
        field_names: &[&str],
    ) -> DbResult<()> {
        let id = record
            .field_value("id")
            .ok_or_else(|| DbError::MissingField("id".to_string()))?;
        let by = Args::new().set("id", ArgValue::Bind(id));

        let mut updates = Args::new();
        for name in field_names {
            let value = record
                .field_value(name)
                .ok_or_else(|| DbError::MissingField(name.to_string()))?;
            updates = updates.set(name.to_string(), ArgValue::Bind(value));
        }
        self.update_one::<M>(&by, &updates).await
    }

    // ==================== Delete ====================

    /// Delete exactly one row matching the filter map.
    pub async fn delete_one<M: Model>(&self, by: &Args) -> DbResult<()> {
        let fields = self.fields::<M>();
        let (where_sql, args) = build_where(&fields, by)?;
        self.delete_one_where::<M>(&where_sql, &args).await
    }

    /// Delete exactly one row by its `id` column.
    pub async fn delete_one_by_id<M: Model>(&self, id: i64) -> DbResult<()> {
        self.delete_one::<M>(&Args::new().value("id", id)).await
    }

    /// Delete exactly one row matching a pre-rendered WHERE clause.
    pub async fn delete_one_where<M: Model>(&self, where_sql: &str, args: &Args) -> DbResult<()> {
        let query = build_delete::<M>(where_sql);
        self.execute_one_named(query, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::tests::{Group, User};
    use crate::fields::{FieldCollector, Model};
    use crate::row::RowExt;

    fn fields_of<M: Model>() -> Arc<ModelFields> {
        ModelRegistry::global().get::<M>()
    }

    // The `User { id omitCreate, name }` shape from the round-trip scenario.
    struct PlainUser {
        id: i64,
        name: String,
    }

    impl Model for PlainUser {
        fn table_name() -> &'static str {
            "user"
        }
        fn collect_fields(c: &mut FieldCollector) {
            c.column("id", true);
            c.column("name", false);
        }
        fn field_value(&self, name: &str) -> Option<SqlValue> {
            match name {
                "id" => Some(SqlValue::new(self.id)),
                "name" => Some(SqlValue::new(self.name.clone())),
                _ => None,
            }
        }
        fn write_back(&mut self, row: &Row) -> DbResult<()> {
            self.id = row.try_get_column("id")?;
            self.name = row.try_get_column("name")?;
            Ok(())
        }
    }

    #[test]
    fn where_equality_binds_named_placeholder() {
        let fields = fields_of::<Group>();
        let by = Args::new().value("name", "admins");
        let (sql, args) = build_where(&fields, &by).unwrap();
        assert_eq!(sql, r#""group"."name" = :_where_name"#);
        assert!(matches!(args.get("_where_name"), Some(ArgValue::Bind(_))));
    }

    #[test]
    fn where_null_renders_is_null_with_no_argument() {
        let fields = fields_of::<Group>();
        let by = Args::new().opt("name", Option::<String>::None);
        let (sql, args) = build_where(&fields, &by).unwrap();
        assert_eq!(sql, r#""group"."name" is null"#);
        assert!(args.is_empty());
    }

    #[test]
    fn where_omitted_entry_disappears_entirely() {
        let fields = fields_of::<Group>();
        let by = Args::new()
            .value("id", 1_i64)
            .omit_if_none("name", Option::<String>::None);
        let (sql, args) = build_where(&fields, &by).unwrap();
        assert_eq!(sql, r#""group"."id" = :_where_id"#);
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn where_raw_fragment_is_inlined() {
        let fields = fields_of::<Group>();
        let by = Args::new().raw("name", "is not null");
        let (sql, args) = build_where(&fields, &by).unwrap();
        assert_eq!(sql, r#""group"."name" is not null"#);
        assert!(args.is_empty());
    }

    #[test]
    fn where_entries_combine_with_and_in_insertion_order() {
        let fields = fields_of::<Group>();
        let by = Args::new().value("name", "admins").value("id", 3_i64);
        let (sql, _) = build_where(&fields, &by).unwrap();
        assert_eq!(
            sql,
            r#""group"."name" = :_where_name and "group"."id" = :_where_id"#
        );
    }

    #[test]
    fn where_unknown_field_is_an_error() {
        let fields = fields_of::<Group>();
        let by = Args::new().value("nope", 1_i64);
        assert!(matches!(
            build_where(&fields, &by).unwrap_err(),
            DbError::MissingField(_)
        ));
    }

    #[test]
    fn select_projects_all_leaves_and_renders_left_joins() {
        let fields = fields_of::<User>();
        let sql = build_select::<User>(&fields, r#""user"."id" = :_where_id"#);
        assert_eq!(
            sql,
            "select \"user\".\"id\" as \"id\",\n  \
             \"user\".\"name\" as \"name\",\n  \
             \"user\".\"group_id\" as \"group_id\",\n  \
             \"group\".\"id\" as \"group.id\",\n  \
             \"group\".\"name\" as \"group.name\"\n\
             from \"user\"\n  \
             left join \"group\" on \"user\".\"group_id\" = \"group\".\"id\"\n\
             where \"user\".\"id\" = :_where_id"
        );
    }

    #[test]
    fn select_without_where_has_no_where_clause() {
        let fields = fields_of::<Group>();
        let sql = build_select::<Group>(&fields, "");
        assert_eq!(
            sql,
            "select \"group\".\"id\" as \"id\",\n  \
             \"group\".\"name\" as \"name\"\n\
             from \"group\""
        );
    }

    #[test]
    fn insert_skips_omit_create_but_returns_every_leaf() {
        let fields = fields_of::<PlainUser>();
        let user = PlainUser {
            id: 0,
            name: "alice".to_string(),
        };
        let (sql, args) = build_insert(&fields, &user, None).unwrap();
        assert_eq!(
            sql,
            "insert into \"user\" (name) values(:name) returning id, name"
        );
        assert_eq!(args.len(), 1);
        assert!(matches!(args.get("name"), Some(ArgValue::Bind(_))));
    }

    #[test]
    fn insert_with_conflict_constraint_renders_upsert() {
        let fields = fields_of::<PlainUser>();
        let user = PlainUser {
            id: 0,
            name: "alice".to_string(),
        };
        let (sql, _) = build_insert(&fields, &user, Some("user_name_key")).unwrap();
        assert_eq!(
            sql,
            "insert into \"user\" (name) values(:name) \
             on conflict(user_name_key) do update set name = excluded.name \
             returning id, name"
        );
    }

    #[test]
    fn insert_excludes_joined_fields() {
        let fields = fields_of::<User>();
        let user = User {
            id: 0,
            name: "alice".to_string(),
            group_id: 2,
            group: Group { id: 0, name: None },
        };
        let (sql, _) = build_insert(&fields, &user, None).unwrap();
        assert_eq!(
            sql,
            "insert into \"user\" (name, group_id) values(:name, :group_id) \
             returning id, name, group_id"
        );
    }

    #[test]
    fn update_renders_sets_and_where() {
        let fields = fields_of::<PlainUser>();
        let updates = Args::new()
            .value("name", "bob")
            .raw("id", "default");
        let (sql, args) =
            build_update::<PlainUser>(&fields, r#""user"."id" = :_where_id"#, &updates).unwrap();
        assert_eq!(
            sql,
            "update \"user\" set name = :_set_name, id = default \
             where \"user\".\"id\" = :_where_id"
        );
        assert_eq!(args.len(), 1);
        assert!(matches!(args.get("_set_name"), Some(ArgValue::Bind(_))));
    }

    #[test]
    fn update_null_renders_literal_null() {
        let fields = fields_of::<Group>();
        let updates = Args::new().null("name");
        let (sql, args) =
            build_update::<Group>(&fields, r#""group"."id" = :_where_id"#, &updates).unwrap();
        assert_eq!(
            sql,
            "update \"group\" set name = null where \"group\".\"id\" = :_where_id"
        );
        assert!(args.is_empty());
    }

    #[test]
    fn delete_renders_table_and_where() {
        let sql = build_delete::<PlainUser>(r#""user"."id" = :_where_id"#);
        assert_eq!(sql, "delete from \"user\" where \"user\".\"id\" = :_where_id");
    }
}
