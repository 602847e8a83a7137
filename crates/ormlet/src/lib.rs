//! # ormlet
//!
//! A lightweight struct-to-SQL mapping layer for `tokio-postgres`.
//!
//! Models are plain structs with `#[derive(Model, FromRow)]`; the derive
//! records each struct's column layout, embedded field groups and left-join
//! relations. Field maps are computed once per type and cached process-wide
//! in a [`ModelRegistry`], and the [`Querier`] renders and executes
//! SELECT/INSERT/UPDATE/DELETE statements from them.
//!
//! Queries use `:name` placeholders bound through an [`Args`] map, with
//! per-driver query templates ([`QueryText`]) and `@@` text splices for the
//! places parameter binding cannot reach (table and column names).
//!
//! ```ignore
//! use ormlet::{Args, Querier, Model, FromRow};
//!
//! #[derive(Default, Model, FromRow)]
//! #[orm(table = "user")]
//! struct User {
//!     #[orm(column = "id", omit_create)]
//!     id: i64,
//!     #[orm(column = "name")]
//!     name: String,
//! }
//!
//! # async fn demo(client: &tokio_postgres::Client) -> ormlet::DbResult<()> {
//! let q = Querier::new(client);
//!
//! let mut user = User { name: "alice".into(), ..Default::default() };
//! q.create(&mut user).await?; // user.id is now set
//!
//! let found: User = q.get_one(&Args::new().value("name", "alice")).await?;
//! # let _ = found; Ok(()) }
//! ```
//!
//! Write operations that target one row enforce it: zero affected rows is
//! [`DbError::NotFound`], more than one is [`DbError::UnexpectedRowCount`].
//!
//! ## Features
//!
//! - `derive` (default): the `Model`/`FromRow` derive macros.
//! - `pool` (default): `deadpool-postgres` pooling and client support.
//! - `tracing`: debug-level logging of rendered SQL.

pub mod args;
pub mod bind;
pub mod client;
pub mod error;
pub mod fields;
#[cfg(feature = "pool")]
pub mod pool;
pub mod prelude;
pub mod querier;
pub mod registry;
pub mod row;
pub mod soft_delete;
pub mod transaction;

pub use args::{ArgValue, Args, SqlValue};
pub use bind::{bind_named, QueryText, SPLICE_PREFIX};
pub use client::GenericClient;
pub use error::{DbError, DbResult};
pub use fields::{FieldCollector, FieldDescriptor, JoinDescriptor, JoinSpec, Model, ModelFields};
#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config, create_pool_with_manager_config};
pub use querier::{build_delete, build_insert, build_select, build_update, build_where, Querier};
pub use registry::ModelRegistry;
pub use row::{join_prefix, FromRow, RowExt};
pub use soft_delete::{
    add_finalizer, remove_finalizer, soft_delete, soft_delete_with_constraints, SoftDeletable,
    SoftDeleteFields,
};

#[cfg(feature = "derive")]
pub use ormlet_derive::{FromRow, Model};

#[cfg(feature = "pool")]
pub use deadpool_postgres;
pub use tokio_postgres;
