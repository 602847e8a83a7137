//! Convenience re-exports: `use ormlet::prelude::*;`

pub use crate::args::{ArgValue, Args};
pub use crate::bind::QueryText;
pub use crate::client::GenericClient;
pub use crate::error::{DbError, DbResult};
pub use crate::fields::Model;
pub use crate::querier::Querier;
pub use crate::registry::ModelRegistry;
pub use crate::row::{FromRow, RowExt};
pub use crate::soft_delete::{SoftDeletable, SoftDeleteFields};

#[cfg(feature = "derive")]
pub use ormlet_derive::{FromRow, Model};
