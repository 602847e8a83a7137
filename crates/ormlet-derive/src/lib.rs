//! Derive macros for ormlet
//!
//! Provides `#[derive(Model)]` and `#[derive(FromRow)]`.

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod attrs;
mod from_row;
mod model;

/// Derive the `Model` trait for a struct.
///
/// # Example
///
/// ```ignore
/// use ormlet::{Model, FromRow, SoftDeleteFields};
///
/// #[derive(Model, FromRow)]
/// #[orm(table = "volume")]
/// struct Volume {
///     #[orm(omit_create)]
///     id: i64,
///     name: String,
///     pool_id: i64,
///     #[orm(flatten)]
///     soft: SoftDeleteFields,
///     #[orm(join(left_id = "pool_id"))]
///     pool: Pool,
/// }
/// ```
///
/// # Attributes
///
/// - `#[orm(table = "name")]` on the struct — table name (defaults to the
///   snake_cased type name)
/// - `#[orm(column = "name")]` — map a field to a different column name
/// - `#[orm(omit_create)]` — exclude from INSERT column lists (still read
///   back via RETURNING)
/// - `#[orm(flatten)]` — merge an embedded model's fields into this one
/// - `#[orm(join)]` / `#[orm(join(left_table = ..., right_table = ...,
///   left_id = ..., right_id = ...))]` — left-join a child model; its fields
///   are exposed under a `field.` prefix
/// - `#[orm(skip)]` — not a database column at all
#[proc_macro_derive(Model, attributes(orm))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    model::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive the `FromRow` trait for a struct.
///
/// Accepts the same `#[orm(...)]` field attributes as `Model`: joined
/// children decode from dot-prefixed column aliases, flattened embeds share
/// the parent's prefix, and `skip` fields are filled from `Default`.
#[proc_macro_derive(FromRow, attributes(orm))]
pub fn derive_from_row(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    from_row::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
