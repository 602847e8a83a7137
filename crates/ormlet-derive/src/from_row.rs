//! FromRow derive macro implementation.

use crate::attrs::{named_fields, FieldAttrs};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let fields = named_fields(&input, "FromRow")?;

    let mut field_inits: Vec<TokenStream> = Vec::new();
    for field in fields {
        let attrs = FieldAttrs::from_field(field)?;
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;

        let init = if attrs.skip {
            quote! {
                #ident: ::core::default::Default::default()
            }
        } else if attrs.flatten {
            // Flattened embeds share the parent's prefix.
            quote! {
                #ident: ormlet::FromRow::from_row_prefixed(row, prefix)?
            }
        } else if attrs.join.is_some() {
            // Joined children decode from dot-prefixed column aliases.
            let field_name = ident.to_string();
            quote! {
                #ident: ormlet::FromRow::from_row_prefixed(
                    row,
                    &ormlet::join_prefix(prefix, #field_name),
                )?
            }
        } else {
            let column = attrs.column_name(field);
            quote! {
                #ident: ormlet::RowExt::try_get_column(
                    row,
                    ormlet::join_prefix(prefix, #column).as_str(),
                )?
            }
        };
        field_inits.push(init);
    }

    Ok(quote! {
        impl ormlet::FromRow for #name {
            fn from_row_prefixed(
                row: &ormlet::tokio_postgres::Row,
                prefix: &str,
            ) -> ormlet::DbResult<Self> {
                ::core::result::Result::Ok(Self {
                    #(#field_inits),*
                })
            }
        }
    })
}
