//! Model derive macro implementation.
//!
//! Generates the field-map walk (`collect_fields`), typed value access
//! (`field_value`) and RETURNING write-back (`write_back`) that replace the
//! runtime reflection of classic ORMs.

use crate::attrs::{named_fields, table_name, FieldAttrs};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result};

fn option_str(value: &Option<String>) -> TokenStream {
    match value {
        Some(s) => quote! { ::core::option::Option::Some(#s) },
        None => quote! { ::core::option::Option::None },
    }
}

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let table = table_name(&input)?;
    let fields = named_fields(&input, "Model")?;

    let mut collect_stmts: Vec<TokenStream> = Vec::new();
    let mut value_arms: Vec<TokenStream> = Vec::new();
    let mut flatten_delegates: Vec<TokenStream> = Vec::new();
    let mut write_back_stmts: Vec<TokenStream> = Vec::new();

    for field in fields {
        let attrs = FieldAttrs::from_field(field)?;
        if attrs.skip {
            continue;
        }
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
        let ty = &field.ty;

        if attrs.flatten {
            collect_stmts.push(quote! {
                c.flatten::<#ty>();
            });
            flatten_delegates.push(quote! {
                if let ::core::option::Option::Some(v) =
                    ormlet::Model::field_value(&self.#ident, name)
                {
                    return ::core::option::Option::Some(v);
                }
            });
            write_back_stmts.push(quote! {
                ormlet::Model::write_back(&mut self.#ident, row)?;
            });
            continue;
        }

        if let Some(join) = &attrs.join {
            let field_name = ident.to_string();
            let left_table = option_str(&join.left_table);
            let right_table = option_str(&join.right_table);
            let left_id = option_str(&join.left_id);
            let right_id = option_str(&join.right_id);
            collect_stmts.push(quote! {
                c.join::<#ty>(#field_name, ormlet::JoinSpec {
                    left_table: #left_table,
                    right_table: #right_table,
                    left_id: #left_id,
                    right_id: #right_id,
                });
            });
            // Joined fields are read-only: no field_value arm, no write-back.
            continue;
        }

        let column = attrs.column_name(field);
        let omit_create = attrs.omit_create;
        collect_stmts.push(quote! {
            c.column(#column, #omit_create);
        });
        value_arms.push(quote! {
            #column => ::core::option::Option::Some(
                ormlet::SqlValue::new(::core::clone::Clone::clone(&self.#ident))
            ),
        });
        write_back_stmts.push(quote! {
            self.#ident = ormlet::RowExt::try_get_column(row, #column)?;
        });
    }

    Ok(quote! {
        impl ormlet::Model for #name {
            fn table_name() -> &'static str {
                #table
            }

            fn collect_fields(c: &mut ormlet::FieldCollector) {
                #(#collect_stmts)*
            }

            fn field_value(&self, name: &str) -> ::core::option::Option<ormlet::SqlValue> {
                match name {
                    #(#value_arms)*
                    _ => {
                        #(#flatten_delegates)*
                        ::core::option::Option::None
                    }
                }
            }

            fn write_back(&mut self, row: &ormlet::tokio_postgres::Row) -> ormlet::DbResult<()> {
                #(#write_back_stmts)*
                ::core::result::Result::Ok(())
            }
        }
    })
}
