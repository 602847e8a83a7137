//! `#[orm(...)]` attribute parsing shared by the derives.

use heck::ToSnakeCase;
use syn::parse::{Parse, ParseStream};
use syn::{DeriveInput, Result};

/// Parsed field-level attributes.
///
/// Grammar: `#[orm(column = "name", omit_create)]`, `#[orm(flatten)]`,
/// `#[orm(skip)]`, `#[orm(join)]` or
/// `#[orm(join(left_table = "...", right_table = "...", left_id = "...", right_id = "..."))]`.
#[derive(Default)]
pub struct FieldAttrs {
    pub column: Option<String>,
    pub omit_create: bool,
    pub flatten: bool,
    pub skip: bool,
    pub join: Option<JoinOverrides>,
}

/// Explicit overrides for a `join(...)` declaration; unset parts use the
/// runtime defaults (parent/child table names, `id` columns).
#[derive(Default)]
pub struct JoinOverrides {
    pub left_table: Option<String>,
    pub right_table: Option<String>,
    pub left_id: Option<String>,
    pub right_id: Option<String>,
}

impl FieldAttrs {
    /// Collect and merge every `#[orm(...)]` attribute of a field.
    pub fn from_field(field: &syn::Field) -> Result<Self> {
        let mut merged = FieldAttrs::default();
        for attr in &field.attrs {
            if !attr.path().is_ident("orm") {
                continue;
            }
            let parsed: FieldAttrs = attr.parse_args()?;
            if parsed.column.is_some() {
                merged.column = parsed.column;
            }
            merged.omit_create |= parsed.omit_create;
            merged.flatten |= parsed.flatten;
            merged.skip |= parsed.skip;
            if parsed.join.is_some() {
                merged.join = parsed.join;
            }
        }
        Ok(merged)
    }

    /// Column name: explicit `column = "..."` or the field identifier.
    pub fn column_name(&self, field: &syn::Field) -> String {
        self.column
            .clone()
            .unwrap_or_else(|| field.ident.as_ref().map(|i| i.to_string()).unwrap_or_default())
    }
}

impl Parse for FieldAttrs {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut attrs = FieldAttrs::default();

        while !input.is_empty() {
            let key: syn::Ident = input.parse()?;
            if key == "column" {
                let _: syn::Token![=] = input.parse()?;
                let value: syn::LitStr = input.parse()?;
                attrs.column = Some(value.value());
            } else if key == "omit_create" {
                attrs.omit_create = true;
            } else if key == "flatten" {
                attrs.flatten = true;
            } else if key == "skip" {
                attrs.skip = true;
            } else if key == "join" {
                if input.peek(syn::token::Paren) {
                    let content;
                    syn::parenthesized!(content in input);
                    attrs.join = Some(content.parse()?);
                } else {
                    attrs.join = Some(JoinOverrides::default());
                }
            } else {
                return Err(syn::Error::new(
                    key.span(),
                    format!("unknown orm attribute '{}'", key),
                ));
            }

            if input.peek(syn::Token![,]) {
                let _: syn::Token![,] = input.parse()?;
            } else {
                break;
            }
        }

        Ok(attrs)
    }
}

impl Parse for JoinOverrides {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut overrides = JoinOverrides::default();

        while !input.is_empty() {
            let key: syn::Ident = input.parse()?;
            let _: syn::Token![=] = input.parse()?;
            let value: syn::LitStr = input.parse()?;

            if key == "left_table" {
                overrides.left_table = Some(value.value());
            } else if key == "right_table" {
                overrides.right_table = Some(value.value());
            } else if key == "left_id" {
                overrides.left_id = Some(value.value());
            } else if key == "right_id" {
                overrides.right_id = Some(value.value());
            } else {
                return Err(syn::Error::new(
                    key.span(),
                    format!("unknown join attribute '{}'", key),
                ));
            }

            if input.peek(syn::Token![,]) {
                let _: syn::Token![,] = input.parse()?;
            } else {
                break;
            }
        }

        Ok(overrides)
    }
}

/// Table name from `#[orm(table = "...")]`, defaulting to the snake_cased
/// type name.
pub fn table_name(input: &DeriveInput) -> Result<String> {
    for attr in &input.attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        let nested: syn::MetaNameValue = attr.parse_args()?;
        if nested.path.is_ident("table") {
            if let syn::Expr::Lit(syn::ExprLit {
                lit: syn::Lit::Str(lit),
                ..
            }) = &nested.value
            {
                return Ok(lit.value());
            }
        }
        return Err(syn::Error::new_spanned(
            attr,
            "expected #[orm(table = \"table_name\")]",
        ));
    }
    Ok(input.ident.to_string().to_snake_case())
}

/// Named fields of a struct, or an error for anything else.
pub fn named_fields<'a>(
    input: &'a DeriveInput,
    derive_name: &str,
) -> Result<&'a syn::punctuated::Punctuated<syn::Field, syn::Token![,]>> {
    match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            syn::Fields::Named(fields) => Ok(&fields.named),
            _ => Err(syn::Error::new_spanned(
                input,
                format!("{} can only be derived for structs with named fields", derive_name),
            )),
        },
        _ => Err(syn::Error::new_spanned(
            input,
            format!("{} can only be derived for structs", derive_name),
        )),
    }
}
