//! Entity derive macro implementation

mod attrs;

use heck::ToShoutySnakeCase;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, Result};

/// Index of the first entity-owned field; `0..4` are the base columns.
const FIRST_OWN_FIELD: usize = 4;

struct MappedField<'a> {
    ident: &'a syn::Ident,
    ty: &'a syn::Type,
    column: String,
    rules: Vec<TokenStream>,
}

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Entity cannot be derived for generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Entity can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Entity can only be derived for structs",
            ));
        }
    };

    let entity_attr = attrs::entity_attr(&input)?;
    let mut base_field: Option<&syn::Ident> = None;
    let mut mapped = Vec::new();

    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let attr = attrs::field_attr(field)?;
        if attr.is_base {
            if base_field.is_some() {
                return Err(syn::Error::new_spanned(field, "only one #[orm(base)] field is allowed"));
            }
            base_field = Some(ident);
            continue;
        }
        if attr.skip {
            continue;
        }
        mapped.push(MappedField {
            ident,
            ty: &field.ty,
            column: attr.column.unwrap_or_else(|| ident.to_string()),
            rules: attr.rules,
        });
    }

    let base = base_field.ok_or_else(|| {
        syn::Error::new_spanned(
            &input.ident,
            "Entity requires an `#[orm(base)] base: emapper::EntityBase` field",
        )
    })?;

    let table = &entity_attr.table;
    let alias = &entity_attr.alias;
    let soft_delete = entity_attr.soft_delete;
    let field_count = FIRST_OWN_FIELD + mapped.len();

    let field_defs = mapped.iter().map(|f| {
        let field_name = f.ident.to_string();
        let column = &f.column;
        let rules = &f.rules;
        quote! {
            ::emapper::FieldDef::new(#field_name, #column, &[#(#rules),*])
        }
    });

    let column_consts = mapped.iter().map(|f| {
        let const_name = format_ident!("COL_{}", f.ident.to_string().to_shouty_snake_case());
        let field_name = f.ident.to_string();
        let column = &f.column;
        quote! {
            pub const #const_name: ::emapper::Column<Self> = ::emapper::Column::new(#field_name, #column);
        }
    });

    let accessors = mapped.iter().map(|f| {
        let ident = f.ident;
        let ty = f.ty;
        let setter = format_ident!("set_{}", ident);
        let field_name = ident.to_string();
        quote! {
            pub fn #ident(&self) -> &#ty {
                &self.#ident
            }

            pub fn #setter(&mut self, value: impl ::core::convert::Into<#ty>) {
                self.#ident = value.into();
                let tracked = ::emapper::Value::from(::core::clone::Clone::clone(&self.#ident));
                self.#base.track(#field_name, tracked);
            }
        }
    });

    let read_arms = mapped.iter().enumerate().map(|(i, f)| {
        let index = FIRST_OWN_FIELD + i;
        let ident = f.ident;
        quote! {
            #index => ::emapper::Value::from(::core::clone::Clone::clone(&self.#ident)),
        }
    });

    let write_arms = mapped.iter().enumerate().map(|(i, f)| {
        let index = FIRST_OWN_FIELD + i;
        let ident = f.ident;
        quote! {
            #index => {
                self.#ident = ::emapper::FromValue::from_value(value)?;
                ::core::result::Result::Ok(())
            }
        }
    });

    Ok(quote! {
        impl #name {
            pub const COL_ID: ::emapper::Column<Self> = ::emapper::Column::new("id", "id");
            pub const COL_IS_DELETED: ::emapper::Column<Self> = ::emapper::Column::new("is_deleted", "is_deleted");
            pub const COL_ADD_TIME: ::emapper::Column<Self> = ::emapper::Column::new("add_time", "add_time");
            pub const COL_LAST_MODIFY_TIME: ::emapper::Column<Self> = ::emapper::Column::new("last_modify_time", "last_modify_time");
            #(#column_consts)*

            #(#accessors)*
        }

        impl ::emapper::Entity for #name {
            fn model() -> &'static ::emapper::ModelDef {
                static FIELDS: [::emapper::FieldDef; #field_count] = [
                    ::emapper::BASE_FIELDS[0],
                    ::emapper::BASE_FIELDS[1],
                    ::emapper::BASE_FIELDS[2],
                    ::emapper::BASE_FIELDS[3],
                    #(#field_defs),*
                ];
                static MODEL: ::emapper::ModelDef = ::emapper::ModelDef {
                    type_name: ::core::concat!(::core::module_path!(), "::", ::core::stringify!(#name)),
                    table: #table,
                    alias: #alias,
                    soft_delete: #soft_delete,
                    fields: &FIELDS,
                };
                &MODEL
            }

            fn base(&self) -> &::emapper::EntityBase {
                &self.#base
            }

            fn base_mut(&mut self) -> &mut ::emapper::EntityBase {
                &mut self.#base
            }

            fn field_value(&self, index: usize) -> ::emapper::Value {
                match index {
                    0..=3 => self.#base.field_value(index),
                    #(#read_arms)*
                    _ => ::emapper::Value::Null,
                }
            }

            fn set_field_value(
                &mut self,
                index: usize,
                value: ::emapper::Value,
            ) -> ::core::result::Result<(), ::std::string::String> {
                match index {
                    0..=3 => self.#base.set_field_value(index, value),
                    #(#write_arms)*
                    _ => ::core::result::Result::Err(::std::format!("no field at index {}", index)),
                }
            }
        }
    })
}
