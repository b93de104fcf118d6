//! Attribute parsing for the Entity derive macro.
//!
//! Handles struct-level and field-level `#[orm(...)]` attributes.

use heck::ToSnakeCase;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result};

/// One `key` or `key = literal` item inside `#[orm(...)]`.
struct OrmItem {
    key: syn::Ident,
    value: Option<syn::Lit>,
}

/// Comma-separated `#[orm(...)]` items.
struct OrmItems(Vec<OrmItem>);

impl syn::parse::Parse for OrmItems {
    fn parse(input: syn::parse::ParseStream) -> Result<Self> {
        let mut items = Vec::new();
        while !input.is_empty() {
            let key: syn::Ident = input.parse()?;
            let value = if input.peek(syn::Token![=]) {
                let _: syn::Token![=] = input.parse()?;
                Some(input.parse::<syn::Lit>()?)
            } else {
                None
            };
            items.push(OrmItem { key, value });

            if input.peek(syn::Token![,]) {
                let _: syn::Token![,] = input.parse()?;
            } else {
                break;
            }
        }
        Ok(OrmItems(items))
    }
}

fn orm_items(attrs: &[syn::Attribute]) -> Result<Vec<OrmItem>> {
    let mut out = Vec::new();
    for attr in attrs {
        if attr.path().is_ident("orm") {
            out.extend(attr.parse_args::<OrmItems>()?.0);
        }
    }
    Ok(out)
}

fn lit_str(item: &OrmItem) -> Result<String> {
    match &item.value {
        Some(syn::Lit::Str(s)) => Ok(s.value()),
        _ => Err(syn::Error::new_spanned(
            &item.key,
            format!("`{}` expects a string literal", item.key),
        )),
    }
}

fn lit_bool(item: &OrmItem) -> Result<bool> {
    match &item.value {
        None => Ok(true),
        Some(syn::Lit::Bool(b)) => Ok(b.value),
        _ => Err(syn::Error::new_spanned(
            &item.key,
            format!("`{}` expects a boolean", item.key),
        )),
    }
}

/// Struct-level attributes.
pub(super) struct EntityAttr {
    pub table: String,
    pub alias: String,
    pub soft_delete: bool,
}

pub(super) fn entity_attr(input: &DeriveInput) -> Result<EntityAttr> {
    let mut table = None;
    let mut alias = None;
    let mut soft_delete = true;

    for item in orm_items(&input.attrs)? {
        if item.key == "table" {
            table = Some(lit_str(&item)?);
        } else if item.key == "alias" {
            alias = Some(lit_str(&item)?);
        } else if item.key == "soft_delete" {
            soft_delete = lit_bool(&item)?;
        } else {
            return Err(syn::Error::new_spanned(
                &item.key,
                format!("unknown entity attribute `{}`", item.key),
            ));
        }
    }

    let table = table.ok_or_else(|| {
        syn::Error::new_spanned(
            &input.ident,
            "Entity requires #[orm(table = \"table_name\")] attribute",
        )
    })?;

    Ok(EntityAttr {
        table,
        alias: alias.unwrap_or_else(|| input.ident.to_string().to_snake_case()),
        soft_delete,
    })
}

/// Field-level attributes.
#[derive(Default)]
pub(super) struct FieldAttr {
    pub is_base: bool,
    pub skip: bool,
    pub column: Option<String>,
    /// Tokens of `::emapper::Rule` values.
    pub rules: Vec<TokenStream>,
}

pub(super) fn field_attr(field: &syn::Field) -> Result<FieldAttr> {
    let mut out = FieldAttr::default();

    for item in orm_items(&field.attrs)? {
        let key = item.key.to_string();
        match key.as_str() {
            "base" => out.is_base = true,
            "skip" => out.skip = true,
            "column" => out.column = Some(lit_str(&item)?),
            "required" => out.rules.push(quote!(::emapper::Rule::Required)),
            "email" => out.rules.push(quote!(::emapper::Rule::Email)),
            "url" => out.rules.push(quote!(::emapper::Rule::Url)),
            "uuid" => out.rules.push(quote!(::emapper::Rule::Uuid)),
            "regex" => {
                let pattern = lit_str(&item)?;
                out.rules.push(quote!(::emapper::Rule::Regex(#pattern)));
            }
            "one_of" => {
                let raw = lit_str(&item)?;
                let options: Vec<String> = raw
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                out.rules
                    .push(quote!(::emapper::Rule::OneOf(&[#(#options),*])));
            }
            "len" => {
                let (min, max) = parse_bounds::<usize>(&lit_str(&item)?)
                    .map_err(|e| syn::Error::new_spanned(&item.key, e))?;
                let min = option_tokens(min);
                let max = option_tokens(max);
                out.rules
                    .push(quote!(::emapper::Rule::Len { min: #min, max: #max }));
            }
            "range" => {
                let (min, max) = parse_bounds::<f64>(&lit_str(&item)?)
                    .map_err(|e| syn::Error::new_spanned(&item.key, e))?;
                let min = option_tokens(min);
                let max = option_tokens(max);
                out.rules
                    .push(quote!(::emapper::Rule::Range { min: #min, max: #max }));
            }
            _ => {
                return Err(syn::Error::new_spanned(
                    &item.key,
                    format!("unknown field attribute `{key}`"),
                ));
            }
        }
    }

    Ok(out)
}

fn option_tokens<T: quote::ToTokens>(v: Option<T>) -> TokenStream {
    match v {
        Some(v) => quote!(::core::option::Option::Some(#v)),
        None => quote!(::core::option::Option::None),
    }
}

/// Parse `min..=max`, `min..` or `..=max`. Exclusive upper bounds are rejected.
pub(super) fn parse_bounds<T: std::str::FromStr>(
    s: &str,
) -> std::result::Result<(Option<T>, Option<T>), String> {
    let (lo, hi) = s
        .split_once("..")
        .ok_or_else(|| format!("expected a range like `1..=10`, got `{s}`"))?;
    let hi = match hi.strip_prefix('=') {
        Some(rest) => rest,
        None if hi.trim().is_empty() => hi,
        None => return Err(format!("use an inclusive upper bound (`..=`) in `{s}`")),
    };
    let parse = |part: &str| -> std::result::Result<Option<T>, String> {
        let part = part.trim();
        if part.is_empty() {
            Ok(None)
        } else {
            part.parse()
                .map(Some)
                .map_err(|_| format!("invalid bound `{part}` in `{s}`"))
        }
    };
    let bounds = (parse(lo)?, parse(hi)?);
    if bounds.0.is_none() && bounds.1.is_none() {
        return Err(format!("range `{s}` has no bounds"));
    }
    Ok(bounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_parse_bounds() {
        assert_eq!(parse_bounds::<usize>("2..=50").unwrap(), (Some(2), Some(50)));
        assert_eq!(parse_bounds::<usize>("3..").unwrap(), (Some(3), None));
        assert_eq!(parse_bounds::<f64>("..=1.5").unwrap(), (None, Some(1.5)));
        assert!(parse_bounds::<usize>("1..5").is_err());
        assert!(parse_bounds::<usize>("..").is_err());
        assert!(parse_bounds::<usize>("a..=3").is_err());
        assert!(parse_bounds::<usize>("12").is_err());
    }

    #[test]
    fn test_entity_attr_defaults_alias() {
        let input: DeriveInput = parse_quote! {
            #[orm(table = "newcrm_user_role")]
            struct UserRole { id: i64 }
        };
        let attr = entity_attr(&input).unwrap();
        assert_eq!(attr.table, "newcrm_user_role");
        assert_eq!(attr.alias, "user_role");
        assert!(attr.soft_delete);
    }

    #[test]
    fn test_entity_attr_explicit() {
        let input: DeriveInput = parse_quote! {
            #[orm(table = "app_star", alias = "s", soft_delete = false)]
            struct AppStar { id: i64 }
        };
        let attr = entity_attr(&input).unwrap();
        assert_eq!(attr.alias, "s");
        assert!(!attr.soft_delete);
    }

    #[test]
    fn test_entity_attr_requires_table() {
        let input: DeriveInput = parse_quote! {
            struct Nothing { id: i64 }
        };
        assert!(entity_attr(&input).is_err());
    }

    #[test]
    fn test_field_attr() {
        let input: DeriveInput = parse_quote! {
            struct S {
                #[orm(column = "user_name", required, len = "2..=10")]
                name: String,
                #[orm(base)]
                base: Base,
                #[orm(unknown)]
                bad: i32,
            }
        };
        let syn::Data::Struct(data) = input.data else {
            panic!("expected struct");
        };
        let fields: Vec<_> = data.fields.iter().collect();

        let name = field_attr(fields[0]).unwrap();
        assert_eq!(name.column.as_deref(), Some("user_name"));
        assert_eq!(name.rules.len(), 2);

        assert!(field_attr(fields[1]).unwrap().is_base);
        assert!(field_attr(fields[2]).is_err());
    }
}
