//! Derive macros for the unistore state container
//!
//! This crate provides procedural macros to reduce boilerplate when
//! declaring action types.
//!
//! # Available Macros
//!
//! - `#[derive(Action)]` - Generates the action tag and the declared tag vocabulary
//!
//! # Example
//!
//! ```ignore
//! use unistore_macros::Action;
//!
//! #[derive(Action, Clone, Debug)]
//! enum NameAction {
//!     SetName(String),
//!
//!     #[action(tag = "@@CLEAR")]
//!     Clear,
//! }
//!
//! // Generated:
//! assert_eq!(NameAction::SetName("Ada".into()).tag(), "SET_NAME");
//! assert_eq!(NameAction::Clear.tag(), "@@CLEAR");
//! assert_eq!(NameAction::TAGS, &["SET_NAME", "@@CLEAR"]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, parse_macro_input};

/// Derive macro for Action enums
///
/// Implements `unistore_core::action::Action` and
/// `unistore_core::action::ActionVocabulary`:
/// - `tag()` - Returns the variant's type tag
/// - `TAGS` - Every tag the enum declares, in declaration order
///
/// Tags default to the SCREAMING_SNAKE_CASE form of the variant name, the
/// same spelling `#[serde(rename_all = "SCREAMING_SNAKE_CASE")]` produces,
/// so a derived enum round-trips through `AnyAction`.
///
/// # Attributes
///
/// - `#[action(tag = "...")]` - Override a variant's tag
///
/// # Panics
///
/// This macro will produce a compile error (not a runtime panic) if:
/// - Applied to a non-enum type or to an enum without variants
/// - Two variants end up with the same tag
/// - An `#[action(...)]` attribute is malformed
#[proc_macro_derive(Action, attributes(action))]
pub fn derive_action(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand_action(&input) {
        Ok(tokens) => tokens.into(),
        Err(error) => error.to_compile_error().into(),
    }
}

fn expand_action(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let Data::Enum(data_enum) = &input.data else {
        return Err(syn::Error::new_spanned(
            input,
            "#[derive(Action)] can only be used on enums",
        ));
    };

    if data_enum.variants.is_empty() {
        return Err(syn::Error::new_spanned(
            input,
            "#[derive(Action)] needs at least one variant",
        ));
    }

    let mut tags: Vec<String> = Vec::with_capacity(data_enum.variants.len());
    let mut tag_arms = Vec::with_capacity(data_enum.variants.len());

    for variant in &data_enum.variants {
        let variant_name = &variant.ident;
        let tag = match tag_override(&variant.attrs)? {
            Some(tag) => tag,
            None => screaming_snake_case(&variant_name.to_string()),
        };

        if tags.contains(&tag) {
            return Err(syn::Error::new_spanned(
                variant,
                format!("duplicate action tag `{tag}`"),
            ));
        }

        let pattern = match &variant.fields {
            Fields::Named(_) => quote! { Self::#variant_name { .. } },
            Fields::Unnamed(_) => quote! { Self::#variant_name(..) },
            Fields::Unit => quote! { Self::#variant_name },
        };
        tag_arms.push(quote! { #pattern => #tag, });
        tags.push(tag);
    }

    Ok(quote! {
        impl #impl_generics ::unistore_core::action::Action for #name #ty_generics #where_clause {
            fn tag(&self) -> &str {
                match self {
                    #(#tag_arms)*
                }
            }
        }

        impl #impl_generics ::unistore_core::action::ActionVocabulary for #name #ty_generics #where_clause {
            const TAGS: &'static [&'static str] = &[#(#tags),*];
        }
    })
}

/// Read `#[action(tag = "...")]` from a variant's attributes
fn tag_override(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut tag = None;

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("action")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("tag") {
                let value: LitStr = meta.value()?.parse()?;
                if value.value().is_empty() {
                    return Err(meta.error("action tag cannot be empty"));
                }
                tag = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported action attribute, expected `tag = \"...\"`"))
            }
        })?;
    }

    Ok(tag)
}

/// `SetName` -> `SET_NAME`, matching serde's `SCREAMING_SNAKE_CASE`
fn screaming_snake_case(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 4);
    for (i, ch) in ident.char_indices() {
        if i > 0 && ch.is_uppercase() {
            out.push('_');
        }
        out.push(ch.to_ascii_uppercase());
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::{expand_action, screaming_snake_case};
    use syn::{DeriveInput, parse_quote};

    fn expand_error(input: &DeriveInput) -> String {
        expand_action(input).unwrap_err().to_string()
    }

    #[test]
    fn test_screaming_snake_case() {
        assert_eq!(screaming_snake_case("SetName"), "SET_NAME");
        assert_eq!(screaming_snake_case("Clear"), "CLEAR");
        assert_eq!(screaming_snake_case("AddTodo2"), "ADD_TODO2");
    }

    #[test]
    fn test_struct_is_rejected() {
        let input: DeriveInput = parse_quote! {
            struct NameState {
                name: String,
            }
        };
        assert_eq!(expand_error(&input), "#[derive(Action)] can only be used on enums");
    }

    #[test]
    fn test_union_is_rejected() {
        let input: DeriveInput = parse_quote! {
            union Raw {
                a: u32,
                b: f32,
            }
        };
        assert_eq!(expand_error(&input), "#[derive(Action)] can only be used on enums");
    }

    #[test]
    fn test_empty_enum_is_rejected() {
        let input: DeriveInput = parse_quote! {
            enum Never {}
        };
        assert_eq!(expand_error(&input), "#[derive(Action)] needs at least one variant");
    }

    #[test]
    fn test_duplicate_tag_is_rejected() {
        let input: DeriveInput = parse_quote! {
            enum NameAction {
                SetName(String),
                #[action(tag = "SET_NAME")]
                Rename(String),
            }
        };
        assert_eq!(expand_error(&input), "duplicate action tag `SET_NAME`");
    }

    #[test]
    fn test_empty_tag_is_rejected() {
        let input: DeriveInput = parse_quote! {
            enum NameAction {
                #[action(tag = "")]
                Clear,
            }
        };
        assert_eq!(expand_error(&input), "action tag cannot be empty");
    }

    #[test]
    fn test_unknown_attribute_key_is_rejected() {
        let input: DeriveInput = parse_quote! {
            enum NameAction {
                #[action(name = "CLEAR")]
                Clear,
            }
        };
        assert_eq!(
            expand_error(&input),
            "unsupported action attribute, expected `tag = \"...\"`"
        );
    }

    #[test]
    fn test_expansion_lists_every_tag() {
        let input: DeriveInput = parse_quote! {
            enum NameAction {
                SetName(String),
                #[action(tag = "@@CLEAR")]
                Clear,
                Rename { from: String, to: String },
            }
        };
        let tokens = expand_action(&input).unwrap().to_string();

        let vocabulary = tokens.split("TAGS").nth(1).unwrap();
        let set_name = vocabulary.find("\"SET_NAME\"").unwrap();
        let clear = vocabulary.find("\"@@CLEAR\"").unwrap();
        let rename = vocabulary.find("\"RENAME\"").unwrap();
        assert!(set_name < clear && clear < rename);
    }
}
