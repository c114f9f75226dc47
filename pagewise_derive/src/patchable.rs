//! Derive macro for the `Patchable` partial-update trait.

use crate::keyed::key_field;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::punctuated::Punctuated;
use syn::{
    Attribute, Data, DeriveInput, Expr, ExprLit, Fields, Ident, Lit, LitStr, Meta, PathArguments,
    Token, Type,
};

pub fn patchable_impl(item: proc_macro::TokenStream) -> proc_macro::TokenStream {
    patchable_impl_internal(item.into()).into()
}

pub(crate) fn patchable_impl_internal(item: TokenStream) -> TokenStream {
    let input = match syn::parse2::<DeriveInput>(item) {
        Ok(tree) => tree,
        Err(e) => return e.to_compile_error(),
    };
    expand(&input).unwrap_or_else(|e| e.to_compile_error())
}

/// A field as seen by the generated patch.
struct PatchField<'a> {
    ident: &'a Ident,
    field: &'a syn::Field,
    is_key: bool,
    skip: bool,
    /// The entity field is itself an `Option`, so `null` is a value.
    optional: bool,
    serde_attrs: Vec<TokenStream>,
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(_) => &data.fields,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Patchable requires a struct with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Patchable can only be derived for structs",
            ));
        }
    };
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Patchable does not support generic structs",
        ));
    }

    let name = &input.ident;
    let vis = &input.vis;
    let patch_name = patch_name(&input.attrs)?.unwrap_or_else(|| format_ident!("{}Patch", name));
    let rename_all = forwarded_serde(&input.attrs, &["rename_all"])?;

    let key_ident = key_field(fields)?.and_then(|(_, field)| field.ident.clone());
    let mut patch_fields = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        patch_fields.push(PatchField {
            ident,
            field,
            is_key: key_ident.as_ref() == Some(ident),
            skip: field_is_skipped(&field.attrs)?,
            optional: is_option(&field.ty),
            serde_attrs: forwarded_serde(&field.attrs, &["rename", "alias"])?,
        });
    }

    let patch_doc = format!("Partial update of [`{name}`]. Absent fields are left untouched.");
    let patch_struct_fields = patch_fields.iter().filter(|f| !f.skip).map(|f| {
        let ident = f.ident;
        let ty = &f.field.ty;
        let field_vis = &f.field.vis;
        let serde_attrs = &f.serde_attrs;
        let doc = format!("New value for `{ident}`, if it changed.");
        let present = f.optional.then(|| {
            quote! {
                #[serde(default, deserialize_with = "::pagewise_core::entity::deserialize_present")]
            }
        });
        quote! {
            #[doc = #doc]
            #[serde(skip_serializing_if = "::std::option::Option::is_none")]
            #present
            #(#serde_attrs)*
            #field_vis #ident: ::std::option::Option<#ty>,
        }
    });

    let assignments: Vec<TokenStream> = patch_fields
        .iter()
        .filter(|f| !f.skip && !f.is_key)
        .map(|f| {
            let ident = f.ident;
            quote! {
                if let ::std::option::Option::Some(value) = patch.#ident {
                    self.#ident = value;
                }
            }
        })
        .collect();
    let apply_body = if assignments.is_empty() {
        quote! { let _ = patch; }
    } else {
        quote! { #(#assignments)* }
    };

    let constructors = patch_fields.iter().map(|f| {
        let ident = f.ident;
        if f.skip {
            quote! { #ident: ::std::default::Default::default(), }
        } else if f.optional {
            quote! { #ident: ::std::option::Option::flatten(patch.#ident), }
        } else {
            quote! { #ident: patch.#ident?, }
        }
    });

    Ok(quote! {
        #[doc = #patch_doc]
        #[derive(Debug, Clone, Default, ::serde::Serialize, ::serde::Deserialize)]
        #[serde(default)]
        #(#rename_all)*
        #vis struct #patch_name {
            #(#patch_struct_fields)*
        }

        impl ::pagewise_core::Patchable for #name {
            type Patch = #patch_name;

            fn apply_patch(&mut self, patch: Self::Patch) {
                #apply_body
            }

            fn from_patch(patch: Self::Patch) -> ::std::option::Option<Self> {
                ::std::option::Option::Some(Self {
                    #(#constructors)*
                })
            }
        }
    })
}

/// Whether `ty` is spelled as an `Option<_>`.
fn is_option(ty: &Type) -> bool {
    let Type::Path(path) = ty else {
        return false;
    };
    path.qself.is_none()
        && path.path.segments.last().is_some_and(|segment| {
            segment.ident == "Option"
                && matches!(segment.arguments, PathArguments::AngleBracketed(_))
        })
}

fn patch_name(attrs: &[Attribute]) -> syn::Result<Option<Ident>> {
    let mut name = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("patch")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                name = Some(value.parse::<Ident>()?);
                Ok(())
            } else {
                Err(meta.error("expected `name = \"...\"`"))
            }
        })?;
    }
    Ok(name)
}

fn field_is_skipped(attrs: &[Attribute]) -> syn::Result<bool> {
    let mut skip = false;
    for attr in attrs.iter().filter(|a| a.path().is_ident("patch")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else {
                Err(meta.error("expected `skip`"))
            }
        })?;
    }
    Ok(skip)
}

/// Collects the listed `#[serde(key = "...")]` entries so the patch serializes
/// under the same names as the entity.
fn forwarded_serde(attrs: &[Attribute], keys: &[&str]) -> syn::Result<Vec<TokenStream>> {
    let mut forwarded = Vec::new();
    for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
        let metas = attr.parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)?;
        for meta in metas {
            let Meta::NameValue(pair) = meta else {
                continue;
            };
            if !keys.iter().any(|key| pair.path.is_ident(key)) {
                continue;
            }
            if matches!(&pair.value, Expr::Lit(ExprLit { lit: Lit::Str(_), .. })) {
                forwarded.push(quote! { #[serde(#pair)] });
            }
        }
    }
    Ok(forwarded)
}
