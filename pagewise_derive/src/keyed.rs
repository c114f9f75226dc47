//! Derive macro for the `Keyed` identity trait.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Field, Fields, Index, Member};

pub fn keyed_impl(item: proc_macro::TokenStream) -> proc_macro::TokenStream {
    keyed_impl_internal(item.into()).into()
}

pub(crate) fn keyed_impl_internal(item: TokenStream) -> TokenStream {
    let input = match syn::parse2::<DeriveInput>(item) {
        Ok(tree) => tree,
        Err(e) => return e.to_compile_error(),
    };
    expand(&input).unwrap_or_else(|e| e.to_compile_error())
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Keyed can only be derived for structs",
            ));
        }
    };

    let (member, field) = key_field(fields)?.ok_or_else(|| {
        syn::Error::new_spanned(input, "Keyed requires exactly one field marked #[key]")
    })?;

    let name = &input.ident;
    let key_ty = &field.ty;
    let (impl_generics, type_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::pagewise_core::Keyed for #name #type_generics #where_clause {
            type Key = #key_ty;

            fn key(&self) -> Self::Key {
                ::std::clone::Clone::clone(&self.#member)
            }
        }
    })
}

/// Finds the field marked `#[key]`. Fails when more than one is marked.
pub(crate) fn key_field(fields: &Fields) -> syn::Result<Option<(Member, &Field)>> {
    let mut found: Option<(Member, &Field)> = None;

    for (index, field) in fields.iter().enumerate() {
        let Some(attr) = field.attrs.iter().find(|a| a.path().is_ident("key")) else {
            continue;
        };
        attr.meta.require_path_only()?;
        if found.is_some() {
            return Err(syn::Error::new_spanned(
                attr,
                "only one field can be marked #[key]",
            ));
        }
        let member = match &field.ident {
            Some(ident) => Member::Named(ident.clone()),
            None => Member::Unnamed(Index::from(index)),
        };
        found = Some((member, field));
    }

    Ok(found)
}
