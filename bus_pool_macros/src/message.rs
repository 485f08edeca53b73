use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{DeriveInput, LitStr};

pub fn derive_message(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(expanded) => expanded.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let mut generics = input.generics.clone();
    if !generics.params.is_empty() {
        // Message requires Serialize; spell it out for generic params
        generics
            .make_where_clause()
            .predicates
            .push(syn::parse_quote!(Self: ::bus_pool::__private::Serialize));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let kind = match explicit_kind(input)? {
        Some(kind) => quote! { #kind },
        None if !input.generics.params.is_empty() => {
            return Err(syn::Error::new_spanned(
                &input.generics,
                "generic messages need an explicit `#[message(kind = \"...\")]`",
            ));
        }
        // Module-qualified so same-named types in different modules stay distinct
        None => {
            let ident = name.to_string();
            quote! { ::core::concat!(::core::module_path!(), "::", #ident) }
        }
    };

    Ok(quote! {
        impl #impl_generics ::bus_pool::Message for #name #ty_generics #where_clause {
            const KIND: &'static str = #kind;
        }
    })
}

fn explicit_kind(input: &DeriveInput) -> syn::Result<Option<String>> {
    for attr in &input.attrs {
        if !attr.path().is_ident("message") {
            continue;
        }

        let mut kind = None;
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("kind") {
                let value: LitStr = meta.value()?.parse()?;
                if value.value().trim().is_empty() {
                    return Err(meta.error("message kind must not be empty"));
                }
                kind = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported message attribute, expected `kind = \"...\"`"))
            }
        })?;

        if kind.is_some() {
            return Ok(kind);
        }
    }

    Ok(None)
}
