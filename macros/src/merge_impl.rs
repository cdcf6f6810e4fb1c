use proc_macro2::TokenStream;
use quote::quote;
use syn::{parse2, Data, DeriveInput, Field, Fields, Result, Type};

pub fn derive_merge(input: TokenStream) -> Result<TokenStream> {
    let input: DeriveInput = parse2(input)?;
    let Data::Struct(data) = &input.data else {
        bail!(_, "`Merge` can only be derived for structs");
    };
    let Fields::Named(fields) = &data.fields else {
        bail!(_, "`Merge` requires a struct with named fields");
    };
    let mut inits = Vec::new();
    for field in &fields.named {
        let Some(name) = &field.ident else {
            continue;
        };
        let init = match field_kind(field)? {
            FieldKind::Skip => quote!(::std::clone::Clone::clone(&self.#name)),
            FieldKind::Option => quote! {
                match &partial.#name {
                    ::std::option::Option::Some(_) => ::std::clone::Clone::clone(&partial.#name),
                    ::std::option::Option::None => ::std::clone::Clone::clone(&self.#name),
                }
            },
            FieldKind::Overwrite => quote!(::std::clone::Clone::clone(&partial.#name)),
        };
        inits.push(quote!(#name: #init));
    }

    let self_ident = &input.ident;
    let (impl_g, type_g, where_g) = input.generics.split_for_impl();
    Ok(quote! {
        #[automatically_derived]
        impl #impl_g ::slice_store::Merge for #self_ident #type_g #where_g {
            fn merge(&self, partial: &Self) -> Self {
                Self {
                    #(#inits,)*
                }
            }
        }
    })
}

enum FieldKind {
    Skip,
    Option,
    Overwrite,
}

fn field_kind(field: &Field) -> Result<FieldKind> {
    let mut skip = false;
    for attr in &field.attrs {
        if !attr.path().is_ident("merge") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else {
                Err(meta.error("unsupported `merge` attribute"))
            }
        })?;
    }
    if skip {
        Ok(FieldKind::Skip)
    } else if is_option(&field.ty) {
        Ok(FieldKind::Option)
    } else {
        Ok(FieldKind::Overwrite)
    }
}

fn is_option(ty: &Type) -> bool {
    let Type::Path(ty) = ty else {
        return false;
    };
    ty.qself.is_none()
        && ty
            .path
            .segments
            .last()
            .is_some_and(|s| s.ident == "Option")
}
