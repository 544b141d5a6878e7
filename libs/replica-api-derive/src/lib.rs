use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, LitStr};

/// Derive macro mapping a struct to an IDL record.
///
/// Generates `IdlType` and `IdlRecord` impls. Each named field becomes a
/// record field of the same name; `#[idl(rename = "...")]` overrides it.
///
/// # Example
///
/// ```ignore
/// #[derive(IdlRecord)]
/// pub struct StateInfo {
///     pub message: String,
///     pub counter: u64,
///     #[idl(rename = "lastUpdated")]
///     pub last_updated: i64,
/// }
/// ```
///
/// Field types must implement `IdlType`. Decoding is exact: a missing or
/// unexpected field is an error.
#[proc_macro_derive(IdlRecord, attributes(idl))]
pub fn derive_idl_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match derive_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn derive_impl(input: &DeriveInput) -> Result<TokenStream2, syn::Error> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "IdlRecord does not support generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "IdlRecord only supports structs with named fields",
                ))
            }
        },
        _ => return Err(syn::Error::new_spanned(name, "IdlRecord only supports structs")),
    };

    let mut layout_tokens = Vec::new();
    let mut into_tokens = Vec::new();
    let mut from_tokens = Vec::new();

    for field in fields {
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected named field"))?;
        let ty = &field.ty;

        // Parse #[idl(rename = "...")].
        let mut wire_name = ident.to_string();
        for attr in &field.attrs {
            if !attr.path().is_ident("idl") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    let value: LitStr = meta.value()?.parse()?;
                    wire_name = value.value();
                    Ok(())
                } else {
                    Err(meta.error("unknown idl attribute (expected `rename`)"))
                }
            })?;
        }

        layout_tokens.push(quote! {
            .field(#wire_name, <#ty as ::replica_api::value::IdlType>::idl_type())
        });
        into_tokens.push(quote! {
            __fields.insert(
                #wire_name.to_string(),
                ::replica_api::value::IdlType::into_value(self.#ident),
            );
        });
        from_tokens.push(quote! {
            #ident: <#ty as ::replica_api::value::IdlType>::from_value(
                __fields.remove(#wire_name).ok_or_else(|| {
                    ::replica_api::error::CodecError::MissingField(#wire_name.to_string())
                })?,
            )?,
        });
    }

    Ok(quote! {
        impl ::replica_api::value::IdlRecord for #name {
            fn record_type() -> ::replica_api::types::RecordType {
                ::replica_api::types::RecordType::new()
                    #(#layout_tokens)*
            }
        }

        impl ::replica_api::value::IdlType for #name {
            fn idl_type() -> ::replica_api::types::Type {
                ::replica_api::types::Type::Record(
                    <Self as ::replica_api::value::IdlRecord>::record_type(),
                )
            }

            fn into_value(self) -> ::replica_api::value::Value {
                let mut __fields = ::std::collections::BTreeMap::new();
                #(#into_tokens)*
                ::replica_api::value::Value::Record(__fields)
            }

            fn from_value(
                __value: ::replica_api::value::Value,
            ) -> Result<Self, ::replica_api::error::CodecError> {
                let mut __fields = match __value {
                    ::replica_api::value::Value::Record(fields) => fields,
                    other => {
                        return Err(::replica_api::error::CodecError::ValueMismatch {
                            expected: <Self as ::replica_api::value::IdlType>::idl_type(),
                            found: other.kind_name().to_string(),
                        })
                    }
                };
                let __result = Self {
                    #(#from_tokens)*
                };
                if let Some(extra) = __fields.keys().next() {
                    return Err(::replica_api::error::CodecError::ValueMismatch {
                        expected: <Self as ::replica_api::value::IdlType>::idl_type(),
                        found: format!("record with field '{extra}'"),
                    });
                }
                Ok(__result)
            }
        }
    })
}
