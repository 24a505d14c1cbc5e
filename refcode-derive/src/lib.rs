//! # Refcode Derive Macros
//!
//! This crate provides the procedural macros for `refcode`. It generates the field
//! enumeration and by-name assignment that the codec needs for records
//! (`RefcodeObject`), and the member lookup for fieldless enums (`RefcodeEnum`).
//!
//! Compatible with `syn 2.0`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, parse_macro_input};

/// Wire keys that carry metadata and can never name a field.
const RESERVED_FIELD_NAMES: [&str; 3] = ["__id", "__ci", "__r"];

/// Derives `refcode::Record` for a struct with named fields.
///
/// Container attributes: `#[refcode(namespace = "...", name = "...")]` override the
/// canonical type (defaults: the module path and the struct name).
/// Field attributes: `#[refcode(skip)]` leaves a field out of the document,
/// `#[refcode(rename = "...")]` changes its wire name.
#[proc_macro_derive(RefcodeObject, attributes(refcode))]
pub fn derive_refcode_object(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let fields = match &input.data {
        Data::Struct(ds) => match &ds.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return syn::Error::new(name.span(), "RefcodeObject requires named fields")
                    .to_compile_error()
                    .into();
            }
        },
        _ => {
            return syn::Error::new(name.span(), "RefcodeObject only supports structs")
                .to_compile_error()
                .into();
        }
    };

    let container = match parse_container_attributes(&input.attrs) {
        Ok(res) => res,
        Err(e) => return e.to_compile_error().into(),
    };

    let mut wire_fields: Vec<WireField> = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let attrs = match parse_field_attributes(&field.attrs) {
            Ok(res) => res,
            Err(e) => return e.to_compile_error().into(),
        };
        if attrs.skip {
            continue;
        }
        let wire_name = attrs.rename.unwrap_or_else(|| ident.to_string());
        if RESERVED_FIELD_NAMES.contains(&wire_name.as_str()) {
            return syn::Error::new(
                ident.span(),
                format!("'{wire_name}' is a reserved wire key; use #[refcode(rename = \"...\")]"),
            )
            .to_compile_error()
            .into();
        }
        if wire_fields.iter().any(|f| f.wire_name == wire_name) {
            return syn::Error::new(ident.span(), format!("duplicate wire name '{wire_name}'"))
                .to_compile_error()
                .into();
        }
        wire_fields.push(WireField { ident, wire_name });
    }

    let canonical = generate_canonical_type(name, &container);
    let impl_record = generate_record(&input, &wire_fields, &canonical);

    TokenStream::from(impl_record)
}

/// Derives `refcode::EnumMember`, `ToValue`, `FromValue` and `From<Self> for Value`
/// for a fieldless enum.
///
/// Accepts the same container attributes as `RefcodeObject`, and
/// `#[refcode(rename = "...")]` on variants.
#[proc_macro_derive(RefcodeEnum, attributes(refcode))]
pub fn derive_refcode_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let data_enum = match &input.data {
        Data::Enum(de) => de,
        _ => {
            return syn::Error::new(name.span(), "RefcodeEnum only supports enums")
                .to_compile_error()
                .into();
        }
    };
    if !input.generics.params.is_empty() {
        return syn::Error::new(name.span(), "RefcodeEnum does not support generic enums")
            .to_compile_error()
            .into();
    }

    let container = match parse_container_attributes(&input.attrs) {
        Ok(res) => res,
        Err(e) => return e.to_compile_error().into(),
    };

    let mut members: Vec<(syn::Ident, String)> = Vec::new();
    for variant in &data_enum.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return syn::Error::new(
                variant.ident.span(),
                "RefcodeEnum variants cannot carry data",
            )
            .to_compile_error()
            .into();
        }
        let attrs = match parse_field_attributes(&variant.attrs) {
            Ok(res) => res,
            Err(e) => return e.to_compile_error().into(),
        };
        if attrs.skip {
            return syn::Error::new(variant.ident.span(), "variants cannot be skipped")
                .to_compile_error()
                .into();
        }
        let member_name = attrs.rename.unwrap_or_else(|| variant.ident.to_string());
        if members.iter().any(|(_, existing)| *existing == member_name) {
            return syn::Error::new(
                variant.ident.span(),
                format!("duplicate member name '{member_name}'"),
            )
            .to_compile_error()
            .into();
        }
        members.push((variant.ident.clone(), member_name));
    }

    let canonical = generate_canonical_type(name, &container);
    TokenStream::from(generate_enum(name, &members, &canonical))
}

// --- Internal Data Structures ---

struct WireField {
    ident: syn::Ident,
    wire_name: String,
}

#[derive(Default)]
struct ContainerAttrs {
    namespace: Option<String>,
    name: Option<String>,
}

#[derive(Default)]
struct FieldAttrs {
    skip: bool,
    rename: Option<String>,
}

fn parse_container_attributes(attrs: &[Attribute]) -> syn::Result<ContainerAttrs> {
    let mut parsed = ContainerAttrs::default();
    for attr in attrs {
        if attr.path().is_ident("refcode") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("namespace") {
                    let s: LitStr = meta.value()?.parse()?;
                    if s.value().contains('/') {
                        return Err(meta.error("namespace cannot contain '/'"));
                    }
                    parsed.namespace = Some(s.value());
                    return Ok(());
                }
                if meta.path.is_ident("name") {
                    let s: LitStr = meta.value()?.parse()?;
                    if s.value().is_empty() || s.value().contains('/') {
                        return Err(meta.error("name must be non-empty and cannot contain '/'"));
                    }
                    parsed.name = Some(s.value());
                    return Ok(());
                }
                Err(meta.error("Unknown refcode container attribute. Supported: namespace, name"))
            })?;
        }
    }
    Ok(parsed)
}

fn parse_field_attributes(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut parsed = FieldAttrs::default();
    for attr in attrs {
        if attr.path().is_ident("refcode") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    parsed.skip = true;
                    return Ok(());
                }
                if meta.path.is_ident("rename") {
                    let s: LitStr = meta.value()?.parse()?;
                    parsed.rename = Some(s.value());
                    return Ok(());
                }
                Err(meta.error("Unknown refcode attribute key. Supported: skip, rename"))
            })?;
        }
    }
    Ok(parsed)
}

// --- Generator: CanonicalType ---

fn generate_canonical_type(
    name: &syn::Ident,
    container: &ContainerAttrs,
) -> proc_macro2::TokenStream {
    let namespace = match &container.namespace {
        Some(ns) => quote! { #ns },
        None => quote! { ::core::module_path!() },
    };
    let type_name = container.name.clone().unwrap_or_else(|| name.to_string());
    quote! { refcode::CanonicalType::new(#namespace, #type_name) }
}

// --- Generator: Record ---

fn generate_record(
    input: &DeriveInput,
    fields: &[WireField],
    canonical: &proc_macro2::TokenStream,
) -> proc_macro2::TokenStream {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let read_fields = fields.iter().map(|f| {
        let ident = &f.ident;
        let wire = &f.wire_name;
        quote! { (#wire, refcode::rt::ToValue::to_value(&self.#ident)) }
    });

    let assign_arms = fields.iter().map(|f| {
        let ident = &f.ident;
        let wire = &f.wire_name;
        quote! {
            #wire => {
                refcode::rt::assign_field(
                    &mut self.#ident,
                    value,
                    <Self as refcode::Record>::canonical_type,
                    #wire,
                )?;
                Ok(true)
            }
        }
    });

    quote! {
        impl #impl_generics refcode::Record for #name #ty_generics #where_clause {
            fn canonical_type() -> refcode::CanonicalType {
                #canonical
            }

            fn fields(&self) -> std::vec::Vec<(&'static str, refcode::Value)> {
                std::vec![#(#read_fields),*]
            }

            fn set_field(&mut self, name: &str, value: refcode::Value) -> refcode::Result<bool> {
                match name {
                    #(#assign_arms)*
                    _ => {
                        drop(value);
                        Ok(false)
                    }
                }
            }
        }
    }
}

// --- Generator: EnumMember ---

fn generate_enum(
    name: &syn::Ident,
    members: &[(syn::Ident, String)],
    canonical: &proc_macro2::TokenStream,
) -> proc_macro2::TokenStream {
    let name_arms = members.iter().map(|(variant, member)| {
        quote! { Self::#variant => #member, }
    });
    let value_arms = members.iter().map(|(variant, _)| {
        quote! { Self::#variant => Self::#variant as i64, }
    });
    let index_arms = members.iter().enumerate().map(|(index, (variant, _))| {
        quote! { Self::#variant => #index, }
    });
    let lookup_arms = members.iter().map(|(variant, member)| {
        quote! { #member => Some(Self::#variant), }
    });
    let range_checks = members.iter().map(|(variant, _)| {
        let message = format!("discriminant of {name}::{variant} does not fit in i64");
        quote! {
            ::core::assert!(
                (#name::#variant as i128) >= (i64::MIN as i128)
                    && (#name::#variant as i128) <= (i64::MAX as i128),
                #message
            );
        }
    });
    let expected = format!("enum {name}");

    quote! {
        const _: () = {
            #(#range_checks)*
        };

        impl refcode::EnumMember for #name {
            fn canonical_type() -> refcode::CanonicalType {
                #canonical
            }

            fn member_name(&self) -> &'static str {
                match *self {
                    #(#name_arms)*
                }
            }

            fn member_value(&self) -> i64 {
                match *self {
                    #(#value_arms)*
                }
            }

            fn declaration_index(&self) -> usize {
                match *self {
                    #(#index_arms)*
                }
            }

            fn from_member_name(name: &str) -> Option<Self> {
                match name {
                    #(#lookup_arms)*
                    _ => None,
                }
            }
        }

        impl refcode::rt::ToValue for #name {
            fn to_value(&self) -> refcode::Value {
                refcode::Value::Enum(refcode::EnumMember::to_enum_value(self))
            }
        }

        impl refcode::rt::FromValue for #name {
            fn from_value(value: refcode::Value) -> refcode::Result<Self> {
                match value {
                    refcode::Value::Enum(member) => member.to_member::<Self>().ok_or_else(|| {
                        refcode::RefcodeError::ValueMismatch {
                            expected: #expected,
                            found: std::format!("{}.{}", member.canonical_type(), member.name()),
                        }
                    }),
                    other => Err(refcode::RefcodeError::ValueMismatch {
                        expected: #expected,
                        found: other.type_label().to_owned(),
                    }),
                }
            }
        }

        impl From<#name> for refcode::Value {
            fn from(member: #name) -> Self {
                refcode::rt::ToValue::to_value(&member)
            }
        }
    }
}
