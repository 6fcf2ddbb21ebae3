//! Procedural macros for alpha function handlers.
//!
//! This crate provides the `#[alpha_handler]` attribute macro, which turns an
//! async function into a type implementing `alpha::function::Handler`.
//!
//! # Example
//!
//! ```ignore
//! use alpha::prelude::*;
//!
//! #[alpha_handler(name = "user-service", description = "Looks up users")]
//! async fn user_service(event: InvocationEvent, ctx: Context) -> Result<Payload, HandlerError> {
//!     Ok(Payload::text(200, format!("{} {}", event.http_method, event.path)))
//! }
//!
//! client.registry().register(UserServiceHandler::NAME, UserServiceHandler::arc())?;
//! ```

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, punctuated::Punctuated, Expr, ExprLit, FnArg, ItemFn, Lit, Meta, Token};

/// Attributes for the `#[alpha_handler]` macro.
#[derive(Default, Debug)]
struct HandlerAttrs {
    /// Function name used for registration. Defaults to the Rust name.
    name: Option<String>,
    /// Optional description.
    description: Option<String>,
}

impl HandlerAttrs {
    fn parse_meta_list(metas: Punctuated<Meta, Token![,]>) -> syn::Result<Self> {
        let mut attrs = HandlerAttrs::default();

        for meta in metas {
            let Meta::NameValue(nv) = meta else {
                return Err(syn::Error::new_spanned(meta, "expected name = value"));
            };
            let ident = nv
                .path
                .get_ident()
                .ok_or_else(|| syn::Error::new_spanned(&nv.path, "expected identifier"))?
                .to_string();

            let value = match &nv.value {
                Expr::Lit(ExprLit { lit: Lit::Str(lit_str), .. }) => lit_str.value(),
                _ => return Err(syn::Error::new_spanned(&nv.value, "expected string literal")),
            };

            match ident.as_str() {
                "name" => attrs.name = Some(value),
                "description" => attrs.description = Some(value),
                _ => {
                    return Err(syn::Error::new_spanned(
                        nv.path,
                        format!("unknown attribute: {}", ident),
                    ));
                }
            }
        }

        Ok(attrs)
    }
}

/// Define a local function handler.
///
/// The annotated function must be `async` and take the invocation event and
/// context:
///
/// ```ignore
/// async fn f(event: InvocationEvent, ctx: Context) -> Result<Payload, HandlerError>
/// ```
///
/// The function is kept as written. Alongside it the macro generates
/// `<PascalName>Handler`, a unit struct implementing `Handler` with `NAME`
/// and `DESCRIPTION` constants.
///
/// # Attributes
///
/// - `name` (optional): function name used for registration (default: the Rust name)
/// - `description` (optional): free-form description
#[proc_macro_attribute]
pub fn alpha_handler(args: TokenStream, input: TokenStream) -> TokenStream {
    let args = parse_macro_input!(args with Punctuated::<Meta, Token![,]>::parse_terminated);
    let input_fn = parse_macro_input!(input as ItemFn);

    match generate_handler(args, input_fn) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn generate_handler(
    args: Punctuated<Meta, Token![,]>,
    input_fn: ItemFn,
) -> syn::Result<proc_macro2::TokenStream> {
    let attrs = HandlerAttrs::parse_meta_list(args)?;

    if input_fn.sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            &input_fn.sig,
            "alpha_handler must be async",
        ));
    }
    if input_fn.sig.inputs.len() != 2
        || input_fn
            .sig
            .inputs
            .iter()
            .any(|arg| matches!(arg, FnArg::Receiver(_)))
    {
        return Err(syn::Error::new_spanned(
            &input_fn.sig.inputs,
            "alpha_handler expects (event: InvocationEvent, ctx: Context)",
        ));
    }

    let fn_name = &input_fn.sig.ident;
    let name = attrs.name.unwrap_or_else(|| fn_name.to_string());
    let description = attrs.description.unwrap_or_default();
    let struct_name = format_ident!("{}Handler", to_pascal_case(&fn_name.to_string()));
    let fn_vis = &input_fn.vis;

    let expanded = quote! {
        #input_fn

        /// Generated handler for the function of the same name.
        #[derive(Debug, Default, Clone, Copy)]
        #fn_vis struct #struct_name;

        #[allow(dead_code)]
        impl #struct_name {
            /// Registration name.
            pub const NAME: &'static str = #name;
            /// Description.
            pub const DESCRIPTION: &'static str = #description;

            /// Create a new instance of the handler.
            pub fn new() -> Self {
                Self
            }

            /// The handler behind an `Arc`, ready to register.
            pub fn arc() -> ::std::sync::Arc<dyn ::alpha::function::Handler> {
                ::std::sync::Arc::new(Self)
            }
        }

        #[::alpha::prelude::async_trait]
        impl ::alpha::function::Handler for #struct_name {
            async fn handle(
                &self,
                event: ::alpha::codec::InvocationEvent,
                context: ::alpha::function::Context,
                _callback: ::alpha::function::Callback,
            ) -> ::std::result::Result<
                ::std::option::Option<::alpha::codec::Payload>,
                ::alpha::function::HandlerError,
            > {
                #fn_name(event, context).await.map(::std::option::Option::Some)
            }
        }
    };

    Ok(expanded)
}

/// Convert a snake_case string to PascalCase.
fn to_pascal_case(s: &str) -> String {
    s.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect()
}
