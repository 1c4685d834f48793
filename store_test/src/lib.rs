use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, spanned::Spanned, FnArg, GenericArgument, Ident, ItemFn, Pat,
    PathArguments, Type,
};

/// Turn a synchronous function into a store test running against its own,
/// freshly created MongoDB database.
///
/// Parameters are injected by type: `db: Database` receives the database and
/// `name: Coll<T>` a handle on the collection of `T`. The database is dropped
/// whether the test passes or panics; a panic is then resumed.
///
/// Store tests are ignored by default, since they need a running MongoDB
/// instance; run them with `cargo test -- --ignored` and `RLA_TEST_DB_URI` set.
#[proc_macro_attribute]
pub fn store_test(_args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    if let Some(asyncness) = item_fn.sig.asyncness {
        return syn::Error::new(
            asyncness.span(),
            "store tests use the synchronous driver and cannot be `async`",
        )
        .into_compile_error()
        .into();
    }

    let mut setup = Vec::new();
    let mut call_args = Vec::new();
    let mut has_db = false;
    for input in &item_fn.sig.inputs {
        match injection(input) {
            Some(Injection::Database) if has_db => {
                return syn::Error::new(input.span(), "at most one `Database` can be injected")
                    .into_compile_error()
                    .into();
            }
            Some(Injection::Database) => {
                has_db = true;
                call_args.push(quote! { db.clone() });
            }
            Some(Injection::Collection(ident, ty)) => {
                setup.push(quote! {
                    let #ident = crate::model::mongodb::Coll::<#ty>::from_db(&db);
                });
                call_args.push(quote! { #ident });
            }
            None => {
                return syn::Error::new(
                    input.span(),
                    "expected `db: Database` or `collection: Coll<T>`",
                )
                .into_compile_error()
                .into();
            }
        }
    }

    let name = item_fn.sig.ident.clone();
    let body_name = format_ident!("{}_body", name);
    item_fn.sig.ident = body_name.clone();

    let test: TokenStream2 = quote! {
        #[test]
        #[ignore = "requires a MongoDB instance at RLA_TEST_DB_URI"]
        fn #name() {
            #item_fn

            let db = crate::test_database(stringify!(#name));

            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                #(#setup)*
                #body_name(#(#call_args),*);
            }));

            db.drop(None).unwrap();
            if let Err(panic) = outcome {
                std::panic::resume_unwind(panic);
            }
        }
    };
    test.into()
}

/// What a test parameter asks for.
enum Injection {
    Database,
    Collection(Ident, Type),
}

fn injection(input: &FnArg) -> Option<Injection> {
    let FnArg::Typed(pat_type) = input else {
        return None;
    };
    let Pat::Ident(pat_ident) = &*pat_type.pat else {
        return None;
    };
    let Type::Path(type_path) = &*pat_type.ty else {
        return None;
    };

    let last = type_path.path.segments.last()?;
    match (last.ident.to_string().as_str(), &last.arguments) {
        ("Database", PathArguments::None) => Some(Injection::Database),
        ("Coll", PathArguments::AngleBracketed(generics)) => match generics.args.first()? {
            GenericArgument::Type(ty) => {
                Some(Injection::Collection(pat_ident.ident.clone(), ty.clone()))
            }
            _ => None,
        },
        _ => None,
    }
}
