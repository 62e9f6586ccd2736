use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{FnArg::Typed, Ident, ItemFn, LitStr};

/// `Owner#member` or `Owner.member`, checked at expansion time.
struct Target {
    owner: String,
    member: String,
    instance: bool,
}

fn parse_target(lit: &LitStr) -> syn::Result<Target> {
    let raw = lit.value();
    let invalid = |why: &str| {
        syn::Error::new(
            lit.span(),
            format!("invalid target {raw:?}: {why}; expected `Type#member` or `Type.member`"),
        )
    };
    let sep = raw
        .find(|c: char| c == '#' || c == '.')
        .ok_or_else(|| invalid("missing `#` or `.`"))?;
    let (owner, rest) = raw.split_at(sep);
    let member = &rest[1..];
    if owner.split("::").any(str::is_empty) {
        return Err(invalid("empty type name"));
    }
    if member.is_empty() || member.contains(|c: char| c == '#' || c == '.') {
        return Err(invalid("member must be a single name"));
    }
    Ok(Target {
        owner: owner.to_owned(),
        member: member.to_owned(),
        instance: rest.starts_with('#'),
    })
}

pub fn method(target: LitStr, mut item: ItemFn) -> syn::Result<TokenStream> {
    let info = parse_target(&target)?;
    let (receiver, fargs, argnums) = gather_info(&item)?;

    let fn_name = item.sig.ident.clone();
    let vis = item.vis.clone();
    let source = Ident::new(&format!("__callcount_source_{fn_name}"), Span::call_site());
    let adapter = Ident::new(&format!("__callcount_adapter_{fn_name}"), Span::call_site());
    let builder = Ident::new(&format!("__callcount_build_{fn_name}"), Span::call_site());
    item.sig.ident = source.clone();
    let output = &item.sig.output;

    let (receiver_ty, kind, constructor) = if info.instance {
        (
            quote! { &callcount::Object },
            quote! { callcount::MemberKind::Instance },
            quote! { callcount::Method::instance },
        )
    } else {
        (
            quote! { &callcount::TypeDef },
            quote! { callcount::MemberKind::Static },
            quote! { callcount::Method::static_method },
        )
    };
    let owner = &info.owner;
    let member = &info.member;

    Ok(quote! {
        #[doc(hidden)]
        #[allow(non_snake_case)]
        #item

        #[doc(hidden)]
        #[allow(non_snake_case, unused_variables)]
        fn #adapter(#receiver: #receiver_ty, args: #fargs) #output {
            #source(#receiver, #(args.#argnums),*)
        }

        #[doc(hidden)]
        #[allow(non_snake_case)]
        fn #builder() -> callcount::Method {
            #constructor(#adapter)
        }

        #[allow(non_upper_case_globals)]
        #vis const #fn_name: callcount::Definition = callcount::Definition::__new(
            #target,
            #owner,
            #member,
            #kind,
            #builder,
        );
    })
}

/// Splits the parameters into the receiver and a tuple of the remaining
/// argument types, plus the tuple indices used to unpack it.
fn gather_info(item: &ItemFn) -> syn::Result<(Ident, syn::Type, Vec<syn::Index>)> {
    if !item.sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &item.sig.generics,
            "generic functions cannot be installed as members",
        ));
    }
    if item.sig.asyncness.is_some() {
        return Err(syn::Error::new_spanned(
            item.sig.asyncness,
            "async functions cannot be installed as members",
        ));
    }

    let mut inputs = item.sig.inputs.iter();
    let receiver = Ident::new("__callcount_receiver", Span::call_site());
    match inputs.next() {
        Some(Typed(_)) => {}
        Some(syn::FnArg::Receiver(r)) => {
            return Err(syn::Error::new_spanned(
                r,
                "use an explicit receiver parameter (`this: &Object` or `ty: &TypeDef`) instead of `self`",
            ))
        }
        None => {
            return Err(syn::Error::new_spanned(
                &item.sig,
                "the first parameter must be the receiver (`&Object` or `&TypeDef`)",
            ))
        }
    }

    let mut args = vec![];
    for input in inputs {
        match input {
            Typed(arg) => args.push(arg.ty.clone()),
            syn::FnArg::Receiver(r) => {
                return Err(syn::Error::new_spanned(r, "unexpected `self` parameter"))
            }
        }
    }

    let argnums = (0..args.len()).map(syn::Index::from).collect();

    let fargs = syn::parse2::<syn::Type>(if args.is_empty() {
        quote! { () }
    } else {
        quote! { (#(#args),*,) }
    })?;

    Ok((receiver, fargs, argnums))
}
