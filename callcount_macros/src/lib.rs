//! You probably want documentation for the [`callcount`](https://docs.rs/callcount) crate.

use proc_macro::TokenStream;
use syn::{parse_macro_input, ItemFn, LitStr};

mod item_fn;

/// Turns a free function into a [`Definition`] that
/// [`Registry::define`] installs as the member named by the argument.
///
/// The argument is `"Type#member"` for an instance member, whose first
/// parameter must take `&Object`, or `"Type.member"` for a static member,
/// whose first parameter must take `&TypeDef`. The remaining parameters
/// become the member's argument tuple. The constant takes the function's
/// name and visibility; the function itself is kept under a hidden name.
///
/// ## Example
/// ```ignore
/// #[method("Widget#render")]
/// fn widget_render(this: &Object, width: u32) -> String {
///     format!("{} wide", width)
/// }
///
/// registry.define(&widget_render)?;
/// obj.send::<(u32,), String>("render", (80,))?;
/// ```
///
/// [`Definition`]: https://docs.rs/callcount/latest/callcount/struct.Definition.html
/// [`Registry::define`]: https://docs.rs/callcount/latest/callcount/struct.Registry.html#method.define
#[proc_macro_attribute]
pub fn method(attr: TokenStream, input: TokenStream) -> TokenStream {
    let target = parse_macro_input!(attr as LitStr);
    let item = parse_macro_input!(input as ItemFn);
    item_fn::method(target, item)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
