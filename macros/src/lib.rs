use proc_macro::TokenStream;
use syn_utils::into_macro_output;

#[macro_use]
mod syn_utils;

mod merge_impl;

/// Derives `Merge` for a struct with named fields.
///
/// | Field                   | Merged value                                  |
/// |-------------------------|-----------------------------------------------|
/// | `#[merge(skip)]`        | always the current value                      |
/// | `Option<_>`             | the partial value if `Some`, else the current |
/// | any other type          | the partial value                             |
///
/// Every field type must implement `Clone`.
///
/// # Examples
///
/// ```ignore
/// #[derive(Clone, Merge)]
/// struct Settings {
///     theme: Option<String>,
///     font_size: Option<u32>,
///     #[merge(skip)]
///     revision: u64,
/// }
/// ```
#[proc_macro_derive(Merge, attributes(merge))]
pub fn derive_merge(input: TokenStream) -> TokenStream {
    into_macro_output(merge_impl::derive_merge(input.into()))
}
