//! Procedural macros used across the kernel workspace.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

/// Derives `AnyRepr` for a `#[repr(C)]` struct, marking it as safe to
/// reinterpret from an arbitrary byte buffer of the right size.
///
/// This is used for on-disk structures (the MINIX superblock, inode, and
/// directory entry) and the ELF header, all read directly out of a block or
/// file buffer without a parsing pass. Network headers are hand-built
/// field-by-field instead, since their wire byte order disagrees with the
/// host's and a direct cast would silently read them wrong.
///
/// The caller is responsible for only deriving this on types which have no
/// invalid bit patterns (plain old data: integers, arrays of such, and other
/// `AnyRepr` types).
#[proc_macro_derive(AnyRepr)]
pub fn derive_any_repr(input: TokenStream) -> TokenStream {
	let input = parse_macro_input!(input as DeriveInput);
	let name = input.ident;
	let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
	let expanded = quote! {
		unsafe impl #impl_generics utils::AnyRepr for #name #ty_generics #where_clause {}
	};
	expanded.into()
}
