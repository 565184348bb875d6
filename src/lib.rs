//! Single-shot decompressor for single-block XZ streams carrying one
//! LZMA2-filtered block with LZMA properties fixed at `lc=3, lp=0, pb=2`.
//!
//! The crate takes a fully buffered compressed input and a fully buffered
//! output view and decodes directly into it. There is no streaming mode: the
//! caller sizes the output buffer themselves, typically via a size-query
//! pass ([`decompress`] with an empty `output` slice) before allocating and
//! calling again.
#![cfg_attr(not(feature = "std"), no_std)]

mod cursor;
mod dictionary;
mod error;
mod lzma;
mod lzma2;
mod model;
mod range_dec;
mod state;
mod xz;

pub use crate::error::XzError;
pub use crate::xz::decompress;
