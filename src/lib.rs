//! Minimalistic streaming CBOR codec for constrained environments.
//!
//! The decoder walks a caller-provided byte slice item by item without
//! allocating; byte and text strings are returned as sub-slices of the
//! input. With the `packed` feature enabled, shared-item references and
//! table definitions (packed CBOR, tag 113) are reconstructed transparently
//! at the head of every typed read.

#![no_std]

#[cfg(test)]
extern crate std;

use thiserror::Error;

pub mod decode;
pub mod encode;

#[cfg(feature = "packed")]
mod packed;


#[cfg(test)]
mod encode_tests;



/// Depth bound for `skip` and for packed-CBOR unpacking.
pub const RECURSION_MAX: u8 = 16;

/// Capacity of the active shared-item table stack.
#[cfg(feature = "packed")]
pub const PACKED_TABLES_MAX: usize = 4;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("value does not fit the requested width")]
    Overflow,

    #[error("item is not of the expected type")]
    InvalidType,

    #[error("not enough data for encoded value")]
    EndOfInput,

    #[error("map key not found")]
    NotFound,

    #[error("maximum recursion depth reached")]
    Recursion,

    #[error("malformed packed CBOR construct")]
    PackedFormat,

    #[error("shared item table stack exhausted")]
    PackedMemory,

    #[error("shared item reference out of range")]
    PackedUndefinedReference,
}
