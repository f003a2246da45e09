//! Hashing primitives shared by veritree's authenticated data structures.
//!
//! The tree engines never assume anything about a digest beyond its length
//! and determinism; everything algorithm-specific lives behind the
//! [`hash::Hasher`] capability defined here.

#![warn(rust_2018_idioms, unused_lifetimes)]
#![warn(unused_qualifications)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod hash;

pub use hash::{Digest, HashAlgorithm, Hasher};
