//! Core abstractions for cipherkv: hash-addressed value codec and the metadata store contract.
//! Backends live in `cipherkv-storage`; this crate keeps the dependency surface small.

pub mod codec;
pub mod store;
