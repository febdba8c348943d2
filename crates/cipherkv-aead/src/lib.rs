//! Password-based AES-256-GCM facade that keeps each ciphertext's nonce and
//! authentication tag in a pluggable metadata store.

pub mod controller;
pub mod error;
pub mod key;

pub use controller::{AeadController, Strategy};
pub use error::AeadError;
