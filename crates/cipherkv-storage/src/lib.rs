//! Metadata store backends: a line-oriented file store and a remote key-value store.
//! Both implement `cipherkv_core::store::MetadataStore`.

pub mod file_store;
pub mod remote_store;
