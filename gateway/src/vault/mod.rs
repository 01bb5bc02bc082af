//! Encryption at rest for cluster-issued OAuth tokens.

pub mod builtin;

pub use builtin::VaultCrypto;
