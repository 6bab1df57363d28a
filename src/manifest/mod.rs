//! Derivation manifests
//!
//! A manifest records the inputs, outputs and hashes of one (symbol, year,
//! timeframe) derivation and is what makes repeated derivations cheap.

mod hash;
mod types;

pub use hash::{count_surrogate, sha256_bytes, sha256_file};
pub use types::{DerivationManifest, DeriveParams, ManifestError};
