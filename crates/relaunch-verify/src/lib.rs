//! Content verification primitives for downloaded archives.
//!
//! Provides incremental hashing and checksum comparison without enforcing any
//! retry or eviction policy. Validation is a pure function of the bytes and the
//! expected digest; callers decide what to do with a mismatch.

pub use self::digest::{Sha256Hash, hash_file, verify_bytes, verify_file};
pub use self::error::{ParseSha256HashError, Result, VerifyError};
pub use self::hasher::{Hasher, Sha256Hasher, sha256_hex};

mod digest;
mod error;
mod hasher;
