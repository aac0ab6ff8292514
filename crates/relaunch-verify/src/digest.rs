use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{ParseSha256HashError, Result, VerifyError};
use crate::hasher::{Hasher, Sha256Hasher};

/// A validated lowercase hex SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sha256Hash(String);

impl std::str::FromStr for Sha256Hash {
    type Err = ParseSha256HashError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 64 {
            return Err(ParseSha256HashError(s.to_string()));
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseSha256HashError(s.to_string()));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }
}

impl Sha256Hash {
    pub fn from_hex(s: &str) -> std::result::Result<Self, ParseSha256HashError> { s.parse() }

    pub fn of_bytes(data: &[u8]) -> Self { Self(hex::encode(Sha256Hasher::digest(data))) }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl std::fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(&self.0) }
}

/// Stream a file through the hasher in fixed-size chunks.
pub fn hash_file(path: &Path) -> Result<Sha256Hash> {
    let mut file = File::open(path).map_err(|source| VerifyError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut hasher = Sha256Hasher::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(|source| VerifyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Sha256Hash(hex::encode(hasher.finalize())))
}

/// Compare bytes against an expected digest.
pub fn verify_bytes(path: &Path, data: &[u8], expected: &Sha256Hash) -> Result<()> {
    let actual = Sha256Hash::of_bytes(data);
    if actual == *expected {
        Ok(())
    } else {
        Err(VerifyError::Mismatch {
            path:     path.to_path_buf(),
            expected: expected.as_str().to_string(),
            actual:   actual.as_str().to_string(),
        })
    }
}

/// Compare a file's content digest against an expected digest.
pub fn verify_file(path: &Path, expected: &Sha256Hash) -> Result<()> {
    let actual = hash_file(path)?;
    if actual == *expected {
        Ok(())
    } else {
        Err(VerifyError::Mismatch {
            path:     path.to_path_buf(),
            expected: expected.as_str().to_string(),
            actual:   actual.as_str().to_string(),
        })
    }
}
