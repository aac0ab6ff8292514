//! The two string encodings found in the client binary.
//!
//! The string-table format is idiosyncratic: a `u32` little-endian character
//! count followed by one byte per character with a `0x00` interleaved after
//! every character except the last, so a record for `n` characters occupies
//! `4 + n + (n - 1)` bytes. Plain UTF-16LE occurs elsewhere and serves as the
//! fallback when no length-prefixed occurrence matches.

/// One encoding strategy. The patcher tries encoders in a fixed order and
/// records which one matched.
pub trait Encoder {
    fn name(&self) -> &'static str;
    fn encode(&self, s: &str) -> Vec<u8>;
}

pub struct LengthPrefixed;

impl Encoder for LengthPrefixed {
    fn name(&self) -> &'static str { "length-prefixed" }

    fn encode(&self, s: &str) -> Vec<u8> {
        let chars = s.as_bytes();
        let mut out = Vec::with_capacity(4 + chars.len().saturating_mul(2));
        out.extend_from_slice(&(chars.len() as u32).to_le_bytes());
        for (i, b) in chars.iter().enumerate() {
            out.push(*b);
            // No trailing zero after the final character.
            if i + 1 < chars.len() {
                out.push(0);
            }
        }
        out
    }
}

pub struct Utf16Le;

impl Encoder for Utf16Le {
    fn name(&self) -> &'static str { "utf16-le" }

    fn encode(&self, s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }
}

/// All match offsets of `needle` in `haystack`, including overlapping ones.
/// The caller resolves overlaps via claimed ranges.
pub fn find_occurrences(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return Vec::new();
    }
    haystack
        .windows(needle.len())
        .enumerate()
        .filter(|(_, w)| *w == needle)
        .map(|(i, _)| i)
        .collect()
}
