//! Query string arguments
//!
//! Byte-oriented `key=value` decoding. Values stay raw bytes so the search
//! path never has to validate UTF-8.

use smallvec::SmallVec;

/// Source of request parameters for the search stub
pub trait Params {
    /// Raw value of `key`, if present
    fn bytes(&self, key: &str) -> Option<&[u8]>;

    /// Value of `key` as an unsigned integer, zero if absent or unparsable
    fn uint_or_zero(&self, key: &str) -> usize {
        self.bytes(key).and_then(parse_uint).unwrap_or(0)
    }
}

/// Decoded query string arguments
#[derive(Debug, Clone, Default)]
pub struct QueryArgs {
    pairs: SmallVec<[(Vec<u8>, Vec<u8>); 8]>,
}

impl QueryArgs {
    /// Create an empty argument list
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a query string (without the leading `?`)
    pub fn parse(query: &[u8]) -> Self {
        let mut args = Self::new();
        for pair in query.split(|&b| b == b'&') {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = match pair.iter().position(|&b| b == b'=') {
                Some(eq) => (&pair[..eq], &pair[eq + 1..]),
                None => (pair, &[][..]),
            };
            args.pairs.push((decode(key), decode(value)));
        }
        args
    }

    /// Append an already-decoded argument
    pub fn add(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// First value stored under `key`
    pub fn peek(&self, key: &str) -> Option<&[u8]> {
        self.pairs
            .iter()
            .find(|(k, _)| k.as_slice() == key.as_bytes())
            .map(|(_, v)| v.as_slice())
    }

    /// Number of pairs, duplicates included
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when the query carried no pairs
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl Params for QueryArgs {
    fn bytes(&self, key: &str) -> Option<&[u8]> {
        self.peek(key)
    }
}

/// Parse a non-empty run of ASCII digits. Signs, whitespace and overflow
/// are rejected.
pub fn parse_uint(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() {
        return None;
    }
    bytes.iter().try_fold(0usize, |acc, &b| {
        if !b.is_ascii_digit() {
            return None;
        }
        acc.checked_mul(10)?.checked_add((b - b'0') as usize)
    })
}

/// Percent-decoding with `+` as space; malformed escapes pass through
fn decode(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'%' if i + 2 < raw.len() => {
                match (hex_val(raw[i + 1]), hex_val(raw[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 3;
                        continue;
                    }
                    _ => out.push(b'%'),
                }
            }
            b'+' => out.push(b' '),
            b => out.push(b),
        }
        i += 1;
    }
    out
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
