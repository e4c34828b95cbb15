//! Cursor based byte buffer shared by the transport and the decoders
//!
//! The buffer owns its bytes and a read index. Producers append, consumers
//! advance the index. Bounded reads fail instead of running past the end,
//! `skip` deliberately does not check bounds so that callers can step over
//! optional separators without a prior `has` check.

use bytes::BytesMut;
use q3query_core::{QueryError, Result};

use crate::color::strip_colors;

/// Growable byte sequence with a read cursor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteBuffer {
    data: BytesMut,
    index: usize,
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of bytes held, read or not
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current cursor position (may exceed `len()` after a `skip`)
    pub fn position(&self) -> usize {
        self.index
    }

    /// Number of unread bytes
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.index)
    }

    /// Whether at least `n` unread bytes remain
    pub fn has(&self, n: usize) -> bool {
        self.remaining() >= n
    }

    /// All bytes, including the ones already read
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Bytes from the cursor to the end
    pub fn unread(&self) -> &[u8] {
        let start = self.index.min(self.data.len());
        &self.data[start..]
    }

    /// Read exactly `n` bytes and advance the cursor
    pub fn read(&mut self, n: usize) -> Result<&[u8]> {
        if !self.has(n) {
            return Err(QueryError::BufferUnderrun {
                requested: n,
                remaining: self.remaining(),
            });
        }

        let start = self.index;
        self.index += n;
        Ok(&self.data[start..start + n])
    }

    /// Look at up to `n` bytes without advancing, shorter near the end
    pub fn peek(&self, n: usize) -> &[u8] {
        let unread = self.unread();
        &unread[..n.min(unread.len())]
    }

    /// Advance the cursor without checking against the content length
    pub fn skip(&mut self, n: usize) {
        self.index = self.index.saturating_add(n);
    }

    /// Append bytes at the end, the cursor keeps its position
    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Read a big endian unsigned short
    pub fn read_u16_be(&mut self) -> Result<u16> {
        let bytes = self.read(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Read four bytes as a dotted-decimal IPv4 address
    pub fn read_ipv4(&mut self) -> Result<String> {
        let b = self.read(4)?;
        Ok(format!("{}.{}.{}.{}", b[0], b[1], b[2], b[3]))
    }

    /// Read text up to the first delimiter found
    ///
    /// Delimiters are tried in the given order and the first one that occurs
    /// anywhere in the unread data wins, even when a later candidate occurs
    /// earlier. ioquake3's `fs_manifest` value contains `"\n "` separators, so
    /// reading a value with `["\\", "\n"]` must run past those newlines as
    /// long as another backslash follows.
    ///
    /// # Arguments
    /// * `delimiters` - Candidate delimiters in priority order
    /// * `consume_delimiter` - Skip one byte after the text
    /// * `strip` - Remove `^` colour codes from the decoded text
    pub fn read_delimited(
        &mut self,
        delimiters: &[&[u8]],
        consume_delimiter: bool,
        strip: bool,
    ) -> Result<String> {
        let unread = self.unread();
        let end = delimiters
            .iter()
            .filter(|d| !d.is_empty())
            .find_map(|d| find_subslice(unread, d))
            .ok_or(QueryError::DelimiterNotFound)?;

        let raw = decode_latin1(self.read(end)?);

        if consume_delimiter {
            self.skip(1);
        }

        if strip {
            Ok(strip_colors(&raw).into_owned())
        } else {
            Ok(raw)
        }
    }
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self {
            data: BytesMut::from(&data[..]),
            index: 0,
        }
    }
}

impl From<&[u8]> for ByteBuffer {
    fn from(data: &[u8]) -> Self {
        Self {
            data: BytesMut::from(data),
            index: 0,
        }
    }
}

/// Decode bytes one character per byte (Latin-1), never fails
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
