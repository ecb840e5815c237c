//! Newline-delimited JSON framing.
//!
//! Transport reads do not line up with records: one read may hold several
//! records, end in the middle of one, or even split a multi-byte character.
//! [`NdjsonDecoder`] keeps the unfinished tail between reads and only decodes
//! a line once its `\n` has arrived. A `\n` byte never occurs inside a UTF-8
//! sequence, so cutting on it keeps characters whole.

use bytes::Bytes;
use serde::Serialize;
use std::string::FromUtf8Error;

pub type Line = Result<String, FromUtf8Error>;

#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    pending: Vec<u8>,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport read and return every line it completed.
    /// Blank lines are skipped and a trailing `\r` is stripped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Line> {
        // Bytes already pending hold no newline; only the new read is scanned.
        let mut from = self.pending.len();
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.pending[from..].iter().position(|b| *b == b'\n') {
            let end = from + pos;
            let line = trim_cr(&self.pending[start..end]);
            if !is_blank(line) {
                lines.push(String::from_utf8(line.to_vec()));
            }
            start = end + 1;
            from = start;
        }
        self.pending.drain(..start);
        lines
    }

    /// Flush whatever is left once the stream has ended. An unterminated
    /// final record is still handed out.
    pub fn finish(&mut self) -> Option<Line> {
        let rest = std::mem::take(&mut self.pending);
        let line = trim_cr(&rest);
        if is_blank(line) {
            None
        } else {
            Some(String::from_utf8(line.to_vec()))
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Serialize `value` as one NDJSON record: compact JSON plus `\n`.
pub fn encode_line<T: Serialize + ?Sized>(value: &T) -> Result<Bytes, serde_json::Error> {
    let mut buf = serde_json::to_vec(value)?;
    buf.push(b'\n');
    Ok(Bytes::from(buf))
}

fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}
