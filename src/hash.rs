// Copyright 2026 Omnio Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Incremental MD5 with an exportable/importable internal state, so an
//! append session can resume hashing without re-reading prior parts.
//!
//! RustCrypto's `md-5` crate does not expose its raw register state, so
//! this is a small self-contained implementation of the RFC 1321
//! compression function instead of a wrapper around an opaque digest.

use crate::types::Checksum;

const S: [u32; 64] = [
    7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 5, 9, 14, 20, 5, 9, 14, 20, 5, 9,
    14, 20, 5, 9, 14, 20, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 6, 10, 15,
    21, 6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21,
];

const K: [u32; 64] = [
    0xd76aa478, 0xe8c7b756, 0x242070db, 0xc1bdceee, 0xf57c0faf, 0x4787c62a, 0xa8304613, 0xfd469501,
    0x698098d8, 0x8b44f7af, 0xffff5bb1, 0x895cd7be, 0x6b901122, 0xfd987193, 0xa679438e, 0x49b40821,
    0xf61e2562, 0xc040b340, 0x265e5a51, 0xe9b6c7aa, 0xd62f105d, 0x02441453, 0xd8a1e681, 0xe7d3fbc8,
    0x21e1cde6, 0xc33707d6, 0xf4d50d87, 0x455a14ed, 0xa9e3e905, 0xfcefa3f8, 0x676f02d9, 0x8d2a4c8a,
    0xfffa3942, 0x8771f681, 0x6d9d6122, 0xfde5380c, 0xa4beea44, 0x4bdecfa9, 0xf6bb4b60, 0xbebfbc70,
    0x289b7ec6, 0xeaa127fa, 0xd4ef3085, 0x04881d05, 0xd9d4d039, 0xe6db99e5, 0x1fa27cf8, 0xc4ac5665,
    0xf4292244, 0x432aff97, 0xab9423a7, 0xfc93a039, 0x655b59c3, 0x8f0ccc92, 0xffeff47d, 0x85845dd1,
    0x6fa87e4f, 0xfe2ce6e0, 0xa3014314, 0x4e0811a1, 0xf7537e82, 0xbd3af235, 0x2ad7d2bb, 0xeb86d391,
];

/// The exportable internal state of an in-progress MD5 computation: the
/// four working registers, the byte count processed so far, and any
/// unprocessed tail shorter than one 64-byte block.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HashState {
    pub words: [u32; 4],
    pub total_len: u64,
    pub buffer: Vec<u8>,
}

impl HashState {
    /// Encodes the state as the `BIGINT[]` column shape used by
    /// `md5state`: four register words, the low/high halves of the byte
    /// count, then the buffered tail bytes widened to `i64` each.
    pub fn to_words(&self) -> Vec<i64> {
        let mut out = Vec::with_capacity(6 + self.buffer.len());
        out.extend(self.words.iter().map(|w| *w as i64));
        out.push((self.total_len & 0xffff_ffff) as i64);
        out.push((self.total_len >> 32) as i64);
        out.extend(self.buffer.iter().map(|b| *b as i64));
        out
    }

    pub fn from_words(words: &[i64]) -> Option<Self> {
        if words.len() < 6 {
            return None;
        }
        let regs = [
            words[0] as u32,
            words[1] as u32,
            words[2] as u32,
            words[3] as u32,
        ];
        let total_len = (words[4] as u32 as u64) | ((words[5] as u32 as u64) << 32);
        let buffer = words[6..].iter().map(|w| *w as u8).collect();
        Some(Self {
            words: regs,
            total_len,
            buffer,
        })
    }
}

/// Incremental MD5 hasher. `update` may be called any number of times;
/// `digest` finalizes a *copy* of the state, leaving the hasher able to
/// keep accumulating (needed so a write stream can both report a
/// checksum and continue appending in the same session).
#[derive(Debug, Clone)]
pub struct Md5Hasher {
    state: [u32; 4],
    total_len: u64,
    buffer: Vec<u8>,
}

impl Default for Md5Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Md5Hasher {
    pub fn new() -> Self {
        Self {
            state: [0x67452301, 0xefcdab89, 0x98badcfe, 0x10325476],
            total_len: 0,
            buffer: Vec::with_capacity(64),
        }
    }

    pub fn from_state(state: HashState) -> Self {
        Self {
            state: state.words,
            total_len: state.total_len,
            buffer: state.buffer,
        }
    }

    pub fn export_state(&self) -> HashState {
        HashState {
            words: self.state,
            total_len: self.total_len,
            buffer: self.buffer.clone(),
        }
    }

    pub fn update(&mut self, mut data: &[u8]) {
        self.total_len = self.total_len.wrapping_add(data.len() as u64);

        if !self.buffer.is_empty() {
            let need = 64 - self.buffer.len();
            let take = need.min(data.len());
            self.buffer.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.buffer.len() == 64 {
                let block = std::mem::take(&mut self.buffer);
                self.process_block(&block);
            } else {
                return;
            }
        }

        while data.len() >= 64 {
            self.process_block(&data[..64]);
            data = &data[64..];
        }

        if !data.is_empty() {
            self.buffer.extend_from_slice(data);
        }
    }

    fn process_block(&mut self, block: &[u8]) {
        debug_assert_eq!(block.len(), 64);
        let mut m = [0u32; 16];
        for (i, chunk) in block.chunks_exact(4).enumerate() {
            m[i] = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }

        let [mut a, mut b, mut c, mut d] = self.state;
        for i in 0..64 {
            let (f, g) = match i {
                0..=15 => ((b & c) | (!b & d), i),
                16..=31 => ((d & b) | (!d & c), (5 * i + 1) % 16),
                32..=47 => (b ^ c ^ d, (3 * i + 5) % 16),
                _ => (c ^ (b | !d), (7 * i) % 16),
            };
            let f = f
                .wrapping_add(a)
                .wrapping_add(K[i])
                .wrapping_add(m[g]);
            a = d;
            d = c;
            c = b;
            b = b.wrapping_add(f.rotate_left(S[i]));
        }

        self.state[0] = self.state[0].wrapping_add(a);
        self.state[1] = self.state[1].wrapping_add(b);
        self.state[2] = self.state[2].wrapping_add(c);
        self.state[3] = self.state[3].wrapping_add(d);
    }

    /// Finalizes a copy of the current state into a 32-hex-char digest.
    /// Does not consume `self`: callers that need to keep hashing (e.g.
    /// a write stream computing an interim checksum) may call this any
    /// number of times.
    pub fn digest(&self) -> Checksum {
        let mut scratch = self.clone();
        let bit_len = scratch.total_len.wrapping_mul(8);

        scratch.buffer.push(0x80);
        while scratch.buffer.len() % 64 != 56 {
            scratch.buffer.push(0);
        }
        scratch.buffer.extend_from_slice(&bit_len.to_le_bytes());

        let blocks: Vec<u8> = std::mem::take(&mut scratch.buffer);
        for block in blocks.chunks_exact(64) {
            scratch.process_block(block);
        }

        let mut out = [0u8; 16];
        for (i, word) in scratch.state.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }
        Checksum::from_hex(hex::encode(out)).expect("digest is always 32 hex chars")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn md5(data: &[u8]) -> String {
        let mut h = Md5Hasher::new();
        h.update(data);
        h.digest().as_str().to_string()
    }

    #[test]
    fn known_vectors() {
        assert_eq!(md5(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5(b"foo"), "acbd18db4cc2f85cedef654fccc4a4d8");
        assert_eq!(md5(b"foobarbaz"), md5(b"foobarbaz"));
    }

    #[test]
    fn chunked_update_matches_single_shot() {
        let mut a = Md5Hasher::new();
        a.update(b"foobarbaz");

        let mut b = Md5Hasher::new();
        b.update(b"foo");
        b.update(b"bar");
        b.update(b"baz");

        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn state_roundtrips_through_word_encoding() {
        let mut h = Md5Hasher::new();
        h.update(b"foo");
        let state = h.export_state();
        let words = state.to_words();
        let restored = HashState::from_words(&words).unwrap();
        assert_eq!(state, restored);

        let mut resumed = Md5Hasher::from_state(restored);
        resumed.update(b"barbaz");
        assert_eq!(resumed.digest().as_str(), "6df23dc03f9b54cc38a0fc1483df6e21");
    }

    #[test]
    fn resume_across_sessions_matches_one_shot() {
        let one_shot = md5(b"foobarbaz");

        let mut first = Md5Hasher::new();
        first.update(b"foo");
        let state = first.export_state();

        let mut second = Md5Hasher::from_state(state);
        second.update(b"barbaz");
        assert_eq!(second.digest().as_str(), one_shot);
    }
}
