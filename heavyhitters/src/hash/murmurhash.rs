// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::hash::Hasher;

const C1: u64 = 0x87c3_7b91_1142_53d5;
const C2: u64 = 0x4cf5_ad43_2745_937f;
const BLOCK_LEN: usize = 16;

/// Streaming MurmurHash3 x64 128-bit hasher.
///
/// Bytes may arrive in pieces of any size; full 16-byte blocks are mixed as soon as they are
/// complete and the remaining tail is folded in by [`MurmurHash3X64128::finish128`].
#[derive(Debug, Clone)]
pub(crate) struct MurmurHash3X64128 {
    h1: u64,
    h2: u64,
    tail: [u8; BLOCK_LEN],
    tail_len: usize,
    total_len: u64,
}

impl MurmurHash3X64128 {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            h1: seed,
            h2: seed,
            tail: [0; BLOCK_LEN],
            tail_len: 0,
            total_len: 0,
        }
    }

    /// Returns both 64-bit halves of the hash of all bytes written so far.
    pub fn finish128(&self) -> (u64, u64) {
        let mut h1 = self.h1;
        let mut h2 = self.h2;

        let mut k1 = 0u64;
        let mut k2 = 0u64;
        for i in (0..self.tail_len).rev() {
            let byte = self.tail[i] as u64;
            if i >= 8 {
                k2 ^= byte << ((i - 8) * 8);
            } else {
                k1 ^= byte << (i * 8);
            }
        }
        if self.tail_len > 8 {
            h2 ^= mix_k2(k2);
        }
        if self.tail_len > 0 {
            h1 ^= mix_k1(k1);
        }

        h1 ^= self.total_len;
        h2 ^= self.total_len;
        h1 = h1.wrapping_add(h2);
        h2 = h2.wrapping_add(h1);
        h1 = fmix64(h1);
        h2 = fmix64(h2);
        h1 = h1.wrapping_add(h2);
        h2 = h2.wrapping_add(h1);
        (h1, h2)
    }

    fn mix_block(&mut self, block: &[u8; BLOCK_LEN]) {
        let k1 = read_u64_le(block, 0);
        let k2 = read_u64_le(block, 8);

        self.h1 ^= mix_k1(k1);
        self.h1 = self.h1.rotate_left(27).wrapping_add(self.h2);
        self.h1 = self.h1.wrapping_mul(5).wrapping_add(0x52dc_e729);

        self.h2 ^= mix_k2(k2);
        self.h2 = self.h2.rotate_left(31).wrapping_add(self.h1);
        self.h2 = self.h2.wrapping_mul(5).wrapping_add(0x3849_5ab5);
    }
}

impl Hasher for MurmurHash3X64128 {
    fn finish(&self) -> u64 {
        self.finish128().0
    }

    fn write(&mut self, mut bytes: &[u8]) {
        self.total_len += bytes.len() as u64;

        if self.tail_len > 0 {
            let take = (BLOCK_LEN - self.tail_len).min(bytes.len());
            self.tail[self.tail_len..self.tail_len + take].copy_from_slice(&bytes[..take]);
            self.tail_len += take;
            bytes = &bytes[take..];
            if self.tail_len < BLOCK_LEN {
                return;
            }
            let block = self.tail;
            self.mix_block(&block);
            self.tail_len = 0;
        }

        let mut chunks = bytes.chunks_exact(BLOCK_LEN);
        let mut block = [0u8; BLOCK_LEN];
        for chunk in &mut chunks {
            block.copy_from_slice(chunk);
            self.mix_block(&block);
        }
        let rest = chunks.remainder();
        self.tail[..rest.len()].copy_from_slice(rest);
        self.tail_len = rest.len();
    }
}

#[inline]
fn read_u64_le(bytes: &[u8; BLOCK_LEN], offset: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(word)
}

#[inline]
fn mix_k1(k1: u64) -> u64 {
    k1.wrapping_mul(C1).rotate_left(31).wrapping_mul(C2)
}

#[inline]
fn mix_k2(k2: u64) -> u64 {
    k2.wrapping_mul(C2).rotate_left(33).wrapping_mul(C1)
}

#[inline]
fn fmix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    k ^= k >> 33;
    k
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_bytes(bytes: &[u8], seed: u64) -> (u64, u64) {
        let mut hasher = MurmurHash3X64128::with_seed(seed);
        hasher.write(bytes);
        hasher.finish128()
    }

    #[test]
    fn test_empty_input_with_zero_seed() {
        assert_eq!(hash_bytes(&[], 0), (0, 0));
    }

    #[test]
    fn test_reference_vectors() {
        assert_eq!(
            hash_bytes(b"hello", 0),
            (0xcbd8_a7b3_41bd_9b02, 0x5b1e_906a_48ae_1d19)
        );
        // 43 bytes: two full blocks and an 11-byte tail
        assert_eq!(
            hash_bytes(b"The quick brown fox jumps over the lazy dog", 0),
            (0xe34b_bc7b_bc07_1b6c, 0x7a43_3ca9_c49a_9347)
        );
    }

    #[test]
    fn test_split_writes_match_single_write() {
        let data: Vec<u8> = (0u8..=100).collect();
        let expected = hash_bytes(&data, 9001);
        for split in [1, 7, 15, 16, 17, 33, 100] {
            let mut hasher = MurmurHash3X64128::with_seed(9001);
            let (left, right) = data.split_at(split);
            hasher.write(left);
            hasher.write(right);
            assert_eq!(hasher.finish128(), expected, "split at {split}");
        }

        let mut hasher = MurmurHash3X64128::with_seed(9001);
        for byte in &data {
            hasher.write(std::slice::from_ref(byte));
        }
        assert_eq!(hasher.finish128(), expected);
    }

    #[test]
    fn test_seed_changes_output() {
        let data = b"heavy hitter";
        assert_ne!(hash_bytes(data, 1), hash_bytes(data, 2));
        assert_eq!(hash_bytes(data, 1), hash_bytes(data, 1));
    }
}
