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

//! Seeded hashing used to route items to sketch buckets.

mod murmurhash;

use std::hash::Hash;
use std::hash::Hasher;

pub(crate) use self::murmurhash::MurmurHash3X64128;

/// Default seed used when a sketch is created without an explicit seed.
pub(crate) const DEFAULT_SEED: u64 = 9001;

/// Hashes `item` through its [`Hash`] impl with a seeded MurmurHash3.
#[inline]
pub(crate) fn hash_item<T: Hash + ?Sized>(item: &T, seed: u64) -> u64 {
    let mut hasher = MurmurHash3X64128::with_seed(seed);
    item.hash(&mut hasher);
    hasher.finish()
}
