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

//! Guardian sketch for approximate frequency counting in bounded memory.
//!
//! The sketch hashes every item into one of `w` buckets. Each bucket owns two small arrays of
//! `(item, count)` cells ("guardians"):
//!
//! * a **heavy part** of at most `λh` cells, meant to hold the frequent items of the bucket;
//! * a **light part** of at most `λl` cells (possibly zero) that catches items the heavy part
//!   has no room for.
//!
//! Memory is therefore fixed at `w · (λh + λl)` cells regardless of stream length.
//!
//! # Insert procedure
//!
//! 1. An item already guarded in the heavy part has its count incremented.
//! 2. Otherwise, if the heavy part has a free cell, the item takes it with count 1.
//! 3. Otherwise the weakest heavy guardian (minimum count, lowest index on ties) decays by one
//!    with probability `b^-C`, where `b` is [`DECAY_BASE`] and `C` its count. A guardian that
//!    decays to zero is evicted and the new item takes its cell with count 1. If the new item
//!    also sat in the light part, that light cell is released.
//! 4. If the guardian survives, the item is counted in the light part: incremented if present,
//!    added if there is room, dropped otherwise. A dropped insert returns `false`.
//!
//! Every call to `insert` counts toward [`GuardianSketch::insert_count`], dropped or not.
//! [`GuardianSketch::record`] runs the same procedure and returns the [`Insertion`] path taken.
//!
//! The LDP sessions built on the sketch also drive it directly: [`GuardianSketch::decay`] runs
//! step 3 without admitting an item, [`GuardianSketch::place`] fills free heavy cells, and
//! [`GuardianSketch::update_bucket`] rewrites the counts of one bucket.
//!
//! # Usage
//!
//! ```rust
//! # use heavyhitters::guardian::GuardianSketch;
//! let mut sketch = GuardianSketch::<&str>::with_seed(16, 4, 2, 42);
//! for _ in 0..100 {
//!     sketch.insert("apple");
//! }
//! sketch.insert("pear");
//! assert_eq!(sketch.query(&"apple"), 100);
//! assert_eq!(sketch.query(&"plum"), 0);
//! assert_eq!(sketch.insert_count(), 101);
//! ```
//!
//! # Count types
//!
//! The count type `C` defaults to `u64`. Any [`CounterValue`](crate::counter::CounterValue)
//! works; the LDP session uses `f64` so that warm-up counts can be rewritten in place.

mod bucket;
mod sketch;

pub use self::sketch::DECAY_BASE;
pub use self::sketch::GuardianSketch;
pub use self::sketch::Insertion;
