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

//! Counting back-ends for streams of items.
//!
//! A [`StreamCounter`] stores "how many times was this item seen". Two implementations ship with
//! this crate:
//!
//! * [`ExactCounter`] keeps one entry per distinct item and never drops an insert.
//! * [`GuardianSketch`](crate::guardian::GuardianSketch) keeps a fixed number of cells and may
//!   evict or drop infrequent items.
//!
//! [`CounterBackend`] selects between the two at runtime, which is what configuration-driven
//! callers use.
//!
//! # Usage
//!
//! ```rust
//! # use heavyhitters::counter::ExactCounter;
//! # use heavyhitters::counter::StreamCounter;
//! let mut counter = ExactCounter::<&str>::new();
//! counter.insert("apple");
//! counter.insert("apple");
//! assert_eq!(counter.query(&"apple"), 2);
//! assert_eq!(counter.query(&"pear"), 0);
//! assert_eq!(counter.insert_count(), 2);
//! ```

mod backend;
mod exact;
mod value;

pub use self::backend::CounterBackend;
pub use self::exact::ExactCounter;
pub use self::value::CounterValue;

/// Capability shared by every counting back-end.
pub trait StreamCounter<T> {
    /// The count type reported by [`StreamCounter::query`].
    type Count: CounterValue;

    /// Counts one occurrence of `item`.
    ///
    /// Returns `false` if the item could not be stored. The call is still reflected in
    /// [`StreamCounter::insert_count`].
    fn insert(&mut self, item: T) -> bool;

    /// Returns the stored count of `item`, or zero if it is not tracked.
    fn query(&self, item: &T) -> Self::Count;

    /// Returns the number of `insert` calls issued, successful or not.
    fn insert_count(&self) -> u64;

    /// Returns the items currently holding a count.
    fn tracked_items(&self) -> Vec<&T>;

    /// Rewrites every stored count with `f`.
    fn update_counts<F>(&mut self, f: F)
    where
        F: FnMut(Self::Count) -> Self::Count;
}
