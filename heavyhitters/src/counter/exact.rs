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

use std::collections::HashMap;
use std::hash::Hash;

use super::CounterValue;
use super::StreamCounter;

/// Exact per-item counter backed by a hash map.
///
/// Memory grows with the number of distinct items, and every insert succeeds.
#[derive(Debug, Clone)]
pub struct ExactCounter<T, C = u64> {
    counts: HashMap<T, C>,
    insert_count: u64,
}

impl<T: Eq + Hash, C: CounterValue> ExactCounter<T, C> {
    /// Creates an empty counter.
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
            insert_count: 0,
        }
    }

    /// Creates an empty counter with room for `capacity` distinct items.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            counts: HashMap::with_capacity(capacity),
            insert_count: 0,
        }
    }

    /// Returns the number of distinct items counted.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns true if nothing has been counted.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl<T: Eq + Hash, C: CounterValue> Default for ExactCounter<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Eq + Hash, C: CounterValue> StreamCounter<T> for ExactCounter<T, C> {
    type Count = C;

    fn insert(&mut self, item: T) -> bool {
        self.insert_count += 1;
        let count = self.counts.entry(item).or_insert(C::ZERO);
        *count = count.add(C::ONE);
        true
    }

    fn query(&self, item: &T) -> C {
        self.counts.get(item).copied().unwrap_or(C::ZERO)
    }

    fn insert_count(&self) -> u64 {
        self.insert_count
    }

    fn tracked_items(&self) -> Vec<&T> {
        self.counts.keys().collect()
    }

    fn update_counts<F>(&mut self, mut f: F)
    where
        F: FnMut(C) -> C,
    {
        for count in self.counts.values_mut() {
            *count = f(*count);
        }
    }
}
