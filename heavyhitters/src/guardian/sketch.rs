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

use std::hash::Hash;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::trace;

use crate::counter::CounterValue;
use crate::counter::StreamCounter;
use crate::guardian::bucket::Bucket;
use crate::guardian::bucket::Cell;
use crate::hash::DEFAULT_SEED;
use crate::hash::hash_item;

/// Base of the exponential decay applied to the weakest heavy guardian.
pub const DECAY_BASE: f64 = 1.08;

/// Path taken by [`GuardianSketch::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Insertion {
    /// The item already held a cell, which was incremented.
    Incremented,
    /// The item took a free heavy or light cell.
    Stored,
    /// The item replaced the weakest heavy guardian of its bucket.
    Replaced,
    /// The weakest guardian survived decay and the light part had no room.
    Dropped,
}

/// Guardian sketch for approximate per-item frequencies in bounded memory.
///
/// See [`crate::guardian`] for an overview of the insert procedure.
#[derive(Debug, Clone)]
pub struct GuardianSketch<T, C = u64> {
    num_buckets: usize,
    heavy_capacity: usize,
    light_capacity: usize,
    seed: u64,
    insert_count: u64,
    buckets: Vec<Bucket<T, C>>,
    rng: StdRng,
}

impl<T: Eq + Hash, C: CounterValue> GuardianSketch<T, C> {
    /// Creates a sketch with `num_buckets` buckets, each holding up to `heavy_capacity` heavy
    /// cells and `light_capacity` light cells.
    ///
    /// # Panics
    ///
    /// Panics if `num_buckets` or `heavy_capacity` is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// # use heavyhitters::guardian::GuardianSketch;
    /// let sketch = GuardianSketch::<u64>::new(8, 4, 2);
    /// assert_eq!(sketch.num_buckets(), 8);
    /// assert!(sketch.is_empty());
    /// ```
    pub fn new(num_buckets: usize, heavy_capacity: usize, light_capacity: usize) -> Self {
        Self::with_seed(num_buckets, heavy_capacity, light_capacity, DEFAULT_SEED)
    }

    /// Creates a sketch whose bucket routing and decay sampling are both derived from `seed`.
    ///
    /// # Panics
    ///
    /// Panics if `num_buckets` or `heavy_capacity` is zero.
    pub fn with_seed(
        num_buckets: usize,
        heavy_capacity: usize,
        light_capacity: usize,
        seed: u64,
    ) -> Self {
        assert!(num_buckets > 0, "num_buckets must be at least 1");
        assert!(heavy_capacity > 0, "heavy_capacity must be at least 1");
        let buckets = (0..num_buckets)
            .map(|_| Bucket::with_capacity(heavy_capacity, light_capacity))
            .collect();
        Self {
            num_buckets,
            heavy_capacity,
            light_capacity,
            seed,
            insert_count: 0,
            buckets,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Returns the number of buckets.
    pub fn num_buckets(&self) -> usize {
        self.num_buckets
    }

    /// Returns the number of heavy cells per bucket.
    pub fn heavy_capacity(&self) -> usize {
        self.heavy_capacity
    }

    /// Returns the number of light cells per bucket.
    pub fn light_capacity(&self) -> usize {
        self.light_capacity
    }

    /// Returns the seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the number of `insert` calls issued since creation or the last reset.
    pub fn insert_count(&self) -> u64 {
        self.insert_count
    }

    /// Returns true if no cell is occupied.
    pub fn is_empty(&self) -> bool {
        self.num_tracked() == 0
    }

    /// Returns the number of occupied cells over all buckets.
    pub fn num_tracked(&self) -> usize {
        self.buckets
            .iter()
            .map(|bucket| bucket.heavy.len() + bucket.light.len())
            .sum()
    }

    /// Returns the bucket index `item` is routed to.
    pub fn bucket_of(&self, item: &T) -> usize {
        (hash_item(item, self.seed) % self.num_buckets as u64) as usize
    }

    /// Returns the number of occupied `(heavy, light)` cells of the bucket at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not less than [`GuardianSketch::num_buckets`].
    pub fn bucket_occupancy(&self, index: usize) -> (usize, usize) {
        let bucket = &self.buckets[index];
        (bucket.heavy.len(), bucket.light.len())
    }

    /// Counts one occurrence of `item`.
    ///
    /// Returns `false` if the heavy part of the item's bucket is full, its weakest guardian
    /// survived decay, and the light part has no room for the item.
    pub fn insert(&mut self, item: T) -> bool {
        self.record(item) != Insertion::Dropped
    }

    /// Counts one occurrence of `item` and reports which path the insert took.
    pub fn record(&mut self, item: T) -> Insertion {
        self.insert_count += 1;
        let index = self.bucket_of(&item);
        let heavy_capacity = self.heavy_capacity;
        let bucket = &mut self.buckets[index];

        if let Some(pos) = bucket.heavy_position(&item) {
            let cell = &mut bucket.heavy[pos];
            cell.count = cell.count.add(C::ONE);
            return Insertion::Incremented;
        }

        if bucket.heavy.len() < heavy_capacity {
            bucket.heavy.push(Cell {
                item,
                count: C::ONE,
            });
            return Insertion::Stored;
        }

        // heavy_capacity > 0, so a full heavy part always has a weakest cell
        let Some((weakest, decayed)) = self.decay_weakest(index) else {
            return Insertion::Dropped;
        };
        let light_capacity = self.light_capacity;
        let bucket = &mut self.buckets[index];

        if decayed <= C::ZERO {
            if let Some(pos) = bucket.light_position(&item) {
                bucket.light.remove(pos);
            }
            bucket.heavy[weakest] = Cell {
                item,
                count: C::ONE,
            };
            trace!(bucket = index, cell = weakest, "evicted weakest heavy guardian");
            return Insertion::Replaced;
        }
        bucket.heavy[weakest].count = decayed;

        if let Some(pos) = bucket.light_position(&item) {
            let cell = &mut bucket.light[pos];
            cell.count = cell.count.add(C::ONE);
            return Insertion::Incremented;
        }

        if bucket.light.len() < light_capacity {
            bucket.light.push(Cell {
                item,
                count: C::ONE,
            });
            return Insertion::Stored;
        }

        trace!(bucket = index, "dropped insert into full bucket");
        Insertion::Dropped
    }

    /// Applies one round of exponential decay to the weakest heavy guardian of the bucket at
    /// `index` without admitting any item.
    ///
    /// Returns whether the guardian lost a unit. A guardian that reaches zero keeps its cell
    /// until the next item routed to the bucket replaces it. This does not count as an insert.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not less than [`GuardianSketch::num_buckets`].
    pub fn decay(&mut self, index: usize) -> bool {
        let Some((weakest, decayed)) = self.decay_weakest(index) else {
            return false;
        };
        let cell = &mut self.buckets[index].heavy[weakest];
        let lost = decayed < cell.count;
        cell.count = decayed;
        lost
    }

    /// Stores `item` with `count` in a free heavy cell of its bucket.
    ///
    /// Returns `false`, leaving the sketch untouched, if the item already occupies a cell or
    /// the heavy part of its bucket is full. This does not count as an insert.
    pub fn place(&mut self, item: T, count: C) -> bool {
        let index = self.bucket_of(&item);
        let heavy_capacity = self.heavy_capacity;
        let bucket = &mut self.buckets[index];
        if bucket.heavy.len() >= heavy_capacity || bucket.query(&item).is_some() {
            return false;
        }
        bucket.heavy.push(Cell { item, count });
        true
    }

    /// Returns the heavy cells of the bucket at `index` in cell order.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not less than [`GuardianSketch::num_buckets`].
    pub fn heavy_cells(&self, index: usize) -> impl Iterator<Item = (&T, C)> + '_ {
        self.buckets[index]
            .heavy
            .iter()
            .map(|cell| (&cell.item, cell.count))
    }

    /// Returns the weakest heavy guardian of the bucket at `index`, if any.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not less than [`GuardianSketch::num_buckets`].
    pub fn weakest(&self, index: usize) -> Option<(&T, C)> {
        let bucket = &self.buckets[index];
        bucket
            .weakest_heavy()
            .map(|pos| (&bucket.heavy[pos].item, bucket.heavy[pos].count))
    }

    /// Rewrites the count of every occupied cell of the bucket at `index` with `f`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not less than [`GuardianSketch::num_buckets`].
    pub fn update_bucket<F>(&mut self, index: usize, mut f: F)
    where
        F: FnMut(&T, C) -> C,
    {
        let bucket = &mut self.buckets[index];
        for cell in bucket.heavy.iter_mut().chain(bucket.light.iter_mut()) {
            cell.count = f(&cell.item, cell.count);
        }
    }

    /// Samples decay for the weakest heavy guardian of the bucket at `index`.
    ///
    /// Returns its cell position and decayed count. The count is not written back.
    fn decay_weakest(&mut self, index: usize) -> Option<(usize, C)> {
        let bucket = &self.buckets[index];
        let weakest = bucket.weakest_heavy()?;
        let count = bucket.heavy[weakest].count;
        let decayed = if count <= C::ZERO {
            count
        } else if self.rng.random_bool(decay_probability(count)) {
            count.decrement()
        } else {
            count
        };
        Some((weakest, decayed))
    }

    /// Returns the stored count of `item`, or zero if it occupies no cell.
    ///
    /// A heavy cell takes precedence over a light cell for the same item.
    pub fn query(&self, item: &T) -> C {
        self.buckets[self.bucket_of(item)]
            .query(item)
            .unwrap_or(C::ZERO)
    }

    /// Returns the items occupying a cell, bucket by bucket, heavy cells first.
    pub fn tracked_items(&self) -> Vec<&T> {
        self.buckets
            .iter()
            .flat_map(|bucket| bucket.heavy.iter().chain(bucket.light.iter()))
            .map(|cell| &cell.item)
            .collect()
    }

    /// Rewrites the count of every occupied cell with `f`.
    pub fn update_counts<F>(&mut self, mut f: F)
    where
        F: FnMut(C) -> C,
    {
        for bucket in &mut self.buckets {
            for cell in bucket.heavy.iter_mut().chain(bucket.light.iter_mut()) {
                cell.count = f(cell.count);
            }
        }
    }

    /// Empties every bucket and restarts decay sampling from the seed.
    pub fn reset(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.insert_count = 0;
        self.rng = StdRng::seed_from_u64(self.seed);
    }
}

impl<T: Eq + Hash, C: CounterValue> StreamCounter<T> for GuardianSketch<T, C> {
    type Count = C;

    fn insert(&mut self, item: T) -> bool {
        GuardianSketch::insert(self, item)
    }

    fn query(&self, item: &T) -> C {
        GuardianSketch::query(self, item)
    }

    fn insert_count(&self) -> u64 {
        self.insert_count
    }

    fn tracked_items(&self) -> Vec<&T> {
        GuardianSketch::tracked_items(self)
    }

    fn update_counts<F>(&mut self, f: F)
    where
        F: FnMut(C) -> C,
    {
        GuardianSketch::update_counts(self, f)
    }
}

/// Probability `b^-C` that a guardian holding `count` loses one unit.
fn decay_probability<C: CounterValue>(count: C) -> f64 {
    DECAY_BASE.powf(-count.to_f64()).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decay_probability_shrinks_with_count() {
        assert_eq!(decay_probability(0u64), 1.0);
        assert!((decay_probability(1u64) - 1.0 / 1.08).abs() < 1e-12);
        assert!(decay_probability(100u64) < decay_probability(10u64));
    }

    #[test]
    fn test_reset_restores_fresh_state() {
        let mut sketch = GuardianSketch::<u64>::with_seed(2, 1, 1, 7);
        for item in 0..100 {
            sketch.insert(item % 10);
        }
        sketch.reset();
        assert!(sketch.is_empty());
        assert_eq!(sketch.insert_count(), 0);
        assert_eq!(sketch.query(&0), 0);
    }
}
