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

use crate::counter::CounterValue;

/// One `(item, count)` guardian.
#[derive(Debug, Clone)]
pub(super) struct Cell<T, C> {
    pub(super) item: T,
    pub(super) count: C,
}

/// Cells of one bucket, kept as ordered arrays so iteration and tie-breaks are deterministic.
#[derive(Debug, Clone)]
pub(super) struct Bucket<T, C> {
    pub(super) heavy: Vec<Cell<T, C>>,
    pub(super) light: Vec<Cell<T, C>>,
}

impl<T: Eq, C: CounterValue> Bucket<T, C> {
    pub(super) fn with_capacity(heavy_capacity: usize, light_capacity: usize) -> Self {
        Self {
            heavy: Vec::with_capacity(heavy_capacity),
            light: Vec::with_capacity(light_capacity),
        }
    }

    pub(super) fn heavy_position(&self, item: &T) -> Option<usize> {
        self.heavy.iter().position(|cell| cell.item == *item)
    }

    pub(super) fn light_position(&self, item: &T) -> Option<usize> {
        self.light.iter().position(|cell| cell.item == *item)
    }

    /// Returns the index of the heavy cell with the smallest count.
    ///
    /// Among equal minima the lowest index wins.
    pub(super) fn weakest_heavy(&self) -> Option<usize> {
        let mut weakest: Option<(usize, C)> = None;
        for (index, cell) in self.heavy.iter().enumerate() {
            match weakest {
                Some((_, min)) if cell.count >= min => {}
                _ => weakest = Some((index, cell.count)),
            }
        }
        weakest.map(|(index, _)| index)
    }

    pub(super) fn query(&self, item: &T) -> Option<C> {
        if let Some(index) = self.heavy_position(item) {
            return Some(self.heavy[index].count);
        }
        self.light_position(item).map(|index| self.light[index].count)
    }

    pub(super) fn clear(&mut self) {
        self.heavy.clear();
        self.light.clear();
    }
}
