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

use super::ExactCounter;
use super::StreamCounter;
use crate::guardian::GuardianSketch;

/// A counting back-end chosen at runtime.
#[derive(Debug, Clone)]
pub enum CounterBackend<T> {
    /// Unbounded exact counts.
    Exact(ExactCounter<T, f64>),
    /// Bounded-memory Guardian sketch.
    Guardian(GuardianSketch<T, f64>),
}

impl<T> CounterBackend<T> {
    /// Returns a short name of the back-end, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            CounterBackend::Exact(_) => "exact",
            CounterBackend::Guardian(_) => "guardian",
        }
    }
}

impl<T: Eq + Hash> From<ExactCounter<T, f64>> for CounterBackend<T> {
    fn from(counter: ExactCounter<T, f64>) -> Self {
        CounterBackend::Exact(counter)
    }
}

impl<T: Eq + Hash> From<GuardianSketch<T, f64>> for CounterBackend<T> {
    fn from(sketch: GuardianSketch<T, f64>) -> Self {
        CounterBackend::Guardian(sketch)
    }
}

impl<T: Eq + Hash> StreamCounter<T> for CounterBackend<T> {
    type Count = f64;

    fn insert(&mut self, item: T) -> bool {
        match self {
            CounterBackend::Exact(counter) => counter.insert(item),
            CounterBackend::Guardian(sketch) => sketch.insert(item),
        }
    }

    fn query(&self, item: &T) -> f64 {
        match self {
            CounterBackend::Exact(counter) => counter.query(item),
            CounterBackend::Guardian(sketch) => sketch.query(item),
        }
    }

    fn insert_count(&self) -> u64 {
        match self {
            CounterBackend::Exact(counter) => counter.insert_count(),
            CounterBackend::Guardian(sketch) => sketch.insert_count(),
        }
    }

    fn tracked_items(&self) -> Vec<&T> {
        match self {
            CounterBackend::Exact(counter) => counter.tracked_items(),
            CounterBackend::Guardian(sketch) => sketch.tracked_items(),
        }
    }

    fn update_counts<F>(&mut self, f: F)
    where
        F: FnMut(f64) -> f64,
    {
        match self {
            CounterBackend::Exact(counter) => counter.update_counts(f),
            CounterBackend::Guardian(sketch) => sketch.update_counts(f),
        }
    }
}
