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

use std::collections::HashSet;
use std::hash::Hash;

/// Distinct domain items in first-occurrence order, with constant-time membership.
#[derive(Debug, Clone)]
pub(crate) struct Domain<T> {
    items: Vec<T>,
    members: HashSet<T>,
}

impl<T: Eq + Hash + Clone> Domain<T> {
    pub(crate) fn new<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let iter = items.into_iter();
        let (lower, _) = iter.size_hint();
        let mut domain = Self {
            items: Vec::with_capacity(lower),
            members: HashSet::with_capacity(lower),
        };
        for item in iter {
            if domain.members.insert(item.clone()) {
                domain.items.push(item);
            }
        }
        domain
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn contains(&self, item: &T) -> bool {
        self.members.contains(item)
    }

    pub(crate) fn items(&self) -> &[T] {
        &self.items
    }
}
