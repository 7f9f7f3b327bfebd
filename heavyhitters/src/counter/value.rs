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

use std::fmt::Debug;

mod private {
    // Sealed trait to prevent external implementations of CounterValue.
    pub trait Sealed {}
}

/// Count type stored by a frequency counter.
///
/// Integer counts model plain occurrence counting. `f64` counts allow a counter's entries to be
/// rewritten in place by an affine map, which is what warm-up biasing in
/// [`HeavyHitter`](crate::ldp::HeavyHitter) needs.
pub trait CounterValue: private::Sealed + Copy + PartialOrd + Debug + Send + Sync + 'static {
    /// Zero value for absent items.
    const ZERO: Self;

    /// One value for unit updates.
    const ONE: Self;

    /// Performs the + operation.
    fn add(self, other: Self) -> Self;

    /// Subtracts one, saturating at zero for unsigned types.
    fn decrement(self) -> Self;

    /// Converts into `f64`.
    fn to_f64(self) -> f64;
}

macro_rules! impl_unsigned {
    ($name:ty) => {
        impl private::Sealed for $name {}

        impl CounterValue for $name {
            const ZERO: Self = 0;
            const ONE: Self = 1;

            #[inline(always)]
            fn add(self, other: Self) -> Self {
                self.saturating_add(other)
            }

            #[inline(always)]
            fn decrement(self) -> Self {
                self.saturating_sub(1)
            }

            #[inline(always)]
            fn to_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

impl_unsigned!(u32);
impl_unsigned!(u64);

impl private::Sealed for f64 {}

impl CounterValue for f64 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;

    #[inline(always)]
    fn add(self, other: Self) -> Self {
        self + other
    }

    #[inline(always)]
    fn decrement(self) -> Self {
        self - 1.0
    }

    #[inline(always)]
    fn to_f64(self) -> f64 {
        self
    }
}
