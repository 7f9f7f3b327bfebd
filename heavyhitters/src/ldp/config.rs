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

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::counter::CounterBackend;
use crate::counter::ExactCounter;
use crate::error::Error;
use crate::guardian::GuardianSketch;
use crate::hash::DEFAULT_SEED;
use crate::ldp::DEFAULT_ALPHA;
use crate::ldp::HeavyHitter;
use crate::ldp::HgHeavyHitter;

/// Estimation mechanism of a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mechanism {
    /// `d`-ary randomized response counted by a [`HeavyHitter`]. Estimates read the domain.
    #[default]
    Naive,
    /// `d`-ary randomized response counted by an [`HgHeavyHitter`] that debiases each bucket
    /// when a guardian is evicted. Heavy hitters are read from the sketch cells.
    Basic,
    /// The hot/cold report mechanism of an [`HgHeavyHitter`]. Reporters randomize against the
    /// current guardians of their bucket.
    Advanced,
}

impl Mechanism {
    /// Converts this mechanism into a static string.
    pub const fn into_static(self) -> &'static str {
        match self {
            Mechanism::Naive => "naive",
            Mechanism::Basic => "basic",
            Mechanism::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.into_static())
    }
}

impl FromStr for Mechanism {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "naive" => Ok(Mechanism::Naive),
            "basic" => Ok(Mechanism::Basic),
            "advanced" => Ok(Mechanism::Advanced),
            _ => Err(Error::invalid_argument(format!(
                "unknown mechanism {s:?}; expected naive, basic or advanced"
            ))),
        }
    }
}

/// Construction options of a [`HeavyHitter`] or [`HgHeavyHitter`] session.
///
/// With the naive mechanism and no `sketch` section the session counts exactly; with one it
/// counts through a [`GuardianSketch`]. The guardian mechanisms always count through a sketch
/// and default to one bucket of `k` heavy cells.
///
/// ```
/// # use heavyhitters::ldp::HeavyHitterConfig;
/// let config: HeavyHitterConfig = serde_json::from_str(
///     r#"{ "k": 2, "window_epsilon": 4.0, "sketch": { "buckets": 8, "heavy_capacity": 2 } }"#,
/// ).unwrap();
/// let session = config.build(["a", "b", "c", "d"]).unwrap();
/// assert_eq!(session.k(), 2);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeavyHitterConfig {
    /// Number of heavy hitters to report.
    pub k: usize,
    /// Per-item privacy parameter `ε/w`.
    pub window_epsilon: f64,
    /// Estimation mechanism.
    #[serde(default)]
    pub mechanism: Mechanism,
    /// Share of `window_epsilon` spent on the hot/cold decision of the advanced mechanism.
    /// [`DEFAULT_ALPHA`] when absent.
    #[serde(default)]
    pub alpha: Option<f64>,
    /// Optional bounded-memory counter.
    #[serde(default)]
    pub sketch: Option<GuardianConfig>,
}

/// Sizing of a Guardian sketch back-end.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardianConfig {
    /// Number of buckets `w`.
    pub buckets: usize,
    /// Heavy cells per bucket `λh`.
    pub heavy_capacity: usize,
    /// Light cells per bucket `λl`.
    #[serde(default)]
    pub light_capacity: usize,
    /// Seed for routing and decay. A fixed default is used when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl GuardianConfig {
    /// Returns a one-bucket sizing with `heavy_capacity` heavy cells and no light cells.
    pub fn single_bucket(heavy_capacity: usize) -> Self {
        Self {
            buckets: 1,
            heavy_capacity,
            light_capacity: 0,
            seed: None,
        }
    }

    /// Checks the sizing without building anything.
    pub fn validate(&self) -> Result<(), Error> {
        if self.buckets == 0 {
            return Err(Error::invalid_argument("sketch buckets must be at least 1"));
        }
        if self.heavy_capacity == 0 {
            return Err(Error::invalid_argument(
                "sketch heavy_capacity must be at least 1",
            ));
        }
        Ok(())
    }

    /// Builds an empty sketch with `f64` counts.
    pub fn build<T: Eq + Hash>(&self) -> Result<GuardianSketch<T, f64>, Error> {
        self.validate()?;
        Ok(GuardianSketch::with_seed(
            self.buckets,
            self.heavy_capacity,
            self.light_capacity,
            self.seed.unwrap_or(DEFAULT_SEED),
        ))
    }
}

impl HeavyHitterConfig {
    /// Returns an exact-counting configuration.
    pub fn exact(k: usize, window_epsilon: f64) -> Self {
        Self {
            k,
            window_epsilon,
            mechanism: Mechanism::Naive,
            alpha: None,
            sketch: None,
        }
    }

    /// Returns this configuration with another mechanism.
    pub fn with_mechanism(mut self, mechanism: Mechanism) -> Self {
        self.mechanism = mechanism;
        self
    }

    /// Returns this configuration counting through a Guardian sketch.
    pub fn with_sketch(mut self, sketch: GuardianConfig) -> Self {
        self.sketch = Some(sketch);
        self
    }

    /// Builds a naive-mechanism session over `domain`.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` if `k` is outside `1..=d`, the sketch sizing is zero, or the
    ///   mechanism is not [`Mechanism::Naive`].
    /// * `InvalidDomain` if `domain` has fewer than two distinct items.
    /// * `InvalidPrivacyBudget` if `window_epsilon` is not usable.
    pub fn build<T, I>(&self, domain: I) -> Result<HeavyHitter<T, CounterBackend<T>>, Error>
    where
        T: Eq + Hash + Clone,
        I: IntoIterator<Item = T>,
    {
        if self.mechanism != Mechanism::Naive {
            return Err(Error::invalid_argument(format!(
                "the {} mechanism is built with build_hg",
                self.mechanism
            )));
        }
        let counter = match &self.sketch {
            Some(sketch) => CounterBackend::Guardian(sketch.build()?),
            None => CounterBackend::Exact(ExactCounter::new()),
        };
        HeavyHitter::with_counter(domain, self.k, self.window_epsilon, counter)
    }

    /// Builds a guardian-mechanism session over `domain`.
    ///
    /// # Errors
    ///
    /// Fails like [`HgHeavyHitter::basic`] and [`HgHeavyHitter::advanced`], and with
    /// `InvalidArgument` if the mechanism is [`Mechanism::Naive`].
    pub fn build_hg<T, I>(&self, domain: I) -> Result<HgHeavyHitter<T>, Error>
    where
        T: Eq + Hash + Clone,
        I: IntoIterator<Item = T>,
    {
        let sketch = self
            .sketch
            .clone()
            .unwrap_or_else(|| GuardianConfig::single_bucket(self.k));
        match self.mechanism {
            Mechanism::Naive => Err(Error::invalid_argument(
                "the naive mechanism is built with build",
            )),
            Mechanism::Basic => HgHeavyHitter::basic(domain, self.k, self.window_epsilon, &sketch),
            Mechanism::Advanced => HgHeavyHitter::advanced(
                domain,
                self.k,
                self.window_epsilon,
                &sketch,
                self.alpha.unwrap_or(DEFAULT_ALPHA),
            ),
        }
    }
}
