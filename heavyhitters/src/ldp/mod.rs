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

//! Heavy-hitter estimation under local differential privacy.
//!
//! Reporters hold items from a public domain `Ω` of `d` items. Each reporter perturbs its true
//! item with `d`-ary randomized response before sending it: the true item is kept with
//! probability `p = e^ε / (e^ε + d - 1)` and replaced by any one other item with probability
//! `q = 1 / (e^ε + d - 1)`. The aggregator counts the reports and inverts the perturbation with
//! `(observed - n·q) / (p - q)`, which is an unbiased estimate of the true count.
//!
//! # Phases
//!
//! A [`HeavyHitter`] session moves through three [`Phase`]s:
//!
//! ```text
//! WarmUp --stop_warmup()--> Statistics --cleanup()--> Cleaned
//! ```
//!
//! * **WarmUp**: the aggregator counts true items it is allowed to see with
//!   [`HeavyHitter::warmup_insert`]. Reads return raw counts.
//! * **Statistics**: [`HeavyHitter::stop_warmup`] rewrites every warm-up count so that the
//!   debiasing formula maps it back to itself, then reports arrive through
//!   [`HeavyHitter::randomize_insert`]. Reads are debiased.
//! * **Cleaned**: [`HeavyHitter::cleanup`] drops the domain. Single-item reads still work;
//!   anything that enumerates the domain fails with `DomainUnavailable`.
//!
//! Calling an operation in the wrong phase fails with `InvalidState`.
//!
//! # Counting back-ends
//!
//! The session is generic over a [`StreamCounter`](crate::counter::StreamCounter) with `f64`
//! counts. [`HeavyHitter::new`] counts exactly; [`HeavyHitter::with_guardian`] bounds memory
//! with a [`GuardianSketch`](crate::guardian::GuardianSketch); [`HeavyHitterConfig::build`]
//! picks one from configuration.
//!
//! # Usage
//!
//! ```rust
//! # use heavyhitters::ldp::HeavyHitter;
//! # use rand::SeedableRng;
//! # use rand::rngs::StdRng;
//! let mut server = HeavyHitter::new(["A", "B", "C", "D"], 1, 16.0).unwrap();
//! for _ in 0..100 {
//!     server.warmup_insert("A").unwrap();
//! }
//! server.warmup_insert("B").unwrap();
//! server.stop_warmup().unwrap();
//!
//! let mut rng = StdRng::seed_from_u64(1);
//! for _ in 0..500 {
//!     let report = server.randomize(&"A", &mut rng).unwrap();
//!     server.randomize_insert(report).unwrap();
//! }
//!
//! let top = server.top_k().unwrap();
//! assert_eq!(top[0].0, "A");
//! assert!((top[0].1 - 600.0).abs() < 5.0);
//! ```
//!
//! Reporters living in another process use an [`LdpClient`] instead of
//! [`HeavyHitter::randomize`]; only its output crosses the process boundary.
//!
//! # Mechanisms
//!
//! [`HeavyHitter`] implements the naive [`Mechanism`]: every read debiases against all reports
//! ingested so far, and heavy hitters are found by scanning the domain. [`HgHeavyHitter`]
//! implements the two HeavyGuardian mechanisms. It debiases each bucket of its sketch
//! separately whenever a guardian is evicted and reads heavy hitters from the sketch cells, so
//! it needs no domain scan. [`LdpHeavyHitter`] is the interface shared by both sessions.

use rand::Rng;

use crate::error::Error;

mod client;
mod config;
mod domain;
mod hg;
mod params;
mod session;

pub use self::client::LdpClient;
pub use self::config::GuardianConfig;
pub use self::config::HeavyHitterConfig;
pub use self::config::Mechanism;
pub use self::hg::DEFAULT_ALPHA;
pub use self::hg::HgHeavyHitter;
pub use self::hg::HgReport;
pub use self::params::RandomizedResponse;
pub use self::params::compute_params;
pub use self::params::debias;
pub use self::session::HeavyHitter;
pub use self::session::Phase;

/// Aggregating side of an LDP heavy-hitter protocol, whatever its mechanism.
///
/// Each method behaves like the inherent method of the same name on [`HeavyHitter`] and
/// [`HgHeavyHitter`].
pub trait LdpHeavyHitter<T> {
    /// What [`LdpHeavyHitter::randomize`] produces and [`LdpHeavyHitter::randomize_insert`]
    /// consumes.
    type Report;

    /// Returns the mechanism.
    fn mechanism(&self) -> Mechanism;

    /// Returns the current phase.
    fn phase(&self) -> Phase;

    /// Returns the number of heavy hitters reported.
    fn k(&self) -> usize;

    /// Returns the per-item privacy parameter `ε/w`.
    fn window_epsilon(&self) -> f64;

    /// Returns the number of items ingested in both phases.
    fn total_ingested(&self) -> u64;

    /// Counts a true item during warm-up.
    fn warmup_insert(&mut self, item: T) -> Result<bool, Error>;

    /// Ends warm-up.
    fn stop_warmup(&mut self) -> Result<(), Error>;

    /// Perturbs a true item, drawing from `rng`.
    fn randomize<R>(&self, item: &T, rng: &mut R) -> Result<Self::Report, Error>
    where
        R: Rng + ?Sized;

    /// Counts a report.
    fn randomize_insert(&mut self, report: Self::Report) -> Result<bool, Error>;

    /// Returns the frequency estimate of `item`.
    fn response(&self, item: &T) -> f64;

    /// Returns at most `k` heavy hitters with their estimates, highest first.
    fn response_ordered_heavy_hitters(&self) -> Result<Vec<(T, f64)>, Error>;

    /// Releases the domain and enters the terminal phase.
    fn cleanup(&mut self) -> Result<(), Error>;
}
