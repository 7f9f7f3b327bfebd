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
use std::fmt;
use std::hash::Hash;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::counter::ExactCounter;
use crate::counter::StreamCounter;
use crate::error::Error;
use crate::guardian::GuardianSketch;
use crate::ldp::GuardianConfig;
use crate::ldp::LdpClient;
use crate::ldp::LdpHeavyHitter;
use crate::ldp::Mechanism;
use crate::ldp::RandomizedResponse;
use crate::ldp::domain::Domain;

/// Lifecycle phase of a [`HeavyHitter`] session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// True items are counted directly.
    WarmUp,
    /// Randomized items are counted and reads are debiased.
    Statistics,
    /// The domain was released; debiased reads of single items still work.
    Cleaned,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::WarmUp => f.write_str("WarmUp"),
            Phase::Statistics => f.write_str("Statistics"),
            Phase::Cleaned => f.write_str("Cleaned"),
        }
    }
}

pub(super) fn require_phase(actual: Phase, expected: Phase, operation: &str) -> Result<(), Error> {
    if actual == expected {
        return Ok(());
    }
    Err(
        Error::invalid_state(format!("{operation} requires the {expected} phase"))
            .with_context("phase", actual),
    )
}

/// Aggregating side of an LDP heavy-hitter estimation.
///
/// See [`crate::ldp`] for the protocol and the phase diagram.
#[derive(Debug, Clone)]
pub struct HeavyHitter<T, S = ExactCounter<T, f64>> {
    params: RandomizedResponse,
    k: usize,
    phase: Phase,
    domain: Option<Domain<T>>,
    counter: S,
    total: u64,
}

impl<T: Eq + Hash + Clone> HeavyHitter<T, ExactCounter<T, f64>> {
    /// Creates a session that counts every item exactly.
    ///
    /// # Errors
    ///
    /// * `InvalidDomain` if `domain` has fewer than two distinct items.
    /// * `InvalidArgument` if `k` is outside `1..=d`.
    /// * `InvalidPrivacyBudget` if `window_epsilon` is not usable.
    pub fn new<I>(domain: I, k: usize, window_epsilon: f64) -> Result<Self, Error>
    where
        I: IntoIterator<Item = T>,
    {
        let domain = Domain::new(domain);
        let counter = ExactCounter::with_capacity(domain.len());
        Self::from_domain(domain, k, window_epsilon, counter)
    }
}

impl<T: Eq + Hash + Clone> HeavyHitter<T, GuardianSketch<T, f64>> {
    /// Creates a session that counts through a Guardian sketch sized by `sketch`.
    ///
    /// Fails like [`HeavyHitter::new`], and with `InvalidArgument` if the sketch sizing is zero.
    pub fn with_guardian<I>(
        domain: I,
        k: usize,
        window_epsilon: f64,
        sketch: &GuardianConfig,
    ) -> Result<Self, Error>
    where
        I: IntoIterator<Item = T>,
    {
        let counter = sketch.build()?;
        Self::with_counter(domain, k, window_epsilon, counter)
    }
}

impl<T, S> HeavyHitter<T, S>
where
    T: Eq + Hash + Clone,
    S: StreamCounter<T, Count = f64>,
{
    /// Creates a session over an arbitrary empty counter.
    ///
    /// Fails like [`HeavyHitter::new`], and with `InvalidArgument` if `counter` has already
    /// counted items.
    pub fn with_counter<I>(
        domain: I,
        k: usize,
        window_epsilon: f64,
        counter: S,
    ) -> Result<Self, Error>
    where
        I: IntoIterator<Item = T>,
    {
        let inserted = counter.insert_count();
        if inserted != 0 {
            return Err(Error::invalid_argument(format!(
                "counter must be empty; it has counted {inserted} items"
            )));
        }
        Self::from_domain(Domain::new(domain), k, window_epsilon, counter)
    }

    fn from_domain(
        domain: Domain<T>,
        k: usize,
        window_epsilon: f64,
        counter: S,
    ) -> Result<Self, Error> {
        let d = domain.len();
        let params = RandomizedResponse::new(d, window_epsilon)?;
        if k == 0 || k > d {
            return Err(Error::invalid_argument(format!(
                "k must be in [1, {d}]; got {k}"
            )));
        }
        debug!(d, k, window_epsilon, "created heavy hitter session");
        Ok(Self {
            params,
            k,
            phase: Phase::WarmUp,
            domain: Some(domain),
            counter,
            total: 0,
        })
    }

    /// Counts a true item during warm-up.
    ///
    /// Returns whether the counter stored the item.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidState` outside the warm-up phase.
    pub fn warmup_insert(&mut self, item: T) -> Result<bool, Error> {
        self.require(Phase::WarmUp, "warmup_insert")?;
        self.total += 1;
        Ok(self.counter.insert(item))
    }

    /// Ends warm-up.
    ///
    /// Every tracked count `v` becomes `v·(p - q) + n·q`, where `n` is the number of items
    /// ingested so far, so that debiased reads reproduce the exact warm-up counts.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidState` outside the warm-up phase.
    pub fn stop_warmup(&mut self) -> Result<(), Error> {
        self.require(Phase::WarmUp, "stop_warmup")?;
        let params = self.params;
        let total = self.total;
        self.counter.update_counts(|v| params.bias(v, total));
        self.phase = Phase::Statistics;
        debug!(total, tracked = self.counter.tracked_items().len(), "warm-up stopped");
        Ok(())
    }

    /// Perturbs a true item with randomized response, drawing from `rng`.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidState` outside the statistics phase and with `ItemNotInDomain` if
    /// `item` is not a domain member.
    pub fn randomize<R>(&self, item: &T, rng: &mut R) -> Result<T, Error>
    where
        R: Rng + ?Sized,
    {
        self.require(Phase::Statistics, "randomize")?;
        let domain = self.domain_ref()?;
        if !domain.contains(item) {
            return Err(Error::item_not_in_domain());
        }
        Ok(self.params.randomize(domain.items(), item, rng).clone())
    }

    /// Counts a randomized item.
    ///
    /// Returns whether the counter stored the item.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidState` outside the statistics phase.
    pub fn randomize_insert(&mut self, item: T) -> Result<bool, Error> {
        self.require(Phase::Statistics, "randomize_insert")?;
        self.total += 1;
        Ok(self.counter.insert(item))
    }

    /// Returns the frequency estimate of `item`.
    ///
    /// During warm-up this is the raw count; afterwards it is the debiased count.
    pub fn response(&self, item: &T) -> f64 {
        let observed = self.counter.query(item);
        match self.phase {
            Phase::WarmUp => observed,
            Phase::Statistics | Phase::Cleaned => self.params.debias(observed, self.total),
        }
    }

    /// Returns the estimate of every domain item.
    ///
    /// # Errors
    ///
    /// Fails with `DomainUnavailable` after [`HeavyHitter::cleanup`].
    pub fn response_domain(&self) -> Result<HashMap<T, f64>, Error> {
        let domain = self.domain_ref()?;
        Ok(domain
            .items()
            .iter()
            .map(|item| (item.clone(), self.response(item)))
            .collect())
    }

    /// Returns the estimate of every domain item, highest first.
    ///
    /// Equal estimates keep domain order.
    pub fn response_ordered_domain(&self) -> Result<Vec<(T, f64)>, Error> {
        let domain = self.domain_ref()?;
        let mut estimates: Vec<(T, f64)> = domain
            .items()
            .iter()
            .map(|item| (item.clone(), self.response(item)))
            .collect();
        estimates.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(estimates)
    }

    /// Returns the `k` domain items with the highest estimates, highest first.
    pub fn top_k(&self) -> Result<Vec<(T, f64)>, Error> {
        let mut estimates = self.response_ordered_domain()?;
        estimates.truncate(self.k);
        Ok(estimates)
    }

    /// Returns the `k` heavy hitters with their estimates.
    pub fn response_heavy_hitters(&self) -> Result<HashMap<T, f64>, Error> {
        Ok(self.top_k()?.into_iter().collect())
    }

    /// Same as [`HeavyHitter::top_k`].
    pub fn response_ordered_heavy_hitters(&self) -> Result<Vec<(T, f64)>, Error> {
        self.top_k()
    }

    /// Releases the domain and enters the terminal phase.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidState` unless the session is in the statistics phase. Cleaning up
    /// directly from warm-up is rejected because reads in the terminal phase assume the
    /// warm-up counts were biased by [`HeavyHitter::stop_warmup`].
    pub fn cleanup(&mut self) -> Result<(), Error> {
        self.require(Phase::Statistics, "cleanup")?;
        self.domain = None;
        self.phase = Phase::Cleaned;
        debug!(total = self.total, "domain released");
        Ok(())
    }

    /// Returns a reporting client sharing this session's domain and privacy parameter.
    ///
    /// The client draws from an OS-seeded generator; call [`LdpClient::reseed`] for
    /// reproducible reports.
    pub fn client(&self) -> Result<LdpClient<T>, Error> {
        let domain = self.domain_ref()?;
        Ok(LdpClient::from_parts(
            domain.clone(),
            self.params,
            StdRng::from_os_rng(),
        ))
    }

    /// Always fails: the session draws from caller-supplied random sources.
    pub fn reseed(&mut self, seed: u64) -> Result<(), Error> {
        Err(
            Error::unsupported("heavy hitter sessions take a random source per call")
                .with_context("seed", seed),
        )
    }

    /// Returns the domain items in first-occurrence order.
    ///
    /// # Errors
    ///
    /// Fails with `DomainUnavailable` after [`HeavyHitter::cleanup`].
    pub fn domain(&self) -> Result<&[T], Error> {
        Ok(self.domain_ref()?.items())
    }

    /// Returns the current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the randomized-response parameters.
    pub fn params(&self) -> &RandomizedResponse {
        &self.params
    }

    /// Returns the counting back-end.
    pub fn counter(&self) -> &S {
        &self.counter
    }

    /// Returns the per-item privacy parameter `ε/w`.
    pub fn window_epsilon(&self) -> f64 {
        self.params.epsilon()
    }

    /// Returns the domain size `d`. Still available after cleanup.
    pub fn domain_size(&self) -> usize {
        self.params.domain_size()
    }

    /// Returns the number of heavy hitters reported.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Returns the number of items ingested in both phases.
    pub fn total_ingested(&self) -> u64 {
        self.total
    }

    fn require(&self, expected: Phase, operation: &str) -> Result<(), Error> {
        require_phase(self.phase, expected, operation)
    }

    fn domain_ref(&self) -> Result<&Domain<T>, Error> {
        self.domain.as_ref().ok_or_else(Error::domain_unavailable)
    }
}

impl<T, S> LdpHeavyHitter<T> for HeavyHitter<T, S>
where
    T: Eq + Hash + Clone,
    S: StreamCounter<T, Count = f64>,
{
    type Report = T;

    fn mechanism(&self) -> Mechanism {
        Mechanism::Naive
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn k(&self) -> usize {
        self.k
    }

    fn window_epsilon(&self) -> f64 {
        HeavyHitter::window_epsilon(self)
    }

    fn total_ingested(&self) -> u64 {
        self.total
    }

    fn warmup_insert(&mut self, item: T) -> Result<bool, Error> {
        HeavyHitter::warmup_insert(self, item)
    }

    fn stop_warmup(&mut self) -> Result<(), Error> {
        HeavyHitter::stop_warmup(self)
    }

    fn randomize<R>(&self, item: &T, rng: &mut R) -> Result<T, Error>
    where
        R: Rng + ?Sized,
    {
        HeavyHitter::randomize(self, item, rng)
    }

    fn randomize_insert(&mut self, report: T) -> Result<bool, Error> {
        HeavyHitter::randomize_insert(self, report)
    }

    fn response(&self, item: &T) -> f64 {
        HeavyHitter::response(self, item)
    }

    fn response_ordered_heavy_hitters(&self) -> Result<Vec<(T, f64)>, Error> {
        HeavyHitter::response_ordered_heavy_hitters(self)
    }

    fn cleanup(&mut self) -> Result<(), Error> {
        HeavyHitter::cleanup(self)
    }
}
