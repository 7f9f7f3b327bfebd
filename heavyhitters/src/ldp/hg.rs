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

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;
use tracing::trace;

use crate::error::Error;
use crate::guardian::GuardianSketch;
use crate::guardian::Insertion;
use crate::ldp::GuardianConfig;
use crate::ldp::LdpClient;
use crate::ldp::LdpHeavyHitter;
use crate::ldp::Mechanism;
use crate::ldp::Phase;
use crate::ldp::RandomizedResponse;
use crate::ldp::domain::Domain;
use crate::ldp::params::check_epsilon;
use crate::ldp::params::rr_params;
use crate::ldp::session::require_phase;

/// Default share `α` of the privacy parameter spent on the hot/cold decision of the advanced
/// mechanism.
pub const DEFAULT_ALPHA: f64 = 1.0 / 3.0;

/// A report consumed by [`HgHeavyHitter::randomize_insert`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HgReport<T> {
    /// A domain item.
    Item(T),
    /// A report naming only the bucket of the reporter's item. The advanced mechanism sends
    /// it for a cold item while no guardian of the bucket is about to be evicted.
    Empty(usize),
}

impl<T> From<T> for HgReport<T> {
    fn from(item: T) -> Self {
        HgReport::Item(item)
    }
}

/// Randomization parameters of the advanced mechanism.
///
/// `α·ε` protects the hot/cold decision, `(1 - α)·ε` the item reported within the guardians
/// (hot) or within the rest of the bucket domain (cold).
#[derive(Debug, Clone, Copy, PartialEq)]
struct HotParams {
    alpha: f64,
    cold_epsilon: f64,
    p1: f64,
    q1: f64,
    p2: f64,
    q2: f64,
    /// Share of warm-up items that were counted by a guardian.
    gamma_h: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Scheme {
    Basic,
    Advanced(HotParams),
}

/// Aggregating side of an LDP heavy-hitter estimation that counts through the heavy part of a
/// Guardian sketch and reads heavy hitters from its cells.
///
/// Two mechanisms are available:
///
/// * [`HgHeavyHitter::basic`]: reporters use `d`-ary randomized response over the whole
///   domain, exactly like a [`HeavyHitter`](crate::ldp::HeavyHitter).
/// * [`HgHeavyHitter::advanced`]: a reporter first decides, with privacy `α·ε`, whether its
///   item is hot (held by a guardian of its bucket). Hot items are randomized among the
///   guardians of the bucket. Cold items are randomized among the other items of the bucket
///   domain while the weakest guardian is about to be evicted, and become an
///   [`HgReport::Empty`] report otherwise.
///
/// Every guardian only counts reports that arrived while it held its cell. When a report
/// evicts a guardian during the statistics phase, the surviving guardians of the bucket have
/// the expected noise of the reports seen since the previous eviction subtracted, and the
/// noise window of the bucket restarts with the evicting report. A read debiases the stored
/// count against the current window only, so a freshly promoted item is not charged for
/// reports that arrived before it was admitted.
///
/// The phases and their guards are those of [`crate::ldp`]. Heavy hitters are available in
/// every phase, including after [`HgHeavyHitter::cleanup`].
///
/// # Examples
///
/// ```
/// # use heavyhitters::ldp::GuardianConfig;
/// # use heavyhitters::ldp::HgHeavyHitter;
/// # use rand::SeedableRng;
/// # use rand::rngs::StdRng;
/// let sketch = GuardianConfig { buckets: 1, heavy_capacity: 2, light_capacity: 0, seed: Some(1) };
/// let mut server = HgHeavyHitter::basic(["A", "B", "C", "D"], 2, 16.0, &sketch).unwrap();
/// for item in ["A", "A", "A", "B"] {
///     server.warmup_insert(item).unwrap();
/// }
/// server.stop_warmup().unwrap();
///
/// let mut rng = StdRng::seed_from_u64(3);
/// for _ in 0..100 {
///     let report = server.randomize(&"A", &mut rng).unwrap();
///     server.randomize_insert(report).unwrap();
/// }
/// server.cleanup().unwrap();
///
/// let top = server.top_k();
/// assert_eq!(top[0].0, "A");
/// assert!((top[0].1 - 103.0).abs() < 2.0);
/// ```
#[derive(Debug, Clone)]
pub struct HgHeavyHitter<T> {
    params: RandomizedResponse,
    scheme: Scheme,
    k: usize,
    phase: Phase,
    domain: Option<Domain<T>>,
    bucket_domains: Option<Vec<Vec<T>>>,
    sketch: GuardianSketch<T, f64>,
    total: u64,
    // statistics-phase reports, overall and per bucket
    statistics: u64,
    landed: Vec<u64>,
    // reports already charged to the surviving guardians of each bucket
    marks: Vec<u64>,
}

impl<T: Eq + Hash + Clone> HgHeavyHitter<T> {
    /// Creates a session for the basic mechanism.
    ///
    /// # Errors
    ///
    /// * `InvalidDomain` if `domain` has fewer than two distinct items.
    /// * `InvalidPrivacyBudget` if `window_epsilon` is not usable.
    /// * `InvalidArgument` if `k` is outside `1..=d`, the sketch sizing is zero, the sketch
    ///   has light cells, or `buckets · heavy_capacity < k`.
    pub fn basic<I>(
        domain: I,
        k: usize,
        window_epsilon: f64,
        sketch: &GuardianConfig,
    ) -> Result<Self, Error>
    where
        I: IntoIterator<Item = T>,
    {
        Self::from_domain(Domain::new(domain), k, window_epsilon, sketch, None)
    }

    /// Creates a session for the advanced mechanism, spending `alpha · window_epsilon` on the
    /// hot/cold decision.
    ///
    /// Fails like [`HgHeavyHitter::basic`], and with `InvalidArgument` if `alpha` is not in
    /// `(0, 1)` or a bucket is routed fewer domain items than it has heavy cells.
    pub fn advanced<I>(
        domain: I,
        k: usize,
        window_epsilon: f64,
        sketch: &GuardianConfig,
        alpha: f64,
    ) -> Result<Self, Error>
    where
        I: IntoIterator<Item = T>,
    {
        Self::from_domain(Domain::new(domain), k, window_epsilon, sketch, Some(alpha))
    }

    fn from_domain(
        domain: Domain<T>,
        k: usize,
        window_epsilon: f64,
        config: &GuardianConfig,
        alpha: Option<f64>,
    ) -> Result<Self, Error> {
        let d = domain.len();
        let params = RandomizedResponse::new(d, window_epsilon)?;
        if k == 0 || k > d {
            return Err(Error::invalid_argument(format!(
                "k must be in [1, {d}]; got {k}"
            )));
        }
        config.validate()?;
        if config.light_capacity != 0 {
            return Err(Error::invalid_argument(format!(
                "guardian mechanisms count with heavy cells only; got light_capacity {}",
                config.light_capacity
            )));
        }
        let cells = config.buckets.saturating_mul(config.heavy_capacity);
        if cells < k {
            return Err(Error::invalid_argument(format!(
                "buckets * heavy_capacity must be at least k = {k}; got {cells}"
            )));
        }
        let sketch = config.build()?;

        let mut bucket_domains: Vec<Vec<T>> = vec![Vec::new(); config.buckets];
        for item in domain.items() {
            bucket_domains[sketch.bucket_of(item)].push(item.clone());
        }

        let scheme = match alpha {
            None => Scheme::Basic,
            Some(alpha) => {
                if alpha.is_nan() || alpha <= 0.0 || alpha >= 1.0 {
                    return Err(Error::invalid_argument(format!(
                        "alpha must be in (0, 1); got {alpha}"
                    )));
                }
                for (index, items) in bucket_domains.iter().enumerate() {
                    if items.len() < config.heavy_capacity {
                        return Err(Error::invalid_argument(format!(
                            "bucket {index} is routed {} domain items, fewer than heavy_capacity {}",
                            items.len(),
                            config.heavy_capacity
                        )));
                    }
                }
                Scheme::Advanced(hot_params(
                    window_epsilon,
                    alpha,
                    config.heavy_capacity,
                )?)
            }
        };

        debug!(
            d,
            k,
            window_epsilon,
            buckets = config.buckets,
            heavy_capacity = config.heavy_capacity,
            mechanism = %scheme_mechanism(&scheme),
            "created guardian heavy hitter session"
        );
        Ok(Self {
            params,
            scheme,
            k,
            phase: Phase::WarmUp,
            domain: Some(domain),
            bucket_domains: Some(bucket_domains),
            sketch,
            total: 0,
            statistics: 0,
            landed: vec![0; config.buckets],
            marks: vec![0; config.buckets],
        })
    }

    /// Counts a true item during warm-up.
    ///
    /// Returns whether the sketch stored the item.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidState` outside the warm-up phase.
    pub fn warmup_insert(&mut self, item: T) -> Result<bool, Error> {
        require_phase(self.phase, Phase::WarmUp, "warmup_insert")?;
        self.total += 1;
        Ok(self.sketch.insert(item))
    }

    /// Ends warm-up.
    ///
    /// Every guardian count `v` becomes `v·s`, where `s` is the probability gap of the
    /// mechanism, so that debiased reads reproduce the warm-up counts. The advanced mechanism
    /// also records the share of warm-up items held by guardians and fills free heavy cells
    /// with zero-count items of the bucket domain, so reporters always see full buckets.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidState` outside the warm-up phase.
    pub fn stop_warmup(&mut self) -> Result<(), Error> {
        require_phase(self.phase, Phase::WarmUp, "stop_warmup")?;
        if let Scheme::Advanced(hot) = &mut self.scheme {
            let held: f64 = (0..self.sketch.num_buckets())
                .flat_map(|index| self.sketch.heavy_cells(index))
                .map(|(_, count)| count)
                .sum();
            hot.gamma_h = if self.total == 0 {
                0.0
            } else {
                (held / self.total as f64).clamp(0.0, 1.0)
            };
        }
        let scale = self.scale();
        self.sketch.update_counts(|count| count * scale);

        if matches!(self.scheme, Scheme::Advanced(_)) {
            let bucket_domains = self
                .bucket_domains
                .as_ref()
                .ok_or_else(Error::domain_unavailable)?;
            for (index, items) in bucket_domains.iter().enumerate() {
                for item in items {
                    if self.sketch.bucket_occupancy(index).0 == self.sketch.heavy_capacity() {
                        break;
                    }
                    self.sketch.place(item.clone(), 0.0);
                }
            }
        }

        self.phase = Phase::Statistics;
        debug!(
            total = self.total,
            tracked = self.sketch.num_tracked(),
            gamma_h = ?self.gamma_h(),
            "warm-up stopped"
        );
        Ok(())
    }

    /// Perturbs a true item with the session's mechanism, drawing from `rng`.
    ///
    /// The basic mechanism always returns [`HgReport::Item`]; the advanced mechanism may
    /// return [`HgReport::Empty`].
    ///
    /// # Errors
    ///
    /// Fails with `InvalidState` outside the statistics phase and with `ItemNotInDomain` if
    /// `item` is not a domain member.
    pub fn randomize<R>(&self, item: &T, rng: &mut R) -> Result<HgReport<T>, Error>
    where
        R: Rng + ?Sized,
    {
        require_phase(self.phase, Phase::Statistics, "randomize")?;
        let domain = self.domain_ref()?;
        if !domain.contains(item) {
            return Err(Error::item_not_in_domain());
        }
        let hot = match &self.scheme {
            Scheme::Basic => {
                let report = self.params.randomize(domain.items(), item, rng);
                return Ok(HgReport::Item(report.clone()));
            }
            Scheme::Advanced(hot) => hot,
        };

        let index = self.sketch.bucket_of(item);
        let bucket_domain = &self
            .bucket_domains
            .as_ref()
            .ok_or_else(Error::domain_unavailable)?[index];
        let guardians: Vec<&T> = self.sketch.heavy_cells(index).map(|(cell, _)| cell).collect();
        let is_hot = guardians.contains(&item);

        // with every bucket item guarded there is no cold side to report on
        if bucket_domain.len() <= guardians.len() || rng.random_bool(hot.p1) == is_hot {
            return Ok(HgReport::Item(report_hot(hot, &guardians, item, is_hot, rng)));
        }

        let about_to_evict = self
            .sketch
            .weakest(index)
            .is_some_and(|(_, count)| count <= 1.0);
        if !about_to_evict {
            return Ok(HgReport::Empty(index));
        }
        let cold: Vec<&T> = bucket_domain
            .iter()
            .filter(|candidate| !guardians.contains(candidate))
            .collect();
        if cold.is_empty() {
            return Ok(HgReport::Empty(index));
        }
        if is_hot {
            let j = rng.random_range(0..cold.len());
            return Ok(HgReport::Item(cold[j].clone()));
        }
        let (p3, q3) = rr_params(cold.len() - 1, hot.cold_epsilon);
        let u: f64 = rng.random();
        let j = rng.random_range(0..cold.len());
        if u > p3 - q3 {
            Ok(HgReport::Item(cold[j].clone()))
        } else {
            Ok(HgReport::Item(item.clone()))
        }
    }

    /// Counts a report.
    ///
    /// Returns whether the sketch stored the reported item. An [`HgReport::Empty`] report
    /// only decays the weakest guardian of its bucket and returns `false`.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidState` outside the statistics phase, and with `InvalidArgument` for
    /// an empty report outside the advanced mechanism or naming a bucket that does not exist.
    pub fn randomize_insert(&mut self, report: HgReport<T>) -> Result<bool, Error> {
        require_phase(self.phase, Phase::Statistics, "randomize_insert")?;
        let index = match &report {
            HgReport::Item(item) => self.sketch.bucket_of(item),
            HgReport::Empty(index) => {
                if !matches!(self.scheme, Scheme::Advanced(_)) {
                    return Err(Error::invalid_argument(
                        "empty reports belong to the advanced mechanism",
                    ));
                }
                if *index >= self.sketch.num_buckets() {
                    return Err(Error::invalid_argument(format!(
                        "empty report names bucket {index}; the sketch has {} buckets",
                        self.sketch.num_buckets()
                    ))
                    .with_context("bucket", index));
                }
                *index
            }
        };
        self.total += 1;
        self.statistics += 1;
        self.landed[index] += 1;

        let item = match report {
            HgReport::Item(item) => item,
            HgReport::Empty(_) => {
                self.sketch.decay(index);
                return Ok(false);
            }
        };
        let insertion = self.sketch.record(item.clone());
        if insertion == Insertion::Replaced {
            let seen = self.reports_seen(index);
            // the evicting report opens the next window
            let charged = seen.saturating_sub(self.marks[index]).saturating_sub(1);
            let shift = charged as f64 * self.noise();
            self.sketch.update_bucket(index, |cell, count| {
                if *cell == item { count } else { count - shift }
            });
            self.marks[index] = seen - 1;
            trace!(bucket = index, charged, "debiased surviving guardians");
        }
        Ok(insertion != Insertion::Dropped)
    }

    /// Returns the frequency estimate of `item`.
    ///
    /// During warm-up this is the raw count; afterwards the stored count is debiased against
    /// the reports seen by its bucket since the last eviction there.
    pub fn response(&self, item: &T) -> f64 {
        let observed = self.sketch.query(item);
        match self.phase {
            Phase::WarmUp => observed,
            Phase::Statistics | Phase::Cleaned => {
                let window = self.window(self.sketch.bucket_of(item));
                (observed - window as f64 * self.noise()) / self.scale()
            }
        }
    }

    /// Returns the `k` guarded items with the highest estimates, highest first.
    ///
    /// Fewer than `k` items are returned while fewer are guarded. Equal estimates keep bucket
    /// order, then cell order.
    pub fn top_k(&self) -> Vec<(T, f64)> {
        let mut estimates: Vec<(T, f64)> = self
            .sketch
            .tracked_items()
            .into_iter()
            .map(|item| (item.clone(), self.response(item)))
            .collect();
        estimates.sort_by(|a, b| b.1.total_cmp(&a.1));
        estimates.truncate(self.k);
        estimates
    }

    /// Returns the heavy hitters with their estimates.
    pub fn response_heavy_hitters(&self) -> HashMap<T, f64> {
        self.top_k().into_iter().collect()
    }

    /// Same as [`HgHeavyHitter::top_k`].
    pub fn response_ordered_heavy_hitters(&self) -> Vec<(T, f64)> {
        self.top_k()
    }

    /// Releases the domain and enters the terminal phase.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidState` unless the session is in the statistics phase.
    pub fn cleanup(&mut self) -> Result<(), Error> {
        require_phase(self.phase, Phase::Statistics, "cleanup")?;
        self.domain = None;
        self.bucket_domains = None;
        self.phase = Phase::Cleaned;
        debug!(total = self.total, "domain released");
        Ok(())
    }

    /// Returns a reporting client for the basic mechanism.
    ///
    /// # Errors
    ///
    /// Fails with `UnsupportedOperation` for the advanced mechanism, whose reports depend on
    /// the live guardians; use [`HgHeavyHitter::randomize`] instead. Fails with
    /// `DomainUnavailable` after cleanup.
    pub fn client(&self) -> Result<LdpClient<T>, Error> {
        if let Scheme::Advanced(_) = self.scheme {
            return Err(Error::unsupported(
                "advanced reports depend on the current guardians",
            ));
        }
        let domain = self.domain_ref()?;
        Ok(LdpClient::from_parts(
            domain.clone(),
            self.params,
            StdRng::from_os_rng(),
        ))
    }

    /// Returns the domain items in first-occurrence order.
    ///
    /// # Errors
    ///
    /// Fails with `DomainUnavailable` after [`HgHeavyHitter::cleanup`].
    pub fn domain(&self) -> Result<&[T], Error> {
        Ok(self.domain_ref()?.items())
    }

    /// Returns the mechanism.
    pub fn mechanism(&self) -> Mechanism {
        scheme_mechanism(&self.scheme)
    }

    /// Returns the current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the `d`-ary randomized-response parameters over the whole domain.
    pub fn params(&self) -> &RandomizedResponse {
        &self.params
    }

    /// Returns the sketch.
    pub fn sketch(&self) -> &GuardianSketch<T, f64> {
        &self.sketch
    }

    /// Returns `α` for the advanced mechanism.
    pub fn alpha(&self) -> Option<f64> {
        match &self.scheme {
            Scheme::Basic => None,
            Scheme::Advanced(hot) => Some(hot.alpha),
        }
    }

    /// Returns the share of warm-up items held by guardians for the advanced mechanism. Zero
    /// until warm-up stops.
    pub fn gamma_h(&self) -> Option<f64> {
        match &self.scheme {
            Scheme::Basic => None,
            Scheme::Advanced(hot) => Some(hot.gamma_h),
        }
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

    /// Returns the number of reports ingested in both phases.
    pub fn total_ingested(&self) -> u64 {
        self.total
    }

    /// Gap between the probability of reporting the true item and that of reporting one other
    /// item.
    fn scale(&self) -> f64 {
        match &self.scheme {
            Scheme::Basic => self.params.p() - self.params.q(),
            Scheme::Advanced(hot) => hot.p1 * (hot.p2 - hot.q2),
        }
    }

    /// Expected count one report adds to an item it was not generated from.
    fn noise(&self) -> f64 {
        match &self.scheme {
            Scheme::Basic => self.params.q(),
            Scheme::Advanced(hot) => {
                let heavy_capacity = self.sketch.heavy_capacity() as f64;
                hot.gamma_h * hot.p1 * hot.q2 + (1.0 - hot.gamma_h) * hot.q1 / heavy_capacity
            }
        }
    }

    /// Reports able to add noise to the bucket at `index`. Basic reports range over the whole
    /// domain; advanced reports stay in their bucket.
    fn reports_seen(&self, index: usize) -> u64 {
        match &self.scheme {
            Scheme::Basic => self.statistics,
            Scheme::Advanced(_) => self.landed[index],
        }
    }

    fn window(&self, index: usize) -> u64 {
        self.reports_seen(index).saturating_sub(self.marks[index])
    }

    fn domain_ref(&self) -> Result<&Domain<T>, Error> {
        self.domain.as_ref().ok_or_else(Error::domain_unavailable)
    }
}

impl<T: Eq + Hash + Clone> LdpHeavyHitter<T> for HgHeavyHitter<T> {
    type Report = HgReport<T>;

    fn mechanism(&self) -> Mechanism {
        HgHeavyHitter::mechanism(self)
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn k(&self) -> usize {
        self.k
    }

    fn window_epsilon(&self) -> f64 {
        HgHeavyHitter::window_epsilon(self)
    }

    fn total_ingested(&self) -> u64 {
        self.total
    }

    fn warmup_insert(&mut self, item: T) -> Result<bool, Error> {
        HgHeavyHitter::warmup_insert(self, item)
    }

    fn stop_warmup(&mut self) -> Result<(), Error> {
        HgHeavyHitter::stop_warmup(self)
    }

    fn randomize<R>(&self, item: &T, rng: &mut R) -> Result<HgReport<T>, Error>
    where
        R: Rng + ?Sized,
    {
        HgHeavyHitter::randomize(self, item, rng)
    }

    fn randomize_insert(&mut self, report: HgReport<T>) -> Result<bool, Error> {
        HgHeavyHitter::randomize_insert(self, report)
    }

    fn response(&self, item: &T) -> f64 {
        HgHeavyHitter::response(self, item)
    }

    fn response_ordered_heavy_hitters(&self) -> Result<Vec<(T, f64)>, Error> {
        Ok(self.top_k())
    }

    fn cleanup(&mut self) -> Result<(), Error> {
        HgHeavyHitter::cleanup(self)
    }
}

fn scheme_mechanism(scheme: &Scheme) -> Mechanism {
    match scheme {
        Scheme::Basic => Mechanism::Basic,
        Scheme::Advanced(_) => Mechanism::Advanced,
    }
}

fn hot_params(window_epsilon: f64, alpha: f64, heavy_capacity: usize) -> Result<HotParams, Error> {
    let hot_epsilon = alpha * window_epsilon;
    let cold_epsilon = (1.0 - alpha) * window_epsilon;
    check_epsilon(hot_epsilon)?;
    check_epsilon(cold_epsilon)?;
    let (p1, q1) = rr_params(1, hot_epsilon);
    let (p2, q2) = rr_params(heavy_capacity - 1, cold_epsilon);
    Ok(HotParams {
        alpha,
        cold_epsilon,
        p1,
        q1,
        p2,
        q2,
        gamma_h: 0.0,
    })
}

/// Randomizes among the guardians of a bucket: a hot item is kept with probability
/// `p2 - q2` and otherwise, like a cold item, replaced by a uniformly drawn guardian.
fn report_hot<T, R>(hot: &HotParams, guardians: &[&T], item: &T, is_hot: bool, rng: &mut R) -> T
where
    T: Clone,
    R: Rng + ?Sized,
{
    let u: f64 = rng.random();
    let j = rng.random_range(0..guardians.len());
    if is_hot && u <= hot.p2 - hot.q2 {
        item.clone()
    } else {
        guardians[j].clone()
    }
}
