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

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::Error;
use crate::ldp::RandomizedResponse;
use crate::ldp::domain::Domain;

/// Reporting side of the protocol.
///
/// A client perturbs true items locally; only the value returned by
/// [`LdpClient::randomize`] is meant to leave the reporter.
///
/// # Examples
///
/// ```
/// # use heavyhitters::ldp::LdpClient;
/// let mut client = LdpClient::with_seed(["a", "b", "c"], 2.0, 7).unwrap();
/// let report = client.randomize(&"a").unwrap();
/// assert!(["a", "b", "c"].contains(&report));
/// assert!(client.randomize(&"z").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct LdpClient<T> {
    domain: Domain<T>,
    params: RandomizedResponse,
    rng: StdRng,
}

impl<T: Eq + Hash + Clone> LdpClient<T> {
    /// Creates a client drawing randomness from the operating system.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidDomain` if `domain` has fewer than two distinct items, and with
    /// `InvalidPrivacyBudget` if `epsilon` is not a usable privacy parameter.
    pub fn new<I>(domain: I, epsilon: f64) -> Result<Self, Error>
    where
        I: IntoIterator<Item = T>,
    {
        let domain = Domain::new(domain);
        let params = RandomizedResponse::new(domain.len(), epsilon)?;
        Ok(Self::from_parts(domain, params, StdRng::from_os_rng()))
    }

    /// Creates a client whose reports are reproducible from `seed`.
    pub fn with_seed<I>(domain: I, epsilon: f64, seed: u64) -> Result<Self, Error>
    where
        I: IntoIterator<Item = T>,
    {
        let domain = Domain::new(domain);
        let params = RandomizedResponse::new(domain.len(), epsilon)?;
        Ok(Self::from_parts(domain, params, StdRng::seed_from_u64(seed)))
    }

    pub(crate) fn from_parts(domain: Domain<T>, params: RandomizedResponse, rng: StdRng) -> Self {
        Self {
            domain,
            params,
            rng,
        }
    }

    /// Returns the randomized-response parameters.
    pub fn params(&self) -> &RandomizedResponse {
        &self.params
    }

    /// Returns the domain items.
    pub fn domain(&self) -> &[T] {
        self.domain.items()
    }

    /// Perturbs `item` with randomized response.
    ///
    /// # Errors
    ///
    /// Fails with `ItemNotInDomain` if `item` is not a domain member.
    pub fn randomize(&mut self, item: &T) -> Result<T, Error> {
        if !self.domain.contains(item) {
            return Err(Error::item_not_in_domain());
        }
        let report = self
            .params
            .randomize(self.domain.items(), item, &mut self.rng);
        Ok(report.clone())
    }

    /// Restarts the random stream from `seed`.
    ///
    /// Reports issued afterwards depend only on `seed` and the sequence of calls.
    pub fn reseed(&mut self, seed: u64) -> Result<(), Error> {
        self.rng = StdRng::seed_from_u64(seed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reseed_replays_reports() {
        let mut client = LdpClient::new(0..8u32, 0.5).unwrap();
        client.reseed(11).unwrap();
        let first: Vec<u32> = (0..64).map(|i| client.randomize(&(i % 8)).unwrap()).collect();
        client.reseed(11).unwrap();
        let second: Vec<u32> = (0..64).map(|i| client.randomize(&(i % 8)).unwrap()).collect();
        assert_eq!(first, second);
    }
}
