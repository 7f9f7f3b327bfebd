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

use rand::Rng;

use crate::error::Error;

/// Computes the randomized-response parameters `(p, q)` for a domain of `domain_size` items
/// and privacy parameter `epsilon`.
///
/// `p = e^ε / (e^ε + d - 1)` is the probability of reporting the true item and
/// `q = 1 / (e^ε + d - 1)` the probability of reporting any one other item. Both are computed
/// from `t = e^-ε` as `p = 1 / (1 + (d - 1)·t)` and `q = t / (1 + (d - 1)·t)`, so any positive
/// `epsilon` is usable. `f64::INFINITY` yields `p = 1` and `q = 0`.
///
/// # Errors
///
/// * [`ErrorKind::InvalidDomain`](crate::error::ErrorKind::InvalidDomain) if `domain_size < 2`.
/// * [`ErrorKind::InvalidPrivacyBudget`](crate::error::ErrorKind::InvalidPrivacyBudget) if
///   `epsilon` is not positive or is NaN.
///
/// # Examples
///
/// ```
/// # use heavyhitters::ldp::compute_params;
/// let (p, q) = compute_params(4, 1.0).unwrap();
/// assert!((p + 3.0 * q - 1.0).abs() < 1e-12);
/// assert!(p > q);
/// ```
pub fn compute_params(domain_size: usize, epsilon: f64) -> Result<(f64, f64), Error> {
    if domain_size <= 1 {
        return Err(Error::invalid_domain(domain_size));
    }
    check_epsilon(epsilon)?;
    Ok(rr_params(domain_size - 1, epsilon))
}

/// `(p, q)` of randomized response with `others` alternatives besides the true item.
pub(crate) fn rr_params(others: usize, epsilon: f64) -> (f64, f64) {
    let t = (-epsilon).exp();
    let denominator = 1.0 + others as f64 * t;
    (1.0 / denominator, t / denominator)
}

pub(crate) fn check_epsilon(epsilon: f64) -> Result<(), Error> {
    if epsilon.is_nan() || epsilon <= 0.0 {
        return Err(Error::invalid_privacy_budget(format!(
            "epsilon must be positive; got {epsilon}"
        )));
    }
    Ok(())
}

/// Recovers an unbiased count from `observed` randomized reports out of `total`.
///
/// Computes `(observed - total·q) / (p - q)`.
pub fn debias(observed: f64, total: u64, p: f64, q: f64) -> f64 {
    (observed - total as f64 * q) / (p - q)
}

/// Parameters of `d`-ary randomized response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomizedResponse {
    domain_size: usize,
    epsilon: f64,
    p: f64,
    q: f64,
}

impl RandomizedResponse {
    /// Derives the parameters for `domain_size` items and privacy parameter `epsilon`.
    ///
    /// Fails under the same conditions as [`compute_params`].
    pub fn new(domain_size: usize, epsilon: f64) -> Result<Self, Error> {
        let (p, q) = compute_params(domain_size, epsilon)?;
        Ok(Self {
            domain_size,
            epsilon,
            p,
            q,
        })
    }

    /// Returns the domain size `d`.
    pub fn domain_size(&self) -> usize {
        self.domain_size
    }

    /// Returns the privacy parameter `ε`.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Returns the probability of reporting the true item.
    pub fn p(&self) -> f64 {
        self.p
    }

    /// Returns the probability of reporting one specific other item.
    pub fn q(&self) -> f64 {
        self.q
    }

    /// Maps a raw observed count to an unbiased estimate. See [`debias`].
    pub fn debias(&self, observed: f64, total: u64) -> f64 {
        debias(observed, total, self.p, self.q)
    }

    /// Inverse of [`RandomizedResponse::debias`]: `value·(p - q) + total·q`.
    ///
    /// Applied to an exact count, the result debiases back to that count.
    pub fn bias(&self, value: f64, total: u64) -> f64 {
        value * (self.p - self.q) + total as f64 * self.q
    }

    /// Perturbs `item` over `domain`.
    ///
    /// Draws `u` uniformly from `[0, 1)` and an index `j` uniformly from `[0, d)`. Returns
    /// `domain[j]` if `u > p - q`, and `item` otherwise. Both values are always drawn so the
    /// random stream consumed does not depend on the outcome.
    ///
    /// Callers must ensure `item` belongs to `domain` and `domain` is non-empty.
    pub fn randomize<'a, T, R>(&self, domain: &'a [T], item: &'a T, rng: &mut R) -> &'a T
    where
        R: Rng + ?Sized,
    {
        let u: f64 = rng.random();
        let j = rng.random_range(0..domain.len());
        if u > self.p - self.q {
            &domain[j]
        } else {
            item
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_params_sum_to_one() {
        for (d, epsilon) in [(2, 0.1), (4, 1.0), (100, 5.0), (1000, 16.0)] {
            let rr = RandomizedResponse::new(d, epsilon).unwrap();
            let total = rr.p() + (d - 1) as f64 * rr.q();
            assert!((total - 1.0).abs() < 1e-9, "d={d}, epsilon={epsilon}");
            assert!(rr.p() > rr.q());
        }
    }

    #[test]
    fn test_invalid_inputs() {
        assert_eq!(
            compute_params(1, 1.0).unwrap_err().kind(),
            ErrorKind::InvalidDomain
        );
        assert_eq!(
            compute_params(0, 1.0).unwrap_err().kind(),
            ErrorKind::InvalidDomain
        );
        for epsilon in [0.0, -1.0, f64::NAN, f64::NEG_INFINITY] {
            assert_eq!(
                compute_params(4, epsilon).unwrap_err().kind(),
                ErrorKind::InvalidPrivacyBudget,
                "epsilon={epsilon}"
            );
        }
    }

    #[test]
    fn test_large_epsilon_is_accepted() {
        for epsilon in [709.0, 800.0, 1000.0, f64::MAX] {
            let (p, q) = compute_params(4, epsilon).unwrap();
            assert!((p - 1.0).abs() < 1e-12, "epsilon={epsilon}");
            assert!((0.0..1e-300).contains(&q), "epsilon={epsilon}");
        }
        assert_eq!(compute_params(4, f64::INFINITY).unwrap(), (1.0, 0.0));
    }

    #[test]
    fn test_stable_form_matches_direct_form() {
        for (d, epsilon) in [(2, 0.5), (4, 1.0), (100, 5.0), (1000, 16.0)] {
            let (p, q) = compute_params(d, epsilon).unwrap();
            let e = f64::exp(epsilon);
            let denominator = e + (d - 1) as f64;
            assert!((p - e / denominator).abs() < 1e-12, "d={d}, epsilon={epsilon}");
            assert!((q - 1.0 / denominator).abs() < 1e-12, "d={d}, epsilon={epsilon}");
        }
    }

    #[test]
    fn test_bias_inverts_debias() {
        let rr = RandomizedResponse::new(10, 2.0).unwrap();
        let biased = rr.bias(37.0, 120);
        assert!((rr.debias(biased, 120) - 37.0).abs() < 1e-9);
    }
}
