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

use googletest::prelude::*;
use heavyhitters::error::ErrorKind;
use heavyhitters::ldp::LdpClient;
use heavyhitters::ldp::RandomizedResponse;
use heavyhitters::ldp::compute_params;
use heavyhitters::ldp::debias;
use rand::SeedableRng;
use rand::rngs::StdRng;

const DOMAIN: [&str; 4] = ["A", "B", "C", "D"];
const TRIALS: usize = 200_000;

fn frequencies(reports: impl Iterator<Item = &'static str>) -> HashMap<&'static str, f64> {
    let mut counts: HashMap<&str, f64> = HashMap::new();
    for report in reports {
        *counts.entry(report).or_default() += 1.0;
    }
    for count in counts.values_mut() {
        *count /= TRIALS as f64;
    }
    counts
}

#[test]
fn test_known_parameters() {
    let (p, q) = compute_params(2, 3.0f64.ln()).unwrap();
    assert_that!(p, near(0.75, 1e-12));
    assert_that!(q, near(0.25, 1e-12));

    let rr = RandomizedResponse::new(4, 1.0).unwrap();
    let e = 1.0f64.exp();
    assert_that!(rr.p(), near(e / (e + 3.0), 1e-12));
    assert_that!(rr.q(), near(1.0 / (e + 3.0), 1e-12));
    assert_that!(rr.domain_size(), eq(4));
    assert_that!(rr.epsilon(), eq(1.0));
}

#[test]
fn test_parameter_errors() {
    let err = compute_params(1, 1.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDomain);
    insta::assert_snapshot!(err, @"InvalidDomain: domain size must be greater than 1; got 1");

    let err = compute_params(4, -0.5).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPrivacyBudget);
    insta::assert_snapshot!(err, @"InvalidPrivacyBudget: epsilon must be positive; got -0.5");
}

#[test]
fn test_debias_of_pure_noise_is_zero() {
    let (p, q) = compute_params(10, 0.5).unwrap();
    let total = 1_000;
    assert_that!(debias(total as f64 * q, total, p, q), near(0.0, 1e-9));
    assert_that!(debias(total as f64 * p, total, p, q), near(1_000.0, 1e-6));
}

#[test]
fn test_randomize_is_unbiased() {
    let rr = RandomizedResponse::new(DOMAIN.len(), 1.0).unwrap();
    let mut rng = StdRng::seed_from_u64(2024);
    let truth = &DOMAIN[0];
    let freq = frequencies((0..TRIALS).map(|_| *rr.randomize(&DOMAIN, truth, &mut rng)));

    assert_that!(freq[&"A"], near(rr.p(), 0.01));
    for other in &DOMAIN[1..] {
        assert_that!(freq[other], near(rr.q(), 0.01));
    }
}

#[test]
fn test_client_is_unbiased() {
    let mut client = LdpClient::with_seed(DOMAIN, 1.0, 77).unwrap();
    let p = client.params().p();
    let q = client.params().q();
    let freq = frequencies((0..TRIALS).map(|_| client.randomize(&"C").unwrap()));

    assert_that!(freq[&"C"], near(p, 0.01));
    for other in ["A", "B", "D"] {
        assert_that!(freq[&other], near(q, 0.01));
    }
}

#[test]
fn test_client_rejects_foreign_item() {
    let mut client = LdpClient::with_seed(DOMAIN, 1.0, 1).unwrap();
    let err = client.randomize(&"Z").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ItemNotInDomain);
    assert_eq!(client.domain(), &DOMAIN);
}

#[test]
fn test_client_reseed_is_reproducible() {
    let mut left = LdpClient::new(DOMAIN, 0.1).unwrap();
    let mut right = LdpClient::with_seed(DOMAIN, 0.1, 5).unwrap();
    left.reseed(5).unwrap();
    for item in DOMAIN.iter().cycle().take(200) {
        assert_eq!(left.randomize(item).unwrap(), right.randomize(item).unwrap());
    }
}
