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

use googletest::prelude::*;
use heavyhitters::counter::CounterBackend;
use heavyhitters::counter::StreamCounter;
use heavyhitters::error::ErrorKind;
use heavyhitters::guardian::GuardianSketch;
use heavyhitters::ldp::GuardianConfig;
use heavyhitters::ldp::HeavyHitter;
use heavyhitters::ldp::HeavyHitterConfig;
use heavyhitters::ldp::Phase;
use rand::SeedableRng;
use rand::rngs::StdRng;

const DOMAIN: [&str; 4] = ["A", "B", "C", "D"];

fn guardian_config() -> GuardianConfig {
    GuardianConfig {
        buckets: 16,
        heavy_capacity: 2,
        light_capacity: 2,
        seed: Some(11),
    }
}

/// Warms up with 1000 A, 10 B, 5 C, 5 D, then feeds 5000 randomized A.
fn run_scenario<S>(session: &mut HeavyHitter<&'static str, S>)
where
    S: StreamCounter<&'static str, Count = f64>,
{
    let warmup = [("A", 1_000), ("B", 10), ("C", 5), ("D", 5)];
    for (item, times) in warmup {
        for _ in 0..times {
            assert!(session.warmup_insert(item).unwrap());
        }
    }
    session.stop_warmup().unwrap();

    let mut rng = StdRng::seed_from_u64(4242);
    for _ in 0..5_000 {
        let report = session.randomize(&"A", &mut rng).unwrap();
        session.randomize_insert(report).unwrap();
    }
    assert_eq!(session.total_ingested(), 6_020);
}

fn assert_scenario_estimate<S>(session: &HeavyHitter<&'static str, S>)
where
    S: StreamCounter<&'static str, Count = f64>,
{
    let hitters = session.response_heavy_hitters().unwrap();
    assert_that!(hitters.len(), eq(1));
    assert_that!(hitters[&"A"], near(6_000.0, 50.0));

    let ordered = session.response_ordered_heavy_hitters().unwrap();
    assert_eq!(ordered.len(), 1);
    assert_eq!(ordered[0].0, "A");
}

#[test]
fn test_scenario_exact() {
    let mut session = HeavyHitter::new(DOMAIN, 1, 16.0).unwrap();
    run_scenario(&mut session);
    assert_scenario_estimate(&session);
}

#[test]
fn test_scenario_guardian() {
    let mut session = HeavyHitter::with_guardian(DOMAIN, 1, 16.0, &guardian_config()).unwrap();
    run_scenario(&mut session);
    assert_scenario_estimate(&session);
    assert_eq!(session.counter().insert_count(), 6_020);
}

#[test]
fn test_scenario_from_config() {
    let config: HeavyHitterConfig = serde_json::from_str(
        r#"{
            "k": 1,
            "window_epsilon": 16.0,
            "sketch": { "buckets": 16, "heavy_capacity": 2, "light_capacity": 2, "seed": 11 }
        }"#,
    )
    .unwrap();
    assert_eq!(config.sketch, Some(guardian_config()));

    let mut session = config.build(DOMAIN).unwrap();
    assert!(matches!(session.counter(), CounterBackend::Guardian(_)));
    run_scenario(&mut session);
    assert_scenario_estimate(&session);

    let mut exact = HeavyHitterConfig::exact(1, 16.0).build(DOMAIN).unwrap();
    assert_eq!(exact.counter().name(), "exact");
    run_scenario(&mut exact);
    assert_scenario_estimate(&exact);
}

#[test]
fn test_construction_errors() {
    let err = HeavyHitter::new(["A"], 1, 1.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDomain);

    let err = HeavyHitter::new(["A", "A", "A"], 1, 1.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDomain);

    let err = HeavyHitter::new(DOMAIN, 0, 1.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    insta::assert_snapshot!(err, @"InvalidArgument: k must be in [1, 4]; got 0");

    let err = HeavyHitter::new(DOMAIN, 5, 1.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = HeavyHitter::new(DOMAIN, 1, 0.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPrivacyBudget);

    let mut config = guardian_config();
    config.heavy_capacity = 0;
    let err = HeavyHitter::with_guardian(DOMAIN, 1, 1.0, &config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_large_epsilon_is_noise_free() {
    for epsilon in [800.0, f64::INFINITY] {
        let mut session = HeavyHitter::new(DOMAIN, 1, epsilon).unwrap();
        assert_eq!(session.params().q(), 0.0);
        run_scenario(&mut session);
        assert_eq!(session.response(&"A"), 6_000.0);
        assert_eq!(session.response(&"B"), 10.0);
        assert_scenario_estimate(&session);
    }
}

#[test]
fn test_prefilled_counter_is_rejected() {
    let mut sketch = GuardianSketch::<u32, f64>::with_seed(8, 4, 0, 5);
    sketch.insert(1);
    let err = HeavyHitter::with_counter(0..10u32, 3, 2.0, sketch).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    insta::assert_snapshot!(
        err,
        @"InvalidArgument: counter must be empty; it has counted 1 items"
    );

    let mut sketch = GuardianSketch::<u32, f64>::with_seed(8, 4, 0, 5);
    sketch.insert(1);
    sketch.reset();
    assert!(HeavyHitter::with_counter(0..10u32, 3, 2.0, sketch).is_ok());
}

#[test]
fn test_accessors() {
    let session = HeavyHitter::new(["x", "y", "x", "z"], 2, 0.5).unwrap();
    assert_eq!(session.domain().unwrap(), &["x", "y", "z"]);
    assert_eq!(session.domain_size(), 3);
    assert_eq!(session.k(), 2);
    assert_eq!(session.window_epsilon(), 0.5);
    assert_eq!(session.total_ingested(), 0);
    assert_eq!(session.phase(), Phase::WarmUp);
    assert_that!(
        session.params().p() + 2.0 * session.params().q(),
        near(1.0, 1e-12)
    );
}

#[test]
fn test_phase_guards() {
    let mut session = HeavyHitter::new(DOMAIN, 2, 1.0).unwrap();
    let mut rng = StdRng::seed_from_u64(0);

    let err = session.randomize(&"A", &mut rng).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    let err = session.randomize_insert("A").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    insta::assert_snapshot!(
        err,
        @"InvalidState: randomize_insert requires the Statistics phase, context: { phase: WarmUp }"
    );
    let err = session.cleanup().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(session.phase(), Phase::WarmUp);

    session.warmup_insert("A").unwrap();
    session.stop_warmup().unwrap();
    assert_eq!(session.phase(), Phase::Statistics);

    let err = session.warmup_insert("A").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    let err = session.stop_warmup().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    let err = session.randomize(&"Z", &mut rng).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ItemNotInDomain);

    session.cleanup().unwrap();
    assert_eq!(session.phase(), Phase::Cleaned);
    let err = session.cleanup().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    let err = session.randomize(&"A", &mut rng).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    let err = session.randomize_insert("A").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[test]
fn test_cleaned_session_releases_domain() {
    let mut session = HeavyHitter::new(DOMAIN, 2, 20.0).unwrap();
    for _ in 0..40 {
        session.warmup_insert("B").unwrap();
    }
    session.stop_warmup().unwrap();
    session.cleanup().unwrap();

    assert_eq!(session.top_k().unwrap_err().kind(), ErrorKind::DomainUnavailable);
    assert_eq!(session.domain().unwrap_err().kind(), ErrorKind::DomainUnavailable);
    assert_eq!(
        session.response_domain().unwrap_err().kind(),
        ErrorKind::DomainUnavailable
    );
    assert_eq!(session.client().unwrap_err().kind(), ErrorKind::DomainUnavailable);

    // single-item reads stay debiased
    assert_that!(session.response(&"B"), near(40.0, 1e-6));
    assert_eq!(session.domain_size(), 4);
}

#[test]
fn test_warmup_reads_are_raw() {
    let mut session = HeavyHitter::new(DOMAIN, 2, 1.0).unwrap();
    for item in ["A", "B", "A", "A"] {
        session.warmup_insert(item).unwrap();
    }
    assert_eq!(session.response(&"A"), 3.0);
    assert_eq!(session.response(&"C"), 0.0);

    let ordered = session.response_ordered_domain().unwrap();
    assert_eq!(ordered[0], ("A", 3.0));
    assert_eq!(ordered[1], ("B", 1.0));
}

#[test]
fn test_stop_warmup_preserves_warmup_counts() {
    let mut session = HeavyHitter::new(DOMAIN, 2, 1.0).unwrap();
    for (item, times) in [("A", 3), ("B", 7), ("C", 5)] {
        for _ in 0..times {
            session.warmup_insert(item).unwrap();
        }
    }
    session.stop_warmup().unwrap();

    let ordered = session.response_ordered_domain().unwrap();
    let items: Vec<&str> = ordered.iter().map(|(item, _)| *item).collect();
    assert_eq!(items, ["B", "C", "A", "D"]);
    assert_that!(ordered[0].1, near(7.0, 1e-9));
    assert_that!(ordered[1].1, near(5.0, 1e-9));
    assert_that!(ordered[2].1, near(3.0, 1e-9));
    // D was never counted, so its estimate is the debiased zero
    let (p, q) = (session.params().p(), session.params().q());
    assert_that!(ordered[3].1, near(-15.0 * q / (p - q), 1e-9));
    assert_that!(ordered[3].1, lt(0.0));

    let top = session.top_k().unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].0, "B");
    assert_eq!(top[1].0, "C");

    let all = session.response_domain().unwrap();
    assert_eq!(all.len(), 4);
}

#[test]
fn test_debias_round_trip_without_noise() {
    let mut session = HeavyHitter::new(DOMAIN, 1, 30.0).unwrap();
    for _ in 0..100 {
        session.warmup_insert("D").unwrap();
    }
    session.stop_warmup().unwrap();
    let mut rng = StdRng::seed_from_u64(9);
    for _ in 0..900 {
        let report = session.randomize(&"D", &mut rng).unwrap();
        session.randomize_insert(report).unwrap();
    }
    assert_that!(session.response(&"D"), near(1_000.0, 1e-3));
    for other in ["A", "B", "C"] {
        assert_that!(session.response(&other), near(0.0, 1e-3));
    }
}

#[test]
fn test_client_reports_feed_the_session() {
    let mut session = HeavyHitter::new(DOMAIN, 1, 8.0).unwrap();
    session.stop_warmup().unwrap();
    let mut client = session.client().unwrap();
    client.reseed(3).unwrap();
    for _ in 0..2_000 {
        let report = client.randomize(&"C").unwrap();
        session.randomize_insert(report).unwrap();
    }
    let top = session.top_k().unwrap();
    assert_eq!(top[0].0, "C");
    assert_that!(top[0].1, near(2_000.0, 100.0));
}

#[test]
fn test_reseed_is_unsupported() {
    let mut session = HeavyHitter::new(DOMAIN, 1, 1.0).unwrap();
    let err = session.reseed(1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
}

#[test]
fn test_bounded_counter_may_drop() {
    let config = GuardianConfig {
        buckets: 1,
        heavy_capacity: 1,
        light_capacity: 0,
        seed: Some(2),
    };
    let mut session = HeavyHitter::with_guardian(0..100u32, 5, 1.0, &config).unwrap();
    let mut dropped = 0;
    for i in 0..2_000u32 {
        if !session.warmup_insert(i % 100).unwrap() {
            dropped += 1;
        }
    }
    assert!(dropped > 0);
    assert_eq!(session.total_ingested(), 2_000);
    assert_eq!(session.counter().insert_count(), 2_000);
    assert_eq!(session.counter().num_tracked(), 1);
}

#[test]
fn test_custom_counter() {
    let sketch = GuardianSketch::<u32, f64>::with_seed(8, 4, 0, 5);
    let mut session = HeavyHitter::with_counter(0..10u32, 3, 2.0, sketch).unwrap();
    for item in [1, 1, 1, 2, 2, 3] {
        session.warmup_insert(item).unwrap();
    }
    session.stop_warmup().unwrap();
    let top = session.top_k().unwrap();
    let items: Vec<u32> = top.iter().map(|(item, _)| *item).collect();
    assert_eq!(items, [1, 2, 3]);
}
