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

//! Replays a newline-delimited item stream through an LDP heavy-hitter session.

mod report;

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::bail;
use clap::Parser;
use heavyhitters::ldp::GuardianConfig;
use heavyhitters::ldp::HeavyHitterConfig;
use heavyhitters::ldp::LdpHeavyHitter;
use heavyhitters::ldp::Mechanism;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing::warn;

use crate::report::Report;

#[derive(Parser, Debug)]
#[command(name = "hh-replay", version, about)]
struct Args {
    /// Item stream, one item per line.
    #[arg(long)]
    input: PathBuf,

    /// Domain items, one per line. Defaults to the distinct items of the input.
    #[arg(long)]
    domain: Option<PathBuf>,

    /// JSON session configuration. Flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of heavy hitters to report.
    #[arg(long)]
    k: Option<usize>,

    /// Per-item privacy parameter.
    #[arg(long)]
    epsilon: Option<f64>,

    /// Estimation mechanism: naive, basic or advanced.
    #[arg(long)]
    mechanism: Option<Mechanism>,

    /// Share of the privacy parameter spent on the hot/cold decision of the advanced mechanism.
    #[arg(long)]
    alpha: Option<f64>,

    /// Share of the stream counted before randomization starts.
    #[arg(long, default_value_t = 0.01)]
    warmup_ratio: f64,

    /// Guardian sketch buckets; enables the bounded-memory back-end together with `--heavy`.
    #[arg(long, requires = "heavy")]
    buckets: Option<usize>,

    /// Guardian heavy cells per bucket.
    #[arg(long, requires = "buckets")]
    heavy: Option<usize>,

    /// Guardian light cells per bucket. Applies to any configured sketch.
    #[arg(long)]
    light: Option<usize>,

    /// Seed for the sketch and the randomizer.
    #[arg(long)]
    seed: Option<u64>,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

/// Counters of one replay.
#[derive(Debug, Default)]
struct Replay {
    warmup: u64,
    skipped: u64,
    dropped: u64,
}

fn read_lines(path: &Path) -> anyhow::Result<Vec<String>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("unable to read {}", path.display()))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn load_config(args: &Args) -> anyhow::Result<HeavyHitterConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("unable to read config {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => {
            let (Some(k), Some(epsilon)) = (args.k, args.epsilon) else {
                bail!("--k and --epsilon are required without --config");
            };
            HeavyHitterConfig::exact(k, epsilon)
        }
    };

    if let Some(k) = args.k {
        config.k = k;
    }
    if let Some(epsilon) = args.epsilon {
        config.window_epsilon = epsilon;
    }
    if let Some(mechanism) = args.mechanism {
        config.mechanism = mechanism;
    }
    if let Some(alpha) = args.alpha {
        config.alpha = Some(alpha);
    }
    if let (Some(buckets), Some(heavy_capacity)) = (args.buckets, args.heavy) {
        config.sketch = Some(GuardianConfig {
            buckets,
            heavy_capacity,
            light_capacity: 0,
            seed: None,
        });
    }
    // the guardian mechanisms always count through a sketch
    if config.mechanism != Mechanism::Naive && config.sketch.is_none() {
        config.sketch = Some(GuardianConfig::single_bucket(config.k));
    }

    match config.sketch.as_mut() {
        Some(sketch) => {
            if let Some(light) = args.light {
                sketch.light_capacity = light;
            }
            if let Some(seed) = args.seed {
                sketch.seed = Some(seed);
            }
        }
        None if args.light.is_some() => {
            bail!("--light needs a sketch; pass --buckets and --heavy or a config with a sketch")
        }
        None => {}
    }
    Ok(config)
}

/// Counts the first `warmup_ratio` of `stream` exactly and randomizes the rest.
fn replay<H>(
    session: &mut H,
    stream: &[String],
    warmup_ratio: f64,
    seed: u64,
) -> anyhow::Result<Replay>
where
    H: LdpHeavyHitter<String>,
{
    let warmup = (stream.len() as f64 * warmup_ratio).round() as usize;
    let (warmup_items, randomized_items) = stream.split_at(warmup.min(stream.len()));
    let mut replay = Replay {
        warmup: warmup_items.len() as u64,
        ..Replay::default()
    };
    for item in warmup_items {
        if !session.warmup_insert(item.clone())? {
            replay.dropped += 1;
        }
    }
    session.stop_warmup()?;
    info!(
        warmup = replay.warmup,
        dropped = replay.dropped,
        "warm-up finished"
    );

    let mut rng = StdRng::seed_from_u64(seed);
    for item in randomized_items {
        let report = match session.randomize(item, &mut rng) {
            Ok(report) => report,
            Err(err) => {
                warn!(item = %item, %err, "skipping item");
                replay.skipped += 1;
                continue;
            }
        };
        if !session.randomize_insert(report)? {
            replay.dropped += 1;
        }
    }
    info!(
        total = session.total_ingested(),
        skipped = replay.skipped,
        dropped = replay.dropped,
        "stream replayed"
    );
    Ok(replay)
}

fn run<H>(
    session: &mut H,
    backend: &'static str,
    stream: &[String],
    args: &Args,
    seed: u64,
) -> anyhow::Result<Report>
where
    H: LdpHeavyHitter<String>,
{
    info!(
        k = session.k(),
        epsilon = session.window_epsilon(),
        mechanism = %session.mechanism(),
        backend,
        "session ready"
    );
    let replay = replay(session, stream, args.warmup_ratio, seed)?;

    let mut exact: HashMap<String, u64> = HashMap::new();
    for item in stream {
        *exact.entry(item.clone()).or_default() += 1;
    }
    let estimated = session.response_ordered_heavy_hitters()?;
    let (heavy_hitters, precision, relative_error) = Report::score(estimated, &exact, session.k());
    Ok(Report {
        mechanism: session.mechanism().into_static(),
        backend,
        k: session.k(),
        window_epsilon: session.window_epsilon(),
        total: session.total_ingested(),
        warmup: replay.warmup,
        skipped: replay.skipped,
        precision,
        relative_error,
        heavy_hitters,
    })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    if !(0.0..=1.0).contains(&args.warmup_ratio) {
        bail!("--warmup-ratio must be in [0, 1]; got {}", args.warmup_ratio);
    }

    let stream = read_lines(&args.input)?;
    let domain = match &args.domain {
        Some(path) => read_lines(path)?,
        None => stream.clone(),
    };
    let config = load_config(&args)?;
    let seed = args.seed.unwrap_or_else(|| rand::rng().random());

    let report = match config.mechanism {
        Mechanism::Naive => {
            let mut session = config.build(domain).context("invalid session configuration")?;
            let backend = session.counter().name();
            run(&mut session, backend, &stream, &args, seed)?
        }
        Mechanism::Basic | Mechanism::Advanced => {
            let mut session = config
                .build_hg(domain)
                .context("invalid session configuration")?;
            run(&mut session, "guardian", &stream, &args, seed)?
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(flags: &[&str]) -> Args {
        let mut argv = vec!["hh-replay", "--input", "stream.txt"];
        argv.extend_from_slice(flags);
        Args::try_parse_from(argv).unwrap()
    }

    fn write_config(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("hh-replay-{}-{name}.json", std::process::id()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_light_and_seed_apply_to_config_sketch() {
        let path = write_config(
            "sketch",
            r#"{ "k": 2, "window_epsilon": 1.0, "sketch": { "buckets": 4, "heavy_capacity": 2 } }"#,
        );
        let args = parse(&["--config", path.to_str().unwrap(), "--light", "3", "--seed", "9"]);
        let config = load_config(&args).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(
            config.sketch,
            Some(GuardianConfig {
                buckets: 4,
                heavy_capacity: 2,
                light_capacity: 3,
                seed: Some(9),
            })
        );
    }

    #[test]
    fn test_light_without_sketch_is_rejected() {
        let args = parse(&["--k", "1", "--epsilon", "1", "--light", "2"]);
        let err = load_config(&args).unwrap_err();
        assert!(err.to_string().contains("--light"), "{err}");
    }

    #[test]
    fn test_flags_build_a_sketch() {
        let args = parse(&[
            "--k", "1", "--epsilon", "1", "--buckets", "8", "--heavy", "2", "--seed", "5",
        ]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.mechanism, Mechanism::Naive);
        assert_eq!(
            config.sketch,
            Some(GuardianConfig {
                buckets: 8,
                heavy_capacity: 2,
                light_capacity: 0,
                seed: Some(5),
            })
        );
        assert!(Args::try_parse_from(["hh-replay", "--input", "x", "--buckets", "8"]).is_err());
    }

    #[test]
    fn test_mechanism_flags() {
        let args = parse(&[
            "--k", "2", "--epsilon", "1", "--mechanism", "advanced", "--alpha", "0.25", "--seed",
            "3",
        ]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.mechanism, Mechanism::Advanced);
        assert_eq!(config.alpha, Some(0.25));
        assert_eq!(
            config.sketch,
            Some(GuardianConfig {
                seed: Some(3),
                ..GuardianConfig::single_bucket(2)
            })
        );

        let exact = load_config(&parse(&["--k", "2", "--epsilon", "1", "--seed", "3"])).unwrap();
        assert_eq!(exact.sketch, None);

        let argv = ["hh-replay", "--input", "x", "--mechanism", "relaxed"];
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_replay_counts_every_item() {
        let stream: Vec<String> = ["a"; 90]
            .into_iter()
            .chain(["b"; 10])
            .map(str::to_string)
            .collect();
        let config = HeavyHitterConfig::exact(1, 16.0).with_mechanism(Mechanism::Basic);
        let mut session = config.build_hg(["a".to_string(), "b".to_string()]).unwrap();
        let replay = replay(&mut session, &stream, 0.1, 7).unwrap();
        assert_eq!(replay.warmup, 10);
        assert_eq!(replay.skipped, 0);
        assert_eq!(session.total_ingested(), 100);

        let top = session.top_k();
        assert_eq!(top[0].0, "a");
        assert!((top[0].1 - 90.0).abs() < 2.0, "{top:?}");
    }

    #[test]
    fn test_items_outside_the_domain_are_skipped() {
        let stream: Vec<String> = ["a", "b", "c", "a"].into_iter().map(str::to_string).collect();
        let mut session = HeavyHitterConfig::exact(1, 16.0)
            .build(["a".to_string(), "b".to_string()])
            .unwrap();
        let replay = replay(&mut session, &stream, 0.0, 7).unwrap();
        assert_eq!(replay.warmup, 0);
        assert_eq!(replay.skipped, 1);
        assert_eq!(session.total_ingested(), 3);
    }
}
