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
use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

/// One estimated heavy hitter next to its true count.
#[derive(Debug, Clone, Serialize)]
pub struct Row {
    pub item: String,
    pub estimate: f64,
    pub true_count: u64,
}

/// Outcome of one replay.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub mechanism: &'static str,
    pub backend: &'static str,
    pub k: usize,
    pub window_epsilon: f64,
    pub total: u64,
    pub warmup: u64,
    pub skipped: u64,
    pub precision: f64,
    pub relative_error: f64,
    pub heavy_hitters: Vec<Row>,
}

impl Report {
    /// Scores `estimated` against the exact counts of the replayed stream.
    ///
    /// Precision is the share of the true top-k found; the relative error is averaged over the
    /// reported items with a non-zero true count.
    pub fn score(
        estimated: Vec<(String, f64)>,
        exact: &HashMap<String, u64>,
        k: usize,
    ) -> (Vec<Row>, f64, f64) {
        let mut truth: Vec<(&String, u64)> = exact.iter().map(|(item, n)| (item, *n)).collect();
        truth.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let true_top: HashSet<&String> = truth.iter().take(k).map(|(item, _)| *item).collect();

        let rows: Vec<Row> = estimated
            .into_iter()
            .map(|(item, estimate)| {
                let true_count = exact.get(&item).copied().unwrap_or(0);
                Row {
                    item,
                    estimate,
                    true_count,
                }
            })
            .collect();

        let hits = rows.iter().filter(|row| true_top.contains(&row.item)).count();
        let precision = if k == 0 { 0.0 } else { hits as f64 / k as f64 };

        let errors: Vec<f64> = rows
            .iter()
            .filter(|row| row.true_count > 0)
            .map(|row| (row.estimate - row.true_count as f64).abs() / row.true_count as f64)
            .collect();
        let relative_error = if errors.is_empty() {
            0.0
        } else {
            errors.iter().sum::<f64>() / errors.len() as f64
        };

        (rows, precision, relative_error)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "mechanism={} backend={} k={} epsilon={} total={} warmup={} skipped={}",
            self.mechanism,
            self.backend, self.k, self.window_epsilon, self.total, self.warmup, self.skipped
        )?;
        writeln!(
            f,
            "precision={:.4} relative_error={:.4}",
            self.precision, self.relative_error
        )?;
        writeln!(f, "item\testimate\ttrue_count")?;
        for row in &self.heavy_hitters {
            writeln!(f, "{}\t{:.2}\t{}", row.item, row.estimate, row.true_count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score() {
        let exact: HashMap<String, u64> = [("a", 100), ("b", 50), ("c", 10)]
            .into_iter()
            .map(|(item, n)| (item.to_string(), n))
            .collect();
        let estimated = vec![("a".to_string(), 110.0), ("c".to_string(), 10.0)];
        let (rows, precision, relative_error) = Report::score(estimated, &exact, 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].true_count, 10);
        assert_eq!(precision, 0.5);
        assert!((relative_error - 0.05).abs() < 1e-12);
    }
}
