use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ReplyError;
use crate::model::{PathMetric, QueryId};

/// Full source-target count matrix, indexed by host id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MatrixReply {
    #[serde(default)]
    pub iteration: u64,
    pub counts: Vec<Vec<u64>>,
}

/// Histogram bins per metric name.
pub type JointHistograms = BTreeMap<String, Vec<u64>>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TopVulnerabilities {
    #[serde(default)]
    pub iteration: u64,
    /// `(cve, count)` pairs, most frequent first.
    pub cves: Vec<(String, u64)>,
}

/// Traces of one query ranked by a metric, thinned by the backend to a
/// bounded sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathHistogram {
    #[serde(default)]
    pub iteration: u64,
    pub metric: PathMetric,
    /// `(trace, value)` pairs, highest value first.
    pub paths: Vec<(String, f64)>,
}

impl PathHistogram {
    /// Smallest and largest sampled value.
    pub fn range(&self) -> Option<(f64, f64)> {
        let mut values = self.paths.iter().map(|(_, value)| *value);
        let first = values.next()?;
        Some(values.fold((first, first), |(low, high), value| {
            (low.min(value), high.max(value))
        }))
    }

    /// Counts of sampled values in `count` equal-width bins over
    /// [`range`](Self::range). A zero-width range lands in the first bin.
    pub fn bins(&self, count: usize) -> Vec<u64> {
        let mut bins = vec![0; count];
        let Some((low, high)) = self.range() else {
            return bins;
        };
        if count == 0 {
            return bins;
        }
        let width = high - low;
        for (_, value) in &self.paths {
            let slot = if width > 0.0 {
                (((value - low) / width) * count as f64) as usize
            } else {
                0
            };
            bins[slot.min(count - 1)] += 1;
        }
        bins
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationStatistics {
    pub id: QueryId,
    #[serde(default)]
    pub precision: Option<f64>,
    #[serde(default)]
    pub min_stability: Option<f64>,
    #[serde(default)]
    pub max_stability: Option<f64>,
    #[serde(default)]
    pub stability: Option<f64>,
}

pub fn decode_reply<T: DeserializeOwned>(purpose: &'static str, payload: Value) -> Result<T, ReplyError> {
    serde_json::from_value(payload).map_err(|source| ReplyError { purpose, source })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::AttackPath;

    #[test]
    fn decodes_matrix_and_reports_shape_errors() {
        let reply: MatrixReply =
            decode_reply("matrix", json!({"iteration": 2, "counts": [[0, 1], [3, 0]]})).unwrap();
        assert_eq!(reply.counts[1][0], 3);

        let error = decode_reply::<MatrixReply>("matrix", json!({"counts": "nope"})).unwrap_err();
        assert_eq!(error.purpose, "matrix");
    }

    #[test]
    fn decodes_attack_path_list() {
        let paths: Vec<AttackPath> = decode_reply(
            "attack paths",
            json!([{"trace": "none@0#CVE-1#root@1", "likelihood": 0.4, "length": 1}]),
        )
        .unwrap();
        assert_eq!(paths[0].steps().unwrap()[0].target, 1);
    }

    #[test]
    fn decodes_top_vulnerabilities() {
        let top: TopVulnerabilities =
            decode_reply("top", json!({"iteration": 5, "cves": [["CVE-1", 9], ["CVE-2", 4]]}))
                .unwrap();
        assert_eq!(top.cves[0], ("CVE-1".to_owned(), 9));
    }

    #[test]
    fn path_histogram_bins_span_the_sampled_range() {
        let histogram: PathHistogram = decode_reply(
            "histogram",
            json!({
                "iteration": 4,
                "metric": "risk",
                "paths": [["a", 1.0], ["b", 0.75], ["c", 0.5], ["d", 0.0]]
            }),
        )
        .unwrap();
        assert_eq!(histogram.metric, PathMetric::Risk);
        assert_eq!(histogram.range(), Some((0.0, 1.0)));
        assert_eq!(histogram.bins(2), vec![1, 3]);
        assert_eq!(histogram.bins(4), vec![1, 0, 1, 2]);
    }

    #[test]
    fn empty_or_flat_histograms_bin_safely() {
        let empty = PathHistogram {
            iteration: 0,
            metric: PathMetric::Score,
            paths: Vec::new(),
        };
        assert_eq!(empty.range(), None);
        assert_eq!(empty.bins(3), vec![0, 0, 0]);

        let flat = PathHistogram {
            paths: vec![("a".into(), 2.0), ("b".into(), 2.0)],
            ..empty
        };
        assert_eq!(flat.bins(3), vec![2, 0, 0]);
        assert!(flat.bins(0).is_empty());
    }
}
