use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::query::QueryId;
use super::store::{HostId, LinkId};

/// Path statistics for one source (the baseline or one query) at one
/// iteration. Hosts or pairs without an entry have a count of zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsRecord {
    pub iteration: u64,
    pub unique: u64,
    pub hosts: BTreeMap<HostId, u64>,
    /// Directed `source -> target -> count`.
    pub edges: BTreeMap<HostId, BTreeMap<HostId, u64>>,
    pub host_sum: u64,
    pub edge_sum: u64,
}

impl StatisticsRecord {
    pub fn host_count(&self, host: HostId) -> u64 {
        self.hosts.get(&host).copied().unwrap_or(0)
    }

    pub fn max_host_count(&self) -> u64 {
        self.hosts.values().copied().max().unwrap_or(0)
    }

    /// Folds both traversal directions of every pair into its canonical link.
    pub fn link_counts(&self) -> BTreeMap<LinkId, u64> {
        let mut folded = BTreeMap::new();
        for (&source, targets) in &self.edges {
            for (&target, &count) in targets {
                if let Some(link) = LinkId::new(source, target) {
                    *folded.entry(link).or_insert(0) += count;
                }
            }
        }
        folded
    }
}

/// One baseline record plus the records of every active query, applied as a
/// unit.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    #[serde(rename = "stat", default)]
    pub baseline: StatisticsRecord,
    #[serde(rename = "steer", default)]
    pub queries: BTreeMap<QueryId, StatisticsRecord>,
}

impl StatisticsSnapshot {
    /// Iteration numbers of every record, used to detect "nothing new".
    pub fn iterations(&self) -> (u64, BTreeMap<QueryId, u64>) {
        (
            self.baseline.iteration,
            self.queries
                .iter()
                .map(|(&id, record)| (id, record.iteration))
                .collect(),
        )
    }
}
