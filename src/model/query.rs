use std::fmt;

use eframe::egui::Color32;
use serde::{Deserialize, Serialize};

use super::store::HostId;

pub type QueryId = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathMetric {
    Likelihood,
    Impact,
    Risk,
    Score,
    Length,
}

impl PathMetric {
    pub const ALL: [Self; 5] = [
        Self::Likelihood,
        Self::Impact,
        Self::Risk,
        Self::Score,
        Self::Length,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Likelihood => "likelihood",
            Self::Impact => "impact",
            Self::Risk => "risk",
            Self::Score => "score",
            Self::Length => "length",
        }
    }
}

impl fmt::Display for PathMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Inclusive `[min, max]` bound on one metric, sent as `[metric, min, max]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricCondition(pub PathMetric, pub f64, pub f64);

/// Filter attached to a query. Ranges are inclusive; `None` means unbounded.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryFilter {
    pub likelihood_range: Option<(f64, f64)>,
    pub impact_range: Option<(f64, f64)>,
    pub score_range: Option<(f64, f64)>,
    pub risk_range: Option<(f64, f64)>,
    pub length_range: Option<(f64, f64)>,
    pub sources: Option<Vec<HostId>>,
    pub targets: Option<Vec<HostId>>,
}

impl QueryFilter {
    pub fn range(&self, metric: PathMetric) -> Option<(f64, f64)> {
        match metric {
            PathMetric::Likelihood => self.likelihood_range,
            PathMetric::Impact => self.impact_range,
            PathMetric::Risk => self.risk_range,
            PathMetric::Score => self.score_range,
            PathMetric::Length => self.length_range,
        }
    }

    pub fn set_range(&mut self, metric: PathMetric, range: Option<(f64, f64)>) {
        let slot = match metric {
            PathMetric::Likelihood => &mut self.likelihood_range,
            PathMetric::Impact => &mut self.impact_range,
            PathMetric::Risk => &mut self.risk_range,
            PathMetric::Score => &mut self.score_range,
            PathMetric::Length => &mut self.length_range,
        };
        *slot = range;
    }

    pub fn conditions(&self) -> Vec<MetricCondition> {
        PathMetric::ALL
            .into_iter()
            .filter_map(|metric| {
                self.range(metric)
                    .map(|(min, max)| MetricCondition(metric, min, max))
            })
            .collect()
    }
}

/// A steering instance as reported by the backend query list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub id: QueryId,
    pub name: String,
    pub color: [u8; 3],
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub steering: bool,
    #[serde(default, rename = "query")]
    pub filter: QueryFilter,
}

impl Query {
    pub fn color32(&self) -> Color32 {
        let [r, g, b] = self.color;
        Color32::from_rgb(r, g, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_backend_query_list_entry() {
        let raw = r#"{
            "id": 2,
            "name": "Query 2",
            "color": [231, 76, 60],
            "paused": false,
            "active": true,
            "steering": true,
            "query": {
                "likelihood_range": [2.0, 8.5],
                "impact_range": null,
                "score_range": null,
                "risk_range": null,
                "length_range": [1, 4],
                "sources": [0, 3],
                "targets": null
            }
        }"#;
        let query: Query = serde_json::from_str(raw).unwrap();

        assert_eq!(query.color32(), Color32::from_rgb(231, 76, 60));
        assert_eq!(query.filter.sources, Some(vec![0, 3]));
        assert_eq!(
            query.filter.conditions(),
            vec![
                MetricCondition(PathMetric::Likelihood, 2.0, 8.5),
                MetricCondition(PathMetric::Length, 1.0, 4.0),
            ]
        );
    }

    #[test]
    fn condition_serializes_as_triple() {
        let encoded =
            serde_json::to_string(&MetricCondition(PathMetric::Risk, 0.0, 5.0)).unwrap();
        assert_eq!(encoded, r#"["risk",0.0,5.0]"#);
    }
}
