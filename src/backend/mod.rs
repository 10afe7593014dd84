//! Messages exchanged with the path-generation backend.
//!
//! Every message is a JSON object `{"event": <kind>, "data": <payload>}`.
//! Replies to correlated requests arrive as `reply` events carrying the
//! caller-chosen token. Analyses carry it as `uuid`, which the backend echoes
//! on completion; for the other requests the socket bridge attaches the
//! token to the acknowledgement it forwards.

mod pending;
mod reply;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{HostId, MetricCondition, Query, QueryId, StatisticsSnapshot};

pub use pending::{PendingRequests, Purpose, Resolution};
pub use reply::{
    GenerationStatistics, JointHistograms, MatrixReply, PathHistogram, TopVulnerabilities,
    decode_reply,
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Briefing {
    /// Full model document in the same shape as a model file.
    #[serde(default)]
    pub model: Value,
    #[serde(default)]
    pub others: Vec<String>,
    #[serde(default)]
    pub paused: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub token: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Briefing(Briefing),
    BundledStats(StatisticsSnapshot),
    #[serde(rename = "all_steerags")]
    AllQueries(Vec<Query>),
    QueryGenerationStatistics(GenerationStatistics),
    Reply(Reply),
}

impl ServerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Briefing(_) => "briefing",
            Self::BundledStats(_) => "bundled_stats",
            Self::AllQueries(_) => "all_steerags",
            Self::QueryGenerationStatistics(_) => "query_generation_statistics",
            Self::Reply(_) => "reply",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    AttackSourceTargetMatrix,
    SelectAttackPaths,
    TopVulnerabilities,
    AttackPathHistogram,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WirePosition {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientCommand {
    RequestHostsPositions {
        token: String,
    },
    /// New coordinates keyed by host id.
    UpdateHostsPositions(BTreeMap<HostId, WirePosition>),
    ComputeJointHistograms {
        token: String,
        metrics: Vec<MetricCondition>,
        sources: Option<Vec<HostId>>,
        targets: Option<Vec<HostId>>,
    },
    /// Baseline source-target matrix.
    #[serde(rename = "get_statag_stm")]
    RequestBaselineMatrix {
        token: String,
    },
    RequestAnalysis {
        #[serde(rename = "uuid")]
        token: String,
        id: QueryId,
        #[serde(rename = "type")]
        kind: AnalysisKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        args: Option<Value>,
    },
    StartNewQuery {
        name: String,
        query: Vec<MetricCondition>,
        sources: Option<Vec<HostId>>,
        targets: Option<Vec<HostId>>,
        #[serde(rename = "enableSteering")]
        enable_steering: bool,
    },
    StopQuery(QueryId),
    RenameQuery {
        id: QueryId,
        name: String,
    },
    RecolorQuery {
        id: QueryId,
        color: [u8; 3],
    },
    #[serde(rename = "set_steerag_paused")]
    SetQueryPaused {
        id: QueryId,
        paused: bool,
    },
    SetPaused(bool),
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_tagged_events() {
        let raw = r#"{"event": "all_steerags", "data": [
            {"id": 1, "name": "q", "color": [1, 2, 3], "active": true}
        ]}"#;
        let event: ServerEvent = serde_json::from_str(raw).unwrap();
        let ServerEvent::AllQueries(queries) = event else {
            panic!("expected query list");
        };
        assert_eq!(queries[0].id, 1);
        assert!(queries[0].active);

        let reply: ServerEvent = serde_json::from_value(json!({
            "event": "reply",
            "data": {"token": "abc", "payload": {"iteration": 3, "counts": []}}
        }))
        .unwrap();
        assert_eq!(reply.kind(), "reply");
    }

    #[test]
    fn unknown_event_kind_is_rejected() {
        let result = serde_json::from_str::<ServerEvent>(r#"{"event": "nope", "data": {}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn commands_use_backend_event_names() {
        let encoded = serde_json::to_value(ClientCommand::RequestAnalysis {
            token: "t".into(),
            id: 4,
            kind: AnalysisKind::AttackSourceTargetMatrix,
            args: None,
        })
        .unwrap();
        assert_eq!(
            encoded,
            json!({
                "event": "request_analysis",
                "data": {"uuid": "t", "id": 4, "type": "attack_source_target_matrix"}
            })
        );

        let encoded = serde_json::to_value(ClientCommand::SetQueryPaused { id: 2, paused: true })
            .unwrap();
        assert_eq!(encoded["event"], "set_steerag_paused");

        let encoded = serde_json::to_value(ClientCommand::StopQuery(7)).unwrap();
        assert_eq!(encoded, json!({"event": "stop_query", "data": 7}));

        let encoded = serde_json::to_value(ClientCommand::UpdateHostsPositions(BTreeMap::from([(
            3,
            WirePosition { x: 1.5, y: -2.0 },
        )])))
        .unwrap();
        assert_eq!(
            encoded,
            json!({"event": "update_hosts_positions", "data": {"3": {"x": 1.5, "y": -2.0}}})
        );
    }
}
