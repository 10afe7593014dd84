use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use crate::model::QueryId;

/// What a correlated request was issued for. Issuing a new request for the
/// same purpose supersedes the previous one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Purpose {
    QueryMatrix,
    BaselineMatrix,
    HostPositions,
    JointHistograms,
    AttackPaths(QueryId),
    TopVulnerabilities(QueryId),
    PathHistogram(QueryId),
}

impl Purpose {
    pub fn label(self) -> &'static str {
        match self {
            Self::QueryMatrix => "query matrix",
            Self::BaselineMatrix => "baseline matrix",
            Self::HostPositions => "host positions",
            Self::JointHistograms => "joint histograms",
            Self::AttackPaths(_) => "attack paths",
            Self::TopVulnerabilities(_) => "top vulnerabilities",
            Self::PathHistogram(_) => "attack path histogram",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Reply to the latest request for this purpose.
    Current(Purpose),
    /// Superseded, already resolved, cleared or never issued.
    Stale,
}

/// Latest correlation token per purpose. Issuing again forgets the older
/// token, so at most one token per purpose is ever held.
#[derive(Debug, Default)]
pub struct PendingRequests {
    latest: HashMap<Purpose, String>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self, purpose: Purpose) -> String {
        let token = Uuid::new_v4().to_string();
        if let Some(previous) = self.latest.insert(purpose, token.clone()) {
            debug!(purpose = purpose.label(), %previous, "superseding pending request");
        }
        token
    }

    pub fn resolve(&mut self, token: &str) -> Resolution {
        let current = self
            .latest
            .iter()
            .find_map(|(purpose, latest)| (latest == token).then_some(*purpose));
        match current {
            Some(purpose) => {
                self.latest.remove(&purpose);
                Resolution::Current(purpose)
            }
            None => Resolution::Stale,
        }
    }

    pub fn clear(&mut self) {
        self.latest.clear();
    }
}
