use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::TraceError;

use super::store::{HostId, LinkId};

/// One attack path as returned by the path-selection analysis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttackPath {
    pub trace: String,
    #[serde(default)]
    pub length: u32,
    #[serde(default)]
    pub likelihood: f64,
    #[serde(default)]
    pub impact: f64,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub risk: f64,
    #[serde(default)]
    pub damage: f64,
    #[serde(default)]
    pub hash: String,
}

impl AttackPath {
    pub fn steps(&self) -> Result<Vec<PathStep>, TraceError> {
        parse_trace(&self.trace)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathStep {
    pub source: HostId,
    pub cve: String,
    pub target: HostId,
}

/// Parses `priv@host#CVE#priv@host##priv@host#CVE#priv@host...`.
pub fn parse_trace(trace: &str) -> Result<Vec<PathStep>, TraceError> {
    if trace.trim().is_empty() {
        return Err(TraceError::Empty);
    }

    trace
        .split("##")
        .map(|step| {
            let mut parts = step.split('#');
            let (Some(source), Some(cve), Some(target), None) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                return Err(TraceError::Step {
                    step: step.to_owned(),
                });
            };

            Ok(PathStep {
                source: parse_host(source, step)?,
                cve: cve.to_owned(),
                target: parse_host(target, step)?,
            })
        })
        .collect()
}

fn parse_host(privilege_at_host: &str, step: &str) -> Result<HostId, TraceError> {
    let (_, host) = privilege_at_host
        .split_once('@')
        .ok_or_else(|| TraceError::Step {
            step: step.to_owned(),
        })?;
    host.parse().map_err(|_| TraceError::Host {
        value: host.to_owned(),
    })
}

/// Hosts and links traversed by a set of paths.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathFootprint {
    pub hosts: BTreeSet<HostId>,
    pub links: BTreeSet<LinkId>,
}

impl PathFootprint {
    pub fn extend(&mut self, steps: &[PathStep]) {
        for step in steps {
            self.hosts.insert(step.source);
            self.hosts.insert(step.target);
            if let Some(link) = LinkId::new(step.source, step.target) {
                self.links.insert(link);
            }
        }
    }
}
