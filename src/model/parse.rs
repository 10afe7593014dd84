use std::collections::BTreeMap;
use std::path::Path;

use eframe::egui::pos2;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ModelError;

use super::store::{Host, HostId, ModelStore};

#[derive(Clone, Debug, Deserialize)]
pub(super) struct RawHost {
    id: HostId,
    #[serde(default)]
    hostname: String,
    #[serde(default)]
    ipv4: String,
    #[serde(default)]
    domain: u32,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
}

#[derive(Clone, Debug, Deserialize)]
pub(super) struct RawModel {
    hosts: Vec<RawHost>,
    #[serde(default)]
    edges: Vec<(HostId, HostId)>,
}

impl RawModel {
    fn into_store(self) -> Result<ModelStore, ModelError> {
        let hosts = self
            .hosts
            .into_iter()
            .map(|raw| {
                let mut host = Host::new(raw.id, pos2(raw.x, raw.y));
                host.hostname = raw.hostname;
                host.ipv4 = raw.ipv4;
                host.domain = raw.domain;
                host
            })
            .collect();
        ModelStore::new(hosts, self.edges)
    }
}

pub fn parse_model(raw: &str) -> Result<ModelStore, ModelError> {
    let model: RawModel = serde_json::from_str(raw)?;
    model.into_store()
}

pub fn model_from_value(value: Value) -> Result<ModelStore, ModelError> {
    let model = RawModel::deserialize(value)?;
    model.into_store()
}

pub fn load_model(path: &Path) -> Result<ModelStore, ModelError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ModelError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_model(&raw)
}

/// Decodes the `{id: [x, y]}` map returned by a positions request.
pub fn parse_positions(value: Value) -> Result<BTreeMap<HostId, (f32, f32)>, serde_json::Error> {
    BTreeMap::<HostId, (f32, f32)>::deserialize(value)
}
