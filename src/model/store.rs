use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use eframe::egui::{Pos2, Rect};
use tracing::warn;

use crate::error::ModelError;
use crate::geometry::{point_in_polygon, polygon_bounds};

pub type HostId = u32;

/// Unordered host pair, stored with the lower id first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId {
    low: HostId,
    high: HostId,
}

impl LinkId {
    /// Returns `None` for self-loops.
    pub fn new(a: HostId, b: HostId) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Some(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn low(self) -> HostId {
        self.low
    }

    pub fn high(self) -> HostId {
        self.high
    }

    pub fn touches(self, host: HostId) -> bool {
        self.low == host || self.high == host
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.low, self.high)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Host {
    pub id: HostId,
    pub hostname: String,
    pub ipv4: String,
    pub domain: u32,
    pub position: Pos2,
    neighbors: Vec<HostId>,
}

impl Host {
    pub fn new(id: HostId, position: Pos2) -> Self {
        Self {
            id,
            hostname: String::new(),
            ipv4: String::new(),
            domain: 0,
            position,
            neighbors: Vec::new(),
        }
    }

    pub fn neighbors(&self) -> &[HostId] {
        &self.neighbors
    }

    pub fn label(&self) -> &str {
        if self.hostname.is_empty() {
            &self.ipv4
        } else {
            &self.hostname
        }
    }
}

/// Static topology plus the only mutable per-host state: its position.
#[derive(Clone, Debug)]
pub struct ModelStore {
    hosts: Vec<Host>,
    index_by_id: HashMap<HostId, usize>,
    links: Vec<LinkId>,
}

impl ModelStore {
    pub fn new(
        hosts: Vec<Host>,
        edges: impl IntoIterator<Item = (HostId, HostId)>,
    ) -> Result<Self, ModelError> {
        let mut index_by_id = HashMap::with_capacity(hosts.len());
        for (index, host) in hosts.iter().enumerate() {
            if index_by_id.insert(host.id, index).is_some() {
                return Err(ModelError::DuplicateHost(host.id));
            }
        }

        let mut links = BTreeSet::new();
        for (source, target) in edges {
            if !index_by_id.contains_key(&source) || !index_by_id.contains_key(&target) {
                warn!(source, target, "dropping edge to unknown host");
                continue;
            }
            if let Some(link) = LinkId::new(source, target) {
                links.insert(link);
            }
        }

        let mut store = Self {
            hosts,
            index_by_id,
            links: links.into_iter().collect(),
        };

        for host in &mut store.hosts {
            host.neighbors.clear();
        }
        for link in store.links.clone() {
            if let Some(&low) = store.index_by_id.get(&link.low) {
                store.hosts[low].neighbors.push(link.high);
            }
            if let Some(&high) = store.index_by_id.get(&link.high) {
                store.hosts[high].neighbors.push(link.low);
            }
        }

        Ok(store)
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn host_ids(&self) -> impl Iterator<Item = HostId> + '_ {
        self.hosts.iter().map(|host| host.id)
    }

    pub fn host(&self, id: HostId) -> Option<&Host> {
        self.index_by_id.get(&id).map(|&index| &self.hosts[index])
    }

    pub fn contains(&self, id: HostId) -> bool {
        self.index_by_id.contains_key(&id)
    }

    pub fn position(&self, id: HostId) -> Option<Pos2> {
        self.host(id).map(|host| host.position)
    }

    pub fn set_position(&mut self, id: HostId, position: Pos2) -> bool {
        let Some(&index) = self.index_by_id.get(&id) else {
            return false;
        };
        self.hosts[index].position = position;
        true
    }

    pub fn positions_of(&self, ids: impl IntoIterator<Item = HostId>) -> Vec<(HostId, Pos2)> {
        ids.into_iter()
            .filter_map(|id| self.position(id).map(|position| (id, position)))
            .collect()
    }

    pub fn all_positions(&self) -> BTreeMap<HostId, Pos2> {
        self.hosts
            .iter()
            .map(|host| (host.id, host.position))
            .collect()
    }

    /// Applies server-provided coordinates; unknown ids are ignored.
    pub fn reset_positions(&mut self, positions: impl IntoIterator<Item = (HostId, Pos2)>) -> usize {
        let mut applied = 0;
        for (id, position) in positions {
            if self.set_position(id, position) {
                applied += 1;
            }
        }
        applied
    }

    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub fn has_link(&self, link: LinkId) -> bool {
        self.links.binary_search(&link).is_ok()
    }

    pub fn link_endpoints(&self, link: LinkId) -> Option<(Pos2, Pos2)> {
        Some((self.position(link.low)?, self.position(link.high)?))
    }

    /// Every link incident to any of `ids`, sorted and deduplicated.
    pub fn links_touching(&self, ids: &[HostId]) -> Vec<LinkId> {
        let mut touched = BTreeSet::new();
        for &id in ids {
            let Some(host) = self.host(id) else {
                continue;
            };
            for &neighbor in host.neighbors() {
                if let Some(link) = LinkId::new(id, neighbor) {
                    touched.insert(link);
                }
            }
        }
        touched.into_iter().collect()
    }

    pub fn bounds(&self) -> Option<Rect> {
        let positions = self.hosts.iter().map(|host| host.position).collect::<Vec<_>>();
        polygon_bounds(&positions)
    }

    /// Nearest host whose disc of `radius` contains `world`.
    pub fn host_at(&self, world: Pos2, radius: f32) -> Option<HostId> {
        self.hosts
            .iter()
            .filter_map(|host| {
                let distance = host.position.distance(world);
                (distance <= radius).then_some((host.id, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(id, _)| id)
    }

    pub fn hosts_in_polygon(&self, polygon: &[Pos2]) -> Vec<HostId> {
        let Some(bounds) = polygon_bounds(polygon) else {
            return Vec::new();
        };
        self.hosts
            .iter()
            .filter(|host| bounds.contains(host.position) && point_in_polygon(host.position, polygon))
            .map(|host| host.id)
            .collect()
    }
}
