use std::collections::BTreeMap;

use eframe::egui::{Pos2, Vec2, vec2};

use crate::model::{HostId, LinkId, ModelStore};

use super::ratio::LinkBand;

/// Cached placement of a link between its two endpoint hosts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinkGeometry {
    pub start: Pos2,
    pub end: Pos2,
    pub midpoint: Pos2,
    /// Radians from the positive x axis.
    pub angle: f32,
    pub length: f32,
    /// Unit vector perpendicular to the link.
    pub normal: Vec2,
}

impl LinkGeometry {
    pub fn between(start: Pos2, end: Pos2) -> Self {
        let along = end - start;
        let length = along.length();
        let normal = if length > f32::EPSILON {
            vec2(-along.y, along.x) / length
        } else {
            vec2(0.0, 1.0)
        };
        Self {
            start,
            end,
            midpoint: start + along * 0.5,
            angle: along.y.atan2(along.x),
            length,
            normal,
        }
    }

    /// The four world-space corners of `band` laid along this link.
    pub fn band_quad(&self, band: &LinkBand) -> [Pos2; 4] {
        let near = self.normal * band.offset;
        let far = self.normal * (band.offset + band.width);
        [
            self.start + near,
            self.end + near,
            self.end + far,
            self.start + far,
        ]
    }
}

#[derive(Clone, Debug, Default)]
pub struct LinkGeometryCache {
    entries: BTreeMap<LinkId, LinkGeometry>,
}

impl LinkGeometryCache {
    pub fn build(model: &ModelStore) -> Self {
        let mut cache = Self::default();
        cache.refresh(model, model.links().iter().copied());
        cache
    }

    pub fn get(&self, link: LinkId) -> Option<&LinkGeometry> {
        self.entries.get(&link)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LinkId, &LinkGeometry)> {
        self.entries.iter()
    }

    /// Recomputes the links incident to `hosts` and returns how many changed.
    pub fn refresh_touching(&mut self, model: &ModelStore, hosts: &[HostId]) -> usize {
        self.refresh(model, model.links_touching(hosts))
    }

    fn refresh(&mut self, model: &ModelStore, links: impl IntoIterator<Item = LinkId>) -> usize {
        let mut refreshed = 0;
        for link in links {
            if let Some((start, end)) = model.link_endpoints(link) {
                self.entries.insert(link, LinkGeometry::between(start, end));
                refreshed += 1;
            }
        }
        refreshed
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::pos2;

    use super::*;
    use crate::model::triangle;
    use crate::overlay::BandSource;

    #[test]
    fn geometry_of_horizontal_link() {
        let geometry = LinkGeometry::between(pos2(0.0, 0.0), pos2(100.0, 0.0));
        assert_eq!(geometry.midpoint, pos2(50.0, 0.0));
        assert_eq!(geometry.length, 100.0);
        assert_eq!(geometry.angle, 0.0);
        assert_eq!(geometry.normal, vec2(0.0, 1.0));

        let quad = geometry.band_quad(&LinkBand {
            source: BandSource::Baseline,
            offset: -2.0,
            width: 4.0,
        });
        assert_eq!(quad[0], pos2(0.0, -2.0));
        assert_eq!(quad[2], pos2(100.0, 2.0));
    }

    #[test]
    fn refresh_follows_moved_host() {
        let mut model = triangle();
        let mut cache = LinkGeometryCache::build(&model);

        model.set_position(0, pos2(10.0, 10.0));
        assert_eq!(cache.refresh_touching(&model, &[0]), 2);

        let link = LinkId::new(0, 1).unwrap();
        assert_eq!(cache.get(link).unwrap().start, pos2(10.0, 10.0));
        let untouched = LinkId::new(1, 2).unwrap();
        assert_eq!(cache.get(untouched).unwrap().start, pos2(100.0, 0.0));
    }
}
