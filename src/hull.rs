//! Threshold clustering of host positions and the hulls drawn around them.

use std::collections::{BTreeMap, VecDeque};
use std::f32::consts::TAU;

use eframe::egui::{Pos2, vec2};

use crate::config::HullConfig;
use crate::geometry::cross;
use crate::model::HostId;

#[derive(Clone, Debug, PartialEq)]
pub struct HullCluster {
    /// Ascending host ids.
    pub members: Vec<HostId>,
    /// Counter-clockwise hull vertices in world space.
    pub polygon: Vec<Pos2>,
}

/// Partitions `points` into the connected components of the graph linking
/// every pair closer than `threshold`. Members are sorted and clusters are
/// ordered by their smallest member, so the result does not depend on the
/// input order.
pub fn cluster_points(points: &[(HostId, Pos2)], threshold: f32) -> Vec<Vec<HostId>> {
    let mut remaining: BTreeMap<HostId, Pos2> = points.iter().copied().collect();
    let mut clusters = Vec::new();

    while let Some((seed, seed_position)) = remaining.pop_first() {
        let mut members = vec![seed];
        let mut frontier = VecDeque::from([seed_position]);

        while let Some(current) = frontier.pop_front() {
            let absorbed: Vec<HostId> = remaining
                .iter()
                .filter(|(_, position)| position.distance(current) < threshold)
                .map(|(&id, _)| id)
                .collect();
            for id in absorbed {
                if let Some(position) = remaining.remove(&id) {
                    members.push(id);
                    frontier.push_back(position);
                }
            }
        }

        members.sort_unstable();
        clusters.push(members);
    }

    clusters
}

/// Andrew's monotone chain. Returns an empty vector when fewer than three
/// non-collinear points remain.
pub fn convex_hull(points: &[Pos2]) -> Vec<Pos2> {
    let mut sorted: Vec<Pos2> = points
        .iter()
        .copied()
        .filter(|point| point.x.is_finite() && point.y.is_finite())
        .collect();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    sorted.dedup();
    if sorted.len() < 3 {
        return Vec::new();
    }

    let mut lower: Vec<Pos2> = Vec::with_capacity(sorted.len());
    for &point in &sorted {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], point) <= 0.0 {
            lower.pop();
        }
        lower.push(point);
    }

    let mut upper: Vec<Pos2> = Vec::with_capacity(sorted.len());
    for &point in sorted.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], point) <= 0.0 {
            upper.pop();
        }
        upper.push(point);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);

    if lower.len() < 3 { Vec::new() } else { lower }
}

fn ring(center: Pos2, radius: f32, samples: usize) -> impl Iterator<Item = Pos2> {
    (0..samples).map(move |step| {
        let angle = TAU * step as f32 / samples as f32;
        center + vec2(angle.cos(), angle.sin()) * radius
    })
}

/// Clusters `points` and wraps each cluster in a hull padded by
/// `point_radius + config.thickness`. Degenerate clusters are skipped.
pub fn cluster_hulls(
    points: &[(HostId, Pos2)],
    point_radius: f32,
    config: &HullConfig,
) -> Vec<HullCluster> {
    let positions: BTreeMap<HostId, Pos2> = points.iter().copied().collect();
    let radius = point_radius + config.thickness;

    cluster_points(points, config.cluster_threshold)
        .into_iter()
        .filter_map(|members| {
            let cloud: Vec<Pos2> = members
                .iter()
                .filter_map(|id| positions.get(id))
                .flat_map(|&center| ring(center, radius, config.ring_points))
                .collect();
            let polygon = convex_hull(&cloud);
            (!polygon.is_empty()).then_some(HullCluster { members, polygon })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use eframe::egui::pos2;

    use super::*;

    fn chain_and_outlier() -> Vec<(HostId, Pos2)> {
        vec![
            (4, pos2(0.0, 0.0)),
            (1, pos2(10.0, 0.0)),
            (7, pos2(20.0, 0.0)),
            (3, pos2(30.0, 0.0)),
            (9, pos2(500.0, 500.0)),
        ]
    }

    #[test]
    fn chained_points_share_a_cluster() {
        let clusters = cluster_points(&chain_and_outlier(), 15.0);
        assert_eq!(clusters, vec![vec![1, 3, 4, 7], vec![9]]);
    }

    #[test]
    fn distance_at_threshold_does_not_link() {
        let points = [(0, pos2(0.0, 0.0)), (1, pos2(10.0, 0.0))];
        assert_eq!(cluster_points(&points, 10.0).len(), 2);
        assert_eq!(cluster_points(&points, 10.5).len(), 1);
    }

    #[test]
    fn partition_ignores_input_order() {
        let points = chain_and_outlier();
        let expected = cluster_points(&points, 15.0);

        let mut reversed = points.clone();
        reversed.reverse();
        assert_eq!(cluster_points(&reversed, 15.0), expected);

        let mut rotated = points;
        rotated.rotate_left(2);
        assert_eq!(cluster_points(&rotated, 15.0), expected);
    }

    #[test]
    fn hull_drops_interior_points() {
        let hull = convex_hull(&[
            pos2(0.0, 0.0),
            pos2(10.0, 0.0),
            pos2(5.0, 5.0),
            pos2(10.0, 10.0),
            pos2(0.0, 10.0),
        ]);
        assert_eq!(hull.len(), 4);
        assert!(!hull.contains(&pos2(5.0, 5.0)));
    }

    #[test]
    fn collinear_points_are_degenerate() {
        assert!(convex_hull(&[pos2(0.0, 0.0), pos2(1.0, 1.0), pos2(2.0, 2.0)]).is_empty());
        assert!(convex_hull(&[pos2(0.0, 0.0), pos2(1.0, 1.0)]).is_empty());
    }

    #[test]
    fn each_cluster_gets_a_padded_hull() {
        let config = HullConfig::default();
        let hulls = cluster_hulls(&chain_and_outlier(), 10.0, &config);
        assert_eq!(hulls.len(), 2);

        let outlier = &hulls[1];
        assert_eq!(outlier.members, vec![9]);
        assert_eq!(outlier.polygon.len(), config.ring_points);
        let padding = 10.0 + config.thickness;
        for vertex in &outlier.polygon {
            assert!((vertex.distance(pos2(500.0, 500.0)) - padding).abs() < 1e-3);
        }
    }

    #[test]
    fn zero_radius_singletons_are_skipped() {
        let config = HullConfig {
            thickness: 0.0,
            ..HullConfig::default()
        };
        assert!(cluster_hulls(&[(0, pos2(1.0, 1.0))], 0.0, &config).is_empty());
    }
}
