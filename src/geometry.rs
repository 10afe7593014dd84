use eframe::egui::{Pos2, Rect};

pub(crate) fn cross(o: Pos2, a: Pos2, b: Pos2) -> f32 {
    let oa = a - o;
    let ob = b - o;
    (oa.x * ob.y) - (oa.y * ob.x)
}

/// Even-odd ray casting. Points exactly on an edge may land on either side.
pub fn point_in_polygon(point: Pos2, polygon: &[Pos2]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut previous = polygon[polygon.len() - 1];
    for &current in polygon {
        let crosses = (current.y > point.y) != (previous.y > point.y);
        if crosses {
            let t = (point.y - current.y) / (previous.y - current.y);
            let x = current.x + t * (previous.x - current.x);
            if point.x < x {
                inside = !inside;
            }
        }
        previous = current;
    }
    inside
}

pub fn polygon_bounds(polygon: &[Pos2]) -> Option<Rect> {
    let mut points = polygon.iter();
    let first = *points.next()?;
    let mut rect = Rect::from_min_max(first, first);
    for point in points {
        rect.extend_with(*point);
    }
    Some(rect)
}

#[cfg(test)]
mod tests {
    use eframe::egui::pos2;

    use super::*;

    fn square() -> Vec<Pos2> {
        vec![
            pos2(0.0, 0.0),
            pos2(10.0, 0.0),
            pos2(10.0, 10.0),
            pos2(0.0, 10.0),
        ]
    }

    #[test]
    fn point_inside_and_outside_square() {
        assert!(point_in_polygon(pos2(5.0, 5.0), &square()));
        assert!(!point_in_polygon(pos2(15.0, 5.0), &square()));
        assert!(!point_in_polygon(pos2(5.0, -1.0), &square()));
    }

    #[test]
    fn concave_notch_is_outside() {
        let notched = vec![
            pos2(0.0, 0.0),
            pos2(10.0, 0.0),
            pos2(10.0, 10.0),
            pos2(5.0, 4.0),
            pos2(0.0, 10.0),
        ];
        assert!(!point_in_polygon(pos2(5.0, 8.0), &notched));
        assert!(point_in_polygon(pos2(5.0, 2.0), &notched));
    }

    #[test]
    fn degenerate_polygon_contains_nothing() {
        assert!(!point_in_polygon(pos2(0.0, 0.0), &[pos2(0.0, 0.0), pos2(1.0, 1.0)]));
    }

    #[test]
    fn bounds_cover_all_points() {
        let bounds = polygon_bounds(&square()).unwrap();
        assert_eq!(bounds.min, pos2(0.0, 0.0));
        assert_eq!(bounds.max, pos2(10.0, 10.0));
        assert!(polygon_bounds(&[]).is_none());
    }
}
