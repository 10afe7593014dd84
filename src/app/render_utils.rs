use agvis::camera::Camera;
use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2};

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;

    Color32::from_rgba_unmultiplied(
        ((base.r() as f32 * inverse) + (overlay.r() as f32 * amount)) as u8,
        ((base.g() as f32 * inverse) + (overlay.g() as f32 * amount)) as u8,
        ((base.b() as f32 * inverse) + (overlay.b() as f32 * amount)) as u8,
        ((base.a() as f32 * inverse) + (overlay.a() as f32 * amount)) as u8,
    )
}

pub(super) fn with_alpha(color: Color32, alpha: f32) -> Color32 {
    Color32::from_rgba_unmultiplied(
        color.r(),
        color.g(),
        color.b(),
        (alpha.clamp(0.0, 1.0) * 255.0) as u8,
    )
}

/// Maps a world point onto the painter, whose origin is the canvas corner.
pub(super) fn to_screen(rect: Rect, camera: &Camera, world: Pos2) -> Pos2 {
    rect.min + camera.world_to_screen(world).to_vec2()
}

/// Canvas-relative pointer position, as the core expects.
pub(super) fn to_canvas(rect: Rect, screen: Pos2) -> Pos2 {
    (screen - rect.min).to_pos2()
}

pub(super) fn draw_background(painter: &Painter, rect: Rect, camera: &Camera) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(19, 23, 29));

    let step = (56.0 * camera.scale.clamp(0.6, 1.8)).max(20.0);
    let origin = rect.min - camera.translate * camera.scale;

    let mut x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
    while x < rect.right() {
        painter.line_segment(
            [Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())],
            Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 70, 80, 70)),
        );
        x += step;
    }

    let mut y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
    while y < rect.bottom() {
        painter.line_segment(
            [Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)],
            Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 70, 80, 70)),
        );
        y += step;
    }
}

pub(super) fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    !(position.x + radius < rect.left()
        || position.x - radius > rect.right()
        || position.y + radius < rect.top()
        || position.y - radius > rect.bottom())
}

pub(super) fn segment_visible(rect: Rect, start: Pos2, end: Pos2, padding: f32) -> bool {
    let bounds = Rect::from_two_pos(start, end).expand(padding);
    rect.intersects(bounds)
}

pub(super) fn polygon_visible(rect: Rect, points: &[Pos2]) -> bool {
    let Some(first) = points.first() else {
        return false;
    };
    let bounds = points
        .iter()
        .fold(Rect::from_min_max(*first, *first), |bounds, point| {
            bounds.union(Rect::from_min_max(*point, *point))
        });
    rect.intersects(bounds)
}

/// Radius on screen for a world-space radius, kept legible at low zoom.
pub(super) fn screen_radius(world_radius: f32, camera: &Camera) -> f32 {
    (world_radius * camera.scale).max(2.5)
}

pub(super) fn label_offset(radius: f32) -> Vec2 {
    Vec2::new(radius + 5.0, 0.0)
}
