//! World/screen mapping for the topology canvas.
//!
//! `world = screen / scale + translate`, so `screen = (world - translate) * scale`.
//! Screen coordinates are relative to the canvas origin.

use eframe::egui::{Pos2, Rect, Vec2, vec2};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub scale: f32,
    pub translate: Vec2,
    min_scale: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(0.02)
    }
}

impl Camera {
    pub fn new(min_scale: f32) -> Self {
        Self {
            scale: 1.0,
            translate: Vec2::ZERO,
            min_scale,
        }
    }

    pub fn screen_to_world(&self, screen: Pos2) -> Pos2 {
        (screen.to_vec2() / self.scale + self.translate).to_pos2()
    }

    pub fn world_to_screen(&self, world: Pos2) -> Pos2 {
        ((world.to_vec2() - self.translate) * self.scale).to_pos2()
    }

    pub fn screen_delta_to_world(&self, delta: Vec2) -> Vec2 {
        delta / self.scale
    }

    /// Fits `bounds` (world) into `viewport` (screen size) leaving `padding`
    /// pixels on every side, without distorting the aspect ratio.
    pub fn center_on(&mut self, bounds: Rect, viewport: Vec2, padding: f32) {
        let span = vec2(bounds.width().max(1.0), bounds.height().max(1.0));
        let usable = vec2(
            (viewport.x - padding * 2.0).max(1.0),
            (viewport.y - padding * 2.0).max(1.0),
        );

        let scale = (usable.x / span.x).min(usable.y / span.y);
        self.scale = scale.max(self.min_scale);
        self.translate = bounds.center().to_vec2() - (viewport * 0.5) / self.scale;
    }

    /// Rescales by `1 / factor` keeping the world point under `pivot` fixed.
    pub fn zoom(&mut self, factor: f32, pivot: Pos2) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let anchor = self.screen_to_world(pivot);
        self.scale = (self.scale / factor).max(self.min_scale);
        self.translate = anchor.to_vec2() - pivot.to_vec2() / self.scale;
    }

    /// Moves the content along with a screen-space drag.
    pub fn pan(&mut self, delta: Vec2) {
        self.translate -= delta / self.scale;
    }
}
