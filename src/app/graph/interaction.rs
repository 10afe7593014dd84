use eframe::egui::{self, Key, Rect, Response, Ui};

use super::super::Session;
use super::super::render_utils::to_canvas;

impl Session {
    pub(in crate::app) fn handle_canvas_zoom(&mut self, ui: &Ui, rect: Rect, response: &Response) {
        if !response.hovered() {
            return;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return;
        }

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        self.overview.wheel(scroll, to_canvas(rect, pointer));
    }

    /// Feeds raw pointer events to the interaction machine. Presses only
    /// count when they land on the canvas; moves and releases always do so a
    /// gesture can finish outside it.
    pub(in crate::app) fn handle_canvas_pointer(&mut self, ui: &Ui, rect: Rect, response: &Response) {
        let events = ui.input(|input| input.events.clone());
        for event in events {
            match event {
                egui::Event::PointerMoved(position) => {
                    self.overview.pointer_move(to_canvas(rect, position));
                }
                egui::Event::PointerButton {
                    pos,
                    button,
                    pressed: true,
                    modifiers,
                } if response.hovered() => {
                    self.overview
                        .pointer_down(to_canvas(rect, pos), button, modifiers.shift);
                }
                egui::Event::PointerButton {
                    pos,
                    button,
                    pressed: false,
                    modifiers,
                } => {
                    self.overview
                        .pointer_up(to_canvas(rect, pos), button, modifiers.shift);
                }
                _ => {}
            }
        }
    }

    pub(in crate::app) fn handle_canvas_keys(&mut self, ui: &Ui) {
        if ui.ctx().wants_keyboard_input() {
            return;
        }

        let (undo, clear) = ui.input(|input| {
            (
                input.modifiers.command && input.key_pressed(Key::Z),
                input.key_pressed(Key::Escape),
            )
        });
        if undo {
            self.overview.undo_movement();
        }
        if clear {
            self.overview.clear_selection();
        }
    }
}
