//! Pointer and wheel state machine for the topology canvas.
//!
//! The machine owns only gesture state and the undo stack. Camera, selection
//! and model are borrowed per event through [`Canvas`].

use eframe::egui::{PointerButton, Pos2, Vec2};
use tracing::debug;

use crate::camera::Camera;
use crate::config::InteractionConfig;
use crate::model::{HostId, ModelStore};
use crate::selection::SelectionManager;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InteractionMode {
    CameraMovement,
    #[default]
    Selection,
    SelectionAndEditing,
}

impl InteractionMode {
    pub const ALL: [Self; 3] = [
        Self::CameraMovement,
        Self::Selection,
        Self::SelectionAndEditing,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::CameraMovement => "Camera",
            Self::Selection => "Select",
            Self::SelectionAndEditing => "Select + edit",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InteractionState {
    Idle,
    Selecting,
    DraggingCamera,
    DraggingHosts,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    /// Canvas-relative screen position.
    pub screen: Pos2,
    pub button: PointerButton,
    pub shift: bool,
    /// Host under the pointer, if any.
    pub target: Option<HostId>,
}

impl PointerEvent {
    pub fn new(screen: Pos2, button: PointerButton) -> Self {
        Self {
            screen,
            button,
            shift: false,
            target: None,
        }
    }

    pub fn with_shift(mut self, shift: bool) -> Self {
        self.shift = shift;
        self
    }

    pub fn on_host(mut self, target: Option<HostId>) -> Self {
        self.target = target;
        self
    }
}

/// What a handler changed, so the owner can refresh derived state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InteractionOutcome {
    pub camera_changed: bool,
    pub selection_changed: bool,
    pub moved_hosts: Vec<HostId>,
    pub drag_finished: bool,
}

impl InteractionOutcome {
    fn camera() -> Self {
        Self {
            camera_changed: true,
            ..Self::default()
        }
    }

    fn selection(changed: bool) -> Self {
        Self {
            selection_changed: changed,
            ..Self::default()
        }
    }
}

pub struct Canvas<'a> {
    pub camera: &'a mut Camera,
    pub selection: &'a mut SelectionManager,
    pub model: &'a mut ModelStore,
}

type PositionSnapshot = Vec<(HostId, Pos2)>;

enum Gesture {
    Idle,
    Selecting {
        lasso: Vec<Pos2>,
        last: Pos2,
        travel: f32,
        pressed_host: Option<HostId>,
    },
    DraggingCamera {
        button: PointerButton,
        last: Pos2,
    },
    DraggingHosts {
        last: Pos2,
        hosts: Vec<HostId>,
    },
}

impl Gesture {
    /// Button whose release ends this gesture.
    fn button(&self) -> Option<PointerButton> {
        match self {
            Self::Idle => None,
            Self::Selecting { .. } => Some(PointerButton::Primary),
            Self::DraggingCamera { button, .. } => Some(*button),
            Self::DraggingHosts { .. } => Some(PointerButton::Middle),
        }
    }
}

pub struct InteractionMachine {
    mode: InteractionMode,
    gesture: Gesture,
    undo_stack: Vec<PositionSnapshot>,
    config: InteractionConfig,
}

impl InteractionMachine {
    pub fn new(config: InteractionConfig) -> Self {
        Self {
            mode: InteractionMode::default(),
            gesture: Gesture::Idle,
            undo_stack: Vec::new(),
            config,
        }
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    /// Switching modes abandons any gesture in flight.
    pub fn set_mode(&mut self, mode: InteractionMode) {
        if self.mode != mode {
            self.cancel();
            self.mode = mode;
        }
    }

    pub fn state(&self) -> InteractionState {
        match self.gesture {
            Gesture::Idle => InteractionState::Idle,
            Gesture::Selecting { .. } => InteractionState::Selecting,
            Gesture::DraggingCamera { .. } => InteractionState::DraggingCamera,
            Gesture::DraggingHosts { .. } => InteractionState::DraggingHosts,
        }
    }

    /// World-space lasso polyline while selecting.
    pub fn lasso(&self) -> Option<&[Pos2]> {
        match &self.gesture {
            Gesture::Selecting { lasso, .. } => Some(lasso),
            _ => None,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn cancel(&mut self) {
        self.gesture = Gesture::Idle;
    }

    pub fn pointer_down(&mut self, event: PointerEvent, canvas: Canvas<'_>) -> InteractionOutcome {
        if !matches!(self.gesture, Gesture::Idle) {
            return InteractionOutcome::default();
        }

        let camera_drag =
            event.button == PointerButton::Secondary || self.mode == InteractionMode::CameraMovement;

        self.gesture = if camera_drag {
            Gesture::DraggingCamera {
                button: event.button,
                last: event.screen,
            }
        } else if event.button == PointerButton::Primary {
            Gesture::Selecting {
                lasso: vec![canvas.camera.screen_to_world(event.screen)],
                last: event.screen,
                travel: 0.0,
                pressed_host: event.target,
            }
        } else if event.button == PointerButton::Middle
            && self.mode == InteractionMode::SelectionAndEditing
            && !canvas.selection.is_empty()
        {
            let hosts = canvas.selection.ids();
            let snapshot = canvas.model.positions_of(hosts.iter().copied());
            debug!(hosts = snapshot.len(), "starting host drag");
            self.undo_stack.push(snapshot);
            Gesture::DraggingHosts {
                last: event.screen,
                hosts,
            }
        } else {
            Gesture::Idle
        };

        InteractionOutcome::default()
    }

    pub fn pointer_move(&mut self, screen: Pos2, canvas: Canvas<'_>) -> InteractionOutcome {
        match &mut self.gesture {
            Gesture::Idle => InteractionOutcome::default(),
            Gesture::DraggingCamera { last, .. } => {
                canvas.camera.pan(screen - *last);
                *last = screen;
                InteractionOutcome::camera()
            }
            Gesture::Selecting {
                lasso,
                last,
                travel,
                ..
            } => {
                *travel += last.distance(screen);
                *last = screen;
                lasso.push(canvas.camera.screen_to_world(screen));
                InteractionOutcome::default()
            }
            Gesture::DraggingHosts { last, hosts } => {
                let delta = canvas.camera.screen_delta_to_world(screen - *last);
                *last = screen;
                if delta == Vec2::ZERO {
                    return InteractionOutcome::default();
                }
                for &host in hosts.iter() {
                    if let Some(position) = canvas.model.position(host) {
                        canvas.model.set_position(host, position + delta);
                    }
                }
                InteractionOutcome {
                    moved_hosts: hosts.clone(),
                    ..InteractionOutcome::default()
                }
            }
        }
    }

    /// Ends the current gesture. Releases of other buttons are ignored.
    pub fn pointer_up(&mut self, event: PointerEvent, canvas: Canvas<'_>) -> InteractionOutcome {
        if self
            .gesture
            .button()
            .is_some_and(|button| button != event.button)
        {
            return InteractionOutcome::default();
        }
        match std::mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::Idle => InteractionOutcome::default(),
            Gesture::DraggingCamera { .. } => InteractionOutcome::default(),
            Gesture::DraggingHosts { hosts, .. } => InteractionOutcome {
                moved_hosts: hosts,
                drag_finished: true,
                ..InteractionOutcome::default()
            },
            Gesture::Selecting {
                lasso,
                travel,
                pressed_host,
                ..
            } => {
                if travel <= self.config.click_radius {
                    let changed = match event.target.or(pressed_host) {
                        Some(host) => canvas.selection.toggle(host),
                        None if !event.shift => canvas.selection.clear(),
                        None => false,
                    };
                    return InteractionOutcome::selection(changed);
                }

                let enclosed = canvas.model.hosts_in_polygon(&lasso);
                debug!(enclosed = enclosed.len(), subtract = event.shift, "lasso closed");
                let changed = if event.shift {
                    canvas.selection.remove(enclosed)
                } else {
                    canvas.selection.add(enclosed)
                };
                InteractionOutcome::selection(changed)
            }
        }
    }

    /// Zooms about `pivot`; positive `scroll` zooms in.
    pub fn wheel(&mut self, scroll: f32, pivot: Pos2, camera: &mut Camera) -> InteractionOutcome {
        if scroll.abs() <= f32::EPSILON {
            return InteractionOutcome::default();
        }
        let factor = (1.0 - scroll * self.config.wheel_sensitivity).clamp(0.85, 1.15);
        camera.zoom(factor, pivot);
        InteractionOutcome::camera()
    }

    /// Restores the positions captured by the most recent host drag and
    /// returns the hosts it touched.
    pub fn undo(&mut self, model: &mut ModelStore) -> Option<Vec<HostId>> {
        let snapshot = self.undo_stack.pop()?;
        let restored = snapshot.iter().map(|(id, _)| *id).collect();
        model.reset_positions(snapshot);
        Some(restored)
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::pos2;

    use super::*;
    use crate::model::triangle;

    struct Fixture {
        camera: Camera,
        selection: SelectionManager,
        model: ModelStore,
        machine: InteractionMachine,
    }

    impl Fixture {
        fn new(mode: InteractionMode) -> Self {
            let mut machine = InteractionMachine::new(InteractionConfig::default());
            machine.set_mode(mode);
            Self {
                camera: Camera::new(0.01),
                selection: SelectionManager::new(),
                model: triangle(),
                machine,
            }
        }

        fn canvas(&mut self) -> (&mut InteractionMachine, Canvas<'_>) {
            (
                &mut self.machine,
                Canvas {
                    camera: &mut self.camera,
                    selection: &mut self.selection,
                    model: &mut self.model,
                },
            )
        }

        fn down(&mut self, event: PointerEvent) -> InteractionOutcome {
            let (machine, canvas) = self.canvas();
            machine.pointer_down(event, canvas)
        }

        fn drag_to(&mut self, screen: Pos2) -> InteractionOutcome {
            let (machine, canvas) = self.canvas();
            machine.pointer_move(screen, canvas)
        }

        fn up(&mut self, event: PointerEvent) -> InteractionOutcome {
            let (machine, canvas) = self.canvas();
            machine.pointer_up(event, canvas)
        }
    }

    #[test]
    fn host_drag_uses_camera_scale_and_undo_restores() {
        let mut fx = Fixture::new(InteractionMode::SelectionAndEditing);
        fx.camera.scale = 2.0;
        fx.selection.add([0]);
        let before = fx.model.position(0).unwrap();

        fx.down(PointerEvent::new(pos2(0.0, 0.0), PointerButton::Middle));
        assert_eq!(fx.machine.state(), InteractionState::DraggingHosts);
        let moved = fx.drag_to(pos2(10.0, 10.0));
        assert_eq!(moved.moved_hosts, vec![0]);
        let finished = fx.up(PointerEvent::new(pos2(10.0, 10.0), PointerButton::Middle));
        assert!(finished.drag_finished);

        assert_eq!(fx.model.position(0), Some(before + Vec2::new(5.0, 5.0)));
        assert_eq!(fx.model.position(1), Some(pos2(100.0, 0.0)));

        assert_eq!(fx.machine.undo(&mut fx.model), Some(vec![0]));
        assert_eq!(fx.model.position(0), Some(before));
        assert_eq!(fx.machine.undo(&mut fx.model), None);
    }

    #[test]
    fn middle_button_without_selection_does_nothing() {
        let mut fx = Fixture::new(InteractionMode::SelectionAndEditing);
        fx.down(PointerEvent::new(pos2(0.0, 0.0), PointerButton::Middle));
        assert_eq!(fx.machine.state(), InteractionState::Idle);
        assert!(!fx.machine.can_undo());
    }

    #[test]
    fn lasso_adds_then_shift_lasso_removes() {
        let mut fx = Fixture::new(InteractionMode::Selection);
        let square = [
            pos2(110.0, -10.0),
            pos2(110.0, 10.0),
            pos2(-10.0, 10.0),
        ];

        fx.down(PointerEvent::new(pos2(-10.0, -10.0), PointerButton::Primary));
        for point in square {
            fx.drag_to(point);
        }
        let outcome = fx.up(PointerEvent::new(pos2(-10.0, 10.0), PointerButton::Primary));
        assert!(outcome.selection_changed);
        assert_eq!(fx.selection.ids(), vec![0, 1]);

        fx.down(PointerEvent::new(pos2(90.0, -10.0), PointerButton::Primary).with_shift(true));
        for point in [pos2(110.0, -10.0), pos2(110.0, 10.0), pos2(90.0, 10.0)] {
            fx.drag_to(point);
        }
        fx.up(PointerEvent::new(pos2(90.0, 10.0), PointerButton::Primary).with_shift(true));
        assert_eq!(fx.selection.ids(), vec![0]);
    }

    #[test]
    fn short_press_is_a_click() {
        let mut fx = Fixture::new(InteractionMode::Selection);
        let on_host = PointerEvent::new(pos2(100.0, 0.0), PointerButton::Primary).on_host(Some(1));

        fx.down(on_host);
        fx.drag_to(pos2(101.0, 1.0));
        fx.up(on_host);
        assert_eq!(fx.selection.ids(), vec![1]);

        let empty = PointerEvent::new(pos2(300.0, 300.0), PointerButton::Primary);
        fx.down(empty.with_shift(true));
        fx.up(empty.with_shift(true));
        assert_eq!(fx.selection.ids(), vec![1]);

        fx.down(empty);
        fx.up(empty);
        assert!(fx.selection.is_empty());
    }

    #[test]
    fn camera_mode_pans_with_any_button() {
        let mut fx = Fixture::new(InteractionMode::CameraMovement);
        fx.down(PointerEvent::new(pos2(0.0, 0.0), PointerButton::Primary));
        assert_eq!(fx.machine.state(), InteractionState::DraggingCamera);
        let outcome = fx.drag_to(pos2(20.0, 0.0));
        assert!(outcome.camera_changed);
        assert_eq!(fx.camera.translate, Vec2::new(-20.0, 0.0));
        fx.up(PointerEvent::new(pos2(20.0, 0.0), PointerButton::Primary));
        assert_eq!(fx.machine.state(), InteractionState::Idle);
    }

    #[test]
    fn right_button_pans_in_selection_mode() {
        let mut fx = Fixture::new(InteractionMode::Selection);
        fx.down(PointerEvent::new(pos2(0.0, 0.0), PointerButton::Secondary));
        assert_eq!(fx.machine.state(), InteractionState::DraggingCamera);
    }

    #[test]
    fn other_button_release_keeps_the_lasso_open() {
        let mut fx = Fixture::new(InteractionMode::Selection);
        fx.down(PointerEvent::new(pos2(-10.0, -10.0), PointerButton::Primary));
        for point in [pos2(110.0, -10.0), pos2(110.0, 10.0)] {
            fx.drag_to(point);
        }

        let ignored = fx.up(PointerEvent::new(pos2(110.0, 10.0), PointerButton::Secondary));
        assert_eq!(ignored, InteractionOutcome::default());
        assert_eq!(fx.machine.state(), InteractionState::Selecting);
        assert!(fx.selection.is_empty());

        fx.drag_to(pos2(-10.0, 10.0));
        let outcome = fx.up(PointerEvent::new(pos2(-10.0, 10.0), PointerButton::Primary));
        assert!(outcome.selection_changed);
        assert_eq!(fx.selection.ids(), vec![0, 1]);
        assert_eq!(fx.machine.state(), InteractionState::Idle);
    }

    #[test]
    fn mode_change_cancels_gesture() {
        let mut fx = Fixture::new(InteractionMode::Selection);
        fx.down(PointerEvent::new(pos2(0.0, 0.0), PointerButton::Primary));
        assert!(fx.machine.lasso().is_some());
        fx.machine.set_mode(InteractionMode::CameraMovement);
        assert_eq!(fx.machine.state(), InteractionState::Idle);
    }

    #[test]
    fn wheel_factor_is_clamped() {
        let mut machine = InteractionMachine::new(InteractionConfig::default());
        let mut camera = Camera::new(0.01);
        machine.wheel(10_000.0, Pos2::ZERO, &mut camera);
        assert!((camera.scale - 1.0 / 0.85).abs() < 1e-4);
    }
}
