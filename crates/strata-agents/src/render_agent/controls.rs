// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Mapping of input events to camera moves and engine actions.

use super::camera::IsometricCamera;
use strata_core::math::Vec2;
use strata_core::platform::input::{InputEvent, MouseButton};
use strata_core::renderer::DebugView;

/// What the engine should do after an input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Nothing changed.
    None,
    /// The user asked to close the application.
    Quit,
    /// A digit key picked a debug view.
    SelectDebugView(DebugView),
    /// The camera zoomed or panned.
    CameraChanged,
}

/// Drag state of the mouse controls.
#[derive(Debug, Clone, Default)]
pub struct CameraControls {
    dragging: bool,
    cursor: Option<Vec2>,
}

impl CameraControls {
    /// Creates idle controls.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a middle-button drag is in progress.
    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Applies one event. Escape quits, digits select a debug view, the
    /// wheel zooms and a middle-button drag pans.
    pub fn handle(&mut self, event: &InputEvent, camera: &mut IsometricCamera) -> ControlAction {
        match event {
            InputEvent::KeyPressed { key_code } => key_action(key_code),
            InputEvent::MouseButtonPressed {
                button: MouseButton::Middle,
            } => {
                self.dragging = true;
                ControlAction::None
            }
            InputEvent::MouseButtonReleased {
                button: MouseButton::Middle,
            } => {
                self.dragging = false;
                ControlAction::None
            }
            InputEvent::MouseMoved { x, y } => {
                let position = Vec2::new(*x, *y);
                let previous = self.cursor.replace(position);
                match previous {
                    Some(previous) if self.dragging => {
                        let delta = position - previous;
                        camera.pan_by(delta.x, delta.y);
                        ControlAction::CameraChanged
                    }
                    _ => ControlAction::None,
                }
            }
            InputEvent::MouseWheelScrolled { delta_y, .. } if *delta_y != 0.0 => {
                camera.scroll(*delta_y);
                ControlAction::CameraChanged
            }
            _ => ControlAction::None,
        }
    }
}

fn key_action(key_code: &str) -> ControlAction {
    if key_code == "Escape" {
        return ControlAction::Quit;
    }
    match key_code
        .strip_prefix("Digit")
        .and_then(|digit| digit.parse::<u32>().ok())
    {
        Some(index) if (index as usize) < DebugView::ALL.len() => {
            ControlAction::SelectDebugView(DebugView::from_index(index))
        }
        _ => ControlAction::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::config::CameraConfig;
    use strata_core::math::Extent2D;

    fn key(code: &str) -> InputEvent {
        InputEvent::KeyPressed {
            key_code: code.to_string(),
        }
    }

    fn camera() -> IsometricCamera {
        IsometricCamera::new(&CameraConfig::default(), Extent2D::new(800, 600))
    }

    #[test]
    fn digits_select_debug_views() {
        let mut controls = CameraControls::new();
        let mut camera = camera();
        assert_eq!(
            controls.handle(&key("Digit0"), &mut camera),
            ControlAction::SelectDebugView(DebugView::Final)
        );
        assert_eq!(
            controls.handle(&key("Digit8"), &mut camera),
            ControlAction::SelectDebugView(DebugView::CascadeIndex)
        );
        assert_eq!(controls.handle(&key("Digit9"), &mut camera), ControlAction::None);
        assert_eq!(controls.handle(&key("KeyA"), &mut camera), ControlAction::None);
        assert_eq!(controls.handle(&key("Escape"), &mut camera), ControlAction::Quit);
    }

    #[test]
    fn only_middle_drag_pans() {
        let mut controls = CameraControls::new();
        let mut camera = camera();
        let moved = |x, y| InputEvent::MouseMoved { x, y };

        controls.handle(&moved(10.0, 10.0), &mut camera);
        assert_eq!(controls.handle(&moved(50.0, 10.0), &mut camera), ControlAction::None);
        assert_eq!(camera.pan(), Vec2::ZERO);

        controls.handle(
            &InputEvent::MouseButtonPressed {
                button: MouseButton::Middle,
            },
            &mut camera,
        );
        assert!(controls.is_dragging());
        assert_eq!(
            controls.handle(&moved(150.0, 10.0), &mut camera),
            ControlAction::CameraChanged
        );
        assert!((camera.pan().x + 1.0).abs() < 1e-6);

        controls.handle(
            &InputEvent::MouseButtonReleased {
                button: MouseButton::Middle,
            },
            &mut camera,
        );
        controls.handle(&moved(300.0, 10.0), &mut camera);
        assert!((camera.pan().x + 1.0).abs() < 1e-6);
    }

    #[test]
    fn wheel_zooms() {
        let mut controls = CameraControls::new();
        let mut camera = camera();
        let scrolled = InputEvent::MouseWheelScrolled {
            delta_x: 0.0,
            delta_y: 1.0,
        };
        assert_eq!(controls.handle(&scrolled, &mut camera), ControlAction::CameraChanged);
        assert!((camera.zoom() - 0.9).abs() < 1e-6);
    }
}
