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

//! Translation from `winit` window events to the engine's [`InputEvent`].

use strata_core::platform::input::{InputEvent, MouseButton};
use winit::event::{ElementState, MouseButton as WinitMouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Translates a `winit::event::WindowEvent` into an [`InputEvent`].
///
/// Returns `None` for events that are not direct user input (resizes, focus
/// changes, close requests) and for key repeats.
pub fn translate_winit_input(event: &WindowEvent) -> Option<InputEvent> {
    match event {
        WindowEvent::KeyboardInput {
            event: key_event, ..
        } => {
            let PhysicalKey::Code(keycode) = key_event.physical_key else {
                return None;
            };
            let key_code = map_keycode_to_string(keycode);
            match key_event.state {
                ElementState::Pressed if !key_event.repeat => {
                    Some(InputEvent::KeyPressed { key_code })
                }
                ElementState::Released => Some(InputEvent::KeyReleased { key_code }),
                _ => None,
            }
        }
        WindowEvent::CursorMoved { position, .. } => Some(InputEvent::MouseMoved {
            x: position.x as f32,
            y: position.y as f32,
        }),
        WindowEvent::MouseInput { state, button, .. } => {
            let button = map_mouse_button(*button);
            Some(match state {
                ElementState::Pressed => InputEvent::MouseButtonPressed { button },
                ElementState::Released => InputEvent::MouseButtonReleased { button },
            })
        }
        WindowEvent::MouseWheel { delta, .. } => {
            let (delta_x, delta_y) = match delta {
                MouseScrollDelta::LineDelta(x, y) => (*x, *y),
                MouseScrollDelta::PixelDelta(pos) => (pos.x as f32, pos.y as f32),
            };
            (delta_x != 0.0 || delta_y != 0.0)
                .then_some(InputEvent::MouseWheelScrolled { delta_x, delta_y })
        }
        _ => None,
    }
}

fn map_keycode_to_string(keycode: KeyCode) -> String {
    format!("{keycode:?}")
}

fn map_mouse_button(button: WinitMouseButton) -> MouseButton {
    match button {
        WinitMouseButton::Left => MouseButton::Left,
        WinitMouseButton::Right => MouseButton::Right,
        WinitMouseButton::Middle => MouseButton::Middle,
        WinitMouseButton::Back => MouseButton::Back,
        WinitMouseButton::Forward => MouseButton::Forward,
        WinitMouseButton::Other(id) => MouseButton::Other(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::{PhysicalPosition, PhysicalSize};
    use winit::event::{DeviceId, TouchPhase};

    #[allow(unused_unsafe)]
    fn device_id() -> DeviceId {
        // SAFETY: the id is only compared, never handed back to the platform.
        unsafe { DeviceId::dummy() }
    }

    #[test]
    fn digit_keys_keep_their_physical_names() {
        assert_eq!(map_keycode_to_string(KeyCode::Digit3), "Digit3");
        assert_eq!(map_keycode_to_string(KeyCode::Escape), "Escape");
    }

    #[test]
    fn mouse_buttons_map_one_to_one() {
        assert_eq!(map_mouse_button(WinitMouseButton::Left), MouseButton::Left);
        assert_eq!(map_mouse_button(WinitMouseButton::Right), MouseButton::Right);
        assert_eq!(
            map_mouse_button(WinitMouseButton::Other(9)),
            MouseButton::Other(9)
        );
    }

    #[test]
    fn drag_events_are_translated() {
        let press = WindowEvent::MouseInput {
            device_id: device_id(),
            state: ElementState::Pressed,
            button: WinitMouseButton::Left,
        };
        assert_eq!(
            translate_winit_input(&press),
            Some(InputEvent::MouseButtonPressed {
                button: MouseButton::Left
            })
        );

        let moved = WindowEvent::CursorMoved {
            device_id: device_id(),
            position: PhysicalPosition::new(100.5, 200.75),
        };
        assert_eq!(
            translate_winit_input(&moved),
            Some(InputEvent::MouseMoved { x: 100.5, y: 200.75 })
        );
    }

    #[test]
    fn wheel_deltas_are_forwarded_unless_zero() {
        let scroll = WindowEvent::MouseWheel {
            device_id: device_id(),
            delta: MouseScrollDelta::LineDelta(0.0, -1.0),
            phase: TouchPhase::Moved,
        };
        assert_eq!(
            translate_winit_input(&scroll),
            Some(InputEvent::MouseWheelScrolled {
                delta_x: 0.0,
                delta_y: -1.0
            })
        );

        let idle = WindowEvent::MouseWheel {
            device_id: device_id(),
            delta: MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, 0.0)),
            phase: TouchPhase::Moved,
        };
        assert_eq!(translate_winit_input(&idle), None);
    }

    #[test]
    fn window_events_are_not_input() {
        assert_eq!(
            translate_winit_input(&WindowEvent::Resized(PhysicalSize::new(640, 480))),
            None
        );
        assert_eq!(translate_winit_input(&WindowEvent::CloseRequested), None);
    }
}
