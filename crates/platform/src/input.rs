//! Keyboard and mouse state polled by the host loop.

use std::collections::HashSet;

pub use winit::keyboard::KeyCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    /// Maps a winit button; back/forward and other extra buttons are ignored.
    pub fn from_winit(button: winit::event::MouseButton) -> Option<Self> {
        match button {
            winit::event::MouseButton::Left => Some(Self::Left),
            winit::event::MouseButton::Right => Some(Self::Right),
            winit::event::MouseButton::Middle => Some(Self::Middle),
            _ => None,
        }
    }
}

/// Held keys and buttons plus the cursor position.
///
/// The mouse delta is the cursor movement between the two most recent
/// [`InputState::end_frame`] calls, so it reflects whole frames rather than
/// individual move events.
#[derive(Debug, Default)]
pub struct InputState {
    keys: HashSet<KeyCode>,
    buttons: HashSet<MouseButton>,
    mouse_position: (f32, f32),
    previous_position: (f32, f32),
    mouse_delta: (f32, f32),
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_key_pressed(&mut self, key: KeyCode) {
        self.keys.insert(key);
    }

    pub fn on_key_released(&mut self, key: KeyCode) {
        self.keys.remove(&key);
    }

    pub fn on_mouse_pressed(&mut self, button: MouseButton) {
        self.buttons.insert(button);
    }

    pub fn on_mouse_released(&mut self, button: MouseButton) {
        self.buttons.remove(&button);
    }

    pub fn on_mouse_moved(&mut self, x: f32, y: f32) {
        self.mouse_position = (x, y);
    }

    /// Closes the frame: the delta becomes the movement since the last call.
    pub fn end_frame(&mut self) {
        let (x, y) = self.mouse_position;
        let (px, py) = self.previous_position;
        self.mouse_delta = (x - px, y - py);
        self.previous_position = self.mouse_position;
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys.contains(&key)
    }

    pub fn is_mouse_down(&self, button: MouseButton) -> bool {
        self.buttons.contains(&button)
    }

    pub fn mouse_position(&self) -> (f32, f32) {
        self.mouse_position
    }

    pub fn mouse_delta(&self) -> (f32, f32) {
        self.mouse_delta
    }
}
