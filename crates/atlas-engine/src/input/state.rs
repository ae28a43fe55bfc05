use std::collections::HashSet;

use super::frame::InputFrame;
use super::types::{InputEvent, Key, KeyState};

/// Held keys and focus of one window.
///
/// Transitions are additionally recorded into the frame's [`InputFrame`].
#[derive(Debug, Default)]
pub struct InputState {
    pub focused: bool,
    pub keys_down: HashSet<Key>,
}

impl InputState {
    pub fn apply_event(&mut self, frame: &mut InputFrame, ev: InputEvent) {
        match &ev {
            InputEvent::Key { key, state: KeyState::Pressed, .. } => {
                // Auto-repeat of a held key is not a new press.
                if self.keys_down.insert(*key) {
                    frame.keys_pressed.insert(*key);
                }
            }
            InputEvent::Key { key, state: KeyState::Released, .. } => {
                if self.keys_down.remove(key) {
                    frame.keys_released.insert(*key);
                }
            }
            InputEvent::Focused(focused) => {
                self.focused = *focused;
                if !focused {
                    // Releases are lost while unfocused.
                    self.keys_down.clear();
                }
            }
            InputEvent::CloseRequested => frame.close_requested = true,
        }

        frame.events.push(ev);
    }

    #[inline]
    pub fn key_down(&self, key: Key) -> bool {
        self.keys_down.contains(&key)
    }

    /// `+1` / `-1` / `0` from a pair of opposing keys.
    pub fn axis(&self, negative: Key, positive: Key) -> f32 {
        (self.key_down(positive) as i32 - self.key_down(negative) as i32) as f32
    }
}
