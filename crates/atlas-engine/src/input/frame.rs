use std::collections::HashSet;

use super::types::{InputEvent, Key};

/// Input transitions of the current frame.
///
/// Cleared by the runtime after every frame.
#[derive(Debug, Default)]
pub struct InputFrame {
    /// Raw events in arrival order.
    pub events: Vec<InputEvent>,
    pub keys_pressed: HashSet<Key>,
    pub keys_released: HashSet<Key>,
    pub close_requested: bool,
}

impl InputFrame {
    pub fn clear(&mut self) {
        self.events.clear();
        self.keys_pressed.clear();
        self.keys_released.clear();
        self.close_requested = false;
    }

    #[inline]
    pub fn pressed(&self, key: Key) -> bool {
        self.keys_pressed.contains(&key)
    }

    #[inline]
    pub fn released(&self, key: Key) -> bool {
        self.keys_released.contains(&key)
    }

    /// Escape was pressed or the window was asked to close this frame.
    #[inline]
    pub fn quit_requested(&self) -> bool {
        self.close_requested || self.pressed(Key::Escape)
    }
}
