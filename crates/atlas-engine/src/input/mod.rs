//! Keyboard input.
//!
//! Backend-agnostic: the runtime translates winit events into `InputEvent`s.

mod frame;
mod state;
mod types;

pub use frame::InputFrame;
pub use state::InputState;
pub use types::{InputEvent, Key, KeyState};
