//! Logical button state sampled once per tick.

use serde::{Deserialize, Serialize};

/// Logical buttons consumed by the player controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    Forward,
    Backward,
    Leftward,
    Rightward,
    Jump,
    AltMode,
}

impl Button {
    pub const ALL: [Button; 6] = [
        Button::Forward,
        Button::Backward,
        Button::Leftward,
        Button::Rightward,
        Button::Jump,
        Button::AltMode,
    ];
}

/// Snapshot of every logical button.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSnapshot {
    pub forward: bool,
    pub backward: bool,
    pub leftward: bool,
    pub rightward: bool,
    pub jump: bool,
    pub alt_mode: bool,
}

impl InputSnapshot {
    /// Builds a snapshot with only the given buttons held.
    pub fn with(buttons: &[Button]) -> Self {
        let mut snapshot = Self::default();
        for &button in buttons {
            snapshot.set(button, true);
        }
        snapshot
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        match button {
            Button::Forward => self.forward,
            Button::Backward => self.backward,
            Button::Leftward => self.leftward,
            Button::Rightward => self.rightward,
            Button::Jump => self.jump,
            Button::AltMode => self.alt_mode,
        }
    }

    pub fn set(&mut self, button: Button, pressed: bool) {
        let slot = match button {
            Button::Forward => &mut self.forward,
            Button::Backward => &mut self.backward,
            Button::Leftward => &mut self.leftward,
            Button::Rightward => &mut self.rightward,
            Button::Jump => &mut self.jump,
            Button::AltMode => &mut self.alt_mode,
        };
        *slot = pressed;
    }

    /// Buttons that went from released in `previous` to pressed in `self`.
    pub fn pressed_since(&self, previous: &InputSnapshot) -> InputEdges {
        let mut edges = InputEdges::default();
        for button in Button::ALL {
            if self.is_pressed(button) && !previous.is_pressed(button) {
                edges.0.set(button, true);
            }
        }
        edges
    }
}

/// Set of buttons pressed on this tick that were released on the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputEdges(InputSnapshot);

impl InputEdges {
    pub fn contains(&self, button: Button) -> bool {
        self.0.is_pressed(button)
    }

    pub fn any(&self) -> bool {
        Button::ALL.into_iter().any(|button| self.contains(button))
    }
}
