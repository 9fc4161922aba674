//! Device-independent drag activation.
//!
//! A pointer press arms a [`DragTracker`]; the drag only becomes active once
//! the pointer has travelled past the activation distance, and never when
//! the press landed on an interactive control. Dropping an active drag
//! yields a [`MoveIntent`] for the ordering engine.

use crate::config::DragConfig;
use serde::{Deserialize, Serialize};

/// What the pointer went down on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerTarget {
    DragHandle,
    RowBody,
    TextInput,
    TextArea,
    Button,
    Select,
    ContentEditable,
}

impl PointerTarget {
    /// Controls that own their own pointer gestures (typing, clicking,
    /// picking) and must never start a drag.
    pub fn is_interactive(self) -> bool {
        matches!(
            self,
            PointerTarget::TextInput
                | PointerTarget::TextArea
                | PointerTarget::Button
                | PointerTarget::Select
                | PointerTarget::ContentEditable
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn distance_to(self, other: Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// A validated request to move one element, independent of the input device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveIntent {
    pub moved_id: String,
    pub from_index: usize,
    pub to_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum TrackerState {
    Idle,
    Armed {
        item_id: String,
        from_index: usize,
        origin: Point,
    },
    Active {
        item_id: String,
        from_index: usize,
    },
}

/// Tracks one pointer gesture over a row of a scope.
#[derive(Debug, Clone)]
pub struct DragTracker {
    activation_distance: f32,
    state: TrackerState,
}

impl DragTracker {
    pub fn new(activation_distance: f32) -> Self {
        Self {
            activation_distance: activation_distance.max(0.0),
            state: TrackerState::Idle,
        }
    }

    /// A tracker using `drag.activation_distance_px`.
    pub fn from_config(config: &DragConfig) -> Self {
        Self::new(config.activation_distance_px)
    }

    /// Register a press on the row holding `item_id` at `index`. Returns
    /// `false` (and stays idle) when the press hit an interactive control.
    pub fn pointer_down(
        &mut self,
        item_id: impl Into<String>,
        index: usize,
        target: PointerTarget,
        at: Point,
    ) -> bool {
        if target.is_interactive() {
            self.state = TrackerState::Idle;
            return false;
        }
        self.state = TrackerState::Armed {
            item_id: item_id.into(),
            from_index: index,
            origin: at,
        };
        true
    }

    /// Feed pointer movement. Returns `true` once the drag is active.
    pub fn pointer_move(&mut self, at: Point) -> bool {
        let activated = match &self.state {
            TrackerState::Armed {
                item_id,
                from_index,
                origin,
            } if origin.distance_to(at) > self.activation_distance => {
                Some(TrackerState::Active {
                    item_id: item_id.clone(),
                    from_index: *from_index,
                })
            }
            _ => None,
        };
        if let Some(state) = activated {
            self.state = state;
        }
        self.is_active()
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, TrackerState::Active { .. })
    }

    /// Release over the row at `over_index`. An armed-but-never-activated
    /// press is a click and yields nothing, as does dropping in place.
    pub fn release(&mut self, over_index: usize) -> Option<MoveIntent> {
        let state = std::mem::replace(&mut self.state, TrackerState::Idle);
        match state {
            TrackerState::Active {
                item_id,
                from_index,
            } if from_index != over_index => Some(MoveIntent {
                moved_id: item_id,
                from_index,
                to_index: over_index,
            }),
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.state = TrackerState::Idle;
    }
}
