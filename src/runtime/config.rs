//! Execution stack configuration

use super::StackError;
use serde::Deserialize;

/// Default reserved capacity of the operand and type tag stacks
pub const DEFAULT_VALUE_CAPACITY: usize = 2048;

/// Default reserved capacity of the frame stack
pub const DEFAULT_FRAME_CAPACITY: usize = 16;

/// Sizing of an [`ExecutionStack`](super::stack::ExecutionStack)
///
/// Capacities are only a hint to avoid early reallocation, the stacks keep
/// growing past them. The `max_*` limits are hard: exceeding one is reported
/// as a resource exhaustion error.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    pub value_capacity: usize,
    pub frame_capacity: usize,
    pub max_values: Option<usize>,
    pub max_frames: Option<usize>,
}

impl Default for StackConfig {
    fn default() -> Self {
        StackConfig {
            value_capacity: DEFAULT_VALUE_CAPACITY,
            frame_capacity: DEFAULT_FRAME_CAPACITY,
            max_values: None,
            max_frames: None,
        }
    }
}

impl StackConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value_capacity(mut self, capacity: usize) -> Self {
        self.value_capacity = capacity;
        self
    }

    pub fn frame_capacity(mut self, capacity: usize) -> Self {
        self.frame_capacity = capacity;
        self
    }

    /// Limit the operand stack to `limit` values
    pub fn max_values(mut self, limit: usize) -> Self {
        self.max_values = Some(limit);
        self
    }

    /// Limit the call depth to `limit` frames
    pub fn max_frames(mut self, limit: usize) -> Self {
        self.max_frames = Some(limit);
        self
    }

    /// Parse a configuration from JSON, missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, StackError> {
        Ok(serde_json::from_str(json)?)
    }
}
