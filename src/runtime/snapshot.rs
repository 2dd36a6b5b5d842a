//! Checkpoint and restore of an execution stack
//!
//! A [`Snapshot`] is a deep copy of all three stacks. It shares nothing with
//! the live stack, so either can change without affecting the other, and
//! restoring it reproduces the exact state it was taken from. Snapshots
//! serialize to JSON for suspending an execution and resuming it elsewhere.

use super::frame::{Cursor, Frame};
use super::stack::ExecutionStack;
use super::value::{TypeTag, Value};
use super::StackError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Deep copy of the operand, type tag and frame stacks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "C: Serialize", deserialize = "C: Deserialize<'de>"))]
pub struct Snapshot<C> {
    values: Vec<Value>,
    tags: Vec<TypeTag>,
    frames: Vec<Frame<C>>,
}

impl<C: Cursor> Snapshot<C> {
    /// Number of operand values captured
    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// Check the stack invariants a restore relies on
    pub fn validate(&self) -> Result<(), StackError> {
        if self.values.len() != self.tags.len() {
            return Err(StackError::InvalidSnapshot(format!(
                "{} values but {} type tags",
                self.values.len(),
                self.tags.len()
            )));
        }
        let mut floor = 0;
        for (depth, frame) in self.frames.iter().enumerate() {
            if !frame.is_well_formed() {
                return Err(StackError::InvalidSnapshot(format!(
                    "frame {depth} has base {} below its {} locals",
                    frame.value_base, frame.locals
                )));
            }
            if frame.value_base > self.values.len() {
                return Err(StackError::InvalidSnapshot(format!(
                    "frame {depth} base {} above stack height {}",
                    frame.value_base,
                    self.values.len()
                )));
            }
            if frame.value_base < floor {
                return Err(StackError::InvalidSnapshot(format!(
                    "frame {depth} base {} below its caller's base {floor}",
                    frame.value_base
                )));
            }
            floor = frame.value_base;
        }
        Ok(())
    }
}

impl<C: Cursor + Serialize> Snapshot<C> {
    pub fn to_json(&self) -> Result<String, StackError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<C: Cursor + DeserializeOwned> Snapshot<C> {
    /// Parse a snapshot, rejecting one that breaks the stack invariants
    pub fn from_json(json: &str) -> Result<Self, StackError> {
        let snapshot: Snapshot<C> = serde_json::from_str(json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}

impl<C: Cursor> ExecutionStack<C> {
    /// Take a deep copy of the current state
    pub fn snapshot(&self) -> Snapshot<C> {
        log::debug!(
            "snapshot execution stack: {} values, {} frames",
            self.values.len(),
            self.frames.len()
        );
        Snapshot {
            values: self.values.clone(),
            tags: self.tags.clone(),
            frames: self.frames.clone(),
        }
    }

    /// Replace the current state with `snapshot`
    ///
    /// The snapshot is validated first, against the stack invariants and
    /// this stack's configured limits; on error the stack is unchanged.
    pub fn restore(&mut self, snapshot: Snapshot<C>) -> Result<(), StackError> {
        snapshot.validate()?;
        if let Some(limit) = self.config().max_values {
            if snapshot.values.len() > limit {
                return Err(StackError::InvalidSnapshot(format!(
                    "{} values exceed the limit of {limit}",
                    snapshot.values.len()
                )));
            }
        }
        if let Some(limit) = self.config().max_frames {
            if snapshot.frames.len() > limit {
                return Err(StackError::InvalidSnapshot(format!(
                    "{} frames exceed the limit of {limit}",
                    snapshot.frames.len()
                )));
            }
        }
        log::debug!(
            "restore execution stack: {} values, {} frames",
            snapshot.values.len(),
            snapshot.frames.len()
        );
        let Snapshot { values, tags, frames } = snapshot;
        self.values = values;
        self.tags = tags;
        self.frames = frames;
        Ok(())
    }
}
