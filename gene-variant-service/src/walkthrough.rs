use serde::{Deserialize, Serialize};

use crate::error::{Result, WalkthroughError};

/// Navigation events a session can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "index", rename_all = "snake_case")]
pub enum Navigation {
    Next,
    Back,
    /// Jump to a step, e.g. from the gallery
    Select(usize),
    /// Back to the first step
    Reset,
}

/// Position within a step list of fixed length.
///
/// Invariant: `index < len` whenever `len > 0`. There is no terminal state;
/// the walkthrough can be navigated in both directions indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCursor {
    index: usize,
    len: usize,
}

impl StepCursor {
    pub fn new(len: usize) -> Self {
        Self { index: 0, len }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.len
    }

    /// Apply a navigation event and return the new index.
    ///
    /// `Next` and `Back` saturate at the ends. An out-of-range `Select` is
    /// rejected and leaves the cursor where it was.
    pub fn apply(&mut self, navigation: Navigation) -> Result<usize> {
        match navigation {
            Navigation::Next => {
                if !self.is_last() {
                    self.index += 1;
                }
            }
            Navigation::Back => {
                self.index = self.index.saturating_sub(1);
            }
            Navigation::Select(index) => {
                if index >= self.len {
                    return Err(WalkthroughError::StepOutOfRange {
                        index,
                        len: self.len,
                    });
                }
                self.index = index;
            }
            Navigation::Reset => {
                self.index = 0;
            }
        }
        Ok(self.index)
    }
}
