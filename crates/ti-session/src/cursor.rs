use std::ops::Range;

use crate::error::{Result, SessionError};

/// Navigation state for step mode over the latest assistant message.
///
/// The cursor only says how much of the token sequence to reveal; it never
/// touches the sequence itself. A length of zero is the inactive state (no
/// assistant message yet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepCursor {
    position: usize,
    len: usize,
}

impl StepCursor {
    /// Create a cursor at position 0 over `len` tokens.
    pub fn new(len: usize) -> Self {
        Self { position: 0, len }
    }

    pub fn inactive() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.len > 0
    }

    /// Current index, or `None` while inactive.
    pub fn position(&self) -> Option<usize> {
        self.is_active().then_some(self.position)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Move forward one token, stopping at the last one.
    pub fn advance(&mut self) -> Option<usize> {
        if self.is_active() {
            self.position = (self.position + 1).min(self.len - 1);
        }
        self.position()
    }

    /// Move back one token, stopping at the first one.
    pub fn retreat(&mut self) -> Option<usize> {
        if self.is_active() {
            self.position = self.position.saturating_sub(1);
        }
        self.position()
    }

    /// Jump straight to `index`.
    ///
    /// # Errors
    /// Returns `OutOfRange` if `index >= len` (always, while inactive).
    pub fn jump_to(&mut self, index: usize) -> Result<usize> {
        if index >= self.len {
            return Err(SessionError::OutOfRange {
                index,
                len: self.len,
            });
        }
        self.position = index;
        Ok(index)
    }

    /// Point the cursor at a new sequence of `len` tokens, at position 0.
    pub fn reset(&mut self, len: usize) {
        self.position = 0;
        self.len = len;
    }

    /// Indices revealed in step mode: `0..=position`, empty while inactive.
    pub fn visible_range(&self) -> Range<usize> {
        if self.is_active() {
            0..self.position + 1
        } else {
            0..0
        }
    }

    /// The revealed prefix of `items`.
    pub fn visible<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let end = self.visible_range().end.min(items.len());
        &items[..end]
    }

    pub fn is_first(&self) -> bool {
        self.position == 0
    }

    pub fn is_last(&self) -> bool {
        !self.is_active() || self.position == self.len - 1
    }

    /// One-based progress label, e.g. `"3 / 12"`.
    pub fn label(&self) -> String {
        if self.is_active() {
            format!("{} / {}", self.position + 1, self.len)
        } else {
            "0 / 0".to_string()
        }
    }
}
