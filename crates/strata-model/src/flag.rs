#![forbid(unsafe_code)]

//! Flags: positional markers users pin to a section.

use serde::{Deserialize, Serialize};

/// A marker pinned at a position on one section, with a comment thread.
///
/// Equality is structural (content, not identity) — two flags with the same
/// name, position, color, comments, and resolution state are the same flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub color: [u8; 3],
    pub comments: Vec<String>,
    pub resolved: bool,
}

impl Flag {
    /// Create an unresolved flag at a position.
    #[must_use]
    pub fn new(name: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            color: [255, 0, 0],
            comments: Vec::new(),
            resolved: false,
        }
    }

    /// Set the color.
    #[must_use]
    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = color;
        self
    }

    /// Append a comment.
    pub fn add_comment(&mut self, comment: impl Into<String>) {
        self.comments.push(comment.into());
    }
}
