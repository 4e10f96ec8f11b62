//! Emoji glyphs - the building blocks of a document.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

/// Unique identifier for an emoji within a document.
///
/// Identifiers are assigned by [`Document::add_emoji`](crate::Document::add_emoji)
/// and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmojiId(u64);

impl EmojiId {
    /// Wrap a raw identifier value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw identifier value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EmojiId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A glyph placed on the canvas.
///
/// Coordinates are offsets from the document's logical centre in document
/// space; they do not depend on the current zoom or pan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emoji {
    /// Displayed character(s).
    text: String,
    /// Horizontal offset from the centre.
    pub x: i32,
    /// Vertical offset from the centre.
    pub y: i32,
    /// Nominal font size, always at least 1.
    pub size: i32,
    /// Identifier, immutable once assigned.
    id: EmojiId,
    /// Absolute rotation in radians, within `[0, 2π)`.
    #[serde(default)]
    pub rotation: f64,
}

impl Emoji {
    pub(crate) fn new(text: String, x: i32, y: i32, size: i32, id: EmojiId) -> Self {
        Self {
            text,
            x,
            y,
            size: size.max(1),
            id,
            rotation: 0.0,
        }
    }

    /// The emoji's identifier.
    #[must_use]
    pub const fn id(&self) -> EmojiId {
        self.id
    }

    /// The displayed glyph.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Font size as a float, for rendering.
    #[must_use]
    pub fn font_size(&self) -> f64 {
        f64::from(self.size)
    }

    /// Location as a float point in document space.
    #[must_use]
    pub fn location(&self) -> (f64, f64) {
        (f64::from(self.x), f64::from(self.y))
    }
}

/// Normalize an angle into `[0, 2π)`.
pub(crate) fn normalize_radians(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}
