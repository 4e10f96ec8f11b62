//! Gesture events delivered by the presentation layer.

use serde::{Deserialize, Serialize};

use crate::EmojiId;

/// Phase of a continuous gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GesturePhase {
    /// Gesture recognized.
    Begin,
    /// Gesture value changed.
    Update,
    /// Gesture finished; live state is committed.
    End,
    /// Gesture aborted; live state is discarded.
    Cancel,
}

impl GesturePhase {
    /// Whether this phase closes the gesture.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::End | Self::Cancel)
    }
}

/// A two-dimensional delta or offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    /// Horizontal component.
    pub dx: f64,
    /// Vertical component.
    pub dy: f64,
}

impl Vector {
    /// The zero vector.
    pub const ZERO: Self = Self { dx: 0.0, dy: 0.0 };

    /// Create a vector.
    #[must_use]
    pub const fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    /// Whether both components are finite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.dx.is_finite() && self.dy.is_finite()
    }

    /// Multiply both components.
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        Self::new(self.dx * factor, self.dy * factor)
    }
}

impl std::ops::Add for Vector {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.dx + rhs.dx, self.dy + rhs.dy)
    }
}

/// A point in screen or document space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Point {
    /// Create a point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Width and height of a canvas or image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Size {
    /// Create a size.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Whether both dimensions are strictly positive and finite.
    #[must_use]
    pub fn is_positive(self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    /// The centre point.
    #[must_use]
    pub fn center(self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
}

/// Recognized gestures on the canvas.
///
/// Continuous gestures carry the cumulative value since `Begin`, not the
/// increment since the previous update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "gesture", content = "data")]
pub enum Gesture {
    /// Single tap; `target` is the tapped emoji or `None` for empty canvas.
    Tap {
        /// Tapped emoji.
        target: Option<EmojiId>,
    },

    /// Double tap on the canvas background.
    DoubleTap,

    /// Drag on the canvas background.
    Pan {
        /// Gesture phase.
        phase: GesturePhase,
        /// Screen-space translation since the gesture began.
        translation: Vector,
    },

    /// Pinch to zoom.
    Pinch {
        /// Gesture phase.
        phase: GesturePhase,
        /// Scale factor since the gesture began (1.0 = no change).
        scale: f64,
    },

    /// Two-finger rotation.
    Rotate {
        /// Gesture phase.
        phase: GesturePhase,
        /// Rotation since the gesture began, in radians.
        angle: f64,
    },

    /// Drag that started on an emoji.
    DragEmoji {
        /// Emoji under the finger when the drag began.
        id: EmojiId,
        /// Gesture phase.
        phase: GesturePhase,
        /// Screen-space translation since the gesture began.
        translation: Vector,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_phases() {
        assert!(GesturePhase::End.is_terminal());
        assert!(GesturePhase::Cancel.is_terminal());
        assert!(!GesturePhase::Update.is_terminal());
    }

    #[test]
    fn test_size_positive() {
        assert!(Size::new(1.0, 1.0).is_positive());
        assert!(!Size::new(0.0, 1.0).is_positive());
        assert!(!Size::new(f64::INFINITY, 1.0).is_positive());
    }

    #[test]
    fn test_gesture_serde_tagging() {
        let gesture = Gesture::Pinch {
            phase: GesturePhase::Update,
            scale: 2.0,
        };
        let json = serde_json::to_value(&gesture).expect("serialize");
        assert_eq!(json["gesture"], "Pinch");
        assert_eq!(json["data"]["phase"], "update");
    }
}
