//! Steady and live view state, and the effective per-emoji transform.
//!
//! ```text
//! screen = (doc * zoom) + canvas_center + (pan + live_pan) * zoom [+ drag offset]
//! ```
//!
//! `zoom` here is the canvas zoom: the steady zoom, times the live pinch
//! only while nothing is selected. Selected emoji additionally take the live
//! pinch into their font size, and the live rotation into their angle.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::event::{Point, Size, Vector};
use crate::{Emoji, EmojiId};

/// Committed, gesture-independent camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    /// Zoom scale, always > 0.
    pub zoom: f64,
    /// Pan offset in document units.
    pub pan: Vector,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: Vector::ZERO,
        }
    }
}

impl ViewState {
    /// Pan offset in screen units at rest.
    #[must_use]
    pub fn pan_offset(&self) -> Vector {
        self.pan.scaled(self.zoom)
    }

    /// Convert a screen point to document space.
    ///
    /// Inverse of [`ViewState::document_to_screen`]: subtract the canvas
    /// centre, then the pan offset, then divide by the zoom.
    #[must_use]
    pub fn screen_to_document(&self, point: Point, canvas: Size) -> Point {
        let center = canvas.center();
        let offset = self.pan_offset();
        Point::new(
            (point.x - center.x - offset.dx) / self.zoom,
            (point.y - center.y - offset.dy) / self.zoom,
        )
    }

    /// Convert a document point to screen space with no gesture in progress.
    #[must_use]
    pub fn document_to_screen(&self, point: Point, canvas: Size) -> Point {
        let center = canvas.center();
        let offset = self.pan_offset();
        Point::new(
            point.x * self.zoom + center.x + offset.dx,
            point.y * self.zoom + center.y + offset.dy,
        )
    }
}

/// What a live drag moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DragTarget {
    /// The drag began on a selected emoji: the whole selection follows.
    Selection,
    /// The drag began on an unselected emoji: only it follows.
    Single(EmojiId),
}

/// A drag of one or more emoji in progress.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiveDrag {
    /// What is being dragged.
    pub target: DragTarget,
    /// Screen-space offset since the drag began.
    pub offset: Vector,
}

/// Transient gesture state, folded into steady state on gesture end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiveGesture {
    /// Live pinch factor.
    pub zoom: f64,
    /// Live rotation in radians.
    pub rotation: f64,
    /// Live canvas pan in document units.
    pub pan: Vector,
    /// Live emoji drag.
    pub drag: Option<LiveDrag>,
}

impl Default for LiveGesture {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            rotation: 0.0,
            pan: Vector::ZERO,
            drag: None,
        }
    }
}

impl LiveGesture {
    /// Whether any gesture value differs from rest.
    #[must_use]
    pub fn is_active(&self) -> bool {
        *self != Self::default()
    }
}

/// Where and how an emoji should be drawn right now.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectiveTransform {
    /// Screen position of the glyph centre.
    pub position: Point,
    /// Zoom applied to the glyph's font size.
    pub zoom: f64,
    /// Font size on screen.
    pub font_size: f64,
    /// Rotation in radians.
    pub rotation: f64,
}

/// Zoom applied to the canvas as a whole and to unselected emoji.
#[must_use]
pub fn canvas_zoom(view: &ViewState, live: &LiveGesture, has_selection: bool) -> f64 {
    view.zoom * if has_selection { 1.0 } else { live.zoom }
}

/// Compute the effective transform of one emoji.
#[must_use]
pub fn effective_transform(
    emoji: &Emoji,
    view: &ViewState,
    live: &LiveGesture,
    selection: &HashSet<EmojiId>,
    canvas: Size,
) -> EffectiveTransform {
    let has_selection = !selection.is_empty();
    let selected = selection.contains(&emoji.id());
    let zoom_all = canvas_zoom(view, live, has_selection);

    let zoom = if has_selection && selected {
        view.zoom * live.zoom
    } else {
        zoom_all
    };

    let rotation = if selected {
        emoji.rotation + live.rotation
    } else {
        emoji.rotation
    };

    let (x, y) = emoji.location();
    let center = canvas.center();
    let pan = (view.pan + live.pan).scaled(zoom_all);
    let mut position = Point::new(
        x * zoom_all + center.x + pan.dx,
        y * zoom_all + center.y + pan.dy,
    );

    if let Some(drag) = live.drag {
        let follows = match drag.target {
            DragTarget::Single(id) => id == emoji.id(),
            DragTarget::Selection => selected,
        };
        if follows {
            position.x += drag.offset.dx;
            position.y += drag.offset.dy;
        }
    }

    EffectiveTransform {
        position,
        zoom,
        font_size: emoji.font_size() * zoom,
        rotation,
    }
}
