//! The canvas controller: owns the document and reconciles gestures with it.
//!
//! All mutation happens through `&mut self`, so the controller's owner is the
//! single context on which document, view and selection change. Background
//! fetches complete elsewhere and are only applied when the owner calls
//! [`CanvasController::pump`] or [`CanvasController::next_background_outcome`].

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::event::{Gesture, GesturePhase, Point, Size, Vector};
use crate::loader::{BackgroundImage, BackgroundLoader, LoadOutcome, LoaderState};
use crate::reference::normalize_image_reference;
use crate::store::{document_key, KeyValueStore, PALETTES_KEY};
use crate::transform::{
    canvas_zoom, effective_transform, DragTarget, EffectiveTransform, LiveDrag, LiveGesture,
    ViewState,
};
use crate::{ArtResult, Document, Emoji, EmojiId, Palette, PaletteRegistry};

/// Capacity of the change notification channel.
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Controller configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Font size given to dropped glyphs.
    pub default_emoji_size: f64,
    /// Initial canvas size in screen units.
    pub canvas_size: Size,
    /// Start fetching the stored background as soon as a document opens.
    pub load_background_on_open: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            default_emoji_size: 40.0,
            canvas_size: Size::new(800.0, 600.0),
            load_background_on_open: true,
        }
    }
}

/// Change notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEvent {
    /// Emoji or background reference changed.
    DocumentChanged,
    /// Steady or live view state changed.
    ViewChanged,
    /// Selection membership changed.
    SelectionChanged,
    /// Palette registry or chosen palette changed.
    PaletteChanged,
    /// A new background image is ready.
    BackgroundLoaded {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
    /// The current background could not be loaded.
    BackgroundFailed,
}

/// Something dropped onto the canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropPayload {
    /// A URL, which becomes the background.
    Url(String),
    /// Text, which becomes a new emoji.
    Text(String),
}

/// An emoji together with how it should be drawn right now.
#[derive(Debug, Clone, Copy)]
pub struct EmojiView<'a> {
    /// The emoji.
    pub emoji: &'a Emoji,
    /// Effective transform.
    pub transform: EffectiveTransform,
    /// Whether the emoji is selected.
    pub selected: bool,
}

/// Owns a document plus its view, selection and live gesture state.
pub struct CanvasController {
    id: Uuid,
    document: Document,
    palettes: PaletteRegistry,
    chosen_palette: Palette,
    view: ViewState,
    live: LiveGesture,
    selection: HashSet<EmojiId>,
    canvas_size: Size,
    config: ControllerConfig,
    loader: BackgroundLoader,
    background_image: Option<BackgroundImage>,
    store: Option<Arc<dyn KeyValueStore>>,
    events: broadcast::Sender<CanvasEvent>,
}

impl std::fmt::Debug for CanvasController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasController")
            .field("id", &self.id)
            .field("document", &self.document)
            .field("view", &self.view)
            .field("live", &self.live)
            .field("selection", &self.selection)
            .field("loader", &self.loader)
            .finish_non_exhaustive()
    }
}

impl CanvasController {
    /// Create a controller for a fresh, unsaved document.
    #[must_use]
    pub fn new(loader: BackgroundLoader, config: ControllerConfig) -> Self {
        Self::with_document(
            Uuid::new_v4(),
            Document::new(),
            PaletteRegistry::default(),
            loader,
            config,
        )
    }

    /// Open a document from `store`, autosaving every later change.
    ///
    /// Missing or malformed documents start empty; a stored background is
    /// fetched straight away.
    pub fn open(
        id: Uuid,
        store: Arc<dyn KeyValueStore>,
        loader: BackgroundLoader,
        config: ControllerConfig,
    ) -> Self {
        let document = load_blob(store.as_ref(), &document_key(id))
            .and_then(|bytes| Document::decode(&bytes))
            .unwrap_or_default();
        let palettes = load_blob(store.as_ref(), PALETTES_KEY)
            .and_then(|bytes| PaletteRegistry::decode(&bytes))
            .unwrap_or_default();

        tracing::info!("Opened document {id} with {} emoji", document.len());
        let mut controller = Self::with_document(id, document, palettes, loader, config);
        controller.store = Some(store);
        controller
    }

    fn with_document(
        id: Uuid,
        document: Document,
        palettes: PaletteRegistry,
        loader: BackgroundLoader,
        config: ControllerConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let chosen_palette = palettes.default_palette();
        let mut controller = Self {
            id,
            document,
            palettes,
            chosen_palette,
            view: ViewState::default(),
            live: LiveGesture::default(),
            selection: HashSet::new(),
            canvas_size: config.canvas_size,
            config,
            loader,
            background_image: None,
            store: None,
            events,
        };
        if controller.config.load_background_on_open {
            let reference = controller.document.background().map(str::to_string);
            controller.loader.request(reference);
        }
        controller
    }

    // -----------------------------------------------------------------------
    // Read-only views
    // -----------------------------------------------------------------------

    /// Document identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The document.
    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.document
    }

    /// Committed camera.
    #[must_use]
    pub const fn steady_view(&self) -> &ViewState {
        &self.view
    }

    /// In-progress gesture state.
    #[must_use]
    pub const fn live_gesture(&self) -> &LiveGesture {
        &self.live
    }

    /// Current canvas size.
    #[must_use]
    pub const fn canvas_size(&self) -> Size {
        self.canvas_size
    }

    /// Subscribe to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CanvasEvent> {
        self.events.subscribe()
    }

    /// Every emoji with its effective transform, in z-order.
    #[must_use]
    pub fn emoji_views(&self) -> Vec<EmojiView<'_>> {
        self.document
            .emojis()
            .iter()
            .map(|emoji| EmojiView {
                emoji,
                transform: self.transform_of(emoji),
                selected: self.selection.contains(&emoji.id()),
            })
            .collect()
    }

    /// Effective transform of one emoji.
    #[must_use]
    pub fn effective_transform(&self, id: EmojiId) -> Option<EffectiveTransform> {
        self.document.emoji(id).map(|emoji| self.transform_of(emoji))
    }

    fn transform_of(&self, emoji: &Emoji) -> EffectiveTransform {
        effective_transform(
            emoji,
            &self.view,
            &self.live,
            &self.selection,
            self.canvas_size,
        )
    }

    /// Zoom applied to the background and unselected emoji.
    #[must_use]
    pub fn canvas_zoom(&self) -> f64 {
        canvas_zoom(&self.view, &self.live, self.has_selection())
    }

    /// Screen-space offset of the background, including any live pan.
    #[must_use]
    pub fn pan_offset(&self) -> Vector {
        (self.view.pan + self.live.pan).scaled(self.canvas_zoom())
    }

    /// The loaded background image.
    #[must_use]
    pub const fn background_image(&self) -> Option<&BackgroundImage> {
        self.background_image.as_ref()
    }

    /// Whether a background is set but not yet available.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.document.background().is_some() && self.background_image.is_none()
    }

    /// State of the background loader.
    #[must_use]
    pub const fn loader_state(&self) -> LoaderState {
        self.loader.state()
    }

    /// Convert a screen point to document space using the steady view.
    #[must_use]
    pub fn screen_to_document(&self, point: Point) -> Point {
        self.view.screen_to_document(point, self.canvas_size)
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Check if an emoji is selected.
    #[must_use]
    pub fn is_selected(&self, id: EmojiId) -> bool {
        self.selection.contains(&id)
    }

    /// Selected emoji IDs.
    #[must_use]
    pub const fn selection(&self) -> &HashSet<EmojiId> {
        &self.selection
    }

    /// Whether anything is selected.
    #[must_use]
    pub fn has_selection(&self) -> bool {
        !self.selection.is_empty()
    }

    /// Add an emoji to the selection, or remove it if already selected.
    pub fn toggle_selection(&mut self, id: EmojiId) {
        if self.document.emoji(id).is_none() {
            return;
        }
        if !self.selection.remove(&id) {
            self.selection.insert(id);
        }
        self.notify(CanvasEvent::SelectionChanged);
    }

    /// Deselect everything.
    pub fn clear_selection(&mut self) {
        if !self.selection.is_empty() {
            self.selection.clear();
            self.notify(CanvasEvent::SelectionChanged);
        }
    }

    fn selected_in_order(&self) -> Vec<EmojiId> {
        self.document
            .emojis()
            .iter()
            .map(Emoji::id)
            .filter(|id| self.selection.contains(id))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Document intents
    // -----------------------------------------------------------------------

    /// Add an emoji at a document-space position.
    pub fn add_emoji(&mut self, text: &str, x: i32, y: i32, size: i32) -> EmojiId {
        let id = self.document.add_emoji(text, x, y, size);
        self.document_changed();
        id
    }

    /// Add an emoji where it was dropped on screen.
    ///
    /// `size` defaults to the configured emoji size.
    pub fn add_emoji_at(&mut self, text: &str, location: Point, size: Option<f64>) -> EmojiId {
        let point = self.screen_to_document(location);
        let size = size.unwrap_or(self.config.default_emoji_size);
        self.add_emoji(text, round_to_i32(point.x), round_to_i32(point.y), round_to_i32(size))
    }

    /// Handle something dropped on the canvas.
    pub fn handle_drop(&mut self, payload: DropPayload, location: Point) {
        match payload {
            DropPayload::Url(url) => self.set_background_reference(Some(&url)),
            DropPayload::Text(text) => {
                self.add_emoji_at(&text, location, None);
            }
        }
    }

    /// Move an emoji by document-space deltas.
    pub fn move_emoji(&mut self, id: EmojiId, dx: i32, dy: i32) {
        self.document.move_emoji(id, dx, dy);
        self.document_changed();
    }

    /// Scale an emoji's size.
    pub fn scale_emoji(&mut self, id: EmojiId, factor: f64) {
        self.document.scale_emoji(id, factor);
        self.document_changed();
    }

    /// Rotate an emoji.
    pub fn rotate_emoji(&mut self, id: EmojiId, delta: f64) {
        self.document.rotate_emoji(id, delta);
        self.document_changed();
    }

    /// Remove an emoji, dropping it from the selection too.
    pub fn remove_emoji(&mut self, id: EmojiId) -> Option<Emoji> {
        let removed = self.document.remove_emoji(id)?;
        if self.selection.remove(&id) {
            self.notify(CanvasEvent::SelectionChanged);
        }
        self.document_changed();
        Some(removed)
    }

    /// Replace the background reference and start fetching it.
    pub fn set_background_reference(&mut self, reference: Option<&str>) {
        let reference = reference.map(normalize_image_reference);
        self.document.set_background(reference.clone());
        self.background_image = None;
        self.loader.request(reference);
        self.document_changed();
    }

    // -----------------------------------------------------------------------
    // View
    // -----------------------------------------------------------------------

    /// Update the canvas size.
    pub fn set_canvas_size(&mut self, size: Size) {
        if size.is_positive() {
            self.canvas_size = size;
            self.notify(CanvasEvent::ViewChanged);
        }
    }

    /// Fit an image of the given size into `canvas`, resetting the pan.
    ///
    /// Leaves the view untouched unless both sizes are strictly positive.
    pub fn zoom_to_fit(&mut self, image: Size, canvas: Size) {
        if !image.is_positive() || !canvas.is_positive() {
            return;
        }
        let h_zoom = canvas.width / image.width;
        let v_zoom = canvas.height / image.height;
        self.view = ViewState {
            zoom: h_zoom.min(v_zoom),
            pan: Vector::ZERO,
        };
        self.notify(CanvasEvent::ViewChanged);
    }

    fn zoom_to_fit_background(&mut self) {
        if let Some(size) = self.background_image.as_ref().map(BackgroundImage::size) {
            self.zoom_to_fit(size, self.canvas_size);
        }
    }

    // -----------------------------------------------------------------------
    // Gestures
    // -----------------------------------------------------------------------

    /// Apply a gesture event from the presentation layer.
    pub fn handle_gesture(&mut self, gesture: &Gesture) {
        match *gesture {
            Gesture::Tap { target: Some(id) } => self.toggle_selection(id),
            Gesture::Tap { target: None } => self.clear_selection(),
            Gesture::DoubleTap => self.zoom_to_fit_background(),
            Gesture::Pan { phase, translation } => self.pan(phase, translation),
            Gesture::Pinch { phase, scale } => self.pinch(phase, scale),
            Gesture::Rotate { phase, angle } => self.rotate(phase, angle),
            Gesture::DragEmoji {
                id,
                phase,
                translation,
            } => self.drag_emoji(id, phase, translation),
        }
    }

    fn pan(&mut self, phase: GesturePhase, translation: Vector) {
        if phase.is_terminal() {
            self.live.pan = Vector::ZERO;
        }
        let valid = translation.is_finite();
        if !valid && phase != GesturePhase::Cancel {
            tracing::debug!("Ignoring non-finite pan {translation:?}");
        }
        match phase {
            GesturePhase::Begin | GesturePhase::Update if valid => {
                self.live.pan = translation.scaled(1.0 / self.canvas_zoom());
            }
            GesturePhase::End if valid => {
                let delta = translation.scaled(1.0 / self.canvas_zoom());
                self.view.pan = self.view.pan + delta;
                tracing::debug!("Committed pan, view now {:?}", self.view);
            }
            _ => {}
        }
        self.notify(CanvasEvent::ViewChanged);
    }

    fn pinch(&mut self, phase: GesturePhase, scale: f64) {
        if phase.is_terminal() {
            self.live.zoom = 1.0;
        }
        let valid = scale.is_finite() && scale > 0.0;
        if !valid && phase != GesturePhase::Cancel {
            tracing::debug!("Ignoring pinch scale {scale}");
        }
        match phase {
            GesturePhase::Begin | GesturePhase::Update if valid => self.live.zoom = scale,
            GesturePhase::End if valid => {
                if self.has_selection() {
                    for id in self.selected_in_order() {
                        self.document.scale_emoji(id, scale);
                    }
                    tracing::debug!("Scaled {} selected emoji by {scale}", self.selection.len());
                    self.document_changed();
                } else {
                    let zoom = self.view.zoom * scale;
                    if zoom.is_finite() && zoom > 0.0 {
                        self.view.zoom = zoom;
                    }
                }
            }
            _ => {}
        }
        self.notify(CanvasEvent::ViewChanged);
    }

    fn rotate(&mut self, phase: GesturePhase, angle: f64) {
        if phase.is_terminal() {
            self.live.rotation = 0.0;
        }
        let valid = angle.is_finite();
        if !valid && phase != GesturePhase::Cancel {
            tracing::debug!("Ignoring rotation {angle}");
        }
        match phase {
            GesturePhase::Begin | GesturePhase::Update if valid => self.live.rotation = angle,
            GesturePhase::End if valid && self.has_selection() => {
                for id in self.selected_in_order() {
                    self.document.rotate_emoji(id, angle);
                }
                self.document_changed();
            }
            _ => {}
        }
        self.notify(CanvasEvent::ViewChanged);
    }

    fn drag_emoji(&mut self, id: EmojiId, phase: GesturePhase, translation: Vector) {
        let finished = if phase.is_terminal() {
            self.live.drag.take()
        } else {
            None
        };
        let valid = translation.is_finite();
        if !valid && phase != GesturePhase::Cancel {
            tracing::debug!("Ignoring non-finite drag {translation:?}");
        }
        match phase {
            GesturePhase::Begin | GesturePhase::Update if valid => {
                let target = match self.live.drag {
                    Some(drag) => drag.target,
                    None if self.document.emoji(id).is_none() => return,
                    None if self.is_selected(id) => DragTarget::Selection,
                    None => DragTarget::Single(id),
                };
                self.live.drag = Some(LiveDrag {
                    target,
                    offset: translation,
                });
            }
            GesturePhase::End if valid => {
                if let Some(drag) = finished {
                    let delta = translation.scaled(1.0 / self.canvas_zoom());
                    let (dx, dy) = (round_to_i32(delta.dx), round_to_i32(delta.dy));
                    match drag.target {
                        DragTarget::Selection => {
                            for selected in self.selected_in_order() {
                                self.document.move_emoji(selected, dx, dy);
                            }
                        }
                        DragTarget::Single(single) => self.document.move_emoji(single, dx, dy),
                    }
                    self.document_changed();
                }
            }
            _ => {}
        }
        self.notify(CanvasEvent::ViewChanged);
    }

    // -----------------------------------------------------------------------
    // Background completions
    // -----------------------------------------------------------------------

    /// Apply any background fetch that has already completed.
    pub fn pump(&mut self) -> Option<LoadOutcome> {
        let outcome = self.loader.try_next()?;
        self.apply_outcome(&outcome);
        Some(outcome)
    }

    /// Wait for the background fetch in flight and apply its result.
    ///
    /// Returns `None` when nothing is being fetched.
    pub async fn next_background_outcome(&mut self) -> Option<LoadOutcome> {
        let outcome = self.loader.next_outcome().await?;
        self.apply_outcome(&outcome);
        Some(outcome)
    }

    fn apply_outcome(&mut self, outcome: &LoadOutcome) {
        match outcome {
            LoadOutcome::Loaded(image) => {
                self.background_image = Some(image.clone());
                self.zoom_to_fit(image.size(), self.canvas_size);
                self.notify(CanvasEvent::BackgroundLoaded {
                    width: image.width(),
                    height: image.height(),
                });
            }
            LoadOutcome::Failed => {
                self.background_image = None;
                self.notify(CanvasEvent::BackgroundFailed);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Palettes
    // -----------------------------------------------------------------------

    /// The palette registry.
    #[must_use]
    pub const fn palettes(&self) -> &PaletteRegistry {
        &self.palettes
    }

    /// The palette currently offered for dragging.
    #[must_use]
    pub const fn chosen_palette(&self) -> &Palette {
        &self.chosen_palette
    }

    /// Display name of the chosen palette.
    #[must_use]
    pub fn chosen_palette_name(&self) -> String {
        self.palettes.display_name(&self.chosen_palette)
    }

    /// Choose the palette registered under `name`.
    ///
    /// Returns `false` and keeps the current choice if there is none.
    pub fn choose_palette(&mut self, name: &str) -> bool {
        let Some(palette) = self.palettes.named(name).cloned() else {
            return false;
        };
        self.chosen_palette = palette;
        self.notify(CanvasEvent::PaletteChanged);
        true
    }

    /// Choose the next palette.
    pub fn next_palette(&mut self) -> &Palette {
        self.chosen_palette = self.palettes.next(&self.chosen_palette);
        self.notify(CanvasEvent::PaletteChanged);
        &self.chosen_palette
    }

    /// Choose the previous palette.
    pub fn previous_palette(&mut self) -> &Palette {
        self.chosen_palette = self.palettes.previous(&self.chosen_palette);
        self.notify(CanvasEvent::PaletteChanged);
        &self.chosen_palette
    }

    /// Rename the chosen palette.
    pub fn rename_palette(&mut self, name: &str) {
        self.palettes.rename(&self.chosen_palette, name);
        self.palettes_changed();
    }

    /// Add a glyph to the chosen palette.
    pub fn add_glyph_to_palette(&mut self, glyph: &str) -> &Palette {
        self.chosen_palette = self.palettes.add_glyph(glyph, &self.chosen_palette);
        self.palettes_changed();
        &self.chosen_palette
    }

    /// Remove a glyph from the chosen palette.
    pub fn remove_glyph_from_palette(&mut self, glyph: &str) -> &Palette {
        self.chosen_palette = self.palettes.remove_glyph(glyph, &self.chosen_palette);
        self.palettes_changed();
        &self.chosen_palette
    }

    /// Register a new palette and choose it.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or glyph sequence is already registered.
    pub fn add_palette(&mut self, name: &str, palette: Palette) -> ArtResult<()> {
        self.palettes.add_palette(name, palette.clone())?;
        self.chosen_palette = palette;
        self.palettes_changed();
        Ok(())
    }

    /// Unregister a palette by name.
    ///
    /// # Errors
    ///
    /// Returns an error if no palette has that name or it is the last one.
    pub fn remove_palette(&mut self, name: &str) -> ArtResult<Palette> {
        let removed = self.palettes.remove_palette(name)?;
        if removed == self.chosen_palette {
            self.chosen_palette = self.palettes.default_palette();
        }
        self.palettes_changed();
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Persistence and notification
    // -----------------------------------------------------------------------

    fn notify(&self, event: CanvasEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn document_changed(&mut self) {
        if let Some(store) = &self.store {
            let key = document_key(self.id);
            match self.document.encode() {
                Ok(bytes) => {
                    if let Err(e) = store.set(&key, &bytes) {
                        tracing::warn!("Failed to autosave document {}: {e}", self.id);
                    }
                }
                Err(e) => tracing::warn!("Failed to encode document {}: {e}", self.id),
            }
        }
        self.notify(CanvasEvent::DocumentChanged);
    }

    fn palettes_changed(&mut self) {
        if let Some(store) = &self.store {
            match self.palettes.encode() {
                Ok(bytes) => {
                    if let Err(e) = store.set(PALETTES_KEY, &bytes) {
                        tracing::warn!("Failed to save palettes: {e}");
                    }
                }
                Err(e) => tracing::warn!("Failed to encode palettes: {e}"),
            }
        }
        self.notify(CanvasEvent::PaletteChanged);
    }
}

fn load_blob(store: &dyn KeyValueStore, key: &str) -> Option<Vec<u8>> {
    match store.get(key) {
        Ok(blob) => blob,
        Err(e) => {
            tracing::warn!("Failed to read {key}: {e}");
            None
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn round_to_i32(value: f64) -> i32 {
    // Float to int casts saturate; NaN becomes 0
    value.round() as i32
}
