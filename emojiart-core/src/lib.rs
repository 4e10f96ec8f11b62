//! # EmojiArt Core
//!
//! Document model and transform engine for composing emoji over a
//! background image.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               CanvasController              │
//! │  - steady view (zoom, pan)                  │
//! │  - selection + live gesture state           │
//! │  - effective per-emoji transforms           │
//! ├──────────────────────┬──────────────────────┤
//! │  Document            │  BackgroundLoader    │
//! │  - emoji, ids        │  - fetch + decode    │
//! │  - encode / decode   │  - supersede/cancel  │
//! ├──────────────────────┼──────────────────────┤
//! │  PaletteRegistry     │  KeyValueStore       │
//! └──────────────────────┴──────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod controller;
pub mod document;
pub mod emoji;
pub mod error;
pub mod event;
pub mod loader;
pub mod palette;
pub mod reference;
pub mod store;
pub mod transform;

pub use controller::{CanvasController, CanvasEvent, ControllerConfig, DropPayload, EmojiView};
pub use document::Document;
pub use emoji::{Emoji, EmojiId};
pub use error::{ArtError, ArtResult};
pub use event::{Gesture, GesturePhase, Point, Size, Vector};
#[cfg(feature = "images")]
pub use loader::RasterDecoder;
pub use loader::{
    BackgroundImage, BackgroundLoader, ImageDecoder, ImageFetcher, LoadOutcome, LoaderState,
};
pub use palette::{Palette, PaletteRegistry};
pub use reference::normalize_image_reference;
pub use store::{document_id, document_key, FileStore, KeyValueStore, MemoryStore, PALETTES_KEY};
pub use transform::{
    effective_transform, DragTarget, EffectiveTransform, LiveDrag, LiveGesture, ViewState,
};

/// EmojiArt core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
