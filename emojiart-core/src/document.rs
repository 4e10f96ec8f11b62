//! The persisted EmojiArt document.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::emoji::normalize_radians;
use crate::{ArtError, ArtResult, Emoji, EmojiId};

/// A composition of emoji over an optional background.
///
/// The document is a plain value: all mutation goes through the methods
/// below, and [`Document::encode`] / [`Document::decode`] round-trip it
/// exactly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Background locator, `None` for no background.
    #[serde(rename = "backgroundURL", default)]
    background: Option<String>,
    /// Emoji in insertion (z-) order.
    #[serde(default)]
    emojis: Vec<Emoji>,
    /// Last identifier handed out.
    #[serde(rename = "uniqueEmojiId", default)]
    next_id: u64,
}

impl Document {
    /// Create an empty document with no background.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The background reference, if any.
    #[must_use]
    pub fn background(&self) -> Option<&str> {
        self.background.as_deref()
    }

    /// All emoji in z-order.
    #[must_use]
    pub fn emojis(&self) -> &[Emoji] {
        &self.emojis
    }

    /// Get an emoji by ID.
    #[must_use]
    pub fn emoji(&self, id: EmojiId) -> Option<&Emoji> {
        self.emojis.iter().find(|e| e.id() == id)
    }

    fn emoji_mut(&mut self, id: EmojiId) -> Option<&mut Emoji> {
        self.emojis.iter_mut().find(|e| e.id() == id)
    }

    /// Number of emoji in the document.
    #[must_use]
    pub fn len(&self) -> usize {
        self.emojis.len()
    }

    /// Check if the document has no emoji.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emojis.is_empty()
    }

    /// Append a new emoji with rotation 0 and return its fresh ID.
    ///
    /// Sizes below 1 are clamped to 1.
    pub fn add_emoji(&mut self, text: impl Into<String>, x: i32, y: i32, size: i32) -> EmojiId {
        self.next_id += 1;
        let id = EmojiId::from_raw(self.next_id);
        self.emojis.push(Emoji::new(text.into(), x, y, size, id));
        id
    }

    /// Move an emoji by the given deltas. Unknown IDs are ignored.
    pub fn move_emoji(&mut self, id: EmojiId, dx: i32, dy: i32) {
        if let Some(emoji) = self.emoji_mut(id) {
            emoji.x = emoji.x.saturating_add(dx);
            emoji.y = emoji.y.saturating_add(dy);
        }
    }

    /// Scale an emoji's size, rounding ties to even.
    ///
    /// Unknown IDs and non-positive or non-finite factors are ignored.
    pub fn scale_emoji(&mut self, id: EmojiId, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            tracing::debug!("Ignoring scale factor {factor} for emoji {id}");
            return;
        }
        if let Some(emoji) = self.emoji_mut(id) {
            // Float to int casts saturate, so huge factors stay in range
            #[allow(clippy::cast_possible_truncation)]
            let scaled = (f64::from(emoji.size) * factor).round_ties_even() as i32;
            emoji.size = scaled.max(1);
        }
    }

    /// Rotate an emoji by `delta` radians. Unknown IDs are ignored.
    pub fn rotate_emoji(&mut self, id: EmojiId, delta: f64) {
        if !delta.is_finite() {
            tracing::debug!("Ignoring rotation delta {delta} for emoji {id}");
            return;
        }
        if let Some(emoji) = self.emoji_mut(id) {
            emoji.rotation = normalize_radians(emoji.rotation + delta);
        }
    }

    /// Remove an emoji. Remaining IDs are untouched.
    pub fn remove_emoji(&mut self, id: EmojiId) -> Option<Emoji> {
        let index = self.emojis.iter().position(|e| e.id() == id)?;
        Some(self.emojis.remove(index))
    }

    /// Replace the background reference.
    pub fn set_background(&mut self, reference: Option<String>) {
        self.background = reference;
    }

    /// Encode the document to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> ArtResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(ArtError::Serialization)
    }

    /// Decode a document, returning `None` for malformed input.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        match Self::try_decode(bytes) {
            Ok(document) => Some(document),
            Err(e) => {
                tracing::warn!("Discarding persisted document: {e}");
                None
            }
        }
    }

    /// Decode a document, reporting why malformed input was rejected.
    ///
    /// The identifier counter is raised above every stored ID so new emoji
    /// never collide with historical ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid document or contain
    /// duplicate emoji IDs.
    pub fn try_decode(bytes: &[u8]) -> ArtResult<Self> {
        let mut document: Self = serde_json::from_slice(bytes)?;

        let mut seen = HashSet::with_capacity(document.emojis.len());
        for emoji in &mut document.emojis {
            if !seen.insert(emoji.id()) {
                return Err(ArtError::InvalidDocument(format!(
                    "duplicate emoji id {}",
                    emoji.id()
                )));
            }
            emoji.size = emoji.size.max(1);
            emoji.rotation = if emoji.rotation.is_finite() {
                normalize_radians(emoji.rotation)
            } else {
                0.0
            };
        }

        let max_id = document
            .emojis
            .iter()
            .map(|e| e.id().get())
            .max()
            .unwrap_or(0);
        document.next_id = document.next_id.max(max_id);
        Ok(document)
    }
}
