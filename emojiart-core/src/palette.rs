//! Palettes of candidate glyphs and the registry that cycles through them.

use serde::{Deserialize, Serialize};

use crate::{ArtError, ArtResult};

/// An ordered sequence of distinct glyphs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Palette(Vec<String>);

impl Palette {
    /// Build a palette from glyphs, dropping later duplicates.
    #[must_use]
    pub fn from_glyphs<I, S>(glyphs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut palette = Self::default();
        for glyph in glyphs {
            palette.push(glyph.into());
        }
        palette
    }

    /// Glyphs in order.
    #[must_use]
    pub fn glyphs(&self) -> &[String] {
        &self.0
    }

    /// Number of glyphs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the palette has no glyphs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check if the palette contains a glyph.
    #[must_use]
    pub fn contains(&self, glyph: &str) -> bool {
        self.0.iter().any(|g| g == glyph)
    }

    fn push(&mut self, glyph: String) {
        if !glyph.is_empty() && !self.contains(&glyph) {
            self.0.push(glyph);
        }
    }
}

impl std::fmt::Display for Palette {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for glyph in &self.0 {
            f.write_str(glyph)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PaletteEntry {
    name: String,
    glyphs: Palette,
}

/// Named palettes in registration order.
///
/// The registry is never empty and no two entries share a name or a glyph
/// sequence, so locating a palette by value is unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteRegistry {
    entries: Vec<PaletteEntry>,
}

impl Default for PaletteRegistry {
    fn default() -> Self {
        let builtin: [(&str, &[&str]); 4] = [
            ("Favorites", &["⭐️", "🌧", "🍎", "🌍", "🥐", "⚾️"]),
            (
                "Animals",
                &[
                    "🐶", "🐱", "🐹", "🐰", "🦊", "🐼", "🐨", "🐯", "🐸", "🐵",
                    "🐧", "🐦", "🐤", "🦆", "🦅", "🦉", "🦇", "🐢", "🐍", "🦎",
                    "🦖", "🦕", "🐅", "🐆", "🦓", "🦍", "🐘", "🦏", "🦛", "🐃",
                    "🐂", "🐄",
                ],
            ),
            (
                "Food",
                &[
                    "🍏", "🍎", "🍐", "🍊", "🍋", "🍌", "🍉", "🍇", "🍓", "🍈",
                    "🍒", "🍑", "🍍", "🥥", "🥝", "🍅", "🥑", "🌽", "🥕", "🥐",
                    "🥯", "🍞", "🥖", "🧀", "🥚", "🍳", "🥓", "🥞", "🍔", "🌭",
                    "🍕", "🌮",
                ],
            ),
            (
                "Faces",
                &[
                    "😀", "😅", "😂", "😇", "🥰", "😉", "🙃", "😎", "🥳", "😡",
                    "🤯", "🥶", "🤥", "😴", "🙄", "👿", "😷", "🤧", "🤡",
                ],
            ),
        ];
        Self {
            entries: builtin
                .iter()
                .map(|(name, glyphs)| PaletteEntry {
                    name: (*name).to_string(),
                    glyphs: Palette::from_glyphs(glyphs.iter().copied()),
                })
                .collect(),
        }
    }
}

impl PaletteRegistry {
    /// Create a registry from `(name, palette)` pairs in order.
    ///
    /// # Errors
    ///
    /// Returns [`ArtError::InvalidOperation`] if no palettes are given or
    /// two of them share a name or glyph sequence.
    pub fn with_palettes<I, S>(palettes: I) -> ArtResult<Self>
    where
        I: IntoIterator<Item = (S, Palette)>,
        S: Into<String>,
    {
        let mut registry = Self {
            entries: Vec::new(),
        };
        for (name, glyphs) in palettes {
            registry.add_palette(name, glyphs)?;
        }
        if registry.entries.is_empty() {
            return Err(ArtError::InvalidOperation(
                "a palette registry needs at least one palette".to_string(),
            ));
        }
        Ok(registry)
    }

    /// Number of registered palettes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`; kept for API symmetry with [`PaletteRegistry::len`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All palettes in registration order.
    pub fn palettes(&self) -> impl Iterator<Item = &Palette> {
        self.entries.iter().map(|e| &e.glyphs)
    }

    /// The palette shown first when a document is opened.
    #[must_use]
    pub fn default_palette(&self) -> Palette {
        self.entries
            .first()
            .map(|e| e.glyphs.clone())
            .unwrap_or_default()
    }

    /// The first palette registered under `name`.
    #[must_use]
    pub fn named(&self, name: &str) -> Option<&Palette> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.glyphs)
    }

    fn position(&self, palette: &Palette) -> Option<usize> {
        self.entries.iter().position(|e| e.glyphs == *palette)
    }

    fn entry_mut(&mut self, palette: &Palette) -> Option<&mut PaletteEntry> {
        self.entries.iter_mut().find(|e| e.glyphs == *palette)
    }

    /// The palette after `current`, wrapping to the first.
    ///
    /// Unregistered input yields the first palette.
    #[must_use]
    pub fn next(&self, current: &Palette) -> Palette {
        let index = match self.position(current) {
            Some(i) => (i + 1) % self.entries.len(),
            None => 0,
        };
        self.entries[index].glyphs.clone()
    }

    /// The palette before `current`, wrapping to the last.
    ///
    /// Unregistered input yields the last palette.
    #[must_use]
    pub fn previous(&self, current: &Palette) -> Palette {
        let count = self.entries.len();
        let index = match self.position(current) {
            Some(i) => (i + count - 1) % count,
            None => count - 1,
        };
        self.entries[index].glyphs.clone()
    }

    /// The display name of a palette, or an empty string if unregistered.
    #[must_use]
    pub fn display_name(&self, palette: &Palette) -> String {
        self.position(palette)
            .map(|i| self.entries[i].name.clone())
            .unwrap_or_default()
    }

    /// Rename whichever registered palette equals `palette`.
    ///
    /// A name already held by another palette is refused.
    pub fn rename(&mut self, palette: &Palette, name: impl Into<String>) {
        let name = name.into();
        if self
            .entries
            .iter()
            .any(|e| e.name == name && e.glyphs != *palette)
        {
            tracing::warn!("A palette named {name:?} already exists; not renaming");
            return;
        }
        if let Some(entry) = self.entry_mut(palette) {
            entry.name = name;
        }
    }

    /// Append a glyph unless already present and return the updated palette.
    ///
    /// A registered palette is left as is when the result would equal
    /// another registered palette.
    pub fn add_glyph(&mut self, glyph: &str, palette: &Palette) -> Palette {
        let mut updated = palette.clone();
        updated.push(glyph.to_string());
        self.replace(palette, updated)
    }

    /// Remove every occurrence of a glyph and return the updated palette.
    ///
    /// A registered palette is left as is when the result would equal
    /// another registered palette.
    pub fn remove_glyph(&mut self, glyph: &str, palette: &Palette) -> Palette {
        let mut updated = palette.clone();
        updated.0.retain(|g| g != glyph);
        self.replace(palette, updated)
    }

    fn replace(&mut self, old: &Palette, new: Palette) -> Palette {
        let Some(index) = self.position(old) else {
            tracing::debug!("Palette {old} is not registered; registry unchanged");
            return new;
        };
        let collides = self
            .entries
            .iter()
            .enumerate()
            .any(|(i, e)| i != index && e.glyphs == new);
        if collides {
            tracing::warn!(
                "Palette {:?} would duplicate another palette; left unchanged",
                self.entries[index].name
            );
            return old.clone();
        }
        self.entries[index].glyphs = new.clone();
        new
    }

    /// Register a new palette at the end of the order.
    ///
    /// # Errors
    ///
    /// Returns [`ArtError::InvalidOperation`] if the name or the glyph
    /// sequence is already registered.
    pub fn add_palette(&mut self, name: impl Into<String>, palette: Palette) -> ArtResult<()> {
        let name = name.into();
        if self.entries.iter().any(|e| e.name == name) {
            return Err(ArtError::InvalidOperation(format!(
                "a palette named {name:?} already exists"
            )));
        }
        if let Some(existing) = self.entries.iter().find(|e| e.glyphs == palette) {
            return Err(ArtError::InvalidOperation(format!(
                "palette {:?} already holds {palette}",
                existing.name
            )));
        }
        self.entries.push(PaletteEntry {
            name,
            glyphs: palette,
        });
        Ok(())
    }

    /// Unregister the first palette with the given display name.
    ///
    /// # Errors
    ///
    /// Returns [`ArtError::InvalidOperation`] if no palette has that name or
    /// if it is the last remaining palette.
    pub fn remove_palette(&mut self, name: &str) -> ArtResult<Palette> {
        let index = self
            .entries
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| ArtError::InvalidOperation(format!("no palette named {name:?}")))?;
        if self.entries.len() == 1 {
            return Err(ArtError::InvalidOperation(
                "cannot remove the last palette".to_string(),
            ));
        }
        Ok(self.entries.remove(index).glyphs)
    }

    /// Encode the registry to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> ArtResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(ArtError::Serialization)
    }

    /// Decode a registry, returning `None` for malformed or empty input.
    ///
    /// Repeated glyphs within a palette are dropped, as are palettes whose
    /// name or glyphs repeat an earlier one.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let stored = match serde_json::from_slice::<Self>(bytes) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Discarding persisted palette registry: {e}");
                return None;
            }
        };

        let mut registry = Self {
            entries: Vec::with_capacity(stored.entries.len()),
        };
        for entry in stored.entries {
            let glyphs = Palette::from_glyphs(entry.glyphs.0);
            if let Err(e) = registry.add_palette(entry.name, glyphs) {
                tracing::warn!("Dropping persisted palette: {e}");
            }
        }
        if registry.entries.is_empty() {
            tracing::warn!("Discarding persisted palette registry with no palettes");
            return None;
        }
        Some(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PaletteRegistry {
        PaletteRegistry::with_palettes([
            ("One", Palette::from_glyphs(["🍎", "🍐"])),
            ("Two", Palette::from_glyphs(["🐶"])),
            ("Three", Palette::from_glyphs(["😀", "😅"])),
        ])
        .expect("non-empty")
    }

    #[test]
    fn test_from_glyphs_dedups() {
        let palette = Palette::from_glyphs(["🍎", "🍐", "🍎"]);
        assert_eq!(palette.len(), 2);
        assert_eq!(palette.to_string(), "🍎🍐");
    }

    #[test]
    fn test_next_cycles() {
        let registry = registry();
        let start = registry.default_palette();
        let mut current = start.clone();
        for _ in 0..registry.len() {
            current = registry.next(&current);
        }
        assert_eq!(current, start);
    }

    #[test]
    fn test_previous_wraps() {
        let registry = registry();
        let first = registry.default_palette();
        let last = registry.previous(&first);
        assert_eq!(registry.display_name(&last), "Three");
        assert_eq!(registry.next(&last), first);
    }

    #[test]
    fn test_unregistered_falls_back() {
        let registry = registry();
        let stranger = Palette::from_glyphs(["🚀"]);
        assert_eq!(registry.display_name(&registry.next(&stranger)), "One");
        assert_eq!(registry.display_name(&registry.previous(&stranger)), "Three");
        assert_eq!(registry.display_name(&stranger), "");
    }

    #[test]
    fn test_named() {
        let registry = registry();
        assert_eq!(registry.named("Two"), Some(&Palette::from_glyphs(["🐶"])));
        assert!(registry.named("Four").is_none());
    }

    #[test]
    fn test_rename() {
        let mut registry = registry();
        let first = registry.default_palette();
        registry.rename(&first, "Fruit");
        assert_eq!(registry.display_name(&first), "Fruit");
    }

    #[test]
    fn test_add_glyph() {
        let mut registry = registry();
        let first = registry.default_palette();
        let updated = registry.add_glyph("🍊", &first);
        assert_eq!(updated.to_string(), "🍎🍐🍊");
        assert_eq!(registry.display_name(&updated), "One");

        let unchanged = registry.add_glyph("🍎", &updated);
        assert_eq!(unchanged, updated);
    }

    #[test]
    fn test_remove_glyph_can_empty() {
        let mut registry = registry();
        let two = registry.next(&registry.default_palette());
        let emptied = registry.remove_glyph("🐶", &two);
        assert!(emptied.is_empty());
        assert_eq!(registry.display_name(&emptied), "Two");
        assert_eq!(registry.next(&emptied), registry.previous(&registry.default_palette()));
    }

    #[test]
    fn test_emptying_two_palettes_keeps_cycling() {
        let mut registry = PaletteRegistry::with_palettes([
            ("One", Palette::from_glyphs(["x"])),
            ("Two", Palette::from_glyphs(["y"])),
            ("Three", Palette::from_glyphs(["z"])),
        ])
        .expect("non-empty");
        let one = registry.named("One").cloned().expect("one");
        let two = registry.named("Two").cloned().expect("two");
        assert!(registry.remove_glyph("x", &one).is_empty());

        // Emptying Two as well would make it indistinguishable from One
        assert_eq!(registry.remove_glyph("y", &two), two);

        let mut current = Palette::from_glyphs(["z"]);
        let mut visited = Vec::new();
        for _ in 0..3 {
            current = registry.next(&current);
            visited.push(registry.display_name(&current));
        }
        assert_eq!(visited, ["One", "Two", "Three"]);
    }

    #[test]
    fn test_add_glyph_refuses_duplicate_palette() {
        let mut registry = PaletteRegistry::with_palettes([
            ("One", Palette::from_glyphs(["a", "b"])),
            ("Two", Palette::from_glyphs(["a"])),
        ])
        .expect("non-empty");
        let two = registry.named("Two").cloned().expect("two");
        assert_eq!(registry.add_glyph("b", &two), two);
        assert_eq!(registry.named("Two"), Some(&two));
    }

    #[test]
    fn test_add_palette_rejects_duplicates() {
        let mut registry = registry();
        assert!(registry
            .add_palette("One", Palette::from_glyphs(["🚀"]))
            .is_err());
        assert!(registry
            .add_palette("Pets", Palette::from_glyphs(["🐶"]))
            .is_err());
        assert_eq!(registry.len(), 3);
        assert!(PaletteRegistry::with_palettes([
            ("A", Palette::from_glyphs(["🐶"])),
            ("B", Palette::from_glyphs(["🐶"])),
        ])
        .is_err());
    }

    #[test]
    fn test_rename_refuses_taken_name() {
        let mut registry = registry();
        let first = registry.default_palette();
        registry.rename(&first, "Two");
        assert_eq!(registry.display_name(&first), "One");
    }

    #[test]
    fn test_decode_repairs_duplicates() {
        let json = br#"{"entries":[
            {"name":"A","glyphs":["a","a","b"]},
            {"name":"B","glyphs":["b","a"]},
            {"name":"A","glyphs":["c"]},
            {"name":"C","glyphs":["a","b"]}
        ]}"#;
        let registry = PaletteRegistry::decode(json).expect("decode");
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.named("A"), Some(&Palette::from_glyphs(["a", "b"])));
        assert_eq!(registry.named("B"), Some(&Palette::from_glyphs(["b", "a"])));
        assert!(registry.named("C").is_none());
    }

    #[test]
    fn test_remove_palette_keeps_one() {
        let mut registry =
            PaletteRegistry::with_palettes([("Solo", Palette::from_glyphs(["🐶"]))]).expect("ok");
        assert!(registry.remove_palette("Solo").is_err());
        registry
            .add_palette("Duo", Palette::from_glyphs(["🐱"]))
            .expect("add");
        assert!(registry.remove_palette("Solo").is_ok());
        assert_eq!(registry.len(), 1);
        assert!(registry.remove_palette("Missing").is_err());
    }

    #[test]
    fn test_empty_registry_rejected() {
        let empty: Vec<(String, Palette)> = Vec::new();
        assert!(PaletteRegistry::with_palettes(empty).is_err());
        assert!(PaletteRegistry::decode(br#"{"entries":[]}"#).is_none());
    }

    #[test]
    fn test_encode_decode() {
        let registry = PaletteRegistry::default();
        let bytes = registry.encode().expect("encode");
        assert_eq!(PaletteRegistry::decode(&bytes), Some(registry));
    }
}
