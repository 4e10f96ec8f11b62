//! # EmojiArt Host
//!
//! Headless host for EmojiArt documents: opens a document from a data
//! directory, applies one command and autosaves.
//!
//! ## Usage
//!
//! ```bash
//! emojiart new
//! emojiart list
//! emojiart --document <uuid> add 🍎 420 310
//! emojiart --document <uuid> background https://example.com/park.jpg
//! emojiart --document <uuid> show
//! ```
//!
//! ## Architecture
//!
//! - `CliArgs` - Command-line arguments parsed with clap
//! - `HostConfig` - Data directory, canvas size and fetch timeout
//! - `HttpFetcher` - `http(s)` and `file` background fetching
//! - `commands::run` - Applies a `Command` to a `CanvasController`

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]

pub mod commands;
mod fetch;

pub use fetch::{FetchError, HttpFetcher};

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use emojiart_core::Size;
use uuid::Uuid;

/// Command-line arguments for emojiart.
#[derive(Debug, Clone, Parser)]
#[command(name = "emojiart")]
#[command(about = "Compose emoji art over background images")]
#[command(version)]
pub struct CliArgs {
    /// Directory holding documents and palettes
    #[arg(long, env = "EMOJIART_DATA_DIR", default_value = "emojiart-data")]
    pub data_dir: PathBuf,

    /// Document to operate on
    #[arg(long, env = "EMOJIART_DOCUMENT")]
    pub document: Option<Uuid>,

    /// Canvas width in screen units
    #[arg(long, default_value = "800")]
    pub width: f64,

    /// Canvas height in screen units
    #[arg(long, default_value = "600")]
    pub height: f64,

    /// Seconds to wait for a background image
    #[arg(long, env = "EMOJIART_FETCH_TIMEOUT", default_value = "30")]
    pub fetch_timeout_secs: u64,

    /// What to do
    #[command(subcommand)]
    pub command: Command,
}

/// Commands understood by the host.
#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Create an empty document and print its identifier
    New,
    /// List stored documents
    List,
    /// Print the document with effective screen positions
    Show,
    /// Drop a glyph at a screen position
    #[command(allow_negative_numbers = true)]
    Add {
        /// Glyph to place
        glyph: String,
        /// Screen x
        x: f64,
        /// Screen y
        y: f64,
        /// Font size (defaults to 40)
        #[arg(long)]
        size: Option<f64>,
    },
    /// Move an emoji by document-space deltas
    #[command(allow_negative_numbers = true)]
    Move {
        /// Emoji identifier
        id: u64,
        /// Horizontal delta
        dx: i32,
        /// Vertical delta
        dy: i32,
    },
    /// Scale an emoji's size
    #[command(allow_negative_numbers = true)]
    Scale {
        /// Emoji identifier
        id: u64,
        /// Scale factor
        factor: f64,
    },
    /// Rotate an emoji
    #[command(allow_negative_numbers = true)]
    Rotate {
        /// Emoji identifier
        id: u64,
        /// Rotation in degrees
        degrees: f64,
    },
    /// Remove an emoji
    Remove {
        /// Emoji identifier
        id: u64,
    },
    /// Set (or clear, when omitted) the background and wait for it to load
    Background {
        /// URL or file path of the image
        reference: Option<String>,
    },
    /// List palettes
    Palettes,
    /// Add a glyph to a palette
    PaletteAdd {
        /// Palette name
        palette: String,
        /// Glyph to add
        glyph: String,
    },
    /// Remove a glyph from a palette
    PaletteRemove {
        /// Palette name
        palette: String,
        /// Glyph to remove
        glyph: String,
    },
    /// Rename a palette
    PaletteRename {
        /// Current palette name
        palette: String,
        /// New name
        name: String,
    },
}

/// Host configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Directory holding documents and palettes.
    pub data_dir: PathBuf,
    /// Document to operate on.
    pub document: Option<Uuid>,
    /// Canvas size in screen units.
    pub canvas_size: Size,
    /// How long to wait for a background image.
    pub fetch_timeout: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl HostConfig {
    /// Create a host configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data_dir: PathBuf::from("emojiart-data"),
            document: None,
            canvas_size: Size::new(800.0, 600.0),
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&CliArgs> for HostConfig {
    fn from(args: &CliArgs) -> Self {
        Self {
            data_dir: args.data_dir.clone(),
            document: args.document,
            canvas_size: Size::new(args.width, args.height),
            fetch_timeout: Duration::from_secs(args.fetch_timeout_secs),
        }
    }
}
