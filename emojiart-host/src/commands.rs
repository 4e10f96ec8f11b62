//! Applies one [`Command`] to a document held in the data directory.
//!
//! Commands open a [`CanvasController`] over a [`FileStore`], so document
//! and palette changes are autosaved by the controller itself. Only `show`
//! fetches the stored background; `background` fetches the new one.

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use emojiart_core::{
    document_id, document_key, BackgroundLoader, CanvasController, ControllerConfig, Document,
    EmojiId, FileStore, KeyValueStore, LoadOutcome, LoaderState, Palette, Point,
};
use uuid::Uuid;

use crate::{Command, HostConfig, HttpFetcher};

/// Run `command` and return what should be printed.
///
/// # Errors
///
/// Returns an error if the data directory is unusable, a document is
/// required but none was given, or the command names an unknown emoji or
/// palette.
pub async fn run(config: &HostConfig, command: Command) -> Result<String> {
    let files = Arc::new(
        FileStore::new(&config.data_dir)
            .with_context(|| format!("opening data directory {}", config.data_dir.display()))?,
    );
    let store: Arc<dyn KeyValueStore> = files.clone();

    match command {
        Command::New => create_document(store.as_ref()),
        Command::List => list_documents(&files),
        Command::Show => {
            let id = require_document(config)?;
            let mut controller = open_with_background(config, store, id)?;
            settle_background(&mut controller, config).await;
            render(&controller)
        }
        Command::Add { glyph, x, y, size } => {
            let mut controller = open(config, store, require_document(config)?)?;
            let id = controller.add_emoji_at(&glyph, Point::new(x, y), size);
            Ok(format!("added #{id}"))
        }
        Command::Move { id, dx, dy } => {
            let mut controller = open(config, store, require_document(config)?)?;
            let id = existing_emoji(&controller, id)?;
            controller.move_emoji(id, dx, dy);
            Ok(describe_emoji(&controller, id))
        }
        Command::Scale { id, factor } => {
            let mut controller = open(config, store, require_document(config)?)?;
            let id = existing_emoji(&controller, id)?;
            controller.scale_emoji(id, factor);
            Ok(describe_emoji(&controller, id))
        }
        Command::Rotate { id, degrees } => {
            let mut controller = open(config, store, require_document(config)?)?;
            let id = existing_emoji(&controller, id)?;
            controller.rotate_emoji(id, degrees.to_radians());
            Ok(describe_emoji(&controller, id))
        }
        Command::Remove { id } => {
            let mut controller = open(config, store, require_document(config)?)?;
            let id = existing_emoji(&controller, id)?;
            controller.remove_emoji(id);
            Ok(format!("removed #{id}"))
        }
        Command::Background { reference } => {
            let mut controller = open(config, store, require_document(config)?)?;
            controller.set_background_reference(reference.as_deref());
            settle_background(&mut controller, config).await;
            Ok(describe_background(&controller))
        }
        Command::Palettes => {
            let controller = open(config, store, config.document.unwrap_or(Uuid::nil()))?;
            list_palettes(&controller)
        }
        Command::PaletteAdd { palette, glyph } => {
            let mut controller = open_palette(config, store, &palette)?;
            let updated = controller.add_glyph_to_palette(&glyph);
            Ok(format!("{palette}: {updated}"))
        }
        Command::PaletteRemove { palette, glyph } => {
            let mut controller = open_palette(config, store, &palette)?;
            let updated = controller.remove_glyph_from_palette(&glyph);
            Ok(format!("{palette}: {updated}"))
        }
        Command::PaletteRename { palette, name } => {
            let mut controller = open_palette(config, store, &palette)?;
            controller.rename_palette(&name);
            Ok(format!("{palette} -> {name}"))
        }
    }
}

fn create_document(store: &dyn KeyValueStore) -> Result<String> {
    let id = Uuid::new_v4();
    store.set(&document_key(id), &Document::new().encode()?)?;
    tracing::info!("Created document {id}");
    Ok(id.to_string())
}

fn list_documents(store: &FileStore) -> Result<String> {
    let mut out = String::new();
    for key in store.keys()? {
        let Some(id) = document_id(&key) else {
            continue;
        };
        let document = store
            .get(&key)?
            .and_then(|bytes| Document::decode(&bytes))
            .unwrap_or_default();
        write!(out, "{id} ({} emoji)", document.len())?;
        if let Some(background) = document.background() {
            write!(out, " {background}")?;
        }
        out.push('\n');
    }
    Ok(out.trim_end().to_string())
}

fn require_document(config: &HostConfig) -> Result<Uuid> {
    config
        .document
        .context("no document given; pass --document or set EMOJIART_DOCUMENT")
}

/// Open a controller without fetching the stored background.
fn open(config: &HostConfig, store: Arc<dyn KeyValueStore>, id: Uuid) -> Result<CanvasController> {
    open_controller(config, store, id, false)
}

fn open_with_background(
    config: &HostConfig,
    store: Arc<dyn KeyValueStore>,
    id: Uuid,
) -> Result<CanvasController> {
    open_controller(config, store, id, true)
}

fn open_controller(
    config: &HostConfig,
    store: Arc<dyn KeyValueStore>,
    id: Uuid,
    load_background_on_open: bool,
) -> Result<CanvasController> {
    let fetcher = HttpFetcher::new(config.fetch_timeout)?;
    let loader = BackgroundLoader::with_raster_decoder(Arc::new(fetcher));
    let controller_config = ControllerConfig {
        canvas_size: config.canvas_size,
        load_background_on_open,
        ..ControllerConfig::default()
    };
    Ok(CanvasController::open(id, store, loader, controller_config))
}

/// Open a controller with the palette called `name` chosen.
fn open_palette(
    config: &HostConfig,
    store: Arc<dyn KeyValueStore>,
    name: &str,
) -> Result<CanvasController> {
    let mut controller = open(config, store, config.document.unwrap_or(Uuid::nil()))?;
    if !controller.choose_palette(name) {
        bail!("no palette named {name:?}");
    }
    Ok(controller)
}

fn existing_emoji(controller: &CanvasController, raw: u64) -> Result<EmojiId> {
    let id = EmojiId::from_raw(raw);
    if controller.document().emoji(id).is_none() {
        bail!("document {} has no emoji #{raw}", controller.id());
    }
    Ok(id)
}

/// Wait for an in-flight background, bounded by the fetch timeout.
async fn settle_background(controller: &mut CanvasController, config: &HostConfig) {
    if controller.loader_state() != LoaderState::Fetching {
        return;
    }
    match tokio::time::timeout(config.fetch_timeout, controller.next_background_outcome()).await {
        Ok(Some(LoadOutcome::Loaded(image))) => {
            tracing::info!("Background loaded ({}x{})", image.width(), image.height());
        }
        Ok(Some(LoadOutcome::Failed)) => tracing::warn!("Background failed to load"),
        Ok(None) => {}
        Err(_) => tracing::warn!(
            "Gave up waiting for background after {:?}",
            config.fetch_timeout
        ),
    }
}

fn describe_background(controller: &CanvasController) -> String {
    let Some(reference) = controller.document().background() else {
        return "background: none".to_string();
    };
    let status = match (controller.background_image(), controller.loader_state()) {
        (Some(image), _) => format!("{}x{}", image.width(), image.height()),
        (None, LoaderState::Failed) => "failed".to_string(),
        (None, _) => "loading".to_string(),
    };
    format!("background: {reference} ({status})")
}

fn describe_emoji(controller: &CanvasController, id: EmojiId) -> String {
    let Some(emoji) = controller.document().emoji(id) else {
        return format!("#{id} removed");
    };
    format!(
        "#{id} {} at ({}, {}) size {} rotation {:.1}°",
        emoji.text(),
        emoji.x,
        emoji.y,
        emoji.size,
        emoji.rotation.to_degrees()
    )
}

fn render(controller: &CanvasController) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "document {}", controller.id())?;
    writeln!(out, "{}", describe_background(controller))?;
    let pan = controller.steady_view().pan;
    writeln!(
        out,
        "zoom {:.3} pan ({:.1}, {:.1})",
        controller.canvas_zoom(),
        pan.dx,
        pan.dy
    )?;
    for view in controller.emoji_views() {
        let t = view.transform;
        writeln!(
            out,
            "{} -> screen ({:.1}, {:.1}) font {:.1}",
            describe_emoji(controller, view.emoji.id()),
            t.position.x,
            t.position.y,
            t.font_size
        )?;
    }
    Ok(out.trim_end().to_string())
}

fn list_palettes(controller: &CanvasController) -> Result<String> {
    let registry = controller.palettes();
    let chosen: &Palette = controller.chosen_palette();
    let mut out = String::new();
    for palette in registry.palettes() {
        let marker = if palette == chosen { '*' } else { ' ' };
        writeln!(out, "{marker} {}: {palette}", registry.display_name(palette))?;
    }
    Ok(out.trim_end().to_string())
}
