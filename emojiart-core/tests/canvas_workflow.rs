//! Canvas Workflow Integration Tests
//!
//! Drives the controller the way a presentation layer would:
//! - Drop glyphs, select, pinch, rotate and drag them
//! - Swap backgrounds while fetches are in flight
//! - Persist to disk and reopen

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use emojiart_core::{
    ArtError, ArtResult, BackgroundImage, BackgroundLoader, CanvasController, ControllerConfig,
    FileStore, Gesture, GesturePhase, ImageDecoder, ImageFetcher, LoadOutcome, LoaderState,
    Point, Size, Vector,
};
use uuid::Uuid;

/// Serves "WxH" references as images of that size after a per-reference delay.
struct DimensionFetcher;

#[async_trait]
impl ImageFetcher for DimensionFetcher {
    async fn fetch(&self, reference: &str) -> ArtResult<Vec<u8>> {
        let name = reference.rsplit('/').next().unwrap_or(reference);
        if name.starts_with("slow-") {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        let dims = name.trim_start_matches("slow-");
        let (w, h) = dims
            .split_once('x')
            .ok_or_else(|| ArtError::ResourceLoad(format!("no dimensions in {reference}")))?;
        Ok(format!("{w} {h}").into_bytes())
    }
}

struct DimensionDecoder;

impl ImageDecoder for DimensionDecoder {
    fn decode(&self, bytes: &[u8]) -> ArtResult<BackgroundImage> {
        let text = std::str::from_utf8(bytes).map_err(|e| ArtError::Decode(e.to_string()))?;
        let mut parts = text.split(' ').map(str::parse::<u32>);
        match (parts.next(), parts.next()) {
            (Some(Ok(w)), Some(Ok(h))) => Ok(BackgroundImage::new(w, h, Vec::new())),
            _ => Err(ArtError::Decode(format!("bad dimensions {text:?}"))),
        }
    }
}

fn loader() -> BackgroundLoader {
    BackgroundLoader::new(Arc::new(DimensionFetcher), Arc::new(DimensionDecoder))
}

fn config() -> ControllerConfig {
    ControllerConfig {
        canvas_size: Size::new(400.0, 400.0),
        ..ControllerConfig::default()
    }
}

// ============================================================================
// Gesture Workflow Tests
// ============================================================================

#[test]
fn test_select_pinch_rotate_drag() {
    let mut canvas = CanvasController::new(loader(), config());
    let apple = canvas.add_emoji_at("🍎", Point::new(220.0, 180.0), None);
    let pear = canvas.add_emoji_at("🍐", Point::new(100.0, 300.0), Some(20.0));

    assert_eq!(canvas.document().emoji(apple).map(|e| (e.x, e.y)), Some((20, -20)));

    canvas.handle_gesture(&Gesture::Tap {
        target: Some(apple),
    });

    canvas.handle_gesture(&Gesture::Pinch {
        phase: GesturePhase::Update,
        scale: 1.5,
    });
    canvas.handle_gesture(&Gesture::Rotate {
        phase: GesturePhase::Update,
        angle: 0.5,
    });
    let views = canvas.emoji_views();
    assert!(views[0].selected);
    assert!((views[0].transform.font_size - 60.0).abs() < 1e-9);
    assert!((views[1].transform.font_size - 20.0).abs() < 1e-9);
    assert!(views[1].transform.rotation.abs() < f64::EPSILON);

    canvas.handle_gesture(&Gesture::Pinch {
        phase: GesturePhase::End,
        scale: 1.5,
    });
    canvas.handle_gesture(&Gesture::Rotate {
        phase: GesturePhase::End,
        angle: 0.5,
    });
    canvas.handle_gesture(&Gesture::DragEmoji {
        id: apple,
        phase: GesturePhase::Update,
        translation: Vector::new(5.0, 5.0),
    });
    canvas.handle_gesture(&Gesture::DragEmoji {
        id: apple,
        phase: GesturePhase::End,
        translation: Vector::new(10.0, 0.0),
    });

    let apple_now = canvas.document().emoji(apple).expect("apple");
    assert_eq!(apple_now.size, 60);
    assert!((apple_now.rotation - 0.5).abs() < 1e-12);
    assert_eq!((apple_now.x, apple_now.y), (30, -20));

    let pear_now = canvas.document().emoji(pear).expect("pear");
    assert_eq!((pear_now.size, pear_now.x, pear_now.y), (20, -100, 100));
    assert!(!canvas.live_gesture().is_active());
}

#[test]
fn test_canvas_pinch_then_pan() {
    let mut canvas = CanvasController::new(loader(), config());
    let star = canvas.add_emoji("⭐️", 10, 10, 40);

    canvas.handle_gesture(&Gesture::Pinch {
        phase: GesturePhase::End,
        scale: 2.0,
    });
    canvas.handle_gesture(&Gesture::Pan {
        phase: GesturePhase::End,
        translation: Vector::new(-40.0, 20.0),
    });

    let t = canvas.effective_transform(star).expect("star");
    assert!((t.zoom - 2.0).abs() < f64::EPSILON);
    // 10 * 2 + 200 - 40 and 10 * 2 + 200 + 20
    assert_eq!(t.position, Point::new(180.0, 240.0));
    assert_eq!(canvas.screen_to_document(t.position), Point::new(10.0, 10.0));
}

// ============================================================================
// Background Tests
// ============================================================================

#[tokio::test]
async fn test_superseded_background_is_never_applied() {
    let mut canvas = CanvasController::new(loader(), config());

    canvas.set_background_reference(Some("https://img.example/slow-800x800"));
    canvas.set_background_reference(Some("https://img.example/200x100"));

    let outcome = canvas.next_background_outcome().await;
    let Some(LoadOutcome::Loaded(image)) = outcome else {
        panic!("expected the second background, got {outcome:?}");
    };
    assert_eq!((image.width(), image.height()), (200, 100));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(canvas.pump().is_none());
    assert_eq!(canvas.background_image().map(BackgroundImage::width), Some(200));
    assert!((canvas.steady_view().zoom - 2.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_double_tap_refits() {
    let mut canvas = CanvasController::new(loader(), config());
    canvas.set_background_reference(Some("https://img.example/100x200"));
    canvas.next_background_outcome().await;
    assert!((canvas.steady_view().zoom - 2.0).abs() < f64::EPSILON);

    canvas.handle_gesture(&Gesture::Pinch {
        phase: GesturePhase::End,
        scale: 3.0,
    });
    canvas.handle_gesture(&Gesture::Pan {
        phase: GesturePhase::End,
        translation: Vector::new(12.0, 12.0),
    });
    canvas.handle_gesture(&Gesture::DoubleTap);

    assert!((canvas.steady_view().zoom - 2.0).abs() < f64::EPSILON);
    assert_eq!(canvas.steady_view().pan, Vector::ZERO);
}

#[tokio::test]
async fn test_failed_background_then_retry() {
    let mut canvas = CanvasController::new(loader(), config());
    canvas.set_background_reference(Some("https://img.example/broken"));
    assert_eq!(canvas.next_background_outcome().await, Some(LoadOutcome::Failed));
    assert_eq!(canvas.loader_state(), LoaderState::Failed);

    canvas.set_background_reference(Some("https://img.example/50x50"));
    assert!(matches!(
        canvas.next_background_outcome().await,
        Some(LoadOutcome::Loaded(_))
    ));
    assert_eq!(canvas.loader_state(), LoaderState::Loaded);
}

// ============================================================================
// Persistence Tests
// ============================================================================

#[tokio::test]
async fn test_reopen_from_disk_refetches_background() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(FileStore::new(dir.path()).expect("store"));
    let id = Uuid::new_v4();

    {
        let mut canvas = CanvasController::open(id, store.clone(), loader(), config());
        canvas.add_emoji("🌍", -5, 5, 30);
        canvas.set_background_reference(Some("https://img.example/400x400"));
    }

    let mut reopened = CanvasController::open(id, store, loader(), config());
    assert_eq!(reopened.document().len(), 1);
    assert!(reopened.is_loading());
    assert!(matches!(
        reopened.next_background_outcome().await,
        Some(LoadOutcome::Loaded(_))
    ));
    assert!((reopened.steady_view().zoom - 1.0).abs() < f64::EPSILON);

    let next = reopened.add_emoji("🍎", 0, 0, 40);
    assert_eq!(next.get(), 2);
}
