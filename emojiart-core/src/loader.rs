//! Asynchronous background image loading with supersede-and-cancel.
//!
//! ```text
//! request(Some) ──► Fetching ──► Loaded | Failed
//!      ▲                │
//!      └── request(..) ─┘   (previous fetch aborted, result ignored)
//! request(None) ──► Idle
//! ```
//!
//! Fetches run on tokio tasks and post their completion into a
//! single-consumer queue. Nothing is applied until the owner drains the
//! queue with [`BackgroundLoader::try_next`] or
//! [`BackgroundLoader::next_outcome`], so completions are always handled on
//! the owner's context.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::event::Size;
use crate::{ArtError, ArtResult};

/// A decoded background image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundImage {
    width: u32,
    height: u32,
    /// RGBA pixel data (4 bytes per pixel).
    pixels: Arc<[u8]>,
}

impl BackgroundImage {
    /// Wrap decoded RGBA pixels.
    #[must_use]
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels: pixels.into(),
        }
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Intrinsic size.
    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }

    /// RGBA pixel data.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Fetches raw image bytes for a background reference.
#[async_trait]
pub trait ImageFetcher: Send + Sync + 'static {
    /// Fetch the bytes behind `reference`.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource cannot be retrieved.
    async fn fetch(&self, reference: &str) -> ArtResult<Vec<u8>>;
}

/// Turns fetched bytes into a renderable image.
pub trait ImageDecoder: Send + Sync + 'static {
    /// Decode image bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a supported image.
    fn decode(&self, bytes: &[u8]) -> ArtResult<BackgroundImage>;
}

/// Decoder for common raster formats backed by the `image` crate.
#[cfg(feature = "images")]
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterDecoder;

#[cfg(feature = "images")]
impl ImageDecoder for RasterDecoder {
    fn decode(&self, bytes: &[u8]) -> ArtResult<BackgroundImage> {
        let img = image::load_from_memory(bytes).map_err(|e| ArtError::Decode(e.to_string()))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(BackgroundImage::new(width, height, rgba.into_raw()))
    }
}

/// Loader state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    /// No background requested.
    Idle,
    /// Waiting for the current request.
    Fetching,
    /// The current request produced an image.
    Loaded,
    /// The current request failed.
    Failed,
}

/// Reported once per request that was not superseded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The background is ready.
    Loaded(BackgroundImage),
    /// Fetching or decoding failed.
    Failed,
}

#[derive(Debug)]
struct FetchCompletion {
    generation: u64,
    reference: String,
    result: ArtResult<BackgroundImage>,
}

/// Background image loader.
pub struct BackgroundLoader {
    fetcher: Arc<dyn ImageFetcher>,
    decoder: Arc<dyn ImageDecoder>,
    state: LoaderState,
    current: Option<String>,
    generation: u64,
    in_flight: Option<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<FetchCompletion>,
    rx: mpsc::UnboundedReceiver<FetchCompletion>,
}

impl std::fmt::Debug for BackgroundLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundLoader")
            .field("state", &self.state)
            .field("current", &self.current)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl BackgroundLoader {
    /// Create an idle loader.
    pub fn new(fetcher: Arc<dyn ImageFetcher>, decoder: Arc<dyn ImageDecoder>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            fetcher,
            decoder,
            state: LoaderState::Idle,
            current: None,
            generation: 0,
            in_flight: None,
            tx,
            rx,
        }
    }

    /// Create an idle loader that decodes with [`RasterDecoder`].
    #[cfg(feature = "images")]
    pub fn with_raster_decoder(fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self::new(fetcher, Arc::new(RasterDecoder))
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> LoaderState {
        self.state
    }

    /// The most recently requested reference.
    #[must_use]
    pub fn current_reference(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Request a new background, superseding any fetch in flight.
    ///
    /// Must be called from within a tokio runtime to actually fetch; without
    /// one the request fails and reports [`LoadOutcome::Failed`].
    pub fn request(&mut self, reference: Option<String>) {
        self.generation += 1;
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
        self.current.clone_from(&reference);

        let Some(reference) = reference else {
            self.state = LoaderState::Idle;
            return;
        };

        self.state = LoaderState::Fetching;
        tracing::info!("Fetching background {reference}");

        let generation = self.generation;
        let tx = self.tx.clone();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            let _ = tx.send(FetchCompletion {
                generation,
                reference,
                result: Err(ArtError::ResourceLoad("no async runtime available".to_string())),
            });
            return;
        };

        let fetcher = Arc::clone(&self.fetcher);
        let decoder = Arc::clone(&self.decoder);
        self.in_flight = Some(runtime.spawn(async move {
            let result = match fetcher.fetch(&reference).await {
                Ok(bytes) => decode_off_runtime(decoder, bytes).await,
                Err(e) => Err(e),
            };
            // The receiver lives as long as the loader; a send error means it is gone.
            let _ = tx.send(FetchCompletion {
                generation,
                reference,
                result,
            });
        }));
    }

    /// Apply every completion already queued, returning the last accepted one.
    pub fn try_next(&mut self) -> Option<LoadOutcome> {
        let mut accepted = None;
        while let Ok(completion) = self.rx.try_recv() {
            if let Some(outcome) = self.accept(completion) {
                accepted = Some(outcome);
            }
        }
        accepted
    }

    /// Wait for the current request to finish.
    ///
    /// Returns `None` immediately when nothing is being fetched. A fetch that
    /// never completes keeps this pending until the future is dropped.
    pub async fn next_outcome(&mut self) -> Option<LoadOutcome> {
        while self.state == LoaderState::Fetching {
            let completion = self.rx.recv().await?;
            if let Some(outcome) = self.accept(completion) {
                return Some(outcome);
            }
        }
        None
    }

    fn accept(&mut self, completion: FetchCompletion) -> Option<LoadOutcome> {
        let is_current = completion.generation == self.generation
            && self.current.as_deref() == Some(completion.reference.as_str())
            && self.state == LoaderState::Fetching;
        if !is_current {
            tracing::debug!(
                "Discarding superseded fetch of {} (generation {})",
                completion.reference,
                completion.generation
            );
            return None;
        }

        self.in_flight = None;
        match completion.result {
            Ok(image) => {
                tracing::info!(
                    "Loaded background {} ({}x{})",
                    completion.reference,
                    image.width(),
                    image.height()
                );
                self.state = LoaderState::Loaded;
                Some(LoadOutcome::Loaded(image))
            }
            Err(e) => {
                tracing::warn!("Failed to load background {}: {e}", completion.reference);
                self.state = LoaderState::Failed;
                Some(LoadOutcome::Failed)
            }
        }
    }
}

/// Decode on the blocking pool, off the runtime worker threads.
async fn decode_off_runtime(
    decoder: Arc<dyn ImageDecoder>,
    bytes: Vec<u8>,
) -> ArtResult<BackgroundImage> {
    tokio::task::spawn_blocking(move || decoder.decode(&bytes))
        .await
        .unwrap_or_else(|e| Err(ArtError::Decode(format!("decoder task failed: {e}"))))
}

impl Drop for BackgroundLoader {
    fn drop(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use tokio::sync::Notify;

    use super::*;

    /// Decoder that treats the first two bytes as width and height.
    pub(crate) struct TinyDecoder;

    impl ImageDecoder for TinyDecoder {
        fn decode(&self, bytes: &[u8]) -> ArtResult<BackgroundImage> {
            match bytes {
                [w, h, ..] => Ok(BackgroundImage::new(u32::from(*w), u32::from(*h), Vec::new())),
                _ => Err(ArtError::Decode("too short".to_string())),
            }
        }
    }

    /// Fetcher serving fixed bytes, optionally held until released.
    #[derive(Default)]
    pub(crate) struct GatedFetcher {
        bytes: Mutex<HashMap<String, Vec<u8>>>,
        gates: Mutex<HashMap<String, Arc<Notify>>>,
    }

    impl GatedFetcher {
        pub(crate) fn serve(&self, reference: &str, bytes: Vec<u8>) {
            self.bytes
                .lock()
                .expect("lock")
                .insert(reference.to_string(), bytes);
        }

        pub(crate) fn gate(&self, reference: &str) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            self.gates
                .lock()
                .expect("lock")
                .insert(reference.to_string(), Arc::clone(&gate));
            gate
        }
    }

    #[async_trait]
    impl ImageFetcher for GatedFetcher {
        async fn fetch(&self, reference: &str) -> ArtResult<Vec<u8>> {
            let gate = self.gates.lock().expect("lock").get(reference).cloned();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            self.bytes
                .lock()
                .expect("lock")
                .get(reference)
                .cloned()
                .ok_or_else(|| ArtError::ResourceLoad(format!("404 {reference}")))
        }
    }

    fn loader(fetcher: &Arc<GatedFetcher>) -> BackgroundLoader {
        let fetcher: Arc<dyn ImageFetcher> = fetcher.clone();
        BackgroundLoader::new(fetcher, Arc::new(TinyDecoder))
    }

    #[tokio::test]
    async fn test_load_success() {
        let fetcher = Arc::new(GatedFetcher::default());
        fetcher.serve("a", vec![20, 10]);
        let mut loader = loader(&fetcher);

        loader.request(Some("a".to_string()));
        assert_eq!(loader.state(), LoaderState::Fetching);

        let outcome = loader.next_outcome().await;
        assert_eq!(
            outcome,
            Some(LoadOutcome::Loaded(BackgroundImage::new(20, 10, Vec::new())))
        );
        assert_eq!(loader.state(), LoaderState::Loaded);
        assert!(loader.next_outcome().await.is_none());
    }

    #[tokio::test]
    async fn test_load_failure() {
        let fetcher = Arc::new(GatedFetcher::default());
        let mut loader = loader(&fetcher);

        loader.request(Some("missing".to_string()));
        assert_eq!(loader.next_outcome().await, Some(LoadOutcome::Failed));
        assert_eq!(loader.state(), LoaderState::Failed);
    }

    /// Records which thread decoding ran on.
    #[derive(Default)]
    struct ThreadRecordingDecoder {
        thread: Mutex<Option<std::thread::ThreadId>>,
    }

    impl ImageDecoder for ThreadRecordingDecoder {
        fn decode(&self, bytes: &[u8]) -> ArtResult<BackgroundImage> {
            *self.thread.lock().expect("lock") = Some(std::thread::current().id());
            TinyDecoder.decode(bytes)
        }
    }

    #[tokio::test]
    async fn test_decode_runs_off_runtime_thread() {
        let fetcher = Arc::new(GatedFetcher::default());
        fetcher.serve("a", vec![4, 4]);
        let decoder = Arc::new(ThreadRecordingDecoder::default());
        let mut loader = BackgroundLoader::new(fetcher, decoder.clone());

        loader.request(Some("a".to_string()));
        assert!(matches!(loader.next_outcome().await, Some(LoadOutcome::Loaded(_))));

        // The current-thread test runtime drives tasks on this thread
        let decoded_on = decoder.thread.lock().expect("lock").expect("decoded");
        assert_ne!(decoded_on, std::thread::current().id());
    }

    #[tokio::test]
    async fn test_decode_failure_reports_failed() {
        let fetcher = Arc::new(GatedFetcher::default());
        fetcher.serve("short", vec![1]);
        let mut loader = loader(&fetcher);

        loader.request(Some("short".to_string()));
        assert_eq!(loader.next_outcome().await, Some(LoadOutcome::Failed));
    }

    #[tokio::test]
    async fn test_superseded_request_never_reports() {
        let fetcher = Arc::new(GatedFetcher::default());
        fetcher.serve("a", vec![1, 1]);
        fetcher.serve("b", vec![2, 2]);
        let gate_a = fetcher.gate("a");
        let mut loader = loader(&fetcher);

        loader.request(Some("a".to_string()));
        loader.request(Some("b".to_string()));
        gate_a.notify_one();

        let outcome = loader.next_outcome().await;
        assert_eq!(
            outcome,
            Some(LoadOutcome::Loaded(BackgroundImage::new(2, 2, Vec::new())))
        );
        tokio::task::yield_now().await;
        assert!(loader.try_next().is_none());
    }

    #[tokio::test]
    async fn test_stale_completion_is_discarded() {
        let fetcher = Arc::new(GatedFetcher::default());
        let gate = fetcher.gate("b");
        let mut loader = loader(&fetcher);

        loader.request(Some("a".to_string()));
        let stale_generation = loader.generation;
        loader.request(Some("b".to_string()));

        let stale = FetchCompletion {
            generation: stale_generation,
            reference: "a".to_string(),
            result: Ok(BackgroundImage::new(1, 1, Vec::new())),
        };
        assert!(loader.accept(stale).is_none());
        assert_eq!(loader.state(), LoaderState::Fetching);
        drop(gate);
    }

    #[tokio::test]
    async fn test_request_none_goes_idle() {
        let fetcher = Arc::new(GatedFetcher::default());
        let _gate = fetcher.gate("a");
        let mut loader = loader(&fetcher);

        loader.request(Some("a".to_string()));
        loader.request(None);
        assert_eq!(loader.state(), LoaderState::Idle);
        assert!(loader.current_reference().is_none());
        assert!(loader.next_outcome().await.is_none());
    }

    #[test]
    fn test_request_without_runtime_fails() {
        let fetcher = Arc::new(GatedFetcher::default());
        let mut loader = loader(&fetcher);

        loader.request(Some("a".to_string()));
        assert_eq!(loader.try_next(), Some(LoadOutcome::Failed));
        assert_eq!(loader.state(), LoaderState::Failed);
    }

    #[cfg(feature = "images")]
    #[test]
    fn test_raster_decoder_rejects_garbage() {
        assert!(matches!(
            RasterDecoder.decode(b"definitely not an image"),
            Err(ArtError::Decode(_))
        ));
    }
}
