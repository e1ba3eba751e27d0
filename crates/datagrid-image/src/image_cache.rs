//! Thumbnail caching with a bounded most-recently-used working set and a
//! background render thread.
//!
//! Every request refreshes the key's position in the MRU deque; when the deque
//! overflows its oldest key falls out, and after each cache insert any cached
//! key that is no longer in the deque is evicted.
//!
//! Requests made with `load_on_thread` return a placeholder at once and queue
//! the key for the worker. The queue is LIFO so that under fast scrolling the
//! most recently requested images are rendered first. Before rendering, the
//! worker checks that the key is still in the working set and drops it
//! otherwise.
//!
//! # Example
//!
//! ```no_run
//! use datagrid_image::{ImageCacheConfig, ImageCacheManager, ImageKey};
//!
//! # fn example() -> datagrid_image::ImageResult<()> {
//! let cache = ImageCacheManager::new(ImageCacheConfig::default())?;
//! cache.image_loaded().connect(|_| println!("redraw"));
//!
//! let key = ImageKey::new("photo.jpg", 24).with_fill(true);
//! let placeholder = cache.get_image(&key, true);
//!
//! // In the UI loop:
//! cache.process_loaded();
//! let thumbnail = cache.get_image(&key, true);
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use datagrid_core::Signal;
use datagrid_core::logging::{span_names, targets};
use parking_lot::{Condvar, Mutex};

use crate::error::{ImageError, ImageResult};
use crate::media::MediaKind;
use crate::render::{ImageKey, ImageRenderer, Thumbnail, ThumbnailRenderer};

/// Configuration for the image cache manager.
#[derive(Debug, Clone)]
pub struct ImageCacheConfig {
    /// Size of the MRU working set, and so the maximum number of cached
    /// thumbnails. Default: 200.
    pub capacity: usize,
    /// Width of the white frame around bordered thumbnails. Default: 6.
    pub border_size: u32,
    /// Blur radius of the drop shadow. Default: 6.
    pub shadow_size: u32,
    /// Offset of the drop shadow. Default: 2.
    pub shadow_offset: u32,
    /// Largest edge length of a placeholder glyph. Default: 48.
    pub fallback_max_size: u32,
    /// Name of the background thread.
    pub thread_name: String,
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 200,
            border_size: 6,
            shadow_size: 6,
            shadow_offset: 2,
            fallback_max_size: 48,
            thread_name: "datagrid-image-cache".to_string(),
        }
    }
}

impl ImageCacheConfig {
    /// Set the working set size. Values below 1 are raised to 1.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_border_size(mut self, border_size: u32) -> Self {
        self.border_size = border_size;
        self
    }

    #[must_use]
    pub fn with_shadow(mut self, size: u32, offset: u32) -> Self {
        self.shadow_size = size;
        self.shadow_offset = offset;
        self
    }

    #[must_use]
    pub fn with_fallback_max_size(mut self, size: u32) -> Self {
        self.fallback_max_size = size;
        self
    }

    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Hit rate in `0.0..=1.0`; zero before the first request.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheState {
    capacity: usize,
    cache: HashMap<ImageKey, Thumbnail>,
    mru: VecDeque<ImageKey>,
    loading: HashSet<ImageKey>,
    queue: Vec<ImageKey>,
    placeholders: HashMap<(MediaKind, ImageKey), Thumbnail>,
    blanks: HashMap<u32, Thumbnail>,
    stats: CacheStats,
    shutdown: bool,
}

impl CacheState {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            cache: HashMap::new(),
            mru: VecDeque::new(),
            loading: HashSet::new(),
            queue: Vec::new(),
            placeholders: HashMap::new(),
            blanks: HashMap::new(),
            stats: CacheStats::default(),
            shutdown: false,
        }
    }

    /// Move `key` to the most recently used end, dropping the oldest key on overflow.
    fn touch(&mut self, key: &ImageKey) {
        if let Some(pos) = self.mru.iter().position(|k| k == key) {
            self.mru.remove(pos);
        }
        self.mru.push_back(key.clone());
        while self.mru.len() > self.capacity {
            self.mru.pop_front();
        }
    }

    fn is_wanted(&self, key: &ImageKey) -> bool {
        self.mru.contains(key)
    }

    fn insert(&mut self, key: ImageKey, thumbnail: Thumbnail) {
        self.loading.remove(&key);
        self.cache.insert(key, thumbnail);
        let wanted: HashSet<&ImageKey> = self.mru.iter().collect();
        self.cache.retain(|k, _| wanted.contains(k));
    }

}

struct Shared {
    state: Mutex<CacheState>,
    work_available: Condvar,
    renderer: Arc<dyn ImageRenderer>,
}

impl Shared {
    /// The placeholder for `key`'s media kind, drawn outside the lock.
    fn placeholder(&self, key: &ImageKey) -> Thumbnail {
        let slot = (key.media_kind(), key.options());
        if let Some(thumbnail) = self.state.lock().placeholders.get(&slot) {
            return thumbnail.clone();
        }
        let drawn = self.renderer.placeholder(slot.0, key);
        self.state.lock().placeholders.entry(slot).or_insert(drawn).clone()
    }
}

/// Thread-safe thumbnail cache with a single background render thread.
///
/// All cache, queue and working-set mutations happen under one mutex. The
/// worker publishes finished keys on a channel; call
/// [`process_loaded`](Self::process_loaded) from the consumer thread to turn
/// them into an [`image_loaded`](Self::image_loaded) notification.
pub struct ImageCacheManager {
    shared: Arc<Shared>,
    completed_rx: Receiver<ImageKey>,
    worker: Option<JoinHandle<()>>,
    image_loaded: Signal<()>,
}

impl ImageCacheManager {
    /// Create a manager using the default [`ThumbnailRenderer`].
    pub fn new(config: ImageCacheConfig) -> ImageResult<Self> {
        let renderer = Arc::new(ThumbnailRenderer::from_config(&config));
        Self::with_renderer(config, renderer)
    }

    /// Create a manager that renders through `renderer`.
    pub fn with_renderer(
        config: ImageCacheConfig,
        renderer: Arc<dyn ImageRenderer>,
    ) -> ImageResult<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(CacheState::new(config.capacity)),
            work_available: Condvar::new(),
            renderer,
        });
        let (completed_tx, completed_rx) = unbounded();

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || worker_loop(worker_shared, completed_tx))
            .map_err(ImageError::Spawn)?;

        tracing::debug!(
            target: targets::IMAGE_CACHE,
            capacity = config.capacity,
            "image cache started"
        );

        Ok(Self {
            shared,
            completed_rx,
            worker: Some(worker),
            image_loaded: Signal::new(),
        })
    }

    /// Get the thumbnail for `key`.
    ///
    /// On a hit the cached bitmap is returned. On a miss the image is rendered
    /// synchronously, or, with `load_on_thread`, queued for the worker while a
    /// placeholder for the file's media kind is returned. A key is queued at
    /// most once while it is loading. Render failures yield the placeholder,
    /// which is then cached for that key.
    pub fn get_image(&self, key: &ImageKey, load_on_thread: bool) -> Thumbnail {
        let mut state = self.shared.state.lock();
        state.touch(key);

        if let Some(thumbnail) = state.cache.get(key).cloned() {
            state.stats.hits += 1;
            return thumbnail;
        }
        state.stats.misses += 1;

        if load_on_thread {
            if state.loading.insert(key.clone()) {
                state.queue.push(key.clone());
                self.shared.work_available.notify_one();
                tracing::trace!(target: targets::IMAGE_CACHE, ?key, "queued");
            }
            drop(state);
            return self.shared.placeholder(key);
        }
        drop(state);

        let thumbnail = match render(&*self.shared.renderer, key) {
            Some(thumbnail) => thumbnail,
            None => self.shared.placeholder(key),
        };
        self.shared.state.lock().insert(key.clone(), thumbnail.clone());
        thumbnail
    }

    /// A transparent square, shown for empty image cells.
    pub fn blank(&self, size: u32) -> Thumbnail {
        self.shared
            .state
            .lock()
            .blanks
            .entry(size)
            .or_insert_with(|| Thumbnail::blank(size))
            .clone()
    }

    /// Drain finished background renders.
    ///
    /// This and [`loaded_receiver`](Self::loaded_receiver) read the same
    /// channel; use one of them.
    ///
    /// Emits [`image_loaded`](Self::image_loaded) once if anything finished.
    /// Returns the number of finished keys.
    pub fn process_loaded(&self) -> usize {
        let count = self.completed_rx.try_iter().count();
        if count > 0 {
            tracing::trace!(target: targets::IMAGE_CACHE, count, "images loaded");
            self.image_loaded.emit(());
        }
        count
    }

    /// Emitted by [`process_loaded`](Self::process_loaded) when some
    /// previously requested image is ready.
    pub fn image_loaded(&self) -> &Signal<()> {
        &self.image_loaded
    }

    /// The completion channel, for consumers that poll it directly.
    ///
    /// Keys taken from this receiver are not seen by
    /// [`process_loaded`](Self::process_loaded) and do not emit
    /// [`image_loaded`](Self::image_loaded).
    pub fn loaded_receiver(&self) -> Receiver<ImageKey> {
        self.completed_rx.clone()
    }

    /// Whether `key` has a cached bitmap.
    pub fn contains(&self, key: &ImageKey) -> bool {
        self.shared.state.lock().cache.contains_key(key)
    }

    /// Whether `key` is queued or being rendered.
    pub fn is_loading(&self, key: &ImageKey) -> bool {
        self.shared.state.lock().loading.contains(key)
    }

    /// Number of cached bitmaps.
    pub fn len(&self) -> usize {
        self.shared.state.lock().cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.shared.state.lock().stats
    }

    /// Drop every cached bitmap and the working set. Queued keys stay queued
    /// but will be discarded as stale.
    pub fn clear(&self) {
        let mut state = self.shared.state.lock();
        state.cache.clear();
        state.mru.clear();
    }
}

impl Drop for ImageCacheManager {
    fn drop(&mut self) {
        self.shared.state.lock().shutdown = true;
        self.shared.work_available.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn render(renderer: &dyn ImageRenderer, key: &ImageKey) -> Option<Thumbnail> {
    let _span = tracing::debug_span!(target: targets::IMAGE_CACHE, span_names::RENDER, ?key).entered();
    match renderer.render(key) {
        Ok(thumbnail) => Some(thumbnail),
        Err(err) => {
            tracing::warn!(target: targets::IMAGE_CACHE, error = %err, "failed to render image");
            None
        }
    }
}

fn worker_loop(shared: Arc<Shared>, completed_tx: Sender<ImageKey>) {
    loop {
        let key = {
            let mut state = shared.state.lock();
            loop {
                if state.shutdown {
                    return;
                }
                if let Some(key) = state.queue.pop() {
                    if state.cache.contains_key(&key) {
                        state.loading.remove(&key);
                        tracing::trace!(target: targets::IMAGE_CACHE, ?key, "already rendered");
                        continue;
                    }
                    if state.is_wanted(&key) {
                        break key;
                    }
                    state.loading.remove(&key);
                    tracing::trace!(target: targets::IMAGE_CACHE, ?key, "dropping stale request");
                    continue;
                }
                shared.work_available.wait(&mut state);
            }
        };

        let thumbnail = match render(&*shared.renderer, &key) {
            Some(thumbnail) => thumbnail,
            None => shared.placeholder(&key),
        };
        shared.state.lock().insert(key.clone(), thumbnail);

        if completed_tx.send(key).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use image::RgbaImage;

    /// Counts renders and returns a fresh bitmap for every call.
    #[derive(Default)]
    struct CountingRenderer {
        renders: Mutex<Vec<ImageKey>>,
    }

    impl ImageRenderer for CountingRenderer {
        fn render(&self, key: &ImageKey) -> ImageResult<Thumbnail> {
            self.renders.lock().push(key.clone());
            Ok(Thumbnail::new(RgbaImage::new(key.size, key.size)))
        }

        fn placeholder(&self, _kind: MediaKind, _key: &ImageKey) -> Thumbnail {
            Thumbnail::new(RgbaImage::new(1, 1))
        }
    }

    /// Blocks every render until the test lets it through.
    struct GatedRenderer {
        started: Sender<ImageKey>,
        gate: Receiver<()>,
        renders: Mutex<Vec<ImageKey>>,
    }

    impl ImageRenderer for GatedRenderer {
        fn render(&self, key: &ImageKey) -> ImageResult<Thumbnail> {
            let _ = self.started.send(key.clone());
            let _ = self.gate.recv_timeout(Duration::from_secs(5));
            self.renders.lock().push(key.clone());
            Ok(Thumbnail::new(RgbaImage::new(2, 2)))
        }

        fn placeholder(&self, _kind: MediaKind, _key: &ImageKey) -> Thumbnail {
            Thumbnail::new(RgbaImage::new(1, 1))
        }
    }

    /// Renders immediately except for `blocked`, which waits for the gate.
    /// Placeholders wait for the gate when `block_placeholders` is set.
    struct BlockingRenderer {
        blocked: Option<ImageKey>,
        block_placeholders: bool,
        started: Sender<ImageKey>,
        gate: Receiver<()>,
        renders: Mutex<Vec<ImageKey>>,
    }

    impl BlockingRenderer {
        fn new(blocked: Option<ImageKey>, block_placeholders: bool) -> (Arc<Self>, Receiver<ImageKey>, Sender<()>) {
            let (started_tx, started_rx) = unbounded();
            let (gate_tx, gate_rx) = unbounded();
            let renderer = Arc::new(Self {
                blocked,
                block_placeholders,
                started: started_tx,
                gate: gate_rx,
                renders: Mutex::new(Vec::new()),
            });
            (renderer, started_rx, gate_tx)
        }

        fn wait(&self, key: &ImageKey) {
            let _ = self.started.send(key.clone());
            let _ = self.gate.recv_timeout(Duration::from_secs(5));
        }
    }

    impl ImageRenderer for BlockingRenderer {
        fn render(&self, key: &ImageKey) -> ImageResult<Thumbnail> {
            if self.blocked.as_ref() == Some(key) {
                self.wait(key);
            }
            self.renders.lock().push(key.clone());
            Ok(Thumbnail::new(RgbaImage::new(key.size, key.size)))
        }

        fn placeholder(&self, _kind: MediaKind, key: &ImageKey) -> Thumbnail {
            if self.block_placeholders {
                self.wait(key);
            }
            Thumbnail::new(RgbaImage::new(1, 1))
        }
    }

    struct FailingRenderer;

    impl ImageRenderer for FailingRenderer {
        fn render(&self, _key: &ImageKey) -> ImageResult<Thumbnail> {
            Err(ImageError::MissingPath)
        }

        fn placeholder(&self, _kind: MediaKind, key: &ImageKey) -> Thumbnail {
            Thumbnail::new(RgbaImage::new(key.size, 1))
        }
    }

    fn key(name: &str) -> ImageKey {
        ImageKey::new(format!("{name}.png"), 16)
    }

    fn wait_until(condition: impl Fn() -> bool) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !condition() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_second_request_hits_cache() {
        let renderer = Arc::new(CountingRenderer::default());
        let cache =
            ImageCacheManager::with_renderer(ImageCacheConfig::default(), renderer.clone()).unwrap();

        let first = cache.get_image(&key("a"), false);
        let second = cache.get_image(&key("a"), false);

        assert!(first.ptr_eq(&second));
        assert_eq!(renderer.renders.lock().len(), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_options_are_part_of_key() {
        let renderer = Arc::new(CountingRenderer::default());
        let cache =
            ImageCacheManager::with_renderer(ImageCacheConfig::default(), renderer.clone()).unwrap();

        cache.get_image(&key("a"), false);
        cache.get_image(&key("a").with_fill(true), false);
        cache.get_image(&key("a").with_border(true), false);

        assert_eq!(renderer.renders.lock().len(), 3);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let renderer = Arc::new(CountingRenderer::default());
        let config = ImageCacheConfig::default().with_capacity(2);
        let cache = ImageCacheManager::with_renderer(config, renderer.clone()).unwrap();

        cache.get_image(&key("a"), false);
        cache.get_image(&key("b"), false);
        cache.get_image(&key("a"), false);
        cache.get_image(&key("c"), false);

        assert!(cache.contains(&key("a")));
        assert!(!cache.contains(&key("b")));
        assert!(cache.contains(&key("c")));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_threaded_load_returns_placeholder_then_image() {
        let renderer = Arc::new(CountingRenderer::default());
        let cache =
            ImageCacheManager::with_renderer(ImageCacheConfig::default(), renderer.clone()).unwrap();
        let loaded = Arc::new(Mutex::new(0));
        let loaded_clone = loaded.clone();
        cache.image_loaded().connect(move |_| *loaded_clone.lock() += 1);

        let placeholder = cache.get_image(&key("a"), true);
        assert_eq!(placeholder.width(), 1);

        let done = cache
            .loaded_receiver()
            .recv_timeout(Duration::from_secs(5))
            .unwrap();
        assert_eq!(done, key("a"));
        // Taken from the receiver, so nothing is left to announce.
        assert_eq!(cache.process_loaded(), 0);
        assert_eq!(*loaded.lock(), 0);

        let image = cache.get_image(&key("a"), true);
        assert_eq!(image.width(), 16);
        assert_eq!(renderer.renders.lock().len(), 1);
        assert!(!cache.is_loading(&key("a")));
    }

    #[test]
    fn test_process_loaded_emits_once_per_drain() {
        let renderer = Arc::new(CountingRenderer::default());
        let cache =
            ImageCacheManager::with_renderer(ImageCacheConfig::default(), renderer.clone()).unwrap();
        let loaded = Arc::new(Mutex::new(0));
        let loaded_clone = loaded.clone();
        cache.image_loaded().connect(move |_| *loaded_clone.lock() += 1);

        cache.get_image(&key("a"), true);
        wait_until(|| !cache.completed_rx.is_empty());

        assert_eq!(cache.process_loaded(), 1);
        assert_eq!(cache.process_loaded(), 0);
        assert_eq!(*loaded.lock(), 1);
    }

    #[test]
    fn test_worker_is_lifo_and_skips_stale_keys() {
        let (started_tx, started_rx) = unbounded();
        let (gate_tx, gate_rx) = unbounded();
        let renderer = Arc::new(GatedRenderer {
            started: started_tx,
            gate: gate_rx,
            renders: Mutex::new(Vec::new()),
        });
        let config = ImageCacheConfig::default().with_capacity(2);
        let cache = ImageCacheManager::with_renderer(config, renderer.clone()).unwrap();

        cache.get_image(&key("x"), true);
        assert_eq!(started_rx.recv_timeout(Duration::from_secs(5)).unwrap(), key("x"));

        // The worker is busy with x; a falls out of the working set.
        cache.get_image(&key("a"), true);
        cache.get_image(&key("b"), true);
        cache.get_image(&key("c"), true);

        for _ in 0..3 {
            gate_tx.send(()).unwrap();
        }
        let receiver = cache.loaded_receiver();
        let mut finished = Vec::new();
        for _ in 0..3 {
            finished.push(receiver.recv_timeout(Duration::from_secs(5)).unwrap());
        }

        assert_eq!(finished, vec![key("x"), key("c"), key("b")]);
        assert_eq!(*renderer.renders.lock(), vec![key("x"), key("c"), key("b")]);
        assert!(!cache.contains(&key("x")));
        wait_until(|| !cache.is_loading(&key("a")));
        assert!(!cache.is_loading(&key("a")));
        assert_eq!(renderer.renders.lock().len(), 3);
    }

    #[test]
    fn test_duplicate_requests_queue_once() {
        let (started_tx, started_rx) = unbounded();
        let (gate_tx, gate_rx) = unbounded();
        let renderer = Arc::new(GatedRenderer {
            started: started_tx,
            gate: gate_rx,
            renders: Mutex::new(Vec::new()),
        });
        let cache =
            ImageCacheManager::with_renderer(ImageCacheConfig::default(), renderer.clone()).unwrap();

        cache.get_image(&key("busy"), true);
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        cache.get_image(&key("a"), true);
        cache.get_image(&key("a"), true);
        cache.get_image(&key("a"), true);

        gate_tx.send(()).unwrap();
        gate_tx.send(()).unwrap();
        let receiver = cache.loaded_receiver();
        receiver.recv_timeout(Duration::from_secs(5)).unwrap();
        receiver.recv_timeout(Duration::from_secs(5)).unwrap();

        assert_eq!(renderer.renders.lock().len(), 2);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_worker_skips_keys_rendered_synchronously() {
        let (renderer, started_rx, gate_tx) = BlockingRenderer::new(Some(key("busy")), false);
        let cache =
            ImageCacheManager::with_renderer(ImageCacheConfig::default(), renderer.clone()).unwrap();

        cache.get_image(&key("busy"), true);
        assert_eq!(started_rx.recv_timeout(Duration::from_secs(5)).unwrap(), key("busy"));

        // Queued behind busy, then rendered on the calling thread.
        cache.get_image(&key("a"), true);
        let sync = cache.get_image(&key("a"), false);
        assert_eq!(sync.width(), 16);
        assert!(!cache.is_loading(&key("a")));

        gate_tx.send(()).unwrap();
        wait_until(|| cache.shared.state.lock().queue.is_empty());
        assert!(sync.ptr_eq(&cache.get_image(&key("a"), false)));
        drop(cache);

        assert_eq!(*renderer.renders.lock(), vec![key("a"), key("busy")]);
    }

    #[test]
    fn test_placeholder_is_drawn_without_holding_the_lock() {
        let (renderer, started_rx, gate_tx) = BlockingRenderer::new(None, true);
        let cache =
            ImageCacheManager::with_renderer(ImageCacheConfig::default(), renderer.clone()).unwrap();

        thread::scope(|scope| {
            let requester = scope.spawn(|| cache.get_image(&key("a"), true));
            started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

            let (len_tx, len_rx) = unbounded();
            let cache = &cache;
            scope.spawn(move || {
                let _ = len_tx.send(cache.len());
            });
            let reached = len_rx.recv_timeout(Duration::from_secs(5));

            gate_tx.send(()).unwrap();
            assert_eq!(requester.join().unwrap().width(), 1);
            assert!(reached.is_ok(), "cache stayed locked while the placeholder was drawn");
        });
    }

    #[test]
    fn test_failed_render_caches_placeholder() {
        let cache =
            ImageCacheManager::with_renderer(ImageCacheConfig::default(), Arc::new(FailingRenderer))
                .unwrap();

        let first = cache.get_image(&key("broken"), false);
        assert_eq!((first.width(), first.height()), (16, 1));
        assert!(cache.contains(&key("broken")));
        assert!(first.ptr_eq(&cache.get_image(&key("broken"), false)));
    }

    #[test]
    fn test_blank_is_shared_per_size() {
        let cache = ImageCacheManager::new(ImageCacheConfig::default()).unwrap();
        let a = cache.blank(24);
        assert!(a.ptr_eq(&cache.blank(24)));
        assert_eq!(a.pixels().get_pixel(0, 0)[3], 0);
    }
}
