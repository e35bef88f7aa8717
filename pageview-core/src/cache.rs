//! Rasterized page cache with LRU eviction.
//!
//! Pages are keyed by `(src, page number)` so re-visiting a page, or
//! re-attaching the same document, reuses the bitmap instead of asking the
//! document renderer again. The cache is read when a page load starts and
//! written only when a rasterization completes.

use std::cell::RefCell;
use std::fmt;
use std::num::NonZeroUsize;
use std::rc::Rc;

use lru::LruCache;
use tracing::debug;

use crate::loader::Bitmap;

/// Cache handle shared by every loader a viewer creates.
pub type SharedPageCache = Rc<RefCell<PageRenderCache>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub src: String,
    pub page: usize,
}

impl PageKey {
    #[must_use]
    pub fn new(src: &str, page: usize) -> Self {
        Self { src: src.to_string(), page }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

pub struct PageRenderCache {
    /// Maximum number of pages kept; `0` disables eviction.
    capacity: usize,
    pages: LruCache<PageKey, Bitmap>,
    stats: CacheStats,
}

impl fmt::Debug for PageRenderCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageRenderCache")
            .field("capacity", &self.capacity)
            .field("len", &self.pages.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl PageRenderCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let pages = match NonZeroUsize::new(capacity) {
            Some(bound) => LruCache::new(bound),
            None => LruCache::unbounded(),
        };
        Self {
            capacity,
            pages,
            stats: CacheStats::default(),
        }
    }

    #[must_use]
    pub fn shared(capacity: usize) -> SharedPageCache {
        Rc::new(RefCell::new(Self::new(capacity)))
    }

    /// Look up a page, marking it most recently used on a hit.
    pub fn get(&mut self, src: &str, page: usize) -> Option<Bitmap> {
        match self.pages.get(&PageKey::new(src, page)).cloned() {
            Some(bitmap) => {
                self.stats.hits += 1;
                Some(bitmap)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, src: &str, page: usize, bitmap: Bitmap) {
        let key = PageKey::new(src, page);
        if self.pages.contains(&key) {
            self.pages.put(key, bitmap);
            return;
        }
        if let Some((oldest, _)) = self.pages.push(key, bitmap) {
            self.stats.evictions += 1;
            debug!(src = %oldest.src, page = oldest.page, "evicted cached page");
        }
    }

    #[must_use]
    pub fn contains(&self, src: &str, page: usize) -> bool {
        self.pages.contains(&PageKey::new(src, page))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
