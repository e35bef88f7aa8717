//! Resource loaders: the asynchronous load state machine behind the viewer.
//!
//! A loader never awaits anything itself. Each asynchronous step is handed
//! back to the caller as a [`LoadTask`], a single-resolution future that
//! yields a [`LoadEvent`]; the caller drives it and feeds the event back
//! through [`ResourceLoader::complete`]. This keeps the state machine
//! deterministic and lets a host run tasks on whatever single-threaded event
//! loop it owns.
//!
//! ```text
//!   Unloaded ──set_up──▶ Loading ──complete(Ok)──▶ Loaded
//!                          ▲  │                       │
//!                          │  └──complete(Err)──▶ Failed
//!                          └───── load_resource ──────┘   (page change)
//! ```
//!
//! Calling [`ResourceLoader::load_resource`] while a load is in flight does
//! not start a second one: the request is remembered and re-issued once when
//! the current load completes, and the change notification is withheld for
//! the stale intermediate page.

mod document;
mod image_loader;

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use futures::future::LocalBoxFuture;
use image::RgbaImage;
use serde::Serialize;
use tracing::{debug, error};

use crate::error::LoadError;
use crate::geometry::{Dimension, Size};
use crate::viewport::{ScaleBounds, Viewport};

pub use document::DocumentLoader;
pub use image_loader::ImageLoader;

/// Decoded RGBA pixels. Cloning shares the allocation.
pub type Bitmap = Arc<RgbaImage>;

/// Future returned by the external collaborators.
pub type LoadFuture<T> = LocalBoxFuture<'static, Result<T, LoadError>>;

/// One in-flight asynchronous step of a loader.
pub type LoadTask = LocalBoxFuture<'static, LoadEvent>;

/// Platform image decoder.
pub trait ImageDecoder {
    fn decode(&self, src: &str) -> LoadFuture<Bitmap>;
}

/// Opens paginated documents.
pub trait DocumentProvider {
    fn open(&self, src: &str) -> LoadFuture<Rc<dyn DocumentHandle>>;
}

/// An opened paginated document.
pub trait DocumentHandle {
    fn page_count(&self) -> usize;

    /// Acquire the 1-based page `number`.
    fn page(&self, number: usize) -> LoadFuture<Rc<dyn PageHandle>>;
}

/// A single page that can be rasterized on demand.
pub trait PageHandle {
    /// Render the page at `scale` times its natural size.
    fn rasterize(&self, scale: f32) -> LoadFuture<Bitmap>;
}

/// Which loader a source needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    Image,
    Document,
}

impl SourceKind {
    /// Guess from the identifier: `.pdf` (ignoring case, query and fragment)
    /// is a document, everything else an image.
    #[must_use]
    pub fn detect(src: &str) -> Self {
        let path = src.split(['?', '#']).next().unwrap_or(src);
        if path.to_ascii_lowercase().ends_with(".pdf") {
            Self::Document
        } else {
            Self::Image
        }
    }
}

/// Native size and page number of the loaded resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub width: u32,
    pub height: u32,
    pub page_number: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
    /// The last load failed; [`ResourceLoader::retry`] re-issues it.
    Failed { reason: String },
}

/// Result of one asynchronous step.
pub enum LoadEvent {
    ImageDecoded(Result<Bitmap, LoadError>),
    DocumentOpened(Result<Rc<dyn DocumentHandle>, LoadError>),
    PageRendered {
        page: usize,
        /// Served from the page cache rather than the renderer.
        cached: bool,
        result: Result<Bitmap, LoadError>,
    },
}

impl fmt::Debug for LoadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageDecoded(result) => f
                .debug_tuple("ImageDecoded")
                .field(&result.as_ref().map(|b| b.dimensions()))
                .finish(),
            Self::DocumentOpened(result) => f
                .debug_tuple("DocumentOpened")
                .field(&result.as_ref().map(|doc| doc.page_count()))
                .finish(),
            Self::PageRendered { page, cached, result } => f
                .debug_struct("PageRendered")
                .field("page", page)
                .field("cached", cached)
                .field("result", &result.as_ref().map(|b| b.dimensions()))
                .finish(),
        }
    }
}

/// What the caller should do after feeding an event back.
pub enum Transition {
    /// Nothing further.
    Idle,
    /// Another step was issued; drive it.
    Continue(LoadTask),
    /// A load settled; notify subscribers.
    Changed(PageInfo),
}

impl Transition {
    fn from_task(task: Option<LoadTask>) -> Self {
        task.map_or(Self::Idle, Self::Continue)
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("Idle"),
            Self::Continue(_) => f.write_str("Continue(..)"),
            Self::Changed(info) => f.debug_tuple("Changed").field(info).finish(),
        }
    }
}

/// State shared by every loader variant.
pub struct LoaderBase {
    pub(crate) src: String,
    pub(crate) state: LoadState,
    /// 1-based page cursor.
    pub(crate) current_item: usize,
    pub(crate) total_item: usize,
    pub(crate) viewport: Viewport,
    /// Zoom limits from the last fit; `None` until the first fit.
    pub(crate) scale_bounds: Option<ScaleBounds>,
    pub(crate) pending_reload: bool,
    pub(crate) bitmap: Option<Bitmap>,
    pub(crate) page_info: Option<PageInfo>,
}

impl fmt::Debug for LoaderBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderBase")
            .field("src", &self.src)
            .field("state", &self.state)
            .field("current_item", &self.current_item)
            .field("total_item", &self.total_item)
            .field("viewport", &self.viewport)
            .field("pending_reload", &self.pending_reload)
            .field("page_info", &self.page_info)
            .finish_non_exhaustive()
    }
}

impl LoaderBase {
    #[must_use]
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            state: LoadState::Unloaded,
            current_item: 1,
            total_item: 1,
            viewport: Viewport::default(),
            scale_bounds: None,
            pending_reload: false,
            bitmap: None,
            page_info: None,
        }
    }

    /// Remember a load request that arrived while another is in flight.
    fn defer(&mut self) {
        if !self.pending_reload {
            debug!(src = %self.src, page = self.current_item, "load in flight, deferring reload");
        }
        self.pending_reload = true;
    }

    fn take_pending(&mut self) -> bool {
        std::mem::take(&mut self.pending_reload)
    }

    /// Record a finished load and return its page info.
    fn settle(&mut self, bitmap: Bitmap, page_number: usize) -> PageInfo {
        let info = PageInfo {
            width: bitmap.width(),
            height: bitmap.height(),
            page_number,
        };
        self.bitmap = Some(bitmap);
        self.page_info = Some(info);
        self.state = LoadState::Loaded;
        info
    }

    fn fail(&mut self, err: &LoadError) {
        error!(src = %self.src, page = self.current_item, error = %err, "resource load failed");
        self.pending_reload = false;
        self.state = LoadState::Failed { reason: err.to_string() };
    }
}

/// Capability shared by image and document loaders.
///
/// The render pipeline and the viewer only ever talk to this trait.
pub trait ResourceLoader {
    fn base(&self) -> &LoaderBase;
    fn base_mut(&mut self) -> &mut LoaderBase;
    fn kind(&self) -> SourceKind;

    /// Begin the initial load. No-op while loading or without a source.
    fn set_up(&mut self) -> Option<LoadTask>;

    /// (Re)load the current item, coalescing with any load in flight.
    fn load_resource(&mut self) -> Option<LoadTask>;

    /// Feed back the event a [`LoadTask`] resolved to.
    fn complete(&mut self, event: LoadEvent) -> Transition;

    /// Re-issue the failed step. No-op unless the loader is [`LoadState::Failed`].
    fn retry(&mut self) -> Option<LoadTask>;

    fn src(&self) -> &str {
        &self.base().src
    }

    fn state(&self) -> &LoadState {
        &self.base().state
    }

    fn is_loaded(&self) -> bool {
        self.base().state == LoadState::Loaded
    }

    fn is_loading(&self) -> bool {
        self.base().state == LoadState::Loading
    }

    /// Native size and page number, or `None` before the first successful load.
    fn current_page_info(&self) -> Option<PageInfo> {
        self.base().page_info
    }

    fn bitmap(&self) -> Option<&Bitmap> {
        self.base().bitmap.as_ref()
    }

    /// Native size of the current bitmap.
    fn resource_size(&self) -> Option<Size> {
        self.bitmap()
            .map(|b| Size::new(f64::from(b.width()), f64::from(b.height())))
    }

    fn current_item(&self) -> usize {
        self.base().current_item
    }

    fn total_item(&self) -> usize {
        self.base().total_item
    }

    /// Whether a "page n of m" indicator is meaningful for this source.
    fn shows_item_quantity(&self) -> bool {
        self.kind() == SourceKind::Document
    }

    /// Move the page cursor, clamped to `1..=total_item`. Returns whether it
    /// changed; the caller decides when to reload.
    fn set_current_item(&mut self, item: usize) -> bool {
        let base = self.base_mut();
        let item = item.clamp(1, base.total_item.max(1));
        if item == base.current_item {
            return false;
        }
        base.current_item = item;
        true
    }

    fn viewport(&self) -> &Viewport {
        &self.base().viewport
    }

    fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.base_mut().viewport
    }

    fn scale_bounds(&self) -> Option<ScaleBounds> {
        self.base().scale_bounds
    }

    /// Fit the viewport to `surface`. No-op (returns `false`) until loaded or
    /// without a surface.
    fn reset_viewport(&mut self, surface: Option<Dimension>) -> bool {
        if !self.is_loaded() {
            return false;
        }
        let (Some(surface), Some(resource)) = (surface, self.resource_size()) else {
            return false;
        };
        let base = self.base_mut();
        match base.viewport.fit_to_surface(resource, surface) {
            Some(bounds) => {
                base.scale_bounds = Some(bounds);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_documents_by_extension() {
        assert_eq!(SourceKind::detect("files/report.PDF"), SourceKind::Document);
        assert_eq!(SourceKind::detect("https://x.test/a.pdf?download=1"), SourceKind::Document);
        assert_eq!(SourceKind::detect("https://x.test/a.pdf#page=2"), SourceKind::Document);
        assert_eq!(SourceKind::detect("photo.jpg"), SourceKind::Image);
        assert_eq!(SourceKind::detect("pdf"), SourceKind::Image);
    }

    #[test]
    fn base_starts_unloaded_on_first_page() {
        let base = LoaderBase::new("a.png");
        assert_eq!(base.state, LoadState::Unloaded);
        assert_eq!(base.current_item, 1);
        assert_eq!(base.total_item, 1);
        assert!(base.page_info.is_none());
        assert!(base.scale_bounds.is_none());
    }
}
