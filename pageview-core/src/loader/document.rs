use std::rc::Rc;

use futures::FutureExt;
use tracing::{debug, info, warn};

use super::{
    DocumentHandle, DocumentProvider, LoadEvent, LoadState, LoadTask, LoaderBase, ResourceLoader,
    SourceKind, Transition,
};
use crate::cache::SharedPageCache;
use crate::error::LoadError;

/// Manages a paginated document and rasterizes one page at a time.
///
/// Pages are rendered at `oversampling` times their natural size so zooming
/// in stays crisp, and every rendered page goes through the shared page cache.
pub struct DocumentLoader {
    base: LoaderBase,
    provider: Rc<dyn DocumentProvider>,
    cache: SharedPageCache,
    oversampling: f32,
    document: Option<Rc<dyn DocumentHandle>>,
}

impl std::fmt::Debug for DocumentLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentLoader")
            .field("base", &self.base)
            .field("oversampling", &self.oversampling)
            .field("document_open", &self.document.is_some())
            .finish_non_exhaustive()
    }
}

impl DocumentLoader {
    pub fn new(
        src: impl Into<String>,
        provider: Rc<dyn DocumentProvider>,
        cache: SharedPageCache,
        oversampling: f32,
    ) -> Self {
        Self {
            base: LoaderBase::new(src),
            provider,
            cache,
            oversampling,
            document: None,
        }
    }

    fn open_document(&mut self) -> LoadTask {
        self.base.state = LoadState::Loading;
        self.base.current_item = 1;
        debug!(src = %self.base.src, "opening document");
        self.provider
            .open(&self.base.src)
            .map(LoadEvent::DocumentOpened)
            .boxed_local()
    }

    /// Start loading `current_item`, bypassing the in-flight check.
    fn start_page_load(&mut self, document: Rc<dyn DocumentHandle>) -> LoadTask {
        self.base.state = LoadState::Loading;
        let page = self.base.current_item;

        if let Some(bitmap) = self.cache.borrow_mut().get(&self.base.src, page) {
            debug!(src = %self.base.src, page, "page cache hit");
            return futures::future::ready(LoadEvent::PageRendered {
                page,
                cached: true,
                result: Ok(bitmap),
            })
            .boxed_local();
        }

        debug!(src = %self.base.src, page, scale = self.oversampling, "rasterizing page");
        let scale = self.oversampling;
        async move {
            let result = match document.page(page).await {
                Ok(handle) => handle.rasterize(scale).await,
                Err(err) => Err(err),
            };
            LoadEvent::PageRendered {
                page,
                cached: false,
                result,
            }
        }
        .boxed_local()
    }

    fn settle_page(&mut self, page: usize, cached: bool, bitmap: super::Bitmap) -> Transition {
        if !cached {
            self.cache
                .borrow_mut()
                .insert(&self.base.src, page, super::Bitmap::clone(&bitmap));
        }
        let info = self.base.settle(bitmap, page);

        if self.base.take_pending() {
            debug!(src = %self.base.src, page, "skipping notification for superseded page");
            return Transition::from_task(self.load_resource());
        }
        info!(src = %self.base.src, page, total = self.base.total_item, "page loaded");
        Transition::Changed(info)
    }
}

impl ResourceLoader for DocumentLoader {
    fn base(&self) -> &LoaderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut LoaderBase {
        &mut self.base
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Document
    }

    fn set_up(&mut self) -> Option<LoadTask> {
        if self.base.state == LoadState::Loading || self.base.src.is_empty() {
            return None;
        }
        Some(self.open_document())
    }

    fn load_resource(&mut self) -> Option<LoadTask> {
        let document = match &self.document {
            Some(document) if self.base.state != LoadState::Loading => Rc::clone(document),
            _ => {
                self.base.defer();
                return None;
            }
        };
        Some(self.start_page_load(document))
    }

    fn complete(&mut self, event: LoadEvent) -> Transition {
        match event {
            LoadEvent::DocumentOpened(Ok(document)) => {
                let total = document.page_count();
                if total == 0 {
                    self.base.fail(&LoadError::Open {
                        src: self.base.src.clone(),
                        reason: "document has no pages".to_string(),
                    });
                    return Transition::Idle;
                }
                self.base.total_item = total;
                self.base.current_item = self.base.current_item.clamp(1, total);
                self.document = Some(Rc::clone(&document));
                // The first page load reads the latest cursor, so any request
                // made while opening is already satisfied.
                self.base.pending_reload = false;
                Transition::Continue(self.start_page_load(document))
            }
            LoadEvent::PageRendered {
                page,
                cached,
                result: Ok(bitmap),
            } => self.settle_page(page, cached, bitmap),
            LoadEvent::DocumentOpened(Err(err)) | LoadEvent::PageRendered { result: Err(err), .. } => {
                self.base.fail(&err);
                Transition::Idle
            }
            other @ LoadEvent::ImageDecoded(_) => {
                warn!(src = %self.base.src, event = ?other, "document loader ignoring unexpected event");
                Transition::Idle
            }
        }
    }

    fn retry(&mut self) -> Option<LoadTask> {
        if !matches!(self.base.state, LoadState::Failed { .. }) {
            return None;
        }
        match self.document.clone() {
            Some(document) => Some(self.start_page_load(document)),
            None => Some(self.open_document()),
        }
    }
}
