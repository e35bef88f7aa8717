use std::rc::Rc;

use futures::FutureExt;
use tracing::{debug, info, warn};

use super::{
    ImageDecoder, LoadEvent, LoadState, LoadTask, LoaderBase, ResourceLoader, SourceKind,
    Transition,
};

/// Loads a single bitmap image. Always exactly one item.
pub struct ImageLoader {
    base: LoaderBase,
    decoder: Rc<dyn ImageDecoder>,
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader").field("base", &self.base).finish_non_exhaustive()
    }
}

impl ImageLoader {
    pub fn new(src: impl Into<String>, decoder: Rc<dyn ImageDecoder>) -> Self {
        Self {
            base: LoaderBase::new(src),
            decoder,
        }
    }
}

impl ResourceLoader for ImageLoader {
    fn base(&self) -> &LoaderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut LoaderBase {
        &mut self.base
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Image
    }

    fn set_up(&mut self) -> Option<LoadTask> {
        if self.base.state == LoadState::Loading || self.base.src.is_empty() {
            return None;
        }
        self.load_resource()
    }

    fn load_resource(&mut self) -> Option<LoadTask> {
        if self.base.state == LoadState::Loading {
            self.base.defer();
            return None;
        }
        if self.base.src.is_empty() {
            return None;
        }

        self.base.state = LoadState::Loading;
        debug!(src = %self.base.src, "decoding image");
        Some(
            self.decoder
                .decode(&self.base.src)
                .map(LoadEvent::ImageDecoded)
                .boxed_local(),
        )
    }

    fn complete(&mut self, event: LoadEvent) -> Transition {
        match event {
            LoadEvent::ImageDecoded(Ok(bitmap)) => {
                let info = self.base.settle(bitmap, 1);
                if self.base.take_pending() {
                    return Transition::from_task(self.load_resource());
                }
                info!(src = %self.base.src, width = info.width, height = info.height, "image loaded");
                Transition::Changed(info)
            }
            LoadEvent::ImageDecoded(Err(err)) => {
                self.base.fail(&err);
                Transition::Idle
            }
            other => {
                warn!(src = %self.base.src, event = ?other, "image loader ignoring unexpected event");
                Transition::Idle
            }
        }
    }

    fn retry(&mut self) -> Option<LoadTask> {
        if !matches!(self.base.state, LoadState::Failed { .. }) {
            return None;
        }
        self.base.state = LoadState::Unloaded;
        self.load_resource()
    }
}
