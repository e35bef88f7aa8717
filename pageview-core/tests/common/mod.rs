//! Test doubles for the external decoder and document renderer.

#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use futures::FutureExt;
use image::RgbaImage;
use pageview_core::loader::{
    Bitmap, DocumentHandle, DocumentProvider, ImageDecoder, LoadFuture, PageHandle,
};
use pageview_core::LoadError;

// =============================================================
// Images
// =============================================================

/// Decodes any source to a bitmap whose width is the source's length
/// times ten, so different sources are distinguishable. Sources containing
/// `broken` fail.
#[derive(Default)]
pub struct FakeDecoder {
    pub decodes: Rc<Cell<usize>>,
}

impl ImageDecoder for FakeDecoder {
    fn decode(&self, src: &str) -> LoadFuture<Bitmap> {
        self.decodes.set(self.decodes.get() + 1);
        let result = if src.contains("broken") {
            Err(LoadError::Unsupported(format!("{src}: not an image")))
        } else {
            let width = u32::try_from(src.len()).unwrap_or(1) * 10;
            Ok(Arc::new(RgbaImage::new(width, 100)))
        };
        futures::future::ready(result).boxed_local()
    }
}

// =============================================================
// Documents
// =============================================================

/// Shared counters and failure switches for [`FakeDocuments`].
#[derive(Default)]
pub struct DocumentProbe {
    pub opens: Cell<usize>,
    pub rasterized: Cell<usize>,
    /// Number of upcoming rasterize calls that fail.
    pub failing_rasterizations: Cell<usize>,
    /// Number of upcoming opens that fail.
    pub failing_opens: Cell<usize>,
}

/// Documents with `pages` pages. Page `n` rasterizes to `100 * n` by `50`
/// pixels at scale 1.
pub struct FakeDocuments {
    pub pages: usize,
    pub probe: Rc<DocumentProbe>,
}

impl FakeDocuments {
    pub fn new(pages: usize) -> (Self, Rc<DocumentProbe>) {
        let probe = Rc::new(DocumentProbe::default());
        (
            Self {
                pages,
                probe: Rc::clone(&probe),
            },
            probe,
        )
    }
}

impl DocumentProvider for FakeDocuments {
    fn open(&self, src: &str) -> LoadFuture<Rc<dyn DocumentHandle>> {
        let probe = Rc::clone(&self.probe);
        probe.opens.set(probe.opens.get() + 1);
        let result: Result<Rc<dyn DocumentHandle>, LoadError> = if take(&probe.failing_opens) {
            Err(LoadError::Open {
                src: src.to_string(),
                reason: "network down".to_string(),
            })
        } else {
            Ok(Rc::new(FakeDocument {
                pages: self.pages,
                probe,
            }))
        };
        futures::future::ready(result).boxed_local()
    }
}

struct FakeDocument {
    pages: usize,
    probe: Rc<DocumentProbe>,
}

impl DocumentHandle for FakeDocument {
    fn page_count(&self) -> usize {
        self.pages
    }

    fn page(&self, number: usize) -> LoadFuture<Rc<dyn PageHandle>> {
        let result: Result<Rc<dyn PageHandle>, LoadError> = if number == 0 || number > self.pages {
            Err(LoadError::PageOutOfRange {
                page: number,
                total: self.pages,
            })
        } else {
            Ok(Rc::new(FakePage {
                number,
                probe: Rc::clone(&self.probe),
            }))
        };
        futures::future::ready(result).boxed_local()
    }
}

struct FakePage {
    number: usize,
    probe: Rc<DocumentProbe>,
}

impl PageHandle for FakePage {
    fn rasterize(&self, scale: f32) -> LoadFuture<Bitmap> {
        self.probe.rasterized.set(self.probe.rasterized.get() + 1);
        let result = if take(&self.probe.failing_rasterizations) {
            Err(LoadError::Rasterize {
                page: self.number,
                reason: "renderer crashed".to_string(),
            })
        } else {
            let width = (100.0 * self.number as f32 * scale) as u32;
            let height = (50.0 * scale) as u32;
            Ok(Arc::new(RgbaImage::new(width, height)))
        };
        futures::future::ready(result).boxed_local()
    }
}

/// Consume one unit from a countdown, returning whether one was available.
fn take(counter: &Cell<usize>) -> bool {
    let remaining = counter.get();
    if remaining == 0 {
        return false;
    }
    counter.set(remaining - 1);
    true
}
