use std::rc::Rc;
use std::sync::Arc;

use futures::FutureExt;
use image::RgbaImage;
use pdfium_render::prelude::*;
use tracing::debug;

use crate::error::LoadError;
use crate::loader::{Bitmap, DocumentHandle, DocumentProvider, LoadFuture, PageHandle};

/// PDF document provider using pdfium-render.
///
/// PDFium calls are synchronous and not thread-safe, so the returned futures
/// do their work on the thread that polls them.
pub struct PdfiumDocuments {
    pdfium: &'static Pdfium,
}

impl std::fmt::Debug for PdfiumDocuments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfiumDocuments").finish_non_exhaustive()
    }
}

impl PdfiumDocuments {
    /// Bind to a PDFium library next to the executable, falling back to the
    /// system library.
    pub fn new() -> Result<Self, LoadError> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|err| {
                LoadError::Unsupported(format!(
                    "failed to bind to PDFium library ({err}); install PDFium or download it from https://github.com/bblanchon/pdfium-binaries"
                ))
            })?;
        // Documents borrow the bindings, which live for the rest of the process.
        let pdfium: &'static Pdfium = Box::leak(Box::new(Pdfium::new(bindings)));
        Ok(Self { pdfium })
    }
}

impl DocumentProvider for PdfiumDocuments {
    fn open(&self, src: &str) -> LoadFuture<Rc<dyn DocumentHandle>> {
        let pdfium = self.pdfium;
        let src = src.to_string();
        async move {
            let document = pdfium
                .load_pdf_from_file(&src, None)
                .map_err(|err| LoadError::Open {
                    src: src.clone(),
                    reason: err.to_string(),
                })?;
            debug!(src = %src, pages = document.pages().len(), "opened PDF");
            Ok(Rc::new(PdfiumDocument {
                inner: Rc::new(document),
            }) as Rc<dyn DocumentHandle>)
        }
        .boxed_local()
    }
}

struct PdfiumDocument {
    inner: Rc<PdfDocument<'static>>,
}

impl DocumentHandle for PdfiumDocument {
    fn page_count(&self) -> usize {
        self.inner.pages().len() as usize
    }

    fn page(&self, number: usize) -> LoadFuture<Rc<dyn PageHandle>> {
        let total = self.page_count();
        let document = Rc::clone(&self.inner);
        async move {
            if number == 0 || number > total {
                return Err(LoadError::PageOutOfRange { page: number, total });
            }
            Ok(Rc::new(PdfiumPage { document, number }) as Rc<dyn PageHandle>)
        }
        .boxed_local()
    }
}

struct PdfiumPage {
    document: Rc<PdfDocument<'static>>,
    number: usize,
}

impl PdfiumPage {
    fn render(&self, scale: f32) -> Result<Bitmap, LoadError> {
        let rasterize_error = |reason: String| LoadError::Rasterize {
            page: self.number,
            reason,
        };

        let index = u16::try_from(self.number - 1)
            .map_err(|_| rasterize_error("page index exceeds PDFium range".to_string()))?;
        let page = self
            .document
            .pages()
            .get(index)
            .map_err(|err| rasterize_error(err.to_string()))?;

        // Calculate render size based on the oversampling scale
        let render_width = (page.width().value * scale).round() as i32;
        let render_height = (page.height().value * scale).round() as i32;

        let render_config = PdfRenderConfig::new()
            .set_target_width(render_width)
            .set_maximum_height(render_height);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|err| rasterize_error(err.to_string()))?;

        // PDFium hands back BGRA; swap to RGBA.
        let mut buffer = bitmap.as_raw_bytes().to_vec();
        for pixel in buffer.chunks_exact_mut(4) {
            pixel.swap(0, 2);
        }
        let image = RgbaImage::from_raw(bitmap.width() as u32, bitmap.height() as u32, buffer)
            .ok_or_else(|| rasterize_error("bitmap buffer has unexpected length".to_string()))?;

        debug!(page = self.number, width = image.width(), height = image.height(), "rasterized page");
        Ok(Arc::new(image))
    }
}

impl PageHandle for PdfiumPage {
    fn rasterize(&self, scale: f32) -> LoadFuture<Bitmap> {
        futures::future::ready(self.render(scale)).boxed_local()
    }
}
