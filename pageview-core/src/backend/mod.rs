//! Concrete adapters for the external collaborators.
//!
//! | Adapter | Role |
//! |---------|------|
//! | [`FsImageDecoder`] | Reads and decodes image files with the `image` crate |
//! | [`PdfiumDocuments`] | Opens and rasterizes PDFs through PDFium (`pdfium` feature) |
//! | [`UnsupportedDocuments`] | Rejects every document; used when no renderer is compiled in |

mod fs_image;
#[cfg(feature = "pdfium")]
mod pdfium;

use std::rc::Rc;

use futures::FutureExt;

use crate::error::LoadError;
use crate::loader::{DocumentHandle, DocumentProvider, LoadFuture};

pub use fs_image::FsImageDecoder;
#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumDocuments;

/// Document provider for builds without a document renderer.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedDocuments;

impl DocumentProvider for UnsupportedDocuments {
    fn open(&self, src: &str) -> LoadFuture<Rc<dyn DocumentHandle>> {
        let message = format!("{src}: document rendering is not available in this build");
        futures::future::ready(Err(LoadError::Unsupported(message))).boxed_local()
    }
}

/// The document provider this build supports best.
///
/// # Errors
///
/// Returns an error if the PDFium library cannot be bound.
#[cfg(feature = "pdfium")]
pub fn default_documents() -> Result<Rc<dyn DocumentProvider>, LoadError> {
    Ok(Rc::new(PdfiumDocuments::new()?))
}

/// The document provider this build supports best.
///
/// # Errors
///
/// Never fails without the `pdfium` feature.
#[cfg(not(feature = "pdfium"))]
pub fn default_documents() -> Result<Rc<dyn DocumentProvider>, LoadError> {
    Ok(Rc::new(UnsupportedDocuments))
}
