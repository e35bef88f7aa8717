use std::sync::Arc;

use futures::FutureExt;
use tracing::debug;

use crate::error::LoadError;
use crate::loader::{Bitmap, ImageDecoder, LoadFuture};

/// Decodes image files from the local filesystem.
///
/// The file is read with `tokio::fs` and decoded on the blocking pool, so a
/// Tokio runtime must be driving the returned future.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsImageDecoder;

impl ImageDecoder for FsImageDecoder {
    fn decode(&self, src: &str) -> LoadFuture<Bitmap> {
        let src = src.to_string();
        async move {
            let bytes = tokio::fs::read(&src)
                .await
                .map_err(|source| LoadError::Io { src: src.clone(), source })?;

            let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
                .await
                .map_err(|err| LoadError::Task(err.to_string()))?
                .map_err(|source| LoadError::Decode { src: src.clone(), source })?;

            let rgba = decoded.into_rgba8();
            debug!(src = %src, width = rgba.width(), height = rgba.height(), "decoded image");
            Ok(Arc::new(rgba))
        }
        .boxed_local()
    }
}
