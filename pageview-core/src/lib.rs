//! Viewport, overlay and resource-loading engine for a pan/zoom/rotate viewer.
//!
//! The engine renders one visual resource (a bitmap image or a page of a
//! paginated document) onto a 2D drawing surface, keeps interactive overlay
//! buttons pinned to document coordinates as the viewport changes, and runs
//! the asynchronous load state machine that feeds the renderer. Decoding,
//! rasterizing and the actual drawing backend sit behind small traits so a
//! host can plug in its own.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`viewer`] | Facade owning the source, overlays and in-flight load tasks |
//! | [`loader`] | Image and document loaders and their state machine |
//! | [`viewport`] | Fit-to-surface and document/surface coordinate mapping |
//! | [`render`] | Frame composition |
//! | [`overlay`] | Circle and polygon buttons with hit-testing |
//! | [`surface`] | Drawing-surface trait and a recording implementation |
//! | [`cache`] | LRU cache of rasterized document pages |
//! | [`geometry`] | Space-tagged points, bounds and angle helpers |
//! | [`backend`] | Filesystem image decoder and PDF document providers |
//! | [`config`] | Host presentation settings |
//! | [`error`] | Error types |

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod geometry;
pub mod loader;
pub mod overlay;
pub mod render;
pub mod surface;
pub mod viewer;
pub mod viewport;

pub use config::{ButtonStyle, ViewerConfig};
pub use error::{ConfigError, LoadError};
pub use geometry::{Dimension, DocPoint, Size, SurfacePoint};
pub use loader::{LoadState, PageInfo, ResourceLoader, SourceKind};
pub use overlay::{ButtonAnchor, OverlayRegion, PointerEvent, UserDefinedButton};
pub use surface::{DrawingSurface, RecordingSurface};
pub use viewer::{ResourceChanged, Viewer};
pub use viewport::Viewport;
