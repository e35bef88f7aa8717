//! The viewer facade: one attached source, its overlays and its load tasks.
//!
//! [`Viewer`] owns the active [`ResourceLoader`] and runs the tasks it hands
//! back on the caller's thread through a [`FuturesUnordered`] set. Every task
//! is tagged with the generation it was issued in; attaching or detaching a
//! source bumps the generation so completions from a discarded loader are
//! dropped instead of fed to the new one.
//!
//! Settled loads are announced on a [`broadcast`] channel. Subscribers see
//! every announcement made after they subscribed; nothing is replayed.

use std::cmp::Reverse;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::cache::{PageRenderCache, SharedPageCache};
use crate::config::{ButtonStyle, ViewerConfig};
use crate::geometry::{Dimension, SurfacePoint};
use crate::loader::{
    DocumentLoader, DocumentProvider, ImageDecoder, ImageLoader, LoadEvent, LoadTask, PageInfo,
    ResourceLoader, SourceKind, Transition,
};
use crate::overlay::{
    ButtonAnchor, ButtonConfig, ButtonHandler, Hover, OverlayRegion, PointerEvent,
    UserDefinedButton,
};
use crate::render::{self, DrawCallback};
use crate::surface::DrawingSurface;

/// Buffered announcements per subscriber before the slowest one lags.
const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Announced whenever a load settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceChanged {
    pub src: String,
    pub page: PageInfo,
}

type TaggedTask = LocalBoxFuture<'static, (u64, LoadEvent)>;

pub struct Viewer {
    config: ViewerConfig,
    decoder: Rc<dyn ImageDecoder>,
    documents: Rc<dyn DocumentProvider>,
    cache: SharedPageCache,
    loader: Option<Box<dyn ResourceLoader>>,
    generation: u64,
    in_flight: FuturesUnordered<TaggedTask>,
    buttons: Vec<UserDefinedButton>,
    draw_callbacks: Vec<DrawCallback>,
    surface: Option<Dimension>,
    needs_fit: bool,
    changes: broadcast::Sender<ResourceChanged>,
}

impl std::fmt::Debug for Viewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewer")
            .field("src", &self.loader.as_ref().map(|l| l.src().to_string()))
            .field("generation", &self.generation)
            .field("in_flight", &self.in_flight.len())
            .field("buttons", &self.buttons.len())
            .field("draw_callbacks", &self.draw_callbacks.len())
            .field("surface", &self.surface)
            .finish_non_exhaustive()
    }
}

impl Viewer {
    #[must_use]
    pub fn new(
        config: ViewerConfig,
        decoder: Rc<dyn ImageDecoder>,
        documents: Rc<dyn DocumentProvider>,
    ) -> Self {
        let cache = PageRenderCache::shared(config.cache_capacity);
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            config,
            decoder,
            documents,
            cache,
            loader: None,
            generation: 0,
            in_flight: FuturesUnordered::new(),
            buttons: Vec::new(),
            draw_callbacks: Vec::new(),
            surface: None,
            needs_fit: false,
            changes,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> &SharedPageCache {
        &self.cache
    }

    /// Receive every [`ResourceChanged`] sent from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ResourceChanged> {
        self.changes.subscribe()
    }

    // =============================================================
    // Source lifecycle
    // =============================================================

    /// Replace the current source, guessing its kind from the identifier.
    pub fn attach_source(&mut self, src: impl Into<String>) {
        let src = src.into();
        let kind = SourceKind::detect(&src);
        self.attach_source_as(src, kind);
    }

    /// Replace the current source with an explicit loader kind.
    pub fn attach_source_as(&mut self, src: impl Into<String>, kind: SourceKind) {
        let src = src.into();
        self.generation += 1;
        info!(src = %src, ?kind, generation = self.generation, "attaching source");

        let mut loader: Box<dyn ResourceLoader> = match kind {
            SourceKind::Image => Box::new(ImageLoader::new(src, Rc::clone(&self.decoder))),
            SourceKind::Document => Box::new(DocumentLoader::new(
                src,
                Rc::clone(&self.documents),
                Rc::clone(&self.cache),
                self.config.page_oversampling,
            )),
        };
        let task = loader.set_up();
        self.loader = Some(loader);
        self.needs_fit = true;
        if let Some(task) = task {
            self.spawn(task);
        }
    }

    /// Drop the current source. Its outstanding tasks become stale.
    pub fn detach(&mut self) {
        if let Some(loader) = self.loader.take() {
            self.generation += 1;
            debug!(src = %loader.src(), generation = self.generation, "detached source");
        }
    }

    #[must_use]
    pub fn loader(&self) -> Option<&dyn ResourceLoader> {
        self.loader.as_deref()
    }

    #[must_use]
    pub fn current_page_info(&self) -> Option<PageInfo> {
        self.loader.as_ref().and_then(|l| l.current_page_info())
    }

    /// Move to page `page` (clamped) and start loading it. Returns whether
    /// the cursor moved.
    pub fn set_current_page(&mut self, page: usize) -> bool {
        let Some(loader) = self.loader.as_mut() else {
            return false;
        };
        if !loader.set_current_item(page) {
            return false;
        }
        let task = loader.load_resource();
        if let Some(task) = task {
            self.spawn(task);
        }
        true
    }

    pub fn next_page(&mut self) -> bool {
        let Some(current) = self.loader.as_ref().map(|l| l.current_item()) else {
            return false;
        };
        self.set_current_page(current + 1)
    }

    pub fn previous_page(&mut self) -> bool {
        let Some(current) = self.loader.as_ref().map(|l| l.current_item()) else {
            return false;
        };
        self.set_current_page(current.saturating_sub(1))
    }

    /// Re-issue a failed load. Returns `false` unless the loader had failed.
    pub fn retry(&mut self) -> bool {
        let Some(task) = self.loader.as_mut().and_then(|l| l.retry()) else {
            return false;
        };
        self.spawn(task);
        true
    }

    // =============================================================
    // Viewport
    // =============================================================

    /// Zoom to `scale`, clamped to the limits of the last fit. Returns the
    /// applied scale, or `None` when nothing is loaded or fitted yet.
    pub fn set_zoom(&mut self, scale: f64) -> Option<f64> {
        let loader = self.loader.as_mut()?;
        let resource = loader.resource_size()?;
        let bounds = loader.scale_bounds()?;
        Some(loader.viewport_mut().zoom_to(scale, resource, bounds))
    }

    pub fn zoom_in(&mut self) -> Option<f64> {
        let scale = self.loader.as_ref()?.viewport().scale;
        self.set_zoom(scale * (1.0 + self.config.zoom_step))
    }

    pub fn zoom_out(&mut self) -> Option<f64> {
        let scale = self.loader.as_ref()?.viewport().scale;
        self.set_zoom(scale * (1.0 - self.config.zoom_step))
    }

    pub fn set_rotation(&mut self, degrees: f64) {
        if let Some(loader) = self.loader.as_mut() {
            loader.viewport_mut().set_rotation(degrees);
        }
    }

    pub fn rotate_left(&mut self) {
        if let Some(loader) = self.loader.as_mut() {
            loader.viewport_mut().rotate_by(-90.0);
        }
    }

    pub fn rotate_right(&mut self) {
        if let Some(loader) = self.loader.as_mut() {
            loader.viewport_mut().rotate_by(90.0);
        }
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        if let Some(loader) = self.loader.as_mut() {
            loader.viewport_mut().pan(dx, dy);
        }
    }

    /// Fit the resource to `dim`, honoring the current rotation.
    pub fn reset_viewport(&mut self, dim: Dimension) -> bool {
        self.surface = Some(dim);
        let fitted = self
            .loader
            .as_mut()
            .is_some_and(|l| l.reset_viewport(Some(dim)));
        if fitted {
            self.needs_fit = false;
        }
        fitted
    }

    // =============================================================
    // Overlays and draw callbacks
    // =============================================================

    /// Pin a button to the resource. `style` falls back to the configured
    /// button style. The returned button can be tuned further (sort order,
    /// icon, hover).
    pub fn add_overlay_button(
        &mut self,
        anchor: ButtonAnchor,
        style: Option<ButtonStyle>,
        on_click: ButtonHandler,
    ) -> &mut UserDefinedButton {
        let style = style.unwrap_or_else(|| self.config.button_style.clone());
        let mut region = OverlayRegion::new(ButtonConfig::default(), style);
        region.set_on_click(on_click);
        self.buttons.push(UserDefinedButton::new(anchor, region));
        let index = self.buttons.len() - 1;
        &mut self.buttons[index]
    }

    pub fn remove_all_overlay_buttons(&mut self) {
        self.buttons.clear();
    }

    #[must_use]
    pub fn overlay_buttons(&self) -> &[UserDefinedButton] {
        &self.buttons
    }

    /// Run `callback` under the resource transform on every frame.
    pub fn draw_on_resource(&mut self, callback: DrawCallback) {
        self.draw_callbacks.push(callback);
    }

    /// Remove every overlay button and draw callback.
    pub fn erase_all(&mut self) {
        self.buttons.clear();
        self.draw_callbacks.clear();
    }

    // =============================================================
    // Frames and input
    // =============================================================

    /// Draw one frame. The viewport is refitted first when the surface size
    /// changed or a new resource settled since the last fit.
    pub fn render_frame<F>(&mut self, surface: &mut dyn DrawingSurface, dim: Dimension, on_finish: F)
    where
        F: FnOnce(&mut dyn DrawingSurface, &ViewerConfig, Dimension),
    {
        if self.needs_fit || self.surface != Some(dim) {
            self.reset_viewport(dim);
        }
        render::render_frame(
            surface,
            self.loader.as_deref(),
            &self.config,
            dim,
            &self.draw_callbacks,
            &mut self.buttons,
            on_finish,
        );
    }

    fn pointer_event(&self, x: f64, y: f64) -> PointerEvent {
        let position = SurfacePoint::new(x, y);
        let document = self
            .loader
            .as_ref()
            .filter(|l| l.is_loaded())
            .and_then(|l| {
                let resource = l.resource_size()?;
                Some(l.viewport().surface_to_document(position, resource))
            });
        PointerEvent { position, document }
    }

    /// Indices of displayed buttons under `(x, y)`, top-most first.
    fn hits(&self, surface: &dyn DrawingSurface, x: f64, y: f64) -> Vec<usize> {
        let mut hits: Vec<usize> = self
            .buttons
            .iter()
            .enumerate()
            .filter(|(_, b)| b.region.display && b.region.is_within_bounds(surface, x, y))
            .map(|(i, _)| i)
            .collect();
        hits.sort_by_key(|&i| (Reverse(self.buttons[i].region.sort_id), Reverse(i)));
        hits
    }

    /// Deliver a click. Returns `true` when a button consumed it.
    pub fn handle_click(&mut self, surface: &dyn DrawingSurface, x: f64, y: f64) -> bool {
        let event = self.pointer_event(x, y);
        for index in self.hits(surface, x, y) {
            if self.buttons[index].region.on_click(&event) {
                return true;
            }
        }
        false
    }

    /// Deliver a mouse-down. Returns `true` when a button consumed it.
    pub fn handle_mouse_down(&mut self, surface: &dyn DrawingSurface, x: f64, y: f64) -> bool {
        let event = self.pointer_event(x, y);
        for index in self.hits(surface, x, y) {
            if self.buttons[index].region.on_mouse_down(&event) {
                return true;
            }
        }
        false
    }

    /// Update boolean hover flags and return the tooltip of the top-most
    /// button under the pointer. Predicate hovers are left alone.
    pub fn pointer_moved(&mut self, surface: &dyn DrawingSurface, x: f64, y: f64) -> Option<String> {
        for button in &mut self.buttons {
            let inside = button.region.display && button.region.is_within_bounds(surface, x, y);
            if let Hover::Flag(flag) = &mut button.region.hover {
                *flag = inside;
            }
        }
        let top = self.hits(surface, x, y).into_iter().next()?;
        self.buttons[top].region.tooltip.clone()
    }

    // =============================================================
    // Task driving
    // =============================================================

    fn spawn(&mut self, task: LoadTask) {
        let generation = self.generation;
        self.in_flight
            .push(task.map(move |event| (generation, event)).boxed_local());
    }

    #[must_use]
    pub fn has_pending_work(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Wait for the next task to finish and apply it. Returns `false` when
    /// nothing was in flight.
    pub async fn process_next(&mut self) -> bool {
        let Some((generation, event)) = self.in_flight.next().await else {
            return false;
        };
        self.dispatch(generation, event);
        true
    }

    /// Run tasks until none remain, including follow-up steps.
    pub async fn settle(&mut self) {
        while self.process_next().await {}
    }

    fn dispatch(&mut self, generation: u64, event: LoadEvent) {
        if generation != self.generation {
            warn!(generation, current = self.generation, event = ?event, "dropping stale load event");
            return;
        }
        let Some(loader) = self.loader.as_mut() else {
            return;
        };

        match loader.complete(event) {
            Transition::Idle => {}
            Transition::Continue(task) => self.spawn(task),
            Transition::Changed(page) => {
                self.needs_fit = true;
                let change = ResourceChanged {
                    src: loader.src().to_string(),
                    page,
                };
                if self.changes.send(change).is_err() {
                    debug!("resource changed with no subscribers");
                }
            }
        }
    }
}
