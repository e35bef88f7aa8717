//! Rendering: composes one frame onto a [`DrawingSurface`].
//!
//! Layers, bottom first: background, the transformed resource with the
//! caller's draw callbacks, then overlay buttons in surface space. When no
//! resource is loaded a centered placeholder message replaces the middle
//! layers. The completion callback always runs last.
//!
//! Nothing here mutates loader or viewport state; buttons only update their
//! recorded hit shapes. Every frame starts by clearing those shapes, so a
//! button not painted in the current frame cannot be hit.

use crate::config::ViewerConfig;
use crate::geometry::Dimension;
use crate::loader::{LoadState, ResourceLoader};
use crate::overlay::UserDefinedButton;
use crate::surface::{DrawingSurface, TextAlign, TextStyle};

/// Placeholder text color.
const PLACEHOLDER_FILL: &str = "#333";

/// Placeholder text font.
const PLACEHOLDER_FONT: &str = "25px Verdana";

/// Extra drawing run under the resource transform, in document units.
pub type DrawCallback = Box<dyn Fn(&mut dyn DrawingSurface)>;

/// Draw a full frame.
///
/// `loader` is `None` when no source is attached; the placeholder is shown.
pub fn render_frame<F>(
    surface: &mut dyn DrawingSurface,
    loader: Option<&dyn ResourceLoader>,
    config: &ViewerConfig,
    dim: Dimension,
    draw_callbacks: &[DrawCallback],
    buttons: &mut [UserDefinedButton],
    on_finish: F,
) where
    F: FnOnce(&mut dyn DrawingSurface, &ViewerConfig, Dimension),
{
    // Layer 1: background.
    surface.clear_rect(0.0, 0.0, dim.width, dim.height);
    surface.fill_rect(0.0, 0.0, dim.width, dim.height, &config.background_style);

    for button in buttons.iter_mut() {
        button.region.clear_shape();
    }

    let loaded = loader.filter(|l| l.is_loaded() && l.bitmap().is_some());
    match loaded {
        Some(loader) => {
            draw_resource(surface, loader, draw_callbacks);
            draw_buttons(surface, loader, buttons);
        }
        None => {
            let failed = loader.is_some_and(|l| matches!(l.state(), LoadState::Failed { .. }));
            let message = if failed {
                config.error_message()
            } else {
                config.loading_message()
            };
            draw_placeholder(surface, message, dim);
        }
    }

    on_finish(surface, config, dim);
}

/// Layer 2: the bitmap and draw callbacks under the viewport transform.
fn draw_resource(surface: &mut dyn DrawingSurface, loader: &dyn ResourceLoader, draw_callbacks: &[DrawCallback]) {
    let Some(bitmap) = loader.bitmap() else {
        return;
    };
    let viewport = loader.viewport();

    surface.save();
    surface.translate(viewport.x + viewport.width / 2.0, viewport.y + viewport.height / 2.0);
    surface.rotate(viewport.rotation.to_radians());
    surface.scale(viewport.scale, viewport.scale);
    surface.translate(-f64::from(bitmap.width()) / 2.0, -f64::from(bitmap.height()) / 2.0);
    surface.draw_bitmap(bitmap, 0.0, 0.0);

    for callback in draw_callbacks {
        callback(&mut *surface);
    }
    surface.restore();
}

/// Layer 3: displayed buttons, lowest `sort_id` first so the top-most paints last.
fn draw_buttons(surface: &mut dyn DrawingSurface, loader: &dyn ResourceLoader, buttons: &mut [UserDefinedButton]) {
    let Some(resource) = loader.resource_size() else {
        return;
    };
    let viewport = loader.viewport();

    let mut order: Vec<usize> = (0..buttons.len())
        .filter(|&i| buttons[i].region.display)
        .collect();
    order.sort_by_key(|&i| buttons[i].region.sort_id);

    for i in order {
        buttons[i].draw(surface, viewport, resource);
    }
}

fn draw_placeholder(surface: &mut dyn DrawingSurface, message: &str, dim: Dimension) {
    let style = TextStyle {
        font: PLACEHOLDER_FONT.to_string(),
        fill: PLACEHOLDER_FILL.to_string(),
        align: TextAlign::Center,
    };
    surface.fill_text(message, dim.width / 2.0, dim.height / 2.0, &style);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ButtonStyle;
    use crate::error::LoadError;
    use crate::geometry::DocPoint;
    use crate::loader::{Bitmap, ImageDecoder, ImageLoader, LoadFuture};
    use crate::overlay::{ButtonAnchor, ButtonConfig, OverlayRegion};
    use crate::surface::{DrawCommand, RecordingSurface};
    use futures::FutureExt;
    use image::RgbaImage;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;
    use std::sync::Arc;

    struct FixedDecoder(Option<Bitmap>);

    impl ImageDecoder for FixedDecoder {
        fn decode(&self, src: &str) -> LoadFuture<Bitmap> {
            let result = self
                .0
                .clone()
                .ok_or_else(|| LoadError::Unsupported(format!("{src}: corrupt")));
            futures::future::ready(result).boxed_local()
        }
    }

    async fn loader_with(bitmap: Option<Bitmap>) -> ImageLoader {
        let mut loader = ImageLoader::new("scan.png", Rc::new(FixedDecoder(bitmap)));
        if let Some(task) = loader.set_up() {
            let event = task.await;
            let _ = loader.complete(event);
        }
        loader
    }

    fn finish_marker(surface: &mut dyn DrawingSurface, _: &ViewerConfig, _: Dimension) {
        surface.fill_rect(0.0, 0.0, 1.0, 1.0, "finish");
    }

    fn button(sort_id: i32, show: bool, origin: f64) -> UserDefinedButton {
        let config = ButtonConfig {
            sort_id,
            show,
            ..ButtonConfig::default()
        };
        let square = vec![
            DocPoint::new(origin, origin),
            DocPoint::new(origin + 5.0, origin),
            DocPoint::new(origin + 5.0, origin + 5.0),
        ];
        UserDefinedButton::new(ButtonAnchor::Polygon(square), OverlayRegion::new(config, ButtonStyle::default()))
    }

    #[test]
    fn without_a_loader_shows_loading_text_then_finishes() {
        let mut surface = RecordingSurface::new();
        let config = ViewerConfig::default();
        let dim = Dimension::new(300.0, 200.0);

        render_frame(&mut surface, None, &config, dim, &[], &mut [], finish_marker);

        let commands = surface.commands();
        assert_eq!(commands.len(), 4);
        assert_eq!(
            commands[0],
            DrawCommand::ClearRect { x: 0.0, y: 0.0, width: 300.0, height: 200.0 }
        );
        assert!(matches!(&commands[1], DrawCommand::FillRect { style, .. } if style == "#ECEFF2"));
        match &commands[2] {
            DrawCommand::FillText { text, x, y, style } => {
                assert_eq!(text, "Loading...");
                assert_eq!((*x, *y), (150.0, 100.0));
                assert_eq!(style.font, "25px Verdana");
                assert_eq!(style.fill, "#333");
                assert_eq!(style.align, TextAlign::Center);
            }
            other => panic!("expected placeholder text, got {other:?}"),
        }
        assert!(matches!(&commands[3], DrawCommand::FillRect { style, .. } if style == "finish"));
    }

    #[tokio::test]
    async fn loaded_resource_is_drawn_under_the_viewport_transform() {
        let bitmap: Bitmap = Arc::new(RgbaImage::new(100, 50));
        let mut loader = loader_with(Some(bitmap)).await;
        let dim = Dimension::new(200.0, 100.0);
        assert!(loader.reset_viewport(Some(dim)));

        let callbacks: Vec<DrawCallback> = vec![Box::new(|s: &mut dyn DrawingSurface| {
            s.fill_rect(1.0, 2.0, 3.0, 4.0, "annotation");
        })];
        let mut surface = RecordingSurface::new();
        render_frame(
            &mut surface,
            Some(&loader),
            &ViewerConfig::default(),
            dim,
            &callbacks,
            &mut [],
            finish_marker,
        );

        let commands = surface.commands();
        assert_eq!(
            commands[2..10].to_vec(),
            vec![
                DrawCommand::Save,
                DrawCommand::Translate { dx: 100.0, dy: 50.0 },
                DrawCommand::Rotate { radians: 0.0 },
                DrawCommand::Scale { sx: 2.0, sy: 2.0 },
                DrawCommand::Translate { dx: -50.0, dy: -25.0 },
                DrawCommand::DrawBitmap { x: 0.0, y: 0.0, width: 100, height: 50 },
                DrawCommand::FillRect {
                    x: 1.0,
                    y: 2.0,
                    width: 3.0,
                    height: 4.0,
                    style: "annotation".to_string(),
                },
                DrawCommand::Restore,
            ]
        );
        assert!(matches!(commands.last(), Some(DrawCommand::FillRect { style, .. }) if style == "finish"));
        assert!(!commands.iter().any(|c| matches!(c, DrawCommand::FillText { .. })));
    }

    #[tokio::test]
    async fn frame_layers_resource_then_buttons_then_finish() {
        let bitmap: Bitmap = Arc::new(RgbaImage::new(100, 100));
        let mut loader = loader_with(Some(bitmap)).await;
        let dim = Dimension::new(100.0, 100.0);
        loader.reset_viewport(Some(dim));

        let callbacks: Vec<DrawCallback> = vec![Box::new(|s: &mut dyn DrawingSurface| {
            s.fill_rect(0.0, 0.0, 1.0, 1.0, "annotation");
        })];
        let mut buttons = vec![button(0, true, 10.0)];
        let mut surface = RecordingSurface::new();
        render_frame(&mut surface, Some(&loader), &ViewerConfig::default(), dim, &callbacks, &mut buttons, finish_marker);

        let commands = surface.commands();
        let position = |wanted: fn(&DrawCommand) -> bool| commands.iter().position(wanted).unwrap();
        let bitmap_at = position(|c| matches!(c, DrawCommand::DrawBitmap { .. }));
        let callback_at = position(|c| matches!(c, DrawCommand::FillRect { style, .. } if style == "annotation"));
        let restore_at = position(|c| matches!(c, DrawCommand::Restore));
        let button_at = position(|c| matches!(c, DrawCommand::FillPath { .. }));
        let finish_at = position(|c| matches!(c, DrawCommand::FillRect { style, .. } if style == "finish"));

        assert!(matches!(commands[0], DrawCommand::ClearRect { .. }));
        assert!(bitmap_at < callback_at);
        assert!(callback_at < restore_at);
        assert!(restore_at < button_at);
        assert!(button_at < finish_at);
        assert_eq!(finish_at, commands.len() - 1);
    }

    #[tokio::test]
    async fn placeholder_frame_clears_button_hit_shapes() {
        let bitmap: Bitmap = Arc::new(RgbaImage::new(100, 100));
        let mut loader = loader_with(Some(bitmap)).await;
        let dim = Dimension::new(100.0, 100.0);
        loader.reset_viewport(Some(dim));

        let mut buttons = vec![button(0, true, 10.0)];
        let mut surface = RecordingSurface::new();
        render_frame(&mut surface, Some(&loader), &ViewerConfig::default(), dim, &[], &mut buttons, |_, _, _| {});
        assert!(buttons[0].region.is_within_bounds(&surface, 14.0, 11.0));

        let mut surface = RecordingSurface::new();
        render_frame(&mut surface, None, &ViewerConfig::default(), dim, &[], &mut buttons, |_, _, _| {});
        assert!(!buttons[0].region.is_within_bounds(&surface, 14.0, 11.0));
        assert!(!surface.commands().iter().any(|c| matches!(c, DrawCommand::FillPath { .. })));
    }

    #[tokio::test]
    async fn failed_load_shows_error_message() {
        let loader = loader_with(None).await;
        assert!(matches!(loader.state(), LoadState::Failed { .. }));

        let config = ViewerConfig {
            error_message: Some("Broken scan".to_string()),
            ..ViewerConfig::default()
        };
        let mut surface = RecordingSurface::new();
        render_frame(&mut surface, Some(&loader), &config, Dimension::new(10.0, 10.0), &[], &mut [], |_, _, _| {});

        assert!(surface
            .commands()
            .iter()
            .any(|c| matches!(c, DrawCommand::FillText { text, .. } if text == "Broken scan")));
    }

    #[tokio::test]
    async fn buttons_draw_in_sort_order_and_hidden_ones_are_skipped() {
        let bitmap: Bitmap = Arc::new(RgbaImage::new(100, 100));
        let mut loader = loader_with(Some(bitmap)).await;
        let dim = Dimension::new(100.0, 100.0);
        loader.reset_viewport(Some(dim));

        let mut buttons = vec![button(5, true, 50.0), button(1, true, 10.0), button(9, false, 80.0)];
        let mut surface = RecordingSurface::new();
        render_frame(&mut surface, Some(&loader), &ViewerConfig::default(), dim, &[], &mut buttons, |_, _, _| {});

        let first_points: Vec<f64> = surface
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::FillPath { path, .. } => match path.commands().first() {
                    Some(crate::surface::PathCommand::MoveTo { x, .. }) => Some(*x),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        assert_eq!(first_points, vec![10.0, 50.0]);

        assert!(buttons[0].region.is_within_bounds(&surface, 54.0, 51.0));
        assert!(!buttons[2].region.is_within_bounds(&surface, 84.0, 81.0));
    }
}
