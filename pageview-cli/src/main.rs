use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use pageview_core::backend::{default_documents, FsImageDecoder};
use pageview_core::{
    Dimension, LoadState, PageInfo, RecordingSurface, SourceKind, Viewer, ViewerConfig,
};

#[derive(Debug, Parser)]
#[command(name = "pageview")]
#[command(about = "Load an image or document page and render a viewer frame")]
struct Cli {
    /// JSON viewer configuration.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print page information for a source as JSON.
    Info {
        #[arg(value_name = "SOURCE")]
        src: String,
    },
    /// Render one frame and write its display list and/or page bitmap.
    Render {
        #[arg(value_name = "SOURCE")]
        src: String,
        #[arg(long, default_value_t = 1024.0)]
        width: f64,
        #[arg(long, default_value_t = 768.0)]
        height: f64,
        /// 1-based page number.
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// Zoom relative to the fitted scale.
        #[arg(long, default_value_t = 1.0)]
        zoom: f64,
        /// Rotation in degrees, clockwise.
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        rotation: f64,
        /// Display list output; stdout when omitted.
        #[arg(long, value_name = "FILE")]
        frame_out: Option<PathBuf>,
        /// Decoded page bitmap output (PNG).
        #[arg(long, value_name = "FILE")]
        bitmap_out: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InfoOutput {
    src: String,
    kind: SourceKind,
    page_count: usize,
    show_item_quantity: bool,
    page: PageInfo,
}

struct RenderRequest {
    src: String,
    dim: Dimension,
    page: usize,
    zoom: f64,
    rotation: f64,
    frame_out: Option<PathBuf>,
    bitmap_out: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pageview=info,pageview_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Info { src } => run_info(config, src).await,
        Command::Render {
            src,
            width,
            height,
            page,
            zoom,
            rotation,
            frame_out,
            bitmap_out,
        } => {
            let request = RenderRequest {
                src,
                dim: Dimension::new(width, height),
                page,
                zoom,
                rotation,
                frame_out,
                bitmap_out,
            };
            run_render(config, request).await
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ViewerConfig> {
    match path {
        Some(path) => ViewerConfig::from_path(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(ViewerConfig::default()),
    }
}

fn build_viewer(config: ViewerConfig) -> Result<Viewer> {
    let documents = default_documents().context("failed to initialize document renderer")?;
    Ok(Viewer::new(config, Rc::new(FsImageDecoder), documents))
}

/// Attach `src` and drive loading until it settles, failing on load errors.
async fn open_source(viewer: &mut Viewer, src: &str) -> Result<PageInfo> {
    viewer.attach_source(src);
    viewer.settle().await;
    loaded_page(viewer, src)
}

fn loaded_page(viewer: &Viewer, src: &str) -> Result<PageInfo> {
    let Some(loader) = viewer.loader() else {
        bail!("no source attached");
    };
    match loader.state() {
        LoadState::Failed { reason } => bail!("failed to load {src}: {reason}"),
        _ => loader
            .current_page_info()
            .with_context(|| format!("{src} produced no page")),
    }
}

async fn run_info(config: ViewerConfig, src: String) -> Result<()> {
    let mut viewer = build_viewer(config)?;
    let page = open_source(&mut viewer, &src).await?;

    let Some(loader) = viewer.loader() else {
        bail!("no source attached");
    };
    let payload = InfoOutput {
        kind: loader.kind(),
        page_count: loader.total_item(),
        show_item_quantity: loader.shows_item_quantity(),
        page,
        src,
    };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");
    Ok(())
}

async fn run_render(config: ViewerConfig, request: RenderRequest) -> Result<()> {
    if request.page == 0 {
        bail!("--page is 1-based and must be >= 1");
    }
    if request.dim.is_empty() {
        bail!("--width and --height must be positive");
    }

    let mut viewer = build_viewer(config)?;
    let mut page = open_source(&mut viewer, &request.src).await?;

    if request.page != page.page_number {
        if !viewer.set_current_page(request.page) {
            bail!("{} has no page {}", request.src, request.page);
        }
        viewer.settle().await;
        page = loaded_page(&viewer, &request.src)?;
        if page.page_number != request.page {
            bail!("{} has no page {}", request.src, request.page);
        }
    }

    viewer.set_rotation(request.rotation);
    viewer.reset_viewport(request.dim);
    if let Some(fitted) = viewer.loader().map(|l| l.viewport().scale) {
        let applied = viewer.set_zoom(fitted * request.zoom);
        debug!(requested = request.zoom, ?applied, "applied zoom");
    }

    let mut surface = RecordingSurface::new();
    viewer.render_frame(&mut surface, request.dim, |_, _, dim| {
        debug!(width = dim.width, height = dim.height, "frame finished");
    });

    let json = surface.to_json().context("failed to serialize display list")?;
    match &request.frame_out {
        Some(path) => {
            write_parent_dirs(path)?;
            std::fs::write(path, json)
                .with_context(|| format!("failed to write frame to {}", path.display()))?;
            info!(path = %path.display(), commands = surface.commands().len(), "wrote display list");
        }
        None => println!("{json}"),
    }

    if let Some(path) = &request.bitmap_out {
        let bitmap = viewer
            .loader()
            .and_then(|l| l.bitmap())
            .context("no bitmap loaded")?;
        write_parent_dirs(path)?;
        bitmap
            .save(path)
            .with_context(|| format!("failed to write bitmap to {}", path.display()))?;
        info!(path = %path.display(), width = bitmap.width(), height = bitmap.height(), "wrote page bitmap");
    }

    info!(src = %request.src, page = page.page_number, "rendered frame");
    Ok(())
}

fn write_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn render_defaults() {
        let cli = Cli::try_parse_from(["pageview", "render", "scan.png"]).unwrap();
        let Command::Render {
            src,
            width,
            height,
            page,
            zoom,
            rotation,
            frame_out,
            bitmap_out,
        } = cli.command
        else {
            panic!("expected render command");
        };
        assert_eq!(src, "scan.png");
        assert_eq!((width, height), (1024.0, 768.0));
        assert_eq!(page, 1);
        assert_eq!(zoom, 1.0);
        assert_eq!(rotation, 0.0);
        assert!(frame_out.is_none() && bitmap_out.is_none());
    }

    #[test]
    fn negative_rotation_and_global_config_parse() {
        let cli = Cli::try_parse_from([
            "pageview",
            "render",
            "book.pdf",
            "--rotation",
            "-90",
            "--page",
            "3",
            "--config",
            "viewer.json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("viewer.json")));
        let Command::Render { rotation, page, .. } = cli.command else {
            panic!("expected render command");
        };
        assert_eq!(rotation, -90.0);
        assert_eq!(page, 3);
    }

    #[test]
    fn info_requires_a_source() {
        assert!(Cli::try_parse_from(["pageview", "info"]).is_err());
    }

    #[test]
    fn missing_config_file_is_reported() {
        let err = load_config(Some(Path::new("/nonexistent/viewer.json"))).unwrap_err();
        assert!(format!("{err:#}").contains("failed to load config"));
    }

    #[tokio::test]
    async fn render_writes_frame_and_bitmap() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("page.png");
        let mut pixels = RgbaImage::new(40, 20);
        pixels.put_pixel(0, 0, Rgba([1, 2, 3, 255]));
        pixels.save(&src).unwrap();

        let frame_out = dir.path().join("out/frame.json");
        let bitmap_out = dir.path().join("out/page.png");
        let request = RenderRequest {
            src: src.to_string_lossy().into_owned(),
            dim: Dimension::new(80.0, 40.0),
            page: 1,
            zoom: 1.0,
            rotation: 0.0,
            frame_out: Some(frame_out.clone()),
            bitmap_out: Some(bitmap_out.clone()),
        };
        run_render(ViewerConfig::default(), request).await.unwrap();

        let frame = std::fs::read_to_string(frame_out).unwrap();
        assert!(frame.contains("drawBitmap"));
        let written = image::open(bitmap_out).unwrap().into_rgba8();
        assert_eq!(written.dimensions(), (40, 20));
        assert_eq!(written.get_pixel(0, 0), &Rgba([1, 2, 3, 255]));
    }

    #[tokio::test]
    async fn render_rejects_missing_pages() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("single.png");
        RgbaImage::new(4, 4).save(&src).unwrap();

        let request = RenderRequest {
            src: src.to_string_lossy().into_owned(),
            dim: Dimension::new(10.0, 10.0),
            page: 2,
            zoom: 1.0,
            rotation: 0.0,
            frame_out: Some(dir.path().join("frame.json")),
            bitmap_out: None,
        };
        let err = run_render(ViewerConfig::default(), request).await.unwrap_err();
        assert!(err.to_string().contains("has no page 2"));
    }
}
