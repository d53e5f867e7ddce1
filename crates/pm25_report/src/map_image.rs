//! Raster map generation.
//!
//! Turns a point dataset into a temporary PNG: points drawn as red markers
//! over a basemap mosaic sized to the requested aspect. A dataset that
//! fails to load aborts the operation before any file is created; a failed
//! basemap fetch degrades to a plain background with a one-line caption and
//! still produces a raster. The returned path is a kept temporary file
//! whose deletion the caller owns.

use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_text_mut};
use log::{error, info, warn};
use rusttype::{Font, Scale};
use thiserror::Error;

use crate::basemap::{self, GeoBounds, TileProvider, Viewport};
use crate::dataset::{DatasetError, PointDataset};
use crate::fonts;

/// Raster resolution, pixels per inch of the target region.
pub const RASTER_DPI: f64 = 300.0;

const MARKER_RADIUS_PX: i32 = 8;
const MARKER_COLOR: Rgba<u8> = Rgba([220, 20, 20, 255]);
const FALLBACK_BACKGROUND: Rgba<u8> = Rgba([211, 211, 211, 255]);
const CAPTION_COLOR: Rgba<u8> = Rgba([60, 60, 60, 255]);
const CAPTION_SCALE_PX: f32 = 36.0;

/// Fraction of the dataset extent added as padding on every side.
const BOUNDS_PADDING: f64 = 0.1;
/// Minimum extent in degrees, so single-point datasets get a map window.
const MIN_EXTENT_DEG: f64 = 0.01;

/// Errors raised while generating the map raster.
#[derive(Debug, Error)]
pub enum MapImageError {
    /// The requested output size was not positive in both dimensions.
    #[error("map size must be positive, got {width}x{height} inches")]
    InvalidSize { width: f64, height: f64 },
    /// The dataset could not be loaded.
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    /// The temporary file could not be created.
    #[error("failed to create temporary map file: {0}")]
    TempFile(#[from] std::io::Error),
    /// The raster could not be encoded.
    #[error("failed to write map raster: {0}")]
    Encode(#[from] image::ImageError),
    /// The temporary file could not be detached from auto-deletion.
    #[error("failed to persist temporary map file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Renders the dataset at `dataset_path` over a basemap from `provider`
/// into a temporary PNG of `size_inches` at [`RASTER_DPI`], returning the
/// path of the file. The caller owns the file's deletion.
pub fn generate_map_image(
    dataset_path: impl AsRef<Path>,
    size_inches: (f64, f64),
    provider: TileProvider,
) -> Result<PathBuf, MapImageError> {
    let dataset_path = dataset_path.as_ref();
    let (width_in, height_in) = size_inches;
    if !(width_in > 0.0 && height_in > 0.0) {
        return Err(MapImageError::InvalidSize {
            width: width_in,
            height: height_in,
        });
    }

    let dataset = PointDataset::from_path(dataset_path)?;
    let points = dataset.wgs84_points();

    let width = (width_in * RASTER_DPI).round().max(1.0) as u32;
    let height = (height_in * RASTER_DPI).round().max(1.0) as u32;

    let bounds = match GeoBounds::from_points(&points) {
        Some(bounds) => bounds.padded(BOUNDS_PADDING, MIN_EXTENT_DEG),
        // from_path rejects empty files, so this cannot trigger today.
        None => {
            return Err(MapImageError::Dataset(DatasetError::NoPoints {
                path: dataset_path.to_path_buf(),
            }));
        }
    };
    let viewport = Viewport::fit(&bounds, width, height, provider.max_zoom());
    info!(
        "rendering {}x{} px map at zoom {}",
        width, height, viewport.zoom
    );

    let mut fetch_failure = None;
    let mut canvas = match basemap::fetch_mosaic(provider, &viewport) {
        Ok(mosaic) => mosaic,
        Err(err) => {
            error!("failed to fetch basemap: {}", err);
            fetch_failure = Some(err);
            RgbaImage::from_pixel(width, height, FALLBACK_BACKGROUND)
        }
    };

    for point in &points {
        let (x, y) = viewport.to_canvas(point.x(), point.y());
        let r = MARKER_RADIUS_PX as f64;
        if x < -r || y < -r || x > width as f64 + r || y > height as f64 + r {
            continue;
        }
        draw_filled_circle_mut(
            &mut canvas,
            (x.round() as i32, y.round() as i32),
            MARKER_RADIUS_PX,
            MARKER_COLOR,
        );
    }

    if let Some(err) = fetch_failure {
        draw_caption(&mut canvas, &format!("Basemap unavailable: {}", err));
    }

    let temp = tempfile::Builder::new()
        .prefix("pm25-map-")
        .suffix(".png")
        .tempfile()?;
    canvas.save(temp.path())?;
    let (file, path) = temp.keep()?;
    drop(file);
    info!("map raster written to {}", path.display());
    Ok(path)
}

/// Draws a one-line caption in the top-left corner of the canvas.
///
/// The caption needs a TrueType font; when none of the report fonts can be
/// found or parsed the caption is skipped with a warning, leaving the plain
/// background as the only failure indicator.
pub(crate) fn draw_caption(canvas: &mut RgbaImage, text: &str) {
    let font_path = match fonts::regular_font_path() {
        Some(path) => path,
        None => {
            warn!("no report font available; skipping raster caption");
            return;
        }
    };
    let data = match fs::read(&font_path) {
        Ok(data) => data,
        Err(err) => {
            warn!("failed to read {}: {}", font_path.display(), err);
            return;
        }
    };
    let font = match Font::try_from_vec(data) {
        Some(font) => font,
        None => {
            warn!("failed to parse {}", font_path.display());
            return;
        }
    };
    draw_text_mut(
        canvas,
        CAPTION_COLOR,
        24,
        24,
        Scale::uniform(CAPTION_SCALE_PX),
        &font,
        text,
    );
}
