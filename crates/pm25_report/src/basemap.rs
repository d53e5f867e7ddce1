//! Basemap tile fetching and mosaic assembly.
//!
//! Tiles follow the slippy-map scheme: the world is projected to spherical
//! Web Mercator and cut into 256 px tiles, `2^zoom` per axis. A [`Viewport`]
//! describes a pixel window into that plane, either fitted around
//! geographic bounds at an automatically chosen zoom or centred on a
//! coordinate at an explicit zoom. Fetching is blocking and single-attempt:
//! the first tile that cannot be fetched or decoded fails the whole mosaic.

use std::time::Duration;

use geo_types::Point;
use image::{GenericImageView, Rgba, RgbaImage};
use log::{debug, info};
use thiserror::Error;

/// Edge length of a slippy-map tile in pixels.
pub const TILE_SIZE: u32 = 256;

/// Latitude limit of the Web Mercator projection, degrees.
const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

const USER_AGENT: &str = concat!("pm25-report/", env!("CARGO_PKG_VERSION"));

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised while assembling a basemap mosaic.
#[derive(Debug, Error)]
pub enum BasemapError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    /// A tile request failed or returned a non-success status.
    #[error("failed to fetch tile {zoom}/{x}/{y}: {source}")]
    Fetch {
        zoom: u8,
        x: u32,
        y: u32,
        #[source]
        source: reqwest::Error,
    },
    /// A tile response was not a decodable image.
    #[error("failed to decode tile {zoom}/{x}/{y}: {source}")]
    Decode {
        zoom: u8,
        x: u32,
        y: u32,
        #[source]
        source: image::ImageError,
    },
}

/// Remote tile-image services the report can draw from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileProvider {
    /// OpenStreetMap standard (Mapnik) tiles.
    OpenStreetMap,
    /// Esri World Street Map tiles.
    EsriWorldStreetMap,
}

impl TileProvider {
    /// URL of a single tile. Esri orders the path `z/y/x`.
    pub fn tile_url(&self, zoom: u8, x: u32, y: u32) -> String {
        match self {
            TileProvider::OpenStreetMap => {
                format!("https://tile.openstreetmap.org/{}/{}/{}.png", zoom, x, y)
            }
            TileProvider::EsriWorldStreetMap => format!(
                "https://server.arcgisonline.com/ArcGIS/rest/services/World_Street_Map/MapServer/tile/{}/{}/{}",
                zoom, y, x
            ),
        }
    }

    /// Deepest zoom level the provider serves.
    pub fn max_zoom(&self) -> u8 {
        19
    }
}

/// Geographic bounds in WGS 84 degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl GeoBounds {
    /// Smallest bounds containing every point. `None` for an empty slice.
    pub fn from_points(points: &[Point<f64>]) -> Option<Self> {
        let first = points.first()?;
        let mut bounds = GeoBounds {
            west: first.x(),
            south: first.y(),
            east: first.x(),
            north: first.y(),
        };
        for p in &points[1..] {
            bounds.west = bounds.west.min(p.x());
            bounds.east = bounds.east.max(p.x());
            bounds.south = bounds.south.min(p.y());
            bounds.north = bounds.north.max(p.y());
        }
        Some(bounds)
    }

    /// Expands the bounds by `fraction` of their extent on every side,
    /// enforcing `min_extent` degrees so a single point still spans a
    /// usable map window.
    pub fn padded(&self, fraction: f64, min_extent: f64) -> Self {
        let width = (self.east - self.west).max(min_extent);
        let height = (self.north - self.south).max(min_extent);
        let cx = (self.east + self.west) / 2.0;
        let cy = (self.north + self.south) / 2.0;
        let half_w = width * (1.0 + 2.0 * fraction) / 2.0;
        let half_h = height * (1.0 + 2.0 * fraction) / 2.0;
        GeoBounds {
            west: cx - half_w,
            east: cx + half_w,
            south: (cy - half_h).max(-MAX_LATITUDE),
            north: (cy + half_h).min(MAX_LATITUDE),
        }
    }

    /// Centre of the bounds as (lon, lat).
    pub fn center(&self) -> (f64, f64) {
        ((self.west + self.east) / 2.0, (self.south + self.north) / 2.0)
    }
}

/// Projects WGS 84 degrees to global pixel coordinates at `zoom`.
///
/// https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames#Implementations
pub fn global_pixel(lon: f64, lat: f64, zoom: u8) -> (f64, f64) {
    let world = world_pixels(zoom) as f64;
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x = (lon + 180.0) / 360.0 * world;
    let y = (1.0 - lat.to_radians().tan().asinh() / std::f64::consts::PI) / 2.0 * world;
    (x, y)
}

/// Tile indices containing the given coordinate at `zoom`.
pub fn tile_indices(lon: f64, lat: f64, zoom: u8) -> (u32, u32) {
    let (x, y) = global_pixel(lon, lat, zoom);
    let max = (1u32 << zoom) - 1;
    (
        ((x / TILE_SIZE as f64) as u32).min(max),
        ((y / TILE_SIZE as f64) as u32).min(max),
    )
}

fn world_pixels(zoom: u8) -> u64 {
    (TILE_SIZE as u64) << zoom
}

/// A pixel window into the Web Mercator plane at a fixed zoom level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub zoom: u8,
    /// Global pixel coordinate of the window's top-left corner.
    origin: (f64, f64),
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Fits `bounds` into a `width`×`height` window at the deepest zoom
    /// level (up to `max_zoom`) where the whole extent stays visible.
    pub fn fit(bounds: &GeoBounds, width: u32, height: u32, max_zoom: u8) -> Self {
        let mut zoom = 1;
        for candidate in (1..=max_zoom).rev() {
            let (x0, y0) = global_pixel(bounds.west, bounds.north, candidate);
            let (x1, y1) = global_pixel(bounds.east, bounds.south, candidate);
            if x1 - x0 <= width as f64 && y1 - y0 <= height as f64 {
                zoom = candidate;
                break;
            }
        }
        let (lon, lat) = bounds.center();
        Self::centered(lon, lat, zoom, width, height)
    }

    /// A window of `width`×`height` pixels centred on (lon, lat) at `zoom`.
    pub fn centered(lon: f64, lat: f64, zoom: u8, width: u32, height: u32) -> Self {
        let world = world_pixels(zoom) as f64;
        let (cx, cy) = global_pixel(lon, lat, zoom);
        let origin_x = (cx - width as f64 / 2.0).clamp(0.0, (world - width as f64).max(0.0));
        let origin_y = (cy - height as f64 / 2.0).clamp(0.0, (world - height as f64).max(0.0));
        Self {
            zoom,
            origin: (origin_x, origin_y),
            width,
            height,
        }
    }

    /// Maps WGS 84 degrees to pixel coordinates within this window.
    pub fn to_canvas(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (x, y) = global_pixel(lon, lat, self.zoom);
        (x - self.origin.0, y - self.origin.1)
    }

    /// Inclusive tile index range covered by the window, clamped to the
    /// valid range for the zoom level.
    fn tile_range(&self) -> (u32, u32, u32, u32) {
        let max = (1u32 << self.zoom) - 1;
        let tx0 = ((self.origin.0 / TILE_SIZE as f64) as u32).min(max);
        let ty0 = ((self.origin.1 / TILE_SIZE as f64) as u32).min(max);
        let tx1 = (((self.origin.0 + self.width as f64 - 1.0) / TILE_SIZE as f64) as u32).min(max);
        let ty1 = (((self.origin.1 + self.height as f64 - 1.0) / TILE_SIZE as f64) as u32).min(max);
        (tx0, ty0, tx1, ty1)
    }
}

/// Fetches every tile covering `viewport` from `provider` and stitches them
/// into an image of exactly `viewport.width`×`viewport.height` pixels.
///
/// One attempt per tile; any failure aborts the mosaic.
pub fn fetch_mosaic(provider: TileProvider, viewport: &Viewport) -> Result<RgbaImage, BasemapError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(BasemapError::Client)?;

    let (tx0, ty0, tx1, ty1) = viewport.tile_range();
    let cols = tx1 - tx0 + 1;
    let rows = ty1 - ty0 + 1;
    debug!(
        "fetching {}x{} tiles at zoom {} from {:?}",
        cols, rows, viewport.zoom, provider
    );

    let mut sheet = RgbaImage::from_pixel(
        cols * TILE_SIZE,
        rows * TILE_SIZE,
        Rgba([255, 255, 255, 255]),
    );
    for ty in ty0..=ty1 {
        for tx in tx0..=tx1 {
            let tile = fetch_tile(&client, provider, viewport.zoom, tx, ty)?;
            image::imageops::overlay(&mut sheet, &tile, (tx - tx0) * TILE_SIZE, (ty - ty0) * TILE_SIZE);
        }
    }

    let crop_x = (viewport.origin.0 - (tx0 as f64) * TILE_SIZE as f64).max(0.0) as u32;
    let crop_y = (viewport.origin.1 - (ty0 as f64) * TILE_SIZE as f64).max(0.0) as u32;
    // At very low zoom levels the world is smaller than the requested
    // window; centre whatever is visible on a blank canvas in that case.
    let crop_w = viewport.width.min(sheet.width().saturating_sub(crop_x));
    let crop_h = viewport.height.min(sheet.height().saturating_sub(crop_y));
    let visible = sheet.view(crop_x, crop_y, crop_w, crop_h).to_image();
    let mosaic = if crop_w == viewport.width && crop_h == viewport.height {
        visible
    } else {
        let mut canvas = RgbaImage::from_pixel(
            viewport.width,
            viewport.height,
            Rgba([255, 255, 255, 255]),
        );
        image::imageops::overlay(
            &mut canvas,
            &visible,
            (viewport.width - crop_w) / 2,
            (viewport.height - crop_h) / 2,
        );
        canvas
    };
    info!(
        "assembled {}x{} px basemap mosaic ({} tiles)",
        mosaic.width(),
        mosaic.height(),
        cols * rows
    );
    Ok(mosaic)
}

fn fetch_tile(
    client: &reqwest::blocking::Client,
    provider: TileProvider,
    zoom: u8,
    x: u32,
    y: u32,
) -> Result<RgbaImage, BasemapError> {
    let url = provider.tile_url(zoom, x, y);
    let bytes = client
        .get(&url)
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.bytes())
        .map_err(|source| BasemapError::Fetch { zoom, x, y, source })?;
    let tile = image::load_from_memory(&bytes)
        .map_err(|source| BasemapError::Decode { zoom, x, y, source })?;
    Ok(tile.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::{global_pixel, tile_indices, GeoBounds, Viewport, TILE_SIZE};
    use geo_types::Point;

    #[test]
    fn tile_index_matches_slippy_reference() {
        // Reference vector from the OSM slippy-map implementation notes.
        assert_eq!(tile_indices(6.0402, 50.7929, 18), (135470, 87999));
    }

    #[test]
    fn null_island_sits_at_world_center() {
        let (x, y) = global_pixel(0.0, 0.0, 3);
        let half_world = (TILE_SIZE as f64) * 4.0;
        assert!((x - half_world).abs() < 1e-6);
        assert!((y - half_world).abs() < 1e-6);
    }

    #[test]
    fn fitted_viewport_contains_the_bounds() {
        let bounds = GeoBounds {
            west: 100.3,
            south: 13.5,
            east: 100.7,
            north: 13.9,
        };
        let viewport = Viewport::fit(&bounds, 1024, 768, 19);
        for (lon, lat) in [
            (bounds.west, bounds.north),
            (bounds.east, bounds.south),
        ] {
            let (x, y) = viewport.to_canvas(lon, lat);
            assert!(x >= -1.0 && x <= 1025.0, "x out of window: {x}");
            assert!(y >= -1.0 && y <= 769.0, "y out of window: {y}");
        }
    }

    #[test]
    fn deeper_zoom_is_chosen_for_smaller_extents() {
        let wide = GeoBounds {
            west: 90.0,
            south: 5.0,
            east: 110.0,
            north: 20.0,
        };
        let narrow = GeoBounds {
            west: 100.50,
            south: 13.75,
            east: 100.51,
            north: 13.76,
        };
        let wide_view = Viewport::fit(&wide, 800, 600, 19);
        let narrow_view = Viewport::fit(&narrow, 800, 600, 19);
        assert!(narrow_view.zoom > wide_view.zoom);
    }

    #[test]
    fn centered_viewport_puts_the_coordinate_in_the_middle() {
        let viewport = Viewport::centered(100.5018, 13.7563, 12, 640, 480);
        let (x, y) = viewport.to_canvas(100.5018, 13.7563);
        assert!((x - 320.0).abs() < 1.0);
        assert!((y - 240.0).abs() < 1.0);
    }

    #[test]
    fn padded_bounds_give_single_points_a_window() {
        let bounds = GeoBounds::from_points(&[Point::new(100.5, 13.75)]).unwrap();
        let padded = bounds.padded(0.1, 0.01);
        assert!(padded.east - padded.west >= 0.01);
        assert!(padded.north - padded.south >= 0.01);
        let (cx, cy) = padded.center();
        assert!((cx - 100.5).abs() < 1e-9);
        assert!((cy - 13.75).abs() < 1e-9);
    }

    #[test]
    fn provider_urls_follow_each_scheme() {
        use super::TileProvider;
        assert_eq!(
            TileProvider::OpenStreetMap.tile_url(12, 1616, 926),
            "https://tile.openstreetmap.org/12/1616/926.png"
        );
        // Esri swaps y and x in the path.
        assert_eq!(
            TileProvider::EsriWorldStreetMap.tile_url(12, 1616, 926),
            "https://server.arcgisonline.com/ArcGIS/rest/services/World_Street_Map/MapServer/tile/12/926/1616"
        );
    }
}
