//! Manual basemap snapshots.
//!
//! Fetches the basemap at a few fixed coordinates and zoom levels and
//! writes plain PNG files next to the working directory. The files are for
//! human inspection; nothing consumes them.

use std::error::Error;

use geo_types::Point;
use image::{Rgba, RgbaImage};
use log::{error, info};

use crate::basemap::{self, TileProvider, Viewport};
use crate::dataset::PointDataset;
use crate::map_image;

const SNAPSHOT_WIDTH: u32 = 2400;
const SNAPSHOT_HEIGHT: u32 = 1800;

const FALLBACK_BACKGROUND: Rgba<u8> = Rgba([211, 211, 211, 255]);

struct Spot {
    name: &'static str,
    lon: f64,
    lat: f64,
    zoom: u8,
}

const SPOTS: &[Spot] = &[
    Spot {
        name: "bangkok",
        lon: 100.5018,
        lat: 13.7563,
        zoom: 12,
    },
    Spot {
        name: "bangkok",
        lon: 100.5018,
        lat: 13.7563,
        zoom: 8,
    },
    Spot {
        name: "bangkok",
        lon: 100.5018,
        lat: 13.7563,
        zoom: 16,
    },
];

/// Fetches one snapshot per spot and saves it as a PNG.
///
/// A failed fetch is logged and replaced by a gray background with a
/// caption; the save is still attempted so every spot leaves a file to
/// look at.
pub fn run() -> Result<(), Box<dyn Error>> {
    for spot in SPOTS {
        let filename = format!("test_map_{}_z{}.png", spot.name, spot.zoom);
        info!(
            "fetching basemap snapshot at ({}, {}), zoom {}",
            spot.lat, spot.lon, spot.zoom
        );

        let dataset = PointDataset::from_wgs84_points(vec![Point::new(spot.lon, spot.lat)]);
        let center = match dataset.wgs84_points().first() {
            Some(point) => *point,
            None => continue,
        };
        let viewport = Viewport::centered(
            center.x(),
            center.y(),
            spot.zoom,
            SNAPSHOT_WIDTH,
            SNAPSHOT_HEIGHT,
        );
        let canvas = match basemap::fetch_mosaic(TileProvider::EsriWorldStreetMap, &viewport) {
            Ok(mosaic) => mosaic,
            Err(err) => {
                error!("failed to fetch basemap for {}: {}", filename, err);
                let mut gray =
                    RgbaImage::from_pixel(SNAPSHOT_WIDTH, SNAPSHOT_HEIGHT, FALLBACK_BACKGROUND);
                map_image::draw_caption(
                    &mut gray,
                    "Map loading failed. Check internet connection or zoom.",
                );
                gray
            }
        };

        match canvas.save(&filename) {
            Ok(()) => info!("snapshot saved to {}", filename),
            Err(err) => error!("failed to save {}: {}", filename, err),
        }
    }
    Ok(())
}
