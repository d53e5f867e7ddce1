//! Point dataset loading.
//!
//! Reads point geometries from a shapefile and the coordinate reference
//! system from the `.prj` sidecar. The dataset is read once and only ever
//! consumed as WGS 84 longitude/latitude pairs; EPSG:3857 input is
//! inverse-projected with the closed-form spherical formula and anything
//! else is treated as longitude/latitude after a warning, matching the
//! best-effort behavior of plotting unprojected data.

use std::f64::consts::FRAC_PI_2;
use std::fs;
use std::path::{Path, PathBuf};

use geo_types::Point;
use log::{info, warn};
use thiserror::Error;

/// Spherical earth radius used by the Web Mercator projection, in metres.
const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Errors raised while loading a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The `.shp` file could not be opened or parsed.
    #[error("failed to read shapefile {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: shapefile::Error,
    },
    /// The file parsed but held no point or multipoint geometries.
    #[error("shapefile {path} contains no point geometries")]
    NoPoints { path: PathBuf },
}

/// Coordinate reference system of a dataset, as far as the report needs to
/// distinguish them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Crs {
    /// EPSG:4326, longitude/latitude degrees.
    Wgs84,
    /// EPSG:3857, spherical Web Mercator metres.
    WebMercator,
    /// Any other EPSG code; coordinates are passed through unchanged.
    Epsg(u32),
}

impl Crs {
    fn from_epsg(code: u32) -> Self {
        match code {
            4326 => Crs::Wgs84,
            3857 => Crs::WebMercator,
            other => Crs::Epsg(other),
        }
    }

    /// The EPSG code this CRS was detected from.
    pub fn epsg_code(&self) -> u32 {
        match self {
            Crs::Wgs84 => 4326,
            Crs::WebMercator => 3857,
            Crs::Epsg(code) => *code,
        }
    }
}

/// An immutable collection of geographic points with their CRS.
#[derive(Clone, Debug)]
pub struct PointDataset {
    points: Vec<Point<f64>>,
    crs: Crs,
}

impl PointDataset {
    /// Reads the point geometries of the shapefile at `path`.
    ///
    /// The `.prj` sidecar next to the `.shp` file is consulted for the CRS;
    /// a missing or unparsable sidecar defaults to WGS 84. Non-point shapes
    /// in the file are skipped.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let shapes = shapefile::read_shapes(path).map_err(|source| DatasetError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut points = Vec::new();
        for shape in shapes {
            collect_points(shape, &mut points);
        }
        if points.is_empty() {
            return Err(DatasetError::NoPoints {
                path: path.to_path_buf(),
            });
        }

        let crs = read_sidecar_crs(path);
        info!(
            "loaded {} point(s) from {} (EPSG:{})",
            points.len(),
            path.display(),
            crs.epsg_code()
        );
        Ok(Self { points, crs })
    }

    /// Builds an in-memory dataset from WGS 84 points, as the basemap probe
    /// does for its single-point snapshots.
    pub fn from_wgs84_points(points: Vec<Point<f64>>) -> Self {
        Self {
            points,
            crs: Crs::Wgs84,
        }
    }

    /// Number of points in the dataset.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the dataset holds no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The detected coordinate reference system.
    pub fn crs(&self) -> Crs {
        self.crs
    }

    /// The dataset's points converted to WGS 84 longitude/latitude.
    pub fn wgs84_points(&self) -> Vec<Point<f64>> {
        match self.crs {
            Crs::Wgs84 => self.points.clone(),
            Crs::WebMercator => self
                .points
                .iter()
                .map(|p| {
                    let (lon, lat) = mercator_to_lon_lat(p.x(), p.y());
                    Point::new(lon, lat)
                })
                .collect(),
            Crs::Epsg(code) => {
                warn!(
                    "unsupported CRS EPSG:{}; treating coordinates as longitude/latitude",
                    code
                );
                self.points.clone()
            }
        }
    }
}

fn collect_points(shape: shapefile::Shape, out: &mut Vec<Point<f64>>) {
    use shapefile::Shape;

    match shape {
        Shape::Point(p) => out.push(Point::new(p.x, p.y)),
        Shape::PointM(p) => out.push(Point::new(p.x, p.y)),
        Shape::PointZ(p) => out.push(Point::new(p.x, p.y)),
        Shape::Multipoint(mp) => out.extend(mp.points().iter().map(|p| Point::new(p.x, p.y))),
        Shape::MultipointM(mp) => out.extend(mp.points().iter().map(|p| Point::new(p.x, p.y))),
        Shape::MultipointZ(mp) => out.extend(mp.points().iter().map(|p| Point::new(p.x, p.y))),
        other => {
            warn!("skipping non-point shape: {}", other.shapetype());
        }
    }
}

/// Reads the CRS from the `.prj` sidecar of `shp_path`.
///
/// The sidecar holds the CRS as WKT; the last `AUTHORITY["EPSG","…"]` entry
/// names the coordinate system itself (earlier ones belong to the datum and
/// its components). Absent or unreadable sidecars default to WGS 84.
fn read_sidecar_crs(shp_path: &Path) -> Crs {
    let prj_path = shp_path.with_extension("prj");
    match fs::read_to_string(&prj_path) {
        Ok(wkt) => match parse_epsg_authority(&wkt) {
            Some(code) => Crs::from_epsg(code),
            None => {
                warn!(
                    "no EPSG authority in {}; assuming WGS 84",
                    prj_path.display()
                );
                Crs::Wgs84
            }
        },
        Err(_) => {
            warn!("no .prj sidecar at {}; assuming WGS 84", prj_path.display());
            Crs::Wgs84
        }
    }
}

/// Extracts the EPSG code from the last `AUTHORITY` entry of a WKT string.
fn parse_epsg_authority(wkt: &str) -> Option<u32> {
    let marker = "AUTHORITY[\"EPSG\",\"";
    let start = wkt.rfind(marker)? + marker.len();
    let rest = &wkt[start..];
    let end = rest.find('"')?;
    rest[..end].parse().ok()
}

/// Inverse spherical Web Mercator: metres to degrees.
fn mercator_to_lon_lat(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS_M).to_degrees();
    let lat = ((y / EARTH_RADIUS_M).exp().atan() * 2.0 - FRAC_PI_2).to_degrees();
    (lon, lat)
}

#[cfg(test)]
mod tests {
    use super::{
        mercator_to_lon_lat, parse_epsg_authority, Crs, DatasetError, PointDataset,
        EARTH_RADIUS_M,
    };
    use std::fs;

    const WGS84_WKT: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433],AUTHORITY["EPSG","4326"]]"#;

    const MERCATOR_WKT: &str = r#"PROJCS["WGS 84 / Pseudo-Mercator",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4326"]],PROJECTION["Mercator_1SP"],UNIT["metre",1,AUTHORITY["EPSG","9001"]],AUTHORITY["EPSG","3857"]]"#;

    #[test]
    fn parses_epsg_from_geographic_wkt() {
        assert_eq!(parse_epsg_authority(WGS84_WKT), Some(4326));
    }

    #[test]
    fn last_authority_wins_in_projected_wkt() {
        assert_eq!(parse_epsg_authority(MERCATOR_WKT), Some(3857));
    }

    #[test]
    fn missing_authority_yields_none() {
        assert_eq!(parse_epsg_authority("LOCAL_CS[\"None\"]"), None);
    }

    #[test]
    fn crs_mapping_recognizes_known_codes() {
        assert_eq!(Crs::from_epsg(4326), Crs::Wgs84);
        assert_eq!(Crs::from_epsg(3857), Crs::WebMercator);
        assert_eq!(Crs::from_epsg(32647), Crs::Epsg(32647));
    }

    #[test]
    fn mercator_inverse_matches_forward_projection() {
        // Forward spherical Web Mercator for the test vector.
        let lon = 100.5018_f64;
        let lat = 13.7563_f64;
        let x = lon.to_radians() * EARTH_RADIUS_M;
        let y = (lat.to_radians() / 2.0 + std::f64::consts::FRAC_PI_4)
            .tan()
            .ln()
            * EARTH_RADIUS_M;

        let (lon_back, lat_back) = mercator_to_lon_lat(x, y);
        assert!((lon_back - lon).abs() < 1e-9);
        assert!((lat_back - lat).abs() < 1e-9);
    }

    #[test]
    fn origin_round_trips_to_null_island() {
        let (lon, lat) = mercator_to_lon_lat(0.0, 0.0);
        assert!(lon.abs() < 1e-12);
        assert!(lat.abs() < 1e-12);
    }

    #[test]
    fn reads_points_and_sidecar_crs_from_disk() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let shp = dir.path().join("stations.shp");

        let writer = shapefile::ShapeWriter::from_path(&shp).expect("create shapefile");
        writer
            .write_shapes(&vec![
                shapefile::Point::new(100.50, 13.75),
                shapefile::Point::new(100.52, 13.76),
            ])
            .expect("write shapes");
        fs::write(shp.with_extension("prj"), WGS84_WKT).expect("write sidecar");

        let dataset = PointDataset::from_path(&shp).expect("load dataset");
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.crs(), Crs::Wgs84);

        let points = dataset.wgs84_points();
        assert!((points[0].x() - 100.50).abs() < 1e-9);
        assert!((points[1].y() - 13.76).abs() < 1e-9);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = PointDataset::from_path("definitely_missing.shp").unwrap_err();
        assert!(matches!(err, DatasetError::Read { .. }));
    }
}
