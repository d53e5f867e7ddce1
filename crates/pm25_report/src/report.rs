//! Report composition.
//!
//! Builds the single-page PDF: obtains the map raster, places it (or the
//! placeholder) beside the description and credit blocks and renders the
//! document to the requested path. Map generation and raster decoding are
//! the two guarded zones; their failures degrade to the placeholder and the
//! report is produced regardless.

use std::fs;
use std::path::Path;

use log::{error, info, warn};
use thiserror::Error;

use crate::basemap::TileProvider;
use crate::content::ReportContent;
use crate::elements::{MapPanel, ReportPage};
use crate::fonts;
use crate::layout::PageLayout;
use crate::map_image;

/// Default output path of the generated report.
pub const DEFAULT_OUTPUT: &str = "report_template_generated_map.pdf";
/// Default dataset consumed by the report.
pub const DEFAULT_DATASET: &str = "pm25.shp";

/// Errors raised while composing the report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The report font family could not be loaded.
    #[error("failed to load report fonts: {0}")]
    Fonts(#[source] genpdf::error::Error),
    /// The document could not be rendered or written.
    #[error("failed to render report to PDF: {0}")]
    Render(#[source] genpdf::error::Error),
}

/// Composes the report for `dataset` into a PDF at `output` with the
/// default layout, content and tile provider.
pub fn compose_report(output: impl AsRef<Path>, dataset: impl AsRef<Path>) -> Result<(), ReportError> {
    compose_report_with(
        output.as_ref(),
        dataset.as_ref(),
        PageLayout::default(),
        ReportContent::default(),
        TileProvider::OpenStreetMap,
    )
}

/// Composes the report with explicit layout, content and tile provider.
pub fn compose_report_with(
    output: &Path,
    dataset: &Path,
    layout: PageLayout,
    content: ReportContent,
    provider: TileProvider,
) -> Result<(), ReportError> {
    let family = fonts::report_font_family().map_err(ReportError::Fonts)?;

    let mut document = genpdf::Document::new(family);
    document.set_title("PM2.5 Air Quality Report");
    document.set_paper_size(genpdf::PaperSize::A4);
    let mut decorator = genpdf::SimplePageDecorator::new();
    decorator.set_margins(genpdf::Margins::all(layout.margin));
    document.set_page_decorator(decorator);

    let panel = build_map_panel(dataset, &layout, provider);
    document.push(ReportPage::new(layout, content, panel));

    document
        .render_to_file(output)
        .map_err(ReportError::Render)?;
    info!("report written to {}", output.display());
    Ok(())
}

/// Generates the map raster and converts it into a page panel.
///
/// Both failure modes end in the placeholder: map generation failing (the
/// dataset did not load, or the raster could not be written) and the
/// generated raster failing to decode. The temporary raster is deleted in
/// every path that created one.
fn build_map_panel(dataset: &Path, layout: &PageLayout, provider: TileProvider) -> MapPanel {
    match map_image::generate_map_image(dataset, layout.map_size_inches(), provider) {
        Ok(raster_path) => {
            let panel = match MapPanel::from_raster(&raster_path) {
                Ok(panel) => panel,
                Err(err) => {
                    error!("could not place map raster in the report: {}", err);
                    MapPanel::Placeholder
                }
            };
            if let Err(err) = fs::remove_file(&raster_path) {
                warn!(
                    "could not remove temporary map file {}: {}",
                    raster_path.display(),
                    err
                );
            }
            panel
        }
        Err(err) => {
            error!("map generation failed: {}", err);
            MapPanel::Placeholder
        }
    }
}
