//! The report page as a `genpdf` element, plus image decoding helpers.
//!
//! The whole report is one fixed-geometry page: a custom element splits the
//! usable area into the map column and the side column, pins the credit
//! block to the bottom quarter of the side column and renders every text
//! block line by line through the low-level area API.

use std::path::Path;

use image::GenericImageView;

use genpdf::elements::Image;
use genpdf::error::{Context as _, Error, ErrorKind};
use genpdf::style::{Color, Style};
use genpdf::{render, Alignment, Element, Position, RenderResult, Scale, Size};

use crate::content::ReportContent;
use crate::layout::PageLayout;

const DEFAULT_IMAGE_DPI: f64 = 300.0;
const MM_PER_INCH: f64 = 25.4;

/// Inner padding of the text regions, millimetres.
const REGION_PADDING_MM: f64 = 3.5;
/// Gap between a region heading and its body lines, millimetres.
const HEADING_GAP_MM: f64 = 2.0;
/// Left inset of the map placeholder text, millimetres.
const PLACEHOLDER_INSET_MM: f64 = 12.0;

const HEADING_COLOR: Color = Color::Rgb(0, 0, 255);

fn mm_from_f64(value: f64) -> genpdf::Mm {
    genpdf::Mm::from(printpdf::Mm(value))
}

fn mm_to_f64(value: genpdf::Mm) -> f64 {
    let mm: printpdf::Mm = value.into();
    mm.0
}

fn estimated_image_size(image: &image::DynamicImage, dpi: f64) -> Size {
    let (px_width, px_height) = image.dimensions();
    let width_mm = MM_PER_INCH * (px_width as f64) / dpi;
    let height_mm = MM_PER_INCH * (px_height as f64) / dpi;
    Size::new(mm_from_f64(width_mm), mm_from_f64(height_mm))
}

/// Loads an image from the given path using the [`image`] crate with descriptive errors.
pub fn decode_image_from_path(path: impl AsRef<Path>) -> Result<image::DynamicImage, Error> {
    let path = path.as_ref();
    let reader = image::io::Reader::open(path)
        .with_context(|| format!("Failed to open image file {}", path.display()))?;
    reader
        .with_guessed_format()
        .context("Unable to determine image format")?
        .decode()
        .with_context(|| format!("Failed to decode image file {}", path.display()))
}

/// Converts the image at `path` into a `genpdf` image together with its
/// natural size at the raster resolution.
pub fn image_from_path(path: impl AsRef<Path>) -> Result<(Image, Size), Error> {
    let dynamic = decode_image_from_path(path)?;
    let size = estimated_image_size(&dynamic, DEFAULT_IMAGE_DPI);
    let image = Image::from_dynamic_image(dynamic)?;
    Ok((image, size))
}

/// What the map region shows: the generated raster, or the placeholder
/// lines when no raster is available.
pub enum MapPanel {
    /// The generated map raster and its natural size in millimetres.
    Image { image: Image, natural_size: Size },
    /// No raster; the content's placeholder lines are drawn instead.
    Placeholder,
}

impl MapPanel {
    /// Builds the image variant from a raster file on disk.
    pub fn from_raster(path: impl AsRef<Path>) -> Result<Self, Error> {
        let (image, natural_size) = image_from_path(path)?;
        Ok(MapPanel::Image {
            image,
            natural_size,
        })
    }
}

/// The single report page: map column beside description and credit blocks.
pub struct ReportPage {
    layout: PageLayout,
    content: ReportContent,
    panel: MapPanel,
}

impl ReportPage {
    /// Creates the page element.
    pub fn new(layout: PageLayout, content: ReportContent, panel: MapPanel) -> Self {
        Self {
            layout,
            content,
            panel,
        }
    }

    fn render_map_panel(
        &mut self,
        context: &genpdf::Context,
        mut area: render::Area<'_>,
        style: Style,
    ) -> Result<(), Error> {
        match &mut self.panel {
            MapPanel::Image {
                image,
                natural_size,
            } => {
                let region = area.size();
                let natural_w = mm_to_f64(natural_size.width);
                let natural_h = mm_to_f64(natural_size.height);
                if natural_w > f64::EPSILON && natural_h > f64::EPSILON {
                    let scale = (mm_to_f64(region.width) / natural_w)
                        .min(mm_to_f64(region.height) / natural_h);
                    image.set_scale(Scale::new(scale, scale));
                    let pad = (mm_to_f64(region.height) - natural_h * scale) / 2.0;
                    if pad > 0.0 {
                        area.add_offset(Position::new(0, mm_from_f64(pad)));
                    }
                }
                image.set_alignment(Alignment::Center);
                image.render(context, area, style)?;
            }
            MapPanel::Placeholder => {
                let middle = mm_to_f64(area.size().height) / 2.0;
                area.add_offset(Position::new(
                    mm_from_f64(PLACEHOLDER_INSET_MM),
                    mm_from_f64(middle),
                ));
                let caption_style = style.bold().with_font_size(16);
                render_lines(
                    &mut area,
                    context,
                    caption_style,
                    &self.content.map_placeholder_lines,
                )?;
            }
        }
        Ok(())
    }

    fn render_side_column(
        &self,
        context: &genpdf::Context,
        area: render::Area<'_>,
        style: Style,
    ) -> Result<(), Error> {
        let column_height = mm_to_f64(area.size().height);
        let description_height = column_height * self.layout.description_height_ratio;

        let mut description_area = area.clone();
        description_area.set_height(mm_from_f64(description_height));
        description_area.add_offset(Position::new(
            mm_from_f64(REGION_PADDING_MM),
            mm_from_f64(REGION_PADDING_MM),
        ));
        let heading_style = style
            .bold()
            .with_font_size(16)
            .with_color(HEADING_COLOR);
        render_line(
            &mut description_area,
            context,
            heading_style,
            &self.content.description_heading,
        )?;
        description_area.add_offset(Position::new(0, mm_from_f64(HEADING_GAP_MM)));
        let body_style = style.with_font_size(10);
        render_lines(
            &mut description_area,
            context,
            body_style,
            &self.content.description_lines,
        )?;

        let mut credit_area = area;
        credit_area.add_offset(Position::new(
            mm_from_f64(REGION_PADDING_MM),
            mm_from_f64(description_height + REGION_PADDING_MM),
        ));
        let credit_heading_style = style.bold().with_font_size(12);
        render_line(
            &mut credit_area,
            context,
            credit_heading_style,
            &self.content.credit_heading,
        )?;
        credit_area.add_offset(Position::new(0, mm_from_f64(HEADING_GAP_MM)));
        render_lines(&mut credit_area, context, body_style, &self.content.credit_lines)?;

        Ok(())
    }
}

impl Element for ReportPage {
    fn render(
        &mut self,
        context: &genpdf::Context,
        area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        let full_size = area.size();
        let mut columns = area
            .split_horizontally(&self.layout.column_weights())
            .into_iter();
        let (map_area, side_area) = match (columns.next(), columns.next()) {
            (Some(map), Some(side)) => (map, side),
            _ => {
                return Err(Error::new(
                    "page area could not be split into columns",
                    ErrorKind::InvalidData,
                ))
            }
        };

        self.render_map_panel(context, map_area, style)?;
        self.render_side_column(context, side_area, style)?;

        let mut result = RenderResult::default();
        result.size = full_size;
        Ok(result)
    }
}

/// Prints one text line at the top of the area and advances past it.
fn render_line(
    area: &mut render::Area<'_>,
    context: &genpdf::Context,
    style: Style,
    line: &str,
) -> Result<(), Error> {
    let line_height = style.line_height(&context.font_cache);
    if line_height > area.size().height {
        return Ok(());
    }
    if !line.is_empty() {
        if let Some(mut section) = area.text_section(&context.font_cache, Position::new(0, 0), style)
        {
            section.print_str(line, style)?;
        }
    }
    area.add_offset(Position::new(0, line_height));
    Ok(())
}

/// Prints lines one under another, stopping silently when the area is full.
fn render_lines(
    area: &mut render::Area<'_>,
    context: &genpdf::Context,
    style: Style,
    lines: &[String],
) -> Result<(), Error> {
    for line in lines {
        render_line(area, context, style, line)?;
    }
    Ok(())
}
