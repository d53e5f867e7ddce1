//! Font loading for the report.
//!
//! The report text is Thai, set in THSarabunNew. Loading is an explicit
//! initialization step that returns a result instead of a global
//! registration attempted at import time: callers decide what a missing
//! font family means for them, and tests can probe availability first.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use genpdf::error::Error;
use genpdf::fonts::{FontData, FontFamily};

/// Name of the report font family.
pub const FONT_FAMILY_NAME: &str = "THSarabunNew";

struct FamilyFiles {
    regular: &'static str,
    bold: &'static str,
    italic: &'static str,
    bold_italic: &'static str,
}

const FONT_FILES: FamilyFiles = FamilyFiles {
    regular: "THSarabunNew.ttf",
    bold: "THSarabunNew Bold.ttf",
    italic: "THSarabunNew Italic.ttf",
    bold_italic: "THSarabunNew BoldItalic.ttf",
};

fn all_files() -> [&'static str; 4] {
    [
        FONT_FILES.regular,
        FONT_FILES.bold,
        FONT_FILES.italic,
        FONT_FILES.bold_italic,
    ]
}

fn font_directory_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(path) = env::var("PM25_REPORT_FONTS_DIR") {
        if !path.trim().is_empty() {
            candidates.push(PathBuf::from(path));
        }
    }

    if let Ok(current_exe) = env::current_exe() {
        if let Some(bin_dir) = current_exe.parent() {
            let candidate = bin_dir.join("assets/fonts");
            if !candidates.iter().any(|existing| existing == &candidate) {
                candidates.push(candidate);
            }
        }
    }

    let manifest_candidate = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts");
    if !candidates
        .iter()
        .any(|existing| existing == &manifest_candidate)
    {
        candidates.push(manifest_candidate);
    }

    candidates
}

fn missing_font_files(path: &Path) -> Vec<PathBuf> {
    all_files()
        .iter()
        .map(|name| path.join(name))
        .filter(|candidate| !candidate.is_file())
        .collect()
}

fn resolve_font_directory() -> Result<PathBuf, Error> {
    let mut attempts = Vec::new();

    for candidate in font_directory_candidates() {
        let exists = candidate.is_dir();
        let missing = missing_font_files(&candidate);

        if exists && missing.is_empty() {
            return Ok(candidate);
        }

        let reason = if !exists {
            format!("directory missing at {}", candidate.display())
        } else {
            let missing_list = missing
                .iter()
                .map(|path| path.file_name().unwrap_or_default().to_string_lossy())
                .collect::<Vec<_>>()
                .join(", ");
            format!("missing files [{}]", missing_list)
        };

        attempts.push(format!("{} ({})", candidate.display(), reason));
    }

    let summary = if attempts.is_empty() {
        "no search paths were available".to_owned()
    } else {
        attempts.join(", ")
    };

    Err(Error::new(
        format!(
            "Unable to locate the {} font directory. Checked: {}. See assets/fonts/README.md or set PM25_REPORT_FONTS_DIR.",
            FONT_FAMILY_NAME, summary
        ),
        io::Error::new(io::ErrorKind::NotFound, "report fonts directory not found"),
    ))
}

fn load_style(directory: &Path, file: &str, style: &str) -> Result<FontData, Error> {
    let path = directory.join(file);
    FontData::load(&path, None).map_err(|err| {
        Error::new(
            format!(
                "Failed to load {} {} font at {}: {}",
                FONT_FAMILY_NAME,
                style,
                path.display(),
                err
            ),
            io::Error::new(io::ErrorKind::Other, err.to_string()),
        )
    })
}

/// Loads the THSarabunNew family (regular, bold, italic, bold-italic).
pub fn report_font_family() -> Result<FontFamily<FontData>, Error> {
    let directory = resolve_font_directory()?;

    Ok(FontFamily {
        regular: load_style(&directory, FONT_FILES.regular, "regular")?,
        bold: load_style(&directory, FONT_FILES.bold, "bold")?,
        italic: load_style(&directory, FONT_FILES.italic, "italic")?,
        bold_italic: load_style(&directory, FONT_FILES.bold_italic, "bold italic")?,
    })
}

/// Path of the regular-weight font file, used for raster captions.
pub fn regular_font_path() -> Option<PathBuf> {
    font_directory_candidates()
        .into_iter()
        .map(|dir| dir.join(FONT_FILES.regular))
        .find(|path| path.is_file())
}

/// Indicates whether all four report font files are present on disk.
pub fn fonts_available() -> bool {
    resolve_font_directory().is_ok()
}
