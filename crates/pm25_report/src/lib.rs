//! Core entry point for the pm25_report crate.

pub mod basemap;
pub mod content;
pub mod dataset;
pub mod elements;
pub mod fonts;
pub mod layout;
pub mod map_image;
pub mod probe;
pub mod report;
