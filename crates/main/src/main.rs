use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Runs the PM2.5 report tools from the command line.
///
/// Fonts must be present under `assets/fonts` relative to the `pm25_report`
/// crate or provided via the `PM25_REPORT_FONTS_DIR` environment variable
/// before running the commands below.
#[derive(Parser)]
#[command(author, version, about = "PM2.5 air-quality report CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the PM2.5 report PDF from a shapefile of measurement points.
    #[command(name = "report")]
    Report {
        /// Path of the PDF to write.
        #[arg(long, default_value = pm25_report::report::DEFAULT_OUTPUT)]
        output: PathBuf,

        /// Path of the point shapefile to plot.
        #[arg(long, default_value = pm25_report::report::DEFAULT_DATASET)]
        shapefile: PathBuf,
    },

    /// Fetch basemap snapshots at fixed coordinates for visual inspection.
    #[command(name = "test-basemap", aliases = ["test_basemap", "basemap"])]
    TestBasemap,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn Error>> = match cli.command {
        Commands::Report { output, shapefile } => {
            pm25_report::report::compose_report(&output, &shapefile).map_err(Into::into)
        }
        Commands::TestBasemap => pm25_report::probe::run(),
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        print_error_sources(err.as_ref());
        std::process::exit(1);
    }
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {}", source);
        error = source;
    }
}
