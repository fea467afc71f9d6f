#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the deforestation analysis pipeline.
//!
//! Every subcommand loads one table (from `--file` or `--url`), runs the
//! shared preparation stages and then writes one output: the analysis
//! report, the cleaned table, or a filtered and clustered `GeoJSON` map.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use deforest_map_analytics_models::InterpolationMethod;
use deforest_map_geography::filter::default_spec;
use deforest_map_geography_models::{FilterClause, FilterSpec};
use deforest_map_pipeline::{AnalysisConfig, Prepared, Source, load, prepare};
use deforest_map_spatial::WorldOutline;
use deforest_map_table::export::write_csv;

#[derive(Parser)]
#[command(name = "deforest_map", about = "Deforestation exploratory analysis")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct InputArgs {
    /// Local CSV file (optionally gzip-compressed, see `input.gzip`)
    #[arg(long, conflicts_with = "url", required_unless_present = "url")]
    file: Option<PathBuf>,
    /// HTTP(S) URL of a CSV file
    #[arg(long)]
    url: Option<String>,
    /// TOML file overriding the embedded default configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Gap filling method (e.g. `linear`, `pchip`, `spline`)
    #[arg(long)]
    method: Option<InterpolationMethod>,
    /// `GeoJSON` outline; points outside it are reported as warnings
    #[arg(long)]
    outline: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the statistics report as JSON
    Analyze {
        #[command(flatten)]
        input: InputArgs,
        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write the cleaned, gap-filled table as CSV
    Export {
        #[command(flatten)]
        input: InputArgs,
        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Filter and cluster the points and write them as `GeoJSON`
    Map {
        #[command(flatten)]
        input: InputArgs,
        /// Filter clause, `column=low..high` or `column=a,b` (repeatable)
        #[arg(long = "filter")]
        filters: Vec<FilterClause>,
        /// Start from the default filter widgets instead of no filters
        #[arg(long)]
        default_filters: bool,
        /// Number of severity clusters (defaults to `clustering.bins`)
        #[arg(long)]
        bins: Option<usize>,
        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List how each header maps onto the observation schema
    Columns {
        #[command(flatten)]
        input: InputArgs,
    },
}

impl InputArgs {
    fn source(&self) -> Result<Source, Box<dyn std::error::Error>> {
        match (&self.file, &self.url) {
            (Some(path), _) => Ok(Source::File(path.clone())),
            (None, Some(url)) => Ok(Source::Url(url.clone())),
            (None, None) => Err("one of --file or --url is required".into()),
        }
    }

    fn config(&self) -> Result<AnalysisConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_path(path)?,
            None => AnalysisConfig::embedded()?,
        };
        if let Some(method) = self.method {
            config.gap_fill.method = method;
        }
        Ok(config)
    }

    async fn prepare(&self) -> Result<Prepared, Box<dyn std::error::Error>> {
        let config = self.config()?;
        let raw = load(&self.source()?, &config).await?;
        let mut prepared = prepare(&raw, &config)?;

        if let Some(path) = &self.outline {
            let outline = WorldOutline::from_geojson(&std::fs::read_to_string(path)?)?;
            log::info!(
                "Loaded {} outline polygons from {}",
                outline.polygon_count(),
                path.display()
            );
            prepared = prepared.with_outline(&outline);
        }

        for warning in &prepared.warnings {
            log::warn!("{warning}");
        }
        Ok(prepared)
    }
}

fn write_output(output: Option<&Path>, text: &str) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        Some(path) => {
            std::fs::write(path, text)?;
            log::info!("Wrote {} bytes to {}", text.len(), path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze { input, output } => {
            let prepared = input.prepare().await?;
            write_output(output.as_deref(), &prepared.report().to_json()?)?;
        }
        Commands::Export { input, output } => {
            let prepared = input.prepare().await?;
            match output {
                Some(path) => {
                    write_csv(&prepared.table, std::fs::File::create(&path)?)?;
                    log::info!("Wrote {} rows to {}", prepared.table.len(), path.display());
                }
                None => write_csv(&prepared.table, std::io::stdout().lock())?,
            }
        }
        Commands::Map {
            input,
            filters,
            default_filters,
            bins,
            output,
        } => {
            let prepared = input.prepare().await?;

            let base = if default_filters {
                prepared
                    .controls
                    .value()
                    .map_or_else(FilterSpec::new, |controls| default_spec(controls))
            } else {
                FilterSpec::new()
            };
            let spec = filters.into_iter().fold(base, FilterSpec::with_clause);

            let view = match bins {
                Some(bins) => prepared.explore(&spec, bins)?,
                None => prepared.explore_default(&spec)?,
            };
            if let Some(summary) = view.clusters.value() {
                for label in 0..summary.bins() {
                    if let Some((low, high)) = summary.range_of(label) {
                        log::info!(
                            "Cluster {label}: [{low}, {high}] ({} points)",
                            summary.counts[label]
                        );
                    }
                }
            }
            write_output(output.as_deref(), &view.to_geojson())?;
        }
        Commands::Columns { input } => {
            let config = input.config()?;
            let raw = load(&input.source()?, &config).await?;
            let schema = config.mapping().schema_for(raw.headers())?;

            println!("{:<32} {:<20} KIND", "HEADER", "FIELD");
            println!("{}", "-".repeat(64));
            for column in schema.columns() {
                let field = column
                    .field()
                    .map_or_else(|| "-".to_string(), |f| f.to_string());
                println!("{:<32} {:<20} {}", column.name, field, column.kind);
            }
            println!();
            println!("{} rows", raw.len());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_map_arguments() {
        let cli = Cli::try_parse_from([
            "deforest_map",
            "map",
            "--file",
            "observations.csv",
            "--method",
            "pchip",
            "--filter",
            "altitude=100..200",
            "--filter",
            "vegetation_type=Selva,Bosque",
            "--bins",
            "4",
        ])
        .unwrap();
        let Commands::Map {
            input,
            filters,
            bins,
            default_filters,
            ..
        } = cli.command
        else {
            panic!("expected the map subcommand");
        };
        assert_eq!(input.method, Some(InterpolationMethod::Pchip));
        assert_eq!(input.file, Some(PathBuf::from("observations.csv")));
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].column, "altitude");
        assert_eq!(bins, Some(4));
        assert!(!default_filters);
    }

    #[test]
    fn rejects_bad_input_arguments() {
        assert!(Cli::try_parse_from(["deforest_map", "analyze"]).is_err());
        assert!(
            Cli::try_parse_from([
                "deforest_map",
                "analyze",
                "--file",
                "a.csv",
                "--url",
                "https://example.org/a.csv",
            ])
            .is_err()
        );
        assert!(
            Cli::try_parse_from(["deforest_map", "export", "--file", "a.csv", "--method", "cubic"])
                .is_err()
        );
        assert!(
            Cli::try_parse_from(["deforest_map", "map", "--file", "a.csv", "--filter", "altitude"])
                .is_err()
        );
    }
}
