//! Command-line arguments for the census report tool

use crate::types::Stressor;
use clap::Parser;
use std::path::PathBuf;

fn parse_stressor(s: &str) -> Result<Stressor, String> {
    s.parse::<Stressor>().map_err(|e| e.to_string())
}

#[derive(Parser, Debug)]
#[command(name = "colony_census")]
#[command(version)]
#[command(about = "Clean quarterly honeybee colony census data and test stressor impact by group", long_about = None)]
pub struct Cli {
    /// Census table (one row per state and period)
    #[arg(long, value_name = "CSV", default_value = "updated_colony_data.csv")]
    pub census: PathBuf,

    /// State -> state code -> region lookup
    #[arg(long, value_name = "CSV", default_value = "regions.csv")]
    pub regions: PathBuf,

    /// TOML file with classifier and report settings
    #[arg(short, long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Directory that receives CSV and JSON outputs
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub out_dir: PathBuf,

    /// Stressor used for the most/least impacted state report
    #[arg(long, value_parser = parse_stressor, default_value = "varroa_mites")]
    pub stressor: Stressor,

    /// State used for the restoration-rate headline
    #[arg(long)]
    pub state: Option<String>,

    /// Load, clean and write every report, then exit without the menu
    #[arg(long)]
    pub batch: bool,
}
