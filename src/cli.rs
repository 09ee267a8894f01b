use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::aggregate::WorstTieBreak;
use crate::table::DEFAULT_DELIMITER;

#[derive(Parser, Debug)]
#[command(
    name = "optimum-cases",
    version,
    about = "Worst, average and best case summaries of optimization experiments"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Ingest(IngestArgs),
    Report(ReportArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    #[arg(long, default_value = ".cache/optimum")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub results_path: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_DELIMITER)]
    pub delimiter: char,

    #[arg(long)]
    pub ingest_manifest_path: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum TieBreakMode {
    Lexicographic,
    Legacy,
}

impl TieBreakMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lexicographic => "lexicographic",
            Self::Legacy => "legacy",
        }
    }

    pub fn into_tie_break(self) -> WorstTieBreak {
        match self {
            Self::Lexicographic => WorstTieBreak::Lexicographic,
            Self::Legacy => WorstTieBreak::LegacyShortCircuit,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[arg(long, default_value = ".cache/optimum")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub results_path: Option<PathBuf>,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_DELIMITER)]
    pub delimiter: char,

    #[arg(long)]
    pub output_path: Option<PathBuf>,

    #[arg(long)]
    pub report_manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub success_only: bool,

    #[arg(long, value_enum)]
    pub worst_tie_break: Option<TieBreakMode>,

    #[arg(long = "metric")]
    pub objective_metrics: Vec<String>,

    #[arg(long = "algo")]
    pub optim_algos: Vec<String>,

    #[arg(long = "model")]
    pub we_models: Vec<String>,

    #[arg(long = "ground-truth")]
    pub ground_truth_names: Vec<String>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/optimum")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}
