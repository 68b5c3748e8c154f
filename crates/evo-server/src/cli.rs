//! Command-line surface: the four required flags the launcher supplies for
//! every run, plus the two with sensible defaults.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "evo-server", about = "Asynchronous, rank-biased genetic-algorithm coordinator")]
pub struct Cli {
    #[arg(long = "parameterFile")]
    pub parameter_file: PathBuf,

    #[arg(long = "baseXMLFile")]
    pub base_xml_file: PathBuf,

    #[arg(long = "startingPopulation")]
    pub starting_population: PathBuf,

    #[arg(long = "serverPort")]
    pub server_port: u16,

    #[arg(long = "outputDirectory")]
    pub output_directory: Option<PathBuf>,

    #[arg(long = "logLevel", default_value_t = 0)]
    pub log_level: usize,
}

impl Cli {
    /// `Run_YYYY-MM-DD_HH.MM.SS` in the local timezone when `--outputDirectory`
    /// was not given.
    pub fn resolved_output_directory(&self) -> PathBuf {
        self.output_directory.clone().unwrap_or_else(|| {
            let stamp = chrono::Local::now().format("Run_%Y-%m-%d_%H.%M.%S");
            PathBuf::from(stamp.to_string())
        })
    }
}
