use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use super::{cli::cli_model, utils::init_log};

#[derive(Debug)]
pub struct Config {
    // Input metrics files
    inputs: Vec<PathBuf>,
    // Output file prefix
    output_prefix: String,
    compress: bool,
    // File the metrics were derived from (e.g., source bam); used to fill
    // the provenance column in the output
    derived_from: Option<PathBuf>,
    threads: usize,
}

impl Config {
    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }
    pub fn output_prefix(&self) -> &str {
        &self.output_prefix
    }
    pub fn compress(&self) -> bool {
        self.compress
    }
    pub fn derived_from(&self) -> Option<&Path> {
        self.derived_from.as_deref()
    }
    pub fn threads(&self) -> usize {
        self.threads
    }
}

pub fn handle_cli() -> anyhow::Result<Config> {
    // Get matches from command line
    let m = cli_model().get_matches();

    // Setup logging

    init_log(&m);

    debug!("Processing command line options");

    let inputs: Vec<_> = m
        .get_many::<PathBuf>("input")
        .expect("Missing required input option")
        .map(|p| p.to_owned())
        .collect();

    let derived_from = m.get_one::<PathBuf>("derived_from").map(|p| p.to_owned());

    // Threads option should be non-zero.  If not set, set to number of available CPUs
    let threads = m
        .get_one::<NonZeroUsize>("threads")
        .map(|i| usize::from(*i))
        .unwrap_or_else(num_cpus::get);

    let compress = m.get_flag("compress");
    let output_prefix = m
        .get_one::<String>("output")
        .map(|p| p.to_owned())
        .expect("Missing default output option");

    Ok(Config {
        inputs,
        output_prefix,
        compress,
        derived_from,
        threads,
    })
}
