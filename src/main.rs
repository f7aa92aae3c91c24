#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod cli;
mod codec;
mod config;
mod error;
mod metrics;
mod output;
mod process;
mod registry;
mod utils;
mod value;

fn main() -> anyhow::Result<()> {
    // Set up configuration from CLI
    let cfg = config::handle_cli()?;
    debug!("{:?}", cfg);

    // Process input files
    process::process_inputs(&cfg)
}
