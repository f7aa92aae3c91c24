use std::{num::NonZeroUsize, path::PathBuf};

use clap::{command, value_parser, Arg, ArgAction, Command};

use super::utils::LogLevel;

pub fn cli_model() -> Command {
    command!()
        .arg(
            Arg::new("timestamp")
                .short('X')
                .long("timestamp")
                .value_parser(value_parser!(stderrlog::Timestamp))
                .value_name("GRANULARITY")
                .default_value("none")
                .help("Prepend log entries with a timestamp"),
        )
        .arg(
            Arg::new("loglevel")
                .short('l')
                .long("loglevel")
                .value_name("LOGLEVEL")
                .value_parser(value_parser!(LogLevel))
                .ignore_case(true)
                .default_value("info")
                .help("Set log level"),
        )
        .arg(
            Arg::new("quiet")
                .action(ArgAction::SetTrue)
                .long("quiet")
                .conflicts_with("loglevel")
                .help("Silence all output"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_parser(value_parser!(NonZeroUsize))
                .value_name("INT")
                .help("Set number of threads [default: available cores]"),
        )
        .arg(
            Arg::new("derived_from")
                .short('F')
                .long("derived-from")
                .value_parser(value_parser!(PathBuf))
                .value_name("FILE")
                .help("File the metrics were derived from (e.g., the source bam file)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_parser(value_parser!(String))
                .value_name("OUTPUT_PREFIX")
                .default_value("picard2tsv")
                .help("Prefix for output files"),
        )
        .arg(
            Arg::new("compress")
                .action(ArgAction::SetTrue)
                .short('z')
                .long("compress")
                .help("Compress output (gzip)"),
        )
        .arg(
            Arg::new("input")
                .value_parser(value_parser!(PathBuf))
                .value_name("INPUT_FILE")
                .num_args(1..)
                .required(true)
                .help("Input Picard metrics file(s)"),
        )
}
