use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    #[arg(help = "Root directory of the .ks sources")]
    pub root: PathBuf,

    #[arg(long, help = "Settings file to use instead of kestrel.yaml in the root")]
    pub settings: Option<PathBuf>,

    #[arg(long, help = "Project name, overriding the settings")]
    pub name: Option<String>,

    #[arg(
        long = "project-version",
        help = "Project version (MAJOR.MINOR.PATCH[-pre]), overriding the settings"
    )]
    pub project_version: Option<String>,

    #[arg(long, help = "Log filter, e.g. debug or ks_schema=trace; defaults to RUST_LOG or warn")]
    pub log_level: Option<String>,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}
