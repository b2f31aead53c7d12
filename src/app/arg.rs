use std::path::PathBuf;

use clap::{Parser, Subcommand};
use url::Url;

#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    #[clap(long, default_value = "warn")]
    pub log_level: super::logging::Level,

    #[clap(long)]
    pub log_file: Option<PathBuf>,

    #[clap(long)]
    pub log_json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send a raw HTTP request and print the response.
    Send(SendCommand),
}

#[derive(Parser, Debug)]
#[clap(group(
    clap::ArgGroup::new("request")
        .required(true)
        .args(["file", "text", "stdin"])
))]
pub struct SendCommand {
    /// Read the request from a file, or `-` for standard input.
    #[clap(long)]
    pub file: Option<PathBuf>,

    /// Request given as text.
    ///
    /// Lines may end with `\n` alone; they are sent with `\r\n`.
    #[clap(long)]
    pub text: Option<String>,

    /// Read the request from standard input.
    #[clap(value_parser = clap::builder::PossibleValuesParser::new(["-"]))]
    pub stdin: Option<String>,

    /// Parts of the response to write to standard output.
    #[clap(long, default_value = "all")]
    pub print: PrintMode,

    /// Write the response to this file, or `-` for standard output.
    #[clap(long, default_value = "-")]
    pub output: PathBuf,

    /// Send the request to this URI instead of the one in the request.
    #[clap(long)]
    pub uri: Option<Url>,

    /// Reject request lines not ending with `\r\n`.
    #[clap(long)]
    pub strict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PrintMode {
    /// Status line and headers.
    Headers,
    /// Body only.
    Body,
    /// Status line, headers and body.
    All,
}
