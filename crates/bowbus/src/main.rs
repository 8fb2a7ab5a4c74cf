mod cmd;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;

use bowbus_codec::{Decoder, NameTables};
use clap::Parser;

use crate::cmd::{Command, Context};
use crate::exit::{codec_error, CliResult};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "bowbus", version, about = "BOW e-bike bus decoder and device tool")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    /// JSON name tables overlaid on the built-in names.
    #[arg(long, value_name = "FILE", env = "BOWBUS_NAMES", global = true)]
    names: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn load_decoder(names: Option<&PathBuf>) -> CliResult<Decoder> {
    let mut tables = NameTables::builtin();
    if let Some(path) = names {
        let loaded = NameTables::from_file(path)
            .map_err(|err| codec_error("cannot load name tables", err))?;
        tables.overlay(loaded);
    }
    Ok(Decoder::new(tables))
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let result = load_decoder(cli.names.as_ref()).and_then(|decoder| {
        let ctx = Context {
            format: cli.format.unwrap_or_else(OutputFormat::default_for_stdout),
            decoder,
        };
        cmd::run(cli.command, &ctx)
    });

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
