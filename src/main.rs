//! Serial terminal binary.

use std::process::ExitCode;

use clap::Parser;
use log::debug;

use serline::error::Result;
use serline::transport::{self, SerialConfig, SerialMode};
use serline::{ExtraArgs, FilterPair, FilterRegistry, Session, StdinPrompt, StdoutDisplay};

/// Interactive serial terminal with pluggable stream filters.
#[derive(Parser, Debug)]
#[command(name = "serline", version, about)]
struct Cli {
    /// Serial port path (e.g. /dev/ttyUSB0)
    #[arg(short, long, required_unless_present = "list")]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long, default_value_t = 115_200)]
    baudrate: u32,

    /// Serial mode: data bits, parity, stop bits
    #[arg(short = 'c', long, default_value = "8N1")]
    mode: String,

    /// Hex-dump device bytes instead of splitting them into lines
    #[arg(long, conflicts_with = "filter")]
    binary: bool,

    /// Echo submitted lines back to the console
    #[arg(short, long)]
    echo: bool,

    /// Registered filter pair to run the stream through
    #[arg(long)]
    filter: Option<String>,

    /// List available serial ports and exit
    #[arg(long)]
    list: bool,

    /// Extra `--key=value` options passed verbatim to every filter
    /// invocation
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    extra: Vec<String>,
}

/// Collect trailing `--key=value` tokens into the filter option bag.
fn parse_extra_args(raw: &[String]) -> ExtraArgs {
    let mut extra_args = ExtraArgs::new();
    for arg in raw {
        if let Some(pair) = arg.strip_prefix("--") {
            if let Some((key, value)) = pair.split_once('=') {
                extra_args.insert(key.to_string(), value.to_string());
            }
        }
    }
    extra_args
}

async fn run(cli: Cli) -> Result<()> {
    if cli.list {
        for name in transport::available_ports()? {
            println!("{name}");
        }
        return Ok(());
    }

    let Some(port) = cli.port else {
        unreachable!("--port is required unless --list is given");
    };

    let mode: SerialMode = cli.mode.parse()?;
    let config = SerialConfig::new(port, cli.baudrate).with_mode(mode);

    let filters = if let Some(name) = &cli.filter {
        FilterRegistry::resolve(name)?
    } else if cli.binary {
        FilterPair::binary()
    } else {
        FilterPair::text()
    };

    let (source, sink) = transport::open(&config)?;

    let mut builder = Session::builder()
        .filter_pair(filters)
        .extra_args(parse_extra_args(&cli.extra));
    if cli.echo {
        builder = builder.echo(Box::new(StdoutDisplay::new()));
    }

    let session = builder.build(
        Box::new(source),
        Box::new(sink),
        Box::new(StdinPrompt::new()),
        Box::new(StdoutDisplay::new()),
    )?;

    debug!("bridging {} at {} baud", config.path, config.baud_rate);
    session.run().await
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
