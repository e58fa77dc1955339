use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use sandbox_services::Service;

/// Chat relays and sandboxed script runners over HTTP.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of ./services.toml or ~/services.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Relay a JSON-encoded message list to the completion backend (port 8080)
    Relay { port: Option<u16> },
    /// Relay a single prompt and echo it back with the answer (port 8080)
    Prompt { port: Option<u16> },
    /// Run code against attrs and return them; faults are HTTP 500 (port 8092)
    Attrs { port: Option<u16> },
    /// Run code against attrs and return {attrs, err} (port 8080)
    Exec { port: Option<u16> },
    /// Run widget-building code and return the `sa` result (port 8080)
    Widgets { port: Option<u16> },
}

impl Command {
    fn service(&self) -> (Service, Option<u16>) {
        match *self {
            Self::Relay { port } => (Service::Relay, port),
            Self::Prompt { port } => (Service::Prompt, port),
            Self::Attrs { port } => (Service::Attrs, port),
            Self::Exec { port } => (Service::Exec, port),
            Self::Widgets { port } => (Service::Widgets, port),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries streamed answers and script output, logs go to stderr
    let level = if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let (service, port) = cli.command.service();
    sandbox_services::run(service, port, cli.config.as_deref()).await
}
