mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use airctl_core::AirconClient;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a broker session
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "airctl", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let cfg = airctl_config::load_config_or_default();
            let client_config = config::client_config(&cli.global, &cfg)?;
            let broker = client_config.transport.broker.to_string();
            let client = AirconClient::start(&client_config)?;

            let connect_timeout = Duration::from_secs(cli.global.connect_timeout);
            if !client.wait_connected(connect_timeout).await {
                client.shutdown().await;
                return Err(CliError::ConnectionFailed {
                    broker,
                    seconds: cli.global.connect_timeout,
                });
            }

            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &client, &cli.global).await;
            client.shutdown().await;
            result
        }
    }
}
