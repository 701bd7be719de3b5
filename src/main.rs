use clap::Parser;
use tracing_subscriber::EnvFilter;

use xferd::broker::{self, state::HostConfig};
use xferd::cli::{Cli, Command};
use xferd::client;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Host {
            max_objects,
            max_formats,
            max_enumerators,
        } => {
            let config = HostConfig {
                max_objects: max_objects.get(),
                max_formats: max_formats.get(),
                max_enumerators: max_enumerators.get(),
            };
            if let Err(e) = broker::run(config, cli.socket).await {
                tracing::error!(error = %e, "host failed");
                eprintln!("xferd host: {e}");
                std::process::exit(1);
            }
        }
        Command::Source {
            format,
            tymed,
            name,
        } => {
            if let Err(e) = client::publish(&format, &tymed, name, cli.socket).await {
                tracing::error!(error = %e, "source failed");
                eprintln!("xferd source: {e}");
                std::process::exit(1);
            }
        }
        Command::Client { action } => {
            if let Err(e) = client::run(action, cli.socket).await {
                tracing::error!(error = %e, "client failed");
                eprintln!("xferd client: {e}");
                std::process::exit(1);
            }
        }
    }
}
