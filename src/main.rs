use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;

use quote_ledger::{
    bootstrap::build_service,
    config::ServiceConfig,
    metrics::install_exporter,
    server,
    service::PriceRequest,
    utils::setup_logger,
};

#[derive(Parser, Debug)]
#[command(name = "quote-ledger", version, about = "Compare router quotes and append them to a spreadsheet ledger")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve price requests over HTTP (default)
    Serve,
    /// Run one comparison, append it and print the record
    Snapshot {
        /// Input token, defaults to DEFAULT_TOKEN_IN
        #[arg(long)]
        token_in: Option<String>,
        /// Output token, defaults to DEFAULT_TOKEN_OUT
        #[arg(long)]
        token_out: Option<String>,
        /// Log the row instead of writing it
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = ServiceConfig::from_env()?;
    setup_logger(config.log_level)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            install_exporter(SocketAddr::from(([0, 0, 0, 0], config.metrics_port)))?;
            let service = Arc::new(build_service(&config, false).await?);
            info!("Comparing routers: {}", service.source_names().join(", "));

            server::serve(service, SocketAddr::from(([0, 0, 0, 0], config.http_port))).await?;
        }
        Command::Snapshot {
            token_in,
            token_out,
            dry_run,
        } => {
            let service = build_service(&config, dry_run).await?;
            let request = PriceRequest::new(
                token_in.unwrap_or_else(|| config.default_token_in.clone()),
                token_out.unwrap_or_else(|| config.default_token_out.clone()),
            );

            match service.handle(&request).await {
                Ok(ack) => println!("{}", serde_json::to_string_pretty(&ack.record)?),
                Err(e) => {
                    error!("Snapshot failed: {}", e);
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}
