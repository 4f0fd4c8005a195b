mod cli;

use baidupcs_leecher::{
    BaiduPcsClient, Config, Leecher, Poller, PollerKind, api, shutdown_on_signal,
};
use clap::Parser;
use cli::{Cli, Commands};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Commands::Serve(args) = &cli.command
        && let Some(address) = args.address
    {
        config.api.bind_address = address;
    }

    let remote = Arc::new(BaiduPcsClient::from_config(&config)?);
    let leecher = Leecher::new(config.clone(), remote).await?;
    let shutdown = shutdown_on_signal();

    match cli.command {
        Commands::Serve(args) => {
            let mut pollers = Vec::new();
            if args.with_pollers {
                for kind in [
                    PollerKind::Transfer,
                    PollerKind::Sampling,
                    PollerKind::Leech,
                    PollerKind::Resume,
                ] {
                    let poller = Poller::new(kind, leecher.clone(), shutdown.clone());
                    pollers.push(tokio::spawn(poller.run(false)));
                }
            }

            let served =
                api::start_api_server(leecher.clone(), Arc::new(config), shutdown.clone()).await;
            shutdown.cancel();
            for handle in pollers {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "poller task panicked");
                }
            }
            served?;
        }
        Commands::Transfer(args) => {
            Poller::new(PollerKind::Transfer, leecher.clone(), shutdown)
                .run(args.once)
                .await
        }
        Commands::Sampling(args) => {
            Poller::new(PollerKind::Sampling, leecher.clone(), shutdown)
                .run(args.once)
                .await
        }
        Commands::Leech(args) => {
            Poller::new(PollerKind::Leech, leecher.clone(), shutdown)
                .run(args.once)
                .await
        }
        Commands::Resume(args) => {
            Poller::new(PollerKind::Resume, leecher.clone(), shutdown)
                .run(args.once)
                .await
        }
        Commands::Purge(args) => {
            let report = leecher.purge(!args.no_trash).await?;
            for name in &report.purged {
                match &report.trash_dir {
                    Some(trash) => println!("moved {} to {}", name, trash.display()),
                    None => println!("deleted {}", name),
                }
            }
        }
    }

    leecher.shutdown().await;
    Ok(())
}
