use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use news_relay::{
    logging, Command, CommandContext, Config, DedupStore, ExtractorRegistry, Fetcher, Pipeline, Publisher, Scheduler,
    TelegramTransport,
};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "news-relay", about = "Posts new regional news items to a Telegram channel on a daily schedule")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "news-relay.toml")]
    config: PathBuf,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run the scheduler until interrupted
    Run {
        /// Do one run immediately before waiting for the first trigger
        #[arg(long)]
        run_now: bool,
    },
    /// Do a single run and exit
    Once,
    /// Print the status reply
    Status,
    /// Print the latest items without publishing anything
    Latest,
    /// Validate the configuration and exit
    Check,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let config = Config::load(&cli.config).with_context(|| format!("loading {}", cli.config.display()))?;
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(e.into());
    }

    let mut store = DedupStore::load(&config.state_file, config.on_flush_failure)?;
    let registry = ExtractorRegistry::from_sources(&config.sources)?;
    let pipeline = Pipeline::new(
        config.source_specs(),
        Fetcher::new(config.fetch.clone())?,
        registry,
        config.channel_id.clone(),
        config.max_items_per_source,
    );
    let mut scheduler = Scheduler::new(&config.posting_hours, config.tz()?);

    match cli.command {
        Cmd::Check => {
            for source in pipeline.sources() {
                println!("{} -> {} ({} adapter)", source.name, source.endpoint, pipeline.adapter_for(source));
            }
            println!(
                "configuration OK: {} sources, {} urls recorded in {}",
                pipeline.sources().len(),
                store.len(),
                store.path().display()
            );
        }
        Cmd::Status | Cmd::Latest => {
            let command = if let Cmd::Status = cli.command { Command::Status } else { Command::News };
            let context = CommandContext {
                store: &store,
                pipeline: &pipeline,
                scheduler: &scheduler,
            };
            println!("{}", context.handle(command, Utc::now()).await);
        }
        Cmd::Once | Cmd::Run { .. } => {
            let token = config.require_bot_token()?;
            let transport = TelegramTransport::new(reqwest::Client::new(), token);
            let mut publisher = Publisher::new(transport, config.send_interval(), config.hashtags.clone());

            let (shutdown_tx, shutdown) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupt received, stopping after the current step");
                    let _ = shutdown_tx.send(true);
                }
            });

            let run_now = matches!(cli.command, Cmd::Once | Cmd::Run { run_now: true });
            if run_now {
                pipeline.run(&mut store, &mut publisher, &shutdown).await;
            }

            if let Cmd::Run { .. } = cli.command {
                if config.answer_commands {
                    scheduler = scheduler.with_inbox(Box::new(publisher.transport().inbox()));
                }
                scheduler
                    .run(&pipeline, &mut store, &mut publisher, shutdown, config.tick())
                    .await;
            }
        }
    }

    Ok(())
}
