use clap::Parser;
use mandi::application::Application;
use mandi::config::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mandi", about = "B2B wholesale marketplace backend")]
struct Args {
    /// Alternate .env file to load before reading configuration
    #[arg(long)]
    env_file: Option<String>,

    /// Force the job fabric into the in-process sync executor
    #[arg(long)]
    sync_mode: bool,

    /// Initialize the database schema and exit
    #[arg(long)]
    migrate_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match &args.env_file {
        Some(path) => {
            dotenvy::from_path(path)?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = Config::from_env()?;
    if args.sync_mode {
        config.core.broker_url = None;
    }

    let app = Application::build(config).await?;
    if args.migrate_only {
        info!("Schema initialized, exiting (--migrate-only)");
        return Ok(());
    }

    let handle = app.start();
    info!("mandi running; Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    app.shutdown(handle).await;
    Ok(())
}
