use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use weaver_reconcile::{report_markdown, run_dashboard_once_from_env, WeaverConfig};

#[derive(Debug, Parser)]
#[command(name = "weaver-cli")]
#[command(about = "Cricket match calendar x food delivery interest dashboard")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one dashboard load and print a markdown summary.
    Report,
    /// Run one dashboard load and print the full snapshot as JSON.
    Snapshot,
    /// Show which upstream keys are configured.
    Health,
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Report) {
        Commands::Report => {
            let snapshot = run_dashboard_once_from_env().await?;
            print!("{}", report_markdown(&snapshot));
        }
        Commands::Snapshot => {
            let snapshot = run_dashboard_once_from_env().await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Commands::Health => {
            let config = WeaverConfig::from_env();
            let status = |key: &Option<String>| if key.is_some() { "configured" } else { "missing" };
            println!(
                "cricket={} trends={} season={} port={}",
                status(&config.cricapi_key),
                status(&config.trends_key),
                config.season_id,
                config.web_port
            );
        }
        Commands::Serve => weaver_web::serve_from_env().await?,
    }

    Ok(())
}
