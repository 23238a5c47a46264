use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod clash;
mod config;
mod error;
mod node;
mod pipeline;
mod profile;
mod subscription;

#[derive(Parser)]
#[command(name = "clashsub")]
#[command(version)]
#[command(about = "Import a proxy subscription into a Clash config and activate it", long_about = None)]
struct Cli {
    /// Subscription URL. Omit to refresh the last imported subscription.
    url: Option<String>,

    /// Clash External Controller API URL
    #[arg(long)]
    api_url: Option<String>,

    /// Clash External Controller secret
    #[arg(long)]
    secret: Option<String>,

    /// Path of the generated configuration document
    #[arg(long)]
    profile: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Load or create config, merge CLI arguments, save for next time
    let mut config = config::AppConfig::load().unwrap_or_default();
    config.merge_cli(cli.api_url, cli.secret, cli.profile);
    let _ = config.save();

    let url = match cli.url {
        Some(url) => url,
        None => config::load_last_url().ok_or_else(|| {
            anyhow::anyhow!("no subscription URL given and none stored from a previous run")
        })?,
    };

    let outcome = pipeline::run_import(&config, &url).await?;

    println!(
        "Imported {} node(s) ({} line(s) skipped) into {}",
        outcome.nodes,
        outcome.skipped,
        outcome.profile_path.display()
    );
    if outcome.mode.tun_enabled() {
        println!("TUN mode preserved from previous configuration");
    }

    Ok(())
}
