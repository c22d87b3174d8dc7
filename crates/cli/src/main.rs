use anyhow::Context;
use clap::{Parser, Subcommand};
use relay::forward::{Forwarder, ItemOutcome};
use relay::payload::InboundPayload;

#[derive(Parser)]
#[command(name = "instarelay")]
#[command(about = "Relay Instagram webhook media to Telegram", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config.json.
    Init {
        /// Config file path (default: INSTARELAY_CONFIG_PATH or ~/.instarelay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the webhook gateway. Telegram credentials come from config or TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID.
    Serve {
        /// Config file path (default: INSTARELAY_CONFIG_PATH or ~/.instarelay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config, PORT env, or 3000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Forward one webhook payload read from a JSON file, then exit.
    Forward {
        /// Payload file (same shape as the webhook body)
        #[arg(long, short, value_name = "PATH")]
        file: std::path::PathBuf,

        /// Config file path (default: INSTARELAY_CONFIG_PATH or ~/.instarelay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("instarelay {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Forward { file, config }) => {
            if let Err(e) = run_forward(file, config).await {
                log::error!("forward failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(relay::config::default_config_path);
    let dir = relay::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = relay::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!(
        "starting gateway on {}:{} (config {})",
        config.gateway.bind,
        config.gateway.port,
        path.display()
    );
    relay::gateway::run_gateway(config).await
}

async fn run_forward(
    file: std::path::PathBuf,
    config_path: Option<std::path::PathBuf>,
) -> anyhow::Result<()> {
    let (config, _) = relay::config::load_config(config_path)?;
    let raw = std::fs::read_to_string(&file)
        .with_context(|| format!("reading payload from {}", file.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("parsing payload from {}", file.display()))?;
    let payload = InboundPayload::from_value(&value);

    let forwarder = Forwarder::from_config(&config)?;
    let report = forwarder.forward(&payload).await;
    for (i, outcome) in report.outcomes.iter().enumerate() {
        match outcome {
            ItemOutcome::Sent => println!("item {}: sent", i),
            ItemOutcome::Skipped(reason) => println!("item {}: skipped ({:?})", i, reason),
            ItemOutcome::Failed(e) => println!("item {}: failed: {}", i, e),
        }
    }
    if report.failed() > 0 {
        anyhow::bail!("{} of {} item(s) failed", report.failed(), report.outcomes.len());
    }
    Ok(())
}
