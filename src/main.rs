use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use plugbot::application::errors::BotError;
use plugbot::application::services::BotRuntime;
use plugbot::domain::traits::Bot;
use plugbot::infrastructure::adapters::{ConsoleAdapter, DiscordAdapter};
use plugbot::infrastructure::config::Settings;
use plugbot::infrastructure::logging;
use plugbot::infrastructure::plugins::{Discovery, PluginInstaller, PluginLoader, PluginSource};

#[derive(Parser)]
#[command(name = "plugbot")]
#[command(about = "A minimal chat bot with folder-based plugins", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Chat on stdin/stdout instead of connecting to Discord
    #[arg(long)]
    console: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot (default)
    Run,
    /// Validate the config and list plugins without connecting
    Check,
    /// Download a plugin from GitHub (owner/repo or owner/repo@branch)
    Install {
        /// Repository to install
        source: String,
    },
    /// Generate default config
    InitConfig,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_bot(&cli.config, cli.console).await,
        Commands::Check => check(&cli.config),
        Commands::Install { source } => install(&cli.config, &source).await,
        Commands::InitConfig => init_config(&cli.config),
        Commands::Version => {
            println!("plugbot v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_bot(config_path: &Path, console: bool) -> Result<(), BotError> {
    // Configuration errors stop us before anything connects
    let settings = Settings::load(config_path)?;
    logging::init(settings.debug);
    tracing::debug!("Loaded {:?}", settings);

    let (runtime, report) = BotRuntime::start(&settings)?;
    tracing::info!(
        "Serving {} command(s) from built-ins and {} plugin(s)",
        runtime.commands().len(),
        report.loaded.len()
    );
    let runtime = Arc::new(runtime);

    let mut bot: Box<dyn Bot> = if console {
        Box::new(ConsoleAdapter::new())
    } else {
        Box::new(DiscordAdapter::new(settings.token.clone()))
    };

    tracing::info!("Starting {} adapter", bot.platform());
    bot.run(runtime).await
}

fn check(config_path: &Path) -> Result<(), BotError> {
    let settings = Settings::load(config_path)?;
    println!("Config OK: prefix {:?}, debug {}", settings.prefix, settings.debug);

    let loader = PluginLoader::from_paths(&settings.plugins);
    let found = loader.discover()?;
    println!("Plugins in {}:", loader.plugin_dir().display());
    if found.iter().all(|f| matches!(f.status, Discovery::NotAPlugin)) {
        println!("  (none)");
    }

    for folder in found {
        match folder.status {
            Discovery::NotAPlugin => continue,
            Discovery::Ready(manifest) => println!(
                "  {} - ready ({} v{}, entry {})",
                folder.folder_name,
                manifest.name,
                manifest.version.as_deref().unwrap_or("?"),
                manifest.main.display()
            ),
            Discovery::Disabled(manifest) => {
                println!("  {} - disabled ({})", folder.folder_name, manifest.name)
            }
            Discovery::Invalid(e) => println!("  {} - invalid: {}", folder.folder_name, e),
        }
    }
    Ok(())
}

async fn install(config_path: &Path, source: &str) -> Result<(), BotError> {
    let settings = Settings::load(config_path)?;
    logging::init(settings.debug);

    let source: PluginSource = source.parse()?;
    let installer = PluginInstaller::new(&settings.plugins.directory)?;
    let folder = installer.install(&source).await?;
    println!("Installed {} into {}. It loads on the next start.", source, folder.display());
    Ok(())
}

fn init_config(config_path: &Path) -> Result<(), BotError> {
    Settings::write_template(config_path)?;
    println!("Wrote {}. Set your bot token before starting.", config_path.display());
    Ok(())
}
