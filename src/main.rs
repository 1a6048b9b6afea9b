use std::{
    error::Error,
    process,
    sync::{Arc, Mutex},
};

use clap::{command, Parser, ValueHint};
use log::{debug, error, info, LevelFilter};
use rusqlite::Connection;
use teloxide::prelude::*;

use spotizer::{
    bot::{self, BotDeps},
    cache::DownloadCache,
    config::{Config, Secrets},
    deezer::DeezerClient,
    download::DownloadManager,
    http,
    providers::{ForeignProvider, NativeProvider},
    settings::SettingsStore,
    spotify::SpotifyClient,
    transport::TelegramTransport,
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when built in release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Secrets file
    ///
    /// Ensure that this file is kept secure and not shared publicly, as
    /// it contains the Deezer ARL, the Telegram bot token and the
    /// Spotify client credentials.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath, default_value_t = String::from("secrets.toml"))]
    secrets_file: String,

    /// SQLite database file
    ///
    /// Holds the download cache and per-user settings. Created when
    /// missing.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    database: Option<String>,

    /// External downloader executable
    ///
    /// Any deemix-compatible command line downloader works.
    #[arg(long, value_name = "COMMAND")]
    downloader: Option<String>,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence
/// from highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
///
/// # Panics
///
/// Panics when a logger facade is already initialized.
fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        // Note: if you change the default logging level here, then you should
        // probably also change the verbosity levels below.
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if config.quiet || config.verbose > 0 {
        let level = match config.verbose {
            0 => {
                // Quiet and verbose are mutually exclusive, and `verbose` is 0
                // by default. So this arm means: quiet mode.
                LevelFilter::Warn
            }
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module("spotizer", level);
    }

    logger.init();
}

/// Wires up the clients and runs the dispatcher until shutdown.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let secrets = Secrets::from_file(&args.secrets_file)?;
    let mut config = Config::new(&secrets)?;
    if let Some(database) = args.database {
        config.db_path = database.into();
    }
    if let Some(downloader) = args.downloader {
        config.downloader = downloader;
    }

    let conn = Arc::new(Mutex::new(Connection::open(&config.db_path)?));
    let settings = Arc::new(SettingsStore::new(Arc::clone(&conn))?);
    let cache = Arc::new(DownloadCache::new(conn)?);

    let http_client = Arc::new(http::Client::new(&config)?);
    let deezer = Arc::new(DeezerClient::new(&config, Arc::clone(&http_client)));
    let spotify = Arc::new(SpotifyClient::new(&config, http_client));

    let telegram = Bot::new(&config.bot_token);
    let transport = Arc::new(TelegramTransport::new(telegram.clone()));

    let manager = Arc::new(DownloadManager::new(
        Arc::clone(&deezer) as Arc<dyn NativeProvider>,
        Arc::clone(&spotify) as Arc<dyn ForeignProvider>,
        transport,
        Arc::clone(&cache),
        Arc::clone(&settings),
    ));

    let deps = BotDeps {
        manager,
        settings,
        cache,
        foreign: spotify,
    };

    info!("listening for updates");
    Dispatcher::builder(telegram, bot::schema(deps))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("shutting down gracefully");
    Ok(())
}

/// Main entry point of the application.
///
/// This function initializes the logger facade, parses the command line
/// arguments, and starts the dispatcher.
#[tokio::main]
async fn main() {
    // `clap` handles our command line arguments and help text.
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {:#?}", args);

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();

    info!("starting {name}/{version}; {BUILD_PROFILE}");

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}
