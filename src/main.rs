mod api;
mod core;
mod infra;
mod models;

use clap::Parser;
use std::fs::File;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::infra::db_external::DynamicPool;
use crate::infra::settings::{
    load_profiles, resolve, ConnectionOverrides, DatabaseKind, StartupError, EX_UNAVAILABLE,
    EX_USAGE,
};
use crate::infra::workbook::{load_workbook, verify_against_database};
use crate::models::config::MinerConfig;

pub mod ax_state {
    use super::*;
    pub struct AppState {
        pub config: MinerConfig,
        pub db: DynamicPool,
    }
}

/// Web wizard that builds constrained, aggregated extracts from configured tables.
#[derive(Debug, Parser)]
#[command(name = "simple-data-miner", version)]
struct Cli {
    /// The database type
    #[arg(short = 'D', long = "database-type", env = "SDM_DATABASE_TYPE", value_enum)]
    database_type: DatabaseKind,

    /// Directory containing the table configuration workbook
    #[arg(short = 'I', long = "input-dir", default_value = ".")]
    input_dir: PathBuf,

    /// Table configuration workbook
    #[arg(short = 'i', long = "input-workbook", default_value = "tablesConfig.xlsx")]
    input_workbook: PathBuf,

    /// Directory containing the database connection file
    #[arg(short = 'C', long = "config-dir", default_value = "databaseConfig")]
    config_dir: PathBuf,

    /// Database connection file
    #[arg(short = 'c', long = "config-file", default_value = "SimpleDataMiner.json")]
    config_file: PathBuf,

    /// Address of the database server
    #[arg(short = 's', long, env = "SDM_SERVER")]
    server: Option<String>,

    /// User required to access the database
    #[arg(short = 'u', long, env = "SDM_USERNAME")]
    username: Option<String>,

    /// Password of that user
    #[arg(short = 'p', long, env = "SDM_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Name of the database
    #[arg(short = 'd', long = "database-name", env = "SDM_DATABASE_NAME")]
    database_name: Option<String>,

    /// Logging level: 0 and 1 error, 2 warn, 3 info, 4 debug
    #[arg(short = 'v', long, value_parser = clap::value_parser!(u8).range(0..=4))]
    verbose: Option<u8>,

    /// Directory for the log file
    #[arg(short = 'L', long = "log-dir", default_value = ".")]
    log_dir: PathBuf,

    /// Log file name; logs go to stderr when absent
    #[arg(short = 'l', long = "log-file")]
    log_file: Option<PathBuf>,
}

fn init_tracing(cli: &Cli) -> Result<(), StartupError> {
    let level = match cli.verbose {
        Some(0 | 1) => "error",
        Some(3) => "info",
        Some(4) => "debug",
        _ => "warn",
    };
    // RUST_LOG 优先于 -v
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{level},tower_http={level},sqlx=warn").into());

    let file = match &cli.log_file {
        Some(name) => {
            let path = cli.log_dir.join(name);
            let file = File::create(&path).map_err(|source| StartupError::LogFile { path, source })?;
            Some(Arc::new(file))
        }
        None => None,
    };

    let (to_file, to_stderr) = match file {
        Some(file) => (
            Some(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file)),
            None,
        ),
        None => (
            None,
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(to_file)
        .with(to_stderr)
        .init();
    Ok(())
}

async fn startup(cli: Cli) -> Result<Arc<ax_state::AppState>, StartupError> {
    let profiles = load_profiles(&cli.config_dir.join(&cli.config_file))?;
    let overrides = ConnectionOverrides {
        username: cli.username,
        password: cli.password,
        server: cli.server,
        database_name: cli.database_name,
    };
    let (database, url) = resolve(cli.database_type, &profiles, overrides)?;

    let db = DynamicPool::connect(cli.database_type, &url)
        .await
        .map_err(|source| StartupError::Connect {
            database: database.clone(),
            source,
        })?;
    info!(%database, kind = ?cli.database_type, "connected");

    let config = load_workbook(&cli.input_dir.join(&cli.input_workbook))?;
    verify_against_database(&config, &db).await?;

    Ok(Arc::new(ax_state::AppState { config, db }))
}

async fn serve(state: Arc<ax_state::AppState>) -> anyhow::Result<()> {
    use anyhow::Context;

    let app = api::router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!("Simple Data Miner listening on http://{}", addr);
    axum::serve(listener, app).await.context("server stopped")?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EX_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if let Err(e) = init_tracing(&cli) {
        eprintln!("simple-data-miner: {e}");
        return ExitCode::from(e.exit_code());
    }

    let state = match startup(cli).await {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "fatal startup error");
            return ExitCode::from(e.exit_code());
        }
    };

    if let Err(e) = serve(state).await {
        error!("fatal server error: {e:#}");
        return ExitCode::from(EX_UNAVAILABLE);
    }
    ExitCode::SUCCESS
}
