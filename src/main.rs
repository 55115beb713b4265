use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use duplo_provider::apply::{Action, Executor, Plan};
use duplo_provider::config::Config;
use duplo_provider::duplo::client::DuploClient;
use duplo_provider::manifest::{Declaration, Manifest};
use duplo_provider::resource::get_all_resource_types;
use duplo_provider::resource::registry::get_resource;
use duplo_provider::resource::state::{StateFile, DEFAULT_STATE_FILE};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Declarative provider for DuploCloud
#[derive(Parser, Debug)]
#[command(name = "duplo-provider", version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Manifest declaring the resources to manage
    #[arg(short, long, global = true, default_value = "duplo.yaml")]
    manifest: PathBuf,

    /// State file recording managed resources
    #[arg(short, long, global = true, default_value = DEFAULT_STATE_FILE)]
    state: PathBuf,

    /// Portal URL (overrides duplo_host)
    #[arg(long, global = true)]
    host: Option<String>,

    /// API token (overrides duplo_token)
    #[arg(long, global = true)]
    token: Option<String>,

    /// HTTP request timeout in seconds
    #[arg(long, global = true)]
    http_timeout: Option<u64>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    ssl_no_verify: bool,

    /// Log level for debugging
    #[arg(long, global = true, value_enum, default_value = "off")]
    log_level: LogLevel,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the manifest without contacting the portal
    Validate,
    /// Show what apply would change
    Plan,
    /// Converge the portal to the manifest
    Apply,
    /// Re-read every managed resource into the state
    Refresh,
    /// Delete every managed resource
    Destroy,
    /// Adopt an existing object into the state
    Import {
        /// Resource type, e.g. duplocloud_aws_tag
        resource_type: String,
        /// Name to record it under
        name: String,
        /// Identifier of the remote object
        id: String,
    },
    /// List supported resource types
    Types,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Cannot open log file {}: {}", log_path.display(), e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("duplo-provider started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("duplo-provider").join("duplo-provider.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".duplo-provider").join("duplo-provider.log");
    }
    PathBuf::from("duplo-provider.log")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    match &args.command {
        Command::Types => {
            for type_name in get_all_resource_types() {
                let display = get_resource(type_name)
                    .map(|d| d.display_name.as_str())
                    .unwrap_or_default();
                println!("{:<36} {}", type_name, display);
            }
            return Ok(());
        }
        Command::Validate => {
            let decls = load_declarations(&args.manifest)?;
            println!("{} resource(s) valid", decls.len());
            return Ok(());
        }
        _ => {}
    }

    let mut config = Config::load();
    let conn = config.connection(
        args.host.as_deref(),
        args.token.as_deref(),
        args.http_timeout,
        args.ssl_no_verify,
    )?;
    let client = DuploClient::new(&conn.host, &conn.token, &conn.http)?;
    if let Err(e) = config.remember(&conn.host, &args.state.to_string_lossy()) {
        tracing::warn!("could not save config: {}", e);
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, stopping after the current request...");
            on_signal.cancel();
        }
    });

    let executor = Executor::new(&client, &cancel);
    let mut state = StateFile::load(&args.state)?;

    let result = run(&executor, &args, &mut state).await;

    // Record whatever completed, even when a later step failed
    if writes_state(&args.command) {
        state
            .save(&args.state)
            .with_context(|| format!("saving state to {}", args.state.display()))?;
    }

    result
}

fn writes_state(command: &Command) -> bool {
    matches!(
        command,
        Command::Apply | Command::Refresh | Command::Destroy | Command::Import { .. }
    )
}

async fn run(executor: &Executor<'_>, args: &Args, state: &mut StateFile) -> Result<()> {
    match &args.command {
        Command::Plan => {
            let decls = load_declarations(&args.manifest)?;
            let plan = executor.plan(&decls, state).await?;
            print_plan(&plan);
        }
        Command::Apply => {
            let decls = load_declarations(&args.manifest)?;
            let plan = executor.apply(&decls, state).await?;
            print_plan(&plan);
            println!("Apply complete.");
        }
        Command::Refresh => {
            let report = executor.refresh(state).await?;
            for address in &report.refreshed {
                println!("  refreshed {}", address);
            }
            for address in &report.removed {
                println!("  removed {} (gone remotely)", address);
            }
        }
        Command::Destroy => {
            let destroyed = executor.destroy(state).await?;
            for address in &destroyed {
                println!("  - {}", address);
            }
            println!("Destroy complete, {} destroyed.", destroyed.len());
        }
        Command::Import {
            resource_type,
            name,
            id,
        } => {
            let entry = executor.import(state, resource_type, name, id).await?;
            println!("Imported {} ({})", entry.address(), entry.id);
        }
        Command::Validate | Command::Types => {}
    }
    Ok(())
}

fn load_declarations(path: &Path) -> Result<Vec<Declaration>> {
    let manifest =
        Manifest::load(path).with_context(|| format!("loading manifest {}", path.display()))?;
    Ok(manifest.validate()?)
}

fn print_plan(plan: &Plan) {
    if !plan.has_changes() {
        println!("No changes. The portal matches the manifest.");
        return;
    }
    for change in &plan.changes {
        let symbol = match change.action {
            Action::Create => "+",
            Action::Update { .. } => "~",
            Action::Replace { .. } => "-/+",
            Action::Delete => "-",
            Action::NoOp => continue,
        };
        println!("  {} {}: {}", symbol, change.address(), change.action);
    }
    println!("Plan: {}", plan.summary());
}
