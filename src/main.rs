use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::TryStreamExt;
use polsync::appliance::auth::Credentials;
use polsync::appliance::client::ApplianceClient;
use polsync::appliance::http::format_appliance_error;
use polsync::config::{Config, ConfigOverrides};
use polsync::engine::pager::pages;
use polsync::engine::{
    CompositeIdentity, CreateOutcome, DeleteOutcome, DesiredState, ReconcileError,
    ReconciledWriter, Resolved, Scope, UpdateOutcome,
};
use polsync::resource::{get_all_resource_keys, get_resource, ResourceDef, RestResource};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Reconcile network-policy appliance resources against desired state
#[derive(Parser, Debug)]
#[command(name = "polsync", version, about, long_about = None)]
struct Args {
    /// Appliance base URL (overrides POLSYNC_BASE_URL and the config file)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// API username (overrides the config file; POLSYNC_USERNAME otherwise)
    #[arg(long, global = true)]
    username: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    insecure: bool,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the resource kinds this build knows
    Kinds,

    /// List a resource collection
    List {
        kind: String,
        /// Scope value, e.g. --scope policy_id=3ee1
        #[arg(long = "scope", value_parser = parse_scope_pair)]
        scope: Vec<(String, String)>,
    },

    /// Show the remote object behind a persisted identity
    Read {
        kind: String,
        #[arg(long)]
        identity: String,
    },

    /// Create (or adopt) an object, or update it when an identity is given
    Apply {
        kind: String,
        /// Desired state as YAML or JSON
        #[arg(short, long)]
        file: PathBuf,
        #[arg(long)]
        identity: Option<String>,
        #[arg(long = "scope", value_parser = parse_scope_pair)]
        scope: Vec<(String, String)>,
    },

    /// Delete the object behind a persisted identity
    Delete {
        kind: String,
        #[arg(long)]
        identity: String,
    },

    /// Store connection defaults in the config file
    Configure {
        #[arg(long)]
        page_size: Option<u32>,
        /// Turn certificate verification back on (undoes a stored --insecure)
        #[arg(long)]
        verify_tls: bool,
    },
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

fn parse_scope_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got {:?}", s)),
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

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

    tracing::info!("polsync started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("polsync").join("polsync.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".polsync").join("polsync.log");
    }
    PathBuf::from("polsync.log")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level)?;
    let mut config = Config::load();

    match &args.command {
        Command::Kinds => {
            for key in get_all_resource_keys() {
                let def = lookup_kind(key)?;
                println!("{:<40} {}", key, def.display_name);
            }
            return Ok(());
        },
        Command::Configure {
            page_size,
            verify_tls,
        } => {
            let verify_tls = match (args.insecure, *verify_tls) {
                (true, _) => Some(false),
                (false, true) => Some(true),
                (false, false) => None,
            };
            config.apply_overrides(ConfigOverrides {
                base_url: args.base_url.clone(),
                username: args.username.clone(),
                page_size: *page_size,
                verify_tls,
            });
            config.save()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            return Ok(());
        },
        _ => {},
    }

    let client = connect(&args, &config)?;
    run(&args.command, &client, &config).await
}

fn connect(args: &Args, config: &Config) -> Result<ApplianceClient> {
    let base_url = config
        .effective_base_url(args.base_url.as_deref())
        .context("No appliance configured. Set POLSYNC_BASE_URL or use --base-url")?;
    let username = config.effective_username(args.username.as_deref());
    let credentials = Credentials::from_env(username.as_deref())?;

    tracing::info!("Using appliance {} as {}", base_url, credentials.username());

    let verify_tls = config.verify_tls && !args.insecure;
    ApplianceClient::new(&base_url, credentials, verify_tls)
}

fn lookup_kind(kind: &str) -> Result<&'static ResourceDef> {
    get_resource(kind).with_context(|| {
        format!(
            "Unknown resource kind {:?}. Known kinds: {}",
            kind,
            get_all_resource_keys().join(", ")
        )
    })
}

async fn run(command: &Command, client: &ApplianceClient, config: &Config) -> Result<()> {
    match command {
        Command::Kinds | Command::Configure { .. } => Ok(()),

        Command::List { kind, scope } => {
            let def = lookup_kind(kind)?;
            let api = RestResource::new(client, def, scope.clone()).with_page_size(config.page_size);

            let mut listing = std::pin::pin!(pages(&api));
            let mut entries = Vec::new();
            // Partial listings are printed, but the command still fails
            let outcome = loop {
                match listing.try_next().await {
                    Ok(Some(summary)) => entries.push(summary.raw),
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(e),
                }
            };
            print_json(&Value::Array(entries))?;
            outcome.map_err(|e| report(ReconcileError::api(format!("list {}", kind), e)))
        },

        Command::Read { kind, identity } => {
            let def = lookup_kind(kind)?;
            let identity = CompositeIdentity::decode(&def.kind.identity, identity).map_err(report)?;
            let api = RestResource::new(client, def, identity.scope.clone())
                .with_page_size(config.page_size);

            match ReconciledWriter::new(&api, &def.kind)
                .read(&identity)
                .await
                .map_err(report)?
            {
                Some(resolved) => print_outcome("present", &resolved, def),
                None => print_json(&json!({ "outcome": "absent" })),
            }
        },

        Command::Apply {
            kind,
            file,
            identity,
            scope,
        } => {
            let def = lookup_kind(kind)?;
            let desired = read_desired_state(file)?;

            match identity {
                Some(encoded) => {
                    let identity =
                        CompositeIdentity::decode(&def.kind.identity, encoded).map_err(report)?;
                    let scope = merge_scope(&identity.scope, scope);
                    let api = RestResource::new(client, def, scope).with_page_size(config.page_size);

                    let outcome = ReconciledWriter::new(&api, &def.kind)
                        .update(&identity, &desired)
                        .await
                        .map_err(report)?;
                    let label = match &outcome {
                        UpdateOutcome::Updated { .. } => "updated",
                        UpdateOutcome::Unchanged(_) => "unchanged",
                    };
                    print_outcome(label, outcome.resolved(), def)
                },
                None => {
                    let scope = merge_scope(&Vec::new(), scope);
                    let api = RestResource::new(client, def, scope.clone())
                        .with_page_size(config.page_size);

                    let outcome = ReconciledWriter::new(&api, &def.kind)
                        .create(&desired, &scope)
                        .await
                        .map_err(report)?;
                    let label = match &outcome {
                        CreateOutcome::Adopted(_) => "adopted",
                        CreateOutcome::Created(_) => "created",
                    };
                    print_outcome(label, outcome.resolved(), def)
                },
            }
        },

        Command::Delete { kind, identity } => {
            let def = lookup_kind(kind)?;
            let identity = CompositeIdentity::decode(&def.kind.identity, identity).map_err(report)?;
            let api = RestResource::new(client, def, identity.scope.clone())
                .with_page_size(config.page_size);

            match ReconciledWriter::new(&api, &def.kind)
                .delete(&identity)
                .await
                .map_err(report)?
            {
                DeleteOutcome::Deleted(identity) => print_json(&json!({
                    "outcome": "deleted",
                    "identity": identity.encode(&def.kind.identity),
                })),
                DeleteOutcome::AlreadyAbsent => print_json(&json!({ "outcome": "absent" })),
            }
        },
    }
}

/// Scope values given on the command line override those from the identity
fn merge_scope(from_identity: &Scope, from_cli: &[(String, String)]) -> Scope {
    let mut scope = from_identity.clone();
    for (name, value) in from_cli {
        match scope.iter_mut().find(|(field, _)| field == name) {
            Some(slot) => slot.1 = value.clone(),
            None => scope.push((name.clone(), value.clone())),
        }
    }
    scope
}

fn read_desired_state(path: &PathBuf) -> Result<DesiredState> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let value: Value = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse desired state in {:?}", path))?;

    match value {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("Desired state in {:?} must be a mapping", path),
    }
}

fn print_outcome(label: &str, resolved: &Resolved, def: &ResourceDef) -> Result<()> {
    print_json(&json!({
        "outcome": label,
        "identity": resolved.identity.encode(&def.kind.identity),
        "object": resolved.detail.fields(),
    }))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Turn an engine error into a user-facing one, keeping the server body
fn report(err: ReconcileError) -> anyhow::Error {
    match &err {
        ReconcileError::Api { source, .. } => {
            let mut message = format!("{} ({})", format_appliance_error(source), err);
            if let Some(body) = source.body() {
                message.push_str(&format!("\nServer response: {}", body));
            }
            anyhow::anyhow!(message)
        },
        _ => anyhow::Error::new(err),
    }
}
