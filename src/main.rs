use anyhow::{bail, Context, Result};
use approval_daemon::config::get_default_config_path;
use approval_daemon::server::proto::approval_daemon_server::ApprovalDaemonServer;
use approval_daemon::server::FILE_DESCRIPTOR_SET;
use approval_daemon::utils::compute_hash;
use approval_daemon::{
    read_config, ApprovalDaemonService, AttributionDefaults, AuthExportLister, Authorizer,
    CancelSignal, Credentials, DaemonConfig, IdentityLister, JsonFileStore, MemoryIdentityLister,
    Reconciler, ReconcilerOptions, TokenAuthorizer,
};
use clap::{Parser, Subcommand};
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderName, Method};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tonic::transport::Server;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_ADDR: &str = "127.0.0.1:50061";
const DEFAULT_CORS_ORIGINS: &str = "http://localhost,https://localhost,http://127.0.0.1,https://127.0.0.1";

/// Approval Daemon - approve users and backfill approval records
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file (defaults to ~/.approval-daemon/config.json)
    #[arg(short, long, env = "APPROVAL_DAEMON_CONFIG")]
    config: Option<PathBuf>,

    /// JSON file holding the record store. Overrides `storePath` from the config.
    #[arg(long, env = "APPROVAL_STORE_PATH")]
    store: Option<PathBuf>,

    /// Identity provider account export. Overrides `identityExportPath` from the config.
    #[arg(long, env = "APPROVAL_IDENTITY_EXPORT")]
    identity_export: Option<PathBuf>,

    /// Admin token for one-shot commands
    #[arg(long, env = "APPROVAL_ADMIN_TOKEN", hide_env_values = true)]
    admin_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the gRPC daemon
    Serve {
        /// Address to bind the server to
        #[arg(short, long, env = "APPROVAL_DAEMON_ADDR", default_value = DEFAULT_ADDR)]
        addr: String,

        /// Comma-separated list of allowed CORS origins.
        /// Use "*" to allow all origins (not recommended for production).
        #[arg(
            long,
            env = "APPROVAL_CORS_ORIGINS",
            default_value = DEFAULT_CORS_ORIGINS,
            value_delimiter = ','
        )]
        cors_origins: Vec<String>,
    },

    /// Approve every record already in the store
    BulkApprove {
        /// Recorded in approvedBy (defaults to the configured bulk attribution)
        #[arg(long)]
        attributed_by: Option<String>,
    },

    /// Approve a single user
    Approve {
        /// User id
        uid: String,

        /// Recorded in approvedBy (defaults to the admin's principal)
        #[arg(long)]
        attributed_by: Option<String>,
    },

    /// Create approved records for provider accounts that have none
    Backfill {
        /// Recorded in approvedBy (defaults to the configured backfill attribution)
        #[arg(long)]
        attributed_by: Option<String>,

        /// Print the plan without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the SHA-256 digest of a token for the `admins` config list
    HashToken {
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (stderr keeps stdout clean for command output)
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Parse CLI arguments
    let args = Args::parse();

    if let Command::HashToken { token } = &args.command {
        println!("{}", compute_hash(token));
        return Ok(());
    }

    let config = load_config(&args).await?;
    let needs_identities = matches!(args.command, Command::Serve { .. } | Command::Backfill { .. });
    let reconciler = Arc::new(build_reconciler(&args, &config, needs_identities)?);
    let authorizer = TokenAuthorizer::new(config.admins.clone());
    if authorizer.admin_count() == 0 {
        warn!("No admins configured; every request will be rejected");
    }

    match args.command {
        Command::Serve { addr, cors_origins } => {
            serve(reconciler, Arc::new(authorizer), &config, addr, cors_origins).await
        }
        Command::BulkApprove { attributed_by } => {
            let grant = authorizer.authorize(&cli_credentials(&args.admin_token)).await?;
            let attributed_by = attributed_by.unwrap_or(config.bulk_approve_attribution.clone());
            let result = reconciler.bulk_approve(&grant, &attributed_by).await?;
            print_json(&result)
        }
        Command::Approve { uid, attributed_by } => {
            let grant = authorizer.authorize(&cli_credentials(&args.admin_token)).await?;
            let attributed_by = attributed_by.unwrap_or_else(|| grant.principal().to_string());
            reconciler.approve_one(&grant, &uid, &attributed_by).await?;
            info!(uid = %uid, approved_by = %attributed_by, "Done");
            Ok(())
        }
        Command::Backfill {
            attributed_by,
            dry_run,
        } => {
            let grant = authorizer.authorize(&cli_credentials(&args.admin_token)).await?;
            let cancel = cancel_on_ctrl_c();
            if dry_run {
                let plan = reconciler.plan_backfill(&grant, &cancel).await?;
                return print_json(&plan);
            }
            let attributed_by = attributed_by.unwrap_or(config.backfill_attribution.clone());
            let result = reconciler
                .backfill_from_source(&grant, &attributed_by, &cancel)
                .await?;
            print_json(&result)
        }
        Command::HashToken { .. } => Ok(()),
    }
}

async fn load_config(args: &Args) -> Result<DaemonConfig> {
    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => get_default_config_path()?,
    };

    let config = match read_config(&config_path)
        .await
        .with_context(|| format!("Failed to read config {}", config_path.display()))?
    {
        Some(config) => config,
        None => {
            warn!(path = %config_path.display(), "Config file not found, using defaults");
            DaemonConfig::default()
        }
    };

    Ok(config)
}

fn build_reconciler(args: &Args, config: &DaemonConfig, needs_identities: bool) -> Result<Reconciler> {
    let store_path = args
        .store
        .clone()
        .or_else(|| config.store_path.clone())
        .context("No record store configured; set storePath in the config or pass --store")?;

    let identities: Arc<dyn IdentityLister> = match args
        .identity_export
        .clone()
        .or_else(|| config.identity_export_path.clone())
    {
        Some(path) => {
            Arc::new(AuthExportLister::new(path).with_page_size(config.identity_page_size))
        }
        None if needs_identities => {
            bail!("No identity export configured; set identityExportPath in the config or pass --identity-export")
        }
        None => Arc::new(MemoryIdentityLister::new(Vec::new())),
    };

    info!(store = %store_path.display(), collection = %config.collection, "Using record store");

    Ok(Reconciler::new(
        Arc::new(JsonFileStore::new(store_path)),
        identities,
        ReconcilerOptions::from(config),
    )?)
}

fn cli_credentials(token: &Option<String>) -> Credentials {
    token.as_deref().map(Credentials::bearer).unwrap_or_default()
}

/// Trip a cancel signal on Ctrl-C
fn cancel_on_ctrl_c() -> CancelSignal {
    let (handle, signal) = CancelSignal::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling before the write phase");
            handle.cancel();
        }
    });
    signal
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn serve(
    reconciler: Arc<Reconciler>,
    authorizer: Arc<dyn Authorizer>,
    config: &DaemonConfig,
    addr: String,
    cors_origins: Vec<String>,
) -> Result<()> {
    // Parse address
    let addr: SocketAddr = addr.parse()?;

    // Process CORS origins
    let cors_origins: Vec<String> = cors_origins
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let allow_all_origins = cors_origins.iter().any(|o| o == "*");

    info!(
        "CORS origins: {}",
        if allow_all_origins {
            "*".to_string()
        } else {
            cors_origins.join(", ")
        }
    );

    // Cancels in-flight backfills on shutdown
    let (cancel_handle, cancel_signal) = CancelSignal::channel();

    let service = ApprovalDaemonService::new(
        reconciler,
        authorizer,
        AttributionDefaults::from(config),
        cancel_signal,
    );

    // Create reflection service
    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    // Configure CORS for gRPC-Web
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            if allow_all_origins {
                return true;
            }

            match origin.to_str() {
                Ok(origin_str) => cors_origins
                    .iter()
                    .any(|allowed| origin_str.starts_with(allowed)),
                Err(_) => false,
            }
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            ACCEPT,
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("x-grpc-web"),
            HeaderName::from_static("x-user-agent"),
            HeaderName::from_static("grpc-timeout"),
        ])
        .expose_headers([
            HeaderName::from_static("grpc-status"),
            HeaderName::from_static("grpc-message"),
            HeaderName::from_static("grpc-status-details-bin"),
        ]);

    info!("Starting approval daemon on {} (gRPC + gRPC-Web)", addr);

    Server::builder()
        .accept_http1(true) // Required for gRPC-Web
        .layer(cors)
        .layer(tonic_web::GrpcWebLayer::new())
        .add_service(reflection_service)
        .add_service(ApprovalDaemonServer::new(service))
        .serve_with_shutdown(addr, async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal, stopping server...");
            cancel_handle.cancel();
        })
        .await?;

    info!("Approval daemon stopped");
    Ok(())
}
