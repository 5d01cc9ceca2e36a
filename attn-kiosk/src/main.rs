//! attn-kiosk - attendance kiosk command line
//!
//! Drives the kiosk core against the attendance API: lookups for sites,
//! crews, workers and pending check-outs, and full check-in/check-out
//! submissions with a photo taken from an image file. Notifications raised by
//! the session are printed to stdout as JSON lines.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use attn_common::config::{ConfigResolver, KioskConfig};
use attn_common::events::EventBus;
use attn_common::models::{AttendanceKind, Role};
use attn_common::WorkerId;
use attn_kiosk::capture::device::StillImageCamera;
use attn_kiosk::capture::CapturePipeline;
use attn_kiosk::geolocation::{FixedLocation, LocationProvider, NoLocation};
use attn_kiosk::preferences::PreferenceStore;
use attn_kiosk::{KioskSession, Reconciliation, RemoteGateway, SessionParts, TransportClient};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for attn-kiosk
#[derive(Parser, Debug)]
#[command(name = "attn-kiosk")]
#[command(about = "Attendance kiosk client")]
#[command(version)]
struct Cli {
    /// Config file (overrides ATTN_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data folder for kiosk preferences (overrides ATTN_ROOT_FOLDER)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// API endpoint (overrides the config file)
    #[arg(long, env = "ATTN_API_ENDPOINT")]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the API is reachable
    Health,
    /// List sites
    Sites,
    /// List the crews of a site
    Crews {
        #[arg(long)]
        site: String,
    },
    /// Look up a worker by id
    Lookup {
        #[arg(long)]
        dni: String,
    },
    /// Workers checked in without a check-out
    Pending {
        #[arg(long)]
        site: String,
        #[arg(long)]
        crew: String,
        /// Day to query (YYYY-MM-DD), today by default
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Register a check-in
    CheckIn(RegisterArgs),
    /// Register a check-out
    CheckOut(RegisterArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    Operational,
    Administrative,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Operational => Role::Operational,
            RoleArg::Administrative => Role::Administrative,
        }
    }
}

#[derive(Args, Debug)]
struct RegisterArgs {
    #[arg(long, value_enum, default_value = "operational")]
    role: RoleArg,

    #[arg(long)]
    site: String,

    /// Required for operational staff
    #[arg(long)]
    crew: Option<String>,

    /// Worker id, repeat for a batch
    #[arg(long = "worker")]
    workers: Vec<String>,

    /// Image file used as the camera frame
    #[arg(long)]
    photo: PathBuf,

    #[arg(long, default_value = "")]
    notes: String,

    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,

    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let resolver = ConfigResolver::new(cli.config.clone());
    let mut config = resolver.resolve().context("Failed to load configuration")?;
    if let Some(endpoint) = &cli.endpoint {
        config.api.endpoint = endpoint.clone();
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "attn_kiosk={level},attn_common={level}",
                    level = config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "attn-kiosk v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match resolver.config_path() {
        Some(path) => info!("Config: {}", path.display()),
        None => info!("Config: compiled defaults"),
    }
    info!("API endpoint: {}", config.api.endpoint);

    let config = Arc::new(config);
    let transport = TransportClient::new(&config.api).context("Failed to build HTTP client")?;
    let gateway = RemoteGateway::new(transport);

    match cli.command {
        Command::Health => {
            let online = gateway.health_check().await;
            print_json(&serde_json::json!({ "online": online }))?;
            if !online {
                bail!("API unreachable");
            }
        }
        Command::Sites => print_json(&gateway.list_sites().await?)?,
        Command::Crews { site } => print_json(&gateway.list_crews(&site).await?)?,
        Command::Lookup { dni } => {
            let id = WorkerId::parse(&dni)?;
            print_json(&gateway.lookup_worker(&id).await?)?;
        }
        Command::Pending { site, crew, date } => {
            print_json(&gateway.list_pending(&site, &crew, date).await?)?
        }
        Command::CheckIn(args) => {
            register(config, gateway, cli.root_folder, AttendanceKind::CheckIn, args).await?
        }
        Command::CheckOut(args) => {
            register(config, gateway, cli.root_folder, AttendanceKind::CheckOut, args).await?
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print every session notification as a JSON line until the bus closes
fn spawn_event_printer(events: &EventBus) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => println!("{}", line),
                    Err(e) => warn!("Unprintable event: {}", e),
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Event printer lagged, {} events dropped", n)
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn register(
    config: Arc<KioskConfig>,
    gateway: RemoteGateway,
    root_folder: Option<PathBuf>,
    kind: AttendanceKind,
    args: RegisterArgs,
) -> Result<()> {
    let root_folder = attn_common::config::resolve_root_folder(root_folder.as_deref());
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create data folder {}", root_folder.display()))?;
    info!("Data folder: {}", root_folder.display());

    let location: Arc<dyn LocationProvider> = match (args.lat, args.lon) {
        (Some(latitude), Some(longitude)) => Arc::new(FixedLocation {
            latitude,
            longitude,
        }),
        _ => Arc::new(NoLocation),
    };

    let events = Arc::new(EventBus::new(64));
    let printer = spawn_event_printer(&events);

    let mut session = KioskSession::new(SessionParts {
        camera: CapturePipeline::new(Arc::new(StillImageCamera::new(&args.photo)), &config.camera),
        preferences: PreferenceStore::new(&root_folder, &config.storage),
        events: events.clone(),
        config,
        gateway,
        location,
    });

    let outcome = run_submission(&mut session, kind, &args).await;

    // Close the bus so the printer drains and exits
    drop(session);
    drop(events);
    if let Err(e) = printer.await {
        warn!("Event printer failed: {}", e);
    }

    match outcome? {
        Reconciliation::AllSucceeded { .. } | Reconciliation::Mixed { .. } => Ok(()),
        Reconciliation::AllFailed { .. } => bail!("No worker was registered"),
        Reconciliation::RequestFailed { message } => bail!("Registration rejected: {}", message),
    }
}

async fn run_submission(
    session: &mut KioskSession,
    kind: AttendanceKind,
    args: &RegisterArgs,
) -> Result<Reconciliation> {
    session.begin(args.role.into(), kind);
    session.select_site(&args.site).await?;
    if let Some(crew) = &args.crew {
        session.select_crew(crew).await?;
    }

    for raw in &args.workers {
        // Check-outs may already hold the worker from the pending list
        if session.roster().contains(&WorkerId::parse(raw)?) {
            continue;
        }
        session.lookup_worker(raw).await?;
        session.add_looked_up_worker()?;
    }

    session.start_camera().await?;
    session.capture_photo().await?;

    Ok(session.submit(&args.notes).await?)
}
