use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use bto_allocator::allocation::{
    allocation_router, AllocationState, ApplicationLifecycleService, BookingReceipt, FlatInventory,
    FlatType, LifecycleError, MaritalStatus, MemoryStore, Nric, ProjectAdminService, ProjectDraft,
    RegistrationLifecycleService, StoreError, User, UserDirectory, UserRole,
};
use bto_allocator::config::AppConfig;
use bto_allocator::error::AppError;
use bto_allocator::telemetry;
use chrono::{Duration, Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "BTO Allocator",
    about = "Run the Build-To-Order allocation lifecycle service from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk a seeded allocation scenario and print each outcome
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
    /// Seed the registry with sample users and a sample project
    #[arg(long)]
    seed: bool,
}

#[derive(Args, Debug, Default)]
struct DemoArgs {
    /// Evaluation date for the scenario (defaults to today)
    #[arg(long, value_parser = parse_date)]
    today: Option<NaiveDate>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Demo(args) => run_demo(args),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let store = Arc::new(MemoryStore::new());
    if args.seed {
        let today = Local::now().date_naive();
        seed_registry(&store, today)?;
        info!("registry seeded with sample users and the '{DEMO_PROJECT}' project");
    }
    let allocation_state = Arc::new(AllocationState::new(store));

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(allocation_router(allocation_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "allocation lifecycle service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

const DEMO_PROJECT: &str = "Acacia Breeze";

struct DemoCast {
    manager: User,
    officer: User,
    applicant: User,
}

fn store_err(err: StoreError) -> AppError {
    AppError::Lifecycle(LifecycleError::Integrity(err.into()))
}

fn lifecycle_err(err: LifecycleError) -> AppError {
    AppError::Lifecycle(err)
}

fn demo_user(
    name: &str,
    nric: &str,
    age: u32,
    marital_status: MaritalStatus,
    role: UserRole,
) -> Result<User, AppError> {
    let nric = Nric::parse(nric).map_err(|err| lifecycle_err(err.into()))?;
    User::new(name, nric, age, marital_status, "password", role)
        .map_err(|err| lifecycle_err(err.into()))
}

fn seed_registry(store: &Arc<MemoryStore>, today: NaiveDate) -> Result<DemoCast, AppError> {
    let manager = demo_user(
        "Rajesh Kumar",
        "S5800001H",
        46,
        MaritalStatus::Married,
        UserRole::Manager,
    )?;
    let officer = demo_user(
        "Mei Ling Tan",
        "T9000012C",
        31,
        MaritalStatus::Single,
        UserRole::Officer,
    )?;
    let applicant = demo_user(
        "Daniel Lim",
        "S8700045D",
        28,
        MaritalStatus::Married,
        UserRole::Applicant,
    )?;

    for user in [&manager, &officer, &applicant] {
        store.insert_user(user.clone()).map_err(store_err)?;
    }

    let admin = ProjectAdminService::new(store.clone());
    admin
        .create_project(
            &manager,
            ProjectDraft {
                name: DEMO_PROJECT.to_string(),
                neighborhood: "Tampines".to_string(),
                two_room: FlatInventory {
                    units: 2,
                    price: 118_000,
                },
                three_room: FlatInventory {
                    units: 3,
                    price: 221_000,
                },
                open_date: today - Duration::days(7),
                close_date: today + Duration::days(30),
                officer_capacity: 3,
            },
        )
        .map_err(lifecycle_err)?;

    Ok(DemoCast {
        manager,
        officer,
        applicant,
    })
}

fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let store = Arc::new(MemoryStore::new());
    let cast = seed_registry(&store, today)?;

    let applications = ApplicationLifecycleService::new(store.clone());
    let registrations = RegistrationLifecycleService::new(store.clone());

    println!("Allocation lifecycle demo (evaluated {today})");
    println!(
        "Project '{DEMO_PROJECT}': 2 two-room units, 3 three-room units, 3 officer slots"
    );

    let registration = registrations
        .register(&cast.officer, DEMO_PROJECT)
        .map_err(lifecycle_err)?;
    println!(
        "\n{} registered as officer -> {}",
        cast.officer.name,
        registration.status()
    );

    let registration = registrations
        .manager_approve(&cast.manager, &cast.officer.nric, DEMO_PROJECT)
        .map_err(lifecycle_err)?;
    println!(
        "{} approved the registration -> {}",
        cast.manager.name,
        registration.status()
    );

    let application = applications
        .apply(
            &cast.applicant,
            DEMO_PROJECT,
            FlatType::TwoRoom,
            today,
        )
        .map_err(lifecycle_err)?;
    println!(
        "{} applied for a {} flat -> {}",
        cast.applicant.name,
        application.flat_type,
        application.status()
    );

    let application = applications
        .manager_approve(&cast.manager, &cast.applicant.nric)
        .map_err(lifecycle_err)?;
    println!(
        "{} approved the application -> {}",
        cast.manager.name,
        application.status()
    );

    let receipt = applications
        .book_flat(&cast.officer, &cast.applicant.nric)
        .map_err(lifecycle_err)?;
    render_receipt(&receipt);

    let application = applications
        .request_withdrawal(&cast.applicant.nric)
        .map_err(lifecycle_err)?;
    println!(
        "\n{} requested withdrawal (status stays {})",
        cast.applicant.name,
        application.status()
    );

    let application = applications
        .manager_approve_withdrawal(&cast.manager, &cast.applicant.nric)
        .map_err(lifecycle_err)?;
    let restored = ProjectAdminService::new(store)
        .find_project(DEMO_PROJECT)
        .map_err(lifecycle_err)?
        .map(|project| project.units(FlatType::TwoRoom))
        .unwrap_or_default();
    println!(
        "{} approved the withdrawal -> {}, two-room units back to {}",
        cast.manager.name,
        application.status(),
        restored
    );

    Ok(())
}

fn render_receipt(receipt: &BookingReceipt) {
    println!("\nBooking receipt");
    println!(
        "- {} ({}), age {}, {}",
        receipt.applicant_name, receipt.applicant_nric, receipt.age, receipt.marital_status
    );
    println!(
        "- {} flat in '{}' ({}), price {}",
        receipt.flat_type, receipt.project, receipt.neighborhood, receipt.price
    );
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
