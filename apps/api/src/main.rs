use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dishmap_api::backfill::{run_backfill, DEFAULT_BATCH};
use dishmap_api::config::Config;
use dishmap_api::db::create_pool;
use dishmap_api::llm_client::{self, LlmClient};
use dishmap_api::memories::identify::LlmDishIdentifier;
use dishmap_api::memories::store::PgRecordStore;
use dishmap_api::routes::build_router;
use dishmap_api::services::background::RemoveBgClient;
use dishmap_api::services::blob::S3BlobStore;
use dishmap_api::services::geocode::GoogleGeocoder;
use dishmap_api::services::places::GooglePlacesClient;
use dishmap_api::state::AppState;

#[derive(Parser)]
#[command(name = "dishmap-api", version, about = "Food photo journal API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Fill missing neighborhood/borough labels by reverse geocoding
    Backfill {
        /// Maximum records to scan
        #[arg(long, default_value_t = DEFAULT_BATCH)]
        limit: i64,
        /// Log what would change without writing
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("dishmap_api={},tower_http=info", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Backfill { limit, dry_run } => backfill(config, limit, dry_run).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting Dishmap API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone(), config.http_timeout_secs)?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let state = AppState {
        store: Arc::new(PgRecordStore::new(db)),
        blobs: Arc::new(S3BlobStore::new(
            s3,
            config.s3_bucket.clone(),
            config.s3_public_base_url.clone(),
        )),
        places: Arc::new(GooglePlacesClient::new(
            config.google_maps_api_key.clone(),
            config.http_timeout_secs,
        )?),
        background: Arc::new(RemoveBgClient::new(
            config.remove_bg_api_key.clone(),
            config.http_timeout_secs,
        )?),
        identifier: Arc::new(LlmDishIdentifier::new(llm)),
        config: config.clone(),
    };

    if config.api_token.is_none() {
        warn!("API_TOKEN is not set; all routes are unauthenticated");
    }

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn backfill(config: Config, limit: i64, dry_run: bool) -> Result<()> {
    let db = create_pool(&config.database_url).await?;
    let store = PgRecordStore::new(db);
    let geocoder = GoogleGeocoder::new(
        config.google_maps_api_key.clone(),
        config.http_timeout_secs,
    )?;

    let report = run_backfill(&store, &geocoder, limit, dry_run).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "dishmap-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.s3_region.clone()))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    // MinIO needs path-style addressing.
    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();
    aws_sdk_s3::Client::from_conf(s3_config)
}
