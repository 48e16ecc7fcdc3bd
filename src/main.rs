use axum::Router;
use axum::routing::get;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use floatchat_core::config::{CommandLineArgs, Config};
use floatchat_core::db::StorePools;
use floatchat_core::ingestion::IngestionOrchestrator;
use floatchat_core::models::{
    ErrorResponse, FloatDetail, FloatRadiusRow, Measurement, Profile, QueryRequest, QueryResponse,
    TableData, TrajectoryPoint,
};
use floatchat_core::query::{Gazetteer, HttpNarrator, Narrator, QueryExecutor, TemplateNarrator};
use floatchat_core::store::RelationalStore;
use floatchat_core::utils::ScheduledExecutor;
use floatchat_core::vector::{Embedder, HttpEmbedder, StubEmbedder, VectorIndex};
use floatchat_core::{api, AppState};

#[derive(OpenApi)]
#[openapi(
    paths(
        api::query_handler::liveness,
        api::query_handler::answer_query,
        api::floats::radius,
        api::floats::indian_ocean,
        api::floats::all_floats,
        api::floats::float_detail,
        api::floats::trajectories_radius,
    ),
    components(schemas(
        QueryRequest, QueryResponse, TableData, ErrorResponse, FloatRadiusRow, FloatDetail, Profile,
        Measurement, TrajectoryPoint,
    )),
    tags(
        (name = "System", description = "Liveness"),
        (name = "Query", description = "Natural-language query routing"),
        (name = "Floats", description = "Read-only spatial/profile API"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    init_tracing(&config);
    tracing::info!("floatchat starting up");

    let store_pools = StorePools::connect(&config.store.dev_dsn, &config.store.live_dsn).await?;

    let dev_store = Arc::new(
        RelationalStore::new(
            "dev",
            store_pools.dev.clone(),
            config.store.dev_id_range,
            config.query.row_cap,
            std::time::Duration::from_secs(config.query.sql_timeout_s),
        )
        .await?,
    );
    let live_store = Arc::new(
        RelationalStore::new(
            "live",
            store_pools.live.clone(),
            config.store.live_id_range,
            config.query.row_cap,
            std::time::Duration::from_secs(config.query.sql_timeout_s),
        )
        .await?,
    );
    tracing::info!("dev and live relational stores ready");

    let (vector_index, embedder): (Option<Arc<VectorIndex>>, Option<Arc<dyn Embedder>>) =
        match VectorIndex::connect(&config.vector) {
            Ok(index) => {
                if let Err(e) = index.ensure_collection(config.vector.embedding_dim).await {
                    tracing::warn!(error = %e, "failed to ensure vector collection exists");
                }
                let index = Arc::new(index);
                let embedder: Arc<dyn Embedder> = if config.embedding.api_base.is_empty() {
                    tracing::warn!("no embedding provider configured, using deterministic stub");
                    Arc::new(StubEmbedder { dim: config.vector.embedding_dim as usize })
                } else {
                    Arc::new(HttpEmbedder::new(&config.embedding))
                };
                (Some(index), Some(embedder))
            },
            Err(e) => {
                tracing::warn!(error = %e, "vector index unavailable, semantic/hybrid queries will degrade");
                (None, None)
            },
        };

    let narrator: Arc<dyn Narrator> = if config.llm.api_base.is_empty() {
        tracing::warn!("no LLM provider configured, using deterministic template narrator");
        Arc::new(TemplateNarrator { config: config.answer.clone() })
    } else {
        Arc::new(HttpNarrator::new(&config.llm, config.answer.clone()))
    };

    let gazetteer = Arc::new(Gazetteer::default());

    let query_executor = Arc::new(QueryExecutor::new(
        Arc::clone(&dev_store),
        vector_index.clone(),
        embedder.clone(),
        Gazetteer::default(),
        config.query.clone(),
        config.vector.clone(),
    ));

    let app_state = Arc::new(AppState {
        config: Arc::new(config.clone()),
        dev_store: Arc::clone(&dev_store),
        live_store: Arc::clone(&live_store),
        query_executor,
        narrator,
        gazetteer,
    });

    let cli_args = CommandLineArgs::try_parse_from(std::env::args()).unwrap_or_else(|_| CommandLineArgs {
        config: None,
        server_host: None,
        server_port: None,
        log_level: None,
        live_dsn: None,
        tick_interval: None,
        no_ingestion: false,
    });

    if !cli_args.no_ingestion {
        match IngestionOrchestrator::new(
            config.ingestion.clone(),
            config.vector.clone(),
            Arc::clone(&live_store),
            config.store.live_lock_path.clone(),
            vector_index,
            embedder,
        ) {
            Ok(orchestrator) => {
                let interval = std::time::Duration::from_secs(config.ingestion.tick_interval_s);
                tracing::info!(interval_s = config.ingestion.tick_interval_s, "starting ingestion orchestrator");
                let executor = ScheduledExecutor::new("ingestion-orchestrator", interval);
                tokio::spawn(async move {
                    executor.start(orchestrator).await;
                });
            },
            Err(e) => {
                tracing::error!(error = %e, "failed to start ingestion orchestrator, continuing read-only");
            },
        }
    } else {
        tracing::info!("ingestion disabled by --no-ingestion");
    }

    let app = Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(api::query_handler::liveness).post(api::query_handler::answer_query))
        .route("/floats/radius", get(api::floats::radius))
        .route("/floats/indian-ocean", get(api::floats::indian_ocean))
        .route("/floats/all", get(api::floats::all_floats))
        .route("/floats/trajectories/radius", get(api::floats::trajectories_radius))
        .route("/floats/:float_id", get(api::floats::float_detail))
        .with_state(app_state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("server listening on http://{}", addr);
    tracing::info!("API documentation available at http://{}/docs", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(config: &Config) {
    let log_filter = tracing_subscriber::EnvFilter::new(&config.logging.level);
    let registry = tracing_subscriber::registry().with(log_filter);

    if let Some(log_file) = &config.logging.file {
        let log_path = std::path::Path::new(log_file);
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let log_dir = log_path.parent().and_then(|p| p.to_str()).unwrap_or("logs");
        let file_name = log_path.file_name().and_then(|n| n.to_str()).unwrap_or("floatchat.log");
        let file_prefix = file_name.strip_suffix(".log").unwrap_or(file_name);

        let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
        let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
        registry.with(tracing_subscriber::fmt::layer().with_writer(non_blocking)).init();
        std::mem::forget(_guard);
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
