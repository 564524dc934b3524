use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use compat_match::config::Settings;
use compat_match::core::{CompatibilityScorer, MatchRanker};
use compat_match::routes::{self, matches::AppState};
use compat_match::services::{FastScoreTier, MokaScoreTier, PostgresClient, RedisScoreTier, ScoreCache};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
    pub retryable: bool,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
        retryable: false,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("Query payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
        retryable: false,
    }
    .into()
}

fn init_tracing(level: &str, format: &str) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }
}

fn startup_error(what: &str, err: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", what, err);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", what, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| settings.logging.level.clone());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| settings.logging.format.clone());
    init_tracing(&log_level, &log_format);

    info!("Starting compat-match service...");

    let matching = settings.matching_config();
    let weights = settings.scoring_weights();

    // Initialize PostgreSQL client (profiles + durable score tier)
    let db_max_conn = settings.database.max_connections.unwrap_or(10);
    let postgres = Arc::new(
        PostgresClient::from_settings(
            &settings.database.url,
            Some(db_max_conn),
            settings.database.min_connections,
            settings.database.acquire_timeout_secs,
            settings.database.idle_timeout_secs,
        )
        .await
        .map_err(|e| startup_error("Failed to connect to PostgreSQL", e))?,
    );

    info!("PostgreSQL client initialized (max: {} connections)", db_max_conn);

    // Fast tier: Redis when configured, otherwise in-process
    let l1_cache_size = settings.cache.l1_cache_size.unwrap_or(10_000);
    let fast: Arc<dyn FastScoreTier> = match settings.cache.redis_url.as_deref() {
        Some(url) => match RedisScoreTier::new(url, matching.score_ttl).await {
            Ok(tier) => {
                info!("Redis fast tier initialized (TTL: {:?})", matching.score_ttl);
                Arc::new(tier)
            }
            Err(e) => {
                warn!("Failed to connect to Redis ({}), using in-process fast tier", e);
                Arc::new(MokaScoreTier::new(l1_cache_size, matching.score_ttl))
            }
        },
        None => {
            info!("In-process fast tier initialized ({} entries)", l1_cache_size);
            Arc::new(MokaScoreTier::new(l1_cache_size, matching.score_ttl))
        }
    };

    let cache = Arc::new(ScoreCache::new(
        fast,
        postgres.clone(),
        CompatibilityScorer::new(weights),
        matching.cache_timeout,
    ));

    info!("Scorer initialized with weights: {:?}", weights);

    let app_state = AppState {
        ranker: MatchRanker::new(postgres, cache, matching),
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
