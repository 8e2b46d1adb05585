//! tiercache server
//!
//! Runs a cache orchestrator with an attached performance monitor and exposes
//! its health, metrics, report and alerts over HTTP.
//!
//! # Endpoints
//!
//! ```text
//! GET /healthz   tier reachability (503 when not operational)
//! GET /metrics   Prometheus text format
//! GET /report    comprehensive performance report (JSON)
//! GET /alerts    active alerts (JSON)
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use clap::Parser;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tiercache::cache::{
    CacheConfig, CacheOrchestrator, CapacityPolicy, InMemoryTier, PromotionPolicy, TierClient,
};
use tiercache::error::{Error, Result};
use tiercache::monitoring::{MonitorConfig, PerformanceMonitor, PrometheusExporter};

// =============================================================================
// CLI Arguments
// =============================================================================

/// tiercache - Multi-tier cache with performance monitoring
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Fast tier backend: "memory" or a redis:// URL
    #[arg(long, env = "FAST_TIER", default_value = "memory")]
    fast_tier: String,

    /// Bulk tier backend: "memory" or a redis:// URL
    #[arg(long, env = "BULK_TIER", default_value = "memory")]
    bulk_tier: String,

    /// Connections per Redis tier
    #[arg(long, env = "REDIS_POOL_SIZE", default_value = "4")]
    redis_pool_size: usize,

    /// Fast tier key ceiling
    #[arg(long, env = "MAX_FAST_KEYS", default_value = "10000")]
    max_fast_keys: usize,

    /// Bulk-tier hits before a key is promoted
    #[arg(long, env = "PROMOTION_THRESHOLD", default_value = "2")]
    promotion_threshold: u64,

    /// Alert check interval in seconds
    #[arg(long, env = "CHECK_INTERVAL_SECONDS", default_value = "30")]
    check_interval_seconds: u64,

    /// HTTP server bind address
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    listen_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    info!("Starting tiercache");
    info!("  Fast tier: {}", args.fast_tier);
    info!("  Bulk tier: {}", args.bulk_tier);
    info!("  Max fast keys: {}", args.max_fast_keys);
    info!("  Promotion threshold: {}", args.promotion_threshold);

    let config = CacheConfig {
        capacity: CapacityPolicy {
            max_fast_keys: args.max_fast_keys,
            ..CapacityPolicy::default()
        },
        promotion: PromotionPolicy {
            promotion_threshold: args.promotion_threshold,
            ..PromotionPolicy::default()
        },
        ..CacheConfig::default()
    };

    let fast = build_tier("fast", &args.fast_tier, args.redis_pool_size)?;
    let bulk = build_tier("bulk", &args.bulk_tier, args.redis_pool_size)?;
    let cache = Arc::new(CacheOrchestrator::new(fast, bulk, config)?);

    let monitor_config = MonitorConfig {
        check_interval: Duration::from_secs(args.check_interval_seconds.max(1)),
        ..MonitorConfig::default()
    };
    let monitor = Arc::new(PerformanceMonitor::new(monitor_config, cache.metrics_handle())?);
    cache.attach_monitor(Arc::clone(&monitor));
    let monitor_handle = monitor.start();
    let alert_logger = spawn_alert_logger(&monitor);

    let health = cache.health_check().await;
    info!("Initial health: {}", health.status);

    let state = Arc::new(AppState {
        cache: Arc::clone(&cache),
        monitor: Arc::clone(&monitor),
        exporter: PrometheusExporter::new("tiercache")?,
    });

    tokio::select! {
        result = run_server(&args.listen_addr, state) => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    cache.close().await;
    if let Err(e) = monitor_handle.await {
        warn!("Monitor task ended abnormally: {}", e);
    }
    alert_logger.abort();

    info!("tiercache shutdown complete");
    Ok(())
}

fn build_tier(name: &str, backend: &str, pool_size: usize) -> Result<Arc<dyn TierClient>> {
    if backend == "memory" {
        return Ok(Arc::new(InMemoryTier::new(name)));
    }

    if backend.starts_with("redis://") || backend.starts_with("rediss://") {
        return redis_tier(name, backend, pool_size);
    }

    Err(Error::Config(format!(
        "Unknown {} tier backend '{}': expected 'memory' or a redis:// URL",
        name, backend
    )))
}

#[cfg(feature = "redis")]
fn redis_tier(name: &str, url: &str, pool_size: usize) -> Result<Arc<dyn TierClient>> {
    use tiercache::cache::{RedisTier, RedisTierConfig};

    let config = RedisTierConfig {
        url: url.to_string(),
        pool_size,
        ..RedisTierConfig::default()
    };
    Ok(Arc::new(RedisTier::new(name, config)?))
}

#[cfg(not(feature = "redis"))]
fn redis_tier(name: &str, _url: &str, _pool_size: usize) -> Result<Arc<dyn TierClient>> {
    Err(Error::Config(format!(
        "{} tier requested Redis but tiercache was built without the 'redis' feature",
        name
    )))
}

fn spawn_alert_logger(monitor: &PerformanceMonitor) -> tokio::task::JoinHandle<()> {
    let mut alerts = monitor.subscribe();

    tokio::spawn(async move {
        loop {
            match alerts.recv().await {
                Ok(alert) => info!(
                    severity = %alert.severity,
                    metric = alert.metric_type.label(),
                    action = %alert.suggested_action,
                    "{}",
                    alert.message
                ),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Alert logger lagged, skipped {} alerts", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "redis=info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// HTTP Server
// =============================================================================

struct AppState {
    cache: Arc<CacheOrchestrator>,
    monitor: Arc<PerformanceMonitor>,
    exporter: PrometheusExporter,
}

async fn run_server(addr: &str, state: Arc<AppState>) -> Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Config(format!("Invalid listen address: {}", e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind server: {}", e)))?;

    info!("HTTP server listening on {}", addr);

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| Error::Internal(format!("Server accept error: {}", e)))?;

        let io = TokioIo::new(stream);
        let state = Arc::clone(&state);

        tokio::spawn(async move {
            let service = service_fn(move |req| handle(Arc::clone(&state), req));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("Server connection error: {}", e);
            }
        });
    }
}

async fn handle(
    state: Arc<AppState>,
    req: Request<hyper::body::Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    if req.method() != Method::GET {
        return Ok(text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"));
    }

    let response = match req.uri().path() {
        "/healthz" => {
            let report = state.cache.health_check().await;
            let status = if report.is_operational() {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };
            json(status, &report)
        }
        "/metrics" => match state.exporter.render(&state.monitor) {
            Ok(body) => {
                let mut response = Response::new(Full::new(Bytes::from(body)));
                if let Ok(value) = HeaderValue::from_str(&state.exporter.content_type()) {
                    response.headers_mut().insert(CONTENT_TYPE, value);
                }
                response
            }
            Err(e) => text(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
        },
        "/report" => json(StatusCode::OK, &state.monitor.comprehensive_report()),
        "/alerts" => json(StatusCode::OK, &state.monitor.active_alerts()),
        _ => text(StatusCode::NOT_FOUND, "not found"),
    };

    Ok(response)
}

fn json<T: serde::Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => {
            let mut response = Response::new(Full::new(Bytes::from(body)));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => text(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn text(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}
