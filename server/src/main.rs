use anyhow::{Context, Result};
use casino_server::kv::BackendKind;
use casino_server::{sqlite_path_from_url, Api, Server, ServerConfig};
use clap::Parser;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() -> Result<()> {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .ok()
        .and_then(|value| {
            let trimmed = value.trim().to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        });

    if let Some(endpoint) = endpoint {
        let service_name =
            std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "casino-server".to_string());
        let rate = std::env::var("OTEL_SAMPLING_RATE")
            .ok()
            .and_then(|value| value.parse::<f64>().ok())
            .map(|value| value.clamp(0.0, 1.0))
            .unwrap_or(1.0);
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(endpoint)
            .build()
            .context("failed to build OTLP exporter")?;
        let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
            .with_sampler(opentelemetry_sdk::trace::Sampler::TraceIdRatioBased(rate))
            .with_resource(
                opentelemetry_sdk::Resource::builder_empty()
                    .with_attributes([opentelemetry::KeyValue::new("service.name", service_name)])
                    .build(),
            )
            .with_batch_exporter(exporter)
            .build();
        let tracer = tracer_provider.tracer("casino-server");
        opentelemetry::global::set_tracer_provider(tracer_provider);

        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_filter(LevelFilter::INFO))
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    Ok(())
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Casino demo storage and admin server")]
struct Args {
    /// Host interface to bind (default: localhost).
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    #[arg(short, long, default_value_t = 8000)]
    port: u16,

    /// Key/value backend: file, document, memory or sqlite.
    #[arg(long, default_value = "file")]
    kv_backend: String,

    /// Directory holding key/value data.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// SQLite file for the sqlite key/value backend (default: <data-dir>/kv.sqlite).
    #[arg(long)]
    kv_sqlite_path: Option<PathBuf>,

    /// SQLite file of the admin database (falls back to DATABASE_URL, then memory).
    #[arg(long)]
    admin_db_path: Option<PathBuf>,

    /// Insert demo admin, player and sample history on start.
    #[arg(long, default_value_t = false)]
    seed_demo: bool,

    /// Directory of static files served for unmatched paths.
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Directory receiving admin database backups.
    #[arg(long, default_value = "backups")]
    backup_dir: PathBuf,

    /// HTTP requests per second per IP (0 disables rate limiting).
    #[arg(long)]
    http_rate_limit_per_second: Option<u64>,

    /// HTTP burst size per IP (0 disables rate limiting).
    #[arg(long)]
    http_rate_limit_burst: Option<u32>,

    /// Maximum HTTP body size in bytes (0 disables limit).
    #[arg(long)]
    http_body_limit_bytes: Option<usize>,
}

fn is_production() -> bool {
    matches!(
        std::env::var("NODE_ENV").as_deref(),
        Ok("production") | Ok("prod")
    )
}

/// Maps an optional arg value to Option: 0 => None, Some(v) => Some(v), None => default
fn map_optional_limit<T: Copy + PartialEq + From<u8>>(
    arg: Option<T>,
    default: Option<T>,
) -> Option<T> {
    match arg {
        Some(v) if v == T::from(0) => None,
        Some(v) => Some(v),
        None => default,
    }
}

fn build_config(args: &Args, database_url: Option<&str>) -> Result<ServerConfig> {
    let defaults = ServerConfig::default();
    let kv_backend: BackendKind = args
        .kv_backend
        .parse()
        .map_err(|err| anyhow::anyhow!("invalid kv backend: {err}"))?;
    let admin_db_path = match (&args.admin_db_path, database_url) {
        (Some(path), _) => Some(path.clone()),
        (None, Some(url)) => Some(
            sqlite_path_from_url(url)
                .with_context(|| format!("DATABASE_URL is not a sqlite URL: {url}"))?,
        ),
        (None, None) => None,
    };

    Ok(ServerConfig {
        kv_backend,
        data_dir: args.data_dir.clone(),
        kv_sqlite_path: args.kv_sqlite_path.clone(),
        admin_db_path,
        seed_demo: args.seed_demo,
        static_dir: args.static_dir.clone(),
        backup_dir: args.backup_dir.clone(),
        http_rate_limit_per_second: map_optional_limit(
            args.http_rate_limit_per_second,
            defaults.http_rate_limit_per_second,
        ),
        http_rate_limit_burst: map_optional_limit(
            args.http_rate_limit_burst,
            defaults.http_rate_limit_burst,
        ),
        http_body_limit_bytes: map_optional_limit(
            args.http_body_limit_bytes,
            defaults.http_body_limit_bytes,
        ),
    })
}

fn require_env(var: &str) -> Result<String> {
    let value = std::env::var(var).unwrap_or_default();
    if value.trim().is_empty() {
        anyhow::bail!("Missing required env: {var}");
    }
    Ok(value)
}

fn ensure_production_env() -> Result<()> {
    if !is_production() {
        return Ok(());
    }

    require_env("METRICS_AUTH_TOKEN")?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse args
    let args = Args::parse();

    // Create logger
    init_tracing()?;

    ensure_production_env()?;

    let database_url = std::env::var("DATABASE_URL")
        .ok()
        .filter(|value| !value.trim().is_empty());
    let config = build_config(&args, database_url.as_deref())?;
    let server = tokio::task::spawn_blocking(move || Server::open(config))
        .await
        .context("startup task failed")?
        .context("failed to open server state")?;
    let api = Api::new(Arc::new(server));
    let app = api.router();

    // Start server
    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .context("axum server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_flags() {
        let args = Args::parse_from(["casino-server"]);
        assert_eq!(args.port, 8000);
        assert_eq!(args.host.to_string(), "127.0.0.1");
        let config = build_config(&args, None).expect("config should parse");
        assert_eq!(config.kv_backend, BackendKind::File);
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.backup_dir, PathBuf::from("backups"));
        assert!(config.admin_db_path.is_none());
        assert!(!config.seed_demo);
    }

    #[test]
    fn zero_disables_limits() {
        let args = Args::parse_from([
            "casino-server",
            "--http-rate-limit-per-second",
            "0",
            "--http-body-limit-bytes",
            "0",
            "--http-rate-limit-burst",
            "50",
        ]);
        let config = build_config(&args, None).unwrap();
        assert_eq!(config.http_rate_limit_per_second, None);
        assert_eq!(config.http_body_limit_bytes, None);
        assert_eq!(config.http_rate_limit_burst, Some(50));
    }

    #[test]
    fn database_url_is_a_fallback() {
        let args = Args::parse_from(["casino-server", "--kv-backend", "SQLite"]);
        let config = build_config(&args, Some("sqlite://db/casino.sqlite")).unwrap();
        assert_eq!(config.kv_backend, BackendKind::Sqlite);
        assert_eq!(config.admin_db_path, Some(PathBuf::from("db/casino.sqlite")));

        let args = Args::parse_from(["casino-server", "--admin-db-path", "admin.sqlite"]);
        let config = build_config(&args, Some("sqlite://ignored.sqlite")).unwrap();
        assert_eq!(config.admin_db_path, Some(PathBuf::from("admin.sqlite")));

        let err = build_config(&args_default(), Some("mysql://localhost/casino")).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"), "unexpected error: {err}");
    }

    #[test]
    fn rejects_unknown_backend() {
        let args = Args::parse_from(["casino-server", "--kv-backend", "redis"]);
        let err = build_config(&args, None).unwrap_err();
        assert!(
            err.to_string().contains("valid values"),
            "unexpected error: {err}"
        );
    }

    fn args_default() -> Args {
        Args::parse_from(["casino-server"])
    }
}
