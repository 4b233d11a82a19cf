use std::path::PathBuf;

use clap::Parser;
use image_relay::server::{RelayHttpState, router};
use image_relay::{Env, Generator, RelayConfig};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const SERVICE_NAME: &str = "image-relay";

#[derive(Debug, Parser)]
#[command(name = "image-relay", version, about = "Serve POST /api/generate backed by Unsplash and StarryAI")]
struct Cli {
    /// Address to bind.
    #[arg(long, alias = "addr", env = "IMAGE_RELAY_LISTEN", default_value = "0.0.0.0:8000")]
    listen: String,

    /// TOML provider config; without it providers come from the environment.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dotenv file layered over the process environment. Defaults to `./.env` when present.
    #[arg(long)]
    dotenv: Option<PathBuf>,

    /// Value for `Access-Control-Allow-Origin`.
    #[arg(long, env = "IMAGE_RELAY_ALLOW_ORIGIN", default_value = "*")]
    allow_origin: String,

    #[arg(long)]
    json_logs: bool,

    /// Export spans over OTLP/HTTP.
    #[arg(long)]
    otel: bool,

    #[arg(long)]
    otel_endpoint: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    let _otel_guard = init_observability(&cli)?;

    let env = load_env(cli.dotenv.as_ref())?;
    let config = match cli.config.as_ref() {
        Some(path) => RelayConfig::from_file(path, &env)?,
        None => RelayConfig::from_env(&env)?,
    };

    if !config.primary.has_credential() {
        tracing::warn!(
            provider = %config.primary.provider_name,
            "primary provider has no api key; requests will fail until one is configured"
        );
    }
    tracing::info!(
        primary = %config.primary.provider_name,
        fallback = config.fallback.as_ref().map(|f| f.provider_name.as_str()).unwrap_or("none"),
        fallback_ready = config.fallback.as_ref().is_some_and(|f| f.has_credential()),
        "providers configured"
    );

    let generator = Generator::from_config(&config)?;
    let state = RelayHttpState::new(generator).with_allow_origin(&cli.allow_origin)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&cli.listen).await?;
    tracing::info!(listen = %cli.listen, "image-relay listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn load_env(path: Option<&PathBuf>) -> Result<Env, BoxError> {
    if let Some(path) = path {
        return Ok(Env::from_dotenv_file(path)?);
    }
    let default_path = PathBuf::from(".env");
    if default_path.is_file() {
        return Ok(Env::from_dotenv_file(default_path)?);
    }
    Ok(Env::default())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[cfg(feature = "otel")]
fn init_observability(cli: &Cli) -> Result<Option<image_relay::telemetry::OtelGuard>, BoxError> {
    if !cli.otel && cli.otel_endpoint.is_none() {
        image_relay::telemetry::init_logging(cli.json_logs)?;
        return Ok(None);
    }
    Ok(Some(image_relay::telemetry::init_tracing(
        SERVICE_NAME,
        cli.otel_endpoint.as_deref(),
        cli.json_logs,
    )?))
}

#[cfg(not(feature = "otel"))]
fn init_observability(cli: &Cli) -> Result<Option<()>, BoxError> {
    if cli.otel || cli.otel_endpoint.is_some() {
        return Err(format!("{SERVICE_NAME}: otel export requires `--features otel`").into());
    }
    image_relay::telemetry::init_logging(cli.json_logs)?;
    Ok(None)
}
