//! Subscriber setup for the binary: `RUST_LOG`-style filtering, plain or JSON lines, and
//! optional OTLP span export behind the `otel` feature.

use tracing_subscriber::layer::{Layered, SubscriberExt as _};
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, Layer as _, Registry};

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type FilteredRegistry = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn tracing_subscriber::Layer<FilteredRegistry> + Send + Sync>;

const DEFAULT_FILTER: &str = "info";

fn output_layer(json_logs: bool) -> BoxedLayer {
    let layer = tracing_subscriber::fmt::layer().with_target(false);
    if json_logs {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

/// Installs the global subscriber: one filter in front of every output layer.
fn install(layers: Vec<BoxedLayer>) -> Result<(), BoxError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()?;
    Ok(())
}

pub fn init_logging(json_logs: bool) -> Result<(), BoxError> {
    install(vec![output_layer(json_logs)])
}

#[cfg(feature = "otel")]
pub use otel::{OtelGuard, init_tracing};

#[cfg(feature = "otel")]
mod otel {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_otlp::WithExportConfig as _;
    use opentelemetry_sdk::trace::SdkTracerProvider;
    use tracing_subscriber::Layer as _;

    use super::{BoxError, install, output_layer};

    /// Flushes and stops span export when dropped.
    #[derive(Debug)]
    pub struct OtelGuard {
        provider: SdkTracerProvider,
    }

    impl Drop for OtelGuard {
        fn drop(&mut self) {
            if let Err(err) = self.provider.shutdown() {
                eprintln!("otel shutdown failed: {err}");
            }
        }
    }

    fn span_provider(
        service_name: &str,
        endpoint: Option<&str>,
    ) -> Result<SdkTracerProvider, BoxError> {
        let exporter = match endpoint {
            Some(endpoint) => opentelemetry_otlp::SpanExporter::builder()
                .with_http()
                .with_endpoint(endpoint)
                .build()?,
            None => opentelemetry_otlp::SpanExporter::builder()
                .with_http()
                .build()?,
        };
        let resource = opentelemetry_sdk::Resource::builder_empty()
            .with_service_name(service_name.to_string())
            .build();
        Ok(SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .with_resource(resource)
            .build())
    }

    /// Same output as [`super::init_logging`], plus spans exported over OTLP/HTTP.
    pub fn init_tracing(
        service_name: &str,
        endpoint: Option<&str>,
        json_logs: bool,
    ) -> Result<OtelGuard, BoxError> {
        let provider = span_provider(service_name, endpoint)?;
        opentelemetry::global::set_tracer_provider(provider.clone());

        let spans = tracing_opentelemetry::layer()
            .with_tracer(provider.tracer(service_name.to_string()))
            .boxed();
        install(vec![output_layer(json_logs), spans])?;
        Ok(OtelGuard { provider })
    }
}
