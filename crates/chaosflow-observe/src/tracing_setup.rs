//! Subscriber setup for the `chaosflow` binary.
//!
//! Log lines always go to stderr so converted documents printed on stdout can
//! be piped. With `--otel`, command spans (validate, convert, ...) are also
//! exported as OpenTelemetry traces through the stdout exporter.
//!
//! ```no_run
//! use tracing_subscriber::EnvFilter;
//!
//! chaosflow_observe::tracing_setup::init_tracing(EnvFilter::new("warn"), false).unwrap();
//! // ... run a command ...
//! chaosflow_observe::tracing_setup::shutdown_tracing();
//! ```

use std::sync::OnceLock;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// `service.name` of exported traces, also the tracer name.
pub const SERVICE_NAME: &str = "chaosflow";

/// Provider installed by [`init_tracing`], kept for [`shutdown_tracing`].
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Install the global subscriber: `env_filter` plus a stderr fmt layer, and
/// when `enable_otel` is set an OpenTelemetry layer. In that mode the fmt
/// layer also logs span close events with their timings.
///
/// Fails when a global subscriber is already installed.
pub fn init_tracing(
    env_filter: EnvFilter,
    enable_otel: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    if !enable_otel {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
        return Ok(());
    }

    let provider = otel_provider();
    let otel_layer = tracing_opentelemetry::layer().with_tracer(provider.tracer(SERVICE_NAME));
    opentelemetry::global::set_tracer_provider(provider.clone());
    let _ = TRACER_PROVIDER.set(provider);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer.with_span_events(FmtSpan::CLOSE))
        .with(otel_layer)
        .try_init()?;
    Ok(())
}

fn otel_provider() -> SdkTracerProvider {
    SdkTracerProvider::builder()
        .with_resource(Resource::builder().with_service_name(SERVICE_NAME).build())
        .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
        .build()
}

/// Flush exported spans. Does nothing when OpenTelemetry was never enabled.
pub fn shutdown_tracing() {
    let Some(provider) = TRACER_PROVIDER.get() else {
        return;
    };
    if let Err(e) = provider.shutdown() {
        eprintln!("Warning: failed to flush traces: {e}");
    }
}
