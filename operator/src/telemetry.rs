use opentelemetry::trace::{TraceContextExt, TraceId};
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Trace id of the current span, `TraceId::INVALID` unless built with the `telemetry` feature
#[must_use]
pub fn get_trace_id() -> TraceId {
    tracing::Span::current()
        .context()
        .span()
        .span_context()
        .trace_id()
}

/// Batch exporter of spans to the OTLP collector at `OPENTELEMETRY_ENDPOINT_URL`
#[cfg(feature = "telemetry")]
pub async fn init_tracer() -> crate::Result<opentelemetry::sdk::trace::Tracer> {
    use crate::Error;
    let otlp_endpoint = std::env::var("OPENTELEMETRY_ENDPOINT_URL")
        .map_err(|_| Error::Other("OPENTELEMETRY_ENDPOINT_URL is required for tracing".to_string()))?;
    let channel = tonic::transport::Channel::from_shared(otlp_endpoint)
        .map_err(|e| Error::Other(format!("invalid collector url: {e}")))?
        .connect()
        .await
        .map_err(|e| Error::Other(format!("cannot reach the collector: {e}")))?;

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_channel(channel))
        .with_trace_config(opentelemetry::sdk::trace::config().with_resource(
            opentelemetry::sdk::Resource::new(vec![opentelemetry::KeyValue::new(
                "service.name",
                "alm-operator",
            )]),
        ))
        .install_batch(opentelemetry::runtime::Tokio)
        .map_err(|e| Error::Other(format!("cannot install the tracer: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_trace_outside_an_exported_span() {
        let span = tracing::info_span!("reconcile");
        let _enter = span.enter();
        assert_eq!(get_trace_id(), TraceId::INVALID);
    }
}
