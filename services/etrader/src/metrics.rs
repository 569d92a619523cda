//! Prometheus metrics exposition
//!
//! Metrics recorded by the client libraries:
//!
//! - `etrade_authorizations_total` (counter): label `source` (fresh, cached)
//! - `etrade_renewal_checks_total` (counter): label `outcome`
//!
//! Recorded here:
//!
//! - `etrader_commands_total` (counter): labels `command`, `result`
//! - `etrader_command_duration_seconds` (histogram): label `command`

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

const DURATION_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("etrader_command_duration_seconds".to_string()),
        DURATION_BUCKETS,
    )
}

/// Install the global recorder and serve `/metrics` on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn install_exporter(addr: SocketAddr) -> Result<(), BuildError> {
    builder()?.with_http_listener(addr).install()
}

/// Record a finished command with its outcome.
pub fn record_command(command: &'static str, ok: bool, duration_secs: f64) {
    let result = if ok { "ok" } else { "error" };
    metrics::counter!("etrader_commands_total", "command" => command, "result" => result)
        .increment(1);
    metrics::histogram!("etrader_command_duration_seconds", "command" => command)
        .record(duration_secs);
}
