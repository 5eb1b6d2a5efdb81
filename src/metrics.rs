//! Per-namespace idle service gauge and its scrape endpoint.
//!
//! The scan loop is the only writer. Every [`IdleServiceMetrics::apply`]
//! resets the gauge before setting this scan's counts, so a namespace that had
//! idle services in an earlier scan but none now has no series at all;
//! scrapers treat an absent series as zero.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use prometheus::{Encoder, IntGaugeVec, Opts, Registry, TextEncoder};
use tokio::net::TcpListener;

use crate::error::{Error, Result};
use crate::orphan::Orphan;

/// Name of the exposed gauge.
pub const IDLE_SERVICES_METRIC: &str = "idle_services_total";

const IDLE_SERVICES_HELP: &str = "Number of Services with zero ready endpoints";

const NAMESPACE_LABEL: &str = "namespace";

/// Idle service counts of the most recent scan, keyed by namespace.
pub struct IdleServiceMetrics {
    registry: Registry,
    idle: IntGaugeVec,
    // Held for writing across reset-then-set, for reading while gathering.
    update: RwLock<()>,
}

impl IdleServiceMetrics {
    /// Creates the gauge on its own registry, with no series.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Registry`] if the gauge cannot be created or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let idle = IntGaugeVec::new(
            Opts::new(IDLE_SERVICES_METRIC, IDLE_SERVICES_HELP),
            &[NAMESPACE_LABEL],
        )?;
        registry.register(Box::new(idle.clone()))?;

        Ok(Self {
            registry,
            idle,
            update: RwLock::new(()),
        })
    }

    /// Replaces all series with the per-namespace counts of `orphans`.
    pub fn apply(&self, orphans: &[Orphan]) {
        let _update = self.update.write().unwrap_or_else(PoisonError::into_inner);
        self.idle.reset();
        for (namespace, count) in count_by_namespace(orphans) {
            self.idle
                .with_label_values(&[namespace.as_str()])
                .set(count);
        }
    }

    /// Returns the currently exposed series, read back from the registry.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn snapshot(&self) -> BTreeMap<String, i64> {
        self.gather()
            .iter()
            .filter(|family| family.get_name() == IDLE_SERVICES_METRIC)
            .flat_map(|family| family.get_metric())
            .filter_map(|metric| {
                let namespace = metric
                    .get_label()
                    .iter()
                    .find(|label| label.get_name() == NAMESPACE_LABEL)?;
                Some((
                    namespace.get_value().to_string(),
                    metric.get_gauge().get_value() as i64,
                ))
            })
            .collect()
    }

    /// Renders the registry in Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Registry`] if encoding fails.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| Error::Registry(prometheus::Error::Msg(e.to_string())))
    }

    fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        let _update = self.update.read().unwrap_or_else(PoisonError::into_inner);
        self.registry.gather()
    }
}

/// Counts orphans per namespace. Namespaces without orphans are absent.
#[must_use]
pub fn count_by_namespace(orphans: &[Orphan]) -> BTreeMap<String, i64> {
    let mut counts = BTreeMap::new();
    for orphan in orphans {
        *counts.entry(orphan.namespace.clone()).or_insert(0) += 1;
    }
    counts
}

/// Expands a host-less `:port` address to all interfaces.
fn bind_address(addr: &str) -> std::borrow::Cow<'_, str> {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}").into()
    } else {
        addr.into()
    }
}

/// Builds the scrape router. The router only ever reads `metrics`.
#[must_use]
pub fn router(metrics: Arc<IdleServiceMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<Arc<IdleServiceMetrics>>) -> Response {
    match metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, TextEncoder::new().format_type().to_string())],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Binds `addr` and serves `/metrics` from a background task.
///
/// Bind failures are returned; failures after the listener is up are logged.
///
/// # Errors
///
/// Returns [`Error::Metrics`] if the address cannot be bound.
pub async fn serve(addr: &str, metrics: Arc<IdleServiceMetrics>) -> Result<()> {
    let listener = TcpListener::bind(bind_address(addr).as_ref())
        .await
        .map_err(|source| Error::Metrics {
            addr: addr.to_string(),
            source,
        })?;

    match listener.local_addr() {
        Ok(local) => tracing::info!("serving metrics on http://{local}/metrics"),
        Err(_) => tracing::info!("serving metrics on {addr}"),
    }

    let app = router(metrics);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("metrics listener failed: {e}");
        }
    });

    Ok(())
}
