//! Scan orchestration: enumerate services, resolve readiness, classify.
//!
//! A scan walks services one at a time in the order the API server listed
//! them. Watch mode repeats the scan with a fixed sleep between cycles until
//! the caller's [`CancellationToken`] fires or the report callback breaks.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::metrics::IdleServiceMetrics;
use crate::orphan::{Orphan, classify};
use crate::readiness::ReadinessResolver;
use crate::source::{EndpointSource, ServiceSource};

/// Which namespaces a scan covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanScope {
    /// The default namespace of the current kube context.
    Default,
    /// One explicit namespace.
    Namespace(String),
    /// Every namespace in the cluster.
    AllNamespaces,
}

impl ScanScope {
    /// Builds a scope from the `-A` and `--namespace` flags.
    ///
    /// An empty namespace is treated as not given.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when both flags are set.
    pub fn from_flags(all_namespaces: bool, namespace: Option<&str>) -> Result<Self> {
        match (all_namespaces, namespace.filter(|ns| !ns.is_empty())) {
            (true, Some(_)) => Err(Error::Config(
                "use either -A or --namespace, not both".to_string(),
            )),
            (true, None) => Ok(Self::AllNamespaces),
            (false, Some(ns)) => Ok(Self::Namespace(ns.to_string())),
            (false, None) => Ok(Self::Default),
        }
    }
}

impl fmt::Display for ScanScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default namespace"),
            Self::Namespace(ns) => write!(f, "namespace {ns}"),
            Self::AllNamespaces => f.write_str("all namespaces"),
        }
    }
}

/// Waits between watch cycles.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Sleeps for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by [`tokio::time::sleep`].
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Runs idle service scans against a cluster source.
pub struct ScanOrchestrator<S> {
    source: S,
    scope: ScanScope,
    request_timeout: Duration,
    resolver: ReadinessResolver,
    metrics: Arc<IdleServiceMetrics>,
}

impl<S> ScanOrchestrator<S>
where
    S: ServiceSource + EndpointSource,
{
    /// Creates an orchestrator. Every remote call is bounded by `request_timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Registry`] if the idle service gauge cannot be created.
    pub fn new(source: S, scope: ScanScope, request_timeout: Duration) -> Result<Self> {
        Ok(Self {
            source,
            scope,
            request_timeout,
            resolver: ReadinessResolver::new(request_timeout),
            metrics: Arc::new(IdleServiceMetrics::new()?),
        })
    }

    /// Returns the gauge this orchestrator updates after every scan.
    ///
    /// Hand this to the metrics listener; it only reads from it.
    #[must_use]
    pub fn metrics(&self) -> Arc<IdleServiceMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Runs one full scan and updates the gauge with its result.
    ///
    /// Orphans are returned in service listing order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Enumeration`] or [`Error::EnumerationTimeout`] if the
    /// services cannot be listed. Readiness lookups never fail a scan.
    pub async fn scan_once(&self) -> Result<Vec<Orphan>> {
        let listing = timeout(self.request_timeout, self.source.list_services(&self.scope)).await;
        let services = match listing {
            Ok(Ok(services)) => services,
            Ok(Err(e)) => return Err(Error::Enumeration(e)),
            Err(_) => return Err(Error::EnumerationTimeout(self.request_timeout)),
        };

        let now = SystemTime::now();
        let mut orphans = Vec::new();

        for service in &services {
            let namespace = service.metadata.namespace.as_deref().unwrap_or_default();
            let name = service.metadata.name.as_deref().unwrap_or_default();

            let readiness = self.resolver.resolve(&self.source, namespace, name).await;
            tracing::debug!(
                "{namespace}/{name}: {} ready endpoints (from {})",
                readiness.ready,
                readiness.source
            );

            if let Some(orphan) = classify(service, readiness.ready, now) {
                orphans.push(orphan);
            }
        }

        tracing::info!(
            "scanned {} services in {}, {} idle",
            services.len(),
            self.scope,
            orphans.len()
        );

        self.metrics.apply(&orphans);
        Ok(orphans)
    }

    /// Scans repeatedly, sleeping `interval` between cycles.
    ///
    /// After every cycle the orphans are passed to `report`; returning
    /// [`ControlFlow::Break`] stops the loop. Cancelling `cancel` stops the
    /// loop at the next sleep. The sleep is always the full `interval`, no
    /// matter how long the scan took. Returns the orphans of the last
    /// completed scan.
    ///
    /// # Errors
    ///
    /// Any enumeration failure aborts the loop; failed cycles are not skipped.
    pub async fn watch<F>(
        &self,
        interval: Duration,
        sleeper: &dyn Sleeper,
        cancel: &CancellationToken,
        mut report: F,
    ) -> Result<Vec<Orphan>>
    where
        F: FnMut(&[Orphan]) -> ControlFlow<()>,
    {
        let mut cycle: u64 = 0;

        loop {
            cycle += 1;
            tracing::debug!("watch cycle {cycle} starting");

            let orphans = self.scan_once().await?;
            if report(&orphans).is_break() {
                return Ok(orphans);
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::debug!("watch cancelled after {cycle} cycles");
                    return Ok(orphans);
                }
                () = sleeper.sleep(interval) => {}
            }
        }
    }
}
