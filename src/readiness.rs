//! Ready endpoint counting for a single service.
//!
//! # How It Works
//!
//! 1. Lists the service's `EndpointSlice`s (label `kubernetes.io/service-name`)
//! 2. If that call succeeds, the ready count is the number of slice endpoints
//!    whose `ready` condition is explicitly `true`, and that is the answer even
//!    when it is zero
//! 3. Only if that call fails (or times out) is the legacy `Endpoints` object
//!    consulted, counting every address across its subsets
//! 4. If the legacy lookup fails too, the count is zero
//!
//! The legacy object is a compatibility path for API servers without
//! `discovery.k8s.io/v1`. It is never merged with a successful slice answer.

use std::fmt;
use std::time::Duration;

use k8s_openapi::api::core::v1::Endpoints;
use k8s_openapi::api::discovery::v1::EndpointSlice;
use tokio::time::timeout;

use crate::source::EndpointSource;

/// Where a ready count came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadinessSource {
    /// `discovery.k8s.io/v1` `EndpointSlice`s.
    EndpointSlices,
    /// Legacy core/v1 `Endpoints`, used after the slice query failed.
    LegacyEndpoints,
    /// Both queries failed; the service is treated as having no endpoints.
    Unavailable,
}

impl fmt::Display for ReadinessSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EndpointSlices => "endpointslices",
            Self::LegacyEndpoints => "endpoints",
            Self::Unavailable => "none",
        })
    }
}

/// Resolved readiness of one service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Readiness {
    /// Number of ready backing endpoints.
    pub ready: usize,
    /// Source that produced `ready`.
    pub source: ReadinessSource,
}

/// Resolves ready endpoint counts, bounding each remote call by `request_timeout`.
#[derive(Clone, Copy, Debug)]
pub struct ReadinessResolver {
    request_timeout: Duration,
}

impl ReadinessResolver {
    /// Creates a resolver with the given per-call deadline.
    #[must_use]
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }

    /// Resolves the ready endpoint count of service `namespace/name`.
    ///
    /// Never fails: source errors select the fallback path and, ultimately, a
    /// count of zero.
    pub async fn resolve<S>(&self, source: &S, namespace: &str, name: &str) -> Readiness
    where
        S: EndpointSource + ?Sized,
    {
        let slices = timeout(
            self.request_timeout,
            source.list_endpoint_slices(namespace, name),
        )
        .await;

        let slice_err = match slices {
            Ok(Ok(slices)) => {
                return Readiness {
                    ready: count_ready_endpoints(&slices),
                    source: ReadinessSource::EndpointSlices,
                };
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {:?}", self.request_timeout),
        };

        tracing::debug!(
            "endpointslice lookup for {namespace}/{name} failed ({slice_err}), falling back to endpoints"
        );

        match timeout(self.request_timeout, source.get_endpoints(namespace, name)).await {
            Ok(Ok(endpoints)) => Readiness {
                ready: count_legacy_addresses(&endpoints),
                source: ReadinessSource::LegacyEndpoints,
            },
            Ok(Err(e)) => {
                tracing::warn!("endpoints lookup for {namespace}/{name} failed: {e}");
                Readiness {
                    ready: 0,
                    source: ReadinessSource::Unavailable,
                }
            }
            Err(_) => {
                tracing::warn!(
                    "endpoints lookup for {namespace}/{name} timed out after {:?}",
                    self.request_timeout
                );
                Readiness {
                    ready: 0,
                    source: ReadinessSource::Unavailable,
                }
            }
        }
    }
}

/// Counts endpoints across `slices` whose `ready` condition is explicitly true.
///
/// An absent condition counts as not ready.
#[must_use]
pub fn count_ready_endpoints(slices: &[EndpointSlice]) -> usize {
    slices
        .iter()
        .flat_map(|slice| &slice.endpoints)
        .filter(|ep| ep.conditions.as_ref().and_then(|c| c.ready) == Some(true))
        .count()
}

/// Counts addresses across all subsets of a legacy `Endpoints` object.
#[must_use]
pub fn count_legacy_addresses(endpoints: &Endpoints) -> usize {
    endpoints
        .subsets
        .iter()
        .flatten()
        .map(|subset| subset.addresses.as_ref().map_or(0, Vec::len))
        .sum()
}
