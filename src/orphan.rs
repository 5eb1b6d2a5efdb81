//! Idle service records.

use std::time::{Duration, SystemTime};

use k8s_openapi::api::core::v1::Service;
use serde::Serialize;

/// A service with zero ready endpoints, as reported by one scan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Orphan {
    /// Namespace of the service.
    pub namespace: String,
    /// Service name.
    pub service: String,
    /// Service type (`ClusterIP`, `NodePort`, `LoadBalancer`, ...).
    #[serde(rename = "type")]
    pub service_type: String,
    /// Cluster IP assigned to the service; the literal `None` for headless services.
    #[serde(rename = "clusterIP")]
    pub cluster_ip: String,
    /// Time since the service was created, e.g. `3h12m`.
    pub age: String,
}

/// Produces an [`Orphan`] for `service` if `ready` is zero.
///
/// `now` is the wall clock the age is measured against.
#[must_use]
pub fn classify(service: &Service, ready: usize, now: SystemTime) -> Option<Orphan> {
    if ready > 0 {
        return None;
    }

    let meta = &service.metadata;
    let spec = service.spec.as_ref();

    let age = meta
        .creation_timestamp
        .as_ref()
        .and_then(|created| now.duration_since(SystemTime::from(created.0)).ok())
        .unwrap_or_default();

    Some(Orphan {
        namespace: meta.namespace.clone().unwrap_or_default(),
        service: meta.name.clone().unwrap_or_default(),
        service_type: spec.and_then(|s| s.type_.clone()).unwrap_or_default(),
        cluster_ip: spec.and_then(|s| s.cluster_ip.clone()).unwrap_or_default(),
        age: format_age(age),
    })
}

/// Renders `age` rounded to the nearest minute, e.g. `45m` or `3h12m`.
#[must_use]
pub fn format_age(age: Duration) -> String {
    let minutes = (age.as_secs() + 30) / 60;
    let (hours, minutes) = (minutes / 60, minutes % 60);

    if hours > 0 {
        format!("{hours}h{minutes}m")
    } else {
        format!("{minutes}m")
    }
}
