#![deny(missing_docs)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Find Kubernetes Services with zero ready endpoints.
//!
//! Services often outlive the workloads behind them: a Deployment is deleted
//! but its Service stays, still holding a cluster IP and maybe a cloud load
//! balancer. This crate scans one namespace, or the whole cluster, and reports
//! every Service whose endpoints are all gone or not ready.
//!
//! # Features
//!
//! - **`EndpointSlice` readiness**: counts endpoints whose `ready` condition is true
//! - **Legacy fallback**: uses core/v1 `Endpoints` only when the slice API call fails
//! - **Watch mode**: rescans on a fixed interval until cancelled
//! - **Prometheus gauge**: `idle_services_total{namespace}` for the latest scan
//!
//! # Usage
//!
//! ```ignore
//! use std::time::Duration;
//! use idle_svc::{KubeSource, ScanOrchestrator, ScanScope};
//!
//! let client = kube::Client::try_default().await?;
//! let orchestrator = ScanOrchestrator::new(
//!     KubeSource::new(client),
//!     ScanScope::AllNamespaces,
//!     Duration::from_secs(30),
//! )?;
//!
//! for orphan in orchestrator.scan_once().await? {
//!     println!("{}/{} has no ready endpoints", orphan.namespace, orphan.service);
//! }
//! ```

mod error;
pub mod metrics;
mod orphan;
pub mod output;
mod readiness;
mod scan;
mod source;

pub use error::{Error, Result};
pub use metrics::IdleServiceMetrics;
pub use orphan::Orphan;
pub use output::OutputFormat;
pub use readiness::{Readiness, ReadinessResolver, ReadinessSource};
pub use scan::{ScanOrchestrator, ScanScope, Sleeper, TokioSleeper};
pub use source::{EndpointSource, KubeSource, SERVICE_NAME_LABEL, ServiceSource, SourceError};
