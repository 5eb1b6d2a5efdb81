//! Cluster data sources.
//!
//! The scan only needs three reads from the API server: list services, list
//! the `EndpointSlice`s of one service, and fetch the legacy `Endpoints`
//! object of one service. They are split into two traits so tests can swap in
//! a fake cluster, and so the slice/legacy fallback can be exercised without
//! an API server that lacks `discovery.k8s.io/v1`.

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Endpoints, Service};
use k8s_openapi::api::discovery::v1::EndpointSlice;
use kube::api::ListParams;
use kube::{Api, Client};

use crate::scan::ScanScope;

/// Error type for data source failures.
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Label that `EndpointSlice` controllers set to the owning service name.
pub const SERVICE_NAME_LABEL: &str = "kubernetes.io/service-name";

/// Lists the services a scan covers.
#[async_trait]
pub trait ServiceSource: Send + Sync {
    /// Lists services in `scope`, in the order the API server returns them.
    async fn list_services(&self, scope: &ScanScope) -> Result<Vec<Service>, SourceError>;
}

/// Reads endpoint readiness data for one service.
#[async_trait]
pub trait EndpointSource: Send + Sync {
    /// Lists the `EndpointSlice`s labelled with `service` in `namespace`.
    async fn list_endpoint_slices(
        &self,
        namespace: &str,
        service: &str,
    ) -> Result<Vec<EndpointSlice>, SourceError>;

    /// Fetches the legacy `Endpoints` object named `service` in `namespace`.
    async fn get_endpoints(
        &self,
        namespace: &str,
        service: &str,
    ) -> Result<Endpoints, SourceError>;
}

#[async_trait]
impl<T: ServiceSource + ?Sized> ServiceSource for Arc<T> {
    async fn list_services(&self, scope: &ScanScope) -> Result<Vec<Service>, SourceError> {
        (**self).list_services(scope).await
    }
}

#[async_trait]
impl<T: EndpointSource + ?Sized> EndpointSource for Arc<T> {
    async fn list_endpoint_slices(
        &self,
        namespace: &str,
        service: &str,
    ) -> Result<Vec<EndpointSlice>, SourceError> {
        (**self).list_endpoint_slices(namespace, service).await
    }

    async fn get_endpoints(
        &self,
        namespace: &str,
        service: &str,
    ) -> Result<Endpoints, SourceError> {
        (**self).get_endpoints(namespace, service).await
    }
}

/// [`ServiceSource`] and [`EndpointSource`] backed by a kube [`Client`].
#[derive(Clone)]
pub struct KubeSource {
    client: Client,
}

impl KubeSource {
    /// Wraps an already configured client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ServiceSource for KubeSource {
    async fn list_services(&self, scope: &ScanScope) -> Result<Vec<Service>, SourceError> {
        let services: Api<Service> = match scope {
            ScanScope::AllNamespaces => Api::all(self.client.clone()),
            ScanScope::Namespace(ns) => Api::namespaced(self.client.clone(), ns),
            ScanScope::Default => Api::default_namespaced(self.client.clone()),
        };

        tracing::debug!("listing services in {scope}");
        let list = services.list(&ListParams::default()).await?;
        Ok(list.items)
    }
}

#[async_trait]
impl EndpointSource for KubeSource {
    async fn list_endpoint_slices(
        &self,
        namespace: &str,
        service: &str,
    ) -> Result<Vec<EndpointSlice>, SourceError> {
        let slices: Api<EndpointSlice> = Api::namespaced(self.client.clone(), namespace);
        let label_selector = format!("{SERVICE_NAME_LABEL}={service}");
        let list = slices
            .list(&ListParams::default().labels(&label_selector))
            .await?;
        Ok(list.items)
    }

    async fn get_endpoints(
        &self,
        namespace: &str,
        service: &str,
    ) -> Result<Endpoints, SourceError> {
        let endpoints: Api<Endpoints> = Api::namespaced(self.client.clone(), namespace);
        Ok(endpoints.get(service).await?)
    }
}
