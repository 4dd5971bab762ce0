use crate::{Alm, KubeStore, Metrics, Result, reconciler};
use chrono::{DateTime, Utc};
use common::{context::get_reporter, ishtar::HealthProbe, release::ReleaseSource};
use futures::{FutureExt, StreamExt, future::BoxFuture};
use k8s_openapi::api::{
    apps::v1::{Deployment, StatefulSet},
    batch::v1::Job,
    core::v1::{ConfigMap, Service},
    networking::v1::Ingress,
};
use kube::{
    api::{Api, ListParams},
    client::Client,
    runtime::{controller::Controller, events::Reporter, watcher::Config},
};
use serde::Serialize;
use std::sync::Arc;
use tokio::{sync::RwLock, time::Duration};

// Context for our reconciler
#[derive(Clone)]
pub struct Context {
    /// Cluster operations and events used by the state machine
    pub store: KubeStore,
    /// Where release manifests are fetched from
    pub releases: Arc<dyn ReleaseSource>,
    /// Health of the deployed installation
    pub probe: Arc<dyn HealthProbe>,
    /// Diagnostics read by the web server
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    /// Prometheus metrics
    pub metrics: Metrics,
    /// Delay before polling again an unfinished installation
    pub requeue: Duration,
}

/// Diagnostics to be exposed by the web server
#[derive(Clone, Serialize)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
    /// Identity of the operator in the events it publishes
    #[serde(skip)]
    pub reporter: Reporter,
}
impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_event: Utc::now(),
            reporter: get_reporter(),
        }
    }
}

/// Data owned by the Manager
#[derive(Clone, Default)]
pub struct Manager {
    /// Diagnostics populated by the reconciler
    diagnostics: Arc<RwLock<Diagnostics>>,
    /// Metrics populated by the reconciler
    metrics: Metrics,
}

/// Manager that owns the ALM Controller
impl Manager {
    /// Lifecycle initialization interface for app
    ///
    /// This returns a `Manager` that drives a `Controller` + a future to be awaited
    /// It is up to `main` to wait for the controller stream.
    pub async fn new(
        client: Client,
        releases: Arc<dyn ReleaseSource>,
        probe: Arc<dyn HealthProbe>,
        requeue: Duration,
    ) -> Result<(Self, BoxFuture<'static, ()>)> {
        let manager = Manager::default();
        let reporter = manager.diagnostics.read().await.reporter.clone();
        let context = Arc::new(Context {
            store: KubeStore::new(client.clone(), reporter),
            releases,
            probe,
            diagnostics: manager.diagnostics.clone(),
            metrics: manager.metrics.clone(),
            requeue,
        });

        let alms = Api::<Alm>::all(client.clone());
        // Ensure CRD is installed before loop-watching
        if let Err(e) = alms.list(&ListParams::default().limit(1)).await {
            tracing::error!("ALM CRD is not queryable; {e:?}. Is the CRD installed?");
            tracing::info!("Installation: cargo run --bin crdgen | kubectl apply -f -");
            return Err(e.into());
        }

        // All good. Start controller and return its future.
        let controller = Controller::new(alms, Config::default().any_semantic())
            .owns(Api::<Deployment>::all(client.clone()), Config::default())
            .owns(Api::<StatefulSet>::all(client.clone()), Config::default())
            .owns(Api::<Job>::all(client.clone()), Config::default())
            .owns(Api::<ConfigMap>::all(client.clone()), Config::default())
            .owns(Api::<Service>::all(client.clone()), Config::default())
            .owns(Api::<Ingress>::all(client), Config::default())
            .run(reconciler::reconcile, reconciler::error_policy, context)
            .filter_map(|x| async move { std::result::Result::ok(x) })
            .for_each(|_| futures::future::ready(()))
            .boxed();

        Ok((manager, controller))
    }

    /// Metrics getter
    #[must_use]
    pub fn metrics(&self) -> String {
        self.metrics.encode()
    }

    /// State getter
    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }
}
