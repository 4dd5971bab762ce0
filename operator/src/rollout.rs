use crate::{Alm, ClusterStore, Error, Result, ensure::ensure, events, resources};
use async_trait::async_trait;
use common::{
    profile::{DeploymentProfile, ROLLOUT_ORDER, ServiceProfile, Workload},
    templates,
};
use k8s_openapi::api::{
    apps::v1::{Deployment, StatefulSet},
    core::v1::{ConfigMap, Service},
    networking::v1::Ingress,
};
use kube::ResourceExt;
use tracing::*;

/// Outcome of a step or of a whole pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    Done,
    Requeue,
}

/// One unit of the ordered rollout
#[async_trait]
pub trait RolloutStep<S: ClusterStore>: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, store: &S) -> Result<Progress>;
}

/// Run the steps in order, stopping at the first one that asks for a requeue or fails
pub async fn sequence<S: ClusterStore>(store: &S, steps: &[Box<dyn RolloutStep<S> + '_>]) -> Result<Progress> {
    for step in steps {
        match step.run(store).await {
            Ok(Progress::Done) => debug!("rollout step {} done", step.name()),
            Ok(Progress::Requeue) => {
                debug!("rollout step {} is not ready yet", step.name());
                return Ok(Progress::Requeue);
            }
            Err(e) => {
                warn!("rollout step {} failed: {:?}", step.name(), e);
                return Err(e);
            }
        }
    }
    Ok(Progress::Done)
}

/// Converge the resources of one service: ConfigMap, workload, optional Ingress then Service
pub struct ServiceStep<'a> {
    alm: &'a Alm,
    service: &'a ServiceProfile,
}

impl<'a> ServiceStep<'a> {
    #[must_use]
    pub fn new(alm: &'a Alm, service: &'a ServiceProfile) -> Self {
        Self { alm, service }
    }
}

#[async_trait]
impl<S: ClusterStore> RolloutStep<S> for ServiceStep<'_> {
    fn name(&self) -> &str {
        &self.service.name
    }

    async fn run(&self, store: &S) -> Result<Progress> {
        let (alm, svc) = (self.alm, self.service);
        ensure(store, alm, &alm.service_cm_name(&svc.name), || -> Result<ConfigMap> {
            resources::config_map(templates::service_data(alm, svc))
        })
        .await?;
        match svc.workload {
            Workload::Deployment => {
                ensure(store, alm, &svc.name, || -> Result<Deployment> {
                    resources::deployment(alm, svc)
                })
                .await?;
            }
            Workload::StatefulSet => {
                ensure(store, alm, &svc.name, || -> Result<StatefulSet> {
                    resources::stateful_set(alm, svc)
                })
                .await?;
            }
            Workload::Job => {
                return Err(Error::Other(format!("{} is not a long running service", svc.name)));
            }
        }
        if let Some(ing) = &svc.ingress {
            ensure(store, alm, ing.name, || -> Result<Ingress> {
                resources::ingress(alm, svc, ing)
            })
            .await?;
        }
        ensure(store, alm, &svc.name, || -> Result<Service> { resources::service(svc) }).await?;
        Ok(Progress::Done)
    }
}

/// Roll every service of the profile out, in the fixed dependency order
pub async fn rollout<S: ClusterStore>(store: &S, alm: &Alm, profile: &DeploymentProfile) -> Result<Progress> {
    let mut steps: Vec<Box<dyn RolloutStep<S> + '_>> = Vec::with_capacity(ROLLOUT_ORDER.len());
    for name in ROLLOUT_ORDER {
        let service = profile
            .get(name)
            .ok_or_else(|| Error::Other(format!("no {name} in the deployment profile")))?;
        steps.push(Box::new(ServiceStep::new(alm, service)));
    }
    let progress = sequence(store, &steps).await?;
    if progress == Progress::Done {
        info!("ALM {} rolled out", alm.name_any());
        events::record(store, alm, events::rollout_complete(&alm.name_any(), steps.len())).await;
    }
    Ok(progress)
}
