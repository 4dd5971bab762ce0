use crate::{
    Alm, ClusterStore, Error, Result,
    ensure::ensure,
    events, resources,
    rollout::Progress,
};
use common::{
    alm::BOOTSTRAP_SECRETS,
    profile::{CONFIGURATOR, DeploymentProfile},
    templates,
};
use k8s_openapi::api::{
    batch::v1::Job,
    core::v1::{ConfigMap, Secret},
};
use kube::{Resource, ResourceExt};
use tracing::*;

/// What a pass sees of the configurator Job
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobObservation {
    Absent,
    Running,
    Succeeded(i32),
}

impl From<Option<&Job>> for JobObservation {
    fn from(job: Option<&Job>) -> Self {
        match job {
            None => JobObservation::Absent,
            Some(job) => match job.status.as_ref().and_then(|s| s.succeeded) {
                Some(n) if n > 0 => JobObservation::Succeeded(n),
                _ => JobObservation::Running,
            },
        }
    }
}

pub async fn observe_job<S: ClusterStore>(store: &S, alm: &Alm) -> Result<JobObservation> {
    let ns = alm.namespace().unwrap_or_default();
    let job: Option<Job> = store.get_opt(&ns, &alm.job_name()).await?;
    Ok(JobObservation::from(job.as_ref()))
}

/// Whether the rollout may start in this pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gate {
    Open,
    Closed(Progress),
}

/// Drive the configurator Job. The gate opens once the Job has succeeded and its
/// secrets were adopted. Creating the Job ends the pass, a running Job asks for a requeue.
pub async fn gate<S: ClusterStore>(store: &S, alm: &Alm, profile: &DeploymentProfile) -> Result<Gate> {
    match observe_job(store, alm).await? {
        JobObservation::Absent => {
            let configurator = profile
                .get(CONFIGURATOR)
                .ok_or_else(|| Error::Other(format!("no {CONFIGURATOR} in the deployment profile")))?;
            ensure(store, alm, &alm.configurator_cm_name(), || -> Result<ConfigMap> {
                resources::config_map(templates::configurator_data(alm.spec.secure)?)
            })
            .await?;
            ensure(store, alm, &alm.config_import_cm_name(), || -> Result<ConfigMap> {
                resources::config_map(templates::config_import_data()?)
            })
            .await?;
            ensure(store, alm, &alm.job_name(), || resources::configurator_job(alm, configurator)).await?;
            info!("Configurator job {} started", alm.job_name());
            Ok(Gate::Closed(Progress::Done))
        }
        JobObservation::Running => {
            debug!("Waiting for configurator job {}", alm.job_name());
            Ok(Gate::Closed(Progress::Requeue))
        }
        JobObservation::Succeeded(n) => {
            info!("Configurator job {} succeeded ({} pods)", alm.job_name(), n);
            propagate_secrets(store, alm).await;
            Ok(Gate::Open)
        }
    }
}

/// Make the ALM the controller of the secrets produced by the configurator.
/// Best-effort: missing secrets and write failures are only logged.
pub async fn propagate_secrets<S: ClusterStore>(store: &S, alm: &Alm) {
    let ns = alm.namespace().unwrap_or_default();
    let Some(oref) = alm.controller_owner_ref(&()) else {
        warn!("ALM {} has no uid yet, cannot own its secrets", alm.name_any());
        return;
    };
    for name in BOOTSTRAP_SECRETS {
        let mut secret = match store.get_opt::<Secret>(&ns, name).await {
            Ok(Some(secret)) => secret,
            Ok(None) => {
                warn!("Secret {}/{} not found, not owned", ns, name);
                continue;
            }
            Err(e) => {
                warn!("Failed to get secret {}/{}: {:?}", ns, name, e);
                continue;
            }
        };
        let refs = secret.owner_references_mut();
        if refs.iter().any(|r| r.uid == oref.uid) {
            continue;
        }
        refs.retain(|r| r.controller != Some(true));
        refs.push(oref.clone());
        match store.replace(&ns, name, &secret).await {
            Ok(owned) => {
                info!("Secret {}/{} is now owned by {}", ns, name, alm.name_any());
                let event = events::from_adopt(&alm.name_any(), name, Some(owned.object_ref(&())));
                events::record(store, alm, event).await;
            }
            Err(e) => warn!("Failed to own secret {}/{}: {:?}", ns, name, e),
        }
    }
}
