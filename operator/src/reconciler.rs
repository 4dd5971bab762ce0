use crate::{
    Alm, ClusterStore, Error, Result,
    bootstrap::{Gate, gate},
    events,
    manager::Context,
    rollout::{Progress, rollout},
    telemetry,
};
use chrono::Utc;
use common::{
    AlmStatus,
    alm::MARKER_DEPLOYMENT,
    ishtar::HealthProbe,
    profile::resolve_from,
    release::ReleaseSource,
};
use k8s_openapi::api::apps::v1::Deployment;
use kube::{ResourceExt, runtime::controller::Action};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{Span, debug, field, info, instrument, warn};

/// Where a pass left the installation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// The ALM was deleted
    Gone,
    /// The configurator Job was just started
    JobCreated,
    /// The configurator Job has not succeeded yet
    JobRunning,
    Rollout(Progress),
    /// The marker deployment exists, only the health of ishtar is followed
    Steady { ishtar_healthy: bool },
}

impl Phase {
    #[must_use]
    pub fn progress(self) -> Progress {
        match self {
            Phase::JobRunning => Progress::Requeue,
            Phase::Rollout(progress) => progress,
            Phase::Gone | Phase::JobCreated | Phase::Steady { .. } => Progress::Done,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Phase::Gone => "gone",
            Phase::JobCreated => "job_created",
            Phase::JobRunning => "job_running",
            Phase::Rollout(_) => "rollout",
            Phase::Steady { .. } => "steady",
        }
    }
}

/// One pass of the ALM state machine against the cluster
pub async fn reconcile_alm<S: ClusterStore>(
    store: &S,
    releases: &dyn ReleaseSource,
    probe: &dyn HealthProbe,
    ns: &str,
    name: &str,
) -> Result<Phase> {
    let Some(alm) = store.get_opt::<Alm>(ns, name).await? else {
        debug!("ALM {}/{} is gone", ns, name);
        return Ok(Phase::Gone);
    };
    let marker: Option<Deployment> = store.get_opt(ns, MARKER_DEPLOYMENT).await?;
    if marker.is_none() {
        let profile = resolve_from(&alm, releases).await?;
        info!("Installing ALM {}/{} as {}", ns, name, profile.class);
        if alm.spec.configurator.run {
            match gate(store, &alm, &profile).await? {
                Gate::Open => {}
                Gate::Closed(Progress::Done) => return Ok(Phase::JobCreated),
                Gate::Closed(Progress::Requeue) => return Ok(Phase::JobRunning),
            }
        }
        return Ok(Phase::Rollout(rollout(store, &alm, &profile).await?));
    }
    let ishtar_healthy = probe.healthy().await?;
    debug!("ALM {}/{} ishtar healthy: {}", ns, name, ishtar_healthy);
    if !ishtar_healthy {
        events::record(store, &alm, events::ishtar_unhealthy(name)).await;
    }
    store
        .patch_alm_status(ns, name, &AlmStatus { ishtar_healthy })
        .await
        .map_err(|e| Error::StatusUpdate(Box::new(e)))?;
    Ok(Phase::Steady { ishtar_healthy })
}

#[instrument(skip(ctx, alm), fields(trace_id))]
pub async fn reconcile(alm: Arc<Alm>, ctx: Arc<Context>) -> Result<Action> {
    let trace_id = telemetry::get_trace_id();
    if trace_id != opentelemetry::trace::TraceId::INVALID {
        Span::current().record("trace_id", field::display(&trace_id));
    }
    let _mes = ctx.metrics.reconcile.count_and_measure(&trace_id);
    ctx.diagnostics.write().await.last_event = Utc::now();
    let ns = alm.namespace().unwrap_or_default();
    let name = alm.name_any();
    debug!("Reconcilling ALM {}/{}", ns, name);
    let phase = reconcile_alm(&ctx.store, ctx.releases.as_ref(), ctx.probe.as_ref(), &ns, &name).await?;
    ctx.metrics.reconcile.reconcile_phase(&alm, phase);
    Ok(match phase.progress() {
        Progress::Done => Action::await_change(),
        Progress::Requeue => Action::requeue(ctx.requeue),
    })
}

/// Retry schedule of a failed pass
#[must_use]
pub fn retry_action(error: &Error, requeue: Duration) -> Action {
    match error {
        Error::StatusUpdate(_) => Action::await_change(),
        e if e.is_external() => Action::requeue(requeue),
        _ => Action::requeue(Duration::from_secs(5 * 60)),
    }
}

#[must_use]
pub fn error_policy(alm: Arc<Alm>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed for '{:?}.{:?}': {:?}", alm.metadata.namespace, alm.metadata.name, error);
    ctx.metrics.reconcile.reconcile_failure(&alm, error);
    retry_action(error, ctx.requeue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8smock::{K8sStoreMock, Op};
    use async_trait::async_trait;
    use common::{AlmSpec, alm::BOOTSTRAP_SECRETS, release::ReleaseManifest};
    use k8s_openapi::api::{
        batch::v1::{Job, JobStatus},
        core::v1::Secret,
    };
    use std::sync::Mutex;

    struct StaticReleases(Option<ReleaseManifest>);

    #[async_trait]
    impl ReleaseSource for StaticReleases {
        async fn fetch(&self, url: &str) -> Result<ReleaseManifest> {
            self.0
                .clone()
                .ok_or_else(|| Error::MethodFailed("Get".to_string(), 404, url.to_string()))
        }
    }

    #[derive(Default)]
    struct StubProbe {
        answers: Mutex<Vec<Result<bool>>>,
        calls: Mutex<usize>,
    }

    impl StubProbe {
        fn answering(answer: Result<bool>) -> Self {
            Self {
                answers: Mutex::new(vec![answer]),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl HealthProbe for StubProbe {
        async fn healthy(&self) -> Result<bool> {
            *self.calls.lock().unwrap() += 1;
            self.answers.lock().unwrap().pop().unwrap_or(Ok(true))
        }
    }

    fn releases() -> StaticReleases {
        StaticReleases(Some(
            ReleaseManifest::from_yaml("configurator: {version: 2.1.0}\ndaytona: {version: 2.1.3}\n").unwrap(),
        ))
    }

    fn alm(run: bool) -> Alm {
        let mut alm = Alm::new("demo", AlmSpec {
            deployment_type: "tiny".to_string(),
            docker_repo: "registry:5000".to_string(),
            release: "http://releases/lm.yaml".to_string(),
            ..AlmSpec::default()
        });
        alm.spec.configurator.run = run;
        alm.metadata.namespace = Some("lm".to_string());
        alm.metadata.uid = Some("alm-uid".to_string());
        alm
    }

    fn finished_job() -> Job {
        let mut job = Job::default();
        job.metadata.name = Some("demo-lm-configurator".to_string());
        job.status = Some(JobStatus {
            succeeded: Some(1),
            ..JobStatus::default()
        });
        job
    }

    fn secret(name: &str) -> Secret {
        let mut s = Secret::default();
        s.metadata.name = Some(name.to_string());
        s
    }

    async fn pass(store: &K8sStoreMock, probe: &StubProbe) -> Result<Phase> {
        reconcile_alm(store, &releases(), probe, "lm", "demo").await
    }

    /// Bring a store to the steady state through the bootstrap and the rollout
    async fn installed() -> K8sStoreMock {
        let store = K8sStoreMock::default();
        store.insert("lm", &alm(true));
        let probe = StubProbe::default();
        pass(&store, &probe).await.unwrap();
        store.insert("lm", &finished_job());
        pass(&store, &probe).await.unwrap();
        store.clear_ops();
        store
    }

    // ── Install ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_install_scenario() {
        let store = K8sStoreMock::default();
        store.insert("lm", &alm(true));
        let probe = StubProbe::default();

        // no job yet: bootstrap resources, no requeue
        assert_eq!(pass(&store, &probe).await.unwrap(), Phase::JobCreated);
        assert_eq!(store.created(), vec![
            ("ConfigMap".to_string(), "demo-lm-configurator-cm".to_string()),
            ("ConfigMap".to_string(), "demo-lm-config-import-cm".to_string()),
            ("Job".to_string(), "demo-lm-configurator".to_string()),
        ]);

        // job running
        store.clear_ops();
        assert_eq!(pass(&store, &probe).await.unwrap(), Phase::JobRunning);
        assert_eq!(Phase::JobRunning.progress(), Progress::Requeue);
        assert!(store.mutations().is_empty());

        // job succeeded
        store.insert("lm", &finished_job());
        for name in BOOTSTRAP_SECRETS {
            store.insert("lm", &secret(name));
        }
        store.clear_ops();
        assert_eq!(pass(&store, &probe).await.unwrap(), Phase::Rollout(Progress::Done));
        let ops = store.ops();
        let first_create = ops.iter().position(|op| matches!(op, Op::Create(..))).unwrap();
        let secret_ops = ops[..first_create]
            .iter()
            .filter(|op| matches!(op, Op::Get(kind, _) | Op::Replace(kind, _) if kind == "Secret"))
            .count();
        assert_eq!(secret_ops, 12);
        let created = store.created();
        assert_eq!(created.len(), 36);
        assert_eq!(created[0], ("ConfigMap".to_string(), "demo-conductor-cm".to_string()));
        let order: Vec<&str> = created
            .iter()
            .filter(|(kind, _)| kind == "Service")
            .map(|(_, name)| name.as_str())
            .collect();
        assert_eq!(order, common::profile::ROLLOUT_ORDER.to_vec());
        let marker: Deployment = store.read("lm", "daytona").unwrap();
        let image = marker.spec.unwrap().template.spec.unwrap().containers[0].image.clone();
        assert_eq!(image.as_deref(), Some("registry:5000/daytona:2.1.3"));
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test]
    async fn test_without_configurator_rollout_starts_at_once() {
        let store = K8sStoreMock::default();
        store.insert("lm", &alm(false));
        assert_eq!(pass(&store, &StubProbe::default()).await.unwrap(), Phase::Rollout(Progress::Done));
        let created = store.created();
        assert!(created.iter().all(|(kind, _)| kind != "Job"));
        assert_eq!(created[0], ("ConfigMap".to_string(), "demo-conductor-cm".to_string()));
    }

    #[tokio::test]
    async fn test_release_fetch_failure_aborts_the_pass() {
        let store = K8sStoreMock::default();
        store.insert("lm", &alm(true));
        let res = reconcile_alm(&store, &StaticReleases(None), &StubProbe::default(), "lm", "demo").await;
        assert!(matches!(res, Err(Error::MethodFailed(_, 404, _))));
        assert!(store.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_missing_alm_is_silent() {
        let store = K8sStoreMock::default();
        assert_eq!(pass(&store, &StubProbe::default()).await.unwrap(), Phase::Gone);
        assert_eq!(store.ops(), vec![Op::Get("ALM".to_string(), "demo".to_string())]);
    }

    // ── Steady state ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_steady_state_records_health() {
        let store = installed().await;
        let probe = StubProbe::answering(Ok(true));
        assert_eq!(pass(&store, &probe).await.unwrap(), Phase::Steady { ishtar_healthy: true });
        assert_eq!(probe.calls(), 1);
        assert_eq!(store.mutations(), vec![Op::PatchStatus("demo".to_string())]);
        let current: Alm = store.read("lm", "demo").unwrap();
        assert_eq!(current.status, Some(AlmStatus { ishtar_healthy: true }));

        assert!(store.warnings().is_empty());

        let probe = StubProbe::answering(Ok(false));
        assert_eq!(pass(&store, &probe).await.unwrap(), Phase::Steady { ishtar_healthy: false });
        let current: Alm = store.read("lm", "demo").unwrap();
        assert_eq!(current.status, Some(AlmStatus { ishtar_healthy: false }));
        assert_eq!(store.warnings(), vec!["Checking ishtar health".to_string()]);
    }

    #[tokio::test]
    async fn test_probe_failure_is_an_error() {
        let store = installed().await;
        let probe = StubProbe::answering(Err(Error::LoginFailed("jack".to_string(), "401".to_string())));
        let err = pass(&store, &probe).await.unwrap_err();
        assert!(err.is_external());
        assert!(store.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_status_failure_is_reported() {
        let store = installed().await;
        store.fail_status();
        let err = pass(&store, &StubProbe::default()).await.unwrap_err();
        assert!(matches!(err, Error::StatusUpdate(_)));
        assert_eq!(retry_action(&err, Duration::from_secs(10)), Action::await_change());
    }

    #[tokio::test]
    async fn test_secrets_are_only_adopted_once() {
        // A secret recreated after the rollout stays unowned: adoption only happens at bootstrap
        let store = installed().await;
        store.insert("lm", &secret("lm-certs"));
        pass(&store, &StubProbe::default()).await.unwrap();
        assert!(!store.ops().iter().any(|op| matches!(op, Op::Get(kind, _) if kind == "Secret")));
        let unowned: Secret = store.read("lm", "lm-certs").unwrap();
        assert!(unowned.owner_references().is_empty());
    }

    #[test]
    fn test_phase_labels() {
        assert_eq!(Phase::Gone.progress(), Progress::Done);
        assert_eq!(Phase::JobCreated.progress(), Progress::Done);
        assert_eq!(Phase::Rollout(Progress::Requeue).progress(), Progress::Requeue);
        assert_eq!(Phase::Steady { ishtar_healthy: false }.label(), "steady");
        assert_eq!(Phase::JobRunning.label(), "job_running");
    }

    // ── Retries ───────────────────────────────────────────────────────────────

    #[test]
    fn test_retry_action() {
        let short = Duration::from_secs(10);
        assert_eq!(
            retry_action(&Error::MethodFailed("Get".to_string(), 503, String::new()), short),
            Action::requeue(short)
        );
        assert_eq!(
            retry_action(&Error::Other("conflict".to_string()), short),
            Action::requeue(Duration::from_secs(300))
        );
    }
}
