use crate::{Alm, ClusterStore};
use k8s_openapi::api::core::v1::ObjectReference;
use kube::{
    ResourceExt,
    runtime::events::{Event, EventType},
};
use tracing::*;

/// Events are informative: a failure to publish one never fails the pass
pub async fn record<S: ClusterStore>(store: &S, alm: &Alm, event: Event) {
    if let Err(e) = store.publish(alm, event).await {
        warn!("Failed to publish an event for ALM {}: {:?}", alm.name_any(), e);
    }
}

#[must_use]
pub fn from_create(alm: &str, child_type: &str, child_name: &str, child: Option<ObjectReference>) -> Event {
    Event {
        type_: EventType::Normal,
        reason: format!("Reconciling `{alm}` ALM"),
        note: Some(format!("Creating `{child_name}` {child_type} for `{alm}` ALM")),
        action: format!("Creating `{child_name}` {child_type}"),
        secondary: child,
    }
}

#[must_use]
pub fn from_adopt(alm: &str, secret: &str, child: Option<ObjectReference>) -> Event {
    Event {
        type_: EventType::Normal,
        reason: format!("Reconciling `{alm}` ALM"),
        note: Some(format!("`{alm}` ALM is now the controller of `{secret}` Secret")),
        action: format!("Owning `{secret}` Secret"),
        secondary: child,
    }
}

#[must_use]
pub fn rollout_complete(alm: &str, services: usize) -> Event {
    Event {
        type_: EventType::Normal,
        reason: format!("Reconciling `{alm}` ALM"),
        note: Some(format!("All {services} services of `{alm}` ALM are deployed")),
        action: "Rollout complete".to_string(),
        secondary: None,
    }
}

#[must_use]
pub fn ishtar_unhealthy(alm: &str) -> Event {
    Event {
        type_: EventType::Warning,
        reason: format!("Monitoring `{alm}` ALM"),
        note: Some(format!("ishtar of `{alm}` ALM does not report UP")),
        action: "Checking ishtar health".to_string(),
        secondary: None,
    }
}
