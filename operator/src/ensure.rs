use crate::{Alm, ClusterStore, Error, Managed, Result, events};
use kube::{Resource, ResourceExt};
use tracing::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ensured {
    Created,
    AlreadyPresent,
}

/// Create the object `name` of kind `K`, owned by the ALM, unless it already exists.
///
/// Existing objects are left untouched: no drift is corrected. `build` only runs
/// when a creation is needed.
pub async fn ensure<K, S, F>(store: &S, owner: &Alm, name: &str, build: F) -> Result<Ensured>
where
    K: Managed,
    S: ClusterStore,
    F: FnOnce() -> Result<K> + Send,
{
    let ns = owner.namespace().unwrap_or_default();
    let kind = K::kind(&()).to_string();
    if store.get_opt::<K>(&ns, name).await?.is_some() {
        debug!("{} {}/{} already present", kind, ns, name);
        return Ok(Ensured::AlreadyPresent);
    }
    let mut obj = build()?;
    obj.meta_mut().name = Some(name.to_string());
    obj.meta_mut().namespace = Some(ns.clone());
    if let Some(oref) = owner.controller_owner_ref(&()) {
        obj.meta_mut().owner_references = Some(vec![oref]);
    }
    match store.create(&ns, &obj).await {
        Ok(created) => {
            info!("Created {} {}/{}", kind, ns, name);
            let event = events::from_create(&owner.name_any(), &kind, name, Some(created.object_ref(&())));
            events::record(store, owner, event).await;
            Ok(Ensured::Created)
        }
        Err(Error::AlreadyExists(..)) => {
            debug!("{} {}/{} created concurrently", kind, ns, name);
            Ok(Ensured::AlreadyPresent)
        }
        Err(e) => {
            warn!("Failed to create {} {}/{}: {:?}", kind, ns, name, e);
            Err(e)
        }
    }
}
