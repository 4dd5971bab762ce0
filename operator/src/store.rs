use crate::{Alm, Error, Result};
use async_trait::async_trait;
use common::AlmStatus;
use k8s_openapi::NamespaceResourceScope;
use kube::{
    Client, Resource,
    api::{Api, Patch, PatchParams, PostParams},
    runtime::events::{Event, Recorder, Reporter},
};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Debug;

/// A namespaced kubernetes object the operator reads or creates
pub trait Managed:
    Resource<Scope = NamespaceResourceScope, DynamicType = ()>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}
impl<K> Managed for K where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// The handful of cluster operations the reconciler relies on
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// `None` when the object does not exist
    async fn get_opt<K: Managed>(&self, ns: &str, name: &str) -> Result<Option<K>>;

    /// Fails with `Error::AlreadyExists` when the name is taken
    async fn create<K: Managed>(&self, ns: &str, obj: &K) -> Result<K>;

    async fn replace<K: Managed>(&self, ns: &str, name: &str, obj: &K) -> Result<K>;

    /// Write the status sub-resource of an ALM only
    async fn patch_alm_status(&self, ns: &str, name: &str, status: &AlmStatus) -> Result<()>;

    /// Publish a kubernetes event about an ALM
    async fn publish(&self, alm: &Alm, event: Event) -> Result<()>;
}

#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    reporter: Reporter,
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client, reporter: Reporter) -> Self {
        Self { client, reporter }
    }
}

#[async_trait]
impl ClusterStore for KubeStore {
    async fn get_opt<K: Managed>(&self, ns: &str, name: &str) -> Result<Option<K>> {
        let api: Api<K> = Api::namespaced(self.client.clone(), ns);
        api.get_opt(name).await.map_err(Error::KubeError)
    }

    async fn create<K: Managed>(&self, ns: &str, obj: &K) -> Result<K> {
        let api: Api<K> = Api::namespaced(self.client.clone(), ns);
        api.create(&PostParams::default(), obj).await.map_err(|e| match e {
            kube::Error::Api(ae) if ae.code == 409 => Error::AlreadyExists(
                K::kind(&()).to_string(),
                ns.to_string(),
                obj.meta().name.clone().unwrap_or_default(),
            ),
            e => Error::KubeError(e),
        })
    }

    async fn replace<K: Managed>(&self, ns: &str, name: &str, obj: &K) -> Result<K> {
        let api: Api<K> = Api::namespaced(self.client.clone(), ns);
        api.replace(name, &PostParams::default(), obj)
            .await
            .map_err(Error::KubeError)
    }

    async fn patch_alm_status(&self, ns: &str, name: &str, status: &AlmStatus) -> Result<()> {
        let api: Api<Alm> = Api::namespaced(self.client.clone(), ns);
        let patch = Patch::Merge(serde_json::json!({ "status": status }));
        api.patch_status(name, &PatchParams::default(), &patch)
            .await
            .map_err(Error::KubeError)?;
        Ok(())
    }

    async fn publish(&self, alm: &Alm, event: Event) -> Result<()> {
        let recorder = Recorder::new(self.client.clone(), self.reporter.clone(), alm.object_ref(&()));
        recorder.publish(event).await.map_err(Error::KubeError)
    }
}
