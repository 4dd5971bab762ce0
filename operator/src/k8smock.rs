use crate::{Alm, ClusterStore, Error, Managed, Result};
use async_trait::async_trait;
use common::AlmStatus;
use kube::runtime::events::{Event, EventType};
use serde_json::Value;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Mutex,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    Get(String, String),
    Create(String, String),
    Replace(String, String),
    PatchStatus(String),
}

/// In-memory cluster recording every call made to it
#[derive(Default)]
pub struct K8sStoreMock {
    objects: Mutex<BTreeMap<(String, String, String), Value>>,
    ops: Mutex<Vec<Op>>,
    /// (kind, name) whose creation loses a race against another writer
    racing: Mutex<BTreeSet<(String, String)>>,
    /// (kind, name) whose creation is rejected
    failing: Mutex<BTreeSet<(String, String)>>,
    fail_replace: Mutex<bool>,
    fail_status: Mutex<bool>,
    /// (warning, action) of every published event
    events: Mutex<Vec<(bool, String)>>,
    fail_events: Mutex<bool>,
}

fn kind_of<K: Managed>() -> String {
    K::kind(&()).to_string()
}

impl K8sStoreMock {
    pub fn insert<K: Managed>(&self, ns: &str, obj: &K) {
        let name = obj.meta().name.clone().unwrap_or_default();
        self.objects.lock().unwrap().insert(
            (kind_of::<K>(), ns.to_string(), name),
            serde_json::to_value(obj).unwrap(),
        );
    }

    pub fn read<K: Managed>(&self, ns: &str, name: &str) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .get(&(kind_of::<K>(), ns.to_string(), name.to_string()))
            .map(|v| serde_json::from_value(v.clone()).unwrap())
    }

    pub fn race_on_create(&self, kind: &str, name: &str) {
        self.racing.lock().unwrap().insert((kind.to_string(), name.to_string()));
    }

    pub fn fail_on_create(&self, kind: &str, name: &str) {
        self.failing.lock().unwrap().insert((kind.to_string(), name.to_string()));
    }

    pub fn fail_replace(&self) {
        *self.fail_replace.lock().unwrap() = true;
    }

    pub fn fail_status(&self) {
        *self.fail_status.lock().unwrap() = true;
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.lock().unwrap().clear();
    }

    /// (kind, name) of every successful creation, in order
    pub fn created(&self) -> Vec<(String, String)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Create(kind, name) => Some((kind, name)),
                _ => None,
            })
            .collect()
    }

    pub fn mutations(&self) -> Vec<Op> {
        self.ops()
            .into_iter()
            .filter(|op| !matches!(op, Op::Get(..)))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn fail_events(&self) {
        *self.fail_events.lock().unwrap() = true;
    }

    /// Actions of the published events, in order
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().iter().map(|(_, a)| a.clone()).collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(warning, _)| *warning)
            .map(|(_, a)| a.clone())
            .collect()
    }
}

#[async_trait]
impl ClusterStore for K8sStoreMock {
    async fn get_opt<K: Managed>(&self, ns: &str, name: &str) -> Result<Option<K>> {
        self.ops
            .lock()
            .unwrap()
            .push(Op::Get(kind_of::<K>(), name.to_string()));
        Ok(self.read(ns, name))
    }

    async fn create<K: Managed>(&self, ns: &str, obj: &K) -> Result<K> {
        let kind = kind_of::<K>();
        let name = obj.meta().name.clone().unwrap_or_default();
        let key = (kind.clone(), name.clone());
        if self.failing.lock().unwrap().contains(&key) {
            return Err(Error::Other(format!("admission denied {kind}/{name}")));
        }
        if self.racing.lock().unwrap().remove(&key) {
            self.insert(ns, obj);
            return Err(Error::AlreadyExists(kind, ns.to_string(), name));
        }
        if self.read::<K>(ns, &name).is_some() {
            return Err(Error::AlreadyExists(kind, ns.to_string(), name));
        }
        self.insert(ns, obj);
        self.ops.lock().unwrap().push(Op::Create(kind, name));
        Ok(obj.clone())
    }

    async fn replace<K: Managed>(&self, ns: &str, name: &str, obj: &K) -> Result<K> {
        if *self.fail_replace.lock().unwrap() {
            return Err(Error::Other(format!("conflict on {name}")));
        }
        self.insert(ns, obj);
        self.ops
            .lock()
            .unwrap()
            .push(Op::Replace(kind_of::<K>(), name.to_string()));
        Ok(obj.clone())
    }

    async fn patch_alm_status(&self, ns: &str, name: &str, status: &AlmStatus) -> Result<()> {
        if *self.fail_status.lock().unwrap() {
            return Err(Error::Other("status update rejected".to_string()));
        }
        let key = ("ALM".to_string(), ns.to_string(), name.to_string());
        let mut objects = self.objects.lock().unwrap();
        let alm = objects
            .get_mut(&key)
            .ok_or_else(|| Error::Other(format!("ALM {ns}/{name} not found")))?;
        alm["status"] = serde_json::to_value(status).unwrap();
        drop(objects);
        self.ops.lock().unwrap().push(Op::PatchStatus(name.to_string()));
        Ok(())
    }

    async fn publish(&self, _alm: &Alm, event: Event) -> Result<()> {
        if *self.fail_events.lock().unwrap() {
            return Err(Error::Other("events are forbidden".to_string()));
        }
        let warning = matches!(event.type_, EventType::Warning);
        self.events.lock().unwrap().push((warning, event.action));
        Ok(())
    }
}
