use crate::{Alm, Result};
use common::profile::{IngressProfile, ProfileExtension, ServiceProfile};
use k8s_openapi::api::{
    apps::v1::{Deployment, StatefulSet},
    batch::v1::Job,
    core::v1::{ConfigMap, Service},
    networking::v1::Ingress,
};
use kube::ResourceExt;
use serde_json::{Value, json};
use std::collections::BTreeMap;

// ── Volumes ───────────────────────────────────────────────────────────────────

/// Volumes of a pod with their mounts in the service container
#[derive(Default, Debug)]
pub struct Volumes {
    pub volumes: Vec<Value>,
    pub mounts: Vec<Value>,
}

impl Volumes {
    fn secret(&mut self, name: &str, path: &str) {
        self.volumes.push(json!({"name": name, "secret": {"secretName": name}}));
        self.mounts.push(json!({"name": name, "mountPath": path}));
    }

    fn config_map(&mut self, name: &str, cm: &str, path: &str) {
        self.volumes.push(json!({"name": name, "configMap": {"name": cm}}));
        self.mounts.push(json!({"name": name, "mountPath": path}));
    }

    /// A writable copy area next to the read-only content of a ConfigMap
    fn unpacked(&mut self, name: &str, cm: &str) {
        self.volumes.push(json!({"name": name, "emptyDir": {}}));
        self.mounts.push(json!({"name": name, "mountPath": format!("/var/lm/{name}")}));
        self.config_map(&format!("{name}binary"), cm, &format!("/var/lm/{name}binary"));
    }
}

#[must_use]
pub fn service_volumes(alm: &Alm, service: &ServiceProfile) -> Volumes {
    let mut vols = Volumes::default();
    if alm.spec.secure {
        vols.secret("lm-certs", "/var/lm/certs");
        vols.secret("lm-keystore", "/var/lm/keystore");
        if service.name == "ishtar" {
            vols.secret("lm-client-credentials", "/var/lm/bootstrap");
        }
    }
    if service.name == "conductor" {
        vols.secret("vault-cert", "/var/lm/vault/certs");
    }
    if let Some(ProfileExtension::Themes {
        themes_config_map,
        locales_config_map,
    }) = &service.extension
    {
        if !themes_config_map.is_empty() {
            vols.unpacked("themes", themes_config_map);
        }
        if !locales_config_map.is_empty() {
            vols.unpacked("locales", locales_config_map);
        }
    }
    vols
}

// ── Builders ──────────────────────────────────────────────────────────────────

pub fn config_map(data: BTreeMap<String, String>) -> Result<ConfigMap> {
    Ok(ConfigMap {
        data: Some(data),
        ..ConfigMap::default()
    })
}

fn field_env(name: &str, path: &str) -> Value {
    json!({"name": name, "valueFrom": {"fieldRef": {"fieldPath": path}}})
}

fn secret_env(name: &str, secret: &str, key: &str) -> Value {
    json!({"name": name, "valueFrom": {"secretKeyRef": {"name": secret, "key": key}}})
}

fn service_env(alm: &Alm, service: &ServiceProfile) -> Vec<Value> {
    let mut env = vec![
        field_env("INSTANCE_ID", "metadata.name"),
        field_env("SERVER_ID", "spec.nodeName"),
    ];
    if service.name == "conductor" {
        env.push(json!({"name": "eureka_instance_hostname", "value": "${HOSTNAME}.conductor"}));
        env.push(json!({"name": "numReplicas", "value": service.replicas.to_string()}));
        env.push(json!({"name": "secure", "value": alm.spec.secure.to_string()}));
        env.push(secret_env("SPRING_CLOUD_CONFIG_SERVER_VAULT_TOKEN", "vault-token", "lmToken"));
        env.push(secret_env("SPRING_CLOUD_VAULT_TOKEN", "vault-token", "lmToken"));
    }
    env
}

fn pod_template(alm: &Alm, service: &ServiceProfile) -> Value {
    let vols = service_volumes(alm, service);
    json!({
        "metadata": {
            "name": format!("{}-{}", alm.name_any(), service.name),
            "labels": {"app": service.name}
        },
        "spec": {
            "containers": [{
                "name": service.name,
                "image": service.image_ref(&alm.spec.docker_repo),
                "ports": [{
                    "name": "http",
                    "protocol": "TCP",
                    "containerPort": service.port.unwrap_or_default()
                }],
                "envFrom": [{"configMapRef": {"name": alm.service_cm_name(&service.name)}}],
                "env": service_env(alm, service),
                "resources": {
                    "requests": {
                        "cpu": service.cpu_request,
                        "memory": service.memory_request
                    }
                },
                "volumeMounts": vols.mounts
            }],
            "volumes": vols.volumes
        }
    })
}

pub fn deployment(alm: &Alm, service: &ServiceProfile) -> Result<Deployment> {
    Ok(serde_json::from_value(json!({
        "metadata": {
            "labels": {"app": service.name}
        },
        "spec": {
            "replicas": service.replicas,
            "selector": {"matchLabels": {"app": service.name}},
            "template": pod_template(alm, service)
        }
    }))?)
}

pub fn stateful_set(alm: &Alm, service: &ServiceProfile) -> Result<StatefulSet> {
    Ok(serde_json::from_value(json!({
        "metadata": {
            "labels": {"app": service.name}
        },
        "spec": {
            "replicas": service.replicas,
            "serviceName": service.name,
            "selector": {"matchLabels": {"app": service.name}},
            "template": pod_template(alm, service)
        }
    }))?)
}

pub fn service(service: &ServiceProfile) -> Result<Service> {
    let port = service.port.unwrap_or_default();
    Ok(serde_json::from_value(json!({
        "spec": {
            "type": "NodePort",
            "ports": [{
                "name": "http",
                "protocol": "TCP",
                "port": port,
                "targetPort": port
            }],
            "selector": {"app": service.name}
        }
    }))?)
}

pub fn ingress(alm: &Alm, service: &ServiceProfile, ingress: &IngressProfile) -> Result<Ingress> {
    let mut annotations = BTreeMap::from([
        ("ingress.kubernetes.io/rewrite-target".to_string(), "/".to_string()),
        ("nginx.org/websocket-services".to_string(), service.name.clone()),
    ]);
    if alm.spec.secure {
        annotations.insert(
            "nginx.ingress.kubernetes.io/backend-protocol".to_string(),
            "HTTPS".to_string(),
        );
        annotations.insert(
            "ingress.kubernetes.io/secure-backends".to_string(),
            "true".to_string(),
        );
    }
    Ok(serde_json::from_value(json!({
        "metadata": {
            "annotations": annotations
        },
        "spec": {
            "tls": [{
                "hosts": [ingress.host],
                "secretName": ingress.tls_secret
            }],
            "rules": [{
                "host": ingress.host,
                "http": {
                    "paths": [{
                        "path": "/",
                        "pathType": "Prefix",
                        "backend": {
                            "service": {
                                "name": service.name,
                                "port": {"number": service.port.unwrap_or_default()}
                            }
                        }
                    }]
                }
            }]
        }
    }))?)
}

/// The one-shot configurator Job, fed by both bootstrap ConfigMaps
pub fn configurator_job(alm: &Alm, configurator: &ServiceProfile) -> Result<Job> {
    Ok(serde_json::from_value(json!({
        "metadata": {
            "labels": {"app": configurator.name}
        },
        "spec": {
            "template": {
                "metadata": {
                    "name": alm.job_name(),
                    "labels": {"app": configurator.name}
                },
                "spec": {
                    "containers": [{
                        "name": configurator.name,
                        "image": configurator.image_ref(&alm.spec.docker_repo),
                        "imagePullPolicy": "Always",
                        "envFrom": [{"configMapRef": {"name": alm.configurator_cm_name()}}],
                        "env": [
                            field_env("NAMESPACE", "metadata.namespace"),
                            secret_env("VAULT_TOKEN", "vault-token", "lmToken"),
                        ],
                        "resources": {
                            "requests": {
                                "cpu": configurator.cpu_request,
                                "memory": configurator.memory_request
                            }
                        },
                        "volumeMounts": [{
                            "name": "lm-configurator",
                            "mountPath": "/var/lm-configurator"
                        },{
                            "name": "lm-config-import",
                            "mountPath": "/var/config-import"
                        }]
                    }],
                    "restartPolicy": "Never",
                    "volumes": [{
                        "name": "lm-configurator",
                        "configMap": {"name": alm.configurator_cm_name()}
                    },{
                        "name": "lm-config-import",
                        "configMap": {"name": alm.config_import_cm_name()}
                    }]
                }
            }
        }
    }))?)
}
