use crate::{Alm, Result, handlebarshandler::HandleBars, profile::ServiceProfile};
use serde::Serialize;
use std::collections::BTreeMap;

// ── Template table ────────────────────────────────────────────────────────────

const JANUS: &str = r#"alm:
  janus:
    storage:
      hostname: "{{cassandra_hostname}}"
    cluster:
      max-partitions: 4
    index:
      search:
        hostname: "{{es_hostname}}"
        elasticsearch.create.ext.index.number_of_shards: 1
        elasticsearch.create.ext.index.number_of_replicas: 0
"#;

const KAFKA: &str = r#"kafka_source: "{{kafka_source}}"
kafka_version: "{{kafka_version}}"
zookeeper_url: "{{zookeeper_url}}"
"#;

const TOPICS: &str = r#"topics:
{{#each topics}}
  {{name}}:
    replication_factor: {{replication_factor}}
    partitions: {{partitions}}
{{#if config}}
    config: "{{config}}"
{{/if}}
{{/each}}
"#;

const CLIENT_CREDENTIALS: &str = r#"{{#each clients}}
- clientId: {{client_id}}
  clientSecret: {{client_secret}}
  grantTypes: {{grant_types}}
{{#if roles}}
  roles: {{roles}}
{{/if}}
{{/each}}
"#;

const WATCHTOWER: &str = r#"alm:
  watchtower:
    kafka:
      replicationFactor: {{replication_factor}}
"#;

const GALILEO: &str = r#"alm:
  galileo:
    ldu:
      streams:
        processing.guarantee: {{processing_guarantee}}
        replication.factor: {{replication_factor}}
        num.standby.replicas: {{num_standby_replicas}}
    janus:
      cluster.max-partitions: 4
      storage.cql.replication-factor: {{replication_factor}}
      index:
        search:
          elasticsearch.create.ext.index.number_of_replicas: {{num_standby_replicas}}
          elasticsearch.create.ext.index.number_of_shards: {{es_num_shards}}
"#;

const TALLEDEGA: &str = r#"alm:
  talledega:
    janus:
      cluster.max-partitions: 4
      storage.cql.replication-factor: {{cassandra_replication_factor}}
      index:
        search:
          elasticsearch.create.ext.index.number_of_replicas: {{es_num_replicas}}
          elasticsearch.create.ext.index.number_of_shards: {{es_num_shards}}
"#;

const BRENT: &str = r#"alm:
  brent:
    cassandra:
      keyspaceManager:
        replicationFactor: {{cassandra_replication_factor}}
    janus:
      cluster.max-partitions: 4
      storage.cql.replication-factor: {{cassandra_replication_factor}}
      index:
        search:
          elasticsearch.create.ext.index.number_of_replicas: {{es_num_replicas}}
          elasticsearch.create.ext.index.number_of_shards: {{es_num_shards}}
"#;

const APOLLO: &str = r#"alm:
  apollo:
    cassandra:
      keyspaceManager:
        replicationFactor: {{cassandra_replication_factor}}
    janus:
      cluster.max-partitions: 4
      storage.cql.replication-factor: {{cassandra_replication_factor}}
      index:
        search:
          elasticsearch.create.ext.index.number_of_replicas: {{es_num_replicas}}
          elasticsearch.create.ext.index.number_of_shards: {{es_num_shards}}
"#;

const NIMROD: &str = r#"alm:
  nimrod:
    cassandra:
      keyspaceManager:
        replicationFactor: {{cassandra_replication_factor}}
"#;

const ISHTAR: &str = r#"alm:
  ishtar:
    cassandra:
      keyspaceManager:
        replicationFactor: {{cassandra_replication_factor}}
  roles:
    SLMAdmin:
      ldapGroups:
        - SLMAdmin
      privileges:
        NsinstsMgt: read,write,execute
        VnfInstsMgt: read,write,execute
        nsDesMgt: read,write,execute
        VnfDesMgt: read,write,execute
        DeployLocMgt: read,write,execute
        VduMgt: read,write,execute
        IntentReqslMgt: read,execute
        IntentReqsOps: read,execute
        SlmAdmin: read,write,execute
        MaintModeOride: read,execute
        VduDesMgt: read,write,execute
        VduGrpMgt: read,write,execute
        VduInstsMgt: read,write,execute
        BehvrScenExec: read,write,execute
        BehvrScenDes: read,write
        RmDrvr: read,write
        ResourcePkg: write
    Portal:
      ldapGroups:
        - Portal
      privileges:
        NsinstsMgt: read,write,execute
        VduDesMgt: read
        VduGrpMgt: read
        VduInstsMgt: read
        VnfInstsMgt: read
        nsDesMgt: read
        DeployLocMgt: read
        IntentReqslMgt: read,execute
        BehvrScenExec: read,write,execute
        BehvrScenDes: read,write
        ResourcePkg: write
    ReadOnly:
      ldapGroups:
        - ReadOnly
      privileges:
        NsinstsMgt: read
        VduDesMgt: read
        VduGrpMgt: read
        VduInstsMgt: read
        VnfInstsMgt: read
        nsDesMgt: read
        VnfDesMgt: read
        DeployLocMgt: read
        VduMgt: read
        BehvrScenExec: read
        BehvrScenDes: read
    RootSecAdmin:
      ldapGroups:
        - RootSecAdmin
      privileges:
        SecAdmin: read,write,execute
    BehaviourScenarioExecute:
      privileges:
        NsinstsMgt: read,write
        IntentReqslMgt: execute
        IntentReqsOps: execute
"#;

/// Every named template, registered at once in the engine
const TEMPLATES: [(&str, &str); 11] = [
    ("janus", JANUS),
    ("kafka", KAFKA),
    ("topics", TOPICS),
    ("client_credentials", CLIENT_CREDENTIALS),
    ("watchtower", WATCHTOWER),
    ("galileo", GALILEO),
    ("talledega", TALLEDEGA),
    ("brent", BRENT),
    ("apollo", APOLLO),
    ("nimrod", NIMROD),
    ("ishtar", ISHTAR),
];

pub fn engine() -> Result<HandleBars<'static>> {
    let mut hbs = HandleBars::new();
    for (name, template) in TEMPLATES {
        hbs.register_template(name, template)?;
    }
    Ok(hbs)
}

// ── Parameters ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Janus {
    cassandra_hostname: &'static str,
    es_hostname: &'static str,
}

#[derive(Serialize)]
struct Kafka {
    kafka_source: &'static str,
    kafka_version: &'static str,
    zookeeper_url: &'static str,
}

#[derive(Serialize)]
struct Topic {
    name: &'static str,
    replication_factor: i32,
    partitions: i32,
    config: &'static str,
}

#[derive(Serialize)]
struct Topics<'a> {
    topics: &'a [Topic],
}

#[derive(Serialize)]
struct ClientCredential {
    client_id: &'static str,
    client_secret: &'static str,
    grant_types: &'static str,
    roles: &'static str,
}

#[derive(Serialize)]
struct Clients<'a> {
    clients: &'a [ClientCredential],
}

/// Sizing of the backing stores used by the imported service configurations
#[derive(Serialize, Clone, Debug)]
struct Storage {
    replication_factor: i32,
    cassandra_replication_factor: i32,
    es_num_shards: i32,
    es_num_replicas: i32,
    num_standby_replicas: i32,
    processing_guarantee: &'static str,
}

const COMPACT: &str = "cleanup.policy=compact";
const ONE_HOUR: &str = "retention.ms=3600000";

/// (topic, extra config)
const TOPIC_TABLE: [(&str, &str); 30] = [
    ("alm__health", COMPACT),
    ("alm__metric", COMPACT),
    ("alm__metric-integrity", COMPACT),
    ("alm__policy", COMPACT),
    ("alm__policyAction", ""),
    ("alm__policyStatusHeal", ""),
    ("alm__policyStatusScale", ""),
    ("alm__clock", ""),
    ("alm__descriptorChange", COMPACT),
    ("alm__processStateChange", ""),
    ("alm__processTasksStateChange", ""),
    ("alm__stateChange", ""),
    ("alm__serviceStateTransition", ""),
    ("alm__taskUpdate", ""),
    ("alm__load", ""),
    ("alm__integrity", ""),
    ("alm__integrityMissing", ""),
    ("info", ""),
    ("alm__clockticks5", ONE_HOUR),
    ("alm__clockticks10", ONE_HOUR),
    ("alm__clockticks15", ONE_HOUR),
    ("alm__clockticks30", ONE_HOUR),
    ("alm__clockticks60", ONE_HOUR),
    ("alm__clockticksother", ""),
    ("alm__tick", ONE_HOUR),
    ("alm__clocktickTypes", COMPACT),
    ("alm__processRestart", ""),
    ("alm__stateChange__ldu", "retention.ms=31536000000"),
    ("lm_vim_infrastructure_task_events", ""),
    ("lm_vnfc_lifecycle_execution_events", ""),
];

const CLIENTS: [ClientCredential; 3] = [
    ClientCredential {
        client_id: "LmClient",
        client_secret: "pass123",
        grant_types: "client_credentials",
        roles: "SLMAdmin",
    },
    ClientCredential {
        client_id: "NimrodClient",
        client_secret: "pass123",
        grant_types: "password,refresh_token",
        roles: "",
    },
    ClientCredential {
        client_id: "DokiClient",
        client_secret: "pass123",
        grant_types: "client_credentials",
        roles: "BehaviourScenarioExecute",
    },
];

/// Static security settings handed to the configurator
const SECURITY: [(&str, &str); 16] = [
    ("securityKeyStorePassword", "keypass"),
    ("securityNimrodClientSecret", "pass123"),
    ("securityNimrodAccessTokenValidity", "1200"),
    ("securityNimrodRefreshTokenValidity", "30600"),
    ("securityDokiClientSecret", "pass123"),
    ("securityDokiAccessTokenValidity", "1200"),
    ("securityDokiRoles", "BehaviourScenarioExecute"),
    ("securityLdapEnabled", "true"),
    ("securityLdapConfigPassword", "config"),
    ("securityLdapManagerPassword", "lmadmin"),
    ("securityLdapDomain", "lm.com"),
    ("securityUiHost", "ui.lm"),
    ("securityApiHost", "app.lm"),
    ("securityBrentHost", "brent.lm"),
    ("cassandraUsername", ""),
    ("cassandraPassword", ""),
];

// ── ConfigMap contents ────────────────────────────────────────────────────────

/// Content of the configurator ConfigMap
pub fn configurator_data(secure: bool) -> Result<BTreeMap<String, String>> {
    let hbs = engine()?;
    let mut data: BTreeMap<String, String> = SECURITY
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    data.insert(
        "kafka_config.yaml".to_string(),
        hbs.render("kafka", &Kafka {
            kafka_source: "https://archive.apache.org/dist/kafka/2.0.0/kafka_2.11-2.0.0.tgz",
            kafka_version: "kafka_2.11-2.0.0",
            zookeeper_url: "foundation-zookeeper:2181",
        })?,
    );
    let topics: Vec<Topic> = TOPIC_TABLE
        .iter()
        .map(|&(name, config)| Topic {
            name,
            replication_factor: 1,
            partitions: 1,
            config,
        })
        .collect();
    data.insert(
        "topics.yaml".to_string(),
        hbs.render("topics", &Topics { topics: &topics })?,
    );
    data.insert(
        "janusgraph_config.yaml".to_string(),
        hbs.render("janus", &Janus {
            cassandra_hostname: "foundation-cassandra",
            es_hostname: "foundation-elasticsearch-client:9200",
        })?,
    );
    data.insert(
        "securityClientCredentials".to_string(),
        hbs.render("client_credentials", &Clients { clients: &CLIENTS })?,
    );
    data.insert("securityEnabled".to_string(), secure.to_string());
    Ok(data)
}

/// Content of the ConfigMap imported by the configurator into the config server
pub fn config_import_data() -> Result<BTreeMap<String, String>> {
    let hbs = engine()?;
    let storage = Storage {
        replication_factor: 1,
        cassandra_replication_factor: 1,
        es_num_shards: 1,
        es_num_replicas: 0,
        num_standby_replicas: 0,
        processing_guarantee: "at_least_once",
    };
    let mut data = BTreeMap::new();
    for service in ["watchtower", "galileo", "talledega", "brent", "apollo", "nimrod", "ishtar"] {
        data.insert(format!("{service}.yaml"), hbs.render(service, &storage)?);
    }
    Ok(data)
}

/// Environment of a micro-service, delivered through its ConfigMap
#[must_use]
pub fn service_data(alm: &Alm, service: &ServiceProfile) -> BTreeMap<String, String> {
    let mut profiles = if alm.spec.secure {
        "security".to_string()
    } else {
        "nosecurity".to_string()
    };
    if service.name == "conductor" {
        profiles.push_str(",vault");
    }
    if !alm.spec.spring_profiles_active.is_empty() {
        profiles.push(',');
        profiles.push_str(&alm.spec.spring_profiles_active);
    }
    BTreeMap::from([
        ("eureka_instance_ipAddress".to_string(), service.image.clone()),
        ("spring_profiles_include".to_string(), "prod,kubernetes".to_string()),
        ("spring_cloud_config_failFast".to_string(), "true".to_string()),
        ("LOG_FOLDER".to_string(), "/var/lm/logs".to_string()),
        (
            "spring_cloud_config_label".to_string(),
            alm.spec.spring_cloud_config_label.clone(),
        ),
        ("JVM_OPTIONS".to_string(), format!("-Xmx{}", service.heap)),
        ("spring_profiles_active".to_string(), profiles),
    ])
}
